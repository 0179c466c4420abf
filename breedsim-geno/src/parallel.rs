//! Worker pool construction and static work partitioning.
//!
//! Every parallel stage splits its work into one contiguous range per
//! worker up front (see [`partition_len`]), so writers never need locks.

use anyhow::{Context, Result};
use rayon::ThreadPool;

/// Build a fixed-size pool. `threads == 0` falls back to a single worker.
pub fn build_pool(threads: usize) -> Result<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("breedsim-worker-{}", i))
        .build()
        .context("Failed to create worker pool")
}

/// Length of each contiguous range when `total` items are split across
/// `n_workers`, rounded up to a multiple of `align`. Never returns 0.
pub fn partition_len(total: usize, n_workers: usize, align: usize) -> usize {
    let align = align.max(1);
    let per_worker = total.div_ceil(n_workers.max(1)).max(1);
    per_worker.div_ceil(align) * align
}
