//! Block-recombination mating simulation.
//!
//! Pair `i` crosses source columns `sires[i]` and `dams[i]` and produces
//! destination column `i`. The marker axis is cut into contiguous blocks;
//! within a block each parent transmits the same pseudo-haplotype copy,
//! chosen by a fair coin, so linked markers are inherited together.

use anyhow::Result;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use breedsim_geno::parallel::{build_pool, partition_len};
use breedsim_geno::{GenoError, GenotypeSink, GenotypeSource};

use super::gamete::{block_bounds, offspring_dosage};
use crate::mix::op::{checked_cell, MixOp};

/// Configuration for mating simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatingConfig {
    /// Number of recombination blocks along the marker axis.
    pub n_block: usize,
    /// Random seed; `None` draws one from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for MatingConfig {
    fn default() -> Self {
        Self {
            n_block: 100,
            seed: None,
        }
    }
}

/// Simulate one offspring per sire/dam pair into `dest`.
///
/// Offspring dosages are combined into the destination with `op`. The
/// random stream of each pair depends only on the seed and the pair
/// index, so the result does not depend on `threads`.
pub fn simulate_mating<D, S>(
    dest: &mut D,
    source: &S,
    sires: &[usize],
    dams: &[usize],
    config: &MatingConfig,
    op: MixOp,
    threads: usize,
) -> Result<()>
where
    D: GenotypeSink + ?Sized,
    S: GenotypeSource + ?Sized,
{
    let m = source.n_markers();
    let n_source = source.n_individuals();

    if sires.len() != dams.len() {
        return Err(GenoError::dimension("dam list", sires.len(), dams.len()).into());
    }
    let n_pairs = sires.len();
    if dest.n_individuals() != n_pairs {
        return Err(GenoError::dimension("mating destination columns", n_pairs, dest.n_individuals()).into());
    }
    if dest.n_markers() != m {
        return Err(GenoError::dimension("mating destination markers", m, dest.n_markers()).into());
    }
    if let Some(&bad) = sires.iter().chain(dams).find(|&&j| j >= n_source) {
        return Err(GenoError::column(bad, n_source).into());
    }

    let base_seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let bounds = block_bounds(m, config.n_block);
    debug!(
        "Simulating {} matings over {} markers in {} blocks",
        n_pairs,
        m,
        bounds.len() - 1
    );
    debug!("Mating base seed: {}", base_seed);

    if m == 0 || n_pairs == 0 {
        return Ok(());
    }

    let pool = build_pool(threads)?;
    let pairs_per_worker = partition_len(n_pairs, pool.current_num_threads(), 1);
    let gamete = |pair: usize, out: &mut [i8]| {
        offspring_column(source, sires[pair], dams[pair], &bounds, base_seed, pair, out)
    };

    // Assign cannot produce an invalid cell; other operations are checked
    // in full before the destination is written.
    if op != MixOp::Assign {
        let cells = dest.cells();
        pool.install(|| {
            cells
                .par_chunks(pairs_per_worker * m)
                .enumerate()
                .try_for_each(|(chunk_idx, chunk)| {
                    let mut child = vec![0i8; m];
                    for (pp, column) in chunk.chunks(m).enumerate() {
                        let pair = chunk_idx * pairs_per_worker + pp;
                        gamete(pair, &mut child);
                        for (i, (&d, &c)) in column.iter().zip(&child).enumerate() {
                            let value = op.apply(d, c);
                            if checked_cell(value).is_none() {
                                return Err(GenoError::InvalidDosage {
                                    value,
                                    marker: i,
                                    individual: pair,
                                });
                            }
                        }
                    }
                    Ok(())
                })
        })?;
    }

    let cells = dest.cells_mut();
    pool.install(|| {
        cells
            .par_chunks_mut(pairs_per_worker * m)
            .enumerate()
            .for_each(|(chunk_idx, chunk)| {
                let mut child = vec![0i8; m];
                for (pp, column) in chunk.chunks_mut(m).enumerate() {
                    gamete(chunk_idx * pairs_per_worker + pp, &mut child);
                    for (d, &c) in column.iter_mut().zip(&child) {
                        if let Some(v) = checked_cell(op.apply(*d, c)) {
                            *d = v;
                        }
                    }
                }
            });
    });

    Ok(())
}

/// Draw the offspring genotype of one pair into `out`.
fn offspring_column<S: GenotypeSource + ?Sized>(
    source: &S,
    sire: usize,
    dam: usize,
    bounds: &[usize],
    base_seed: u64,
    pair: usize,
    out: &mut [i8],
) {
    let mut rng = ChaCha8Rng::seed_from_u64(base_seed);
    rng.set_stream(pair as u64);

    let sire_g = source.individual(sire);
    let dam_g = source.individual(dam);
    for block in bounds.windows(2) {
        let sire_copy: bool = rng.gen();
        let dam_copy: bool = rng.gen();
        for i in block[0]..block[1] {
            out[i] = offspring_dosage(sire_g[i], dam_g[i], sire_copy, dam_copy);
        }
    }
}
