//! Column-mapped elementwise merges into a destination matrix.

use anyhow::Result;
use rayon::prelude::*;
use tracing::debug;

use breedsim_geno::parallel::{build_pool, partition_len};
use breedsim_geno::{DosageMatrix, GenoError, GenotypeMatrix, GenotypeSink, GenotypeSource};

use super::op::{checked_cell, MixOp};

/// Merge an in-memory matrix into `dest`.
///
/// Source column `k` lands in destination column `columns[k]`; without a
/// column list the mapping is positional and column counts must agree.
pub fn merge_from_memory<D: GenotypeSink + ?Sized>(
    dest: &mut D,
    source: &DosageMatrix,
    columns: Option<&[usize]>,
    op: MixOp,
    threads: usize,
) -> Result<()> {
    merge(dest, source, columns, op, threads)
}

/// Merge another disk-backed matrix into `dest`. Same mapping rules as
/// [`merge_from_memory`].
pub fn merge_from_matrix<D: GenotypeSink + ?Sized>(
    dest: &mut D,
    source: &GenotypeMatrix,
    columns: Option<&[usize]>,
    op: MixOp,
    threads: usize,
) -> Result<()> {
    merge(dest, source, columns, op, threads)
}

/// Merge any genotype source into `dest`.
///
/// Every result is validated before the destination is touched, so a
/// failing merge leaves `dest` unchanged.
pub fn merge<D, S>(
    dest: &mut D,
    source: &S,
    columns: Option<&[usize]>,
    op: MixOp,
    threads: usize,
) -> Result<()>
where
    D: GenotypeSink + ?Sized,
    S: GenotypeSource + ?Sized,
{
    let m = dest.n_markers();
    if source.n_markers() != m {
        return Err(GenoError::dimension("merge markers", m, source.n_markers()).into());
    }
    let target = column_targets(dest.n_individuals(), source.n_individuals(), columns)?;

    debug!(
        "Merging {} source columns into {} x {} matrix with {:?}",
        source.n_individuals(),
        m,
        dest.n_individuals(),
        op
    );
    if m == 0 || target.is_empty() {
        return Ok(());
    }

    let pool = build_pool(threads)?;
    let cols_per_worker = partition_len(target.len(), pool.current_num_threads(), 1);

    // Validation pass over shared borrows.
    let cells = dest.cells();
    pool.install(|| {
        cells
            .par_chunks(cols_per_worker * m)
            .enumerate()
            .try_for_each(|(chunk_idx, chunk)| {
                let first_col = chunk_idx * cols_per_worker;
                for (jj, column) in chunk.chunks(m).enumerate() {
                    let j = first_col + jj;
                    if let Some(k) = target[j] {
                        for (i, (&d, &s)) in column.iter().zip(source.individual(k)).enumerate() {
                            let value = op.apply(d, s);
                            if checked_cell(value).is_none() {
                                return Err(GenoError::InvalidDosage {
                                    value,
                                    marker: i,
                                    individual: j,
                                });
                            }
                        }
                    }
                }
                Ok(())
            })
    })?;

    let cells = dest.cells_mut();
    pool.install(|| {
        cells
            .par_chunks_mut(cols_per_worker * m)
            .enumerate()
            .for_each(|(chunk_idx, chunk)| {
                let first_col = chunk_idx * cols_per_worker;
                for (jj, column) in chunk.chunks_mut(m).enumerate() {
                    if let Some(k) = target[first_col + jj] {
                        for (d, &s) in column.iter_mut().zip(source.individual(k)) {
                            if let Some(v) = checked_cell(op.apply(*d, s)) {
                                *d = v;
                            }
                        }
                    }
                }
            });
    });

    Ok(())
}

/// Source column for every destination column, `None` where untouched.
fn column_targets(
    n_dest: usize,
    n_source: usize,
    columns: Option<&[usize]>,
) -> std::result::Result<Vec<Option<usize>>, GenoError> {
    match columns {
        None => {
            if n_source != n_dest {
                return Err(GenoError::dimension("merge columns", n_dest, n_source));
            }
            Ok((0..n_dest).map(Some).collect())
        }
        Some(columns) => {
            if columns.len() != n_source {
                return Err(GenoError::dimension("column list", n_source, columns.len()));
            }
            let mut target = vec![None; n_dest];
            for (k, &j) in columns.iter().enumerate() {
                if j >= n_dest {
                    return Err(GenoError::column(j, n_dest));
                }
                if target[j].is_some() {
                    return Err(GenoError::DuplicateColumn(j));
                }
                target[j] = Some(k);
            }
            Ok(target)
        }
    }
}
