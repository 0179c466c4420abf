//! Marker and individual quality-control filter.
//!
//! Pass 1 (markers): genotype class counts over the kept individuals give
//! missing rate, allele frequency, MAF and HWE statistics; a marker is
//! dropped when any configured threshold is violated.
//! Pass 2 (individuals): missing rate over the retained markers only;
//! individuals above `mind` are dropped.
//!
//! Workers own disjoint ranges of individuals and tally per-marker counts
//! independently; tallies are summed afterwards.

use std::path::Path;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::ChiSquared;
use tracing::{debug, info};

use breedsim_geno::parallel::{build_pool, partition_len};
use breedsim_geno::traits::is_dosage;
use breedsim_geno::{GenoError, GenotypeSource};

use super::hwe::{chisq_pvalue, hwe_chisq_statistic, hwe_exact_pvalue};
use crate::util::math::rate;

/// Which Hardy-Weinberg test the `hwe` threshold applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HweTest {
    #[default]
    Exact,
    ChiSquare,
}

/// QC thresholds. Each `None` disables its criterion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QcConfig {
    /// Maximum per-marker missing rate.
    pub geno: Option<f64>,
    /// Minimum HWE p-value.
    pub hwe: Option<f64>,
    /// Maximum per-individual missing rate (over retained markers).
    pub mind: Option<f64>,
    /// Minimum minor-allele frequency.
    pub maf: Option<f64>,
    pub hwe_test: HweTest,
}

/// Genotype class counts for one marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenotypeCounts {
    pub dosage0: u64,
    pub dosage1: u64,
    pub dosage2: u64,
    pub missing: u64,
}

impl GenotypeCounts {
    #[inline]
    fn add(&mut self, value: i8) {
        match value {
            0 => self.dosage0 += 1,
            1 => self.dosage1 += 1,
            2 => self.dosage2 += 1,
            _ => self.missing += 1,
        }
    }

    fn merge(&mut self, other: &GenotypeCounts) {
        self.dosage0 += other.dosage0;
        self.dosage1 += other.dosage1;
        self.dosage2 += other.dosage2;
        self.missing += other.missing;
    }

    pub fn called(&self) -> u64 {
        self.dosage0 + self.dosage1 + self.dosage2
    }
}

/// Statistics of a retained marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerStats {
    /// Marker (row) index in the matrix.
    pub index: usize,
    pub counts: GenotypeCounts,
    pub missing_rate: f64,
    /// Frequency of the counted allele; `None` without called genotypes.
    pub allele_freq: Option<f64>,
    pub maf: Option<f64>,
    pub hwe_exact_pvalue: Option<f64>,
    pub hwe_chisq: Option<f64>,
    pub hwe_chisq_pvalue: Option<f64>,
}

impl MarkerStats {
    fn from_counts(index: usize, counts: GenotypeCounts, n_kept: usize, chi2: &ChiSquared) -> Self {
        let called = counts.called();
        let (allele_freq, maf, exact, chisq, chisq_p) = if called > 0 {
            let p = (counts.dosage1 + 2 * counts.dosage2) as f64 / (2 * called) as f64;
            let stat = hwe_chisq_statistic(counts.dosage0, counts.dosage1, counts.dosage2);
            (
                Some(p),
                Some(p.min(1.0 - p)),
                Some(hwe_exact_pvalue(counts.dosage1, counts.dosage0, counts.dosage2)),
                Some(stat),
                Some(chisq_pvalue(chi2, stat)),
            )
        } else {
            (None, None, None, None, None)
        };

        Self {
            index,
            counts,
            missing_rate: rate(counts.missing as usize, n_kept),
            allele_freq,
            maf,
            hwe_exact_pvalue: exact,
            hwe_chisq: chisq,
            hwe_chisq_pvalue: chisq_p,
        }
    }

    /// P-value of the selected HWE test.
    pub fn hwe_pvalue(&self, test: HweTest) -> Option<f64> {
        match test {
            HweTest::Exact => self.hwe_exact_pvalue,
            HweTest::ChiSquare => self.hwe_chisq_pvalue,
        }
    }

    fn passes(&self, config: &QcConfig) -> bool {
        if let Some(max_missing) = config.geno {
            if self.missing_rate > max_missing {
                return false;
            }
        }
        if let Some(min_maf) = config.maf {
            match self.maf {
                Some(maf) if maf >= min_maf => {}
                _ => return false,
            }
        }
        if let Some(min_p) = config.hwe {
            match self.hwe_pvalue(config.hwe_test) {
                Some(p) if p >= min_p => {}
                _ => return false,
            }
        }
        true
    }
}

/// Statistics of a retained individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualStats {
    /// Individual (column) index in the matrix.
    pub index: usize,
    /// Missing calls over the retained markers.
    pub n_missing: usize,
    pub missing_rate: f64,
}

/// Result of QC filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QcReport {
    /// Retained marker indices, ascending.
    pub markers: Vec<usize>,
    /// Retained individual indices, ascending.
    pub individuals: Vec<usize>,
    /// One entry per retained marker, aligned with `markers`.
    pub marker_stats: Vec<MarkerStats>,
    /// One entry per retained individual, aligned with `individuals`.
    pub individual_stats: Vec<IndividualStats>,
}

impl QcReport {
    /// Save the report as pretty-printed JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write QC report: {}", path.display()))?;
        Ok(())
    }
}

/// Filter markers, then individuals, of a genotype matrix.
///
/// `keep_individuals` restricts every statistic to the listed columns
/// (duplicates are ignored); individuals outside it are never retained.
pub fn filter_genotypes<S: GenotypeSource + ?Sized>(
    matrix: &S,
    keep_individuals: Option<&[usize]>,
    config: &QcConfig,
    threads: usize,
    verbose: bool,
) -> Result<QcReport> {
    let m = matrix.n_markers();
    let n = matrix.n_individuals();

    let kept: Vec<usize> = match keep_individuals {
        Some(indices) => {
            if let Some(&bad) = indices.iter().find(|&&j| j >= n) {
                return Err(GenoError::column(bad, n).into());
            }
            let mut kept = indices.to_vec();
            kept.sort_unstable();
            kept.dedup();
            kept
        }
        None => (0..n).collect(),
    };

    if verbose {
        info!(
            "QC on {} markers x {} individuals (geno={:?}, maf={:?}, hwe={:?}, mind={:?})",
            m,
            kept.len(),
            config.geno,
            config.maf,
            config.hwe,
            config.mind
        );
    }

    let pool = build_pool(threads)?;
    let workers = pool.current_num_threads();
    let chi2 = ChiSquared::new(1.0)?;
    let per_worker = partition_len(kept.len(), workers, 1);

    // Pass 1: per-marker genotype class counts over the kept individuals.
    let counts: Vec<GenotypeCounts> = pool.install(|| {
        kept.par_chunks(per_worker)
            .map(|chunk| {
                let mut tally = vec![GenotypeCounts::default(); m];
                for &j in chunk {
                    for (t, &v) in tally.iter_mut().zip(matrix.individual(j)) {
                        t.add(v);
                    }
                }
                tally
            })
            .reduce(
                || vec![GenotypeCounts::default(); m],
                |mut acc, tally| {
                    for (a, t) in acc.iter_mut().zip(tally.iter()) {
                        a.merge(t);
                    }
                    acc
                },
            )
    });

    let marker_stats: Vec<MarkerStats> = pool.install(|| {
        counts
            .par_iter()
            .enumerate()
            .map(|(i, c)| MarkerStats::from_counts(i, *c, kept.len(), &chi2))
            .filter(|s| s.passes(config))
            .collect()
    });
    let markers: Vec<usize> = marker_stats.iter().map(|s| s.index).collect();

    if verbose {
        info!("Marker QC: {} of {} markers retained", markers.len(), m);
    }

    // Pass 2: individual missingness over the retained markers only.
    let per_individual: Vec<Vec<IndividualStats>> = pool.install(|| {
        kept.par_chunks(per_worker)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|&j| {
                        let genotypes = matrix.individual(j);
                        let n_missing = markers.iter().filter(|&&i| !is_dosage(genotypes[i])).count();
                        IndividualStats {
                            index: j,
                            n_missing,
                            missing_rate: rate(n_missing, markers.len()),
                        }
                    })
                    .collect()
            })
            .collect()
    });

    let individual_stats: Vec<IndividualStats> = per_individual
        .into_iter()
        .flatten()
        .filter(|s| config.mind.map_or(true, |max| s.missing_rate <= max))
        .collect();
    let individuals: Vec<usize> = individual_stats.iter().map(|s| s.index).collect();

    debug!(
        "Individual QC: {} of {} kept individuals retained",
        individuals.len(),
        kept.len()
    );
    if verbose {
        info!("Individual QC: {} of {} individuals retained", individuals.len(), kept.len());
    }

    Ok(QcReport {
        markers,
        individuals,
        marker_stats,
        individual_stats,
    })
}
