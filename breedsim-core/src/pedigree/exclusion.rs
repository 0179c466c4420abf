//! Parent-offspring exclusion scoring.
//!
//! A true parent and its offspring always share an allele, so opposite
//! homozygotes (0 vs 2) exclude parentage at that marker. The score is the
//! fraction of co-called markers showing such a conflict.

use anyhow::Result;

use breedsim_geno::traits::is_dosage;
use breedsim_geno::GenoError;

/// Counts underlying an exclusion score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExclusionCounts {
    /// Markers where both individuals are called.
    pub co_called: usize,
    /// Co-called markers with opposite homozygotes.
    pub conflicts: usize,
}

impl ExclusionCounts {
    /// Conflict rate, `None` without co-called markers.
    pub fn score(&self) -> Option<f64> {
        if self.co_called == 0 {
            None
        } else {
            Some(self.conflicts as f64 / self.co_called as f64)
        }
    }
}

/// Count opposite homozygotes between two genotype vectors.
pub fn exclusion_counts(offspring: &[i8], candidate: &[i8]) -> Result<ExclusionCounts> {
    if offspring.len() != candidate.len() {
        return Err(GenoError::dimension("exclusion markers", offspring.len(), candidate.len()).into());
    }

    let mut counts = ExclusionCounts::default();
    for (&o, &c) in offspring.iter().zip(candidate) {
        if is_dosage(o) && is_dosage(c) {
            counts.co_called += 1;
            if (o == 0 && c == 2) || (o == 2 && c == 0) {
                counts.conflicts += 1;
            }
        }
    }
    Ok(counts)
}

/// Exclusion score of `candidate` as a parent of `offspring`.
pub fn exclusion_score(offspring: &[i8], candidate: &[i8]) -> Result<Option<f64>> {
    Ok(exclusion_counts(offspring, candidate)?.score())
}
