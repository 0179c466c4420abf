//! Genotype-based pedigree correction.
//!
//! For every genotyped offspring, each recorded parent is checked against
//! a candidate pool by exclusion score. A recorded parent that is
//! compatible and not clearly beaten is kept; otherwise the best candidate
//! is assigned when it is both compatible and unambiguous.

use std::collections::HashMap;

use anyhow::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use breedsim_geno::parallel::build_pool;
use breedsim_geno::pedigree::{CorrectedRecord, ParentOutcome, ParentStatus, PedigreeEntry};
use breedsim_geno::sample::IdIndex;
use breedsim_geno::{GenoError, GenotypeSource};

use super::exclusion::exclusion_score;
use crate::util::math::within;

/// Thresholds for pedigree correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Candidates scoring above this are excluded.
    pub excl_threshold: f64,
    /// A parent is assigned or kept only at or below this score.
    pub assign_threshold: f64,
    /// Scores this close are considered tied.
    pub tie_tolerance: f64,
    /// Minimum birth-date gap between parent and offspring.
    pub min_generation_interval: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            excl_threshold: 0.1,
            assign_threshold: 0.05,
            tie_tolerance: 0.0,
            min_generation_interval: 0.0,
        }
    }
}

/// Which parent is being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parent {
    Sire,
    Dam,
}

/// Shared lookups for one correction run.
struct Resolver<'a, S: ?Sized> {
    matrix: &'a S,
    index: IdIndex,
    birth: HashMap<&'a str, f64>,
    sire_pool: Vec<usize>,
    dam_pool: Vec<usize>,
    config: &'a ResolverConfig,
}

/// Correct sire and dam assignments of `pedigree` from genotypes.
///
/// `genotyped_ids[j]` names column `j` of `matrix`. Without an explicit
/// candidate list, every genotyped individual is a candidate for both
/// parents. Birth dates are taken from the pedigree rows; unknown dates do
/// not filter candidates.
///
/// Sire and dam are resolved independently. When the two pools overlap,
/// the same individual may be assigned to both roles; callers breeding
/// without selfing should pass disjoint pools.
#[allow(clippy::too_many_arguments)]
pub fn correct_pedigree<S: GenotypeSource + ?Sized>(
    matrix: &S,
    genotyped_ids: &[String],
    pedigree: &[PedigreeEntry],
    candidate_sires: Option<&[String]>,
    candidate_dams: Option<&[String]>,
    config: &ResolverConfig,
    threads: usize,
    verbose: bool,
) -> Result<Vec<CorrectedRecord>> {
    let n = matrix.n_individuals();
    if genotyped_ids.len() != n {
        return Err(GenoError::dimension("genotyped identifiers", n, genotyped_ids.len()).into());
    }
    let index = IdIndex::new(genotyped_ids)?;

    let birth: HashMap<&str, f64> = pedigree
        .iter()
        .filter_map(|e| e.birth_date.map(|b| (e.id.as_str(), b)))
        .collect();

    let pool_of = |ids: Option<&[String]>| match ids {
        Some(ids) => index.resolve(ids),
        None => (0..n).collect(),
    };
    let sire_pool = pool_of(candidate_sires);
    let dam_pool = pool_of(candidate_dams);

    if verbose {
        info!(
            "Correcting {} pedigree records against {} genotyped individuals ({} candidate sires, {} candidate dams)",
            pedigree.len(),
            n,
            sire_pool.len(),
            dam_pool.len()
        );
    }

    let resolver = Resolver {
        matrix,
        index,
        birth,
        sire_pool,
        dam_pool,
        config,
    };

    let pool = build_pool(threads)?;
    let records: Vec<CorrectedRecord> = pool.install(|| {
        pedigree
            .par_iter()
            .map(|entry| resolver.correct_entry(entry))
            .collect::<Result<Vec<_>>>()
    })?;

    if verbose {
        let count = |status: ParentStatus| {
            records
                .iter()
                .map(|r| (r.sire.status == status) as usize + (r.dam.status == status) as usize)
                .sum::<usize>()
        };
        info!(
            "Pedigree correction: {} unchanged, {} resolved, {} unresolved parents",
            count(ParentStatus::Unchanged),
            count(ParentStatus::Resolved),
            count(ParentStatus::Unresolved)
        );
    }
    Ok(records)
}

impl<'a, S: GenotypeSource + ?Sized> Resolver<'a, S> {
    fn correct_entry(&self, entry: &PedigreeEntry) -> Result<CorrectedRecord> {
        let (sire, dam) = match self.index.get(&entry.id) {
            Some(col) => (
                self.resolve_parent(col, entry, Parent::Sire)?,
                self.resolve_parent(col, entry, Parent::Dam)?,
            ),
            None => {
                debug!("Offspring {} is not genotyped", entry.id);
                (
                    ParentOutcome::unresolved(entry.sire.as_ref()),
                    ParentOutcome::unresolved(entry.dam.as_ref()),
                )
            }
        };
        if let Some(id) = sire.id.as_ref().filter(|&id| dam.id.as_ref() == Some(id)) {
            debug!("{}: {} is both sire and dam", entry.id, id);
        }

        Ok(CorrectedRecord {
            id: entry.id.clone(),
            recorded_sire: entry.sire.clone(),
            recorded_dam: entry.dam.clone(),
            birth_date: entry.birth_date,
            sire,
            dam,
        })
    }

    fn resolve_parent(&self, offspring: usize, entry: &PedigreeEntry, parent: Parent) -> Result<ParentOutcome> {
        let (pool, recorded) = match parent {
            Parent::Sire => (&self.sire_pool, entry.sire.as_ref()),
            Parent::Dam => (&self.dam_pool, entry.dam.as_ref()),
        };
        let config = self.config;
        let genotypes = self.matrix.individual(offspring);

        let mut survivors: Vec<(usize, f64)> = Vec::new();
        for &candidate in pool {
            if candidate == offspring || !self.born_in_time(candidate, entry.birth_date) {
                continue;
            }
            if let Some(score) = exclusion_score(genotypes, self.matrix.individual(candidate))? {
                if score <= config.excl_threshold {
                    survivors.push((candidate, score));
                }
            }
        }
        survivors.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        // Keep a compatible recorded parent unless another candidate beats
        // it by more than the tie tolerance.
        let recorded_col = recorded.and_then(|id| self.index.get(id));
        if let Some(pos) = recorded_col.and_then(|c| survivors.iter().position(|s| s.0 == c)) {
            let score = survivors[pos].1;
            let best = survivors[0].1;
            if score <= config.assign_threshold && within(score, best, config.tie_tolerance) {
                let runner_up = survivors
                    .iter()
                    .enumerate()
                    .find(|&(i, _)| i != pos)
                    .map(|(_, s)| s.1);
                return Ok(ParentOutcome {
                    id: recorded.cloned(),
                    status: ParentStatus::Unchanged,
                    score: Some(score),
                    margin: runner_up.map(|r| r - score),
                });
            }
        }

        let Some(&(best_col, best)) = survivors.first() else {
            debug!("{}: no {:?} candidate survives exclusion", entry.id, parent);
            return Ok(ParentOutcome::unresolved(recorded));
        };
        let runner_up = survivors.get(1).map(|s| s.1);
        let ambiguous = runner_up.map_or(false, |r| within(r, best, config.tie_tolerance));

        if best <= config.assign_threshold && !ambiguous {
            debug!(
                "{}: {:?} {} assigned (score {:.4})",
                entry.id,
                parent,
                self.index.id(best_col),
                best
            );
            Ok(ParentOutcome {
                id: Some(self.index.id(best_col).to_string()),
                status: ParentStatus::Resolved,
                score: Some(best),
                margin: runner_up.map(|r| r - best),
            })
        } else {
            debug!(
                "{}: {:?} unresolved (best score {:.4}, ambiguous: {})",
                entry.id, parent, best, ambiguous
            );
            Ok(ParentOutcome::unresolved(recorded))
        }
    }

    /// Whether `candidate` was born early enough to parent an offspring
    /// born at `offspring_birth`. Unknown dates always pass.
    fn born_in_time(&self, candidate: usize, offspring_birth: Option<f64>) -> bool {
        match (self.birth.get(self.index.id(candidate)), offspring_birth) {
            (Some(&cb), Some(ob)) => cb + self.config.min_generation_interval < ob,
            _ => true,
        }
    }
}
