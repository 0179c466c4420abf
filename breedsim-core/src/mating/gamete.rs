//! Gamete formation for dosage-only parents.
//!
//! Without phase, a dosage `d` is split into two pseudo-haplotype copies
//! `min(d, 1)` and `d - min(d, 1)`, so a heterozygote carries one of each
//! allele and a homozygote two identical copies.

use breedsim_geno::traits::is_dosage;
use breedsim_geno::MISSING;

/// Allele a parent with dosage `dosage` passes on from the selected copy.
#[inline]
pub fn transmitted_allele(dosage: i8, second_copy: bool) -> i8 {
    let first = dosage.min(1);
    if second_copy {
        dosage - first
    } else {
        first
    }
}

/// Offspring dosage from the two parental calls and the copy each parent
/// transmits. Missing if either parent is missing.
#[inline]
pub fn offspring_dosage(sire: i8, dam: i8, sire_copy: bool, dam_copy: bool) -> i8 {
    if !is_dosage(sire) || !is_dosage(dam) {
        return MISSING;
    }
    transmitted_allele(sire, sire_copy) + transmitted_allele(dam, dam_copy)
}

/// Boundaries of `n_block` contiguous marker blocks over `n_markers`
/// markers: block `k` spans `bounds[k]..bounds[k + 1]`.
///
/// `n_block` is clamped to `1..=n_markers`, so every block is non-empty.
pub fn block_bounds(n_markers: usize, n_block: usize) -> Vec<usize> {
    let n_block = n_block.clamp(1, n_markers.max(1));
    (0..=n_block).map(|k| k * n_markers / n_block).collect()
}

/// Whether `child` is a dosage two parents with dosages `sire` and `dam`
/// could produce.
pub fn is_mendelian(sire: i8, dam: i8, child: i8) -> bool {
    if !is_dosage(sire) || !is_dosage(dam) {
        return child == MISSING;
    }
    [false, true].iter().any(|&s| {
        [false, true]
            .iter()
            .any(|&d| offspring_dosage(sire, dam, s, d) == child)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pseudo_haplotypes() {
        assert_eq!((transmitted_allele(0, false), transmitted_allele(0, true)), (0, 0));
        assert_eq!((transmitted_allele(1, false), transmitted_allele(1, true)), (1, 0));
        assert_eq!((transmitted_allele(2, false), transmitted_allele(2, true)), (1, 1));
    }

    #[test]
    fn test_offspring_dosage_fixed_crosses() {
        for (s, d) in [(false, false), (false, true), (true, false), (true, true)] {
            assert_eq!(offspring_dosage(0, 2, s, d), 1);
            assert_eq!(offspring_dosage(0, 0, s, d), 0);
            assert_eq!(offspring_dosage(2, 2, s, d), 2);
            assert_eq!(offspring_dosage(MISSING, 1, s, d), MISSING);
        }
    }

    #[test]
    fn test_block_bounds() {
        assert_eq!(block_bounds(10, 3), vec![0, 3, 6, 10]);
        assert_eq!(block_bounds(3, 10), vec![0, 1, 2, 3]);
        assert_eq!(block_bounds(5, 0), vec![0, 5]);
        assert_eq!(block_bounds(0, 4), vec![0, 0]);
    }

    #[test]
    fn test_is_mendelian() {
        assert!(is_mendelian(1, 1, 0));
        assert!(is_mendelian(1, 1, 2));
        assert!(!is_mendelian(0, 2, 2));
        assert!(!is_mendelian(0, 0, 1));
        assert!(is_mendelian(MISSING, 0, MISSING));
        assert!(!is_mendelian(MISSING, 0, 0));
    }
}
