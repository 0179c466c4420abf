//! Hardy-Weinberg equilibrium tests.
//!
//! The exact test enumerates heterozygote counts for fixed allele counts
//! (Wigginton, Cutler & Abecasis 2005, AJHG 76:887) and sums the
//! probabilities of all configurations no more likely than the observed
//! one. The chi-square test compares observed genotype classes with
//! their expected Hardy-Weinberg proportions on one degree of freedom.

use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Exact HWE p-value for the observed heterozygote and homozygote counts.
///
/// Returns 1 when no genotypes are observed.
pub fn hwe_exact_pvalue(obs_het: u64, obs_hom1: u64, obs_hom2: u64) -> f64 {
    let genotypes = obs_het + obs_hom1 + obs_hom2;
    if genotypes == 0 {
        return 1.0;
    }

    let obs_homr = obs_hom1.min(obs_hom2);
    let obs_homc = obs_hom1.max(obs_hom2);
    let rare_copies = 2 * obs_homr + obs_het;
    debug_assert!(obs_homc + obs_homr + obs_het == genotypes);

    let mut het_probs = vec![0.0f64; rare_copies as usize + 1];

    // Start at the most likely heterozygote count; its parity must match
    // the number of rare alleles.
    let mut mid = rare_copies * (2 * genotypes - rare_copies) / (2 * genotypes);
    if (rare_copies & 1) != (mid & 1) {
        mid += 1;
    }

    let mut curr_hets = mid;
    let mut curr_homr = (rare_copies - mid) / 2;
    let mut curr_homc = genotypes - curr_hets - curr_homr;
    het_probs[mid as usize] = 1.0;
    let mut sum = 1.0;

    while curr_hets > 1 {
        let p = het_probs[curr_hets as usize] * (curr_hets * (curr_hets - 1)) as f64
            / (4 * (curr_homr + 1) * (curr_homc + 1)) as f64;
        het_probs[curr_hets as usize - 2] = p;
        sum += p;
        curr_hets -= 2;
        curr_homr += 1;
        curr_homc += 1;
    }

    curr_hets = mid;
    curr_homr = (rare_copies - mid) / 2;
    curr_homc = genotypes - curr_hets - curr_homr;
    while curr_hets + 2 <= rare_copies {
        let p = het_probs[curr_hets as usize] * (4 * curr_homr * curr_homc) as f64
            / ((curr_hets + 2) * (curr_hets + 1)) as f64;
        het_probs[curr_hets as usize + 2] = p;
        sum += p;
        curr_hets += 2;
        curr_homr -= 1;
        curr_homc -= 1;
    }

    let observed = het_probs[obs_het as usize];
    let pvalue: f64 = het_probs
        .iter()
        .filter(|&&p| p <= observed * (1.0 + 1e-8))
        .sum::<f64>()
        / sum;

    pvalue.min(1.0)
}

/// Pearson chi-square statistic for HWE from genotype class counts
/// (`n0`, `n1`, `n2` individuals with dosage 0, 1, 2).
///
/// Classes with zero expectation contribute nothing, so a monomorphic
/// marker yields 0.
pub fn hwe_chisq_statistic(n0: u64, n1: u64, n2: u64) -> f64 {
    let n = (n0 + n1 + n2) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let p = (n1 + 2 * n2) as f64 / (2.0 * n);
    let q = 1.0 - p;
    let expected = [n * q * q, 2.0 * n * p * q, n * p * p];
    let observed = [n0 as f64, n1 as f64, n2 as f64];

    expected
        .iter()
        .zip(observed.iter())
        .filter(|(&e, _)| e > 1e-12)
        .map(|(&e, &o)| (o - e).powi(2) / e)
        .sum()
}

/// Upper-tail p-value of a 1-df chi-square statistic.
pub fn chisq_pvalue(chi2: &ChiSquared, statistic: f64) -> f64 {
    (1.0 - chi2.cdf(statistic)).clamp(0.0, 1.0)
}
