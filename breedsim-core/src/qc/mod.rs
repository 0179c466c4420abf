//! Genotype quality control.
//!
//! Per-marker call rate, minor-allele frequency and Hardy-Weinberg
//! filters, followed by a per-individual call-rate filter evaluated on
//! the surviving markers.

pub mod filter;
pub mod hwe;

pub use filter::{filter_genotypes, HweTest, QcConfig, QcReport};
