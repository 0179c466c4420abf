//! breedsim-core: Genotype-matrix algorithms for breedsim-rs
//!
//! Implements quality-control filtering, elementwise matrix merging,
//! block-recombination mating simulation, and genotype-based pedigree
//! correction on top of the matrices from `breedsim-geno`.

pub mod mating;
pub mod mix;
pub mod pedigree;
pub mod qc;
pub mod util;
