//! breedsim-geno: Genotype storage and I/O for breedsim-rs
//!
//! Provides the disk-backed `GenotypeMatrix` (markers x individuals,
//! one byte per call), an in-memory `DosageMatrix`, the PLINK bed codec,
//! and pedigree table I/O shared by the algorithms in `breedsim-core`.

pub mod bed;
pub mod error;
pub mod matrix;
pub mod parallel;
pub mod pedigree;
pub mod sample;
pub mod traits;

pub use error::GenoError;
pub use matrix::{DosageMatrix, GenotypeMatrix};
pub use traits::{GenotypeSink, GenotypeSource, MISSING};
