//! Typed errors for genotype storage and codec failures.
//!
//! Public functions return `anyhow::Result`; callers that need to react to
//! a specific failure recover it with `err.downcast_ref::<GenoError>()`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenoError {
    #[error("Invalid bed header: {0}")]
    InvalidHeader(String),

    #[error("Dimension mismatch in {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Truncated bed file: marker block {block} is incomplete")]
    Truncated { block: usize },

    #[error("Column index {index} out of bounds ({n_cols} columns)")]
    ColumnOutOfBounds { index: usize, n_cols: usize },

    #[error("Destination column {0} is listed more than once")]
    DuplicateColumn(usize),

    #[error("Duplicate identifier: '{0}'")]
    DuplicateId(String),

    #[error("Invalid dosage {value} at marker {marker}, individual {individual}")]
    InvalidDosage {
        value: i16,
        marker: usize,
        individual: usize,
    },

    #[error("Invalid genotype matrix file {path}: {reason}")]
    InvalidMatrixFile { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GenoError {
    pub fn dimension(what: &'static str, expected: usize, got: usize) -> Self {
        Self::DimensionMismatch {
            what,
            expected,
            got,
        }
    }

    pub fn column(index: usize, n_cols: usize) -> Self {
        Self::ColumnOutOfBounds { index, n_cols }
    }
}
