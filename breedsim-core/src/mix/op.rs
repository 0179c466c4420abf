//! Elementwise operations for combining genotype cells.

use serde::{Deserialize, Serialize};

use breedsim_geno::traits::is_dosage;
use breedsim_geno::MISSING;

/// How a source cell is combined into a destination cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MixOp {
    /// Overwrite with the source cell, missing included.
    #[default]
    Assign,
    Add,
    Subtract,
    Multiply,
    Min,
    Max,
}

impl MixOp {
    /// Combine `dest` with `src`. The result is widened so callers can
    /// detect values outside the dosage range.
    ///
    /// Every operation other than `Assign` yields missing when either
    /// operand is missing.
    #[inline]
    pub fn apply(self, dest: i8, src: i8) -> i16 {
        match self {
            MixOp::Assign => src as i16,
            _ if !is_dosage(dest) || !is_dosage(src) => MISSING as i16,
            MixOp::Add => dest as i16 + src as i16,
            MixOp::Subtract => dest as i16 - src as i16,
            MixOp::Multiply => dest as i16 * src as i16,
            MixOp::Min => dest.min(src) as i16,
            MixOp::Max => dest.max(src) as i16,
        }
    }
}

/// Narrow an operation result back to a cell, `None` when it is neither a
/// dosage nor missing.
#[inline]
pub fn checked_cell(value: i16) -> Option<i8> {
    match value {
        0..=2 => Some(value as i8),
        v if v == MISSING as i16 => Some(MISSING),
        _ => None,
    }
}
