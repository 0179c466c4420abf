//! Matrix mixer: combine a source matrix into a destination matrix cell by
//! cell, optionally through a destination column map.

pub mod merge;
pub mod op;

pub use merge::{merge, merge_from_matrix, merge_from_memory};
pub use op::MixOp;
