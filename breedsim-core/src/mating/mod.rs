//! Mating simulator: one offspring per sire/dam pair with block-level
//! recombination.

pub mod gamete;
pub mod simulate;

pub use gamete::is_mendelian;
pub use simulate::{simulate_mating, MatingConfig};
