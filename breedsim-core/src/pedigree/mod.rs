//! Pedigree resolver: confirm, replace or fill in recorded parents from
//! genotype exclusion scores.

pub mod exclusion;
pub mod resolver;

pub use exclusion::exclusion_score;
pub use resolver::{correct_pedigree, ResolverConfig};
