//! Identifier lookup for genotyped individuals.
//!
//! Matrix columns carry no names; callers supply one identifier per
//! column and everything else refers to individuals by identifier.

use std::collections::HashMap;

use anyhow::Result;

use crate::error::GenoError;

/// Bidirectional map between identifiers and matrix column indices.
#[derive(Debug, Clone)]
pub struct IdIndex {
    ids: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl IdIndex {
    /// Build the index. Duplicate identifiers are rejected.
    pub fn new(ids: &[String]) -> Result<Self> {
        let mut lookup = HashMap::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            if lookup.insert(id.clone(), i).is_some() {
                return Err(GenoError::DuplicateId(id.clone()).into());
            }
        }
        Ok(Self {
            ids: ids.to_vec(),
            lookup,
        })
    }

    /// Column index of `id`, if genotyped.
    pub fn get(&self, id: &str) -> Option<usize> {
        self.lookup.get(id).copied()
    }

    /// Identifier of column `index`.
    pub fn id(&self, index: usize) -> &str {
        &self.ids[index]
    }

    /// Column indices of the genotyped identifiers in `ids`, in input
    /// order, skipping unknown and repeated identifiers.
    pub fn resolve(&self, ids: &[String]) -> Vec<usize> {
        let mut seen = vec![false; self.ids.len()];
        let mut indices = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(i) = self.get(id) {
                if !seen[i] {
                    seen[i] = true;
                    indices.push(i);
                }
            }
        }
        indices
    }
}
