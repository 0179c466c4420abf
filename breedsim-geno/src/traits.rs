//! Core traits for genotype matrices.

/// Sentinel stored in a cell whose genotype call is missing.
pub const MISSING: i8 = i8::MIN;

/// Whether `value` is a called dosage (0, 1 or 2 copies).
#[inline]
pub fn is_dosage(value: i8) -> bool {
    (0..=2).contains(&value)
}

/// Whether `value` is one of the four admissible cell states.
#[inline]
pub fn is_valid_cell(value: i8) -> bool {
    value == MISSING || is_dosage(value)
}

/// Read access to a genotype matrix with markers as rows and individuals
/// as columns, stored column-major.
///
/// Implemented by the disk-backed `GenotypeMatrix` and the in-memory
/// `DosageMatrix`, so every algorithm accepts either as input. The `Sync`
/// bound lets worker threads share a matrix for concurrent reads.
pub trait GenotypeSource: Sync {
    /// Number of markers (rows).
    fn n_markers(&self) -> usize;

    /// Number of individuals (columns).
    fn n_individuals(&self) -> usize;

    /// All cells in column-major order.
    fn cells(&self) -> &[i8];

    /// Genotype vector of one individual across all markers.
    fn individual(&self, index: usize) -> &[i8] {
        let m = self.n_markers();
        &self.cells()[index * m..(index + 1) * m]
    }

    /// Cell at (marker, individual).
    fn get(&self, marker: usize, individual: usize) -> i8 {
        self.cells()[individual * self.n_markers() + marker]
    }
}

/// Write access for destination matrices.
///
/// Writers split `cells_mut` into disjoint column chunks before handing
/// them to worker threads; nothing else is shared mutably.
pub trait GenotypeSink: GenotypeSource + Send {
    /// All cells in column-major order, mutable.
    fn cells_mut(&mut self) -> &mut [i8];

    /// Set the cell at (marker, individual).
    fn set(&mut self, marker: usize, individual: usize, value: i8) {
        let m = self.n_markers();
        self.cells_mut()[individual * m + marker] = value;
    }
}
