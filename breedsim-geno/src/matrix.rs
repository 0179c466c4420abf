//! Genotype matrix storage.
//!
//! `GenotypeMatrix` is a memory-mapped markers x individuals matrix with
//! one signed byte per call, laid out column-major so that each
//! individual's genotype vector is a single contiguous slice. File-backed
//! matrices carry a 32-byte descriptor:
//!
//! | offset | size | field                 |
//! |--------|------|-----------------------|
//! | 0      | 4    | magic `GMAT`          |
//! | 4      | 4    | version (u32 LE)      |
//! | 8      | 8    | n_markers (u64 LE)    |
//! | 16     | 8    | n_individuals (u64 LE)|
//! | 24     | 8    | reserved              |
//!
//! `DosageMatrix` is the plain in-memory counterpart.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use memmap2::MmapMut;

use crate::error::GenoError;
use crate::traits::{GenotypeSink, GenotypeSource, MISSING};

const MAGIC: [u8; 4] = *b"GMAT";
const VERSION: u32 = 1;
/// Size of the descriptor preceding the cells of a file-backed matrix.
pub const DESCRIPTOR_LEN: usize = 32;

/// Disk-backed genotype matrix (markers x individuals).
///
/// The handle owns its mapping; readers borrow it shared, writers borrow
/// it mutably. Dimensions are fixed at creation.
pub struct GenotypeMatrix {
    mmap: MmapMut,
    /// Byte offset of the first cell inside the mapping.
    offset: usize,
    n_markers: usize,
    n_individuals: usize,
    /// Backing file, `None` for anonymous (scratch) matrices.
    path: Option<PathBuf>,
}

impl GenotypeMatrix {
    /// Create a new file-backed matrix with every cell set to missing.
    /// An existing file at `path` is truncated.
    pub fn create<P: AsRef<Path>>(path: P, n_markers: usize, n_individuals: usize) -> Result<Self> {
        let path = path.as_ref();
        let n_cells = cell_count(n_markers, n_individuals)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to create matrix file: {}", path.display()))?;
        file.set_len((DESCRIPTOR_LEN + n_cells) as u64)
            .with_context(|| format!("Failed to size matrix file: {}", path.display()))?;

        let mut mmap = unsafe { MmapMut::map_mut(&file)? };
        write_descriptor(&mut mmap[..DESCRIPTOR_LEN], n_markers, n_individuals);
        mmap[DESCRIPTOR_LEN..].fill(MISSING as u8);

        Ok(Self {
            mmap,
            offset: DESCRIPTOR_LEN,
            n_markers,
            n_individuals,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an existing file-backed matrix for reading and writing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open matrix file: {}", path.display()))?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        let invalid = |reason: String| GenoError::InvalidMatrixFile {
            path: path.to_path_buf(),
            reason,
        };

        if mmap.len() < DESCRIPTOR_LEN {
            return Err(invalid(format!("file is only {} bytes", mmap.len())).into());
        }
        if mmap[0..4] != MAGIC {
            return Err(invalid("bad magic bytes".to_string()).into());
        }
        let version = u32::from_le_bytes(mmap[4..8].try_into()?);
        if version != VERSION {
            return Err(invalid(format!("unsupported version {}", version)).into());
        }
        let n_markers = u64::from_le_bytes(mmap[8..16].try_into()?) as usize;
        let n_individuals = u64::from_le_bytes(mmap[16..24].try_into()?) as usize;
        let n_cells = cell_count(n_markers, n_individuals)?;
        if mmap.len() != DESCRIPTOR_LEN + n_cells {
            return Err(invalid(format!(
                "expected {} bytes for {} x {} cells, found {}",
                DESCRIPTOR_LEN + n_cells,
                n_markers,
                n_individuals,
                mmap.len()
            ))
            .into());
        }

        Ok(Self {
            mmap,
            offset: DESCRIPTOR_LEN,
            n_markers,
            n_individuals,
            path: Some(path.to_path_buf()),
        })
    }

    /// Create a matrix backed by anonymous memory, every cell missing.
    pub fn anonymous(n_markers: usize, n_individuals: usize) -> Result<Self> {
        let n_cells = cell_count(n_markers, n_individuals)?;
        // Zero-length maps are rejected on some platforms.
        let mut mmap = MmapMut::map_anon(n_cells.max(1))?;
        mmap.fill(MISSING as u8);
        Ok(Self {
            mmap,
            offset: 0,
            n_markers,
            n_individuals,
            path: None,
        })
    }

    /// Copy any genotype source into a new anonymous matrix.
    pub fn from_source<S: GenotypeSource + ?Sized>(source: &S) -> Result<Self> {
        let mut matrix = Self::anonymous(source.n_markers(), source.n_individuals())?;
        matrix.cells_mut().copy_from_slice(source.cells());
        Ok(matrix)
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write dirty pages back to the backing file.
    pub fn flush(&self) -> Result<()> {
        if let Some(path) = &self.path {
            self.mmap
                .flush()
                .with_context(|| format!("Failed to flush matrix file: {}", path.display()))?;
        }
        Ok(())
    }

    /// Flush and release the mapping.
    pub fn close(self) -> Result<()> {
        self.flush()
    }

    /// Copy the cells into an in-memory matrix.
    pub fn to_dosage_matrix(&self) -> DosageMatrix {
        DosageMatrix::from_col_major(self.n_markers, self.n_individuals, self.cells().to_vec())
    }

    fn n_cells(&self) -> usize {
        self.n_markers * self.n_individuals
    }
}

impl GenotypeSource for GenotypeMatrix {
    fn n_markers(&self) -> usize {
        self.n_markers
    }

    fn n_individuals(&self) -> usize {
        self.n_individuals
    }

    fn cells(&self) -> &[i8] {
        bytemuck::cast_slice(&self.mmap[self.offset..self.offset + self.n_cells()])
    }
}

impl GenotypeSink for GenotypeMatrix {
    fn cells_mut(&mut self) -> &mut [i8] {
        let end = self.offset + self.n_cells();
        bytemuck::cast_slice_mut(&mut self.mmap[self.offset..end])
    }
}

impl std::fmt::Debug for GenotypeMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenotypeMatrix")
            .field("n_markers", &self.n_markers)
            .field("n_individuals", &self.n_individuals)
            .field("path", &self.path)
            .finish()
    }
}

fn cell_count(n_markers: usize, n_individuals: usize) -> Result<usize> {
    n_markers
        .checked_mul(n_individuals)
        .and_then(|n| n.checked_add(DESCRIPTOR_LEN))
        .map(|n| n - DESCRIPTOR_LEN)
        .ok_or_else(|| anyhow!("Matrix of {} x {} cells is too large", n_markers, n_individuals))
}

fn write_descriptor(buf: &mut [u8], n_markers: usize, n_individuals: usize) {
    buf[0..4].copy_from_slice(&MAGIC);
    buf[4..8].copy_from_slice(&VERSION.to_le_bytes());
    buf[8..16].copy_from_slice(&(n_markers as u64).to_le_bytes());
    buf[16..24].copy_from_slice(&(n_individuals as u64).to_le_bytes());
    buf[24..32].fill(0);
}

/// In-memory genotype matrix (markers x individuals, column-major).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DosageMatrix {
    n_markers: usize,
    n_individuals: usize,
    data: Vec<i8>,
}

impl DosageMatrix {
    /// Create a matrix with every cell missing.
    pub fn missing(n_markers: usize, n_individuals: usize) -> Self {
        Self {
            n_markers,
            n_individuals,
            data: vec![MISSING; n_markers * n_individuals],
        }
    }

    /// Create from a flat vec in column-major order.
    pub fn from_col_major(n_markers: usize, n_individuals: usize, data: Vec<i8>) -> Self {
        assert_eq!(data.len(), n_markers * n_individuals);
        Self {
            n_markers,
            n_individuals,
            data,
        }
    }

    /// Create from one row per marker.
    pub fn from_marker_rows(rows: &[Vec<i8>]) -> Self {
        let n_markers = rows.len();
        let n_individuals = rows.first().map_or(0, |r| r.len());
        let mut data = vec![MISSING; n_markers * n_individuals];
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), n_individuals);
            for (j, &v) in row.iter().enumerate() {
                data[j * n_markers + i] = v;
            }
        }
        Self {
            n_markers,
            n_individuals,
            data,
        }
    }

    /// Extract one marker across all individuals.
    pub fn marker(&self, index: usize) -> Vec<i8> {
        (0..self.n_individuals)
            .map(|j| self.data[j * self.n_markers + index])
            .collect()
    }

    pub fn into_vec(self) -> Vec<i8> {
        self.data
    }
}

impl GenotypeSource for DosageMatrix {
    fn n_markers(&self) -> usize {
        self.n_markers
    }

    fn n_individuals(&self) -> usize {
        self.n_individuals
    }

    fn cells(&self) -> &[i8] {
        &self.data
    }
}

impl GenotypeSink for DosageMatrix {
    fn cells_mut(&mut self) -> &mut [i8] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_is_all_missing() {
        let dir = tempfile::tempdir().unwrap();
        let matrix = GenotypeMatrix::create(dir.path().join("g.gmat"), 3, 5).unwrap();
        assert_eq!(matrix.n_markers(), 3);
        assert_eq!(matrix.n_individuals(), 5);
        assert!(matrix.cells().iter().all(|&c| c == MISSING));
    }

    #[test]
    fn test_reopen_preserves_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.gmat");

        let mut matrix = GenotypeMatrix::create(&path, 2, 3).unwrap();
        matrix.set(0, 0, 2);
        matrix.set(1, 2, 1);
        matrix.close().unwrap();

        let reopened = GenotypeMatrix::open(&path).unwrap();
        assert_eq!(reopened.n_markers(), 2);
        assert_eq!(reopened.n_individuals(), 3);
        assert_eq!(reopened.get(0, 0), 2);
        assert_eq!(reopened.get(1, 2), 1);
        assert_eq!(reopened.get(1, 0), MISSING);
        assert_eq!(reopened.individual(2), &[MISSING, 1]);
    }

    #[test]
    fn test_open_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_a_matrix");
        std::fs::write(&path, vec![0u8; 40]).unwrap();

        let err = GenotypeMatrix::open(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GenoError>(),
            Some(GenoError::InvalidMatrixFile { .. })
        ));
    }

    #[test]
    fn test_open_rejects_resized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.gmat");
        GenotypeMatrix::create(&path, 4, 4).unwrap().close().unwrap();

        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len((DESCRIPTOR_LEN + 10) as u64).unwrap();
        drop(file);

        assert!(GenotypeMatrix::open(&path).is_err());
    }

    #[test]
    fn test_anonymous_empty() {
        let matrix = GenotypeMatrix::anonymous(0, 7).unwrap();
        assert!(matrix.cells().is_empty());
        assert!(matrix.path().is_none());
    }

    #[test]
    fn test_dosage_matrix_layout() {
        let m = DosageMatrix::from_marker_rows(&[vec![0, 1, 2], vec![2, MISSING, 0]]);
        assert_eq!(m.n_markers(), 2);
        assert_eq!(m.n_individuals(), 3);
        assert_eq!(m.individual(1), &[1, MISSING]);
        assert_eq!(m.marker(1), vec![2, MISSING, 0]);
        assert_eq!(m.get(0, 2), 2);

        let copy = GenotypeMatrix::from_source(&m).unwrap();
        assert_eq!(copy.to_dosage_matrix(), m);
    }
}
