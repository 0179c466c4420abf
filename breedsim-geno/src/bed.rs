//! PLINK bed codec for genotype matrices.
//!
//! A bed file is a 3-byte header followed by one block per marker:
//! - magic `0x6C 0x1B`, mode byte `0x01` (SNP-major)
//! - each block is `ceil(n_individuals / 4)` bytes, four calls per byte,
//!   individual `j` at bits `2 * (j % 4)` (least significant first)
//! - unused trailing bits of a block are zero
//!
//! Decoding streams at most `max_line` blocks per pass. Workers own
//! individual ranges starting at multiples of four, so each packed byte
//! is touched by exactly one worker. Encoding gives each worker whole
//! marker blocks and writes the buffer serially in marker order.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::GenoError;
use crate::parallel::{build_pool, partition_len};
use crate::traits::{GenotypeSink, GenotypeSource, MISSING};

pub const BED_MAGIC: [u8; 2] = [0x6C, 0x1B];
/// Mode byte for SNP-major (marker-major) files.
pub const SNP_MAJOR: u8 = 0x01;
pub const HEADER_LEN: usize = 3;

/// Upper bound on the encode buffer, in bytes.
const WRITE_BUFFER_BYTES: usize = 64 << 20;

const CODE_HOM_A1: u8 = 0b00;
const CODE_MISSING: u8 = 0b01;
const CODE_HET: u8 = 0b10;
const CODE_HOM_A2: u8 = 0b11;

/// Dosage for each 2-bit code, indexed by the code.
const DECODE_TABLE: [i8; 4] = [2, MISSING, 1, 0];

/// Decode the genotype of the call at `offset` (0..4) within `byte`.
#[inline]
pub fn decode_genotype(byte: u8, offset: usize) -> i8 {
    DECODE_TABLE[((byte >> (offset * 2)) & 0x03) as usize]
}

/// 2-bit code of a cell, `None` if the cell is not a valid state.
#[inline]
pub fn encode_genotype(value: i8) -> Option<u8> {
    match value {
        2 => Some(CODE_HOM_A1),
        1 => Some(CODE_HET),
        0 => Some(CODE_HOM_A2),
        MISSING => Some(CODE_MISSING),
        _ => None,
    }
}

/// Number of bytes per marker block.
#[inline]
pub fn bytes_per_marker(n_individuals: usize) -> usize {
    n_individuals.div_ceil(4)
}

/// Low bit of every 2-bit field of `byte` that holds the missing code.
#[inline]
fn missing_fields(byte: u8) -> u8 {
    byte & !(byte >> 1) & 0x55
}

/// Serialize the full matrix to a bed file.
pub fn write_bed<S, P>(matrix: &S, path: P, threads: usize, verbose: bool) -> Result<()>
where
    S: GenotypeSource + ?Sized,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let m = matrix.n_markers();
    let n = matrix.n_individuals();
    let bpm = bytes_per_marker(n);

    if verbose {
        info!("Writing {} markers x {} individuals to {}", m, n, path.display());
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create bed file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&BED_MAGIC)?;
    writer.write_all(&[SNP_MAJOR])?;

    if bpm > 0 && m > 0 {
        let pool = build_pool(threads)?;
        let batch = (WRITE_BUFFER_BYTES / bpm).clamp(1, m);
        let mut buffer = vec![0u8; batch * bpm];

        let mut start = 0;
        while start < m {
            let len = batch.min(m - start);
            let out = &mut buffer[..len * bpm];
            out.fill(0);

            let blocks_per_worker = partition_len(len, pool.current_num_threads(), 1);
            pool.install(|| {
                out.par_chunks_mut(blocks_per_worker * bpm)
                    .enumerate()
                    .try_for_each(|(chunk_idx, chunk)| {
                        encode_markers(matrix, start + chunk_idx * blocks_per_worker, chunk, bpm)
                    })
            })?;

            writer.write_all(out)?;
            debug!("Encoded markers {}..{}", start, start + len);
            start += len;
        }
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write bed file: {}", path.display()))?;

    if verbose {
        info!("Bed file written: {}", path.display());
    }
    Ok(())
}

/// Pack the blocks of markers `first..` into `blocks`, walking each
/// individual's column once so reads stay sequential.
fn encode_markers<S: GenotypeSource + ?Sized>(
    matrix: &S,
    first: usize,
    blocks: &mut [u8],
    bpm: usize,
) -> std::result::Result<(), GenoError> {
    let count = blocks.len() / bpm;
    for j in 0..matrix.n_individuals() {
        let column = &matrix.individual(j)[first..first + count];
        let (byte_idx, shift) = (j / 4, (j % 4) * 2);
        for (k, &value) in column.iter().enumerate() {
            let code = encode_genotype(value).ok_or(GenoError::InvalidDosage {
                value: value as i16,
                marker: first + k,
                individual: j,
            })?;
            blocks[k * bpm + byte_idx] |= code << shift;
        }
    }
    Ok(())
}

/// Deserialize a bed file into a pre-allocated matrix.
///
/// The file must hold exactly `matrix.n_markers()` blocks sized for
/// `matrix.n_individuals()`. `max_line` bounds the number of marker blocks
/// buffered per pass; 0 buffers the whole file.
pub fn read_bed<S, P>(
    path: P,
    matrix: &mut S,
    max_line: usize,
    threads: usize,
    verbose: bool,
) -> Result<()>
where
    S: GenotypeSink + ?Sized,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let m = matrix.n_markers();
    let n = matrix.n_individuals();
    let bpm = bytes_per_marker(n);

    let (mut reader, file_len) = open_bed(path)?;
    check_layout(file_len, m, bpm)?;

    if verbose {
        info!("Reading {} markers x {} individuals from {}", m, n, path.display());
    }
    if m == 0 || n == 0 {
        return Ok(());
    }

    let pool = build_pool(threads)?;
    let batch = if max_line == 0 { m } else { max_line.min(m) };
    let mut buffer = vec![0u8; batch * bpm];
    let cols_per_worker = partition_len(n, pool.current_num_threads(), 4);

    let mut start = 0;
    while start < m {
        let len = batch.min(m - start);
        let buf = &mut buffer[..len * bpm];
        fill_blocks(&mut reader, buf, bpm, start)?;
        let buf = &*buf;

        let cells = matrix.cells_mut();
        pool.install(|| {
            cells
                .par_chunks_mut(cols_per_worker * m)
                .enumerate()
                .for_each(|(chunk_idx, chunk)| {
                    let first_col = chunk_idx * cols_per_worker;
                    for (jj, column) in chunk.chunks_mut(m).enumerate() {
                        let j = first_col + jj;
                        let (byte_idx, offset) = (j / 4, j % 4);
                        for k in 0..len {
                            column[start + k] = decode_genotype(buf[k * bpm + byte_idx], offset);
                        }
                    }
                });
        });

        debug!("Decoded markers {}..{}", start, start + len);
        start += len;
    }

    if verbose {
        info!("Bed file loaded: {}", path.display());
    }
    Ok(())
}

/// Whether any cell of the matrix is missing.
pub fn has_missing<S: GenotypeSource + ?Sized>(matrix: &S, threads: usize) -> Result<bool> {
    let cells = matrix.cells();
    if cells.is_empty() {
        return Ok(false);
    }
    let pool = build_pool(threads)?;
    let chunk = partition_len(cells.len(), pool.current_num_threads(), 1);
    Ok(pool.install(|| cells.par_chunks(chunk).any(|c| c.contains(&MISSING))))
}

/// Whether a bed file with `n_individuals` per block holds any missing
/// call. Stops at the first batch containing one.
pub fn has_missing_in_bed<P: AsRef<Path>>(
    path: P,
    n_individuals: usize,
    max_line: usize,
    threads: usize,
    verbose: bool,
) -> Result<bool> {
    let path = path.as_ref();
    let bpm = bytes_per_marker(n_individuals);
    let (mut reader, file_len) = open_bed(path)?;
    let m = markers_in_payload(file_len, bpm)?;

    if verbose {
        info!("Scanning {} markers in {} for missing calls", m, path.display());
    }
    if m == 0 || bpm == 0 {
        return Ok(false);
    }

    let pool = build_pool(threads)?;
    let batch = if max_line == 0 { m } else { max_line.min(m) };
    let mut buffer = vec![0u8; batch * bpm];
    let last_mask = match n_individuals % 4 {
        0 => 0x55,
        rem => 0x55 & ((1u8 << (rem * 2)) - 1),
    };

    let mut start = 0;
    while start < m {
        let len = batch.min(m - start);
        let buf = &mut buffer[..len * bpm];
        fill_blocks(&mut reader, buf, bpm, start)?;
        let buf = &*buf;

        let blocks_per_worker = partition_len(len, pool.current_num_threads(), 1);
        let found = pool.install(|| {
            buf.par_chunks(blocks_per_worker * bpm).any(|chunk| {
                chunk.chunks(bpm).any(|block| match block.split_last() {
                    Some((last, full)) => {
                        full.iter().any(|&b| missing_fields(b) != 0)
                            || missing_fields(*last) & last_mask != 0
                    }
                    None => false,
                })
            })
        });
        if found {
            if verbose {
                info!("Missing call found within markers {}..{}", start, start + len);
            }
            return Ok(true);
        }
        start += len;
    }
    Ok(false)
}

/// Open a bed file and validate its header. Returns the reader positioned
/// at the first block and the total file length.
fn open_bed(path: &Path) -> Result<(BufReader<File>, u64)> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open bed file: {}", path.display()))?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    if file_len < HEADER_LEN as u64 {
        return Err(GenoError::InvalidHeader(format!("file is only {} bytes", file_len)).into());
    }
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header)?;
    if header[..2] != BED_MAGIC {
        return Err(GenoError::InvalidHeader(format!(
            "bad magic number {:#04x} {:#04x}",
            header[0], header[1]
        ))
        .into());
    }
    if header[2] != SNP_MAJOR {
        return Err(GenoError::InvalidHeader(format!(
            "mode byte {:#04x}, only SNP-major (0x01) files are supported",
            header[2]
        ))
        .into());
    }
    Ok((reader, file_len))
}

/// Validate that the payload holds exactly `m` blocks of `bpm` bytes.
fn check_layout(file_len: u64, m: usize, bpm: usize) -> std::result::Result<(), GenoError> {
    let payload = (file_len - HEADER_LEN as u64) as usize;
    let expected = m * bpm;
    if payload == expected {
        return Ok(());
    }
    if bpm == 0 {
        return Err(GenoError::dimension("bed payload bytes", 0, payload));
    }
    if payload % bpm == 0 {
        Err(GenoError::dimension("bed marker count", m, payload / bpm))
    } else if payload < expected {
        Err(GenoError::Truncated {
            block: payload / bpm,
        })
    } else {
        Err(GenoError::dimension("bed payload bytes", expected, payload))
    }
}

fn markers_in_payload(file_len: u64, bpm: usize) -> std::result::Result<usize, GenoError> {
    let payload = (file_len - HEADER_LEN as u64) as usize;
    if bpm == 0 {
        return if payload == 0 {
            Ok(0)
        } else {
            Err(GenoError::dimension("bed payload bytes", 0, payload))
        };
    }
    if payload % bpm != 0 {
        return Err(GenoError::Truncated {
            block: payload / bpm,
        });
    }
    Ok(payload / bpm)
}

/// Fill `buf` with whole blocks, reporting the first incomplete block
/// (numbered from `first_block`) if the stream ends early.
fn fill_blocks<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    bpm: usize,
    first_block: usize,
) -> std::result::Result<(), GenoError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(GenoError::Truncated {
                    block: first_block + filled / bpm,
                })
            }
            Ok(k) => filled += k,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
