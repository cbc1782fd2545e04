//! External-merge matrix transposition.
//!
//! The transpose of a matrix with entry `(i, j, v)` has entry `(j, i, v)`.
//! The full transposed row set can exceed memory, so the column-id space is
//! range-partitioned into `merge_fanout` buckets; one pass over the source
//! spills every entry into its bucket's file, then buckets are drained in
//! ascending range order, sorted and streamed through a writer.
//!
//! Range partitioning (rather than hashing) keeps bucket output ascending by
//! new row id, which is exactly what `MatrixWriter` demands. The stable
//! per-bucket sort preserves discovery order within a transposed row: source
//! rows are scanned ascending, so entries of transposed row `j` come out
//! ordered by original row id.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::{MatrixError, MatrixReader, MatrixWriter, SparseRow};

/// One spilled entry: (new row id, new col id, score), 12 bytes on disk.
const SPILL_RECORD_BYTES: usize = 12;

/// Removes spill files when the transpose ends, successfully or not.
struct SpillGuard {
    paths: Vec<PathBuf>,
}

impl Drop for SpillGuard {
    fn drop(&mut self) {
        for path in &self.paths {
            let _ = fs::remove_file(path);
        }
    }
}

/// Write the transpose of `reader` to `out_path`.
///
/// Spill I/O failures surface as [`MatrixError::DiskExhaustion`] and abort the
/// whole operation; no partial output file is ever left at `out_path`.
pub fn transpose(
    reader: &MatrixReader,
    out_path: &Path,
    merge_fanout: usize,
) -> Result<(), MatrixError> {
    if reader.is_empty() {
        MatrixWriter::create(out_path, reader.max_page_bytes())?.finish()?;
        return Ok(());
    }

    let fanout = merge_fanout.max(1);
    let bucket_width = ((reader.max_col() as u64 + 1).div_ceil(fanout as u64)).max(1);

    let spill_paths: Vec<PathBuf> = (0..fanout)
        .map(|b| out_path.with_extension(format!("spill{b}")))
        .collect();
    let guard = SpillGuard {
        paths: spill_paths.clone(),
    };

    spill_entries(reader, &spill_paths, bucket_width)?;

    let mut writer = MatrixWriter::create(out_path, reader.max_page_bytes())?;
    for path in &spill_paths {
        merge_bucket(path, &mut writer)?;
    }
    writer.finish()?;

    drop(guard);
    tracing::debug!(fanout, path = %out_path.display(), "transpose finished");
    Ok(())
}

/// One pass over the source: route every `(row, col, score)` entry to the
/// bucket owning `col`, recorded as `(col, row, score)`.
fn spill_entries(
    reader: &MatrixReader,
    spill_paths: &[PathBuf],
    bucket_width: u64,
) -> Result<(), MatrixError> {
    let mut spills: Vec<BufWriter<File>> = Vec::with_capacity(spill_paths.len());
    for path in spill_paths {
        spills.push(BufWriter::new(
            File::create(path).map_err(MatrixError::DiskExhaustion)?,
        ));
    }

    for row in reader.iter() {
        let row = row?;
        for &(col, score) in row.entries() {
            let bucket = (col as u64 / bucket_width) as usize;
            let spill = &mut spills[bucket];
            let mut record = [0u8; SPILL_RECORD_BYTES];
            record[0..4].copy_from_slice(&col.to_le_bytes());
            record[4..8].copy_from_slice(&row.row_id().to_le_bytes());
            record[8..12].copy_from_slice(&score.to_le_bytes());
            spill
                .write_all(&record)
                .map_err(MatrixError::DiskExhaustion)?;
        }
    }

    for mut spill in spills {
        spill.flush().map_err(MatrixError::DiskExhaustion)?;
    }
    Ok(())
}

/// Sort one bucket by new row id, group, and stream the grouped rows out.
fn merge_bucket(path: &Path, writer: &mut MatrixWriter) -> Result<(), MatrixError> {
    let bytes = fs::read(path).map_err(MatrixError::DiskExhaustion)?;
    if bytes.len() % SPILL_RECORD_BYTES != 0 {
        return Err(MatrixError::Malformed(
            "spill file length is not a whole number of records".to_string(),
        ));
    }

    let mut records: Vec<(u32, u32, f32)> = bytes
        .chunks_exact(SPILL_RECORD_BYTES)
        .map(|r| {
            (
                u32::from_le_bytes([r[0], r[1], r[2], r[3]]),
                u32::from_le_bytes([r[4], r[5], r[6], r[7]]),
                f32::from_le_bytes([r[8], r[9], r[10], r[11]]),
            )
        })
        .collect();
    // Stable: preserves ascending original-row order within each new row.
    records.sort_by_key(|&(new_row, _, _)| new_row);

    let mut pending: Option<(u32, Vec<(u32, f32)>)> = None;
    for (new_row, new_col, score) in records {
        match &mut pending {
            Some((id, entries)) if *id == new_row => entries.push((new_col, score)),
            _ => {
                if let Some((id, entries)) = pending.take() {
                    writer.append(&SparseRow::new(id, entries))?;
                }
                pending = Some((new_row, vec![(new_col, score)]));
            }
        }
    }
    if let Some((id, entries)) = pending {
        writer.append(&SparseRow::new(id, entries))?;
    }
    Ok(())
}
