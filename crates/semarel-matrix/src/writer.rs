//! Streaming matrix writer.

use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use ahash::AHashSet;

use crate::format::{MatrixHeader, PageSpan, RowLocation, FORMAT_VERSION, MAGIC_NUMBER};
use crate::{MatrixError, SparseRow};

/// Serializes a stream of ascending-id sparse rows into a paged `.smx` file.
///
/// Rows accumulate into an in-memory page buffer; when appending a row would
/// push the buffer past `max_page_bytes` the page is flushed and the row opens
/// the next page, so a row never straddles a page boundary. `finish()` writes
/// the page table, the row index and finally the header, then renames the
/// temporary file into place. Until that rename the output path holds nothing
/// a reader would accept.
pub struct MatrixWriter {
    file: BufWriter<File>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    max_page_bytes: usize,
    page_buf: Vec<u8>,
    pages: Vec<PageSpan>,
    index: Vec<RowLocation>,
    /// Next body write position in the file.
    pos: u64,
    last_row: Option<u32>,
    max_col: u32,
    finished: bool,
}

impl MatrixWriter {
    pub fn create(path: &Path, max_page_bytes: usize) -> Result<Self, MatrixError> {
        let tmp_path = path.with_extension("smx.tmp");
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = BufWriter::new(File::create(&tmp_path)?);
        // Placeholder header; the real one lands here on finish().
        file.write_all(&[0u8; MatrixHeader::SIZE])?;

        Ok(Self {
            file,
            tmp_path,
            final_path: path.to_path_buf(),
            max_page_bytes: max_page_bytes.max(1),
            page_buf: Vec::new(),
            pages: Vec::new(),
            index: Vec::new(),
            pos: MatrixHeader::SIZE as u64,
            last_row: None,
            max_col: 0,
            finished: false,
        })
    }

    /// Append one row. Row ids must arrive in strictly ascending order and
    /// column ids must be unique within the row.
    pub fn append(&mut self, row: &SparseRow) -> Result<(), MatrixError> {
        if let Some(last) = self.last_row {
            if row.row_id() <= last {
                return Err(MatrixError::OutOfOrder {
                    row: row.row_id(),
                    last,
                });
            }
        }

        let mut seen = AHashSet::with_capacity(row.len());
        for &(col, _) in row.entries() {
            if !seen.insert(col) {
                return Err(MatrixError::Malformed(format!(
                    "row {} repeats column {col}",
                    row.row_id()
                )));
            }
            self.max_col = self.max_col.max(col);
        }

        let len = row.encoded_len();
        if !self.page_buf.is_empty() && self.page_buf.len() + len > self.max_page_bytes {
            self.flush_page()?;
        }

        self.index.push(RowLocation {
            row_id: row.row_id(),
            page: self.pages.len() as u32,
            offset: self.page_buf.len() as u32,
            len: len as u32,
        });
        row.encode_into(&mut self.page_buf);
        self.last_row = Some(row.row_id());
        Ok(())
    }

    fn flush_page(&mut self) -> Result<(), MatrixError> {
        if self.page_buf.is_empty() {
            return Ok(());
        }
        self.file.write_all(&self.page_buf)?;
        self.pages.push(PageSpan {
            offset: self.pos,
            len: self.page_buf.len() as u32,
        });
        self.pos += self.page_buf.len() as u64;
        self.page_buf.clear();
        Ok(())
    }

    /// Flush the final page, write the page table, row index and header, and
    /// move the file into place. Returns the number of rows written.
    pub fn finish(mut self) -> Result<u64, MatrixError> {
        self.flush_page()?;

        let page_table_offset = self.pos;
        let page_table = bincode::serialize(&self.pages)?;
        self.file.write_all(&page_table)?;
        self.pos += page_table.len() as u64;

        let row_index_offset = self.pos;
        let row_index = bincode::serialize(&self.index)?;
        self.file.write_all(&row_index)?;
        self.pos += row_index.len() as u64;

        let header = MatrixHeader {
            magic: MAGIC_NUMBER,
            version: FORMAT_VERSION,
            max_page_bytes: self.max_page_bytes as u32,
            row_count: self.index.len() as u32,
            page_count: self.pages.len() as u32,
            max_col: self.max_col,
            page_table_offset,
            row_index_offset,
            total_size: self.pos,
        };
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header.to_bytes())?;
        self.file.flush()?;

        self.finished = true;
        fs::rename(&self.tmp_path, &self.final_path)?;
        tracing::debug!(
            rows = header.row_count,
            pages = header.page_count,
            bytes = header.total_size,
            path = %self.final_path.display(),
            "matrix write finished"
        );
        Ok(header.row_count as u64)
    }
}

impl Drop for MatrixWriter {
    fn drop(&mut self) {
        // An unfinished write leaves only the temp file; discard it.
        if !self.finished {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}
