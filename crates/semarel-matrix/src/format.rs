//! On-disk layout of the `.smx` matrix format.
//!
//! ```text
//! [ header: 48 bytes, fixed ]
//! [ body: pages, each a contiguous run of serialized rows ]
//! [ page table: bincode Vec<PageSpan> ]
//! [ row index: bincode Vec<RowLocation>, ascending by row_id ]
//! ```
//!
//! The header is written last (the writer seeks back over a zeroed
//! placeholder), so a file without a valid header is a crashed write and is
//! rejected on open.

use serde::{Deserialize, Serialize};

use crate::MatrixError;

/// Magic number: "SMXF" in ASCII.
pub const MAGIC_NUMBER: u32 = 0x534D_5846;

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Fixed-size file header (48 bytes, little endian).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixHeader {
    pub magic: u32,
    pub version: u32,
    /// Page flush threshold the writer was configured with.
    pub max_page_bytes: u32,
    pub row_count: u32,
    pub page_count: u32,
    /// Largest column id present in any row (0 when the matrix is empty).
    /// Recorded so the transposer can partition the column space without a
    /// scan.
    pub max_col: u32,
    pub page_table_offset: u64,
    pub row_index_offset: u64,
    pub total_size: u64,
}

impl MatrixHeader {
    /// Header size in bytes.
    pub const SIZE: usize = 48;

    pub fn is_valid(&self) -> bool {
        // Sections are laid out in order: header, body, page table, row index.
        self.magic == MAGIC_NUMBER
            && self.version >= 1
            && self.version <= FORMAT_VERSION
            && (Self::SIZE as u64) <= self.page_table_offset
            && self.page_table_offset <= self.row_index_offset
            && self.row_index_offset <= self.total_size
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MatrixError> {
        if bytes.len() < Self::SIZE {
            return Err(MatrixError::Malformed(
                "file too small to hold a matrix header".to_string(),
            ));
        }
        let u32_at = |off: usize| {
            u32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
        };
        let u64_at = |off: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[off..off + 8]);
            u64::from_le_bytes(buf)
        };

        let header = Self {
            magic: u32_at(0),
            version: u32_at(4),
            max_page_bytes: u32_at(8),
            row_count: u32_at(12),
            page_count: u32_at(16),
            max_col: u32_at(20),
            page_table_offset: u64_at(24),
            row_index_offset: u64_at(32),
            total_size: u64_at(40),
        };

        if header.is_valid() {
            Ok(header)
        } else {
            Err(MatrixError::Malformed(
                "invalid matrix header (bad magic, version or section offsets)".to_string(),
            ))
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut result = [0u8; Self::SIZE];
        result[0..4].copy_from_slice(&self.magic.to_le_bytes());
        result[4..8].copy_from_slice(&self.version.to_le_bytes());
        result[8..12].copy_from_slice(&self.max_page_bytes.to_le_bytes());
        result[12..16].copy_from_slice(&self.row_count.to_le_bytes());
        result[16..20].copy_from_slice(&self.page_count.to_le_bytes());
        result[20..24].copy_from_slice(&self.max_col.to_le_bytes());
        result[24..32].copy_from_slice(&self.page_table_offset.to_le_bytes());
        result[32..40].copy_from_slice(&self.row_index_offset.to_le_bytes());
        result[40..48].copy_from_slice(&self.total_size.to_le_bytes());
        result
    }
}

/// Byte extent of one page in the body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageSpan {
    pub offset: u64,
    pub len: u32,
}

/// Location of one row: page number plus offset/length within the page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RowLocation {
    pub row_id: u32,
    pub page: u32,
    pub offset: u32,
    pub len: u32,
}
