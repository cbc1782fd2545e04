//! Matrix storage errors.

use thiserror::Error;

/// Errors produced by the matrix writer, reader and transposer.
///
/// Ordering and format violations are structural and always abort the owning
/// operation; `NotFound` is the one recoverable variant (the caller decides
/// whether a missing row matters).
#[derive(Debug, Error)]
pub enum MatrixError {
    /// Rows must be appended in strictly ascending id order.
    #[error("row {row} appended out of order (last written row was {last})")]
    OutOfOrder { row: u32, last: u32 },

    /// Row id absent from the matrix index.
    #[error("row {0} not found in matrix")]
    NotFound(u32),

    /// The file or a row payload does not decode as a valid matrix.
    #[error("malformed matrix data: {0}")]
    Malformed(String),

    /// Spill storage for the external-merge transpose could not be written
    /// or read back. Fatal for the whole transposition; partial output must
    /// be discarded.
    #[error("transpose spill storage failed: {0}")]
    DiskExhaustion(#[source] std::io::Error),

    #[error("matrix I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("matrix section encoding failed: {0}")]
    Codec(#[from] bincode::Error),
}
