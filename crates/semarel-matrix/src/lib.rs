//! Sparse similarity matrix storage (`.smx`)
//!
//! Persists the output of pairwise similarity computation: one sparse row of
//! scored neighbors per entity, keyed by a stable `u32` id.
//!
//! Key properties:
//! 1. **Paged body**: rows are batched into variable-length pages; a page is
//!    the unit of load and eviction
//! 2. **Memory mapping**: files are opened via mmap and pages are materialized
//!    on demand, so web-scale matrices never need to fit in memory
//! 3. **Self-describing header**: row count, page geometry and section offsets
//!    live in a fixed 48-byte header, so a file reopens without external hints
//! 4. **External-merge transpose**: column-major reorientation via bounded
//!    per-bucket spill files, for matrices larger than memory
//!
//! A finished file is immutable. Writers produce a temporary file and rename
//! it into place on `finish()`, so a crashed write never leaves a file that
//! parses as valid.

mod error;
mod format;
mod reader;
mod row;
mod transpose;
mod writer;

pub use error::MatrixError;
pub use format::{MatrixHeader, PageSpan, RowLocation, FORMAT_VERSION, MAGIC_NUMBER};
pub use reader::{MatrixReader, OpenMode, PageCacheStats};
pub use row::{SparseRow, MAX_SCORE, MIN_SCORE};
pub use transpose::transpose;
pub use writer::MatrixWriter;
