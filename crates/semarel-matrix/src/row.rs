//! Sparse row value type.

use serde::{Deserialize, Serialize};

/// Lowest representable score. Scores outside the range are pinched at
/// construction time, never rejected.
pub const MIN_SCORE: f32 = -1.1;

/// Highest representable score.
pub const MAX_SCORE: f32 = 1.1;

/// One entity's sparse list of scored neighbors.
///
/// Entries keep their insertion (discovery) order: similarity strategies
/// already emit neighbors ranked by score, so the matrix never re-sorts
/// columns. Column ids must be unique within a row; the writer rejects
/// duplicates as malformed input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseRow {
    row_id: u32,
    entries: Vec<(u32, f32)>,
}

impl SparseRow {
    /// Build a row, clamping every score into `[MIN_SCORE, MAX_SCORE]`.
    pub fn new(row_id: u32, entries: Vec<(u32, f32)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(col, score)| (col, score.clamp(MIN_SCORE, MAX_SCORE)))
            .collect();
        Self { row_id, entries }
    }

    pub fn row_id(&self) -> u32 {
        self.row_id
    }

    pub fn entries(&self) -> &[(u32, f32)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Score for `col`, if present.
    pub fn get(&self, col: u32) -> Option<f32> {
        self.entries
            .iter()
            .find(|(c, _)| *c == col)
            .map(|(_, s)| *s)
    }

    /// Serialized byte length of this row on disk.
    pub(crate) fn encoded_len(&self) -> usize {
        8 + self.entries.len() * 8
    }

    /// Wire form: `row_id u32 | n u32 | n x (col u32, score f32)`, little
    /// endian throughout.
    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.row_id.to_le_bytes());
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for &(col, score) in &self.entries {
            out.extend_from_slice(&col.to_le_bytes());
            out.extend_from_slice(&score.to_le_bytes());
        }
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, crate::MatrixError> {
        let malformed = |what: &str| crate::MatrixError::Malformed(format!("row payload: {what}"));
        if bytes.len() < 8 {
            return Err(malformed("truncated header"));
        }
        let row_id = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let n = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        if bytes.len() != 8 + n * 8 {
            return Err(malformed("entry count disagrees with payload length"));
        }
        let mut entries = Vec::with_capacity(n);
        for i in 0..n {
            let base = 8 + i * 8;
            let col = u32::from_le_bytes([
                bytes[base],
                bytes[base + 1],
                bytes[base + 2],
                bytes[base + 3],
            ]);
            let score = f32::from_le_bytes([
                bytes[base + 4],
                bytes[base + 5],
                bytes[base + 6],
                bytes[base + 7],
            ]);
            entries.push((col, score));
        }
        Ok(Self { row_id, entries })
    }
}
