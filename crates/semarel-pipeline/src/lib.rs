//! Pairwise similarity computation pipeline.
//!
//! For every entity in a partitioned id space, asks a similarity strategy for
//! its top-K neighbors and persists the resulting rows as one matrix file.
//!
//! The id space is sorted and split into **contiguous** chunks, one per
//! worker. Workers never share the writer: each produces its chunk's rows
//! independently, and the chunks are concatenated in order at finalize time.
//! Since chunk ranges do not interleave, the concatenation is already in
//! ascending row order and the writer's ordering invariant holds without a
//! lock around it.
//!
//! A failing strategy call is logged and counted; sibling tasks continue and
//! the run completes with a partial result. Only writer failures abort the
//! pipeline.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;
use thiserror::Error;

use semarel_graph::{ScoreNormalizer, SimilarityStrategy};
use semarel_matrix::{MatrixError, MatrixWriter, SparseRow};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("matrix write failed: {0}")]
    Matrix(#[from] MatrixError),

    #[error("worker pool construction failed: {0}")]
    Pool(String),
}

#[derive(Debug, Clone)]
pub struct PairwiseConfig {
    /// Fixed worker pool size.
    pub threads: usize,
    /// Neighbors requested per entity.
    pub top_k: usize,
    /// Page flush threshold for the output matrix.
    pub max_page_bytes: usize,
}

impl Default for PairwiseConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            top_k: 20,
            max_page_bytes: 64 * 1024,
        }
    }
}

/// Outcome of one pipeline run. A non-zero failure count means some entities
/// produced no row; the matrix itself is still valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairwiseReport {
    pub rows_written: u64,
    pub failures: u64,
}

/// Observer invoked by workers with the number of entities processed so far.
/// Passed in explicitly; the pipeline keeps no global state.
pub type ProgressFn<'a> = &'a (dyn Fn(u64) + Sync);

/// Compute top-K neighbor rows for `ids` and write them to `out_path`.
///
/// `ids` may arrive unsorted and with duplicates; the pipeline sorts and
/// dedups before partitioning. When a trained `normalizer` is supplied, raw
/// strategy scores are rescaled through it before persistence.
pub fn run_pairwise(
    ids: &[u32],
    strategy: &dyn SimilarityStrategy,
    out_path: &Path,
    config: &PairwiseConfig,
    normalizer: Option<&dyn ScoreNormalizer>,
    progress: Option<ProgressFn<'_>>,
) -> Result<PairwiseReport, PipelineError> {
    let mut sorted: Vec<u32> = ids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let threads = config.threads.max(1);
    let chunk_size = sorted.len().div_ceil(threads).max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| PipelineError::Pool(e.to_string()))?;

    let processed = AtomicU64::new(0);
    let failures = AtomicU64::new(0);

    tracing::debug!(
        entities = sorted.len(),
        threads,
        top_k = config.top_k,
        "starting pairwise run"
    );

    // One Vec of rows per contiguous chunk, in chunk order.
    let chunk_rows: Vec<Vec<SparseRow>> = pool.install(|| {
        sorted
            .par_chunks(chunk_size)
            .map(|chunk| {
                let mut rows = Vec::with_capacity(chunk.len());
                for &entity in chunk {
                    match strategy.top_k_neighbors(entity, config.top_k) {
                        Ok(row) => rows.push(apply_normalizer(row, normalizer)),
                        Err(err) => {
                            tracing::warn!(entity, %err, "pairwise task failed; continuing");
                            failures.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(callback) = progress {
                        callback(done);
                    }
                }
                rows
            })
            .collect()
    });

    let mut writer = MatrixWriter::create(out_path, config.max_page_bytes)?;
    let mut rows_written = 0u64;
    for rows in &chunk_rows {
        for row in rows {
            writer.append(row)?;
            rows_written += 1;
        }
    }
    writer.finish()?;

    let report = PairwiseReport {
        rows_written,
        failures: failures.load(Ordering::Relaxed),
    };
    tracing::info!(
        rows = report.rows_written,
        failures = report.failures,
        path = %out_path.display(),
        "pairwise run finished"
    );
    Ok(report)
}

fn apply_normalizer(row: SparseRow, normalizer: Option<&dyn ScoreNormalizer>) -> SparseRow {
    let Some(normalizer) = normalizer else {
        return row;
    };
    SparseRow::new(
        row.row_id(),
        row.entries()
            .iter()
            .map(|&(col, score)| (col, normalizer.normalize(score as f64) as f32))
            .collect(),
    )
}
