//! Similarity strategies.
//!
//! The pairwise pipeline is agnostic to how scores are produced; anything
//! implementing [`SimilarityStrategy`] can drive it. Two implementations live
//! here: the category-BFS strategy (the heart of this crate) and an adapter
//! over an external concept-vector provider (text-search engine).

use std::sync::Arc;

use dashmap::DashMap;
use semarel_matrix::SparseRow;

use crate::{shortest_distance, BfsOptions, CategoryBfs, CategoryGraph, GraphError};

/// Interchangeable similarity-scoring contract.
pub trait SimilarityStrategy: Send + Sync {
    /// Similarity of two entities in `[0, 1]`-ish score space (clamping to
    /// the representable range happens at matrix-write time).
    fn similarity(&self, a: u32, b: u32) -> Result<f64, GraphError>;

    /// Top-K most similar neighbors of `entity`, ranked by non-increasing
    /// score. The result holds at most `min(k, reachable entities)` entries
    /// and never includes `entity` itself.
    fn top_k_neighbors(&self, entity: u32, k: usize) -> Result<SparseRow, GraphError>;
}

/// Default cap on entities collected per top-K traversal.
const DEFAULT_SEARCH_CAP: usize = 10_000;

/// Category-graph similarity: BFS distance through shared ancestors, mapped
/// to a score by the graph's log-ratio transform.
pub struct CategorySimilarity<'g> {
    graph: &'g CategoryGraph,
    search_cap: usize,
}

impl<'g> CategorySimilarity<'g> {
    pub fn new(graph: &'g CategoryGraph) -> Self {
        Self {
            graph,
            search_cap: DEFAULT_SEARCH_CAP,
        }
    }

    /// Bound the per-query entity collection. Tight caps trade recall for
    /// time and inherit the documented mid-category cutoff.
    pub fn with_search_cap(graph: &'g CategoryGraph, search_cap: usize) -> Self {
        Self { graph, search_cap }
    }

    fn check_entity(&self, entity: u32) -> Result<(), GraphError> {
        if self.graph.contains_entity(entity) {
            Ok(())
        } else {
            Err(GraphError::UnknownEntity(entity))
        }
    }
}

impl SimilarityStrategy for CategorySimilarity<'_> {
    fn similarity(&self, a: u32, b: u32) -> Result<f64, GraphError> {
        self.check_entity(a)?;
        self.check_entity(b)?;
        // No shared ancestor means no measurable relatedness.
        Ok(match shortest_distance(self.graph, a, b) {
            Some(distance) => self.graph.distance_to_score(distance),
            None => 0.0,
        })
    }

    fn top_k_neighbors(&self, entity: u32, k: usize) -> Result<SparseRow, GraphError> {
        self.check_entity(entity)?;

        let mut bfs = CategoryBfs::new(
            self.graph,
            entity,
            BfsOptions {
                collect_pages: true,
                explore_children: true,
                max_results: self.search_cap,
            },
        );
        bfs.run();

        let mut scored: Vec<(u32, f64)> = bfs
            .entity_distances()
            .iter()
            .filter(|(&other, _)| other != entity)
            .map(|(&other, &distance)| (other, self.graph.distance_to_score(distance)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(SparseRow::new(
            entity,
            scored
                .into_iter()
                .map(|(other, score)| (other, score as f32))
                .collect(),
        ))
    }
}

/// External text-search collaborator: ranked concept vectors per entity.
pub trait ConceptVectorProvider: Send + Sync {
    /// Ranked `(entity, relevance)` pairs, best first, at most `limit`.
    fn ranked_concepts(&self, entity: u32, limit: usize) -> Vec<(u32, f32)>;
}

/// Adapts a [`ConceptVectorProvider`] to the strategy contract.
///
/// Vectors are cached in a grow-only concurrent map: entries are inserted
/// once and never evicted or replaced, so concurrent readers always see a
/// stable vector for an entity.
pub struct ConceptVectorSimilarity<P: ConceptVectorProvider> {
    provider: P,
    fetch_limit: usize,
    cache: DashMap<u32, Arc<Vec<(u32, f32)>>>,
}

impl<P: ConceptVectorProvider> ConceptVectorSimilarity<P> {
    pub fn new(provider: P, fetch_limit: usize) -> Self {
        Self {
            provider,
            fetch_limit: fetch_limit.max(1),
            cache: DashMap::new(),
        }
    }

    fn vector(&self, entity: u32) -> Arc<Vec<(u32, f32)>> {
        Arc::clone(
            &self
                .cache
                .entry(entity)
                .or_insert_with(|| Arc::new(self.provider.ranked_concepts(entity, self.fetch_limit))),
        )
    }

    /// Number of cached vectors.
    pub fn cached_vectors(&self) -> usize {
        self.cache.len()
    }
}

impl<P: ConceptVectorProvider> SimilarityStrategy for ConceptVectorSimilarity<P> {
    fn similarity(&self, a: u32, b: u32) -> Result<f64, GraphError> {
        let vector = self.vector(a);
        Ok(vector
            .iter()
            .find(|(other, _)| *other == b)
            .map(|(_, score)| *score as f64)
            .unwrap_or(0.0))
    }

    fn top_k_neighbors(&self, entity: u32, k: usize) -> Result<SparseRow, GraphError> {
        let vector = self.vector(entity);
        Ok(SparseRow::new(
            entity,
            vector
                .iter()
                .filter(|(other, _)| *other != entity)
                .take(k)
                .copied()
                .collect(),
        ))
    }
}

/// Scalar normalization transform: observe raw scores during a training
/// pass, then rescale into `[0, 1]`.
pub trait ScoreNormalizer: Send + Sync {
    fn observe(&mut self, x: f64);
    fn observations_finished(&mut self);
    fn normalize(&self, x: f64) -> f64;
}

/// Linear rescaling over the observed range.
#[derive(Debug, Clone)]
pub struct MinMaxNormalizer {
    min: f64,
    max: f64,
    finished: bool,
}

impl MinMaxNormalizer {
    pub fn new() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            finished: false,
        }
    }
}

impl Default for MinMaxNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreNormalizer for MinMaxNormalizer {
    fn observe(&mut self, x: f64) {
        self.min = self.min.min(x);
        self.max = self.max.max(x);
    }

    fn observations_finished(&mut self) {
        self.finished = true;
    }

    fn normalize(&self, x: f64) -> f64 {
        if !self.finished || !(self.max > self.min) {
            return x.clamp(0.0, 1.0);
        }
        ((x - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }
}
