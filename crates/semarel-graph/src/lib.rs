//! Category-graph semantic similarity.
//!
//! A weighted directed graph of categories is built once from a document
//! collection; a bidirectional priority-ordered BFS then measures the cheapest
//! shared-ancestor path between two entities, and a log-ratio transform turns
//! that distance into a similarity score. The whole thing sits behind the
//! [`SimilarityStrategy`] trait so the pairwise pipeline can drive it (or any
//! other scoring backend) interchangeably.

mod bfs;
mod collection;
mod error;
mod graph;
mod strategy;

pub use bfs::{shortest_distance, BfsOptions, CategoryBfs};
pub use collection::{Document, DocumentCollection, DocumentKind, VecCollection};
pub use error::GraphError;
pub use graph::{CategoryGraph, CategoryNode};
pub use strategy::{
    CategorySimilarity, ConceptVectorProvider, ConceptVectorSimilarity, MinMaxNormalizer,
    ScoreNormalizer, SimilarityStrategy,
};
