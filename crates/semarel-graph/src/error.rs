//! Graph construction and query errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    /// The global category-cost invariant (`0 < min_cost < 1`) failed at
    /// build time. The distance-to-score log transform depends on it, so
    /// graph construction aborts.
    #[error("category cost invariant violated: {0}")]
    CostInvariant(String),

    /// A document carried category data that cannot be interpreted. Fatal
    /// only for the item, not the run; callers log and continue.
    #[error("malformed document data: {0}")]
    Malformed(String),

    /// The queried entity does not exist in the collection the graph was
    /// built from.
    #[error("unknown entity {0}")]
    UnknownEntity(u32),
}
