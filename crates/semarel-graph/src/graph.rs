//! Category graph: arena of dense-indexed category nodes.

use ahash::AHashMap;
use roaring::RoaringBitmap;

use crate::{DocumentCollection, DocumentKind, GraphError};

/// One category. Plain struct in the graph arena, referenced by dense index
/// only — adjacency is `Vec<u32>`, never pointers.
#[derive(Debug, Clone)]
pub struct CategoryNode {
    pub name: String,
    /// Cost of traversing into this category from any neighbor. Broad
    /// categories cost more than specific ones; every cost sits strictly
    /// inside (0, 1).
    pub cost: f64,
    pub parents: Vec<u32>,
    pub children: Vec<u32>,
    /// Entities directly in this category, ascending.
    pub members: Vec<u32>,
}

/// Read-only weighted category graph, built once per run from a document
/// collection snapshot and shared by all concurrent BFS queries.
#[derive(Debug)]
pub struct CategoryGraph {
    nodes: Vec<CategoryNode>,
    by_name: AHashMap<String, u32>,
    entity_categories: AHashMap<u32, Vec<u32>>,
    entities: RoaringBitmap,
    min_cost: f64,
}

impl CategoryGraph {
    /// Build the graph from a collection snapshot.
    ///
    /// Article documents populate category membership; category documents
    /// contribute child→parent edges. The raw data may contain cycles; the
    /// BFS tolerates them through distance memoization, so no cycle check
    /// happens here. Fails fast with [`GraphError::CostInvariant`] when the
    /// computed costs cannot support the log-ratio score transform.
    pub fn build(collection: &dyn DocumentCollection) -> Result<Self, GraphError> {
        let mut nodes: Vec<CategoryNode> = Vec::new();
        let mut by_name: AHashMap<String, u32> = AHashMap::new();
        let mut entity_categories: AHashMap<u32, Vec<u32>> = AHashMap::new();
        let mut entities = RoaringBitmap::new();

        let mut intern = |nodes: &mut Vec<CategoryNode>, name: &str| -> Option<u32> {
            let name = name.trim();
            if name.is_empty() {
                // Unusable on its own; skip the one item, not the run.
                tracing::warn!("skipping empty category name");
                return None;
            }
            if let Some(&idx) = by_name.get(name) {
                return Some(idx);
            }
            let idx = nodes.len() as u32;
            nodes.push(CategoryNode {
                name: name.to_string(),
                cost: 0.0,
                parents: Vec::new(),
                children: Vec::new(),
                members: Vec::new(),
            });
            by_name.insert(name.to_string(), idx);
            Some(idx)
        };

        for doc in collection.documents() {
            match doc.kind {
                DocumentKind::Article => {
                    entities.insert(doc.id);
                    for name in &doc.categories {
                        let Some(idx) = intern(&mut nodes, name) else {
                            continue;
                        };
                        nodes[idx as usize].members.push(doc.id);
                        entity_categories.entry(doc.id).or_default().push(idx);
                    }
                }
                DocumentKind::Category => {
                    let Some(child) = intern(&mut nodes, &doc.title) else {
                        tracing::warn!(id = doc.id, "skipping category document without a name");
                        continue;
                    };
                    for name in &doc.categories {
                        let Some(parent) = intern(&mut nodes, name) else {
                            continue;
                        };
                        if parent == child {
                            continue;
                        }
                        nodes[child as usize].parents.push(parent);
                        nodes[parent as usize].children.push(child);
                    }
                }
            }
        }

        for node in &mut nodes {
            node.parents.sort_unstable();
            node.parents.dedup();
            node.children.sort_unstable();
            node.children.dedup();
            node.members.sort_unstable();
            node.members.dedup();
        }
        for cats in entity_categories.values_mut() {
            cats.sort_unstable();
            cats.dedup();
        }

        if nodes.is_empty() {
            return Err(GraphError::CostInvariant(
                "collection contains no categories".to_string(),
            ));
        }

        // Cost grows with category size, so the BFS prefers descending into
        // specific categories over broad ones. The normalization keeps every
        // cost strictly inside (0, 1).
        let max_size = nodes
            .iter()
            .map(|n| n.members.len() + n.children.len())
            .max()
            .unwrap_or(0);
        let denom = (4.0 + 2.0 * max_size as f64).ln();
        let mut min_cost = f64::INFINITY;
        for node in &mut nodes {
            let size = node.members.len() + node.children.len();
            node.cost = (2.0 + size as f64).ln() / denom;
            min_cost = min_cost.min(node.cost);
        }

        if !(min_cost > 0.0 && min_cost < 1.0) {
            return Err(GraphError::CostInvariant(format!(
                "min cost {min_cost} outside (0, 1)"
            )));
        }

        tracing::debug!(
            categories = nodes.len(),
            entities = entities.len(),
            min_cost,
            "category graph built"
        );
        Ok(Self {
            nodes,
            by_name,
            entity_categories,
            entities,
            min_cost,
        })
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node for a dense category index obtained from [`category_index`] or an
    /// adjacency list of this graph.
    ///
    /// Panics if `category >= len()`; category indices are not validated like
    /// entity ids because they never come from external input.
    ///
    /// [`category_index`]: Self::category_index
    pub fn node(&self, category: u32) -> &CategoryNode {
        &self.nodes[category as usize]
    }

    /// Traversal cost of a category. Same index contract as [`node`].
    ///
    /// [`node`]: Self::node
    pub fn cost(&self, category: u32) -> f64 {
        self.nodes[category as usize].cost
    }

    pub fn min_cost(&self) -> f64 {
        self.min_cost
    }

    pub fn category_index(&self, name: &str) -> Option<u32> {
        self.by_name.get(name.trim()).copied()
    }

    /// Categories an entity directly belongs to; empty for unknown entities.
    pub fn entity_categories(&self, entity: u32) -> &[u32] {
        self.entity_categories
            .get(&entity)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains_entity(&self, entity: u32) -> bool {
        self.entities.contains(entity)
    }

    /// Every entity id seen in the collection, as a bitmap.
    pub fn entities(&self) -> &RoaringBitmap {
        &self.entities
    }

    /// Sum of per-category costs along a category chain. Used to spot-check
    /// BFS distances against hand computation.
    pub fn path_distance(&self, chain: &[u32]) -> f64 {
        chain.iter().map(|&c| self.cost(c)).sum()
    }

    /// Log-ratio distance-to-score transform. Distance 0 maps to exactly 1.0
    /// (the floor at `min_cost` makes the log ratio collapse to 1), and
    /// larger distances map to smaller scores.
    pub fn distance_to_score(&self, distance: f64) -> f64 {
        let floored = distance.max(self.min_cost);
        floored.ln() / self.min_cost.ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Document, VecCollection};

    fn article(id: u32, title: &str, categories: &[&str]) -> Document {
        Document {
            id,
            title: title.to_string(),
            kind: DocumentKind::Article,
            categories: categories.iter().map(|s| s.to_string()).collect(),
            text: String::new(),
        }
    }

    fn category(id: u32, title: &str, parents: &[&str]) -> Document {
        Document {
            id,
            title: title.to_string(),
            kind: DocumentKind::Category,
            categories: parents.iter().map(|s| s.to_string()).collect(),
            text: String::new(),
        }
    }

    fn small_collection() -> VecCollection {
        VecCollection::new(vec![
            category(100, "science", &[]),
            category(101, "physics", &["science"]),
            category(102, "chemistry", &["science"]),
            article(1, "gravity", &["physics"]),
            article(2, "quantum", &["physics"]),
            article(3, "benzene", &["chemistry"]),
        ])
    }

    #[test]
    fn build_links_members_and_hierarchy() {
        let graph = CategoryGraph::build(&small_collection()).unwrap();
        let physics = graph.category_index("physics").unwrap();
        let science = graph.category_index("science").unwrap();

        assert_eq!(graph.node(physics).members, vec![1, 2]);
        assert_eq!(graph.node(physics).parents, vec![science]);
        assert!(graph.node(science).children.contains(&physics));
        assert_eq!(graph.entity_categories(1), &[physics]);
        assert!(graph.contains_entity(3));
        assert_eq!(graph.entities().len(), 3);
    }

    #[test]
    fn broad_categories_cost_more() {
        let graph = CategoryGraph::build(&small_collection()).unwrap();
        let science = graph.category_index("science").unwrap();
        let chemistry = graph.category_index("chemistry").unwrap();
        // science has two children, chemistry a single member.
        assert!(graph.cost(science) > graph.cost(chemistry));
    }

    #[test]
    fn all_costs_inside_unit_interval() {
        let graph = CategoryGraph::build(&small_collection()).unwrap();
        for idx in 0..graph.len() as u32 {
            let cost = graph.cost(idx);
            assert!(cost > 0.0 && cost < 1.0, "cost {cost} out of range");
        }
        assert!(graph.min_cost() > 0.0 && graph.min_cost() < 1.0);
    }

    #[test]
    fn empty_collection_fails_cost_invariant() {
        let err = CategoryGraph::build(&VecCollection::default()).unwrap_err();
        assert!(matches!(err, GraphError::CostInvariant(_)));
    }

    #[test]
    fn zero_distance_scores_one() {
        let graph = CategoryGraph::build(&small_collection()).unwrap();
        assert_eq!(graph.distance_to_score(0.0), 1.0);
        assert!(graph.distance_to_score(0.9) < 1.0);
    }
}
