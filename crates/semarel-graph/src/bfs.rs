//! Priority-ordered category traversal.
//!
//! A single-sided BFS explores the category graph outward from one entity,
//! finalizing categories in ascending cumulative-cost order (Dijkstra with
//! lazy deletion: the heap may hold stale duplicates, which are skipped when
//! popped). A frontier entry carries a direction flag: entries still moving
//! upward may push parents, while entries that have started descending push
//! children only. That lets the search climb to shared ancestors before
//! redescending, without ever re-ascending from a descent.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use ahash::AHashMap;

use crate::CategoryGraph;

/// Caller-side knobs for one traversal.
#[derive(Debug, Clone, Copy)]
pub struct BfsOptions {
    /// Record per-entity distances while finalizing categories.
    pub collect_pages: bool,
    /// Explore downward into child categories.
    pub explore_children: bool,
    /// Result cap: collected entities when `collect_pages` is on, finalized
    /// categories otherwise. The cap cuts off mid-category: once hit, the
    /// rest of the current member list is skipped, even if a later member
    /// would be closer. That asymmetry is intentional, inherited behavior
    /// under tight caps, not a bug.
    pub max_results: usize,
}

impl Default for BfsOptions {
    fn default() -> Self {
        Self {
            collect_pages: true,
            explore_children: true,
            max_results: usize::MAX,
        }
    }
}

impl BfsOptions {
    /// Ancestor-only exploration: no page collection, no descent. Used by the
    /// two-sided shortest-distance query.
    pub fn ancestors_only() -> Self {
        Self {
            collect_pages: false,
            explore_children: false,
            max_results: usize::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Frontier {
    distance: f64,
    category: u32,
    /// Still allowed to explore upward toward parents.
    upward: bool,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.category.cmp(&other.category))
            .then_with(|| self.upward.cmp(&other.upward))
    }
}

/// One traversal's state. The graph itself is shared and read-only; any
/// number of traversals may run concurrently over it.
pub struct CategoryBfs<'g> {
    graph: &'g CategoryGraph,
    opts: BfsOptions,
    frontier: BinaryHeap<Reverse<Frontier>>,
    /// Finalized category distances, dense by category index.
    category_distance: Vec<Option<f64>>,
    /// Finalized entity distances; seeded with the start entity at 0.
    entity_distance: AHashMap<u32, f64>,
    start: u32,
    collected_entities: usize,
    finalized_categories: usize,
    max_explored: f64,
}

impl<'g> CategoryBfs<'g> {
    /// Seed a traversal: the start entity finalizes at distance 0 and each
    /// category it belongs to enters the frontier at that category's own
    /// cost, still pointing upward.
    pub fn new(graph: &'g CategoryGraph, start_entity: u32, opts: BfsOptions) -> Self {
        let mut frontier = BinaryHeap::new();
        for &category in graph.entity_categories(start_entity) {
            frontier.push(Reverse(Frontier {
                distance: graph.cost(category),
                category,
                upward: true,
            }));
        }
        let mut entity_distance = AHashMap::new();
        entity_distance.insert(start_entity, 0.0);

        Self {
            graph,
            opts,
            frontier,
            category_distance: vec![None; graph.len()],
            entity_distance,
            start: start_entity,
            collected_entities: 0,
            finalized_categories: 0,
            max_explored: 0.0,
        }
    }

    pub fn start_entity(&self) -> u32 {
        self.start
    }

    /// Largest distance finalized so far. Monotone over steps.
    pub fn max_explored(&self) -> f64 {
        self.max_explored
    }

    pub fn category_distance(&self, category: u32) -> Option<f64> {
        self.category_distance[category as usize]
    }

    /// Finalized entity distances, including the start entity at 0.
    pub fn entity_distances(&self) -> &AHashMap<u32, f64> {
        &self.entity_distance
    }

    fn capped(&self) -> bool {
        if self.opts.collect_pages {
            self.collected_entities >= self.opts.max_results
        } else {
            self.finalized_categories >= self.opts.max_results
        }
    }

    /// Finalize the next-closest category and expand from it. Returns the
    /// finalized `(category, distance)`, or `None` when the frontier is
    /// exhausted or the result cap has been reached.
    pub fn step(&mut self) -> Option<(u32, f64)> {
        if self.capped() {
            return None;
        }

        let entry = loop {
            let Reverse(entry) = self.frontier.pop()?;
            // Lazy deletion: stale duplicates of finalized categories.
            if self.category_distance[entry.category as usize].is_none() {
                break entry;
            }
        };

        self.category_distance[entry.category as usize] = Some(entry.distance);
        self.finalized_categories += 1;
        self.max_explored = entry.distance;

        if self.opts.collect_pages {
            self.collect_members(entry.category, entry.distance);
        }

        let node = self.graph.node(entry.category);
        if self.opts.explore_children {
            for &child in &node.children {
                if self.category_distance[child as usize].is_none() {
                    self.frontier.push(Reverse(Frontier {
                        distance: entry.distance + self.graph.cost(child),
                        category: child,
                        upward: false,
                    }));
                }
            }
        }
        if entry.upward {
            for &parent in &node.parents {
                if self.category_distance[parent as usize].is_none() {
                    self.frontier.push(Reverse(Frontier {
                        distance: entry.distance + self.graph.cost(parent),
                        category: parent,
                        upward: true,
                    }));
                }
            }
        }

        Some((entry.category, entry.distance))
    }

    fn collect_members(&mut self, category: u32, distance: f64) {
        for &member in &self.graph.node(category).members {
            if self.collected_entities >= self.opts.max_results {
                // Mid-category cutoff; see BfsOptions::max_results.
                break;
            }
            match self.entity_distance.get_mut(&member) {
                Some(existing) => {
                    if *existing > distance {
                        *existing = distance;
                    }
                }
                None => {
                    self.entity_distance.insert(member, distance);
                    self.collected_entities += 1;
                }
            }
        }
    }

    /// Run to exhaustion or the result cap.
    pub fn run(&mut self) {
        while self.step().is_some() {}
    }
}

/// Shortest weighted distance between two entities through shared ancestor
/// categories, or `None` when no shared ancestor exists.
///
/// Two ancestor-only traversals alternate, biased toward whichever side has
/// explored less distance. A category `c` finalized by both sides yields the
/// candidate `dist_a(c) + dist_b(c) - cost(c)` (the cost is counted on both
/// approach paths, so it is subtracted once). The search stops as soon as the
/// sum of both sides' explored distance exceeds the best candidate.
pub fn shortest_distance(graph: &CategoryGraph, a: u32, b: u32) -> Option<f64> {
    if a == b {
        return Some(0.0);
    }

    let mut side_a = CategoryBfs::new(graph, a, BfsOptions::ancestors_only());
    let mut side_b = CategoryBfs::new(graph, b, BfsOptions::ancestors_only());
    let mut a_active = true;
    let mut b_active = true;
    let mut best = f64::INFINITY;

    while a_active || b_active {
        let step_a = match (a_active, b_active) {
            (true, true) => side_a.max_explored() <= side_b.max_explored(),
            (active, _) => active,
        };

        let (stepped, other) = if step_a {
            (side_a.step(), &side_b)
        } else {
            (side_b.step(), &side_a)
        };

        match stepped {
            None => {
                if step_a {
                    a_active = false;
                } else {
                    b_active = false;
                }
            }
            Some((category, distance)) => {
                if let Some(other_distance) = other.category_distance(category) {
                    let candidate = distance + other_distance - graph.cost(category);
                    if candidate < best {
                        best = candidate;
                    }
                }
                if side_a.max_explored() + side_b.max_explored() > best {
                    break;
                }
            }
        }
    }

    best.is_finite().then_some(best)
}
