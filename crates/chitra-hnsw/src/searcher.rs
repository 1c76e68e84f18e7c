//! Layered beam search over the graph.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

use chitra_common::{ChitraError, DistanceMetric, IndexConfig, Result, SearchResult, VectorId};

use crate::graph::GraphIndex;
use crate::store::VectorStore;

/// A node paired with its distance to the current query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub id: VectorId,
    pub distance: f32,
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Distance first; equal distances order by ascending id so that
        // results and evictions are deterministic.
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Bounded beam search within a single layer.
///
/// Expands unvisited neighbors from the entry points, keeping at most `ef`
/// candidates, and stops once the best unexplored candidate cannot improve
/// the worst kept result. Returns the kept candidates sorted by ascending
/// distance.
pub(crate) fn search_layer(
    graph: &GraphIndex,
    store: &VectorStore,
    metric: DistanceMetric,
    query: &[f32],
    entry_points: &[VectorId],
    ef: usize,
    layer: usize,
) -> Vec<Candidate> {
    let mut visited: HashSet<VectorId> = HashSet::new();
    // Frontier pops the closest unexplored candidate; results keep the
    // closest ef seen so far, with the farthest on top for eviction.
    let mut frontier: BinaryHeap<Reverse<Candidate>> = BinaryHeap::new();
    let mut results: BinaryHeap<Candidate> = BinaryHeap::new();

    for &entry in entry_points {
        if !visited.insert(entry) {
            continue;
        }
        let vector = match store.vector(entry) {
            Some(v) => v,
            None => continue,
        };
        let candidate = Candidate {
            id: entry,
            distance: metric.compute(query, vector),
        };
        frontier.push(Reverse(candidate));
        results.push(candidate);
    }

    while results.len() > ef {
        results.pop();
    }

    while let Some(Reverse(current)) = frontier.pop() {
        if results.len() >= ef {
            if let Some(&worst) = results.peek() {
                if current.distance > worst.distance {
                    break;
                }
            }
        }

        for &neighbor in graph.neighbors_at(current.id, layer) {
            if !visited.insert(neighbor) {
                continue;
            }
            let vector = match store.vector(neighbor) {
                Some(v) => v,
                None => continue,
            };
            let candidate = Candidate {
                id: neighbor,
                distance: metric.compute(query, vector),
            };

            if results.len() < ef {
                frontier.push(Reverse(candidate));
                results.push(candidate);
            } else if let Some(&worst) = results.peek() {
                if candidate < worst {
                    frontier.push(Reverse(candidate));
                    results.push(candidate);
                    results.pop();
                }
            }
        }
    }

    let mut sorted = results.into_vec();
    sorted.sort_unstable();
    sorted
}

/// Read-only query execution against a graph and its vector store.
pub struct Searcher<'a> {
    store: &'a VectorStore,
    graph: &'a GraphIndex,
    config: &'a IndexConfig,
}

impl<'a> Searcher<'a> {
    /// Create a searcher over the given state.
    pub fn new(store: &'a VectorStore, graph: &'a GraphIndex, config: &'a IndexConfig) -> Self {
        Self {
            store,
            graph,
            config,
        }
    }

    /// Find the `k` approximate nearest neighbors of `query`.
    ///
    /// `ef_override` replaces the configured `ef_search` for this call;
    /// either way the effective beam width is at least `k`. An empty index
    /// or `k == 0` yields an empty result, not an error.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the query length does not equal the
    /// index dimension.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        ef_override: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        if query.len() != self.store.dimension() {
            return Err(ChitraError::DimensionMismatch {
                expected: self.store.dimension(),
                actual: query.len(),
            });
        }

        if k == 0 || self.graph.is_empty() {
            return Ok(Vec::new());
        }

        let (entry, top_layer) = match self.graph.entry_point() {
            Some(ep) => ep,
            None => return Ok(Vec::new()),
        };

        let metric = self.config.metric;

        // Greedy descent: a single-path pass per layer down to layer 1
        // yields a strong starting candidate for the base layer.
        let mut entry_points = vec![entry];
        for layer in (1..=top_layer).rev() {
            let found = search_layer(self.graph, self.store, metric, query, &entry_points, 1, layer);
            if let Some(best) = found.first() {
                entry_points = vec![best.id];
            }
        }

        let ef = ef_override.unwrap_or(self.config.ef_search).max(k);
        let candidates = search_layer(self.graph, self.store, metric, query, &entry_points, ef, 0);

        Ok(candidates
            .into_iter()
            .take(k)
            .map(|c| SearchResult {
                id: c.id,
                distance: c.distance,
                similarity: metric.similarity(c.distance),
                metadata: self
                    .store
                    .metadata(c.id)
                    .cloned()
                    .unwrap_or(serde_json::Value::Null),
            })
            .collect())
    }
}
