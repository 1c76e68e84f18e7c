//! Graph construction: insertion, neighbor selection, and degree pruning.

use chitra_common::{ChitraError, DistanceMetric, IndexConfig, Result, Vector, VectorId};
use tracing::debug;

use crate::graph::GraphIndex;
use crate::level::LevelSampler;
use crate::searcher::{search_layer, Candidate};
use crate::store::VectorStore;

/// Incremental index construction over a store and graph.
///
/// Each insertion is a single-writer operation: all validation happens
/// before any shared state is touched, and the linking phase itself cannot
/// fail.
pub struct Builder<'a> {
    store: &'a mut VectorStore,
    graph: &'a mut GraphIndex,
    config: &'a IndexConfig,
    sampler: &'a mut LevelSampler,
}

impl<'a> Builder<'a> {
    /// Create a builder over the given state.
    pub fn new(
        store: &'a mut VectorStore,
        graph: &'a mut GraphIndex,
        config: &'a IndexConfig,
        sampler: &'a mut LevelSampler,
    ) -> Self {
        Self {
            store,
            graph,
            config,
            sampler,
        }
    }

    /// Insert a vector with its metadata and wire it into the graph.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` before any mutation if the vector length
    /// does not equal the index dimension.
    pub fn insert(&mut self, vector: Vector, metadata: serde_json::Value) -> Result<VectorId> {
        let id = self.store.add(vector, metadata)?;
        let level = self.sampler.sample();
        self.link(id, level);
        Ok(id)
    }

    /// Insert a batch of vectors.
    ///
    /// The whole batch is validated before the first insertion, so a
    /// malformed input leaves the index untouched.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the slices differ in length, or
    /// `DimensionMismatch` for the first vector of the wrong dimension.
    pub fn insert_batch(
        &mut self,
        vectors: Vec<Vector>,
        metadata: Vec<serde_json::Value>,
    ) -> Result<Vec<VectorId>> {
        if vectors.len() != metadata.len() {
            return Err(ChitraError::InvalidInput(format!(
                "Number of vectors ({}) must equal number of metadata entries ({})",
                vectors.len(),
                metadata.len()
            )));
        }

        let dimension = self.store.dimension();
        for vector in &vectors {
            if vector.len() != dimension {
                return Err(ChitraError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
        }

        debug!("Inserting batch of {} vectors", vectors.len());

        let mut ids = Vec::with_capacity(vectors.len());
        for (vector, meta) in vectors.into_iter().zip(metadata) {
            ids.push(self.insert(vector, meta)?);
        }
        Ok(ids)
    }

    /// Wire a freshly stored vector into the graph at its sampled level.
    fn link(&mut self, id: VectorId, level: usize) {
        let (entry, top_layer) = match self.graph.entry_point() {
            Some(ep) => ep,
            None => {
                // First node: becomes the entry point with no neighbors.
                self.graph.insert_node(id, level);
                return;
            }
        };

        let query = match self.store.vector(id) {
            Some(v) => v.to_vec(),
            None => return,
        };
        let metric = self.config.metric;

        self.graph.insert_node(id, level);

        // Greedy descent through the layers above the new node's level.
        // This phase only locates a good entry candidate; no edges yet.
        let mut entry_points = vec![entry];
        for layer in ((level + 1)..=top_layer).rev() {
            let found = search_layer(
                self.graph,
                self.store,
                metric,
                &query,
                &entry_points,
                1,
                layer,
            );
            if let Some(best) = found.first() {
                entry_points = vec![best.id];
            }
        }

        // Search, select, and link on every layer the node participates in.
        for layer in (0..=level.min(top_layer)).rev() {
            let candidates = search_layer(
                self.graph,
                self.store,
                metric,
                &query,
                &entry_points,
                self.config.ef_construction,
                layer,
            );

            let cap = self.config.max_connections(layer);
            let selected = select_neighbors(self.store, metric, &candidates, cap);

            self.graph.set_neighbors_at(id, layer, selected.clone());

            for &neighbor in &selected {
                self.graph.add_neighbor(neighbor, layer, id);
                if self.graph.neighbors_at(neighbor, layer).len() > cap {
                    self.prune_overflow(neighbor, layer, cap);
                }
            }

            entry_points = candidates.iter().map(|c| c.id).collect();
            if entry_points.is_empty() {
                entry_points = vec![entry];
            }
        }
    }

    /// Re-select a node's neighbors after its list exceeded capacity.
    fn prune_overflow(&mut self, id: VectorId, layer: usize, cap: usize) {
        let base = match self.store.vector(id) {
            Some(v) => v.to_vec(),
            None => return,
        };
        let metric = self.config.metric;

        let mut candidates: Vec<Candidate> = self
            .graph
            .neighbors_at(id, layer)
            .iter()
            .filter_map(|&neighbor| {
                self.store.vector(neighbor).map(|v| Candidate {
                    id: neighbor,
                    distance: metric.compute(&base, v),
                })
            })
            .collect();
        candidates.sort_unstable();

        let kept = select_neighbors(self.store, metric, &candidates, cap);
        self.graph.set_neighbors_at(id, layer, kept);
    }
}

/// Diversity-aware neighbor selection.
///
/// Candidates must be sorted by ascending distance to the base point. A
/// candidate is accepted only while no already-accepted neighbor is
/// strictly closer to it than the base point is, which spreads edges
/// across directions instead of clustering them.
fn select_neighbors(
    store: &VectorStore,
    metric: DistanceMetric,
    candidates: &[Candidate],
    m: usize,
) -> Vec<VectorId> {
    if candidates.len() <= m {
        return candidates.iter().map(|c| c.id).collect();
    }

    let mut selected: Vec<Candidate> = Vec::with_capacity(m);
    for &candidate in candidates {
        if selected.len() >= m {
            break;
        }
        let vector = match store.vector(candidate.id) {
            Some(v) => v,
            None => continue,
        };

        let mut keep = true;
        for picked in &selected {
            let picked_vector = match store.vector(picked.id) {
                Some(v) => v,
                None => continue,
            };
            if metric.compute(vector, picked_vector) < candidate.distance {
                keep = false;
                break;
            }
        }

        if keep {
            selected.push(candidate);
        }
    }

    selected.into_iter().map(|c| c.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build_state(dimension: usize) -> (VectorStore, GraphIndex, IndexConfig, LevelSampler) {
        let config = IndexConfig {
            dimension,
            m: 4,
            ef_construction: 16,
            ef_search: 16,
            ..Default::default()
        };
        let sampler = LevelSampler::with_seed(config.m, 42);
        (
            VectorStore::new(dimension),
            GraphIndex::new(),
            config,
            sampler,
        )
    }

    #[test]
    fn test_insert_first_node_becomes_entry() {
        let (mut store, mut graph, config, mut sampler) = build_state(2);
        let mut builder = Builder::new(&mut store, &mut graph, &config, &mut sampler);

        let id = builder.insert(vec![1.0, 0.0], json!(null)).unwrap();
        assert_eq!(id, 0);
        assert_eq!(graph.len(), 1);
        let (entry, _) = graph.entry_point().unwrap();
        assert_eq!(entry, 0);
    }

    #[test]
    fn test_insert_dimension_mismatch_leaves_state_untouched() {
        let (mut store, mut graph, config, mut sampler) = build_state(2);
        let mut builder = Builder::new(&mut store, &mut graph, &config, &mut sampler);

        let result = builder.insert(vec![1.0, 0.0, 0.0], json!(null));
        assert!(matches!(
            result,
            Err(ChitraError::DimensionMismatch { .. })
        ));
        assert!(store.is_empty());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_inserted_nodes_are_bidirectionally_linked() {
        let (mut store, mut graph, config, mut sampler) = build_state(2);
        let mut builder = Builder::new(&mut store, &mut graph, &config, &mut sampler);

        builder.insert(vec![1.0, 0.0], json!(null)).unwrap();
        builder.insert(vec![0.9, 0.1], json!(null)).unwrap();

        assert_eq!(graph.neighbors_at(0, 0), &[1]);
        assert_eq!(graph.neighbors_at(1, 0), &[0]);
    }

    #[test]
    fn test_degree_stays_bounded() {
        let (mut store, mut graph, config, mut sampler) = build_state(2);
        let mut builder = Builder::new(&mut store, &mut graph, &config, &mut sampler);

        for i in 0..100 {
            let angle = i as f32 * 0.05;
            builder
                .insert(vec![angle.cos(), angle.sin()], json!(null))
                .unwrap();
        }

        for id in 0..100u64 {
            let max_layer = graph.max_layer_of(id).unwrap();
            for layer in 0..=max_layer {
                let cap = config.max_connections(layer);
                assert!(
                    graph.neighbors_at(id, layer).len() <= cap,
                    "node {} exceeds cap at layer {}",
                    id,
                    layer
                );
            }
        }
    }

    #[test]
    fn test_no_self_references_or_duplicates() {
        let (mut store, mut graph, config, mut sampler) = build_state(2);
        let mut builder = Builder::new(&mut store, &mut graph, &config, &mut sampler);

        for i in 0..50 {
            let angle = i as f32 * 0.1;
            builder
                .insert(vec![angle.cos(), angle.sin()], json!(null))
                .unwrap();
        }

        for id in 0..50u64 {
            let max_layer = graph.max_layer_of(id).unwrap();
            for layer in 0..=max_layer {
                let neighbors = graph.neighbors_at(id, layer);
                assert!(!neighbors.contains(&id));
                for (pos, &n) in neighbors.iter().enumerate() {
                    assert!(!neighbors[..pos].contains(&n));
                }
            }
        }
    }

    #[test]
    fn test_entry_point_tracks_highest_layer() {
        let (mut store, mut graph, config, mut sampler) = build_state(2);
        let mut builder = Builder::new(&mut store, &mut graph, &config, &mut sampler);

        for i in 0..200 {
            let angle = i as f32 * 0.03;
            builder
                .insert(vec![angle.cos(), angle.sin()], json!(null))
                .unwrap();
        }

        let (entry, entry_layer) = graph.entry_point().unwrap();
        assert_eq!(graph.max_layer_of(entry), Some(entry_layer));
        for id in 0..200u64 {
            assert!(graph.max_layer_of(id).unwrap() <= entry_layer);
        }
    }

    #[test]
    fn test_insert_batch() {
        let (mut store, mut graph, config, mut sampler) = build_state(2);
        let mut builder = Builder::new(&mut store, &mut graph, &config, &mut sampler);

        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]];
        let metadata = vec![json!("a"), json!("b"), json!("c")];
        let ids = builder.insert_batch(vectors, metadata).unwrap();

        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_insert_batch_length_mismatch() {
        let (mut store, mut graph, config, mut sampler) = build_state(2);
        let mut builder = Builder::new(&mut store, &mut graph, &config, &mut sampler);

        let result = builder.insert_batch(vec![vec![1.0, 0.0]], vec![]);
        assert!(matches!(result, Err(ChitraError::InvalidInput(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_insert_batch_validates_dimensions_upfront() {
        let (mut store, mut graph, config, mut sampler) = build_state(2);
        let mut builder = Builder::new(&mut store, &mut graph, &config, &mut sampler);

        let vectors = vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]];
        let metadata = vec![json!(null), json!(null)];
        let result = builder.insert_batch(vectors, metadata);

        assert!(matches!(
            result,
            Err(ChitraError::DimensionMismatch { .. })
        ));
        // Nothing was inserted, including the well-formed first vector.
        assert!(store.is_empty());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_select_neighbors_prefers_diverse_directions() {
        let mut store = VectorStore::new(2);
        // Two near-duplicates to the right of the base point, one candidate
        // on the opposite side.
        store.add(vec![1.0, 0.0], json!(null)).unwrap(); // 0: right
        store.add(vec![0.99, 0.14], json!(null)).unwrap(); // 1: right, close to 0
        store.add(vec![-1.0, 0.0], json!(null)).unwrap(); // 2: left

        let base = [0.5, 0.0];
        let metric = DistanceMetric::Euclidean;
        let mut candidates: Vec<Candidate> = (0..3u64)
            .map(|id| Candidate {
                id,
                distance: metric.compute(&base, store.vector(id).unwrap()),
            })
            .collect();
        candidates.sort_unstable();

        let selected = select_neighbors(&store, metric, &candidates, 2);

        // The near-duplicate of the closest candidate is skipped in favor of
        // the one covering the opposite direction.
        assert_eq!(selected, vec![0, 2]);
    }

    #[test]
    fn test_select_neighbors_short_candidate_list_passes_through() {
        let mut store = VectorStore::new(2);
        store.add(vec![1.0, 0.0], json!(null)).unwrap();

        let candidates = vec![Candidate {
            id: 0,
            distance: 0.1,
        }];
        let selected = select_neighbors(&store, DistanceMetric::Euclidean, &candidates, 4);
        assert_eq!(selected, vec![0]);
    }
}
