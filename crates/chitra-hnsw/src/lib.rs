//! HNSW (Hierarchical Navigable Small World) index for Chitra.
//!
//! Provides graph-based approximate nearest-neighbor search over
//! fixed-dimension embeddings with opaque per-vector metadata.

pub mod builder;
pub mod graph;
pub mod level;
pub mod searcher;
pub mod store;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use chitra_common::{DistanceMetric, IndexConfig, Result, SearchResult, Vector, VectorId};

use crate::builder::Builder;
use crate::graph::{GraphIndex, Node};
use crate::level::LevelSampler;
use crate::searcher::Searcher;
use crate::store::VectorStore;

/// Everything the single writer mutates, behind one lock so that readers
/// always observe a consistent store/graph pair.
struct IndexState {
    store: VectorStore,
    graph: GraphIndex,
    sampler: LevelSampler,
}

/// An in-memory approximate nearest-neighbor index.
///
/// Insertion takes the write lock (one writer at a time); searches share
/// the read lock for their whole traversal and never mutate the graph, so
/// any number of them may run concurrently.
pub struct HnswIndex {
    config: IndexConfig,
    state: RwLock<IndexState>,
}

/// Summary statistics for an index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    /// Number of indexed vectors
    pub num_vectors: usize,
    /// Vector dimension
    pub dimension: usize,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Graph degree parameter
    pub m: usize,
    /// Construction-time candidate-set size
    pub ef_construction: usize,
    /// Search-time candidate-set size
    pub ef_search: usize,
    /// Number of populated layers (0 when empty)
    pub num_layers: usize,
    /// Current entry point, if any
    pub entry_point: Option<VectorId>,
}

/// Exportable index contents: the vector table and the graph topology.
///
/// This is the serialization form of an index; rebuilding from it via
/// [`HnswIndex::from_parts`] validates every structural invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexParts {
    /// Vectors in id order
    pub vectors: Vec<Vector>,
    /// Metadata values in id order
    pub metadata: Vec<serde_json::Value>,
    /// Graph nodes in id order
    pub nodes: Vec<Node>,
    /// Entry point `(id, layer)`, `None` for an empty index
    pub entry_point: Option<(VectorId, usize)>,
}

impl HnswIndex {
    /// Create an empty index with layer sampling seeded from OS entropy.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration is invalid.
    pub fn new(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let sampler = LevelSampler::new(config.m);
        Ok(Self::from_state(
            config.clone(),
            VectorStore::new(config.dimension),
            GraphIndex::new(),
            sampler,
        ))
    }

    /// Create an empty index with a deterministically seeded layer sampler.
    ///
    /// Two indexes built with the same seed, configuration, and insertion
    /// sequence are structurally identical.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration is invalid.
    pub fn with_seed(config: IndexConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let sampler = LevelSampler::with_seed(config.m, seed);
        Ok(Self::from_state(
            config.clone(),
            VectorStore::new(config.dimension),
            GraphIndex::new(),
            sampler,
        ))
    }

    fn from_state(
        config: IndexConfig,
        store: VectorStore,
        graph: GraphIndex,
        sampler: LevelSampler,
    ) -> Self {
        Self {
            config,
            state: RwLock::new(IndexState {
                store,
                graph,
                sampler,
            }),
        }
    }

    /// Insert a vector with its metadata and return the assigned id.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` before any mutation if the vector length
    /// does not equal the index dimension.
    pub fn insert(&self, vector: Vector, metadata: serde_json::Value) -> Result<VectorId> {
        let mut state = self.state.write();
        let IndexState {
            store,
            graph,
            sampler,
        } = &mut *state;
        Builder::new(store, graph, &self.config, sampler).insert(vector, metadata)
    }

    /// Insert a batch of vectors, validating the whole batch first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` on a length mismatch between the two inputs,
    /// or `DimensionMismatch` for a wrong-dimension vector; either way the
    /// index is untouched.
    pub fn insert_batch(
        &self,
        vectors: Vec<Vector>,
        metadata: Vec<serde_json::Value>,
    ) -> Result<Vec<VectorId>> {
        let mut state = self.state.write();
        let IndexState {
            store,
            graph,
            sampler,
        } = &mut *state;
        Builder::new(store, graph, &self.config, sampler).insert_batch(vectors, metadata)
    }

    /// Find the `k` approximate nearest neighbors of `query`, sorted by
    /// ascending distance.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the query length does not equal the
    /// index dimension. An empty index or `k == 0` yields an empty result.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let state = self.state.read();
        Searcher::new(&state.store, &state.graph, &self.config).search(query, k, None)
    }

    /// Like [`HnswIndex::search`], with an explicit `ef` ceiling for this
    /// call. Larger values trade latency for recall.
    pub fn search_with_ef(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<SearchResult>> {
        let state = self.state.read();
        Searcher::new(&state.store, &state.graph, &self.config).search(query, k, Some(ef))
    }

    /// Look up a stored vector and its metadata by id.
    ///
    /// # Errors
    ///
    /// Returns `UnknownId` if the id was never assigned.
    pub fn get(&self, id: VectorId) -> Result<(Vector, serde_json::Value)> {
        let state = self.state.read();
        let (vector, metadata) = state.store.get(id)?;
        Ok((vector.to_vec(), metadata.clone()))
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.state.read().store.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.state.read().store.is_empty()
    }

    /// The fixed vector dimension.
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// The index configuration.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Summary statistics for the current index contents.
    pub fn stats(&self) -> IndexStats {
        let state = self.state.read();
        IndexStats {
            num_vectors: state.store.len(),
            dimension: self.config.dimension,
            metric: self.config.metric,
            m: self.config.m,
            ef_construction: self.config.ef_construction,
            ef_search: self.config.ef_search,
            num_layers: state
                .graph
                .entry_point()
                .map(|(_, layer)| layer + 1)
                .unwrap_or(0),
            entry_point: state.graph.entry_point().map(|(id, _)| id),
        }
    }

    /// Export a deep copy of the index contents for serialization.
    pub fn export_parts(&self) -> IndexParts {
        let state = self.state.read();
        IndexParts {
            vectors: state.store.vectors().to_vec(),
            metadata: state.store.metadata_values().to_vec(),
            nodes: state.graph.nodes().to_vec(),
            entry_point: state.graph.entry_point(),
        }
    }

    /// Rebuild an index from exported contents.
    ///
    /// # Errors
    ///
    /// Returns `Config` for an invalid configuration, or `CorruptSnapshot`
    /// when the contents violate a structural invariant (table length or
    /// dimension mismatches, dangling neighbor ids, a misplaced entry
    /// point).
    pub fn from_parts(config: IndexConfig, parts: IndexParts) -> Result<Self> {
        config.validate()?;

        if parts.vectors.len() != parts.nodes.len() {
            return Err(chitra_common::ChitraError::CorruptSnapshot(format!(
                "vector table has {} entries but graph has {} nodes",
                parts.vectors.len(),
                parts.nodes.len()
            )));
        }

        let store = VectorStore::from_parts(config.dimension, parts.vectors, parts.metadata)?;
        let graph = GraphIndex::from_parts(parts.nodes, parts.entry_point)?;
        let sampler = LevelSampler::new(config.m);

        Ok(Self::from_state(config, store, graph, sampler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chitra_common::ChitraError;
    use serde_json::json;

    fn small_config() -> IndexConfig {
        IndexConfig {
            dimension: 2,
            m: 4,
            ef_construction: 32,
            ef_search: 16,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_validates_config() {
        let config = IndexConfig {
            dimension: 0,
            ..Default::default()
        };
        assert!(HnswIndex::new(config).is_err());
    }

    #[test]
    fn test_insert_and_search() {
        let index = HnswIndex::with_seed(small_config(), 1).unwrap();

        index.insert(vec![1.0, 0.0], json!("a")).unwrap();
        index.insert(vec![0.0, 1.0], json!("b")).unwrap();

        let results = index.search(&[1.0, 0.1], 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 0);
        assert_eq!(results[0].metadata, json!("a"));
    }

    #[test]
    fn test_len_and_is_empty() {
        let index = HnswIndex::with_seed(small_config(), 1).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);

        index.insert(vec![1.0, 0.0], json!(null)).unwrap();
        assert!(!index.is_empty());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_get() {
        let index = HnswIndex::with_seed(small_config(), 1).unwrap();
        let id = index.insert(vec![0.5, 0.5], json!({"k": 1})).unwrap();

        let (vector, metadata) = index.get(id).unwrap();
        assert_eq!(vector, vec![0.5, 0.5]);
        assert_eq!(metadata, json!({"k": 1}));

        assert!(matches!(index.get(42), Err(ChitraError::UnknownId(42))));
    }

    #[test]
    fn test_stats() {
        let index = HnswIndex::with_seed(small_config(), 1).unwrap();
        let stats = index.stats();
        assert_eq!(stats.num_vectors, 0);
        assert_eq!(stats.num_layers, 0);
        assert_eq!(stats.entry_point, None);

        for i in 0..20 {
            let angle = i as f32 * 0.3;
            index
                .insert(vec![angle.cos(), angle.sin()], json!(null))
                .unwrap();
        }

        let stats = index.stats();
        assert_eq!(stats.num_vectors, 20);
        assert_eq!(stats.dimension, 2);
        assert_eq!(stats.m, 4);
        assert!(stats.num_layers >= 1);
        assert!(stats.entry_point.is_some());
    }

    #[test]
    fn test_export_import_roundtrip() {
        let index = HnswIndex::with_seed(small_config(), 9).unwrap();
        for i in 0..30 {
            let angle = i as f32 * 0.2;
            index
                .insert(vec![angle.cos(), angle.sin()], json!(i))
                .unwrap();
        }

        let parts = index.export_parts();
        let restored = HnswIndex::from_parts(small_config(), parts.clone()).unwrap();

        assert_eq!(restored.len(), 30);
        assert_eq!(restored.export_parts(), parts);

        let query = [0.8, 0.6];
        let before = index.search(&query, 5).unwrap();
        let after = restored.search(&query, 5).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_from_parts_rejects_table_mismatch() {
        let index = HnswIndex::with_seed(small_config(), 9).unwrap();
        index.insert(vec![1.0, 0.0], json!(null)).unwrap();

        let mut parts = index.export_parts();
        parts.vectors.push(vec![0.0, 1.0]);
        parts.metadata.push(json!(null));

        let result = HnswIndex::from_parts(small_config(), parts);
        assert!(matches!(result, Err(ChitraError::CorruptSnapshot(_))));
    }

    #[test]
    fn test_seeded_builds_are_identical() {
        let build = || {
            let index = HnswIndex::with_seed(small_config(), 1234).unwrap();
            for i in 0..100 {
                let angle = i as f32 * 0.07;
                index
                    .insert(vec![angle.cos(), angle.sin()], json!(null))
                    .unwrap();
            }
            index.export_parts()
        };

        assert_eq!(build(), build());
    }

    #[test]
    fn test_concurrent_searches() {
        use std::sync::Arc;

        let index = Arc::new(HnswIndex::with_seed(small_config(), 5).unwrap());
        for i in 0..200 {
            let angle = i as f32 * 0.05;
            index
                .insert(vec![angle.cos(), angle.sin()], json!(null))
                .unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || {
                    let angle = t as f32 * 0.4;
                    let query = [angle.cos(), angle.sin()];
                    for _ in 0..50 {
                        let results = index.search(&query, 5).unwrap();
                        assert_eq!(results.len(), 5);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
