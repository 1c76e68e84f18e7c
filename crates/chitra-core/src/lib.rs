//! Core API for the Chitra vector index.
//!
//! Re-exports the index itself and provides snapshot persistence, passive
//! query metrics, and search quality evaluation around it.

pub mod evaluation;
pub mod metrics;
pub mod persistence;

pub use chitra_common::{
    ChitraError, DistanceMetric, IndexConfig, Result, SearchResult, Vector, VectorId,
};
pub use chitra_hnsw::{HnswIndex, IndexStats};
pub use metrics::{MetricsCollector, MetricsReport, QueryRecord};
pub use persistence::{delete_snapshot, list_snapshots, load_index, save_index};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::metrics::MetricsCollector;
    pub use crate::persistence::{load_index, save_index};
    pub use chitra_common::{DistanceMetric, IndexConfig, Result, SearchResult};
    pub use chitra_hnsw::HnswIndex;
}
