//! Snapshot file format and low-level persistence for Chitra indexes.

pub mod snapshot;

pub use snapshot::{write_snapshot, MmapSnapshot, SnapshotHeader, NO_ENTRY_POINT};
