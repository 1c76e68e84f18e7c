//! Index snapshot save/load orchestration.
//!
//! Composes the index's exportable contents with the snapshot file format:
//! the header carries the configuration, entry point, and vector count; the
//! bincode payload carries the vector table and graph topology.

use std::path::Path;

use tracing::info;

use chitra_common::{ChitraError, DistanceMetric, IndexConfig, Result};
use chitra_hnsw::{HnswIndex, IndexParts};
use chitra_storage::{write_snapshot, MmapSnapshot, SnapshotHeader, NO_ENTRY_POINT};

/// File extension used for index snapshots.
pub const SNAPSHOT_EXTENSION: &str = "idx";

/// Save an index snapshot to `path`.
///
/// Uses the atomic write-then-replace discipline of `chitra-storage`; an
/// existing snapshot at `path` stays intact if anything fails.
///
/// # Errors
///
/// Returns `Serialization` if the contents cannot be encoded and `Storage`
/// on filesystem failures.
pub fn save_index<P: AsRef<Path>>(path: P, index: &HnswIndex) -> Result<()> {
    let parts = index.export_parts();
    let config = index.config();

    let header = SnapshotHeader {
        magic: *SnapshotHeader::MAGIC,
        version: SnapshotHeader::VERSION,
        dimension: config.dimension as u32,
        metric: config.metric.as_tag(),
        m: config.m as u32,
        ef_construction: config.ef_construction as u32,
        ef_search: config.ef_search as u32,
        entry_layer: parts.entry_point.map(|(_, layer)| layer as u32).unwrap_or(0),
        entry_point: parts.entry_point.map(|(id, _)| id).unwrap_or(NO_ENTRY_POINT),
        num_vectors: parts.vectors.len() as u64,
    };

    let payload = bincode::serialize(&parts)
        .map_err(|e| ChitraError::Serialization(format!("Failed to encode snapshot: {}", e)))?;

    write_snapshot(&path, &header, &payload)?;
    info!(
        "Saved index snapshot: {} vectors to {}",
        header.num_vectors,
        path.as_ref().display()
    );
    Ok(())
}

/// Load an index from a snapshot at `path`.
///
/// Builds a fresh index; an already-loaded in-memory index is never
/// affected by a failed load.
///
/// # Errors
///
/// Returns `Storage` if the file cannot be read and `CorruptSnapshot` if
/// the header, payload, or graph structure fails validation.
pub fn load_index<P: AsRef<Path>>(path: P) -> Result<HnswIndex> {
    let snapshot = MmapSnapshot::load(&path)?;
    let header = *snapshot.header();

    let metric = DistanceMetric::from_tag(header.metric).ok_or_else(|| {
        ChitraError::CorruptSnapshot(format!("unknown distance metric tag {}", header.metric))
    })?;

    let config = IndexConfig {
        dimension: header.dimension as usize,
        metric,
        m: header.m as usize,
        ef_construction: header.ef_construction as usize,
        ef_search: header.ef_search as usize,
    };

    let parts: IndexParts = bincode::deserialize(snapshot.payload())
        .map_err(|e| ChitraError::CorruptSnapshot(format!("Failed to decode payload: {}", e)))?;

    if parts.vectors.len() as u64 != header.num_vectors {
        return Err(ChitraError::CorruptSnapshot(format!(
            "header declares {} vectors but payload has {}",
            header.num_vectors,
            parts.vectors.len()
        )));
    }

    let header_entry = if header.entry_point == NO_ENTRY_POINT {
        None
    } else {
        Some((header.entry_point, header.entry_layer as usize))
    };
    if parts.entry_point != header_entry {
        return Err(ChitraError::CorruptSnapshot(
            "header entry point disagrees with payload".to_string(),
        ));
    }

    let index = HnswIndex::from_parts(config, parts).map_err(|e| match e {
        // A bad configuration in a snapshot is a corrupt snapshot, not a
        // caller error.
        ChitraError::Config(msg) => ChitraError::CorruptSnapshot(msg),
        other => other,
    })?;

    info!(
        "Loaded index snapshot: {} vectors from {}",
        index.len(),
        path.as_ref().display()
    );
    Ok(index)
}

/// List the names of snapshots (files with the `.idx` extension) in a
/// directory, sorted alphabetically.
///
/// # Errors
///
/// Returns `Storage` if the directory cannot be read.
pub fn list_snapshots<P: AsRef<Path>>(dir: P) -> Result<Vec<String>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| ChitraError::Storage(format!("Failed to read snapshot directory: {}", e)))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| ChitraError::Storage(format!("Failed to read directory entry: {}", e)))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(SNAPSHOT_EXTENSION) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
    }

    names.sort();
    Ok(names)
}

/// Delete a snapshot file.
///
/// # Errors
///
/// Returns `Storage` if the file exists but cannot be removed. Deleting a
/// missing snapshot is a no-op.
pub fn delete_snapshot<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(());
    }
    std::fs::remove_file(path)
        .map_err(|e| ChitraError::Storage(format!("Failed to delete snapshot: {}", e)))?;
    Ok(())
}
