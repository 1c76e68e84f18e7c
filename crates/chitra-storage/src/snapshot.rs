//! Snapshot file format and serialization.
//!
//! A snapshot is a single file: a fixed-size header followed by an opaque
//! payload. Writes go to a temporary file in the destination directory and
//! are atomically renamed over the target, so a crash mid-write never
//! corrupts a previously valid snapshot.

use memmap2::{Mmap, MmapOptions};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chitra_common::{ChitraError, Result};

/// Sentinel for the `entry_point` header field of an empty index.
pub const NO_ENTRY_POINT: u64 = u64::MAX;

/// Snapshot header structure.
///
/// Field order keeps the bincode encoding at a fixed 48 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    /// Magic bytes: "CHIT"
    pub magic: [u8; 4],
    /// Format version
    pub version: u32,
    /// Vector dimension
    pub dimension: u32,
    /// Distance metric tag
    pub metric: u32,
    /// Graph degree parameter
    pub m: u32,
    /// Construction-time candidate-set size
    pub ef_construction: u32,
    /// Search-time candidate-set size
    pub ef_search: u32,
    /// Layer of the entry point (0 when the index is empty)
    pub entry_layer: u32,
    /// Entry point id, or [`NO_ENTRY_POINT`] when the index is empty
    pub entry_point: u64,
    /// Number of vectors
    pub num_vectors: u64,
}

impl SnapshotHeader {
    /// Magic bytes constant
    pub const MAGIC: &'static [u8; 4] = b"CHIT";

    /// Current format version
    pub const VERSION: u32 = 1;

    /// Serialized header size in bytes.
    pub fn size() -> usize {
        // u8 x 4, u32 x 7, u64 x 2 with fixed-width integer encoding.
        4 + 7 * 4 + 2 * 8
    }

    /// Validate magic bytes.
    pub fn is_valid(&self) -> bool {
        &self.magic == Self::MAGIC
    }

    /// Validate version.
    pub fn is_version_supported(&self) -> bool {
        self.version == Self::VERSION
    }

    /// Validate the entire header.
    ///
    /// # Errors
    ///
    /// Returns `CorruptSnapshot` describing the first failed check.
    pub fn validate(&self) -> Result<()> {
        if !self.is_valid() {
            return Err(ChitraError::CorruptSnapshot(
                "invalid magic bytes in snapshot header".to_string(),
            ));
        }

        if !self.is_version_supported() {
            return Err(ChitraError::CorruptSnapshot(format!(
                "unsupported snapshot version: {}",
                self.version
            )));
        }

        if self.dimension == 0 {
            return Err(ChitraError::CorruptSnapshot(
                "snapshot dimension cannot be zero".to_string(),
            ));
        }

        if self.entry_point == NO_ENTRY_POINT && self.num_vectors != 0 {
            return Err(ChitraError::CorruptSnapshot(
                "snapshot has vectors but no entry point".to_string(),
            ));
        }

        Ok(())
    }
}

/// Write a snapshot using a write-then-atomically-replace discipline.
///
/// The header and payload are written to `<destination>.tmp`, synced to
/// disk, and then renamed over the destination path. Parent directories
/// are created if missing.
///
/// # Errors
///
/// Returns `Storage` on any filesystem failure and `Serialization` if the
/// header cannot be encoded.
pub fn write_snapshot<P: AsRef<Path>>(
    path: P,
    header: &SnapshotHeader,
    payload: &[u8],
) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                ChitraError::Storage(format!("Failed to create snapshot directory: {}", e))
            })?;
        }
    }

    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_path);

    let header_bytes = bincode::serialize(header)
        .map_err(|e| ChitraError::Serialization(format!("Failed to encode header: {}", e)))?;

    let mut file = File::create(&tmp_path)
        .map_err(|e| ChitraError::Storage(format!("Failed to create snapshot file: {}", e)))?;
    file.write_all(&header_bytes)
        .map_err(|e| ChitraError::Storage(format!("Failed to write header: {}", e)))?;
    file.write_all(payload)
        .map_err(|e| ChitraError::Storage(format!("Failed to write payload: {}", e)))?;
    file.sync_all()
        .map_err(|e| ChitraError::Storage(format!("Failed to sync snapshot: {}", e)))?;
    drop(file);

    fs::rename(&tmp_path, path)
        .map_err(|e| ChitraError::Storage(format!("Failed to replace snapshot: {}", e)))?;

    Ok(())
}

/// Memory-mapped snapshot file.
#[derive(Debug)]
pub struct MmapSnapshot {
    mmap: Mmap,
    header: SnapshotHeader,
}

impl MmapSnapshot {
    /// Load a snapshot file using memory mapping and validate its header.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the file cannot be opened or mapped, and
    /// `CorruptSnapshot` if it is too small or fails header validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .map_err(|e| ChitraError::Storage(format!("Failed to open snapshot file: {}", e)))?;

        let mmap = unsafe {
            MmapOptions::new()
                .map(&file)
                .map_err(|e| ChitraError::Storage(format!("Failed to memory-map file: {}", e)))?
        };

        if mmap.len() < SnapshotHeader::size() {
            return Err(ChitraError::CorruptSnapshot(
                "snapshot file too small to contain header".to_string(),
            ));
        }

        let header: SnapshotHeader = bincode::deserialize(&mmap[..SnapshotHeader::size()])
            .map_err(|e| {
                ChitraError::CorruptSnapshot(format!("Failed to decode header: {}", e))
            })?;

        header.validate()?;

        Ok(Self { mmap, header })
    }

    /// The validated snapshot header.
    pub fn header(&self) -> &SnapshotHeader {
        &self.header
    }

    /// Raw payload bytes (everything after the header).
    pub fn payload(&self) -> &[u8] {
        &self.mmap[SnapshotHeader::size()..]
    }
}
