//! Error types for Chitra.

/// Main error type for Chitra operations.
#[derive(Debug, thiserror::Error)]
pub enum ChitraError {
    /// Vector length does not match the index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Lookup of an id that was never assigned
    #[error("Unknown vector id: {0}")]
    UnknownId(u64),

    /// A persisted snapshot failed validation on load
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// Storage/IO error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using ChitraError.
pub type Result<T> = std::result::Result<T, ChitraError>;
