//! Vector storage with stable id assignment.

use chitra_common::{ChitraError, Result, Vector, VectorId};

/// Owns the raw vectors and their opaque metadata, and assigns stable ids.
///
/// Ids are dense: the n-th inserted vector gets id `n - 1`. Vectors are
/// immutable once stored and are never removed.
#[derive(Debug, Clone)]
pub struct VectorStore {
    dimension: usize,
    vectors: Vec<Vector>,
    metadata: Vec<serde_json::Value>,
}

impl VectorStore {
    /// Create an empty store for vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            metadata: Vec::new(),
        }
    }

    /// Store a vector with its metadata and return the assigned id.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the vector length does not equal the
    /// store dimension. Nothing is mutated in that case.
    pub fn add(&mut self, vector: Vector, metadata: serde_json::Value) -> Result<VectorId> {
        if vector.len() != self.dimension {
            return Err(ChitraError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let id = self.vectors.len() as VectorId;
        self.vectors.push(vector);
        self.metadata.push(metadata);
        Ok(id)
    }

    /// Constant-time lookup of a vector and its metadata.
    ///
    /// # Errors
    ///
    /// Returns `UnknownId` if the id was never assigned.
    pub fn get(&self, id: VectorId) -> Result<(&[f32], &serde_json::Value)> {
        let idx = id as usize;
        match (self.vectors.get(idx), self.metadata.get(idx)) {
            (Some(vector), Some(meta)) => Ok((vector.as_slice(), meta)),
            _ => Err(ChitraError::UnknownId(id)),
        }
    }

    /// Get a vector by id, or `None` if the id was never assigned.
    pub fn vector(&self, id: VectorId) -> Option<&[f32]> {
        self.vectors.get(id as usize).map(|v| v.as_slice())
    }

    /// Get the metadata for an id, or `None` if the id was never assigned.
    pub fn metadata(&self, id: VectorId) -> Option<&serde_json::Value> {
        self.metadata.get(id as usize)
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// The fixed vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// All stored vectors in id order.
    pub fn vectors(&self) -> &[Vector] {
        &self.vectors
    }

    /// All metadata values in id order.
    pub fn metadata_values(&self) -> &[serde_json::Value] {
        &self.metadata
    }

    /// Rebuild a store from previously exported contents.
    ///
    /// # Errors
    ///
    /// Returns `CorruptSnapshot` if the two tables differ in length or any
    /// vector does not match the dimension.
    pub fn from_parts(
        dimension: usize,
        vectors: Vec<Vector>,
        metadata: Vec<serde_json::Value>,
    ) -> Result<Self> {
        if vectors.len() != metadata.len() {
            return Err(ChitraError::CorruptSnapshot(format!(
                "vector table has {} vectors but {} metadata entries",
                vectors.len(),
                metadata.len()
            )));
        }

        for (i, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(ChitraError::CorruptSnapshot(format!(
                    "vector {} has dimension {} (expected {})",
                    i,
                    vector.len(),
                    dimension
                )));
            }
        }

        Ok(Self {
            dimension,
            vectors,
            metadata,
        })
    }
}
