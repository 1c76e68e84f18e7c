//! Common types used throughout Chitra.

use serde::{Deserialize, Serialize};

/// Vector type alias
pub type Vector = Vec<f32>;

/// Stable vector identifier, assigned densely at insertion and never reused
pub type VectorId = u64;

/// Distance metric for vector similarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Cosine distance (1 - cosine similarity)
    Cosine,
    /// Euclidean distance (L2)
    Euclidean,
}

impl Default for DistanceMetric {
    fn default() -> Self {
        Self::Cosine
    }
}

impl DistanceMetric {
    /// Compute the distance between two vectors.
    ///
    /// Both slices must have the same length; the caller is responsible
    /// for dimension validation.
    pub fn compute(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => {
                let mut dot = 0.0f32;
                let mut norm_a = 0.0f32;
                let mut norm_b = 0.0f32;
                for (x, y) in a.iter().zip(b.iter()) {
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                let denom = norm_a.sqrt() * norm_b.sqrt();
                if denom == 0.0 {
                    1.0
                } else {
                    1.0 - dot / denom
                }
            }
            Self::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
        }
    }

    /// Convert a distance into a similarity score in a metric-appropriate way.
    pub fn similarity(&self, distance: f32) -> f32 {
        match self {
            Self::Cosine => 1.0 - distance,
            Self::Euclidean => 1.0 / (1.0 + distance),
        }
    }

    /// Stable numeric tag used in the snapshot header.
    pub fn as_tag(&self) -> u32 {
        match self {
            Self::Cosine => 0,
            Self::Euclidean => 1,
        }
    }

    /// Reverse of [`DistanceMetric::as_tag`]. Returns `None` for unknown tags.
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::Cosine),
            1 => Some(Self::Euclidean),
            _ => None,
        }
    }
}

/// Search result from a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Vector ID
    pub id: VectorId,
    /// Raw distance to the query vector
    pub distance: f32,
    /// Derived similarity score
    pub similarity: f32,
    /// Opaque metadata associated with the vector at insertion time
    pub metadata: serde_json::Value,
}
