//! Configuration types for Chitra.

use crate::{DistanceMetric, Result, ChitraError};
use serde::{Deserialize, Serialize};

/// Configuration for a Chitra index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Vector dimension
    pub dimension: usize,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Maximum number of neighbors per node per layer (doubled at layer 0)
    pub m: usize,
    /// Candidate-set size during insertion
    pub ef_construction: usize,
    /// Candidate-set size during search
    pub ef_search: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimension: 512,
            metric: DistanceMetric::Cosine,
            m: 16,
            ef_construction: 200,
            ef_search: 50,
        }
    }
}

impl IndexConfig {
    /// Create a configuration with the given dimension and default parameters.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    /// Neighbor-list capacity at a given layer.
    pub fn max_connections(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m * 2
        } else {
            self.m
        }
    }

    /// Level generation multiplier, `1 / ln(m)`.
    pub fn level_multiplier(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }

    /// Validate the configuration.
    ///
    /// # Returns
    ///
    /// Returns `Ok(())` if valid, otherwise returns an error.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(ChitraError::Config(
                "Index dimension must be greater than 0".to_string(),
            ));
        }

        if self.dimension > 10000 {
            return Err(ChitraError::Config(
                "Index dimension cannot exceed 10000".to_string(),
            ));
        }

        if self.m < 2 {
            return Err(ChitraError::Config(
                "Graph degree m must be at least 2".to_string(),
            ));
        }

        if self.ef_construction == 0 {
            return Err(ChitraError::Config(
                "ef_construction must be greater than 0".to_string(),
            ));
        }

        if self.ef_search == 0 {
            return Err(ChitraError::Config(
                "ef_search must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = IndexConfig::default();
        assert_eq!(config.dimension, 512);
        assert_eq!(config.metric, DistanceMetric::Cosine);
        assert_eq!(config.m, 16);
        assert_eq!(config.ef_construction, 200);
        assert_eq!(config.ef_search, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_with_dimension() {
        let config = IndexConfig::with_dimension(768);
        assert_eq!(config.dimension, 768);
        assert_eq!(config.m, 16);
    }

    #[test]
    fn test_max_connections() {
        let config = IndexConfig::default();
        assert_eq!(config.max_connections(0), 32);
        assert_eq!(config.max_connections(1), 16);
        assert_eq!(config.max_connections(5), 16);
    }

    #[test]
    fn test_level_multiplier() {
        let config = IndexConfig::default();
        let expected = 1.0 / (16.0f64).ln();
        assert!((config.level_multiplier() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_validate_zero_dimension() {
        let config = IndexConfig {
            dimension: 0,
            ..Default::default()
        };
        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("dimension must be greater than 0"));
    }

    #[test]
    fn test_validate_dimension_too_large() {
        let config = IndexConfig {
            dimension: 10001,
            ..Default::default()
        };
        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("dimension cannot exceed 10000"));
    }

    #[test]
    fn test_validate_degenerate_m() {
        let config = IndexConfig {
            m: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_ef() {
        let config = IndexConfig {
            ef_construction: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = IndexConfig {
            ef_search: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = IndexConfig {
            dimension: 128,
            metric: DistanceMetric::Euclidean,
            m: 8,
            ef_construction: 64,
            ef_search: 32,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: IndexConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
