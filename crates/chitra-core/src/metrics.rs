//! Passive query metrics collection.
//!
//! The index never records anything itself: the caller times its own
//! queries and hands the results to a collector. Records aggregate into a
//! report that can be exported as JSON.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use chitra_common::{ChitraError, Result, SearchResult};

/// Metrics observed for a single query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    /// Elapsed wall-clock time in milliseconds
    pub elapsed_ms: f64,
    /// Number of results returned
    pub num_results: usize,
    /// Raw distances of the returned results, in rank order
    pub distances: Vec<f32>,
    /// Mean similarity across the results (0 when empty)
    pub avg_similarity: f32,
    /// Best similarity across the results (0 when empty)
    pub max_similarity: f32,
    /// Worst similarity across the results (0 when empty)
    pub min_similarity: f32,
}

impl QueryRecord {
    /// Build a record from a query's results and elapsed time.
    pub fn from_results(results: &[SearchResult], elapsed: Duration) -> Self {
        let similarities: Vec<f32> = results.iter().map(|r| r.similarity).collect();
        let (avg, max, min) = if similarities.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let sum: f32 = similarities.iter().sum();
            let max = similarities.iter().cloned().fold(f32::MIN, f32::max);
            let min = similarities.iter().cloned().fold(f32::MAX, f32::min);
            (sum / similarities.len() as f32, max, min)
        };

        Self {
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            num_results: results.len(),
            distances: results.iter().map(|r| r.distance).collect(),
            avg_similarity: avg,
            max_similarity: max,
            min_similarity: min,
        }
    }
}

/// Aggregated metrics across all recorded queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Number of recorded queries
    pub num_queries: usize,
    /// Mean query latency in milliseconds
    pub avg_elapsed_ms: f64,
    /// Mean number of results per query
    pub avg_results: f64,
    /// Mean of the per-query average similarities
    pub avg_similarity: f32,
    /// Best similarity seen across all queries
    pub max_similarity: f32,
    /// Number of queries that returned no results
    pub queries_without_results: usize,
}

/// Collects per-query records and produces aggregate reports.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    records: Vec<QueryRecord>,
}

impl MetricsCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one query's results and elapsed time.
    pub fn record(&mut self, results: &[SearchResult], elapsed: Duration) -> QueryRecord {
        let record = QueryRecord::from_results(results, elapsed);
        self.records.push(record.clone());
        record
    }

    /// Number of recorded queries.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in insertion order.
    pub fn records(&self) -> &[QueryRecord] {
        &self.records
    }

    /// Aggregate the recorded queries into a report.
    pub fn report(&self) -> MetricsReport {
        if self.records.is_empty() {
            return MetricsReport {
                num_queries: 0,
                avg_elapsed_ms: 0.0,
                avg_results: 0.0,
                avg_similarity: 0.0,
                max_similarity: 0.0,
                queries_without_results: 0,
            };
        }

        let n = self.records.len();
        MetricsReport {
            num_queries: n,
            avg_elapsed_ms: self.records.iter().map(|r| r.elapsed_ms).sum::<f64>() / n as f64,
            avg_results: self.records.iter().map(|r| r.num_results as f64).sum::<f64>()
                / n as f64,
            avg_similarity: self.records.iter().map(|r| r.avg_similarity).sum::<f32>()
                / n as f32,
            max_similarity: self
                .records
                .iter()
                .map(|r| r.max_similarity)
                .fold(f32::MIN, f32::max),
            queries_without_results: self
                .records
                .iter()
                .filter(|r| r.num_results == 0)
                .count(),
        }
    }

    /// Export all records and the aggregate report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if encoding fails and `Storage` if the file
    /// cannot be written.
    pub fn export_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let export = serde_json::json!({
            "report": self.report(),
            "queries": self.records,
        });
        let json = serde_json::to_string_pretty(&export)
            .map_err(|e| ChitraError::Serialization(format!("Failed to encode metrics: {}", e)))?;
        std::fs::write(path.as_ref(), json)
            .map_err(|e| ChitraError::Storage(format!("Failed to write metrics: {}", e)))?;
        Ok(())
    }
}
