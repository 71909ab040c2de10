//! mp_collect - Collector host for the MySQL Pulse query catalog
//!
//! This crate provides:
//! - The `QueryRunner` trait for the database client
//! - The `MetricSink` trait for the metrics backend
//! - `QueryCollector`, the serial tick loop that gates and runs queries
//! - Dry-run, fixture and in-memory implementations of both traits
//!
//! Connecting to MySQL and turning rows into named metrics belong to the
//! runner and sink implementations; this crate only sequences them.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use mp_queries::QueryDescriptor;

pub mod collector;
pub mod runners;
pub mod sinks;

pub use collector::{CollectorOptions, OutcomeStatus, QueryCollector, QueryOutcome, TickReport};
pub use runners::{DryRunRunner, FixtureRunner};
pub use sinks::{LogSink, MemorySink};

/// Collection errors
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("Query execution failed: {0}")]
    ExecutionError(String),

    #[error("Metric sink rejected batch: {0}")]
    SinkError(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// One result row, column name to value
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Database client executing catalog statements
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Execute `statement` and return every row
    async fn fetch(&self, statement: &str) -> Result<Vec<Row>, CollectError>;
}

/// Metrics backend consuming query results
#[async_trait]
pub trait MetricSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Publish the rows of one query, using its key/value or unpivot hint
    async fn publish(&self, query: &QueryDescriptor, rows: Vec<Row>) -> Result<(), CollectError>;
}

/// Current wall-clock time in Unix epoch seconds
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Build a row from `(column, value)` pairs
pub fn row<I, K>(columns: I) -> Row
where
    I: IntoIterator<Item = (K, serde_json::Value)>,
    K: Into<String>,
{
    columns.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_builder() {
        let row = row([("Variable_name", json!("Uptime")), ("Value", json!("42"))]);
        assert_eq!(row.len(), 2);
        assert_eq!(row["Variable_name"], json!("Uptime"));
    }

    #[test]
    fn test_unix_now_is_recent() {
        // 2023-11-14
        assert!(unix_now() > 1_700_000_000);
    }

    #[test]
    fn test_error_display() {
        let err = CollectError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "Timeout after 30s");

        let err = CollectError::ExecutionError("Table 'x' doesn't exist".to_string());
        assert!(err.to_string().contains("doesn't exist"));
    }
}
