//! mp_queries - Diagnostic query catalog for MySQL Pulse
//!
//! This crate provides:
//! - The `QueryDescriptor` data model (name, statement, extraction hint, interval)
//! - The built-in `QueryRegistry`, assembled once from the polling interval
//! - The `Gate` deciding whether a descriptor is due on a given tick
//! - A single-line statement normalizer for log output
//!
//! # Design Principles
//!
//! 1. **Immutable catalog**: descriptors never change after the registry is built
//! 2. **Explicit time**: the gate takes `now` from the caller and never reads a clock
//! 3. **Separate state**: last-run stamps live in the gate, keyed by query name
//! 4. **No I/O**: nothing here executes SQL or blocks

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod gate;
pub mod normalize;
pub mod registry;

pub use gate::{Gate, GateDecision, SharedGate};
pub use normalize::normalize;
pub use registry::QueryRegistry;

/// Registry assembly errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Query name must not be empty")]
    EmptyName,

    #[error("Duplicate query name: {0}")]
    DuplicateName(String),

    #[error("Unknown query: {0}")]
    UnknownQuery(String),
}

/// One diagnostic query definition.
///
/// Descriptors are plain configuration. The time of the last execution is
/// tracked by [`Gate`], not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Stable identifier, also the metric namespace
    pub name: String,

    /// SQL text handed to the database client unchanged
    pub statement: String,

    /// Column naming the metric when rows are key/value pairs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Column holding the metric value when rows are key/value pairs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Treat every column of every row as its own metric
    #[serde(default)]
    pub unpivot: bool,

    /// Minimum seconds between two executions (0 = every tick)
    #[serde(default)]
    pub interval_secs: u64,
}

/// How the consumer should turn result rows into metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode<'a> {
    /// `row[key]` names the metric, `row[value]` is its value
    KeyValue { key: &'a str, value: &'a str },
    /// Wide-to-long: each column is a metric
    UnPivot,
    /// Neither mode is configured; consumers should skip the rows
    Unspecified,
}

impl ExtractionMode<'_> {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyValue { .. } => "key_value",
            Self::UnPivot => "unpivot",
            Self::Unspecified => "unspecified",
        }
    }
}

impl QueryDescriptor {
    /// Descriptor whose rows are key/value metric pairs
    pub fn key_value(
        name: impl Into<String>,
        statement: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            statement: statement.into(),
            key: Some(key.into()),
            value: Some(value.into()),
            unpivot: false,
            interval_secs: 0,
        }
    }

    /// Descriptor whose rows are unpivoted column by column
    pub fn unpivot(name: impl Into<String>, statement: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            statement: statement.into(),
            key: None,
            value: None,
            unpivot: true,
            interval_secs: 0,
        }
    }

    /// Set the minimum re-run interval
    #[must_use]
    pub fn with_interval(mut self, interval_secs: u64) -> Self {
        self.interval_secs = interval_secs;
        self
    }

    /// Resolve the extraction mode.
    ///
    /// A complete key/value pair takes precedence over `unpivot` when both
    /// are configured.
    pub fn extraction(&self) -> ExtractionMode<'_> {
        match (self.key.as_deref(), self.value.as_deref()) {
            (Some(key), Some(value)) => ExtractionMode::KeyValue { key, value },
            _ if self.unpivot => ExtractionMode::UnPivot,
            _ => ExtractionMode::Unspecified,
        }
    }

    /// Whether the gate ever throttles this query
    pub fn is_gated(&self) -> bool {
        self.interval_secs > 0
    }

    /// Single-line rendering of the statement for logs
    pub fn display_statement(&self) -> String {
        normalize(&self.statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_value_descriptor() {
        let query = QueryDescriptor::key_value(
            "mysql_status",
            "SHOW GLOBAL STATUS",
            "Variable_name",
            "Value",
        );
        assert_eq!(
            query.extraction(),
            ExtractionMode::KeyValue {
                key: "Variable_name",
                value: "Value"
            }
        );
        assert!(!query.is_gated());
    }

    #[test]
    fn test_unpivot_descriptor() {
        let query = QueryDescriptor::unpivot("mysql_replica", "SHOW REPLICA STATUS");
        assert_eq!(query.extraction(), ExtractionMode::UnPivot);
        assert_eq!(query.extraction().as_str(), "unpivot");
    }

    #[test]
    fn test_with_interval() {
        let query = QueryDescriptor::unpivot("mysql_tables", "SELECT 1").with_interval(3600);
        assert_eq!(query.interval_secs, 3600);
        assert!(query.is_gated());
    }

    #[test]
    fn test_mixed_modes_prefer_key_value() {
        let mut query = QueryDescriptor::key_value("q", "SELECT 1", "k", "v");
        query.unpivot = true;
        assert_eq!(query.extraction().as_str(), "key_value");
    }

    #[test]
    fn test_half_key_value_falls_back() {
        let mut query = QueryDescriptor::unpivot("q", "SELECT 1");
        query.key = Some("k".to_string());
        assert_eq!(query.extraction(), ExtractionMode::UnPivot);

        query.unpivot = false;
        assert_eq!(query.extraction(), ExtractionMode::Unspecified);
    }

    #[test]
    fn test_display_statement_leaves_statement_intact() {
        let query = QueryDescriptor::unpivot("q", "\n    SELECT a\n    FROM b;\n");
        let shown = query.display_statement();
        assert!(!shown.contains('\n'));
        assert!(query.statement.contains('\n'));
    }

    #[test]
    fn test_descriptor_serialization() {
        let query = QueryDescriptor::key_value("mysql_innodb", "SELECT 1", "name", "count")
            .with_interval(60);
        let json = serde_json::to_string(&query).unwrap();
        let parsed: QueryDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, query);
    }

    #[test]
    fn test_descriptor_deserialize_defaults() {
        let parsed: QueryDescriptor =
            serde_json::from_str(r#"{"name":"q","statement":"SELECT 1"}"#).unwrap();
        assert_eq!(parsed.interval_secs, 0);
        assert!(!parsed.unpivot);
        assert_eq!(parsed.extraction(), ExtractionMode::Unspecified);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            QueryError::DuplicateName("mysql_status".to_string()).to_string(),
            "Duplicate query name: mysql_status"
        );
    }
}
