//! Metric sinks that keep results local

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::info;

use mp_queries::QueryDescriptor;

use crate::{CollectError, MetricSink, Row};

/// Sink that logs a summary of every published batch
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl MetricSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn publish(&self, query: &QueryDescriptor, rows: Vec<Row>) -> Result<(), CollectError> {
        info!(
            query = %query.name,
            mode = query.extraction().as_str(),
            rows = rows.len(),
            "Published query result"
        );
        Ok(())
    }
}

/// Sink that keeps every batch in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<(String, Vec<Row>)>>,
    rejected: HashSet<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject batches for the named query
    #[must_use]
    pub fn rejecting(mut self, query: impl Into<String>) -> Self {
        self.rejected.insert(query.into());
        self
    }

    /// All accepted batches, in publish order
    pub fn batches(&self) -> Vec<(String, Vec<Row>)> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Number of accepted batches for a query
    pub fn count_for(&self, query: &str) -> usize {
        self.batches()
            .iter()
            .filter(|(name, _)| name == query)
            .count()
    }
}

#[async_trait]
impl MetricSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn publish(&self, query: &QueryDescriptor, rows: Vec<Row>) -> Result<(), CollectError> {
        if self.rejected.contains(&query.name) {
            return Err(CollectError::SinkError(format!(
                "batch for {} rejected",
                query.name
            )));
        }
        self.batches
            .lock()
            .map_err(|_| CollectError::SinkError("memory sink poisoned".to_string()))?
            .push((query.name.clone(), rows));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> QueryDescriptor {
        QueryDescriptor::unpivot("mysql_tables", "SELECT 1")
    }

    #[tokio::test]
    async fn test_log_sink_accepts() {
        assert!(LogSink.publish(&query(), vec![Row::new()]).await.is_ok());
    }

    #[tokio::test]
    async fn test_memory_sink_records() {
        let sink = MemorySink::new();
        sink.publish(&query(), vec![Row::new(), Row::new()])
            .await
            .unwrap();
        sink.publish(&query(), vec![]).await.unwrap();

        assert_eq!(sink.count_for("mysql_tables"), 2);
        assert_eq!(sink.batches()[0].1.len(), 2);
        assert_eq!(sink.count_for("mysql_status"), 0);
    }

    #[tokio::test]
    async fn test_memory_sink_rejects() {
        let sink = MemorySink::new().rejecting("mysql_tables");
        let err = sink.publish(&query(), vec![]).await.unwrap_err();
        assert!(matches!(err, CollectError::SinkError(_)));
        assert!(sink.batches().is_empty());
    }
}
