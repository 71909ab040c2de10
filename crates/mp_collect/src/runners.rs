//! Query runners that need no database
//!
//! `DryRunRunner` backs the CLI's dry-run loop. `FixtureRunner` replays
//! canned rows or failures, matched by a fragment of the statement text.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::{CollectError, QueryRunner, Row};

/// Runner that executes nothing and returns no rows
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunRunner;

#[async_trait]
impl QueryRunner for DryRunRunner {
    fn name(&self) -> &'static str {
        "dry_run"
    }

    async fn fetch(&self, statement: &str) -> Result<Vec<Row>, CollectError> {
        debug!(bytes = statement.len(), "dry run, statement not executed");
        Ok(vec![])
    }
}

#[derive(Debug, Clone)]
enum Fixture {
    Rows(Vec<Row>),
    Failure(String),
}

/// Runner replaying canned results.
///
/// The first fixture whose needle occurs in the statement wins; statements
/// matching no fixture return no rows.
#[derive(Debug, Default)]
pub struct FixtureRunner {
    fixtures: Vec<(String, Fixture)>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl FixtureRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `rows` for statements containing `needle`
    #[must_use]
    pub fn with_rows(mut self, needle: impl Into<String>, rows: Vec<Row>) -> Self {
        self.fixtures.push((needle.into(), Fixture::Rows(rows)));
        self
    }

    /// Return rows parsed from a JSON array of objects
    ///
    /// # Errors
    /// Returns [`CollectError::JsonError`] if `json` is not an array of objects.
    pub fn with_json(self, needle: impl Into<String>, json: &str) -> Result<Self, CollectError> {
        let rows: Vec<Row> = serde_json::from_str(json)?;
        Ok(self.with_rows(needle, rows))
    }

    /// Fail statements containing `needle` with `message`
    #[must_use]
    pub fn with_failure(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.fixtures
            .push((needle.into(), Fixture::Failure(message.into())));
        self
    }

    /// Sleep before answering, to exercise timeouts
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Statements fetched so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of fetches whose statement contains `needle`
    pub fn call_count(&self, needle: &str) -> usize {
        self.calls().iter().filter(|s| s.contains(needle)).count()
    }
}

#[async_trait]
impl QueryRunner for FixtureRunner {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn fetch(&self, statement: &str) -> Result<Vec<Row>, CollectError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(statement.to_string());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let fixture = self
            .fixtures
            .iter()
            .find(|(needle, _)| statement.contains(needle.as_str()))
            .map(|(_, fixture)| fixture.clone());

        match fixture {
            Some(Fixture::Rows(rows)) => Ok(rows),
            Some(Fixture::Failure(message)) => Err(CollectError::ExecutionError(message)),
            None => Ok(vec![]),
        }
    }
}
