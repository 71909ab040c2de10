//! Serial collector loop
//!
//! On every tick the registry is walked in declaration order. Each query is
//! checked against the gate; admitted queries are fetched and published one
//! after the other. Failures are logged and reported, never propagated, so
//! one broken query does not stop the rest of the tick.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use mp_config::PulseConfig;
use mp_queries::{Gate, GateDecision, QueryDescriptor, QueryRegistry};

use crate::{CollectError, MetricSink, QueryRunner, unix_now};

// ============================================================================
// Options
// ============================================================================

/// Collector loop settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorOptions {
    /// Time between ticks
    pub poll_interval: Duration,
    /// Upper bound on one fetch-and-publish
    pub query_timeout: Duration,
    /// Clear the gate stamp of a failed query so the next tick retries it
    pub reset_on_failure: bool,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            query_timeout: Duration::from_secs(30),
            reset_on_failure: false,
        }
    }
}

impl From<&PulseConfig> for CollectorOptions {
    fn from(config: &PulseConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            query_timeout: config.query_timeout(),
            reset_on_failure: config.queries.reset_on_failure,
        }
    }
}

// ============================================================================
// Tick report
// ============================================================================

/// What happened to one query during a tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum OutcomeStatus {
    /// Gate said not yet
    Skipped,
    /// Fetched and published
    Succeeded { rows: usize, duration_ms: u64 },
    /// Admitted but fetch or publish failed
    Failed { error: String },
}

/// Per-query entry of a tick report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub query: String,
    pub decision: GateDecision,
    pub status: OutcomeStatus,
}

/// Result of one pass over the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Epoch seconds the gate was evaluated at
    pub now: i64,
    pub outcomes: Vec<QueryOutcome>,
}

impl TickReport {
    pub fn new(now: i64) -> Self {
        Self {
            now,
            outcomes: vec![],
        }
    }

    /// Names of admitted queries, whether they succeeded or not
    pub fn admitted(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.decision.is_admitted())
            .map(|o| o.query.as_str())
            .collect()
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.filter_names(|s| matches!(s, OutcomeStatus::Skipped))
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.filter_names(|s| matches!(s, OutcomeStatus::Succeeded { .. }))
    }

    pub fn failed(&self) -> Vec<&str> {
        self.filter_names(|s| matches!(s, OutcomeStatus::Failed { .. }))
    }

    /// Total rows published during the tick
    pub fn total_rows(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o.status {
                OutcomeStatus::Succeeded { rows, .. } => rows,
                _ => 0,
            })
            .sum()
    }

    fn filter_names(&self, pred: impl Fn(&OutcomeStatus) -> bool) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| pred(&o.status))
            .map(|o| o.query.as_str())
            .collect()
    }
}

// ============================================================================
// Collector
// ============================================================================

/// Drives the gate over the registry and hands admitted queries to the
/// runner and sink.
///
/// The collector owns its [`Gate`] and checks queries serially, which is
/// what keeps the gate's unsynchronized read-then-write safe.
pub struct QueryCollector {
    registry: QueryRegistry,
    gate: Gate,
    runner: Arc<dyn QueryRunner>,
    sink: Arc<dyn MetricSink>,
    options: CollectorOptions,
}

impl QueryCollector {
    /// Create a collector with default options
    pub fn new(
        registry: QueryRegistry,
        runner: Arc<dyn QueryRunner>,
        sink: Arc<dyn MetricSink>,
    ) -> Self {
        Self {
            registry,
            gate: Gate::new(),
            runner,
            sink,
            options: CollectorOptions::default(),
        }
    }

    /// Replace the loop settings
    #[must_use]
    pub fn with_options(mut self, options: CollectorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &QueryRegistry {
        &self.registry
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn options(&self) -> &CollectorOptions {
        &self.options
    }

    /// Run one pass over the registry at time `now`
    #[instrument(
        skip(self),
        fields(runner = self.runner.name(), sink = self.sink.name())
    )]
    pub async fn tick(&mut self, now: i64) -> TickReport {
        let mut report = TickReport::new(now);

        for query in self.registry.iter() {
            let decision = self.gate.decide(query, now);
            if !decision.is_admitted() {
                report.outcomes.push(QueryOutcome {
                    query: query.name.clone(),
                    decision,
                    status: OutcomeStatus::Skipped,
                });
                continue;
            }

            debug!(
                query = %query.name,
                reason = decision.as_str(),
                statement = %query.display_statement(),
                "Running query"
            );

            let start = Instant::now();
            let status = match Self::execute(
                self.runner.as_ref(),
                self.sink.as_ref(),
                self.options.query_timeout,
                query,
            )
            .await
            {
                Ok(rows) => {
                    let elapsed = start.elapsed().as_millis();
                    OutcomeStatus::Succeeded {
                        rows,
                        duration_ms: u64::try_from(elapsed).unwrap_or(u64::MAX),
                    }
                }
                Err(e) => {
                    warn!(query = %query.name, error = %e, "Query failed");
                    if self.options.reset_on_failure {
                        self.gate.reset(&query.name);
                    }
                    OutcomeStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };

            report.outcomes.push(QueryOutcome {
                query: query.name.clone(),
                decision,
                status,
            });
        }

        report
    }

    /// Poll forever, or for `max_ticks` ticks, at the configured interval.
    /// Returns the number of ticks run.
    ///
    /// The first tick fires immediately. Ticks delayed by slow queries are
    /// not bunched up afterwards.
    pub async fn run(&mut self, max_ticks: Option<u64>) -> u64 {
        let period = self.options.poll_interval.max(Duration::from_secs(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            queries = self.registry.len(),
            poll_interval_secs = period.as_secs(),
            "Starting collector loop"
        );

        let mut ticks = 0u64;
        loop {
            interval.tick().await;
            let report = self.tick(unix_now()).await;
            info!(
                admitted = report.admitted().len(),
                skipped = report.skipped().len(),
                failed = report.failed().len(),
                rows = report.total_rows(),
                "Tick complete"
            );

            ticks += 1;
            if max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }
        }
        ticks
    }

    async fn execute(
        runner: &dyn QueryRunner,
        sink: &dyn MetricSink,
        timeout: Duration,
        query: &QueryDescriptor,
    ) -> Result<usize, CollectError> {
        let work = async {
            let rows = runner.fetch(&query.statement).await?;
            let count = rows.len();
            sink.publish(query, rows).await?;
            Ok::<_, CollectError>(count)
        };

        tokio::time::timeout(timeout, work)
            .await
            .map_err(|_| CollectError::Timeout(timeout))?
    }
}

// ============================================================================
// Tests
// ============================================================================
