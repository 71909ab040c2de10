//! Time-based execution gate
//!
//! Decides on every polling tick whether a query is due, and stamps the
//! query's last-run time at the moment it is admitted. Stamping happens on
//! admission rather than completion, so a slow query is not re-admitted on
//! the next tick while it is still running. A query that fails after
//! admission therefore waits a full interval before it is admitted again,
//! unless the caller clears its stamp with `reset`.
//!
//! Time is plain Unix epoch seconds supplied by the caller. A stamp of `0`
//! means the query has never run.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

use crate::QueryDescriptor;

// ============================================================================
// Decision
// ============================================================================

/// Outcome of a gate check with its reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum GateDecision {
    /// Interval is zero, runs on every tick
    Unthrottled,
    /// Never run before
    FirstRun,
    /// At least one interval has elapsed since the last run
    IntervalElapsed,
    /// Not due yet
    Waiting { remaining_secs: u64 },
}

impl GateDecision {
    /// Whether the query may run now
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Self::Waiting { .. })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Unthrottled => "unthrottled",
            Self::FirstRun => "first_run",
            Self::IntervalElapsed => "interval_elapsed",
            Self::Waiting { .. } => "waiting",
        }
    }
}

/// Pure admission rule.
///
/// Elapsed time is compared in whole seconds; an elapsed time of exactly
/// `interval_secs` is admitted. A clock that moved backwards yields a
/// negative elapsed time and is never admitted.
///
/// `now` is assumed to be positive epoch seconds. A stamp of 0 means "never
/// run", so a first run at `now <= 0` leaves the stamp at 0 and the query is
/// admitted again on the next call.
pub fn evaluate(interval_secs: u64, last_run: i64, now: i64) -> GateDecision {
    if interval_secs == 0 {
        return GateDecision::Unthrottled;
    }
    if last_run == 0 {
        return GateDecision::FirstRun;
    }

    let interval = i64::try_from(interval_secs).unwrap_or(i64::MAX);
    let elapsed = now.saturating_sub(last_run);
    if elapsed >= interval {
        GateDecision::IntervalElapsed
    } else {
        let remaining = interval.saturating_sub(elapsed);
        GateDecision::Waiting {
            remaining_secs: u64::try_from(remaining).unwrap_or(u64::MAX),
        }
    }
}

/// Stamp to record after an admission. Never moves backwards.
fn stamp(last_run: i64, now: i64) -> i64 {
    last_run.max(now)
}

// ============================================================================
// Single-owner gate
// ============================================================================

/// Last-run ledger for the queries of one collector loop.
///
/// `Gate` takes `&mut self` and performs an unsynchronized read-then-write
/// per query. Calls for the same query must be serialized; use
/// [`SharedGate`] when several tasks check queries concurrently.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    last_run: HashMap<String, i64>,
}

impl Gate {
    /// Create a gate where no query has run yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a query and record `now` as its last run when admitted
    pub fn is_due(&mut self, query: &QueryDescriptor, now: i64) -> bool {
        self.decide(query, now).is_admitted()
    }

    /// Like [`Gate::is_due`], returning the reason for the decision
    pub fn decide(&mut self, query: &QueryDescriptor, now: i64) -> GateDecision {
        let last = self.last_run(&query.name);
        let decision = evaluate(query.interval_secs, last, now);
        if decision.is_admitted() {
            let next = stamp(last, now);
            if next != last {
                self.last_run.insert(query.name.clone(), next);
            }
        }
        trace!(
            query = %query.name,
            last_run = last,
            now,
            decision = decision.as_str(),
            "gate check"
        );
        decision
    }

    /// Last admission time for a query (0 = never)
    pub fn last_run(&self, name: &str) -> i64 {
        self.last_run.get(name).copied().unwrap_or(0)
    }

    /// Forget the last run so the next check admits the query.
    ///
    /// Used by callers that want failed executions retried on the next tick.
    pub fn reset(&mut self, name: &str) {
        self.last_run.remove(name);
    }

    /// Sorted copy of all recorded stamps
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        self.last_run
            .iter()
            .map(|(name, ts)| (name.clone(), *ts))
            .collect()
    }
}

// ============================================================================
// Concurrent gate
// ============================================================================

/// Gate safe to share between tasks.
///
/// Each query's stamp is its own map entry; the check and the stamp happen
/// while that entry is locked, so two concurrent callers can never both
/// admit the same query for the same interval.
#[derive(Debug, Default)]
pub struct SharedGate {
    last_run: DashMap<String, i64>,
}

impl SharedGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a query and record `now` as its last run when admitted
    pub fn is_due(&self, query: &QueryDescriptor, now: i64) -> bool {
        self.decide(query, now).is_admitted()
    }

    pub fn decide(&self, query: &QueryDescriptor, now: i64) -> GateDecision {
        let mut entry = self.last_run.entry(query.name.clone()).or_insert(0);
        let decision = evaluate(query.interval_secs, *entry, now);
        if decision.is_admitted() {
            *entry = stamp(*entry, now);
        }
        decision
    }

    pub fn last_run(&self, name: &str) -> i64 {
        self.last_run.get(name).map(|ts| *ts).unwrap_or(0)
    }

    pub fn reset(&self, name: &str) {
        self.last_run.remove(name);
    }
}

// ============================================================================
// Tests
// ============================================================================
