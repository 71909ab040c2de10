//! Built-in MySQL diagnostic query catalog
//!
//! The registry is assembled once at start-up. Statements that look back
//! over recent activity embed the collector's polling interval, substituted
//! here before any consumer can see the descriptor.

use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

use crate::{QueryDescriptor, QueryError};

/// Schemas excluded from per-schema statistics
const SYSTEM_SCHEMAS: &str = "'information_schema', 'mysql', 'performance_schema', 'sys'";

/// Interval for catalog scans that change slowly and cost a full table walk
pub const HOURLY_SECS: u64 = 3600;

/// Ordered, immutable set of query descriptors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRegistry {
    queries: Vec<QueryDescriptor>,
}

impl QueryRegistry {
    /// Build the built-in catalog.
    ///
    /// `poll_interval` is truncated to whole seconds and used as the
    /// lookback window of the statement-digest and error-summary queries.
    pub fn builtin(poll_interval: Duration) -> Self {
        let lookback = poll_interval.as_secs();
        debug!(lookback_secs = lookback, "Building built-in query registry");

        Self {
            queries: vec![
                QueryDescriptor::key_value(
                    "mysql_variables",
                    "SHOW GLOBAL VARIABLES",
                    "Variable_name",
                    "Value",
                ),
                QueryDescriptor::key_value(
                    "mysql_status",
                    "SHOW GLOBAL STATUS",
                    "Variable_name",
                    "Value",
                ),
                QueryDescriptor::unpivot("mysql_replica", "SHOW REPLICA STATUS"),
                QueryDescriptor::key_value(
                    "mysql_innodb",
                    "SELECT name, count FROM information_schema.innodb_metrics WHERE status='enabled'",
                    "name",
                    "count",
                ),
                QueryDescriptor::unpivot("mysql_latency", latency_statement(lookback)),
                QueryDescriptor::unpivot("mysql_errors", errors_statement(lookback)),
                QueryDescriptor::unpivot("mysql_overflow", overflow_statement())
                    .with_interval(HOURLY_SECS),
                QueryDescriptor::unpivot("mysql_tables", tables_statement())
                    .with_interval(HOURLY_SECS),
                QueryDescriptor::unpivot("mysql_statements", statements_statement(lookback)),
            ],
        }
    }

    /// Build a registry from caller-supplied descriptors.
    ///
    /// # Errors
    /// Returns a [`QueryError`] if a name is empty or used twice.
    pub fn from_descriptors(queries: Vec<QueryDescriptor>) -> Result<Self, QueryError> {
        let mut seen = HashSet::new();
        for query in &queries {
            if query.name.trim().is_empty() {
                return Err(QueryError::EmptyName);
            }
            if !seen.insert(query.name.as_str()) {
                return Err(QueryError::DuplicateName(query.name.clone()));
            }
        }
        Ok(Self { queries })
    }

    /// Apply start-up customisation: drop `disabled` queries and replace the
    /// interval of the queries named in `intervals`. Order is preserved.
    ///
    /// # Errors
    /// Returns [`QueryError::UnknownQuery`] if a name matches no descriptor.
    pub fn with_overrides(
        self,
        disabled: &[String],
        intervals: &HashMap<String, u64>,
    ) -> Result<Self, QueryError> {
        for name in disabled.iter().chain(intervals.keys()) {
            if self.get(name).is_none() {
                return Err(QueryError::UnknownQuery(name.clone()));
            }
        }

        let queries = self
            .queries
            .into_iter()
            .filter(|q| !disabled.contains(&q.name))
            .map(|q| match intervals.get(&q.name) {
                Some(&secs) => {
                    debug!(query = %q.name, interval_secs = secs, "Overriding query interval");
                    q.with_interval(secs)
                }
                None => q,
            })
            .collect();

        Ok(Self { queries })
    }

    /// All descriptors in declaration order
    pub fn list(&self) -> &[QueryDescriptor] {
        &self.queries
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryDescriptor> {
        self.queries.iter()
    }

    /// Look up a descriptor by name
    pub fn get(&self, name: &str) -> Option<&QueryDescriptor> {
        self.queries.iter().find(|q| q.name == name)
    }

    /// Names in declaration order
    pub fn names(&self) -> Vec<&str> {
        self.queries.iter().map(|q| q.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

impl<'a> IntoIterator for &'a QueryRegistry {
    type Item = &'a QueryDescriptor;
    type IntoIter = std::slice::Iter<'a, QueryDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.queries.iter()
    }
}

// ============================================================================
// Statements
// ============================================================================

fn latency_statement(lookback_secs: u64) -> String {
    format!(
        r"
        SELECT
            ifnull(SCHEMA_NAME, 'NONE') AS SCHEMA_NAME,
            sum(count_star) AS count_star,
            round(avg_timer_wait/1000000, 0) AS avg_time_us
        FROM performance_schema.events_statements_summary_by_digest
        WHERE SCHEMA_NAME NOT IN ({SYSTEM_SCHEMAS})
          AND last_seen > DATE_SUB(NOW(), INTERVAL {lookback_secs} SECOND)
        GROUP BY SCHEMA_NAME;
        "
    )
}

fn errors_statement(lookback_secs: u64) -> String {
    format!(
        r"
        SELECT ERROR_NUMBER, SQL_STATE, ERROR_NAME, SUM_ERROR_RAISED
        FROM performance_schema.events_errors_summary_global_by_error
        WHERE SUM_ERROR_RAISED > 0
          AND last_seen > DATE_SUB(NOW(), INTERVAL {lookback_secs} SECOND);
        "
    )
}

/// Auto-increment headroom per table, as a percentage of the column type's range
fn overflow_statement() -> String {
    let column_type = "(SELECT column_type FROM information_schema.columns WHERE table_schema = t.table_schema AND table_name = t.table_name AND extra = 'auto_increment' LIMIT 1)";
    format!(
        r#"
        SELECT
            t.table_schema AS SCHEMA_NAME,
            t.table_name,
            t.table_rows,
            t.auto_increment,
            {column_type} AS auto_increment_data_type,
            (CASE 
               WHEN {column_type} IN ('int unsigned', "int(10) unsigned") THEN ROUND( (t.auto_increment/4294967295)*100 , 2)
               WHEN {column_type} IN ('int(11)', 'int') THEN ROUND( (t.auto_increment/2147483647)*100, 2)
               WHEN {column_type} IN ('bigint unsigned', 'bigint(20) unsigned') THEN ROUND( (t.auto_increment/(POWER(2, 64) -1))*100 , 2 )
               WHEN {column_type} IN ('bigint(20)', 'bigint' ) THEN ROUND( (t.auto_increment/(POWER(2, 64) -1))*100 , 2 )
            END) AS auto_increment_pct
        FROM information_schema.tables t
        WHERE t.table_schema NOT IN ({SYSTEM_SCHEMAS})
          AND t.auto_increment IS NOT NULL;
        "#
    )
}

fn tables_statement() -> String {
    format!(
        r"
        SELECT
            table_schema AS SCHEMA_NAME,
            table_name,
            COALESCE(data_length + index_length, 0) AS 'table_size',
            COALESCE(table_rows, 0) AS 'table_rows'
        FROM information_schema.tables
        WHERE table_schema NOT IN ({SYSTEM_SCHEMAS});
        "
    )
}

fn statements_statement(lookback_secs: u64) -> String {
    format!(
        r"
        SELECT
            ifnull(SCHEMA_NAME, 'NONE') AS SCHEMA_NAME,
            DIGEST,
            DIGEST_TEXT,
            COUNT_STAR,
            SUM_TIMER_WAIT/1000000000000 SUM_TIMER_WAIT_SEC,
            MIN_TIMER_WAIT/1000000000000 MIN_TIMER_WAIT_SEC,
            AVG_TIMER_WAIT/1000000000000 AVG_TIMER_WAIT_SEC,
            MAX_TIMER_WAIT/1000000000000 MAX_TIMER_WAIT_SEC,
            SUM_LOCK_TIME/1000000000000 SUM_LOCK_TIME_SEC,
            SUM_ERRORS,
            SUM_WARNINGS,
            SUM_ROWS_AFFECTED,
            SUM_ROWS_SENT,
            SUM_ROWS_EXAMINED,
            SUM_CREATED_TMP_DISK_TABLES,
            SUM_CREATED_TMP_TABLES,
            SUM_SORT_MERGE_PASSES,
            SUM_SORT_ROWS,
            SUM_NO_INDEX_USED
        FROM performance_schema.events_statements_summary_by_digest
        WHERE SCHEMA_NAME NOT IN ({SYSTEM_SCHEMAS})
          AND last_seen > DATE_SUB(NOW(), INTERVAL {lookback_secs} SECOND);
        "
    )
}

// ============================================================================
// Tests
// ============================================================================
