mod common;

use std::sync::Arc;
use std::time::Duration;

use common::init_tracing;
use mp_collect::{CollectorOptions, FixtureRunner, MemorySink, QueryCollector};
use mp_queries::{Gate, QueryDescriptor, QueryRegistry, normalize};

const T: i64 = 1_700_000_000;

#[test]
fn test_unthrottled_query_runs_every_tick() {
    let mut gate = Gate::new();
    let query = QueryDescriptor::key_value(
        "mysql_status",
        "SHOW GLOBAL STATUS",
        "Variable_name",
        "Value",
    );
    for now in [T, T, T + 1, T + 2, T + 3600] {
        assert!(gate.is_due(&query, now));
    }
}

#[test]
fn test_hourly_query_scenario() {
    let mut gate = Gate::new();
    let query = QueryDescriptor::unpivot("mysql_tables", "SELECT 1").with_interval(3600);

    assert!(gate.is_due(&query, T));
    assert_eq!(gate.last_run("mysql_tables"), T);

    assert!(!gate.is_due(&query, T + 1800));
    assert_eq!(gate.last_run("mysql_tables"), T);

    assert!(gate.is_due(&query, T + 3600));
    assert_eq!(gate.last_run("mysql_tables"), T + 3600);
}

#[test]
fn test_normalizer_two_pass_artifact() {
    assert_eq!(normalize("SELECT  a\r\nFROM  b"), "SELECTa FROMb");
    assert_eq!(normalize("a   b"), "a b");
}

#[tokio::test]
async fn test_collector_day_of_ticks() {
    init_tracing();
    let runner = Arc::new(
        FixtureRunner::new()
            .with_json(
                "SHOW GLOBAL STATUS",
                r#"[{"Variable_name": "Threads_connected", "Value": "12"}]"#,
            )
            .unwrap(),
    );
    let sink = Arc::new(MemorySink::new());
    let mut collector = QueryCollector::new(
        QueryRegistry::builtin(Duration::from_secs(60)),
        runner.clone(),
        sink.clone(),
    )
    .with_options(CollectorOptions {
        poll_interval: Duration::from_secs(60),
        ..CollectorOptions::default()
    });

    // one tick per minute for 24 hours
    for minute in 0..(24 * 60) {
        collector.tick(T + minute * 60).await;
    }

    assert_eq!(sink.count_for("mysql_status"), 24 * 60);
    assert_eq!(sink.count_for("mysql_tables"), 24);
    assert_eq!(sink.count_for("mysql_overflow"), 24);
    assert_eq!(runner.call_count("SHOW GLOBAL STATUS"), 24 * 60);
    assert_eq!(collector.gate().last_run("mysql_tables"), T + 23 * 3600);
}
