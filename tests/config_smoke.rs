mod common;

use std::time::Duration;

use common::{init_tracing, temp_config};
use mp_queries::QueryRegistry;

#[test]
fn test_temp_config_defaults() {
    init_tracing();
    let config = temp_config("config_smoke", "");
    assert!(config.global.poll_interval_secs > 0);
    assert_eq!(config, mp_config::PulseConfig::default());
}

#[test]
fn test_config_drives_registry() {
    init_tracing();
    let config = temp_config(
        "config_registry",
        r#"
[global]
poll_interval_secs = 20

[queries]
disabled = ["mysql_replica", "mysql_innodb"]

[queries.intervals]
mysql_statements = 600
"#,
    );
    assert_eq!(config.poll_interval(), Duration::from_secs(20));

    let registry = QueryRegistry::builtin(config.poll_interval())
        .with_overrides(&config.queries.disabled, &config.queries.intervals)
        .unwrap();

    assert_eq!(
        registry.names(),
        vec![
            "mysql_variables",
            "mysql_status",
            "mysql_latency",
            "mysql_errors",
            "mysql_overflow",
            "mysql_tables",
            "mysql_statements",
        ]
    );
    let statements = registry.get("mysql_statements").unwrap();
    assert_eq!(statements.interval_secs, 600);
    assert!(statements.statement.contains("INTERVAL 20 SECOND"));
}
