#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Initialize tracing once for integration tests.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer())
            .with(filter)
            .init();
    });
}

/// Generate a unique temporary config path for a test.
pub fn temp_config_path(test_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("mp_{test_name}_{nanos}.toml"))
}

/// Write `content` to a test-scoped config file and load it.
pub fn temp_config(test_name: &str, content: &str) -> mp_config::PulseConfig {
    let path = temp_config_path(test_name);
    std::fs::write(&path, content).unwrap();
    let config = mp_config::PulseConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();
    config
}
