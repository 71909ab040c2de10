//! mp_cli - CLI commands for MySQL Pulse
//!
//! This crate provides:
//! - clap-based command definitions
//! - Text and JSON (enveloped) rendering of the query catalog
//! - Gate simulation over a sequence of ticks
//! - A dry-run collector loop that needs no database

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use mp_collect::{
    CollectorOptions, DryRunRunner, LogSink, OutcomeStatus, QueryCollector, TickReport,
};
use mp_config::PulseConfig;
use mp_queries::{GateDecision, QueryDescriptor, QueryRegistry};

pub mod envelope;

pub use envelope::Envelope;

/// Longest statement preview in the text listing
const PREVIEW_CHARS: usize = 72;

/// CLI errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Config error: {0}")]
    ConfigError(#[from] mp_config::ConfigError),

    #[error("Query catalog error: {0}")]
    QueryError(#[from] mp_queries::QueryError),

    #[error("No query named '{0}'")]
    UnknownQuery(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON wrapped in an envelope
    Json,
}

/// Main CLI application
#[derive(Parser, Debug)]
#[command(name = "mp")]
#[command(
    author,
    version,
    about = "MySQL Pulse - gated diagnostic queries for MySQL metric collection"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format for commands
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the query catalog in execution order
    List,

    /// Show one query with its full statement
    Show {
        /// Query name (e.g. `mysql_tables`)
        name: String,
    },

    /// Replay gate decisions over a sequence of ticks without a database
    Simulate {
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "5")]
        ticks: u32,

        /// Seconds between ticks (defaults to the poll interval)
        #[arg(long)]
        step_secs: Option<u64>,

        /// Epoch seconds of the first tick (defaults to now)
        #[arg(long)]
        start: Option<i64>,
    },

    /// Run the polling loop in dry-run mode, logging every admitted query
    Watch {
        /// Stop after this many ticks
        #[arg(short, long)]
        ticks: Option<u64>,
    },
}

/// One catalog row as rendered by `list` and `show`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryView {
    pub name: String,
    pub interval_secs: u64,
    pub mode: String,
    pub statement: String,
}

impl QueryView {
    fn from_descriptor(query: &QueryDescriptor, full_statement: bool) -> Self {
        Self {
            name: query.name.clone(),
            interval_secs: query.interval_secs,
            mode: query.extraction().as_str().to_string(),
            statement: if full_statement {
                query.statement.clone()
            } else {
                query.display_statement()
            },
        }
    }
}

impl Cli {
    /// The config file `load_config` reads: `--config` if given, else the
    /// first discovered file.
    ///
    /// Discovery happens before logging is initialised, so `run` reports
    /// this path once the subscriber is installed.
    pub fn config_source(&self) -> Option<PathBuf> {
        self.config.clone().or_else(PulseConfig::find_config_file)
    }

    /// Load the config named by `--config`, or discover one.
    ///
    /// # Errors
    /// Returns a [`CliError`] if the config cannot be loaded or is invalid.
    pub fn load_config(&self) -> Result<PulseConfig, CliError> {
        let config = match &self.config {
            Some(path) => PulseConfig::load_with_env(path)?,
            None => PulseConfig::discover_with_env()?,
        };
        Ok(config)
    }

    /// Run the CLI command
    ///
    /// # Errors
    /// Returns a [`CliError`] if the catalog cannot be built or the
    /// command fails.
    pub async fn run(self, config: &PulseConfig) -> Result<(), CliError> {
        match self.config_source() {
            Some(path) => info!(path = %path.display(), "Using config file"),
            None => info!("No config file found, using defaults"),
        }
        debug!(
            poll_interval_secs = config.global.poll_interval_secs,
            disabled = config.queries.disabled.len(),
            "Effective configuration"
        );

        let registry = build_registry(config)?;

        match self.command {
            Commands::List => {
                println!("{}", render_list(&registry, self.format)?);
            }
            Commands::Show { name } => {
                println!("{}", render_show(&registry, &name, self.format)?);
            }
            Commands::Simulate {
                ticks,
                step_secs,
                start,
            } => {
                let step = step_secs.unwrap_or(config.global.poll_interval_secs);
                let start = start.unwrap_or_else(mp_collect::unix_now);
                let reports = simulate(registry, config, ticks, start, step).await;
                println!("{}", render_simulation(&reports, start, self.format)?);
            }
            Commands::Watch { ticks } => {
                let mut collector = dry_run_collector(registry, config);
                let ran = collector.run(ticks).await;
                info!(ticks = ran, "Dry-run loop finished");
            }
        }

        Ok(())
    }
}

/// Build the catalog for `config`: the built-in queries with the
/// configured lookback, minus disabled ones, with interval overrides.
///
/// # Errors
/// Returns a [`CliError`] if an override names an unknown query.
pub fn build_registry(config: &PulseConfig) -> Result<QueryRegistry, CliError> {
    let registry = QueryRegistry::builtin(config.poll_interval())
        .with_overrides(&config.queries.disabled, &config.queries.intervals)?;
    Ok(registry)
}

fn dry_run_collector(registry: QueryRegistry, config: &PulseConfig) -> QueryCollector {
    QueryCollector::new(registry, Arc::new(DryRunRunner), Arc::new(LogSink))
        .with_options(CollectorOptions::from(config))
}

/// Tick a dry-run collector `ticks` times, `step_secs` apart
pub async fn simulate(
    registry: QueryRegistry,
    config: &PulseConfig,
    ticks: u32,
    start: i64,
    step_secs: u64,
) -> Vec<TickReport> {
    let mut collector = dry_run_collector(registry, config);
    let step = i64::try_from(step_secs).unwrap_or(i64::MAX);

    let mut reports = Vec::with_capacity(ticks as usize);
    for i in 0..i64::from(ticks) {
        let now = start.saturating_add(step.saturating_mul(i));
        reports.push(collector.tick(now).await);
    }
    reports
}

// ============================================================================
// Rendering
// ============================================================================

/// Render the catalog listing
///
/// # Errors
/// Returns a [`CliError`] if JSON serialization fails.
pub fn render_list(registry: &QueryRegistry, format: OutputFormat) -> Result<String, CliError> {
    let views: Vec<QueryView> = registry
        .iter()
        .map(|q| QueryView::from_descriptor(q, false))
        .collect();

    match format {
        OutputFormat::Json => Ok(Envelope::new(
            "mp.list.v1",
            serde_json::json!({ "queries": views, "total": views.len() }),
        )
        .to_json_pretty()?),
        OutputFormat::Text => {
            let mut out = String::new();
            let _ = writeln!(out, "{:<18} {:>8}  {:<10} STATEMENT", "NAME", "INTERVAL", "MODE");
            for view in &views {
                let _ = writeln!(
                    out,
                    "{:<18} {:>8}  {:<10} {}",
                    view.name,
                    format_interval(view.interval_secs),
                    view.mode,
                    preview(&view.statement)
                );
            }
            let _ = write!(out, "{} queries", views.len());
            Ok(out)
        }
    }
}

/// Render one query with its full statement
///
/// # Errors
/// Returns [`CliError::UnknownQuery`] if no query is named `name`.
pub fn render_show(
    registry: &QueryRegistry,
    name: &str,
    format: OutputFormat,
) -> Result<String, CliError> {
    let query = registry
        .get(name)
        .ok_or_else(|| CliError::UnknownQuery(name.to_string()))?;
    let view = QueryView::from_descriptor(query, true);

    match format {
        OutputFormat::Json => Ok(Envelope::new("mp.show.v1", view).to_json_pretty()?),
        OutputFormat::Text => {
            let mut out = String::new();
            let _ = writeln!(out, "name:     {}", view.name);
            let _ = writeln!(out, "interval: {}", format_interval(view.interval_secs));
            let _ = writeln!(out, "mode:     {}", view.mode);
            if let (Some(key), Some(value)) = (&query.key, &query.value) {
                let _ = writeln!(out, "key:      {key}");
                let _ = writeln!(out, "value:    {value}");
            }
            let _ = writeln!(out);
            let _ = write!(out, "{}", view.statement.trim_matches('\n'));
            Ok(out)
        }
    }
}

/// Render simulated ticks
///
/// # Errors
/// Returns a [`CliError`] if JSON serialization fails.
pub fn render_simulation(
    reports: &[TickReport],
    start: i64,
    format: OutputFormat,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => Ok(Envelope::new(
            "mp.simulate.v1",
            serde_json::json!({ "start": start, "ticks": reports }),
        )
        .to_json_pretty()?),
        OutputFormat::Text => {
            let mut out = String::new();
            for report in reports {
                let waiting: Vec<String> = report
                    .outcomes
                    .iter()
                    .filter(|o| o.status == OutcomeStatus::Skipped)
                    .map(|o| match o.decision {
                        GateDecision::Waiting { remaining_secs } => {
                            format!("{} ({remaining_secs}s)", o.query)
                        }
                        _ => o.query.clone(),
                    })
                    .collect();

                let _ = writeln!(
                    out,
                    "t+{:<6} run: {}",
                    report.now.saturating_sub(start),
                    report.admitted().join(", ")
                );
                if !waiting.is_empty() {
                    let _ = writeln!(out, "          waiting: {}", waiting.join(", "));
                }
            }
            Ok(out.trim_end().to_string())
        }
    }
}

fn format_interval(secs: u64) -> String {
    match secs {
        0 => "every".to_string(),
        s if s % 3600 == 0 => format!("{}h", s / 3600),
        s if s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{s}s"),
    }
}

fn preview(statement: &str) -> String {
    if statement.chars().count() <= PREVIEW_CHARS {
        return statement.to_string();
    }
    let cut: String = statement.chars().take(PREVIEW_CHARS - 3).collect();
    format!("{cut}...")
}
