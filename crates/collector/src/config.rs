//! Process configuration from command-line flags and environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Collector configuration.
///
/// Every flag can also be set through the environment variable named in
/// `--help`. `RUST_LOG` controls the tracing filter (default: `"info"`).
#[derive(Debug, Clone, Parser)]
#[command(
    name = "collector",
    version,
    about = "Collects module usage notifications over TCP"
)]
pub struct Config {
    /// Port to listen on for notifications
    #[arg(short, long, env = "COLLECTOR_PORT", default_value_t = 1234)]
    pub port: u16,

    /// Address to bind the listener to
    #[arg(long, env = "COLLECTOR_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Path to the SQLite usage database
    #[arg(short, long, env = "COLLECTOR_DB")]
    pub db: PathBuf,

    /// Import a TSV history file (`-` for stdin, `.gz` for gzip) into --db, then exit
    #[arg(
        short = 't',
        long = "import",
        env = "COLLECTOR_IMPORT",
        conflicts_with = "migrate_from"
    )]
    pub import: Option<PathBuf>,

    /// Replay another usage database into --db under the current rules, then exit
    #[arg(long, env = "COLLECTOR_MIGRATE_FROM")]
    pub migrate_from: Option<PathBuf>,

    /// TOML file overriding the built-in classifier rules
    #[arg(long, env = "COLLECTOR_RULES")]
    pub rules: Option<PathBuf>,

    /// Address to serve Prometheus metrics on
    #[arg(long, env = "COLLECTOR_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    /// Seconds to wait for in-flight connections on shutdown
    #[arg(long, env = "COLLECTOR_DRAIN_TIMEOUT_SECS", default_value_t = 5)]
    pub drain_timeout_secs: u64,

    /// Emit logs as JSON lines
    #[arg(long, env = "COLLECTOR_LOG_JSON")]
    pub log_json: bool,
}

/// What a run of the collector does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Listen for notifications until signalled.
    Serve,
    /// Import a TSV file into a new database.
    Import(PathBuf),
    /// Replay an existing database into a new one.
    Migrate(PathBuf),
}

impl Config {
    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    pub fn mode(&self) -> Mode {
        match (&self.import, &self.migrate_from) {
            (Some(source), _) => Mode::Import(source.clone()),
            (None, Some(source)) => Mode::Migrate(source.clone()),
            (None, None) => Mode::Serve,
        }
    }
}
