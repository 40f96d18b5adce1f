//! Client configuration.
//!
//! Settings come from three layers, highest precedence first: command-line
//! flags (or their `CLI_*` environment variables), an optional JSON file, and
//! built-in defaults.
//!
//! ```json
//! {
//!   "id": 1,
//!   "server_address": "server:12345",
//!   "batch_size": 100,
//!   "batch_timeout_ms": 10000,
//!   "winners_timeout_ms": 5000,
//!   "connect_attempts": 5,
//!   "connect_backoff_ms": 2000,
//!   "post_submit_delay_ms": 1000,
//!   "bets_file": "/data/agency-1.csv"
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cli::Cli;
use crate::ipc::tcp::{DEFAULT_CONNECT_ATTEMPTS, DEFAULT_CONNECT_BACKOFF};

pub const DEFAULT_BATCH_SIZE: u8 = 100;
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_WINNERS_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_POST_SUBMIT_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_BETS_FILE: &str = "agency.csv";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("batch size must be between 1 and 255")]
    InvalidBatchSize,

    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Everything the session needs. Fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub agency: u8,
    pub server_address: String,
    pub batch_size: u8,
    /// Read/write deadline for one batch round-trip.
    pub batch_timeout: Duration,
    /// Read/write deadline for a winners query.
    pub winners_timeout: Duration,
    pub connect_attempts: u32,
    pub connect_backoff: Duration,
    /// Pause after the last accepted batch so the server can flush its logs.
    pub post_submit_delay: Duration,
    pub bets_file: PathBuf,
}

impl ClientConfig {
    pub fn new(agency: u8, server_address: impl Into<String>) -> Self {
        Self {
            agency,
            server_address: server_address.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            winners_timeout: DEFAULT_WINNERS_TIMEOUT,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            connect_backoff: DEFAULT_CONNECT_BACKOFF,
            post_submit_delay: DEFAULT_POST_SUBMIT_DELAY,
            bets_file: PathBuf::from(DEFAULT_BETS_FILE),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        if self.server_address.trim().is_empty() {
            return Err(ConfigError::Missing("server_address"));
        }
        Ok(())
    }

    /// Builds the configuration from the parsed command line, reading the
    /// config file it points to if any.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let agency = cli.id.or(file.id).ok_or(ConfigError::Missing("id"))?;
        let server_address = cli
            .server_address
            .clone()
            .or(file.server_address)
            .ok_or(ConfigError::Missing("server_address"))?;

        let mut config = Self::new(agency, server_address);
        if let Some(batch_size) = cli.batch_size.or(file.batch_size) {
            config.batch_size = batch_size;
        }
        if let Some(ms) = file.batch_timeout_ms {
            config.batch_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.winners_timeout_ms {
            config.winners_timeout = Duration::from_millis(ms);
        }
        if let Some(attempts) = file.connect_attempts {
            config.connect_attempts = attempts;
        }
        if let Some(ms) = file.connect_backoff_ms {
            config.connect_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = file.post_submit_delay_ms {
            config.post_submit_delay = Duration::from_millis(ms);
        }
        if let Some(path) = cli.bets_file.clone().or(file.bets_file) {
            config.bets_file = path;
        }

        config.validate()?;
        Ok(config)
    }
}

/// On-disk representation. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    id: Option<u8>,
    server_address: Option<String>,
    batch_size: Option<u8>,
    batch_timeout_ms: Option<u64>,
    winners_timeout_ms: Option<u64>,
    connect_attempts: Option<u32>,
    connect_backoff_ms: Option<u64>,
    post_submit_delay_ms: Option<u64>,
    bets_file: Option<PathBuf>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
