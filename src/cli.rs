use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "bet-client",
    version,
    about = "Lottery agency client: uploads bets and queries winners"
)]
pub struct Cli {
    /// JSON config file. Flags and environment variables override it.
    #[clap(short, long, env = "CLI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Agency identifier (1-255)
    #[clap(long, env = "CLI_ID")]
    pub id: Option<u8>,

    /// Server address (eg: server:12345)
    #[clap(long, env = "CLI_SERVER_ADDRESS")]
    pub server_address: Option<String>,

    /// Maximum number of bets per batch (1-255)
    #[clap(long, env = "CLI_BATCH_MAXAMOUNT")]
    pub batch_size: Option<u8>,

    /// CSV file with the agency's bets
    #[clap(long, env = "CLI_BETS_FILE")]
    pub bets_file: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[clap(long, env = "CLI_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Submit all bets, then ask for this agency's winners
    #[default]
    Run,
    /// Only submit the bets
    Submit,
    /// Only ask for this agency's winners
    Winners,
}
