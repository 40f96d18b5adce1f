//! Client for the lottery agency protocol.
//!
//! - `protocol`: binary codecs for bet batches and winners queries
//! - `ipc::tcp`: connection dialing with bounded retry, deadline-bound I/O
//! - `shutdown`: cancellation signal shared by every network operation
//! - `client`: the agency session driving both exchanges
//! - `records`: CSV bet loading and batching

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod ipc;
pub mod logging;
pub mod protocol;
pub mod records;
pub mod shutdown;

pub use client::{Client, SubmitSummary};
pub use config::ClientConfig;
pub use error::ClientError;
pub use shutdown::Shutdown;
