use std::time::Duration;

use crate::protocol::FormatError;

/// Errors that end a single exchange with the server.
///
/// None of them terminates the process; the caller decides whether to exit.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("could not connect to {addr} after {attempts} attempts: {source}")]
    ConnectionFailure {
        addr: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("short write: {expected} byte message was not fully sent")]
    ShortWrite { expected: usize },

    #[error("short read: connection closed while reading {0}")]
    ShortRead(&'static str),

    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("batch {batch} rejected by server (confirmation {code})")]
    Rejected { batch: usize, code: u8 },

    #[error("operation cancelled by shutdown")]
    Cancelled,

    #[error("connection already closed")]
    Closed,

    #[error("Format error: {0}")]
    Format(FormatError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FormatError> for ClientError {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::ShortRead(what) => ClientError::ShortRead(what),
            FormatError::Io(e) => ClientError::Io(e),
            other => ClientError::Format(other),
        }
    }
}

impl ClientError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}
