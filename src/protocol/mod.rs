//! Wire protocol shared with the lottery server.
//!
//! All multi-byte integers are big-endian. Every message starts with a one
//! byte tag identifying its kind.

pub mod bet;
pub mod winners;

use std::io::Read;

pub use bet::{Bet, decode_batch, encode_batch};
pub use winners::{WinnersRequest, WinnersResponse};

/// Tag of a bet batch submission.
pub const BET_BATCH_MESSAGE: u8 = 1;
/// Tag of a winners query.
pub const WINNERS_REQUEST_MESSAGE: u8 = 2;

/// Confirmation byte the server returns for an accepted batch.
pub const CONFIRMATION_ACCEPTED: u8 = 1;

pub const DOCUMENT_LEN: usize = 8;
pub const BIRTHDATE_LEN: usize = 10;

/// Largest batch the one-byte count can describe.
pub const MAX_BATCH_LEN: usize = u8::MAX as usize;

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{field} is {len} bytes long (max 255)")]
    FieldTooLong { field: &'static str, len: usize },

    #[error("{field} must be exactly {expected} bytes, got {len}")]
    FieldLength {
        field: &'static str,
        expected: usize,
        len: usize,
    },

    #[error("batch is empty")]
    EmptyBatch,

    #[error("batch of {0} bets exceeds the limit of 255")]
    BatchTooLarge(usize),

    #[error("frame declares {declared} bytes but fields use {actual}")]
    FrameLength { declared: usize, actual: usize },

    #[error("unexpected message type: {0}")]
    UnexpectedMessage(u8),

    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    #[error("too many documents for one response: {0}")]
    TooManyDocuments(usize),

    #[error("stream ended while reading {0}")]
    ShortRead(&'static str),
}

/// Reads exactly `buf.len()` bytes, reporting a truncated input as
/// [`FormatError::ShortRead`] for `what`.
pub(crate) fn read_exact(
    reader: &mut impl Read,
    buf: &mut [u8],
    what: &'static str,
) -> Result<(), FormatError> {
    reader.read_exact(buf).map_err(|e| short_read(e, what))
}

pub(crate) fn short_read(err: std::io::Error, what: &'static str) -> FormatError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        FormatError::ShortRead(what)
    } else {
        FormatError::Io(err)
    }
}

pub(crate) fn read_u8(reader: &mut impl Read, what: &'static str) -> Result<u8, FormatError> {
    let mut byte = [0u8];
    read_exact(reader, &mut byte, what)?;
    Ok(byte[0])
}

pub(crate) fn read_u16(reader: &mut impl Read, what: &'static str) -> Result<u16, FormatError> {
    let mut bytes = [0u8; 2];
    read_exact(reader, &mut bytes, what)?;
    Ok(u16::from_be_bytes(bytes))
}

pub(crate) fn read_string(
    reader: &mut impl Read,
    len: usize,
    what: &'static str,
) -> Result<String, FormatError> {
    let mut bytes = vec![0u8; len];
    read_exact(reader, &mut bytes, what)?;
    String::from_utf8(bytes).map_err(|_| FormatError::InvalidUtf8(what))
}

/// Checks a field that must be exactly `expected` bytes on the wire.
pub(crate) fn check_fixed(
    field: &'static str,
    value: &str,
    expected: usize,
) -> Result<(), FormatError> {
    if value.len() != expected {
        return Err(FormatError::FieldLength {
            field,
            expected,
            len: value.len(),
        });
    }
    Ok(())
}
