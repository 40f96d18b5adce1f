//! Loads bets from the agency's CSV file.
//!
//! Each line is `first name,last name,document,birth date,number`. Lines that
//! cannot be turned into a valid [`Bet`] are logged and skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::protocol::{BIRTHDATE_LEN, Bet, DOCUMENT_LEN};

const COLUMNS: usize = 5;

/// Why a CSV line was not turned into a bet.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("expected 5 columns, found {0}")]
    ColumnCount(usize),

    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    #[error("invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

/// Parses one CSV line into a bet for `agency`.
pub fn parse_line(line: &str, agency: u8) -> Result<Bet, RecordError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != COLUMNS {
        return Err(RecordError::ColumnCount(fields.len()));
    }

    let first_name = name_field("first name", fields[0])?;
    let last_name = name_field("last name", fields[1])?;
    let document = normalize_document(fields[2])?;

    let birthdate = fields[3];
    if birthdate.len() != BIRTHDATE_LEN {
        return Err(RecordError::InvalidField {
            field: "birth date",
            value: birthdate.to_string(),
        });
    }

    let number = fields[4]
        .parse::<u16>()
        .map_err(|_| RecordError::InvalidNumber(fields[4].to_string()))?;

    Ok(Bet {
        agency,
        first_name,
        last_name,
        document,
        birthdate: birthdate.to_string(),
        number,
    })
}

fn name_field(field: &'static str, value: &str) -> Result<String, RecordError> {
    if value.len() > u8::MAX as usize {
        return Err(RecordError::InvalidField {
            field,
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}

/// Short numeric documents are zero-padded on the left to the wire width.
fn normalize_document(value: &str) -> Result<String, RecordError> {
    let numeric = !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit());
    match value.len() {
        DOCUMENT_LEN => Ok(value.to_string()),
        len if len < DOCUMENT_LEN && numeric => Ok(format!("{:0>width$}", value, width = DOCUMENT_LEN)),
        _ => Err(RecordError::InvalidField {
            field: "document",
            value: value.to_string(),
        }),
    }
}

/// Reads every valid bet from `reader`, in line order.
pub fn read_bets(reader: impl BufRead, agency: u8) -> std::io::Result<Vec<Bet>> {
    let mut bets = Vec::new();
    let mut skipped = 0usize;

    for (idx, raw) in reader.split(b'\n').enumerate() {
        let mut raw = raw?;
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        let parsed = match String::from_utf8(raw) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => parse_line(&line, agency),
            Err(_) => Err(RecordError::InvalidUtf8),
        };
        match parsed {
            Ok(bet) => bets.push(bet),
            Err(e) => {
                skipped += 1;
                tracing::warn!(
                    "action: read_bet | result: fail | line: {} | error: {}",
                    idx + 1,
                    e
                );
            }
        }
    }

    tracing::debug!("loaded {} bets, skipped {} malformed lines", bets.len(), skipped);
    Ok(bets)
}

pub fn load_bets(path: &Path, agency: u8) -> std::io::Result<Vec<Bet>> {
    let file = File::open(path)?;
    read_bets(BufReader::new(file), agency)
}

/// Splits bets into submission windows of at most `batch_size`, keeping
/// their order. The last window may be shorter.
pub fn batches(bets: &[Bet], batch_size: usize) -> std::slice::Chunks<'_, Bet> {
    bets.chunks(batch_size.max(1))
}
