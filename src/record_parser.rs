//! Delimited-text parsing into transaction records.
//!
//! The format is deliberately simple: one record per line, comma separated,
//! no quoting. The first non-blank line is the header.

use crate::error::ParseError;
use crate::types::transaction::TransactionRecord;
use tracing::debug;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Parse raw bytes, rejecting input that is not UTF-8.
pub fn parse_bytes(input: &[u8]) -> Result<Vec<TransactionRecord>, ParseError> {
    let text = std::str::from_utf8(input).map_err(|e| ParseError::Encoding(e.to_string()))?;
    parse(text)
}

/// Parse comma-delimited text into one record per non-blank data line.
///
/// Values are trimmed. A short row leaves its trailing columns as `None`;
/// values past the last header column are dropped.
pub fn parse(input: &str) -> Result<Vec<TransactionRecord>, ParseError> {
    let input = input.strip_prefix(BYTE_ORDER_MARK).unwrap_or(input);

    let mut lines = input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let (_, header_line) = lines.next().ok_or(ParseError::MissingHeader)?;
    let headers: Vec<String> = header_line
        .split(',')
        .map(|h| h.trim().to_string())
        .collect();

    let records: Vec<TransactionRecord> = lines
        .map(|(idx, line)| {
            let mut values = line.split(',').map(str::trim);
            let fields = headers
                .iter()
                .map(|header| (header.clone(), values.next().map(str::to_string)))
                .collect();
            TransactionRecord::new(idx + 1, fields)
        })
        .collect();

    debug!(
        columns = headers.len(),
        rows = records.len(),
        "Parsed transaction records"
    );

    Ok(records)
}
