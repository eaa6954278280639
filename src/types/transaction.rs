//! Transaction records in the IBM synthetic AML layout

use serde::Serialize;
use std::collections::HashMap;

/// Column names recognized by the feature extractor.
pub mod columns {
    pub const TIMESTAMP: &str = "Timestamp";
    pub const FROM_BANK: &str = "From Bank";
    pub const ACCOUNT: &str = "Account";
    pub const TO_BANK: &str = "To Bank";
    pub const TO_ACCOUNT: &str = "To Account";
    pub const AMOUNT_RECEIVED: &str = "Amount Received";
    pub const RECEIVING_CURRENCY: &str = "Receiving Currency";
    pub const AMOUNT_PAID: &str = "Amount Paid";
    pub const PAYMENT_CURRENCY: &str = "Payment Currency";
    pub const PAYMENT_FORMAT: &str = "Payment Format";
    pub const IS_LAUNDERING: &str = "Is Laundering";

    /// Header row of the IBM synthetic AML dataset, in file order.
    pub const ALL: [&str; 11] = [
        TIMESTAMP,
        FROM_BANK,
        ACCOUNT,
        TO_BANK,
        TO_ACCOUNT,
        AMOUNT_RECEIVED,
        RECEIVING_CURRENCY,
        AMOUNT_PAID,
        PAYMENT_CURRENCY,
        PAYMENT_FORMAT,
        IS_LAUNDERING,
    ];
}

/// One input row, keyed by header column name.
///
/// Every header column is present as a key. A row that ran out of values
/// before the header did maps the remaining columns to `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    /// 1-based line number in the source text
    line: usize,
    fields: HashMap<String, Option<String>>,
}

impl TransactionRecord {
    /// Create a record from its source line number and column values.
    pub fn new(line: usize, fields: HashMap<String, Option<String>>) -> Self {
        Self { line, fields }
    }

    /// Build a record from `(column, value)` pairs. Mostly useful in tests.
    pub fn from_pairs<'a, I>(line: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), Some(v.to_string())))
            .collect();
        Self { line, fields }
    }

    /// Source line number (the header is line 1).
    pub fn line(&self) -> usize {
        self.line
    }

    /// Raw value of a column, `None` if the column is absent or has no value.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).and_then(|v| v.as_deref())
    }

    /// Whether the column exists in the header, regardless of its value.
    pub fn has_column(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    /// Column names of this record (unordered).
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_value_reads_as_none() {
        let mut fields = HashMap::new();
        fields.insert(columns::ACCOUNT.to_string(), Some("8004ED620".to_string()));
        fields.insert(columns::TO_ACCOUNT.to_string(), None);
        let record = TransactionRecord::new(2, fields);

        assert_eq!(record.get(columns::ACCOUNT), Some("8004ED620"));
        assert_eq!(record.get(columns::TO_ACCOUNT), None);
        assert!(record.has_column(columns::TO_ACCOUNT));
        assert!(!record.has_column(columns::TIMESTAMP));
        assert_eq!(record.line(), 2);
        assert_eq!(record.len(), 2);
    }
}
