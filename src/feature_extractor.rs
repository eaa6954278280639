//! Feature extraction for AML model inference.
//!
//! Turns one [`TransactionRecord`] into the 28-value vector the served model
//! was trained on. Nine features come from the record itself. The sixteen
//! per-entity aggregates and three categorical slots come from pluggable
//! collaborators ([`HistoricalStats`], [`CategoricalEncoder`]) which default
//! to zeros.
//!
//! Extraction never fails. A field that cannot be parsed falls back to a
//! default and is reported as a [`Degradation`].

use crate::types::transaction::{columns, TransactionRecord};
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::Serialize;

/// Number of features per transaction.
pub const FEATURE_COUNT: usize = 28;

/// Number of categorical encoding slots at the end of the vector.
pub const ENCODING_SLOTS: usize = 3;

/// Fixed-order model input for one transaction.
pub type FeatureVector = [f32; FEATURE_COUNT];

/// Feature names, in vector order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    // Intra-record (9)
    "amount_received",
    "amount_paid",
    "fx_spread",
    "is_cross_currency",
    "same_bank",
    "self_transfer",
    "hour",
    "day_of_week",
    "is_weekend",
    // Originating account aggregates (4)
    "acc_tx_count",
    "acc_amt_paid_mean",
    "acc_amt_recv_mean",
    "acc_cross_ccy_rate",
    // Destination account aggregates (4)
    "toacc_tx_count",
    "toacc_amt_paid_mean",
    "toacc_amt_recv_mean",
    "toacc_cross_ccy_rate",
    // Originating bank aggregates (4)
    "fb_tx_count",
    "fb_amt_paid_mean",
    "fb_amt_recv_mean",
    "fb_cross_ccy_rate",
    // Destination bank aggregates (4)
    "tb_tx_count",
    "tb_amt_paid_mean",
    "tb_amt_recv_mean",
    "tb_cross_ccy_rate",
    // Categorical encodings (3)
    "payment_format_enc",
    "receiving_currency_enc",
    "payment_currency_enc",
];

/// Timestamp layouts accepted, most specific to the dataset first.
const TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y/%m/%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Entity whose transaction history feeds an aggregate block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Account,
    ToAccount,
    FromBank,
    ToBank,
}

impl EntityKind {
    /// Aggregate blocks in vector order.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Account,
        EntityKind::ToAccount,
        EntityKind::FromBank,
        EntityKind::ToBank,
    ];

    /// Column holding this entity's identifier.
    pub fn column(self) -> &'static str {
        match self {
            EntityKind::Account => columns::ACCOUNT,
            EntityKind::ToAccount => columns::TO_ACCOUNT,
            EntityKind::FromBank => columns::FROM_BANK,
            EntityKind::ToBank => columns::TO_BANK,
        }
    }
}

/// Historical statistics for one entity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EntityAggregates {
    pub tx_count: f32,
    pub mean_amount_paid: f32,
    pub mean_amount_received: f32,
    pub cross_currency_rate: f32,
}

impl EntityAggregates {
    fn to_array(self) -> [f32; 4] {
        [
            self.tx_count,
            self.mean_amount_paid,
            self.mean_amount_received,
            self.cross_currency_rate,
        ]
    }
}

/// Source of per-entity historical aggregates.
pub trait HistoricalStats: Send + Sync {
    /// Aggregates for the entity identified by `key` (`None` when the record
    /// has no value for the entity's column).
    fn lookup(&self, kind: EntityKind, key: Option<&str>) -> EntityAggregates;
}

/// Historical stats placeholder: every entity has all-zero aggregates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

impl HistoricalStats for NoHistory {
    fn lookup(&self, _kind: EntityKind, _key: Option<&str>) -> EntityAggregates {
        EntityAggregates::default()
    }
}

/// Encoder for the categorical slots at the end of the vector.
pub trait CategoricalEncoder: Send + Sync {
    fn encode(&self, record: &TransactionRecord) -> [f32; ENCODING_SLOTS];
}

/// Encoding placeholder: all slots zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEncoding;

impl CategoricalEncoder for NoEncoding {
    fn encode(&self, _record: &TransactionRecord) -> [f32; ENCODING_SLOTS] {
        [0.0; ENCODING_SLOTS]
    }
}

/// A field that could not be parsed and fell back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// Amount column missing or not a finite `f32`; used 0
    UnparsableAmount {
        column: &'static str,
        value: Option<String>,
    },
    /// Timestamp missing or in an unknown layout; used the Unix epoch
    UnparsableTimestamp { value: Option<String> },
    /// Computed or collaborator-supplied feature was NaN or infinite; used 0
    NonFiniteFeature { feature: &'static str },
}

/// A feature vector plus any fallbacks taken while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub vector: FeatureVector,
    pub degradations: Vec<Degradation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TimeFeatures {
    hour: u32,
    /// Sunday = 0
    day_of_week: u32,
}

/// 1970-01-01 00:00 was a Thursday.
const NULL_DATE: TimeFeatures = TimeFeatures {
    hour: 0,
    day_of_week: 4,
};

/// Feature extractor that transforms transaction records into model input.
///
/// Features are produced in the exact order of [`FEATURE_NAMES`].
pub struct FeatureExtractor {
    stats: Box<dyn HistoricalStats>,
    encoder: Box<dyn CategoricalEncoder>,
}

impl FeatureExtractor {
    /// Create an extractor with zero placeholders for aggregates and encodings.
    pub fn new() -> Self {
        Self::with_collaborators(Box::new(NoHistory), Box::new(NoEncoding))
    }

    /// Create an extractor backed by real historical stats and encodings.
    pub fn with_collaborators(
        stats: Box<dyn HistoricalStats>,
        encoder: Box<dyn CategoricalEncoder>,
    ) -> Self {
        Self { stats, encoder }
    }

    /// Extract the feature vector for a record.
    pub fn extract(&self, record: &TransactionRecord) -> FeatureVector {
        self.extract_with_report(record).vector
    }

    /// Extract the feature vector and report any field that degraded.
    pub fn extract_with_report(&self, record: &TransactionRecord) -> Extraction {
        let mut degradations = Vec::new();
        let mut features = [0.0_f32; FEATURE_COUNT];

        let amount_received = amount(record, columns::AMOUNT_RECEIVED, &mut degradations);
        let amount_paid = amount(record, columns::AMOUNT_PAID, &mut degradations);

        features[0] = amount_received as f32;
        features[1] = amount_paid as f32;
        // fx_spread
        features[2] = (amount_paid - amount_received) as f32;

        // Pairwise equality flags, case-sensitive on trimmed values
        features[3] = flag(differs(
            record,
            columns::RECEIVING_CURRENCY,
            columns::PAYMENT_CURRENCY,
        ));
        features[4] = flag(!differs(record, columns::FROM_BANK, columns::TO_BANK));
        features[5] = flag(!differs(record, columns::ACCOUNT, columns::TO_ACCOUNT));

        let time = time_features(record, &mut degradations);
        features[6] = time.hour as f32;
        features[7] = time.day_of_week as f32;
        features[8] = flag(time.day_of_week == 0 || time.day_of_week == 6);

        for (block, kind) in EntityKind::ALL.iter().enumerate() {
            let start = 9 + block * 4;
            let aggregates = self.stats.lookup(*kind, record.get(kind.column()));
            features[start..start + 4].copy_from_slice(&aggregates.to_array());
        }

        features[FEATURE_COUNT - ENCODING_SLOTS..].copy_from_slice(&self.encoder.encode(record));

        // FP32 tensors carry finite values only
        for (i, value) in features.iter_mut().enumerate() {
            if !value.is_finite() {
                degradations.push(Degradation::NonFiniteFeature {
                    feature: FEATURE_NAMES[i],
                });
                *value = 0.0;
            }
        }

        Extraction {
            vector: features,
            degradations,
        }
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names in vector order.
    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn flag(condition: bool) -> f32 {
    if condition {
        1.0
    } else {
        0.0
    }
}

/// Two absent values compare equal.
fn differs(record: &TransactionRecord, a: &str, b: &str) -> bool {
    record.get(a) != record.get(b)
}

fn amount(record: &TransactionRecord, column: &'static str, out: &mut Vec<Degradation>) -> f64 {
    let raw = record.get(column);
    match raw
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| (*v as f32).is_finite())
    {
        Some(value) => value,
        None => {
            out.push(Degradation::UnparsableAmount {
                column,
                value: raw.map(str::to_string),
            });
            0.0
        }
    }
}

fn time_features(record: &TransactionRecord, out: &mut Vec<Degradation>) -> TimeFeatures {
    let raw = record.get(columns::TIMESTAMP);
    match raw.and_then(parse_timestamp) {
        Some(ts) => TimeFeatures {
            hour: ts.hour(),
            day_of_week: ts.weekday().num_days_from_sunday(),
        },
        None => {
            out.push(Degradation::UnparsableTimestamp {
                value: raw.map(str::to_string),
            });
            NULL_DATE
        }
    }
}

/// Parse a dataset timestamp as wall-clock time, no timezone applied.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw.trim(), fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchAssembler;
    use crate::inference::protocol::InferRequest;
    use crate::record_parser;
    use std::collections::HashMap;

    fn sample_record() -> TransactionRecord {
        TransactionRecord::from_pairs(
            2,
            [
                (columns::TIMESTAMP, "2019/01/01 00:22"),
                (columns::FROM_BANK, "800319940"),
                (columns::ACCOUNT, "8004ED620"),
                (columns::TO_BANK, "808519790"),
                (columns::TO_ACCOUNT, "872ABC810"),
                (columns::AMOUNT_RECEIVED, "120.92"),
                (columns::RECEIVING_CURRENCY, "US Dollar"),
                (columns::AMOUNT_PAID, "120.92"),
                (columns::PAYMENT_CURRENCY, "US Dollar"),
                (columns::PAYMENT_FORMAT, "Credit Card"),
                (columns::IS_LAUNDERING, "0"),
            ],
        )
    }

    fn with_field(record: &TransactionRecord, column: &str, value: &str) -> TransactionRecord {
        let mut fields: HashMap<String, Option<String>> = record
            .columns()
            .map(|c| (c.to_string(), record.get(c).map(str::to_string)))
            .collect();
        fields.insert(column.to_string(), Some(value.to_string()));
        TransactionRecord::new(record.line(), fields)
    }

    #[test]
    fn test_feature_extraction() {
        let extractor = FeatureExtractor::new();
        let extraction = extractor.extract_with_report(&sample_record());
        let v = extraction.vector;

        assert_eq!(
            &v[..9],
            &[120.92_f32, 120.92, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0]
        );
        assert!(v[9..].iter().all(|&x| x == 0.0));
        assert!(extraction.degradations.is_empty());
    }

    #[test]
    fn test_feature_count() {
        let extractor = FeatureExtractor::new();
        assert_eq!(extractor.feature_count(), 28);
        assert_eq!(extractor.feature_names().len(), 28);
        assert_eq!(extractor.extract(&sample_record()).len(), 28);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let extractor = FeatureExtractor::new();
        let record = sample_record();
        assert_eq!(extractor.extract(&record), extractor.extract(&record));
    }

    #[test]
    fn test_derived_flags() {
        let extractor = FeatureExtractor::new();
        let base = sample_record();

        let r = with_field(&base, columns::AMOUNT_PAID, "150.5");
        let r = with_field(&r, columns::PAYMENT_CURRENCY, "Euro");
        let r = with_field(&r, columns::TO_BANK, "800319940");
        let r = with_field(&r, columns::TO_ACCOUNT, "8004ED620");
        let v = extractor.extract(&r);

        assert!((v[2] - (150.5 - 120.92) as f32).abs() < 1e-4);
        assert_eq!(v[3], 1.0); // cross currency
        assert_eq!(v[4], 1.0); // same bank
        assert_eq!(v[5], 1.0); // self transfer
    }

    #[test]
    fn test_cross_currency_is_case_sensitive() {
        let extractor = FeatureExtractor::new();
        let r = with_field(&sample_record(), columns::PAYMENT_CURRENCY, "us dollar");
        assert_eq!(extractor.extract(&r)[3], 1.0);
    }

    #[test]
    fn test_weekend_and_hour() {
        let extractor = FeatureExtractor::new();
        // 2019-01-05 was a Saturday, 2019-01-06 a Sunday
        let sat = with_field(&sample_record(), columns::TIMESTAMP, "2019/01/05 23:59");
        let sun = with_field(&sample_record(), columns::TIMESTAMP, "2019/01/06 13:05");

        let v = extractor.extract(&sat);
        assert_eq!((v[6], v[7], v[8]), (23.0, 6.0, 1.0));
        let v = extractor.extract(&sun);
        assert_eq!((v[6], v[7], v[8]), (13.0, 0.0, 1.0));
    }

    #[test]
    fn test_unparsable_fields_degrade() {
        let extractor = FeatureExtractor::new();
        let r = with_field(&sample_record(), columns::AMOUNT_RECEIVED, "n/a");
        let r = with_field(&r, columns::AMOUNT_PAID, "NaN");
        let r = with_field(&r, columns::TIMESTAMP, "yesterday");
        let extraction = extractor.extract_with_report(&r);
        let v = extraction.vector;

        assert_eq!(&v[..3], &[0.0_f32, 0.0, 0.0]);
        assert_eq!((v[6], v[7], v[8]), (0.0, 4.0, 0.0));
        assert_eq!(extraction.degradations.len(), 3);
        assert!(extraction.degradations.contains(&Degradation::UnparsableTimestamp {
            value: Some("yesterday".to_string())
        }));
    }

    #[test]
    fn test_amounts_beyond_f32_range_degrade() {
        let extractor = FeatureExtractor::new();
        let r = with_field(&sample_record(), columns::AMOUNT_PAID, "1e39");
        let extraction = extractor.extract_with_report(&r);

        assert_eq!(extraction.vector[1], 0.0);
        assert!(extraction.vector.iter().all(|x| x.is_finite()));
        assert_eq!(
            extraction.degradations,
            vec![Degradation::UnparsableAmount {
                column: columns::AMOUNT_PAID,
                value: Some("1e39".to_string()),
            }]
        );
    }

    #[test]
    fn test_overflowing_spread_degrades() {
        let extractor = FeatureExtractor::new();
        let r = with_field(&sample_record(), columns::AMOUNT_RECEIVED, "-3e38");
        let r = with_field(&r, columns::AMOUNT_PAID, "3e38");
        let extraction = extractor.extract_with_report(&r);
        let v = extraction.vector;

        assert_eq!(&v[..3], &[-3e38_f32, 3e38, 0.0]);
        assert_eq!(
            extraction.degradations,
            vec![Degradation::NonFiniteFeature {
                feature: "fx_spread"
            }]
        );
    }

    #[test]
    fn test_non_finite_collaborator_values_are_zeroed() {
        struct NanStats;

        impl HistoricalStats for NanStats {
            fn lookup(&self, _kind: EntityKind, _key: Option<&str>) -> EntityAggregates {
                EntityAggregates {
                    mean_amount_paid: f32::NAN,
                    ..EntityAggregates::default()
                }
            }
        }

        let extractor =
            FeatureExtractor::with_collaborators(Box::new(NanStats), Box::new(NoEncoding));
        let extraction = extractor.extract_with_report(&sample_record());

        assert!(extraction.vector.iter().all(|x| x.is_finite()));
        assert_eq!(extraction.degradations.len(), 4);
        assert!(extraction
            .degradations
            .contains(&Degradation::NonFiniteFeature {
                feature: "tb_amt_paid_mean"
            }));
    }

    #[test]
    fn test_overflowing_amounts_keep_wire_tensor_numeric() {
        let input = format!(
            "{}\n2019/01/01 00:22,1,A,2,B,-3e38,US Dollar,3e38,US Dollar,Wire,0\n2019/01/01 00:22,1,A,2,B,1,US Dollar,1e39,US Dollar,Wire,0",
            columns::ALL.join(",")
        );
        let records = record_parser::parse(&input).unwrap();
        let extractor = FeatureExtractor::new();
        let vectors: Vec<FeatureVector> = records.iter().map(|r| extractor.extract(r)).collect();
        let batch = BatchAssembler::default().assemble(&vectors);
        let request = InferRequest::from_batch(batch, "input__0", serde_json::Map::new());

        let json = serde_json::to_value(&request).unwrap();
        let data = json["inputs"][0]["data"].as_array().unwrap();
        assert_eq!(data.len(), 2 * FEATURE_COUNT);
        assert!(data.iter().all(|x| x.is_f64()), "non-numeric tensor entry");
    }

    #[test]
    fn test_end_to_end_vector_from_csv() {
        let input = format!(
            "{}\n2019/01/01 00:22,800319940,8004ED620,808519790,872ABC810,120.92,US Dollar,120.92,US Dollar,Credit Card,0\n",
            columns::ALL.join(",")
        );
        let records = record_parser::parse(&input).unwrap();
        assert_eq!(records.len(), 1);

        let v = FeatureExtractor::new().extract(&records[0]);
        assert_eq!(
            &v[..9],
            &[120.92_f32, 120.92, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0]
        );
        assert!(v[9..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_empty_record_still_has_full_length() {
        let extractor = FeatureExtractor::new();
        let record = TransactionRecord::new(2, HashMap::new());
        let extraction = extractor.extract_with_report(&record);

        assert_eq!(extraction.vector.len(), FEATURE_COUNT);
        // Absent currencies, banks and accounts compare equal
        assert_eq!(extraction.vector[3], 0.0);
        assert_eq!(extraction.vector[4], 1.0);
        assert_eq!(extraction.vector[5], 1.0);
        assert_eq!(extraction.degradations.len(), 3);
    }

    struct FixedStats;

    impl HistoricalStats for FixedStats {
        fn lookup(&self, kind: EntityKind, key: Option<&str>) -> EntityAggregates {
            let base = match kind {
                EntityKind::Account => 1.0,
                EntityKind::ToAccount => 2.0,
                EntityKind::FromBank => 3.0,
                EntityKind::ToBank => 4.0,
            };
            EntityAggregates {
                tx_count: if key.is_some() { base } else { -1.0 },
                mean_amount_paid: base * 10.0,
                mean_amount_received: base * 100.0,
                cross_currency_rate: 0.5,
            }
        }
    }

    struct FormatEncoder;

    impl CategoricalEncoder for FormatEncoder {
        fn encode(&self, record: &TransactionRecord) -> [f32; ENCODING_SLOTS] {
            match record.get(columns::PAYMENT_FORMAT) {
                Some("Credit Card") => [1.0, 0.0, 0.0],
                _ => [0.0, 0.0, 0.0],
            }
        }
    }

    #[test]
    fn test_collaborators_fill_placeholder_slots() {
        let extractor =
            FeatureExtractor::with_collaborators(Box::new(FixedStats), Box::new(FormatEncoder));
        let v = extractor.extract(&sample_record());

        assert_eq!(&v[9..13], &[1_f32, 10.0, 100.0, 0.5]);
        assert_eq!(&v[13..17], &[2_f32, 20.0, 200.0, 0.5]);
        assert_eq!(&v[17..21], &[3_f32, 30.0, 300.0, 0.5]);
        assert_eq!(&v[21..25], &[4_f32, 40.0, 400.0, 0.5]);
        assert_eq!(&v[25..], &[1.0_f32, 0.0, 0.0]);
        assert_eq!(FEATURE_NAMES[9], "acc_tx_count");
        assert_eq!(FEATURE_NAMES[25], "payment_format_enc");
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        assert!(parse_timestamp("2019/01/01 00:22").is_some());
        assert!(parse_timestamp("2019/01/01 00:22:15").is_some());
        assert!(parse_timestamp("2019-01-01T00:22:15").is_some());
        assert!(parse_timestamp("01/01/2019").is_none());
    }
}
