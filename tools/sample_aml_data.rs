//! Sample AML Data Generator
//!
//! Writes synthetic transactions in the IBM AML CSV layout to stdout for
//! pipeline testing.
//!
//! Usage: sample-aml-data [count] [laundering_rate] [malformed_rate]

use aml_inference_pipeline::types::transaction::columns;
use anyhow::Context;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::Rng;
use std::io::{BufWriter, Write};
use tracing::info;

const CURRENCIES: [&str; 6] = ["US Dollar", "Euro", "UK Pound", "Yen", "Swiss Franc", "Bitcoin"];

/// Transaction row matching the pipeline's expected columns
#[derive(Debug, Clone)]
struct Transaction {
    timestamp: NaiveDateTime,
    from_bank: u32,
    account: String,
    to_bank: u32,
    to_account: String,
    amount_received: f64,
    receiving_currency: &'static str,
    amount_paid: f64,
    payment_currency: &'static str,
    payment_format: &'static str,
    is_laundering: bool,
}

impl Transaction {
    fn to_csv(&self) -> String {
        format!(
            "{},{},{},{},{},{:.2},{},{:.2},{},{},{}",
            self.timestamp.format("%Y/%m/%d %H:%M"),
            self.from_bank,
            self.account,
            self.to_bank,
            self.to_account,
            self.amount_received,
            self.receiving_currency,
            self.amount_paid,
            self.payment_currency,
            self.payment_format,
            u8::from(self.is_laundering)
        )
    }
}

/// Transaction generator for testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
    start: NaiveDateTime,
}

impl TransactionGenerator {
    fn new() -> anyhow::Result<Self> {
        let start = NaiveDate::from_ymd_opt(2022, 9, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .context("invalid base date")?;
        Ok(Self {
            rng: rand::thread_rng(),
            start,
        })
    }

    /// Generate a random legitimate transaction
    fn generate_legitimate(&mut self) -> Transaction {
        let amount = self.rng.gen_range(10.0..5000.0);
        let currency = self.random_choice(&CURRENCIES[..5]);
        let hour = self.rng.gen_range(7..22);

        Transaction {
            timestamp: self.timestamp(hour),
            from_bank: self.bank(),
            account: self.account(),
            to_bank: self.bank(),
            to_account: self.account(),
            amount_received: amount,
            receiving_currency: currency,
            amount_paid: amount,
            payment_currency: currency,
            payment_format: self
                .random_choice(&["Credit Card", "Cheque", "ACH", "Cash", "Reinvestment"]),
            is_laundering: false,
        }
    }

    /// Generate a laundering-like transaction
    fn generate_suspicious(&mut self) -> Transaction {
        let paid = self.rng.gen_range(10_000.0..500_000.0);
        let hour = self.rng.gen_range(0..5); // Night time
        let from_bank = self.bank();
        let account = self.account();

        Transaction {
            timestamp: self.timestamp(hour),
            from_bank,
            // Layering through the same bank now and then
            to_bank: if self.rng.gen_bool(0.3) { from_bank } else { self.bank() },
            to_account: self.account(),
            account,
            amount_received: paid * self.rng.gen_range(0.85..0.99), // FX loss
            receiving_currency: self.random_choice(&["Bitcoin", "Euro", "Swiss Franc"]),
            amount_paid: paid,
            payment_currency: "US Dollar",
            payment_format: self.random_choice(&["ACH", "Wire", "Bitcoin"]),
            is_laundering: true,
        }
    }

    fn timestamp(&mut self, hour: i64) -> NaiveDateTime {
        let day = self.rng.gen_range(0..30);
        let minute = self.rng.gen_range(0..60);
        self.start + Duration::days(day) + Duration::hours(hour) + Duration::minutes(minute)
    }

    fn bank(&mut self) -> u32 {
        self.rng.gen_range(10..400_000)
    }

    fn account(&mut self) -> String {
        format!("{:09X}", self.rng.gen_range(0x1000_0000_u64..0xF_FFFF_FFFF))
    }

    fn random_choice(&mut self, choices: &[&'static str]) -> &'static str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

/// Break a field the extractor has to parse
fn malform(row: &str, rng: &mut impl Rng) -> String {
    let mut fields: Vec<&str> = row.split(',').collect();
    match rng.gen_range(0..3) {
        0 => fields[0] = "unknown",
        1 => fields[5] = "n/a",
        _ => fields.truncate(7),
    }
    fields.join(",")
}

/// Probability argument at `index`, clamped to `[0, 1]`. Missing,
/// unparsable and non-finite values fall back to `default`.
fn rate_arg(args: &[String], index: usize, default: f64) -> f64 {
    args.get(index)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|rate| rate.is_finite())
        .unwrap_or(default)
        .clamp(0.0, 1.0)
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays valid CSV
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_aml_data=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let count: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(100);
    let laundering_rate = rate_arg(&args, 2, 0.1);
    let malformed_rate = rate_arg(&args, 3, 0.0);

    info!(
        count = count,
        laundering_rate = laundering_rate,
        malformed_rate = malformed_rate,
        "Generating sample transactions"
    );

    let mut generator = TransactionGenerator::new()?;
    let mut rng = rand::thread_rng();
    let mut out = BufWriter::new(std::io::stdout().lock());

    writeln!(out, "{}", columns::ALL.join(","))?;

    let mut suspicious_count = 0;
    let mut malformed_count = 0;
    for _ in 0..count {
        let transaction = if rng.gen_bool(laundering_rate) {
            suspicious_count += 1;
            generator.generate_suspicious()
        } else {
            generator.generate_legitimate()
        };

        let mut row = transaction.to_csv();
        if rng.gen_bool(malformed_rate) {
            malformed_count += 1;
            row = malform(&row, &mut rng);
        }
        writeln!(out, "{row}")?;
    }
    out.flush()?;

    info!(
        "Completed! Wrote {} transactions ({} laundering, {} malformed)",
        count, suspicious_count, malformed_count
    );

    Ok(())
}
