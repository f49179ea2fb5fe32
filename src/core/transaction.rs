//! Transaction model and row validation.
//!
//! Spreadsheet rows arrive as loosely formatted strings. This module
//! turns each row into a typed [`Transaction`] or a [`RowRejection`]
//! carrying the reason, so the valuation engine only ever sees clean
//! input.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt::Display;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    Buy,
    Sell,
    Dividend,
}

impl Display for TxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                TxKind::Buy => "Buy",
                TxKind::Sell => "Sell",
                TxKind::Dividend => "Dividend",
            }
        )
    }
}

impl FromStr for TxKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(TxKind::Buy),
            "SELL" => Ok(TxKind::Sell),
            "DIV" | "DIVIDEND" => Ok(TxKind::Dividend),
            other => Err(anyhow!("Unknown transaction type: {other}")),
        }
    }
}

/// One validated row of portfolio activity.
///
/// `quantity` is unused for dividends; `price` is the per-unit price
/// for buys and sells and the total amount received for dividends.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub ticker: String,
    pub kind: TxKind,
    pub quantity: f64,
    pub price: f64,
    pub currency: String,
    pub date: Option<NaiveDate>,
}

/// A spreadsheet row as exported: every field is a string until
/// validation proves otherwise.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRow {
    #[serde(default, rename = "Ticker")]
    pub ticker: String,
    #[serde(default, rename = "Type")]
    pub kind: String,
    #[serde(default, rename = "Quantity")]
    pub quantity: String,
    #[serde(default, rename = "Price")]
    pub price: String,
    #[serde(default, rename = "Currency")]
    pub currency: String,
    #[serde(default, rename = "Date")]
    pub date: String,
}

/// Why a row was excluded from the report.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRejection {
    /// 1-based data row number (header not counted).
    pub row: usize,
    pub reason: String,
}

impl Display for RowRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}: {}", self.row, self.reason)
    }
}

/// Parses a decimal that may use European formatting, where `.` is a
/// thousands separator and `,` the decimal separator. Blank values
/// parse as zero (dividend rows commonly leave Quantity empty).
fn parse_amount(raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    let normalized = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_string()
    };
    normalized
        .parse::<f64>()
        .map_err(|_| anyhow!("Not a number: '{raw}'"))
}

/// Parses a date in ISO or day-first formats. Unparseable dates are
/// dropped rather than rejecting the row: the engine never uses them.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    debug!("Could not parse transaction date '{trimmed}'");
    None
}

/// Validates one raw row into a typed transaction.
pub fn validate_row(raw: &RawRow) -> Result<Transaction> {
    let ticker = raw.ticker.trim();
    if ticker.is_empty() {
        return Err(anyhow!("Missing ticker"));
    }

    let kind: TxKind = raw.kind.parse()?;

    let quantity = parse_amount(&raw.quantity)?;
    if quantity < 0.0 {
        return Err(anyhow!("Negative quantity: {quantity}"));
    }

    let price = parse_amount(&raw.price)?;
    if price < 0.0 {
        return Err(anyhow!("Negative price: {price}"));
    }

    let currency = raw.currency.trim().to_uppercase();
    if currency.is_empty() {
        return Err(anyhow!("Missing currency"));
    }

    Ok(Transaction {
        ticker: ticker.to_string(),
        kind,
        quantity,
        price,
        currency,
        date: parse_date(&raw.date),
    })
}

/// Validates a batch of rows, partitioning them into transactions and
/// rejections. Rejections are logged but never abort the batch.
pub fn clean_rows(rows: &[RawRow]) -> (Vec<Transaction>, Vec<RowRejection>) {
    let mut transactions = Vec::with_capacity(rows.len());
    let mut rejections = Vec::new();

    for (index, raw) in rows.iter().enumerate() {
        match validate_row(raw) {
            Ok(tx) => transactions.push(tx),
            Err(e) => {
                let rejection = RowRejection {
                    row: index + 1,
                    reason: e.to_string(),
                };
                warn!("Skipping transaction {rejection}");
                rejections.push(rejection);
            }
        }
    }

    debug!(
        "Cleaned {} rows: {} transactions, {} rejected",
        rows.len(),
        transactions.len(),
        rejections.len()
    );
    (transactions, rejections)
}
