//! Transaction sources: a published Google Sheets CSV export fetched
//! over HTTP, and a local CSV file with the same column layout
//! (Ticker, Type, Quantity, Price, Currency, Date).

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::source::TransactionSource;
use crate::core::transaction::RawRow;

fn parse_rows(data: &str) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data.as_bytes());

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: RawRow = record.context("Failed to parse CSV row")?;
        rows.push(row);
    }
    debug!("Parsed {} rows from CSV", rows.len());
    Ok(rows)
}

/// Fetches rows from a published Google Sheets CSV export URL. The
/// sheet must be shared as "anyone with the link"; no auth handshake
/// is performed.
pub struct SheetCsvSource {
    url: String,
}

impl SheetCsvSource {
    pub fn new(url: &str) -> Self {
        SheetCsvSource {
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl TransactionSource for SheetCsvSource {
    async fn fetch_rows(&self) -> Result<Vec<RawRow>> {
        debug!("Requesting transaction sheet from {}", self.url);

        let client = reqwest::Client::builder().user_agent("folio/1.0").build()?;
        let response = client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for sheet URL: {}", e, self.url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for sheet URL: {}",
                response.status(),
                self.url
            ));
        }

        let body = response.text().await?;
        parse_rows(&body)
    }
}

/// Reads rows from a local CSV file.
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        CsvFileSource {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl TransactionSource for CsvFileSource {
    async fn fetch_rows(&self) -> Result<Vec<RawRow>> {
        let data = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read CSV file: {}", self.path.display()))?;
        parse_rows(&data)
    }
}
