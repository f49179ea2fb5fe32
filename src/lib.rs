pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::{AppConfig, SourceConfig};
use crate::core::price::PriceQuote;
use crate::core::source::TransactionSource;
use anyhow::{Result, bail};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Commands that need a loaded configuration. `setup` is handled
/// separately in the binary since it creates the configuration.
pub enum AppCommand {
    Report,
    Summary,
    Transactions,
    Export { output: Option<PathBuf> },
}

fn build_source(source: &SourceConfig) -> Result<Box<dyn TransactionSource + Send + Sync>> {
    // A local snapshot wins over the live sheet
    if let Some(path) = &source.csv_path {
        return Ok(Box::new(providers::sheet::CsvFileSource::new(path)));
    }
    if let Some(url) = &source.sheet_url {
        return Ok(Box::new(providers::sheet::SheetCsvSource::new(url)));
    }
    bail!("No transaction source configured")
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Portfolio tracker starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    // Create shared caches for the lifetime of this run
    let price_cache = Arc::new(core::cache::Cache::<String, PriceQuote>::new());
    let rate_cache = Arc::new(core::cache::Cache::<String, f64>::new());

    let yahoo_base = config
        .providers
        .yahoo
        .as_ref()
        .map_or("https://query1.finance.yahoo.com", |p| &p.base_url);
    let price_provider =
        providers::yahoo_finance::YahooFinanceProvider::new(yahoo_base, Arc::clone(&price_cache));

    let rates_base = config
        .providers
        .exchange_rate
        .as_ref()
        .map_or("https://api.exchangerate-api.com", |p| &p.base_url);
    let rate_provider =
        providers::exchange_rate::ExchangeRateProvider::new(rates_base, Arc::clone(&rate_cache));

    let source = build_source(&config.source)?;

    match command {
        AppCommand::Report => {
            cli::report::run(source.as_ref(), &price_provider, &rate_provider, &config).await
        }
        AppCommand::Summary => {
            cli::summary::run(source.as_ref(), &price_provider, &rate_provider, &config).await
        }
        AppCommand::Transactions => cli::transactions::run(source.as_ref()).await,
        AppCommand::Export { output } => {
            cli::export::run(
                source.as_ref(),
                &price_provider,
                &rate_provider,
                &config,
                output.as_deref(),
            )
            .await
        }
    }
}
