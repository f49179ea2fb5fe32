use super::report;
use crate::core::config::AppConfig;
use crate::core::source::TransactionSource;
use crate::core::valuation::Position;
use crate::core::{CurrencyRateProvider, PriceProvider};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Serializes positions as CSV: one row per position plus the column
/// layout the dashboard shows (ticker, quantity, invested, current
/// value, return, return %).
pub fn write_positions<W: Write>(positions: &[Position], currency: &str, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);

    writer.write_record([
        "Ticker".to_string(),
        "Quantity".to_string(),
        format!("Invested ({currency})"),
        format!("Current Value ({currency})"),
        format!("Return ({currency})"),
        "Return (%)".to_string(),
    ])?;

    for position in positions {
        let position_return = position.current_value - position.total_invested;
        let return_pct = if position.total_invested == 0.0 {
            0.0
        } else {
            (position_return / position.total_invested) * 100.0
        };
        writer.write_record([
            position.ticker.clone(),
            format!("{:.2}", position.held_quantity),
            format!("{:.2}", position.total_invested),
            format!("{:.2}", position.current_value),
            format!("{:.2}", position_return),
            format!("{return_pct:.2}"),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub async fn run(
    source: &(dyn TransactionSource + Send + Sync),
    price_provider: &(dyn PriceProvider + Send + Sync),
    rate_provider: &(dyn CurrencyRateProvider + Send + Sync),
    config: &AppConfig,
    output: Option<&Path>,
) -> Result<()> {
    let data = report::build_report(source, price_provider, rate_provider, config, true).await?;

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create export file: {}", path.display()))?;
            write_positions(&data.positions, &config.currency, file)?;
            info!("Exported {} positions to {}", data.positions.len(), path.display());
            println!("Exported {} positions to {}", data.positions.len(), path.display());
        }
        None => {
            write_positions(&data.positions, &config.currency, std::io::stdout().lock())?;
        }
    }
    Ok(())
}
