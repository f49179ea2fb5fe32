use super::ui;
use crate::core::config::AppConfig;
use crate::core::source::TransactionSource;
use crate::core::transaction::{self, RowRejection, Transaction, TxKind};
use crate::core::valuation::{self, PortfolioReport, Position, ValueSource};
use crate::core::{CurrencyRateProvider, PriceProvider, PriceQuote};
use anyhow::Result;
use comfy_table::Cell;
use futures::future::join_all;
use std::collections::HashMap;
use tracing::{debug, info};

/// Everything one refresh produces: positions, aggregate totals and
/// the rows that failed validation.
#[derive(Debug)]
pub struct ReportData {
    pub positions: Vec<Position>,
    pub report: PortfolioReport,
    pub rejections: Vec<RowRejection>,
}

/// Tickers that need a market quote: anything with buy/sell activity
/// and no manual override. Override and dividend-only tickers skip the
/// price fan-out entirely.
fn tickers_to_fetch(transactions: &[Transaction], config: &AppConfig) -> Vec<String> {
    let mut tickers = Vec::new();
    for tx in transactions {
        if tx.kind == TxKind::Dividend {
            continue;
        }
        if config.overrides.contains_key(&tx.ticker) {
            continue;
        }
        if !tickers.contains(&tx.ticker) {
            tickers.push(tx.ticker.clone());
        }
    }
    tickers
}

/// Fetches transactions, prices them and aggregates the portfolio.
/// Price lookups run concurrently; only the transaction source itself
/// can fail hard.
pub async fn build_report(
    source: &(dyn TransactionSource + Send + Sync),
    price_provider: &(dyn PriceProvider + Send + Sync),
    rate_provider: &(dyn CurrencyRateProvider + Send + Sync),
    config: &AppConfig,
    show_progress: bool,
) -> Result<ReportData> {
    let rows = source.fetch_rows().await?;
    info!("Fetched {} rows from transaction source", rows.len());

    let (transactions, rejections) = transaction::clean_rows(&rows);

    let tickers = tickers_to_fetch(&transactions, config);
    let pb = if show_progress {
        ui::new_progress_bar(tickers.len() as u64, true)
    } else {
        indicatif::ProgressBar::hidden()
    };
    pb.set_message("Fetching prices...");

    let price_futures = tickers.iter().map(|ticker| {
        let pb_clone = pb.clone();
        async move {
            let res = price_provider.fetch_price(ticker).await;
            pb_clone.inc(1);
            (ticker.clone(), res)
        }
    });

    let price_results: HashMap<String, Result<PriceQuote>> =
        join_all(price_futures).await.into_iter().collect();
    pb.finish_and_clear();
    debug!("Fetched {} price quotes", price_results.len());

    let positions = valuation::compute_positions(
        &transactions,
        &price_results,
        rate_provider,
        &config.overrides,
        &config.currency,
    )
    .await;
    let report = valuation::aggregate(&positions);

    Ok(ReportData {
        positions,
        report,
        rejections,
    })
}

fn value_source_label(source: ValueSource) -> &'static str {
    match source {
        ValueSource::Market => "market",
        ValueSource::Override => "manual",
        ValueSource::CostBasis => "cost basis",
    }
}

/// Renders the dashboard: one row per position, aggregate totals at
/// the bottom.
pub fn render(data: &ReportData, currency: &str) -> String {
    let mut table = ui::new_styled_table();

    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Units"),
        ui::header_cell(&format!("Price ({currency})")),
        ui::header_cell(&format!("Invested ({currency})")),
        ui::header_cell(&format!("Dividends ({currency})")),
        ui::header_cell(&format!("Value ({currency})")),
        ui::header_cell(&format!("Return ({currency})")),
        ui::header_cell("Return (%)"),
        ui::header_cell("Priced"),
    ]);

    for position in &data.positions {
        let position_return = position.current_value - position.total_invested;
        let return_pct = if position.total_invested == 0.0 {
            0.0
        } else {
            (position_return / position.total_invested) * 100.0
        };

        table.add_row(vec![
            Cell::new(&position.ticker),
            ui::amount_cell(format!("{:.2}", position.held_quantity)),
            ui::format_optional_cell(position.current_price, |p| format!("{p:.2}")),
            ui::amount_cell(format!("{:.2}", position.total_invested)),
            ui::amount_cell(format!("{:.2}", position.dividends_received)),
            ui::amount_cell(format!("{:.2}", position.current_value)),
            ui::change_cell(position_return, |v| format!("{v:.2}")),
            ui::change_cell(return_pct, |v| format!("{v:.2}%")),
            Cell::new(ui::style_text(
                value_source_label(position.value_source),
                ui::StyleType::Subtle,
            )),
        ]);
    }

    let report = &data.report;
    let mut output = format!(
        "Portfolio: {}\n\n",
        ui::style_text(&format!("{} positions", data.positions.len()), ui::StyleType::Title)
    );
    output.push_str(&table.to_string());
    output.push_str(&format!(
        "\n\nTotal Invested ({}): {}\nCurrent Value ({}): {}\nTotal Return ({}): {} ({:.2}%)\nDividends ({}): {}\nActive positions: {}",
        ui::style_text(currency, ui::StyleType::TotalLabel),
        ui::style_text(&format!("{:.2}", report.total_invested), ui::StyleType::TotalValue),
        ui::style_text(currency, ui::StyleType::TotalLabel),
        ui::style_text(&format!("{:.2}", report.current_value), ui::StyleType::TotalValue),
        ui::style_text(currency, ui::StyleType::TotalLabel),
        ui::style_text(&format!("{:.2}", report.total_return), ui::StyleType::TotalValue),
        report.total_return_pct,
        ui::style_text(currency, ui::StyleType::TotalLabel),
        ui::style_text(&format!("{:.2}", report.dividends_received), ui::StyleType::TotalValue),
        report.active_positions,
    ));

    output
}

pub async fn run(
    source: &(dyn TransactionSource + Send + Sync),
    price_provider: &(dyn PriceProvider + Send + Sync),
    rate_provider: &(dyn CurrencyRateProvider + Send + Sync),
    config: &AppConfig,
) -> Result<()> {
    let data = build_report(source, price_provider, rate_provider, config, true).await?;

    for rejection in &data.rejections {
        println!(
            "{}",
            ui::style_text(&format!("Skipped {rejection}"), ui::StyleType::Error)
        );
    }

    println!("{}", render(&data, &config.currency));
    Ok(())
}
