use super::{report, ui};
use crate::core::config::AppConfig;
use crate::core::source::TransactionSource;
use crate::core::valuation::Position;
use crate::core::{CurrencyRateProvider, PriceProvider};
use anyhow::Result;
use comfy_table::Cell;

/// Renders the stock-centric view: weighted average trade prices and
/// the realized/unrealized split, one row per position.
pub fn render(positions: &[Position], currency: &str) -> String {
    let mut table = ui::new_styled_table();

    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Status"),
        ui::header_cell(&format!("Avg Buy ({currency})")),
        ui::header_cell(&format!("Avg Sell ({currency})")),
        ui::header_cell(&format!("Realized ({currency})")),
        ui::header_cell(&format!("Unrealized ({currency})")),
        ui::header_cell(&format!("Total Value ({currency})")),
        ui::header_cell(&format!("Profit ({currency})")),
        ui::header_cell("Profit (%)"),
    ]);

    for position in positions {
        table.add_row(vec![
            Cell::new(&position.ticker),
            Cell::new(ui::style_text(
                &position.status().to_string(),
                ui::StyleType::Subtle,
            )),
            ui::format_optional_cell(position.weighted_avg_buy_price(), |p| format!("{p:.2}")),
            ui::format_optional_cell(position.weighted_avg_sell_price(), |p| format!("{p:.2}")),
            ui::amount_cell(format!("{:.2}", position.realized_value())),
            ui::amount_cell(format!("{:.2}", position.unrealized_value())),
            ui::amount_cell(format!("{:.2}", position.total_value())),
            ui::change_cell(position.profit(), |v| format!("{v:.2}")),
            ui::change_cell(position.profit_pct(), |v| format!("{v:.2}%")),
        ]);
    }

    format!(
        "{}\n\n{}",
        ui::style_text("Positions summary", ui::StyleType::Title),
        table
    )
}

pub async fn run(
    source: &(dyn TransactionSource + Send + Sync),
    price_provider: &(dyn PriceProvider + Send + Sync),
    rate_provider: &(dyn CurrencyRateProvider + Send + Sync),
    config: &AppConfig,
) -> Result<()> {
    let data = report::build_report(source, price_provider, rate_provider, config, true).await?;

    for rejection in &data.rejections {
        println!(
            "{}",
            ui::style_text(&format!("Skipped {rejection}"), ui::StyleType::Error)
        );
    }

    println!("{}", render(&data.positions, &config.currency));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::valuation::ValueSource;

    #[test]
    fn test_render_shows_averages_and_split() {
        let positions = vec![Position {
            ticker: "AAPL".to_string(),
            held_quantity: 7.0,
            total_invested: 900.0,
            dividends_received: 0.0,
            bought_quantity: 10.0,
            bought_cost: 1500.0,
            sold_quantity: 3.0,
            sold_proceeds: 600.0,
            current_price: Some(180.0),
            current_value: 1260.0,
            value_source: ValueSource::Market,
        }];

        let output = render(&positions, "USD");
        assert!(output.contains("AAPL"));
        assert!(output.contains("Partially Closed"));
        // 1500 over 10 units bought, 600 over 3 units sold
        assert!(output.contains("150.00"));
        assert!(output.contains("200.00"));
        assert!(output.contains("600.00"));
        assert!(output.contains("1260.00"));
        assert!(output.contains("1860.00"));
        assert!(output.contains("360.00"));
        assert!(output.contains("24.00%"));
    }

    #[test]
    fn test_render_dividend_only_position_has_no_averages() {
        let positions = vec![Position {
            ticker: "AAPL".to_string(),
            held_quantity: 0.0,
            total_invested: 0.0,
            dividends_received: 27.5,
            bought_quantity: 0.0,
            bought_cost: 0.0,
            sold_quantity: 0.0,
            sold_proceeds: 0.0,
            current_price: None,
            current_value: 0.0,
            value_source: ValueSource::CostBasis,
        }];

        let output = render(&positions, "EUR");
        assert!(output.contains("Closed"));
        assert!(output.contains("N/A"));
    }
}
