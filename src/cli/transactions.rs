use super::ui;
use crate::core::source::TransactionSource;
use crate::core::transaction::{self, Transaction};
use anyhow::Result;
use comfy_table::Cell;
use tracing::info;

/// Renders the cleaned transaction history as a table.
pub fn render(transactions: &[Transaction]) -> String {
    let mut table = ui::new_styled_table();

    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Ticker"),
        ui::header_cell("Type"),
        ui::header_cell("Quantity"),
        ui::header_cell("Price"),
        ui::header_cell("Currency"),
    ]);

    for tx in transactions {
        let date = tx
            .date
            .map_or("N/A".to_string(), |d| d.format("%Y-%m-%d").to_string());
        table.add_row(vec![
            Cell::new(date),
            Cell::new(&tx.ticker),
            Cell::new(tx.kind.to_string()),
            ui::amount_cell(format!("{:.2}", tx.quantity)),
            ui::amount_cell(format!("{:.2}", tx.price)),
            Cell::new(&tx.currency),
        ]);
    }

    let mut output = table.to_string();
    output.push_str(&format!(
        "\n\nTotal transactions: {}",
        ui::style_text(&transactions.len().to_string(), ui::StyleType::TotalLabel)
    ));
    output
}

pub async fn run(source: &(dyn TransactionSource + Send + Sync)) -> Result<()> {
    let rows = source.fetch_rows().await?;
    info!("Fetched {} rows from transaction source", rows.len());

    let (transactions, rejections) = transaction::clean_rows(&rows);

    for rejection in &rejections {
        println!(
            "{}",
            ui::style_text(&format!("Skipped {rejection}"), ui::StyleType::Error)
        );
    }

    println!("{}", render(&transactions));
    Ok(())
}
