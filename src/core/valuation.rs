//! Provides functions for valuing a transaction history as positions
//! and aggregate portfolio totals.

use crate::core::currency::CurrencyRateProvider;
use crate::core::price::PriceQuote;
use crate::core::transaction::{Transaction, TxKind};
use anyhow::Result;
use std::collections::HashMap;
use std::fmt::Display;
use tracing::{debug, warn};

/// Where a position's current value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// Live market quote.
    Market,
    /// Manual override from configuration.
    Override,
    /// No quote and no override; value assumed equal to cost basis.
    CostBasis,
}

/// Lifecycle of a holding, derived from its buy and sell quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Open,
    PartiallyClosed,
    Closed,
}

impl Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                PositionStatus::Open => "Open",
                PositionStatus::PartiallyClosed => "Partially Closed",
                PositionStatus::Closed => "Closed",
            }
        )
    }
}

/// The netted holding and valuation for one ticker, with every
/// monetary field expressed in the reporting currency.
#[derive(Debug, Clone)]
pub struct Position {
    pub ticker: String,
    /// Net BUY minus SELL units. May go negative on oversell; the
    /// engine reports what the sheet says rather than rejecting it.
    pub held_quantity: f64,
    /// Cost basis: BUY cost minus SELL proceeds.
    pub total_invested: f64,
    /// Dividend income, kept separate from cost basis.
    pub dividends_received: f64,
    /// Total BUY units and their cost.
    pub bought_quantity: f64,
    pub bought_cost: f64,
    /// Total SELL units and their proceeds.
    pub sold_quantity: f64,
    pub sold_proceeds: f64,
    /// Market price in the reporting currency, when a quote resolved.
    pub current_price: Option<f64>,
    pub current_value: f64,
    pub value_source: ValueSource,
}

impl Position {
    /// Weighted average buy price per unit, `None` when nothing was
    /// bought.
    pub fn weighted_avg_buy_price(&self) -> Option<f64> {
        (self.bought_quantity > 0.0).then(|| self.bought_cost / self.bought_quantity)
    }

    /// Weighted average sell price per unit, `None` when nothing was
    /// sold.
    pub fn weighted_avg_sell_price(&self) -> Option<f64> {
        (self.sold_quantity > 0.0).then(|| self.sold_proceeds / self.sold_quantity)
    }

    /// Proceeds already taken out of the position.
    pub fn realized_value(&self) -> f64 {
        self.sold_proceeds
    }

    /// Value still held. Equal to `current_value`, so it inherits the
    /// cost-basis fallback when no quote or override exists.
    pub fn unrealized_value(&self) -> f64 {
        self.current_value
    }

    pub fn total_value(&self) -> f64 {
        self.realized_value() + self.unrealized_value()
    }

    /// Realized plus unrealized value minus everything spent buying.
    pub fn profit(&self) -> f64 {
        self.total_value() - self.bought_cost
    }

    pub fn profit_pct(&self) -> f64 {
        if self.bought_cost == 0.0 {
            0.0
        } else {
            (self.profit() / self.bought_cost) * 100.0
        }
    }

    pub fn status(&self) -> PositionStatus {
        if self.held_quantity > 0.0 && self.sold_quantity > 0.0 {
            PositionStatus::PartiallyClosed
        } else if self.held_quantity > 0.0 {
            PositionStatus::Open
        } else {
            PositionStatus::Closed
        }
    }
}

/// Aggregate totals over all positions.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioReport {
    pub total_invested: f64,
    pub current_value: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    pub dividends_received: f64,
    /// Positions with a nonzero held quantity.
    pub active_positions: usize,
}

/// Resolves a conversion rate, degrading to the identity rate when the
/// lookup fails so a missing rate never sinks the whole report.
async fn resolve_rate(
    rate_provider: &(dyn CurrencyRateProvider + Send + Sync),
    from: &str,
    to: &str,
) -> f64 {
    if from == to {
        return 1.0;
    }
    match rate_provider.get_rate(from, to).await {
        Ok(rate) => {
            debug!("Using rate {rate} for {from} -> {to}");
            rate
        }
        Err(e) => {
            warn!("Rate lookup failed for {from} -> {to}, assuming 1.0: {e}");
            1.0
        }
    }
}

/// Builds one position per distinct ticker from the full transaction
/// history. Tickers appear in first-seen order for stable display.
///
/// `price_results` holds pre-fetched quotes keyed by ticker; a missing
/// or failed quote falls back to the manual `overrides` value (already
/// in the reporting currency) and finally to the cost basis. The input
/// transactions are never mutated and missing market data never
/// produces an error.
pub async fn compute_positions(
    transactions: &[Transaction],
    price_results: &HashMap<String, Result<PriceQuote>>,
    rate_provider: &(dyn CurrencyRateProvider + Send + Sync),
    overrides: &HashMap<String, f64>,
    reporting_currency: &str,
) -> Vec<Position> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<&Transaction>> = HashMap::new();
    for tx in transactions {
        grouped
            .entry(tx.ticker.clone())
            .or_insert_with(|| {
                order.push(tx.ticker.clone());
                Vec::new()
            })
            .push(tx);
    }

    let mut positions = Vec::with_capacity(order.len());

    for ticker in order {
        let group = &grouped[&ticker];
        let mut bought_quantity = 0.0;
        let mut bought_cost = 0.0;
        let mut sold_quantity = 0.0;
        let mut sold_proceeds = 0.0;
        let mut dividends_received = 0.0;

        for tx in group {
            let rate = resolve_rate(rate_provider, &tx.currency, reporting_currency).await;
            match tx.kind {
                TxKind::Buy => {
                    bought_quantity += tx.quantity;
                    bought_cost += tx.quantity * tx.price * rate;
                }
                TxKind::Sell => {
                    sold_quantity += tx.quantity;
                    sold_proceeds += tx.quantity * tx.price * rate;
                }
                TxKind::Dividend => {
                    dividends_received += tx.price * rate;
                }
            }
        }

        let held_quantity = bought_quantity - sold_quantity;
        let total_invested = bought_cost - sold_proceeds;

        let (current_price, current_value, value_source) = match price_results.get(&ticker) {
            Some(Ok(quote)) => {
                let rate = resolve_rate(rate_provider, &quote.currency, reporting_currency).await;
                let price = quote.price * rate;
                (Some(price), held_quantity * price, ValueSource::Market)
            }
            other => {
                if let Some(Err(e)) = other {
                    debug!("Price fetch failed for {ticker}: {e}");
                }
                match overrides.get(&ticker) {
                    Some(value) => {
                        debug!("Using manual value override for {ticker}: {value}");
                        (None, *value, ValueSource::Override)
                    }
                    None => {
                        debug!("No quote or override for {ticker}, assuming cost basis");
                        (None, total_invested, ValueSource::CostBasis)
                    }
                }
            }
        };

        positions.push(Position {
            ticker,
            held_quantity,
            total_invested,
            dividends_received,
            bought_quantity,
            bought_cost,
            sold_quantity,
            sold_proceeds,
            current_price,
            current_value,
            value_source,
        });
    }

    positions
}

/// Sums positions into portfolio totals. Pure function; the return
/// percentage is 0 when nothing was invested.
pub fn aggregate(positions: &[Position]) -> PortfolioReport {
    let total_invested: f64 = positions.iter().map(|p| p.total_invested).sum();
    let current_value: f64 = positions.iter().map(|p| p.current_value).sum();
    let dividends_received: f64 = positions.iter().map(|p| p.dividends_received).sum();
    let total_return = current_value - total_invested;
    let total_return_pct = if total_invested == 0.0 {
        0.0
    } else {
        (total_return / total_invested) * 100.0
    };

    PortfolioReport {
        total_invested,
        current_value,
        total_return,
        total_return_pct,
        dividends_received,
        active_positions: positions.iter().filter(|p| p.held_quantity != 0.0).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;

    struct MockRateProvider {
        rates: HashMap<String, f64>,
        error_rates: HashMap<String, String>,
    }

    impl MockRateProvider {
        fn new() -> Self {
            MockRateProvider {
                rates: HashMap::new(),
                error_rates: HashMap::new(),
            }
        }

        fn add_rate(&mut self, from: &str, to: &str, rate: f64) {
            self.rates.insert(format!("{from}:{to}"), rate);
        }

        fn add_error(&mut self, from: &str, to: &str, error_msg: &str) {
            self.error_rates
                .insert(format!("{from}:{to}"), error_msg.to_string());
        }
    }

    #[async_trait]
    impl CurrencyRateProvider for MockRateProvider {
        async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
            let key = format!("{from}:{to}");
            if let Some(error_msg) = self.error_rates.get(&key) {
                return Err(anyhow!(error_msg.clone()));
            }
            self.rates
                .get(&key)
                .cloned()
                .ok_or_else(|| anyhow!("Rate not found for {} to {}", from, to))
        }
    }

    fn tx(ticker: &str, kind: TxKind, quantity: f64, price: f64, currency: &str) -> Transaction {
        Transaction {
            ticker: ticker.to_string(),
            kind,
            quantity,
            price,
            currency: currency.to_string(),
            date: None,
        }
    }

    fn quote(price: f64, currency: &str) -> Result<PriceQuote> {
        Ok(PriceQuote {
            price,
            currency: currency.to_string(),
        })
    }

    fn position(ticker: &str, quantity: f64, invested: f64, value: f64) -> Position {
        Position {
            ticker: ticker.to_string(),
            held_quantity: quantity,
            total_invested: invested,
            dividends_received: 0.0,
            bought_quantity: quantity.max(0.0),
            bought_cost: invested.max(0.0),
            sold_quantity: 0.0,
            sold_proceeds: 0.0,
            current_price: None,
            current_value: value,
            value_source: ValueSource::CostBasis,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 0.001,
            "expected {expected}, got {actual}"
        );
    }

    #[tokio::test]
    async fn test_buy_sell_netting_with_conversion() {
        let transactions = vec![
            tx("AAPL", TxKind::Buy, 10.0, 150.0, "USD"),
            tx("AAPL", TxKind::Buy, 5.0, 140.0, "USD"),
            tx("AAPL", TxKind::Sell, 3.0, 200.0, "USD"),
        ];
        let mut price_results = HashMap::new();
        price_results.insert("AAPL".to_string(), quote(180.0, "USD"));
        let mut rate_provider = MockRateProvider::new();
        rate_provider.add_rate("USD", "EUR", 0.9);

        let positions = compute_positions(
            &transactions,
            &price_results,
            &rate_provider,
            &HashMap::new(),
            "EUR",
        )
        .await;

        assert_eq!(positions.len(), 1);
        let position = &positions[0];
        assert_eq!(position.ticker, "AAPL");
        assert_close(position.held_quantity, 12.0);
        assert_close(position.total_invested, 1440.0);
        assert_close(position.current_value, 1944.0);
        assert_eq!(position.value_source, ValueSource::Market);

        let report = aggregate(&positions);
        assert_close(report.total_return, 504.0);
        assert_eq!(report.active_positions, 1);
    }

    #[tokio::test]
    async fn test_weighted_average_prices() {
        let transactions = vec![
            tx("AAPL", TxKind::Buy, 10.0, 150.0, "USD"),
            tx("AAPL", TxKind::Buy, 5.0, 140.0, "USD"),
            tx("AAPL", TxKind::Sell, 3.0, 200.0, "USD"),
        ];
        let mut rate_provider = MockRateProvider::new();
        rate_provider.add_rate("USD", "EUR", 0.9);

        let positions = compute_positions(
            &transactions,
            &HashMap::new(),
            &rate_provider,
            &HashMap::new(),
            "EUR",
        )
        .await;

        let position = &positions[0];
        // (1500 + 700) * 0.9 over 15 units; 600 * 0.9 over 3 units
        assert_close(position.weighted_avg_buy_price().unwrap(), 132.0);
        assert_close(position.weighted_avg_sell_price().unwrap(), 180.0);

        // Buy-only position has no sell average
        let buy_only = compute_positions(
            &[tx("GOOG", TxKind::Buy, 2.0, 100.0, "EUR")],
            &HashMap::new(),
            &rate_provider,
            &HashMap::new(),
            "EUR",
        )
        .await;
        assert!(buy_only[0].weighted_avg_sell_price().is_none());
        assert_close(buy_only[0].weighted_avg_buy_price().unwrap(), 100.0);
    }

    #[tokio::test]
    async fn test_realized_and_unrealized_split() {
        let transactions = vec![
            tx("AAPL", TxKind::Buy, 10.0, 150.0, "USD"),
            tx("AAPL", TxKind::Sell, 3.0, 200.0, "USD"),
        ];
        let mut price_results = HashMap::new();
        price_results.insert("AAPL".to_string(), quote(180.0, "USD"));

        let positions = compute_positions(
            &transactions,
            &price_results,
            &MockRateProvider::new(),
            &HashMap::new(),
            "USD",
        )
        .await;

        let position = &positions[0];
        assert_close(position.realized_value(), 600.0);
        assert_close(position.unrealized_value(), 7.0 * 180.0);
        assert_close(position.total_value(), 600.0 + 1260.0);
        // 1860 total against 1500 spent buying
        assert_close(position.profit(), 360.0);
        assert_close(position.profit_pct(), 24.0);
    }

    #[tokio::test]
    async fn test_position_status_lifecycle() {
        let rate_provider = MockRateProvider::new();

        let open = compute_positions(
            &[tx("A", TxKind::Buy, 5.0, 10.0, "USD")],
            &HashMap::new(),
            &rate_provider,
            &HashMap::new(),
            "USD",
        )
        .await;
        assert_eq!(open[0].status(), PositionStatus::Open);

        let partially = compute_positions(
            &[
                tx("A", TxKind::Buy, 5.0, 10.0, "USD"),
                tx("A", TxKind::Sell, 2.0, 12.0, "USD"),
            ],
            &HashMap::new(),
            &rate_provider,
            &HashMap::new(),
            "USD",
        )
        .await;
        assert_eq!(partially[0].status(), PositionStatus::PartiallyClosed);

        let closed = compute_positions(
            &[
                tx("A", TxKind::Buy, 5.0, 10.0, "USD"),
                tx("A", TxKind::Sell, 5.0, 12.0, "USD"),
            ],
            &HashMap::new(),
            &rate_provider,
            &HashMap::new(),
            "USD",
        )
        .await;
        assert_eq!(closed[0].status(), PositionStatus::Closed);

        // Closed position with a market quote has no unrealized value
        let mut price_results = HashMap::new();
        price_results.insert("A".to_string(), quote(15.0, "USD"));
        let closed_quoted = compute_positions(
            &[
                tx("A", TxKind::Buy, 5.0, 10.0, "USD"),
                tx("A", TxKind::Sell, 5.0, 12.0, "USD"),
            ],
            &price_results,
            &rate_provider,
            &HashMap::new(),
            "USD",
        )
        .await;
        assert_close(closed_quoted[0].unrealized_value(), 0.0);
        assert_close(closed_quoted[0].profit(), 10.0);
    }

    #[tokio::test]
    async fn test_dividend_only_position() {
        let transactions = vec![
            tx("AAPL", TxKind::Dividend, 0.0, 25.0, "USD"),
            tx("AAPL", TxKind::Dividend, 0.0, 30.0, "USD"),
        ];
        let mut rate_provider = MockRateProvider::new();
        rate_provider.add_rate("USD", "EUR", 0.5);

        let positions = compute_positions(
            &transactions,
            &HashMap::new(),
            &rate_provider,
            &HashMap::new(),
            "EUR",
        )
        .await;

        let position = &positions[0];
        assert_eq!(position.held_quantity, 0.0);
        assert_close(position.dividends_received, 27.5);
        assert_eq!(position.total_invested, 0.0);
        assert!(position.weighted_avg_buy_price().is_none());
        assert_eq!(position.profit_pct(), 0.0);

        // Zero holdings exclude it from the active count, and zero
        // invested must not divide by zero
        let report = aggregate(&positions);
        assert_eq!(report.active_positions, 0);
        assert_eq!(report.total_return_pct, 0.0);
        assert_close(report.dividends_received, 27.5);
    }

    #[tokio::test]
    async fn test_price_miss_falls_back_to_cost_basis() {
        let transactions = vec![tx("Real Estate #1", TxKind::Buy, 1.0, 50000.0, "EUR")];
        let mut price_results = HashMap::new();
        price_results.insert(
            "Real Estate #1".to_string(),
            Err(anyhow!("Unknown ticker")),
        );

        let positions = compute_positions(
            &transactions,
            &price_results,
            &MockRateProvider::new(),
            &HashMap::new(),
            "EUR",
        )
        .await;

        let position = &positions[0];
        assert_close(position.current_value, 50000.0);
        assert_eq!(position.current_price, None);
        assert_eq!(position.value_source, ValueSource::CostBasis);
    }

    #[tokio::test]
    async fn test_manual_override_wins_over_fallback() {
        let transactions = vec![tx("Real Estate #1", TxKind::Buy, 1.0, 50000.0, "EUR")];
        let mut overrides = HashMap::new();
        overrides.insert("Real Estate #1".to_string(), 62000.0);

        let positions = compute_positions(
            &transactions,
            &HashMap::new(),
            &MockRateProvider::new(),
            &overrides,
            "EUR",
        )
        .await;

        let position = &positions[0];
        assert_close(position.current_value, 62000.0);
        assert_eq!(position.value_source, ValueSource::Override);
    }

    #[tokio::test]
    async fn test_rate_failure_degrades_to_identity() {
        let transactions = vec![tx("RY", TxKind::Buy, 10.0, 100.0, "CAD")];
        let mut price_results = HashMap::new();
        price_results.insert("RY".to_string(), quote(110.0, "CAD"));
        let mut rate_provider = MockRateProvider::new();
        rate_provider.add_error("CAD", "USD", "Rate service unavailable");

        let positions = compute_positions(
            &transactions,
            &price_results,
            &rate_provider,
            &HashMap::new(),
            "USD",
        )
        .await;

        // Both cost basis and value fall back to rate 1.0
        assert_close(positions[0].total_invested, 1000.0);
        assert_close(positions[0].current_value, 1100.0);
    }

    #[tokio::test]
    async fn test_same_currency_skips_rate_lookup() {
        let transactions = vec![tx("AAPL", TxKind::Buy, 10.0, 150.0, "USD")];
        let mut price_results = HashMap::new();
        price_results.insert("AAPL".to_string(), quote(180.0, "USD"));

        // Provider has no rates at all; identity conversion must not
        // consult it
        let positions = compute_positions(
            &transactions,
            &price_results,
            &MockRateProvider::new(),
            &HashMap::new(),
            "USD",
        )
        .await;

        assert_close(positions[0].total_invested, 1500.0);
        assert_close(positions[0].current_value, 1800.0);
    }

    #[tokio::test]
    async fn test_first_appearance_order_is_preserved() {
        let transactions = vec![
            tx("MSFT", TxKind::Buy, 1.0, 300.0, "USD"),
            tx("AAPL", TxKind::Buy, 1.0, 150.0, "USD"),
            tx("MSFT", TxKind::Buy, 1.0, 310.0, "USD"),
            tx("GOOG", TxKind::Buy, 1.0, 140.0, "USD"),
        ];

        let positions = compute_positions(
            &transactions,
            &HashMap::new(),
            &MockRateProvider::new(),
            &HashMap::new(),
            "USD",
        )
        .await;

        let tickers: Vec<&str> = positions.iter().map(|p| p.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["MSFT", "AAPL", "GOOG"]);
    }

    #[tokio::test]
    async fn test_oversell_reports_negative_holdings() {
        let transactions = vec![
            tx("AAPL", TxKind::Buy, 5.0, 100.0, "USD"),
            tx("AAPL", TxKind::Sell, 8.0, 120.0, "USD"),
        ];

        let positions = compute_positions(
            &transactions,
            &HashMap::new(),
            &MockRateProvider::new(),
            &HashMap::new(),
            "USD",
        )
        .await;

        assert_close(positions[0].held_quantity, -3.0);
        assert_eq!(positions[0].status(), PositionStatus::Closed);
        let report = aggregate(&positions);
        assert_eq!(report.active_positions, 1);
    }

    #[test]
    fn test_aggregate_return_identity() {
        let positions = vec![
            position("A", 2.0, 100.0, 120.0),
            position("B", 0.0, -40.0, -40.0),
        ];

        let report = aggregate(&positions);
        assert_eq!(report.total_invested, 60.0);
        assert_eq!(report.current_value, 80.0);
        assert_eq!(report.total_return, report.current_value - report.total_invested);
        assert_eq!(report.active_positions, 1);
    }
}
