//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod currency;
pub mod log;
pub mod price;
pub mod source;
pub mod transaction;
pub mod valuation;

// Re-export main types for cleaner imports
pub use currency::CurrencyRateProvider;
pub use price::{PriceProvider, PriceQuote};
pub use source::TransactionSource;
pub use transaction::{RawRow, Transaction, TxKind};
pub use valuation::{PortfolioReport, Position, PositionStatus, ValueSource};
