pub mod exchange_rate;
pub mod sheet;
pub mod yahoo_finance;

// Re-export the cache for providers to easily share
pub use crate::core::cache::Cache;
