//! Command implementations and terminal rendering helpers.

pub mod export;
pub mod report;
pub mod setup;
pub mod summary;
pub mod transactions;
pub mod ui;
