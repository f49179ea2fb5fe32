//! Transaction source abstraction.
//!
//! A source hands back raw spreadsheet rows; validation into typed
//! transactions happens separately in [`crate::core::transaction`].

use crate::core::transaction::RawRow;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Fetch all rows from the backing sheet. A reachable but empty
    /// sheet is `Ok(vec![])`; only structural failures (unreachable
    /// URL, missing file, malformed CSV) are errors.
    async fn fetch_rows(&self) -> Result<Vec<RawRow>>;
}
