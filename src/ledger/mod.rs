pub mod json;
pub mod progress;

pub use json::JsonLedgerFile;
pub use progress::ProgressLedger;

use std::collections::BTreeSet;

use anyhow::Result;

use crate::models::PrNumber;

/// Durable storage behind a [`ProgressLedger`]
pub trait LedgerStore {
    /// Read the persisted set, `None` if nothing has been persisted yet
    fn read(&self) -> Result<Option<BTreeSet<PrNumber>>>;

    /// Replace the persisted set with `ids`
    fn write(&self, ids: &BTreeSet<PrNumber>) -> Result<()>;

    /// Human-readable location for log messages
    fn describe(&self) -> String;
}
