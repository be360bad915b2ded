//! # tally-core
//!
//! Core credit ledger logic for Tally - shared between the CLI and any
//! service layer wrapping it.
//!
//! This crate provides:
//! - Database operations (`db` module)
//! - Credit ledger: store, consumption, replenishment, analytics
//!   (`ledger` module)
//! - Unified error handling (`error` module)

pub mod db;
pub mod error;
pub mod ledger;

// Re-exports for convenience
pub use db::Database;
pub use error::{LedgerError, Result};

// Re-export commonly used types from the ledger
pub use ledger::{
    AccountQuota, ConsumeReceipt, ConsumptionEngine, DailyUsage, LedgerStore, QuotaView,
    ReplenishmentManager, UsageAnalytics, UsageEvent, UsageStats,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version
pub fn version() -> &'static str {
    VERSION
}
