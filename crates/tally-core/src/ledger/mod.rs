//! Credit ledger module
//!
//! Tracks, allocates, consumes, and replenishes per-account credit quotas
//! used to gate metered operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ LedgerStore (transactional storage layer)               │
//! │   - create_quota() / read_quota()                       │
//! │   - atomic_update(): CAS loop, no lost updates          │
//! └─────────────────────────────────────────────────────────┘
//!          ▲                ▲
//!          │                │
//! ┌─────────────────┐  ┌──────────────────────┐
//! │ConsumptionEngine│  │ReplenishmentManager  │
//! │  - consume()    │  │  - add_purchased..() │
//! │                 │  │  - reset_monthly..() │
//! └─────────────────┘  └──────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────┐
//! │ UsageAnalytics (read-only projector)                    │
//! │   - usage_stats() from the append-only event log        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Two pools fund each account: the monthly pool, refilled at each cycle
//! reset, and the purchased pool, which never expires. Consumption draws
//! the monthly pool first.
//!
//! # Usage
//!
//! ```ignore
//! use tally_core::ledger::{ConsumptionEngine, LedgerStore};
//!
//! let store = LedgerStore::new(db.pool.clone());
//! store.create_quota("acct-1", 500).await?;
//!
//! let engine = ConsumptionEngine::new(store);
//! let receipt = engine.consume("acct-1", 30).await?;
//! println!("{} credits left", receipt.total_remaining);
//! ```

pub mod analytics;
pub mod consume;
pub mod replenish;
pub mod store;
pub mod types;

// Re-export main types
pub use types::{
    AccountQuota,
    ConsumeReceipt,
    QuotaView,
    StoredAccountQuota,
    StoredUsageEvent,
    UsageEvent,
};

// Re-export store
pub use store::{LedgerStore, QuotaMutation, UsageAppend, MAX_UPDATE_ATTEMPTS};

// Re-export engines
pub use consume::ConsumptionEngine;
pub use replenish::{ReplenishmentManager, CYCLE_DAYS};

// Re-export analytics
pub use analytics::{
    used_in_window,
    DailyUsage,
    UsageAnalytics,
    UsageStats,
    CRITICAL_CREDITS_PERCENT,
    LOW_CREDITS_PERCENT,
};
