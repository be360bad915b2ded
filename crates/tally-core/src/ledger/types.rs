//! Credit ledger types
//!
//! Data model for per-account credit quotas and the append-only
//! consumption log.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Account Quota
// ============================================================================

/// The persisted credit state for one account
///
/// Two pools fund metered operations:
/// - the monthly pool, refilled to `monthly_limit` at each cycle reset;
/// - the purchased pool, topped up by purchases, never reset.
///
/// Invariants: `0 <= monthly_remaining <= monthly_limit` and
/// `purchased_remaining >= 0`. The ledger store rejects any mutation that
/// would violate them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountQuota {
    /// Account this quota belongs to (unique key)
    pub account_id: String,
    /// Size of the monthly allocation pool
    pub monthly_limit: i64,
    /// Credits left in the monthly pool this cycle
    pub monthly_remaining: i64,
    /// Purchased credits left (never expire)
    pub purchased_remaining: i64,
    /// Purchased pool size at the start of the current cycle, plus any
    /// top-ups made during it. Denominator for remaining-percent reporting.
    pub purchased_at_reset: i64,
    /// Start of the current monthly cycle
    pub last_reset_at: DateTime<Utc>,
    /// When the quota record was provisioned
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl AccountQuota {
    /// Total credits available across both pools
    pub fn total_remaining(&self) -> i64 {
        self.monthly_remaining + self.purchased_remaining
    }
}

/// Read-only view of a quota record, shaped for the operation surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaView {
    pub account_id: String,
    pub monthly_limit: i64,
    pub monthly_remaining: i64,
    pub purchased_remaining: i64,
    pub total_remaining: i64,
    pub last_reset_at: DateTime<Utc>,
}

impl From<&AccountQuota> for QuotaView {
    fn from(quota: &AccountQuota) -> Self {
        Self {
            account_id: quota.account_id.clone(),
            monthly_limit: quota.monthly_limit,
            monthly_remaining: quota.monthly_remaining,
            purchased_remaining: quota.purchased_remaining,
            total_remaining: quota.total_remaining(),
            last_reset_at: quota.last_reset_at,
        }
    }
}

// ============================================================================
// Consumption Receipt
// ============================================================================

/// Outcome of a successful consumption, with the per-pool breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeReceipt {
    /// Credits drawn from the monthly pool
    pub consumed_monthly: i64,
    /// Credits drawn from the purchased pool
    pub consumed_purchased: i64,
    /// Total consumed (always equals the requested amount)
    pub total_consumed: i64,
    /// Credits left across both pools after the operation
    pub total_remaining: i64,
}

// ============================================================================
// Usage Events
// ============================================================================

/// An immutable record of one successful consumption
///
/// Used only for analytics, never for authorization decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Unique identifier (UUID)
    pub id: String,
    /// Account that consumed the credits
    pub account_id: String,
    /// Total credits consumed
    pub amount: i64,
    /// Portion funded by the monthly pool
    pub from_monthly: i64,
    /// Portion funded by the purchased pool
    pub from_purchased: i64,
    /// When the consumption happened
    pub occurred_at: DateTime<Utc>,
}

// ============================================================================
// Database Row Types
// ============================================================================

/// Database row representation of an account quota
///
/// Maps directly to the `account_quota` table schema; timestamps are stored
/// as text and parsed on the way out.
#[derive(Debug, Clone, FromRow)]
pub struct StoredAccountQuota {
    pub account_id: String,
    pub monthly_limit: i64,
    pub monthly_remaining: i64,
    pub purchased_remaining: i64,
    pub purchased_at_reset: i64,
    pub last_reset_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl StoredAccountQuota {
    /// Convert database row to AccountQuota
    ///
    /// Returns `None` if a stored timestamp fails to parse.
    pub fn to_account_quota(&self) -> Option<AccountQuota> {
        let last_reset_at = parse_datetime(&self.last_reset_at)?;
        let created_at = parse_datetime(&self.created_at)?;
        let updated_at = parse_datetime(&self.updated_at)?;

        Some(AccountQuota {
            account_id: self.account_id.clone(),
            monthly_limit: self.monthly_limit,
            monthly_remaining: self.monthly_remaining,
            purchased_remaining: self.purchased_remaining,
            purchased_at_reset: self.purchased_at_reset,
            last_reset_at,
            created_at,
            updated_at,
        })
    }
}

/// Database row representation of a usage event
#[derive(Debug, Clone, FromRow)]
pub struct StoredUsageEvent {
    pub id: String,
    pub account_id: String,
    pub amount: i64,
    pub from_monthly: i64,
    pub from_purchased: i64,
    pub occurred_at: String,
}

impl StoredUsageEvent {
    /// Convert database row to UsageEvent
    pub fn to_usage_event(&self) -> Option<UsageEvent> {
        let occurred_at = parse_datetime(&self.occurred_at)?;

        Some(UsageEvent {
            id: self.id.clone(),
            account_id: self.account_id.clone(),
            amount: self.amount,
            from_monthly: self.from_monthly,
            from_purchased: self.from_purchased,
            occurred_at,
        })
    }
}

/// Parse datetime string (supports both RFC3339 and NaiveDateTime formats)
pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-02-04T10:30:00Z")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // Try NaiveDateTime (e.g., "2026-02-04 10:30:00")
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }

    log::warn!("[ledger:types] Failed to parse datetime: {}", s);
    None
}

// ============================================================================
// Tests
// ============================================================================
