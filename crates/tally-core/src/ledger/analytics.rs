//! Usage analytics projector
//!
//! Read-only derivation of usage statistics from the append-only usage log
//! plus the current quota record. Nothing here mutates ledger state, and
//! nothing here is authoritative: the numbers are advisory, recomputed on
//! demand, and authority lives in the quota record itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::Result;

use super::replenish::CYCLE_DAYS;
use super::types::{AccountQuota, StoredUsageEvent, UsageEvent};

/// Remaining-percent band below which an account is flagged low
pub const LOW_CREDITS_PERCENT: i64 = 20;
/// Remaining-percent band below which an account is flagged critical
pub const CRITICAL_CREDITS_PERCENT: i64 = 10;

// ============================================================================
// Derived statistics
// ============================================================================

/// Credits consumed on one calendar day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyUsage {
    /// Day in `YYYY-MM-DD` form (UTC)
    pub date: String,
    /// Credits consumed that day
    pub amount: i64,
    /// Number of consumption events that day
    pub events: i64,
}

/// The full derived analytics view for one account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageStats {
    pub account_id: String,
    /// Credits consumed since the current cycle started
    pub used_since_reset: i64,
    /// Credits left across both pools
    pub total_remaining: i64,
    /// `used_since_reset / monthly_limit`, as a rounded percentage. Can
    /// exceed 100 if the limit was lowered after usage accrued; that is a
    /// reporting edge case, not an error.
    pub monthly_usage_percent: i64,
    /// `total_remaining` over the cycle's capacity (monthly limit plus the
    /// purchased baseline), as a rounded percentage. 100 when no quota is
    /// configured at all (zero capacity means "not constrained").
    pub remaining_percent: i64,
    /// Remaining percent is in the 10..20 band
    pub is_low_credits: bool,
    /// Remaining percent is below 10; takes precedence over low
    pub is_critical_credits: bool,
    /// Mean credits per day over the cycle so far (at least one day)
    pub average_daily_usage: f64,
    /// Projected days until exhaustion at the current rate; `None` when
    /// nothing has been consumed yet (no rate to project from)
    pub estimated_days_remaining: Option<i64>,
    /// Days left in the fixed 30-day cycle, floored at 0
    pub days_until_reset: i64,
    /// Per-day consumption series since the cycle started
    pub daily: Vec<DailyUsage>,
}

impl UsageStats {
    /// Derive the statistics from their inputs. Pure; `now` is passed in so
    /// the arithmetic is testable.
    pub fn project(
        quota: &AccountQuota,
        used_since_reset: i64,
        daily: Vec<DailyUsage>,
        now: DateTime<Utc>,
    ) -> Self {
        let total_remaining = quota.total_remaining();
        let cycle_days_elapsed = days_between(quota.last_reset_at, now);

        let monthly_usage_percent = if quota.monthly_limit > 0 {
            percent(used_since_reset, quota.monthly_limit).max(0)
        } else {
            0
        };

        let capacity = quota.monthly_limit + quota.purchased_at_reset;
        let remaining_percent = if capacity > 0 {
            percent(total_remaining, capacity)
        } else {
            // No quota configured at all: treat as unconstrained so the
            // alert bands stay quiet.
            100
        };

        let is_critical_credits = remaining_percent < CRITICAL_CREDITS_PERCENT;
        let is_low_credits = !is_critical_credits && remaining_percent < LOW_CREDITS_PERCENT;

        let average_daily_usage = used_since_reset as f64 / cycle_days_elapsed.max(1) as f64;

        let estimated_days_remaining = if average_daily_usage > 0.0 {
            Some((total_remaining as f64 / average_daily_usage).floor() as i64)
        } else {
            None
        };

        let days_until_reset = (CYCLE_DAYS - cycle_days_elapsed).max(0);

        Self {
            account_id: quota.account_id.clone(),
            used_since_reset,
            total_remaining,
            monthly_usage_percent,
            remaining_percent,
            is_low_credits,
            is_critical_credits,
            average_daily_usage,
            estimated_days_remaining,
            days_until_reset,
            daily,
        }
    }
}

/// Sum of event amounts with `from <= occurred_at < to`
pub fn used_in_window(events: &[UsageEvent], from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    events
        .iter()
        .filter(|e| e.occurred_at >= from && e.occurred_at < to)
        .map(|e| e.amount)
        .sum()
}

/// Whole days elapsed between two instants, floored at 0
fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_days().max(0)
}

/// Rounded integer percentage of `part` over `whole` (`whole` must be > 0)
fn percent(part: i64, whole: i64) -> i64 {
    ((part as f64 / whole as f64) * 100.0).round() as i64
}

// ============================================================================
// UsageAnalytics
// ============================================================================

/// Read-only query layer over the usage-event log
#[derive(Clone)]
pub struct UsageAnalytics {
    pool: SqlitePool,
}

impl UsageAnalytics {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch all usage events for an account since the given instant,
    /// oldest first
    pub async fn events_since(
        &self,
        account_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<UsageEvent>> {
        let rows = sqlx::query_as::<_, StoredUsageEvent>(
            r#"
            SELECT id, account_id, amount, from_monthly, from_purchased, occurred_at
            FROM usage_events
            WHERE account_id = ? AND occurred_at >= ?
            ORDER BY occurred_at ASC
            "#,
        )
        .bind(account_id)
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(|r| r.to_usage_event()).collect())
    }

    /// Credits consumed by an account since the given instant
    pub async fn used_since(&self, account_id: &str, since: DateTime<Utc>) -> Result<i64> {
        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM usage_events
            WHERE account_id = ? AND occurred_at >= ?
            "#,
        )
        .bind(account_id)
        .bind(since.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Per-day consumption series for an account since the given instant
    pub async fn daily_usage(
        &self,
        account_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<DailyUsage>> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT DATE(occurred_at) AS day, SUM(amount), COUNT(*)
            FROM usage_events
            WHERE account_id = ? AND occurred_at >= ?
            GROUP BY day
            ORDER BY day ASC
            "#,
        )
        .bind(account_id)
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(date, amount, events)| DailyUsage {
                date,
                amount,
                events,
            })
            .collect())
    }

    /// Compute the full derived analytics view for an account
    ///
    /// The quota record is passed in (the ledger store owns quota reads);
    /// this only touches the append-only event log.
    pub async fn usage_stats(&self, quota: &AccountQuota) -> Result<UsageStats> {
        let used = self.used_since(&quota.account_id, quota.last_reset_at).await?;
        let daily = self
            .daily_usage(&quota.account_id, quota.last_reset_at)
            .await?;

        log::debug!(
            "[ledger:analytics] Account {}: {} used since reset across {} days",
            quota.account_id,
            used,
            daily.len()
        );

        Ok(UsageStats::project(quota, used, daily, Utc::now()))
    }
}

// ============================================================================
// Tests
// ============================================================================
