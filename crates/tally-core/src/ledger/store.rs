//! Ledger storage layer
//!
//! Transactional primitives over the `account_quota` row. All mutations go
//! through [`LedgerStore::atomic_update`], which serializes concurrent
//! writers on the same account with an optimistic compare-and-swap loop so
//! that a read-decide-write sequence can never lose an update.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::time::Duration;

use crate::error::{LedgerError, Result};

use super::types::{AccountQuota, StoredAccountQuota};

/// Maximum compare-and-swap attempts before giving up with `Contention`
pub const MAX_UPDATE_ATTEMPTS: u32 = 5;

/// Base backoff between conflicting attempts (scaled by attempt number)
const RETRY_BACKOFF: Duration = Duration::from_millis(10);

// ============================================================================
// Mutations
// ============================================================================

/// The full post-state a mutation wants to write, plus an optional
/// usage-event append that must commit in the same transaction.
#[derive(Debug, Clone)]
pub struct QuotaMutation {
    pub monthly_limit: i64,
    pub monthly_remaining: i64,
    pub purchased_remaining: i64,
    pub purchased_at_reset: i64,
    pub last_reset_at: DateTime<Utc>,
    pub usage: Option<UsageAppend>,
}

impl QuotaMutation {
    /// Start from the current record, changing nothing
    pub fn keep(quota: &AccountQuota) -> Self {
        Self {
            monthly_limit: quota.monthly_limit,
            monthly_remaining: quota.monthly_remaining,
            purchased_remaining: quota.purchased_remaining,
            purchased_at_reset: quota.purchased_at_reset,
            last_reset_at: quota.last_reset_at,
            usage: None,
        }
    }

    /// Check the ledger invariants on the proposed post-state
    fn validate(&self) -> Result<()> {
        if self.monthly_limit < 0 {
            return Err(LedgerError::internal(format!(
                "mutation would set monthly_limit to {}",
                self.monthly_limit
            )));
        }
        if self.monthly_remaining < 0 || self.monthly_remaining > self.monthly_limit {
            return Err(LedgerError::internal(format!(
                "mutation would set monthly_remaining to {} (limit {})",
                self.monthly_remaining, self.monthly_limit
            )));
        }
        if self.purchased_remaining < 0 {
            return Err(LedgerError::internal(format!(
                "mutation would set purchased_remaining to {}",
                self.purchased_remaining
            )));
        }
        Ok(())
    }
}

/// A usage-event row to append atomically with a quota update
#[derive(Debug, Clone)]
pub struct UsageAppend {
    pub amount: i64,
    pub from_monthly: i64,
    pub from_purchased: i64,
}

// ============================================================================
// LedgerStore
// ============================================================================

/// Storage layer for account quotas
///
/// Owns all reads and writes of the `account_quota` table. Two concurrent
/// `atomic_update` calls for the same account are serialized; operations on
/// different accounts run fully in parallel.
#[derive(Clone)]
pub struct LedgerStore {
    pool: SqlitePool,
}

impl LedgerStore {
    /// Create a new LedgerStore with the given database pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Access the underlying pool (read-only collaborators)
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Provision a quota record for a new account
    ///
    /// The monthly pool starts full, the purchased pool empty, and the
    /// current cycle starts now. Fails if the account is already
    /// provisioned.
    pub async fn create_quota(&self, account_id: &str, monthly_limit: i64) -> Result<AccountQuota> {
        if monthly_limit < 0 {
            return Err(LedgerError::InvalidAmount {
                amount: monthly_limit,
            });
        }

        let now = Utc::now();
        let now_str = now.to_rfc3339();

        log::info!(
            "[ledger:store] Provisioning account {} with monthly limit {}",
            account_id,
            monthly_limit
        );

        let result = sqlx::query(
            r#"
            INSERT INTO account_quota
            (account_id, monthly_limit, monthly_remaining, purchased_remaining,
             purchased_at_reset, last_reset_at, created_at, updated_at)
            VALUES (?, ?, ?, 0, 0, ?, ?, ?)
            "#,
        )
        .bind(account_id)
        .bind(monthly_limit)
        .bind(monthly_limit)
        .bind(&now_str)
        .bind(&now_str)
        .bind(&now_str)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(AccountQuota {
                account_id: account_id.to_string(),
                monthly_limit,
                monthly_remaining: monthly_limit,
                purchased_remaining: 0,
                purchased_at_reset: 0,
                last_reset_at: now,
                created_at: now,
                updated_at: now,
            }),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                LedgerError::internal(format!("account already provisioned: {}", account_id)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the current quota record for an account
    pub async fn read_quota(&self, account_id: &str) -> Result<AccountQuota> {
        let stored = self.read_stored(account_id).await?;
        stored.to_account_quota().ok_or_else(|| {
            LedgerError::internal(format!("corrupt quota row for account {}", account_id))
        })
    }

    /// Read the raw row for an account, timestamps unparsed
    async fn read_stored(&self, account_id: &str) -> Result<StoredAccountQuota> {
        let row = sqlx::query_as::<_, StoredAccountQuota>(
            r#"
            SELECT account_id, monthly_limit, monthly_remaining, purchased_remaining,
                   purchased_at_reset, last_reset_at, created_at, updated_at
            FROM account_quota
            WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| LedgerError::NotFound(account_id.to_string()))
    }

    /// List all provisioned quota records
    pub async fn list_accounts(&self) -> Result<Vec<AccountQuota>> {
        let rows = sqlx::query_as::<_, StoredAccountQuota>(
            r#"
            SELECT account_id, monthly_limit, monthly_remaining, purchased_remaining,
                   purchased_at_reset, last_reset_at, created_at, updated_at
            FROM account_quota
            ORDER BY account_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(|r| r.to_account_quota()).collect())
    }

    /// Apply a pure decision function to the current quota record, atomically
    ///
    /// The decision function receives the current record and returns the
    /// desired post-state (and optionally a usage event to append). The
    /// write is guarded on the balance columns it was decided from; if a
    /// concurrent update slipped in between read and write, the guard
    /// misses, nothing is written, and the whole read-decide-write cycle is
    /// retried with backoff. After [`MAX_UPDATE_ATTEMPTS`] conflicts the
    /// call fails with `Contention` and the record is untouched.
    ///
    /// Business failures returned by the decision function (e.g.
    /// insufficient credits) abort immediately without retrying.
    pub async fn atomic_update<F>(&self, account_id: &str, mut decide: F) -> Result<AccountQuota>
    where
        F: FnMut(&AccountQuota) -> Result<QuotaMutation>,
    {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let stored = self.read_stored(account_id).await?;
            let current = stored.to_account_quota().ok_or_else(|| {
                LedgerError::internal(format!("corrupt quota row for account {}", account_id))
            })?;
            let mutation = decide(&current)?;
            mutation.validate()?;

            match self
                .try_commit(&current, &stored.last_reset_at, &mutation)
                .await
            {
                Ok(Some(updated)) => return Ok(updated),
                Ok(None) => {
                    // Guard missed: someone else updated the row first.
                    log::debug!(
                        "[ledger:store] CAS conflict for account {} (attempt {}/{})",
                        account_id,
                        attempt,
                        MAX_UPDATE_ATTEMPTS
                    );
                }
                Err(e) if is_busy(&e) => {
                    log::debug!(
                        "[ledger:store] Database busy for account {} (attempt {}/{})",
                        account_id,
                        attempt,
                        MAX_UPDATE_ATTEMPTS
                    );
                }
                Err(e) => return Err(e.into()),
            }

            tokio::time::sleep(RETRY_BACKOFF * attempt).await;
        }

        log::warn!(
            "[ledger:store] Giving up on account {} after {} conflicting attempts",
            account_id,
            MAX_UPDATE_ATTEMPTS
        );
        Err(LedgerError::Contention {
            attempts: MAX_UPDATE_ATTEMPTS,
        })
    }

    /// One guarded write attempt. `Ok(None)` means the CAS guard missed.
    ///
    /// `guard_reset_at` is the raw stored cycle-start string, not a
    /// re-serialized timestamp: the lenient parser accepts more formats
    /// than the ledger writes, and a round-trip through it would never
    /// match such a row.
    async fn try_commit(
        &self,
        current: &AccountQuota,
        guard_reset_at: &str,
        mutation: &QuotaMutation,
    ) -> std::result::Result<Option<AccountQuota>, sqlx::Error> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Guard on the columns the decision was based on: the two balances
        // plus the cycle start (so a concurrent reset also misses).
        let result = sqlx::query(
            r#"
            UPDATE account_quota
            SET monthly_limit = ?, monthly_remaining = ?, purchased_remaining = ?,
                purchased_at_reset = ?, last_reset_at = ?, updated_at = ?
            WHERE account_id = ?
              AND monthly_remaining = ?
              AND purchased_remaining = ?
              AND last_reset_at = ?
            "#,
        )
        .bind(mutation.monthly_limit)
        .bind(mutation.monthly_remaining)
        .bind(mutation.purchased_remaining)
        .bind(mutation.purchased_at_reset)
        .bind(mutation.last_reset_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(&current.account_id)
        .bind(current.monthly_remaining)
        .bind(current.purchased_remaining)
        .bind(guard_reset_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        // Append the usage event inside the same transaction: a deduction
        // without its event (or the reverse) must be impossible.
        if let Some(usage) = &mutation.usage {
            let id = uuid::Uuid::new_v4().to_string();
            sqlx::query(
                r#"
                INSERT INTO usage_events
                (id, account_id, amount, from_monthly, from_purchased, occurred_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(&current.account_id)
            .bind(usage.amount)
            .bind(usage.from_monthly)
            .bind(usage.from_purchased)
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Some(AccountQuota {
            account_id: current.account_id.clone(),
            monthly_limit: mutation.monthly_limit,
            monthly_remaining: mutation.monthly_remaining,
            purchased_remaining: mutation.purchased_remaining,
            purchased_at_reset: mutation.purchased_at_reset,
            last_reset_at: mutation.last_reset_at,
            created_at: current.created_at,
            updated_at: now,
        }))
    }
}

/// Whether a sqlx error is SQLite telling us to back off and retry
/// (SQLITE_BUSY = 5, SQLITE_LOCKED = 6)
fn is_busy(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("5") | Some("6"))
                || db.message().contains("database is locked")
        }
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
