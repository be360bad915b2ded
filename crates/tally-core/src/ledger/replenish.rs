//! Replenishment and reset manager
//!
//! Purchased-credit top-ups and the periodic monthly reset. Scheduling is
//! not handled here: an external scheduler invokes `reset_monthly_credits`
//! once per cycle with at-least-once delivery, which the reset tolerates by
//! being idempotent in effect.

use chrono::Utc;

use crate::error::{LedgerError, Result};

use super::store::{LedgerStore, QuotaMutation};
use super::types::AccountQuota;

/// Length of a monthly cycle in days
pub const CYCLE_DAYS: i64 = 30;

#[derive(Clone)]
pub struct ReplenishmentManager {
    store: LedgerStore,
}

impl ReplenishmentManager {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Add purchased credits to an account
    ///
    /// Purchased credits never expire and there is no upper bound. This
    /// does not deduplicate: idempotency of a purchase is the caller's
    /// responsibility (e.g. an idempotency key on the purchase event).
    ///
    /// The cycle baseline (`purchased_at_reset`) grows with the top-up so
    /// mid-cycle purchases count toward the cycle's capacity when
    /// remaining-percent is reported.
    pub async fn add_purchased_credits(
        &self,
        account_id: &str,
        amount: i64,
    ) -> Result<AccountQuota> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }

        let updated = self
            .store
            .atomic_update(account_id, |quota| {
                let mut mutation = QuotaMutation::keep(quota);
                mutation.purchased_remaining += amount;
                mutation.purchased_at_reset += amount;
                Ok(mutation)
            })
            .await?;

        log::info!(
            "[ledger:replenish] Account {} purchased {} credits, {} purchased remaining",
            account_id,
            amount,
            updated.purchased_remaining
        );

        Ok(updated)
    }

    /// Roll the monthly pool forward to a new cycle
    ///
    /// Refills the monthly pool to its limit and stamps the cycle start;
    /// the purchased pool is untouched. Calling this twice in a row leaves
    /// the balances identical (only the timestamp moves), so at-least-once
    /// scheduler delivery is safe.
    pub async fn reset_monthly_credits(&self, account_id: &str) -> Result<AccountQuota> {
        let updated = self
            .store
            .atomic_update(account_id, |quota| {
                let mut mutation = QuotaMutation::keep(quota);
                mutation.monthly_remaining = quota.monthly_limit;
                mutation.purchased_at_reset = quota.purchased_remaining;
                mutation.last_reset_at = Utc::now();
                Ok(mutation)
            })
            .await?;

        log::info!(
            "[ledger:replenish] Account {} monthly pool reset to {} (cycle starts {})",
            account_id,
            updated.monthly_remaining,
            updated.last_reset_at.to_rfc3339()
        );

        Ok(updated)
    }
}
