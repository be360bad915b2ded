//! Consumption engine
//!
//! Decides how a requested amount is drawn from the two credit pools and
//! applies the decision atomically through the ledger store.

use crate::error::{LedgerError, Result};

use super::store::{LedgerStore, QuotaMutation, UsageAppend};
use super::types::{AccountQuota, ConsumeReceipt};

/// The split of one consumption across the two pools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DrawPlan {
    from_monthly: i64,
    from_purchased: i64,
}

/// Decide how `amount` would be funded from the current balances.
///
/// The monthly pool is drawn first: it expires at the next reset while
/// purchased credits never do, so spending the use-it-or-lose-it pool first
/// maximizes the account's effective balance over time. If both pools
/// together cannot cover the request, nothing is consumed (all-or-nothing).
fn plan_draw(quota: &AccountQuota, amount: i64) -> Result<DrawPlan> {
    let from_monthly = quota.monthly_remaining.min(amount);
    let remainder = amount - from_monthly;
    let from_purchased = quota.purchased_remaining.min(remainder);

    let total_available = quota.total_remaining();
    if total_available < amount {
        return Err(LedgerError::InsufficientCredits {
            remaining_total: total_available,
            requested: amount,
        });
    }

    Ok(DrawPlan {
        from_monthly,
        from_purchased,
    })
}

/// Consumption engine over a ledger store
///
/// One engine instance is cheap to clone and safe to share across tasks;
/// all state lives in the store.
#[derive(Clone)]
pub struct ConsumptionEngine {
    store: LedgerStore,
}

impl ConsumptionEngine {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Reserve `amount` credits for a metered operation
    ///
    /// On success, both the quota deduction and the usage-event append have
    /// committed in a single transaction, and the receipt carries the
    /// per-pool breakdown plus the post-operation total.
    ///
    /// # Errors
    /// - `InvalidAmount` if `amount <= 0` (caller bug, never retried)
    /// - `InsufficientCredits` if both pools together cannot cover the
    ///   request; the quota record is left untouched
    /// - `Contention` if concurrent updates kept conflicting (retryable)
    /// - `NotFound` if the account was never provisioned
    pub async fn consume(&self, account_id: &str, amount: i64) -> Result<ConsumeReceipt> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }

        log::debug!(
            "[ledger:consume] Account {} requesting {} credits",
            account_id,
            amount
        );

        // The plan is recomputed on every CAS attempt from the freshly read
        // balances; this captures the split of the attempt that committed.
        let mut committed = DrawPlan {
            from_monthly: 0,
            from_purchased: 0,
        };

        let updated = self
            .store
            .atomic_update(account_id, |quota| {
                let plan = plan_draw(quota, amount)?;
                committed = plan;

                let mut mutation = QuotaMutation::keep(quota);
                mutation.monthly_remaining -= plan.from_monthly;
                mutation.purchased_remaining -= plan.from_purchased;
                mutation.usage = Some(UsageAppend {
                    amount,
                    from_monthly: plan.from_monthly,
                    from_purchased: plan.from_purchased,
                });
                Ok(mutation)
            })
            .await?;

        log::info!(
            "[ledger:consume] Account {} consumed {} ({} monthly, {} purchased), {} remaining",
            account_id,
            amount,
            committed.from_monthly,
            committed.from_purchased,
            updated.total_remaining()
        );

        Ok(ConsumeReceipt {
            consumed_monthly: committed.from_monthly,
            consumed_purchased: committed.from_purchased,
            total_consumed: amount,
            total_remaining: updated.total_remaining(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn quota(monthly_limit: i64, monthly: i64, purchased: i64) -> AccountQuota {
        let now = Utc::now();
        AccountQuota {
            account_id: "acct-1".to_string(),
            monthly_limit,
            monthly_remaining: monthly,
            purchased_remaining: purchased,
            purchased_at_reset: purchased,
            last_reset_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_plan_monthly_only() {
        let plan = plan_draw(&quota(50, 50, 0), 30).unwrap();
        assert_eq!(plan.from_monthly, 30);
        assert_eq!(plan.from_purchased, 0);
    }

    #[test]
    fn test_plan_spills_into_purchased() {
        let plan = plan_draw(&quota(50, 20, 100), 30).unwrap();
        assert_eq!(plan.from_monthly, 20);
        assert_eq!(plan.from_purchased, 10);
    }

    #[test]
    fn test_plan_exact_total() {
        let plan = plan_draw(&quota(50, 20, 10), 30).unwrap();
        assert_eq!(plan.from_monthly, 20);
        assert_eq!(plan.from_purchased, 10);
    }

    #[test]
    fn test_plan_purchased_only_when_monthly_empty() {
        let plan = plan_draw(&quota(50, 0, 90), 30).unwrap();
        assert_eq!(plan.from_monthly, 0);
        assert_eq!(plan.from_purchased, 30);
    }

    #[test]
    fn test_plan_insufficient_reports_shortfall() {
        let err = plan_draw(&quota(50, 20, 0), 30).unwrap_err();
        match err {
            LedgerError::InsufficientCredits {
                remaining_total,
                requested,
            } => {
                assert_eq!(remaining_total, 20);
                assert_eq!(requested, 30);
            }
            other => panic!("expected InsufficientCredits, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_breakdown_sums_to_amount() {
        for (monthly, purchased, amount) in [(50, 0, 50), (20, 100, 30), (0, 5, 5), (7, 3, 10)] {
            let plan = plan_draw(&quota(100, monthly, purchased), amount).unwrap();
            assert_eq!(plan.from_monthly + plan.from_purchased, amount);
        }
    }
}
