//! Ledger mutation commands: consume, purchase, reset
//!
//! "Out of credits" and "try again later" must never be confused, so the
//! two outcomes get distinct messages and distinct exit codes
//! ([`EXIT_INSUFFICIENT`] and [`EXIT_CONTENTION`]).

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;
use tally_core::{ConsumeReceipt, ConsumptionEngine, LedgerError, LedgerStore, ReplenishmentManager};

use super::{Context, EXIT_CONTENTION, EXIT_INSUFFICIENT};
use crate::commands::account::QuotaRow;
use crate::output::{print_error, print_success, render_one};

/// Table/JSON row for a consumption receipt
#[derive(Serialize, Tabled)]
pub struct ReceiptRow {
    #[tabled(rename = "From Monthly")]
    pub consumed_monthly: i64,
    #[tabled(rename = "From Purchased")]
    pub consumed_purchased: i64,
    #[tabled(rename = "Consumed")]
    pub total_consumed: i64,
    #[tabled(rename = "Remaining")]
    pub total_remaining: i64,
}

impl From<&ConsumeReceipt> for ReceiptRow {
    fn from(receipt: &ConsumeReceipt) -> Self {
        Self {
            consumed_monthly: receipt.consumed_monthly,
            consumed_purchased: receipt.consumed_purchased,
            total_consumed: receipt.total_consumed,
            total_remaining: receipt.total_remaining,
        }
    }
}

/// Reserve credits for a metered operation
pub async fn consume(ctx: &Context, account: &str, amount: i64) -> Result<()> {
    let engine = ConsumptionEngine::new(LedgerStore::new(ctx.db.pool.clone()));

    match engine.consume(account, amount).await {
        Ok(receipt) => {
            print_success(
                &format!("Consumed {} credits from account {}", amount, account),
                ctx.quiet,
            );
            render_one(&ReceiptRow::from(&receipt), ctx.format)?;
            Ok(())
        }
        Err(LedgerError::InsufficientCredits {
            remaining_total,
            requested,
        }) => {
            print_error(&format!(
                "Insufficient credits: requested {}, only {} remaining. Purchase more credits to continue.",
                requested, remaining_total
            ));
            std::process::exit(EXIT_INSUFFICIENT);
        }
        Err(e @ LedgerError::Contention { .. }) => {
            print_error(&format!("{}. This is transient - try again.", e));
            std::process::exit(EXIT_CONTENTION);
        }
        Err(e) => Err(e.into()),
    }
}

/// Add purchased credits to an account
pub async fn purchase(ctx: &Context, account: &str, amount: i64) -> Result<()> {
    let manager = ReplenishmentManager::new(LedgerStore::new(ctx.db.pool.clone()));

    match manager.add_purchased_credits(account, amount).await {
        Ok(quota) => {
            print_success(
                &format!(
                    "Added {} purchased credits to account {} ({} purchased remaining)",
                    amount, account, quota.purchased_remaining
                ),
                ctx.quiet,
            );
            render_one(&QuotaRow::from(&quota), ctx.format)?;
            Ok(())
        }
        Err(e @ LedgerError::Contention { .. }) => {
            print_error(&format!("{}. This is transient - try again.", e));
            std::process::exit(EXIT_CONTENTION);
        }
        Err(e) => Err(e.into()),
    }
}

/// Roll the monthly pool forward to a new cycle
///
/// Intended for an internal scheduler, not end users; safe under
/// at-least-once delivery.
pub async fn reset(ctx: &Context, account: &str) -> Result<()> {
    let manager = ReplenishmentManager::new(LedgerStore::new(ctx.db.pool.clone()));

    match manager.reset_monthly_credits(account).await {
        Ok(quota) => {
            print_success(
                &format!(
                    "Reset monthly pool for account {} to {}",
                    account, quota.monthly_remaining
                ),
                ctx.quiet,
            );
            render_one(&QuotaRow::from(&quota), ctx.format)?;
            Ok(())
        }
        Err(e @ LedgerError::Contention { .. }) => {
            print_error(&format!("{}. This is transient - try again.", e));
            std::process::exit(EXIT_CONTENTION);
        }
        Err(e) => Err(e.into()),
    }
}
