//! Account quota commands: provision, show, list

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;
use tally_core::{AccountQuota, LedgerStore, QuotaView};

use super::Context;
use crate::output::{print_success, render_json, render_list, render_one, OutputFormat};

#[derive(Subcommand)]
pub enum AccountAction {
    /// Provision a quota record for a new account
    Provision {
        /// Account identifier
        #[arg(long)]
        id: String,

        /// Size of the monthly credit allocation
        #[arg(long)]
        monthly_limit: i64,
    },

    /// Show the current quota for an account
    Show {
        /// Account identifier
        #[arg(long)]
        id: String,
    },

    /// List all provisioned accounts
    List,
}

/// Table/JSON row for a quota record
#[derive(Serialize, Tabled)]
pub struct QuotaRow {
    #[tabled(rename = "Account")]
    pub account_id: String,
    #[tabled(rename = "Monthly")]
    pub monthly_remaining: i64,
    #[tabled(rename = "Limit")]
    pub monthly_limit: i64,
    #[tabled(rename = "Purchased")]
    pub purchased_remaining: i64,
    #[tabled(rename = "Total")]
    pub total_remaining: i64,
    #[tabled(rename = "Cycle Start")]
    pub last_reset_at: String,
}

impl From<&AccountQuota> for QuotaRow {
    fn from(quota: &AccountQuota) -> Self {
        Self {
            account_id: quota.account_id.clone(),
            monthly_remaining: quota.monthly_remaining,
            monthly_limit: quota.monthly_limit,
            purchased_remaining: quota.purchased_remaining,
            total_remaining: quota.total_remaining(),
            last_reset_at: quota.last_reset_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

pub async fn execute(ctx: &Context, action: AccountAction) -> Result<()> {
    let store = LedgerStore::new(ctx.db.pool.clone());

    match action {
        AccountAction::Provision { id, monthly_limit } => {
            let quota = store.create_quota(&id, monthly_limit).await?;
            print_success(
                &format!("Provisioned account {} with {} monthly credits", id, monthly_limit),
                ctx.quiet,
            );
            render_one(&QuotaRow::from(&quota), ctx.format)?;
        }
        AccountAction::Show { id } => {
            let quota = store.read_quota(&id).await?;
            match ctx.format {
                // JSON emits the contract payload shape, not the table row
                OutputFormat::Json => render_json(&QuotaView::from(&quota))?,
                OutputFormat::Table => render_one(&QuotaRow::from(&quota), ctx.format)?,
            }
        }
        AccountAction::List => {
            let accounts = store.list_accounts().await?;
            let rows: Vec<QuotaRow> = accounts.iter().map(QuotaRow::from).collect();
            render_list(&rows, ctx.format)?;
        }
    }

    Ok(())
}
