//! Usage statistics command

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;
use tally_core::{LedgerStore, UsageAnalytics, UsageStats};

use super::Context;
use crate::output::{print_info, render_json, render_one, OutputFormat};

/// Flat summary row for table output
#[derive(Serialize, Tabled)]
pub struct StatsRow {
    #[tabled(rename = "Account")]
    pub account_id: String,
    #[tabled(rename = "Used")]
    pub used_since_reset: i64,
    #[tabled(rename = "Remaining")]
    pub total_remaining: i64,
    #[tabled(rename = "Used %")]
    pub monthly_usage_percent: i64,
    #[tabled(rename = "Remaining %")]
    pub remaining_percent: i64,
    #[tabled(rename = "Avg/Day")]
    pub average_daily_usage: String,
    #[tabled(rename = "Days Left")]
    pub estimated_days_remaining: String,
    #[tabled(rename = "Reset In")]
    pub days_until_reset: String,
    #[tabled(rename = "Alert")]
    pub alert: String,
}

impl From<&UsageStats> for StatsRow {
    fn from(stats: &UsageStats) -> Self {
        let alert = if stats.is_critical_credits {
            "CRITICAL".to_string()
        } else if stats.is_low_credits {
            "low".to_string()
        } else {
            "-".to_string()
        };

        Self {
            account_id: stats.account_id.clone(),
            used_since_reset: stats.used_since_reset,
            total_remaining: stats.total_remaining,
            monthly_usage_percent: stats.monthly_usage_percent,
            remaining_percent: stats.remaining_percent,
            average_daily_usage: format!("{:.1}", stats.average_daily_usage),
            estimated_days_remaining: stats
                .estimated_days_remaining
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            days_until_reset: format!("{} days", stats.days_until_reset),
            alert,
        }
    }
}

pub async fn execute(ctx: &Context, account: &str) -> Result<()> {
    let store = LedgerStore::new(ctx.db.pool.clone());
    let analytics = UsageAnalytics::new(ctx.db.pool.clone());

    let quota = store.read_quota(account).await?;
    let stats = analytics.usage_stats(&quota).await?;

    match ctx.format {
        OutputFormat::Json => {
            // Full stats object, daily series included
            render_json(&stats)?;
        }
        OutputFormat::Table => {
            render_one(&StatsRow::from(&stats), ctx.format)?;

            if !stats.daily.is_empty() {
                print_info("\nDaily usage this cycle:", ctx.quiet);
                for day in &stats.daily {
                    print_info(
                        &format!("  {}  {:>6} credits  ({} events)", day.date, day.amount, day.events),
                        ctx.quiet,
                    );
                }
            }
        }
    }

    Ok(())
}
