//! CLI commands module
//!
//! Contains all CLI command implementations.

pub mod account;
pub mod ledger;
pub mod stats;

use crate::output::OutputFormat;
use tally_core::Database;

/// Shared context for all commands
pub struct Context {
    pub db: Database,
    pub format: OutputFormat,
    pub quiet: bool,
}

/// Exit code for the insufficient-credits business outcome
pub const EXIT_INSUFFICIENT: i32 = 2;
/// Exit code for transient contention (safe to retry)
pub const EXIT_CONTENTION: i32 = 3;
