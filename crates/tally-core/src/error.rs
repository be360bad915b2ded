//! Unified error handling for tally-core

use thiserror::Error;

/// Core error type for tally-core
///
/// The first four variants form the ledger's error taxonomy and are part of
/// the public contract; call sites are expected to match on them.
/// `Database`, `Io` and friends are true faults and should be handled by the
/// caller's own error layer, not by business logic.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Caller error: the requested amount is not a positive integer.
    #[error("Invalid amount: {amount} (must be positive)")]
    InvalidAmount { amount: i64 },

    /// Expected business condition: the account cannot cover the request.
    /// Carries the exact shortfall so a UI can prompt for a purchase.
    #[error("Insufficient credits: requested {requested}, only {remaining_total} remaining")]
    InsufficientCredits {
        remaining_total: i64,
        requested: i64,
    },

    /// Transient store-level conflict; retries exhausted. Safe to retry
    /// with backoff. Must never be presented as "out of credits".
    #[error("Contention: update conflicted {attempts} times, giving up")]
    Contention { attempts: u32 },

    /// The account has no quota record. Provisioning is an explicit
    /// precondition; the ledger never lazy-creates records.
    #[error("No quota record for account: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for tally-core
pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        LedgerError::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        LedgerError::Internal(msg.into())
    }

    /// Whether the operation may safely be retried as-is.
    ///
    /// Only `Contention` qualifies: the update never committed. A timed-out
    /// database call is *not* retryable this way (the outcome is unknown to
    /// the caller and a blind retry can double-charge).
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Contention { .. })
    }
}
