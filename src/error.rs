//! Error taxonomy for the indexing core.
//!
//! Library modules return this [`Error`]; the CLI boundary wraps it in
//! `anyhow` for display. Provider failures are recoverable inside the
//! embedding service and only surface as [`Error::AllProvidersFailed`]
//! once the whole fallback chain is exhausted.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// One failed provider attempt, kept for the aggregate error.
#[derive(Debug, Clone)]
pub struct ProviderAttempt {
    pub provider: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A single embedding provider failed (network, API, response shape).
    #[error("provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    /// Every provider in the fallback chain failed for the same input.
    #[error("all embedding providers failed: {}", format_attempts(.0))]
    AllProvidersFailed(Vec<ProviderAttempt>),

    /// Input rejected before any storage or network work.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An index with the same configuration already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Underlying SQLite failure.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Cooperative cancellation observed between batches.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

fn format_attempts(attempts: &[ProviderAttempt]) -> String {
    let mut out = String::new();
    for (i, attempt) in attempts.iter().enumerate() {
        if i > 0 {
            out.push_str("; ");
        }
        let _ = fmt::Write::write_fmt(
            &mut out,
            format_args!("{}: {}", attempt.provider, attempt.message),
        );
    }
    out
}
