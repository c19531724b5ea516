use thiserror::Error;

/// Failures of the rotation core that callers branch on.
#[derive(Debug, Error)]
pub enum RotationError {
    /// Nothing is eligible to play.
    #[error("No eligible content to play")]
    NoEligibleContent,

    /// The caller's epoch is no longer current.
    #[error("Stale epoch, current epoch is {current_epoch}")]
    StaleEpoch { current_epoch: u64 },

    /// The credit ledger timed out or failed. Recovered internally by
    /// selecting organically.
    #[error("Credit ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Stream state and fairness bookkeeping disagree. Never recovered
    /// silently.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Catalog read failed: {0}")]
    Catalog(#[source] anyhow::Error),
}

impl RotationError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RotationError::NoEligibleContent => "no_eligible_content",
            RotationError::StaleEpoch { .. } => "stale_epoch",
            RotationError::LedgerUnavailable(_) => "ledger_unavailable",
            RotationError::InvariantViolation(_) => "invariant_violation",
            RotationError::Catalog(_) => "catalog",
        }
    }
}
