//! Gate errors
//!
//! Aggregates the errors of every component. Any error from
//! `SafetyGate::evaluate` means the action must not run:
//!
//! - `Config`: configuration could not be loaded
//! - `Validation`: malformed proposal or configuration
//! - `Ledger`: claim could not be confirmed by the store
//! - `KillSwitchUnavailable`: kill switch state could not be read
//! - `Golden`: golden engine could not be built or run
//! - `Coverage`: coverage cycle failed

use crate::config::ConfigError;
use aegis_boundary::StoreError;
use aegis_coverage::CoverageError;
use aegis_golden::GoldenError;
use aegis_ledger::LedgerError;
use aegis_types::ValidationError;

/// Safety gate error
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation error
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Action ledger error
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Kill switch state unreadable
    #[error("kill switch state unavailable: {0}")]
    KillSwitchUnavailable(#[source] StoreError),

    /// Golden engine error
    #[error("golden engine error: {0}")]
    Golden(#[from] GoldenError),

    /// Coverage tracker error
    #[error("coverage error: {0}")]
    Coverage(#[from] CoverageError),
}

impl GateError {
    /// Check if the error came from the persistence layer
    #[must_use]
    pub fn is_persistence(&self) -> bool {
        match self {
            Self::Ledger(e) => e.is_persistence(),
            Self::KillSwitchUnavailable(_)
            | Self::Golden(GoldenError::Persistence(_))
            | Self::Coverage(CoverageError::Persistence(_)) => true,
            _ => false,
        }
    }
}
