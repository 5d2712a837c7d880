//! Ledger errors
//!
//! Every variant except `Duplicate` means the ledger could not prove the
//! action is new; callers must treat all of them as "do not proceed".

use aegis_boundary::StoreError;
use aegis_types::ValidationError;
use chrono::{DateTime, Utc};

/// Action ledger error
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Key or configuration is malformed
    #[error("invalid ledger input: {0}")]
    Validation(#[from] ValidationError),

    /// Durable store failed; the claim fails closed
    #[error("ledger persistence failed: {0}")]
    Persistence(#[from] StoreError),

    /// Payload could not be digested
    #[error("payload could not be serialized: {0}")]
    Payload(#[from] serde_json::Error),

    /// Key was already claimed within its TTL
    #[error("duplicate action '{key}' (first seen {first_seen})")]
    Duplicate {
        /// Dedup key
        key: String,
        /// When the winning claim was recorded
        first_seen: DateTime<Utc>,
    },
}

impl LedgerError {
    /// Check if the error is a duplicate rejection
    #[inline]
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    /// Check if the error came from the durable store
    #[inline]
    #[must_use]
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}
