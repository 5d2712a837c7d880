//! Golden test errors

use crate::check::CheckFailure;
use aegis_boundary::StoreError;
use aegis_types::ValidationError;

/// Golden engine error
#[derive(Debug, thiserror::Error)]
pub enum GoldenError {
    /// Malformed pattern, test, proposal or configuration
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Durable store failed
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

/// Why a single test attempt did not pass
///
/// Captured per attempt; never aborts the remaining tests of a gate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    /// Attempt exceeded the test's time bound
    #[error("timed out after {limit_ms}ms")]
    Timeout {
        /// Configured bound
        limit_ms: u64,
    },

    /// Check reported a failure
    #[error("check failed: {0}")]
    Check(#[from] CheckFailure),

    /// Check panicked
    #[error("check panicked: {0}")]
    Panicked(String),
}

impl AttemptError {
    /// Check if the attempt timed out
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
