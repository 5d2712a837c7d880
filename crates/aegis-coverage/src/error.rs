//! Coverage errors

use aegis_boundary::StoreError;
use aegis_types::ValidationError;

/// Coverage tracker error
#[derive(Debug, thiserror::Error)]
pub enum CoverageError {
    /// Invalid configuration
    #[error("invalid coverage configuration: {0}")]
    Validation(#[from] ValidationError),

    /// Snapshot or warning could not be read or written
    #[error("coverage persistence failed: {0}")]
    Persistence(#[from] StoreError),
}
