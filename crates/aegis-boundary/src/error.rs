//! Persistence errors
//!
//! Every failure reaching or using the durable store surfaces as a
//! `StoreError`. Callers decide the policy: the action ledger fails closed,
//! the kill switch degrades its window count to zero.

use std::path::PathBuf;

/// Durable store unreachable or returned a failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store cannot be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// IO failure on a file-backed store
    #[error("io error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Payload could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted data is unreadable
    #[error("corrupt record at line {line}: {message}")]
    Corrupt {
        /// 1-based line number
        line: usize,
        /// Parser message
        message: String,
    },

    /// Store refused the write
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if retrying the same call might succeed
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(StoreError::Unavailable("down".into()).is_transient());
        assert!(!StoreError::Rejected("nope".into()).is_transient());
        assert!(!StoreError::Corrupt {
            line: 3,
            message: "eof".into()
        }
        .is_transient());
    }

    #[test]
    fn io_error_names_path() {
        let err = StoreError::io(
            "/tmp/aegis.jsonl",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        assert!(err.to_string().contains("/tmp/aegis.jsonl"));
    }
}
