//! Validation errors shared by every Aegis crate
//!
//! Raised when a pattern, test, proposal or threshold configuration is
//! malformed. Validation happens at construction/load time so the hot path
//! can assume well-formed inputs.

/// Malformed input or configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Required field is empty
    #[error("{field} must not be empty")]
    Empty {
        /// Field name
        field: &'static str,
    },

    /// Numeric value outside its permitted range
    #[error("{field} = {value} is outside {min}..={max}")]
    OutOfRange {
        /// Field name
        field: &'static str,
        /// Offending value
        value: f64,
        /// Inclusive lower bound
        min: f64,
        /// Inclusive upper bound
        max: f64,
    },

    /// Unrecognised enum variant in textual input
    #[error("unknown {kind}: '{value}'")]
    UnknownVariant {
        /// Kind of value being parsed
        kind: &'static str,
        /// Offending text
        value: String,
    },

    /// Scoring weights do not combine sensibly
    #[error("invalid scoring weights: {0}")]
    InvalidWeights(String),

    /// Any other configuration inconsistency
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ValidationError {
    /// Create empty-field error
    #[inline]
    #[must_use]
    pub fn empty(field: &'static str) -> Self {
        Self::Empty { field }
    }

    /// Create out-of-range error
    #[inline]
    #[must_use]
    pub fn out_of_range(field: &'static str, value: f64, min: f64, max: f64) -> Self {
        Self::OutOfRange {
            field,
            value,
            min,
            max,
        }
    }

    /// Check a value lies in `min..=max` and is finite
    pub fn ensure_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), Self> {
        if value.is_finite() && (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(Self::out_of_range(field, value, min, max))
        }
    }

    /// Check a string field is non-blank
    pub fn ensure_non_empty(field: &'static str, value: &str) -> Result<(), Self> {
        if value.trim().is_empty() {
            Err(Self::empty(field))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_range_rejects_nan_and_bounds() {
        assert!(ValidationError::ensure_range("x", 0.5, 0.0, 1.0).is_ok());
        assert!(ValidationError::ensure_range("x", 1.0, 0.0, 1.0).is_ok());
        assert!(ValidationError::ensure_range("x", 1.01, 0.0, 1.0).is_err());
        assert!(ValidationError::ensure_range("x", f64::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn display_names_the_field() {
        let err = ValidationError::empty("dedupe_key");
        assert_eq!(err.to_string(), "dedupe_key must not be empty");
    }
}
