//! Test selection engine
//!
//! Scores accident patterns on three axes and turns the best of them into
//! golden tests:
//!
//! ```text
//! score = clamp(w_sev * severity + w_blast * blast_radius + w_freq * count / max_count, 0, 1)
//! ```
//!
//! Selection keeps patterns at or above `minimum_score` plus every pattern
//! of a force-included severity, then caps the set at `maximum_tests`
//! (highest score first, ties in catalog order).

use crate::golden::GoldenTest;
use crate::pattern::{AccidentPattern, PatternId};
use aegis_types::{Severity, ValidationError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Score precision; sums of the default weights land exactly on 1.0
const SCORE_SCALE: f64 = 1e9;

/// Weights of the three scoring axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Severity weight
    pub severity: f64,
    /// Blast radius weight
    pub blast_radius: f64,
    /// Frequency weight
    pub frequency: f64,
}

impl ScoringWeights {
    /// Validate weights
    ///
    /// # Errors
    /// Negative or non-finite weight, or a sum outside 0.99..=1.01
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, weight) in [
            ("severity", self.severity),
            ("blast_radius", self.blast_radius),
            ("frequency", self.frequency),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ValidationError::InvalidWeights(format!(
                    "{name} weight must be finite and non-negative, got {weight}"
                )));
            }
        }
        let sum = self.severity + self.blast_radius + self.frequency;
        if !(0.99..=1.01).contains(&sum) {
            return Err(ValidationError::InvalidWeights(format!(
                "weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            severity: 0.5,
            blast_radius: 0.3,
            frequency: 0.2,
        }
    }
}

/// Selection policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionCriteria {
    /// Lowest score selected on merit
    pub minimum_score: f64,
    /// Severities selected regardless of score
    pub force_include_severity: Vec<Severity>,
    /// Drop patterns seen only once unless force-included
    pub exclude_low_frequency: bool,
    /// Cap on the selected set
    pub maximum_tests: usize,
    /// Time bound given to every generated test
    pub default_timeout_ms: u64,
}

impl SelectionCriteria {
    /// With minimum score
    #[inline]
    #[must_use]
    pub fn with_minimum_score(mut self, minimum_score: f64) -> Self {
        self.minimum_score = minimum_score;
        self
    }

    /// With force-included severities
    #[must_use]
    pub fn with_force_include(mut self, severities: impl IntoIterator<Item = Severity>) -> Self {
        self.force_include_severity = severities.into_iter().collect();
        self
    }

    /// With low-frequency exclusion
    #[inline]
    #[must_use]
    pub fn excluding_low_frequency(mut self) -> Self {
        self.exclude_low_frequency = true;
        self
    }

    /// With test cap
    #[inline]
    #[must_use]
    pub fn with_maximum_tests(mut self, maximum_tests: usize) -> Self {
        self.maximum_tests = maximum_tests;
        self
    }

    /// Validate criteria
    ///
    /// # Errors
    /// Score outside [0, 1], zero cap or zero timeout
    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::ensure_range("selection.minimum_score", self.minimum_score, 0.0, 1.0)?;
        if self.maximum_tests == 0 {
            return Err(ValidationError::InvalidConfig(
                "selection.maximum_tests must be positive".to_string(),
            ));
        }
        if self.default_timeout_ms == 0 {
            return Err(ValidationError::InvalidConfig(
                "selection.default_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn forces(&self, severity: Severity) -> bool {
        self.force_include_severity.contains(&severity)
    }
}

impl Default for SelectionCriteria {
    fn default() -> Self {
        Self {
            minimum_score: 0.6,
            force_include_severity: vec![Severity::Critical, Severity::High],
            exclude_low_frequency: false,
            maximum_tests: 20,
            default_timeout_ms: 30_000,
        }
    }
}

/// Why a pattern was not selected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    /// Score under the minimum and not force-included
    BelowMinimumScore {
        /// Pattern score
        score: f64,
        /// Required minimum
        minimum: f64,
    },
    /// Seen only once while low-frequency patterns are excluded
    LowFrequency,
    /// Eligible but outranked once the cap was reached
    CapacityExceeded {
        /// Cap in force
        maximum: usize,
    },
}

/// A pattern that did not become a test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// Pattern ID
    pub pattern_id: PatternId,
    /// Reason
    pub reason: RejectionReason,
}

/// Result of a selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionOutcome {
    /// Selected tests, highest score first
    pub selected: Vec<GoldenTest>,
    /// Rejected patterns in catalog order, then capacity rejections
    pub rejected: Vec<Rejection>,
    /// Score of every pattern, in catalog order
    pub scores: IndexMap<PatternId, f64>,
}

/// Deterministic pattern scorer and selector
#[derive(Debug, Clone, Copy, Default)]
pub struct TestSelector {
    weights: ScoringWeights,
}

impl TestSelector {
    /// Create selector
    ///
    /// # Errors
    /// Invalid weights
    pub fn new(weights: ScoringWeights) -> Result<Self, ValidationError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    /// Weights in use
    #[inline]
    #[must_use]
    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score `pattern` relative to `all`
    #[must_use]
    pub fn score(&self, pattern: &AccidentPattern, all: &[AccidentPattern]) -> f64 {
        let max_count = all.iter().map(|p| p.occurrence_count).max().unwrap_or(0);
        self.score_with_max(pattern, max_count)
    }

    fn score_with_max(&self, pattern: &AccidentPattern, max_count: u32) -> f64 {
        let frequency = if max_count == 0 {
            0.0
        } else {
            (f64::from(pattern.occurrence_count) / f64::from(max_count)).min(1.0)
        };
        let raw = self.weights.severity * pattern.severity.score()
            + self.weights.blast_radius * pattern.blast_radius.score()
            + self.weights.frequency * frequency;
        ((raw * SCORE_SCALE).round() / SCORE_SCALE).clamp(0.0, 1.0)
    }

    /// Select patterns into golden tests
    #[must_use]
    pub fn select(&self, patterns: &[AccidentPattern], criteria: &SelectionCriteria) -> SelectionOutcome {
        let max_count = patterns.iter().map(|p| p.occurrence_count).max().unwrap_or(0);
        let mut outcome = SelectionOutcome::default();
        let mut eligible = Vec::new();

        for pattern in patterns {
            let score = self.score_with_max(pattern, max_count);
            outcome.scores.insert(pattern.id.clone(), score);

            let forced = criteria.forces(pattern.severity);
            let reason = if criteria.exclude_low_frequency && pattern.occurrence_count == 1 && !forced {
                Some(RejectionReason::LowFrequency)
            } else if score < criteria.minimum_score && !forced {
                Some(RejectionReason::BelowMinimumScore {
                    score,
                    minimum: criteria.minimum_score,
                })
            } else {
                None
            };

            match reason {
                Some(reason) => outcome.rejected.push(Rejection {
                    pattern_id: pattern.id.clone(),
                    reason,
                }),
                None => eligible.push((pattern, score)),
            }
        }

        // Stable: equal scores keep catalog order
        eligible.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (rank, (pattern, score)) in eligible.into_iter().enumerate() {
            if rank < criteria.maximum_tests {
                outcome
                    .selected
                    .push(GoldenTest::from_pattern(pattern, score, criteria.default_timeout_ms));
            } else {
                outcome.rejected.push(Rejection {
                    pattern_id: pattern.id.clone(),
                    reason: RejectionReason::CapacityExceeded {
                        maximum: criteria.maximum_tests,
                    },
                });
            }
        }

        tracing::debug!(
            "Selected {} of {} patterns",
            outcome.selected.len(),
            patterns.len()
        );
        outcome
    }
}
