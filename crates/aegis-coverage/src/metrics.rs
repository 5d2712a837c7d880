//! Coverage metrics
//!
//! A pattern is covered when a non-quarantined golden test derives from it
//! (`test.pattern_id == pattern.id`).

use aegis_golden::{AccidentPattern, GoldenTest, PatternId};
use aegis_types::{Severity, ValidationError};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Coverage thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Percentage-point change that counts as a trend
    pub trend_threshold_pct: f64,
    /// Coverage below this raises a warning
    pub target_percentage: f64,
}

impl CoverageConfig {
    /// Validate configuration
    ///
    /// # Errors
    /// Values outside [0, 100]
    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::ensure_range("coverage.trend_threshold_pct", self.trend_threshold_pct, 0.0, 100.0)?;
        ValidationError::ensure_range("coverage.target_percentage", self.target_percentage, 0.0, 100.0)?;
        Ok(())
    }
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            trend_threshold_pct: 1.0,
            target_percentage: 80.0,
        }
    }
}

/// Covered over total for one severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCoverage {
    /// Covered patterns
    pub covered: usize,
    /// All patterns
    pub total: usize,
}

impl SeverityCoverage {
    /// Coverage in percent; 100 when there is nothing to cover
    #[must_use]
    pub fn percentage(&self) -> f64 {
        percentage(self.covered, self.total)
    }

    /// Check if some pattern is uncovered
    #[inline]
    #[must_use]
    pub fn has_gap(&self) -> bool {
        self.covered < self.total
    }
}

/// Pattern without a test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncoveredPattern {
    /// Pattern ID
    pub pattern_id: PatternId,
    /// Pattern title
    pub title: String,
    /// Severity
    pub severity: Severity,
    /// Occurrences
    pub occurrence_count: u32,
}

/// Coverage of the accident catalog by golden tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageMetrics {
    /// Patterns considered
    pub total_patterns: usize,
    /// Patterns with a test
    pub covered_patterns: usize,
    /// Covered over total, in percent
    pub coverage_percentage: f64,
    /// Breakdown, critical first
    pub by_severity: IndexMap<Severity, SeverityCoverage>,
    /// Patterns without a test; severity then occurrences, descending
    pub uncovered_patterns: Vec<UncoveredPattern>,
    /// Uncovered critical and high patterns
    pub recommended_new_tests: Vec<PatternId>,
    /// When calculated
    pub calculated_at: DateTime<Utc>,
}

impl CoverageMetrics {
    /// Breakdown for one severity
    #[must_use]
    pub fn severity(&self, severity: Severity) -> SeverityCoverage {
        self.by_severity.get(&severity).copied().unwrap_or_default()
    }
}

fn percentage(covered: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = covered as f64 / total as f64;
    ratio * 100.0
}

/// Calculate coverage of `patterns` by `tests`
#[must_use]
pub fn calculate_coverage(
    patterns: &[AccidentPattern],
    tests: &[GoldenTest],
    at: DateTime<Utc>,
) -> CoverageMetrics {
    let covering: HashSet<&PatternId> = tests
        .iter()
        .filter(|t| !t.is_quarantined())
        .map(|t| &t.pattern_id)
        .collect();

    let mut by_severity: IndexMap<Severity, SeverityCoverage> = Severity::ALL
        .iter()
        .rev()
        .map(|severity| (*severity, SeverityCoverage::default()))
        .collect();
    let mut uncovered = Vec::new();
    let mut covered_patterns = 0;

    for pattern in patterns {
        let entry = by_severity.entry(pattern.severity).or_default();
        entry.total += 1;
        if covering.contains(&pattern.id) {
            entry.covered += 1;
            covered_patterns += 1;
        } else {
            uncovered.push(UncoveredPattern {
                pattern_id: pattern.id.clone(),
                title: pattern.title.clone(),
                severity: pattern.severity,
                occurrence_count: pattern.occurrence_count,
            });
        }
    }

    uncovered.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then(b.occurrence_count.cmp(&a.occurrence_count))
    });
    let recommended_new_tests = uncovered
        .iter()
        .filter(|p| p.severity >= Severity::High)
        .map(|p| p.pattern_id.clone())
        .collect();

    CoverageMetrics {
        total_patterns: patterns.len(),
        covered_patterns,
        coverage_percentage: percentage(covered_patterns, patterns.len()),
        by_severity,
        uncovered_patterns: uncovered,
        recommended_new_tests,
        calculated_at: at,
    }
}
