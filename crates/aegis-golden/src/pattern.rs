//! Accident patterns and the catalog holding them

use aegis_types::{BlastRadius, Severity, ValidationError};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Accident pattern identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(pub String);

impl PatternId {
    /// Create pattern ID
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A recorded historical failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccidentPattern {
    /// Pattern ID
    pub id: PatternId,
    /// Short title
    pub title: String,
    /// What went wrong
    #[serde(default)]
    pub description: String,
    /// Severity of the accident
    pub severity: Severity,
    /// How far the damage reached
    pub blast_radius: BlastRadius,
    /// Times the same root cause has been seen
    #[serde(default = "default_occurrences")]
    pub occurrence_count: u32,
    /// Underlying cause
    #[serde(default)]
    pub root_cause: String,
    /// Conditions that led to the accident, in order
    #[serde(default)]
    pub trigger_conditions: Vec<String>,
}

fn default_occurrences() -> u32 {
    1
}

impl AccidentPattern {
    /// Create pattern seen once
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        severity: Severity,
        blast_radius: BlastRadius,
    ) -> Self {
        Self {
            id: PatternId::new(id),
            title: title.into(),
            description: String::new(),
            severity,
            blast_radius,
            occurrence_count: 1,
            root_cause: String::new(),
            trigger_conditions: Vec::new(),
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With root cause
    #[inline]
    #[must_use]
    pub fn with_root_cause(mut self, root_cause: impl Into<String>) -> Self {
        self.root_cause = root_cause.into();
        self
    }

    /// With trigger conditions
    #[must_use]
    pub fn with_trigger_conditions<I, S>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trigger_conditions = conditions.into_iter().map(Into::into).collect();
        self
    }

    /// With occurrence count
    #[inline]
    #[must_use]
    pub fn with_occurrences(mut self, count: u32) -> Self {
        self.occurrence_count = count;
        self
    }

    /// Validate pattern
    ///
    /// # Errors
    /// Blank id or title
    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::ensure_non_empty("pattern.id", self.id.as_str())?;
        ValidationError::ensure_non_empty("pattern.title", &self.title)?;
        Ok(())
    }

    fn shares_root_cause(&self, normalized: &str) -> bool {
        !normalized.is_empty() && normalize(&self.root_cause) == normalized
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Accident patterns in insertion order
#[derive(Debug, Default)]
pub struct PatternCatalog {
    patterns: RwLock<IndexMap<PatternId, AccidentPattern>>,
}

impl PatternCatalog {
    /// Create empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create catalog from patterns
    ///
    /// # Errors
    /// Any pattern fails validation
    pub fn from_patterns<I>(patterns: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = AccidentPattern>,
    {
        let catalog = Self::new();
        for pattern in patterns {
            catalog.upsert(pattern)?;
        }
        Ok(catalog)
    }

    /// Insert or replace a pattern, keeping its original position
    ///
    /// # Errors
    /// Pattern fails validation
    pub fn upsert(&self, pattern: AccidentPattern) -> Result<Option<AccidentPattern>, ValidationError> {
        pattern.validate()?;
        Ok(self.patterns.write().insert(pattern.id.clone(), pattern))
    }

    /// Get pattern by ID
    #[must_use]
    pub fn get(&self, id: &PatternId) -> Option<AccidentPattern> {
        self.patterns.read().get(id).cloned()
    }

    /// Copy of every pattern, in insertion order
    #[must_use]
    pub fn snapshot(&self) -> Vec<AccidentPattern> {
        self.patterns.read().values().cloned().collect()
    }

    /// Count occurrence of `root_cause` against matching patterns
    ///
    /// Matching is case-insensitive on the trimmed text. Returns the IDs
    /// of the patterns that were incremented.
    pub fn record_occurrence(&self, root_cause: &str) -> Vec<PatternId> {
        let normalized = normalize(root_cause);
        let mut touched = Vec::new();
        for pattern in self.patterns.write().values_mut() {
            if pattern.shares_root_cause(&normalized) {
                pattern.occurrence_count = pattern.occurrence_count.saturating_add(1);
                touched.push(pattern.id.clone());
            }
        }
        if touched.is_empty() {
            tracing::debug!("No pattern matches root cause '{}'", root_cause.trim());
        }
        touched
    }

    /// Number of patterns
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.read().len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.read().is_empty()
    }
}
