//! Proposals (candidate actions) produced upstream by the orchestrator

use crate::error::ValidationError;
use crate::severity::Impact;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Identifier of a proposal, chosen by the producer
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(pub String);

impl ProposalId {
    /// Wrap an identifier
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

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one gate invocation (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(pub Ulid);

impl ExecutionId {
    /// Generate new execution ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of work a proposal performs
///
/// Unrecognised names are kept verbatim in `Other`; they route with the
/// default threshold rather than failing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskType {
    /// Routine upkeep
    Maintenance,
    /// Acting on a forecast
    Predictive,
    /// Restoring a failed component
    Recovery,
    /// Observing state
    Monitoring,
    /// Performance or cost tuning
    Optimization,
    /// New functionality
    Feature,
    /// Defect repair
    Bugfix,
    /// Anything else
    Other(String),
}

impl TaskType {
    /// Canonical name
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            TaskType::Maintenance => "maintenance",
            TaskType::Predictive => "predictive",
            TaskType::Recovery => "recovery",
            TaskType::Monitoring => "monitoring",
            TaskType::Optimization => "optimization",
            TaskType::Feature => "feature",
            TaskType::Bugfix => "bugfix",
            TaskType::Other(name) => name,
        }
    }

    /// Whether this is one of the known task types
    #[inline]
    #[must_use]
    pub fn is_recognized(&self) -> bool {
        !matches!(self, TaskType::Other(_))
    }
}

impl FromStr for TaskType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "maintenance" => TaskType::Maintenance,
            "predictive" => TaskType::Predictive,
            "recovery" => TaskType::Recovery,
            "monitoring" => TaskType::Monitoring,
            "optimization" => TaskType::Optimization,
            "feature" => TaskType::Feature,
            "bugfix" => TaskType::Bugfix,
            _ => TaskType::Other(s.to_string()),
        })
    }
}

impl From<String> for TaskType {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(task_type) => task_type,
            Err(never) => match never {},
        }
    }
}

impl From<TaskType> for String {
    fn from(value: TaskType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate action awaiting the gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Producer-assigned identifier
    pub id: ProposalId,
    /// Human-readable description of the action
    pub description: String,
    /// Producer confidence in [0, 1]
    pub confidence: f64,
    /// Declared impact level
    pub impact: Impact,
    /// Kind of work
    pub task_type: TaskType,
    /// Declared scope (project, host, queue...) the action touches
    pub scope: String,
    /// Whether the producer demands a human decision
    #[serde(default)]
    pub requires_manual_approval: bool,
    /// Dedup key; defaults to the proposal id
    #[serde(default)]
    pub dedupe_key: Option<String>,
    /// Free-form tags describing the action
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Proposal {
    /// Create new proposal
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        confidence: f64,
        impact: Impact,
        task_type: TaskType,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            id: ProposalId::new(id),
            description: String::new(),
            confidence,
            impact,
            task_type,
            scope: scope.into(),
            requires_manual_approval: false,
            dedupe_key: None,
            tags: Vec::new(),
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With explicit dedup key
    #[inline]
    #[must_use]
    pub fn with_dedupe_key(mut self, key: impl Into<String>) -> Self {
        self.dedupe_key = Some(key.into());
        self
    }

    /// Demand manual approval
    #[inline]
    #[must_use]
    pub fn requiring_manual_approval(mut self) -> Self {
        self.requires_manual_approval = true;
        self
    }

    /// With tags
    #[inline]
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Key used for the action ledger
    #[inline]
    #[must_use]
    pub fn effective_dedupe_key(&self) -> &str {
        self.dedupe_key.as_deref().unwrap_or(self.id.as_str())
    }

    /// Validate the proposal shape
    ///
    /// # Errors
    /// - empty id or scope
    /// - confidence not a finite value in [0, 1]
    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::ensure_non_empty("proposal.id", self.id.as_str())?;
        ValidationError::ensure_non_empty("proposal.scope", &self.scope)?;
        ValidationError::ensure_range("proposal.confidence", self.confidence, 0.0, 1.0)?;
        if let Some(key) = &self.dedupe_key {
            ValidationError::ensure_non_empty("proposal.dedupe_key", key)?;
        }
        Ok(())
    }
}
