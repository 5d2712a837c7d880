//! Confidence router
//!
//! Pure decision function; first matching rule wins:
//!
//! 1. manual approval requested      -> review
//! 2. confidence below the floor     -> red team
//! 3. escalating impact              -> red team (reasons of 2 and 3 combine)
//! 4. confidence at/above threshold  -> auto approve
//! 5. otherwise                      -> review

use aegis_types::{Impact, Proposal, TaskType, ValidationError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Where a proposal goes next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    /// Execute without a human
    AutoApprove,
    /// A human must approve
    ReviewRequired,
    /// Adversarial review required
    RedTeamRequired,
}

impl RoutingDecision {
    /// Lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AutoApprove => "auto_approve",
            Self::ReviewRequired => "review_required",
            Self::RedTeamRequired => "red_team_required",
        }
    }
}

/// Routing outcome for one proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingResult {
    /// Decision
    pub decision: RoutingDecision,
    /// Threshold of the proposal's task type
    pub threshold: f64,
    /// `confidence - threshold`
    pub confidence_gap: f64,
    /// Why, in rule order
    pub reasons: Vec<String>,
}

impl RoutingResult {
    /// Reasons joined for display
    #[must_use]
    pub fn reason(&self) -> String {
        self.reasons.join("; ")
    }
}

/// Router thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Auto-approve threshold per task type name
    pub thresholds: IndexMap<String, f64>,
    /// Threshold for task types without an entry
    pub default_threshold: f64,
    /// Confidence below this always needs a red team
    pub red_team_floor: f64,
    /// Impacts that always need a red team
    pub escalating_impacts: Vec<Impact>,
}

impl RouterConfig {
    /// With threshold for a task type
    #[must_use]
    pub fn with_threshold(mut self, task_type: impl Into<String>, threshold: f64) -> Self {
        self.thresholds.insert(task_type.into(), threshold);
        self
    }

    /// Validate configuration
    ///
    /// # Errors
    /// Any threshold outside [0, 1]
    pub fn validate(&self) -> Result<(), ValidationError> {
        for threshold in self.thresholds.values() {
            ValidationError::ensure_range("router.thresholds", *threshold, 0.0, 1.0)?;
        }
        ValidationError::ensure_range("router.default_threshold", self.default_threshold, 0.0, 1.0)?;
        ValidationError::ensure_range("router.red_team_floor", self.red_team_floor, 0.0, 1.0)?;
        Ok(())
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        let thresholds = [
            ("maintenance", 0.90),
            ("predictive", 0.80),
            ("recovery", 0.70),
            ("monitoring", 0.85),
            ("optimization", 0.80),
            ("feature", 0.85),
            ("bugfix", 0.80),
        ]
        .into_iter()
        .map(|(name, threshold)| (name.to_string(), threshold))
        .collect();

        Self {
            thresholds,
            default_threshold: 0.85,
            red_team_floor: 0.8,
            escalating_impacts: vec![Impact::High, Impact::Critical],
        }
    }
}

/// Maps proposals to routing decisions
#[derive(Debug, Clone, Default)]
pub struct ConfidenceRouter {
    config: RouterConfig,
}

impl ConfidenceRouter {
    /// Create router
    ///
    /// # Errors
    /// Invalid configuration
    pub fn new(config: RouterConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Auto-approve threshold for a task type
    ///
    /// Unknown types fall back to the default threshold.
    #[must_use]
    pub fn threshold_for(&self, task_type: &TaskType) -> f64 {
        if let Some(threshold) = self.config.thresholds.get(task_type.as_str()) {
            return *threshold;
        }
        tracing::debug!(
            "No threshold for task type '{}', using default {}",
            task_type,
            self.config.default_threshold
        );
        self.config.default_threshold
    }

    /// Route a proposal
    #[must_use]
    pub fn route(&self, proposal: &Proposal) -> RoutingResult {
        let confidence = proposal.confidence;
        let threshold = self.threshold_for(&proposal.task_type);
        let confidence_gap = confidence - threshold;
        let result = |decision, reasons| RoutingResult {
            decision,
            threshold,
            confidence_gap,
            reasons,
        };

        if proposal.requires_manual_approval {
            return result(
                RoutingDecision::ReviewRequired,
                vec!["manual approval required".to_string()],
            );
        }

        let floor = self.config.red_team_floor;
        let mut escalations = Vec::new();
        if confidence.is_nan() || confidence < floor {
            escalations.push(format!(
                "confidence {confidence} < {floor} (gap {:.2})",
                confidence - floor
            ));
        }
        if self.config.escalating_impacts.contains(&proposal.impact) {
            escalations.push(format!("{} impact requires red team review", proposal.impact));
        }
        if !escalations.is_empty() {
            return result(RoutingDecision::RedTeamRequired, escalations);
        }

        if confidence >= threshold {
            result(
                RoutingDecision::AutoApprove,
                vec![format!(
                    "confidence {confidence} meets {} threshold {threshold}",
                    proposal.task_type
                )],
            )
        } else {
            result(
                RoutingDecision::ReviewRequired,
                vec![format!(
                    "confidence below threshold ({confidence} < {threshold} for {})",
                    proposal.task_type
                )],
            )
        }
    }
}
