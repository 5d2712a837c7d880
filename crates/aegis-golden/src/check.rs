//! Executable check bodies
//!
//! Checks are typed values registered at build time under a `check_id`;
//! stored test data only ever names a check, it never carries code.

use crate::golden::GoldenTest;
use aegis_types::{ExecutionId, Proposal};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Input to a check
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    /// Candidate action under test
    pub action: &'a Proposal,
    /// Test being run
    pub test: &'a GoldenTest,
    /// 0-based attempt index
    pub attempt: u32,
    /// Gate invocation
    pub execution_id: ExecutionId,
}

/// A check reported a failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CheckFailure {
    /// Failure detail
    pub message: String,
}

impl CheckFailure {
    /// Create failure
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Golden test body
#[async_trait::async_trait]
pub trait GoldenCheck: Send + Sync + fmt::Debug {
    /// Run the check against the candidate action
    async fn run(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure>;
}

/// Synchronous closure adapted to `GoldenCheck`
pub struct FnCheck<F> {
    name: String,
    body: F,
}

impl<F> fmt::Debug for FnCheck<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCheck").field("name", &self.name).finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<F> GoldenCheck for FnCheck<F>
where
    F: Fn(&CheckContext<'_>) -> Result<(), CheckFailure> + Send + Sync,
{
    async fn run(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        (self.body)(ctx)
    }
}

/// Built-in check: fails when the action reproduces every trigger
/// condition of the originating pattern
///
/// A condition is reproduced when it appears (case-insensitively) in the
/// action description or one of its tags. Tests without trigger
/// conditions pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerConditionCheck;

#[async_trait::async_trait]
impl GoldenCheck for TriggerConditionCheck {
    async fn run(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        let conditions = &ctx.test.trigger_conditions;
        if conditions.is_empty() {
            return Ok(());
        }

        let description = ctx.action.description.to_lowercase();
        let tags: Vec<String> = ctx.action.tags.iter().map(|t| t.to_lowercase()).collect();
        let reproduced = conditions.iter().all(|condition| {
            let needle = condition.trim().to_lowercase();
            !needle.is_empty()
                && (description.contains(&needle) || tags.iter().any(|t| t.contains(&needle)))
        });

        if reproduced {
            Err(CheckFailure::new(format!(
                "action reproduces trigger conditions of pattern {}: {}",
                ctx.test.pattern_id,
                conditions.join(", ")
            )))
        } else {
            Ok(())
        }
    }
}

/// Checks by ID, with a fallback for tests without a registered body
#[derive(Debug, Clone)]
pub struct CheckRegistry {
    checks: HashMap<String, Arc<dyn GoldenCheck>>,
    fallback: Arc<dyn GoldenCheck>,
}

impl CheckRegistry {
    /// Create registry falling back to `TriggerConditionCheck`
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            checks: HashMap::new(),
            fallback: Arc::new(TriggerConditionCheck),
        }
    }

    /// Register a check, replacing any previous one with the same ID
    pub fn register(&mut self, check_id: impl Into<String>, check: Arc<dyn GoldenCheck>) -> &mut Self {
        self.checks.insert(check_id.into(), check);
        self
    }

    /// Register a synchronous closure
    pub fn register_fn<F>(&mut self, check_id: impl Into<String>, body: F) -> &mut Self
    where
        F: Fn(&CheckContext<'_>) -> Result<(), CheckFailure> + Send + Sync + 'static,
    {
        let name = check_id.into();
        let check = Arc::new(FnCheck {
            name: name.clone(),
            body,
        });
        self.register(name, check)
    }

    /// Replace the fallback check
    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn GoldenCheck>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Check for `check_id`, or the fallback
    #[must_use]
    pub fn resolve(&self, check_id: &str) -> Arc<dyn GoldenCheck> {
        self.checks
            .get(check_id)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::AccidentPattern;
    use aegis_types::{BlastRadius, Impact, Severity, TaskType};

    fn test_with_conditions(conditions: &[&str]) -> GoldenTest {
        let pattern = AccidentPattern::new("p1", "t", Severity::High, BlastRadius::Project)
            .with_trigger_conditions(conditions.iter().copied());
        GoldenTest::from_pattern(&pattern, 0.9, 1_000)
    }

    fn action(description: &str, tags: &[&str]) -> Proposal {
        Proposal::new("a1", 0.9, Impact::Medium, TaskType::Maintenance, "repo")
            .with_description(description)
            .with_tags(tags.iter().copied())
    }

    fn ctx<'a>(action: &'a Proposal, test: &'a GoldenTest) -> CheckContext<'a> {
        CheckContext {
            action,
            test,
            attempt: 0,
            execution_id: ExecutionId::new(),
        }
    }

    #[tokio::test]
    async fn trigger_check_fails_when_all_conditions_present() {
        let test = test_with_conditions(&["force push", "main branch"]);
        let risky = action("Force push to the MAIN branch", &[]);
        let err = TriggerConditionCheck.run(&ctx(&risky, &test)).await.unwrap_err();
        assert!(err.message.contains("p1"));

        let tagged = action("force push", &["main branch"]);
        assert!(TriggerConditionCheck.run(&ctx(&tagged, &test)).await.is_err());
    }

    #[tokio::test]
    async fn trigger_check_passes_on_partial_match() {
        let test = test_with_conditions(&["force push", "main branch"]);
        let safe = action("force push to a feature branch", &[]);
        assert!(TriggerConditionCheck.run(&ctx(&safe, &test)).await.is_ok());

        let unconditioned = test_with_conditions(&[]);
        assert!(TriggerConditionCheck
            .run(&ctx(&safe, &unconditioned))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn registry_resolves_registered_and_fallback() {
        let mut registry = CheckRegistry::new();
        registry.register_fn("always-fails", |_| Err(CheckFailure::new("nope")));

        let test = test_with_conditions(&[]);
        let proposal = action("anything", &[]);
        let context = ctx(&proposal, &test);

        assert!(registry.resolve("always-fails").run(&context).await.is_err());
        assert!(registry.resolve("unknown").run(&context).await.is_ok());
    }
}
