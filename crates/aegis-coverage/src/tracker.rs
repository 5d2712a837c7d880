//! Coverage snapshots, trend and warnings

use crate::error::CoverageError;
use crate::metrics::{calculate_coverage, CoverageConfig, CoverageMetrics, SeverityCoverage};
use aegis_boundary::{Alert, AlertKind, AlertSink, Record, RecordQuery, RecordStore, Scope};
use aegis_golden::{AccidentPattern, GoldenTest};
use aegis_types::{Clock, Severity};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SNAPSHOT_KEY: &str = "snapshot";
const WARNING_KEY: &str = "warning";

/// Persisted point-in-time coverage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSnapshot {
    /// When taken
    pub taken_at: DateTime<Utc>,
    /// Covered over total, in percent
    pub coverage_percentage: f64,
    /// Covered patterns
    pub covered_patterns: usize,
    /// All patterns
    pub total_patterns: usize,
    /// Breakdown, critical first
    pub by_severity: IndexMap<Severity, SeverityCoverage>,
}

impl From<&CoverageMetrics> for CoverageSnapshot {
    fn from(metrics: &CoverageMetrics) -> Self {
        Self {
            taken_at: metrics.calculated_at,
            coverage_percentage: metrics.coverage_percentage,
            covered_patterns: metrics.covered_patterns,
            total_patterns: metrics.total_patterns,
            by_severity: metrics.by_severity.clone(),
        }
    }
}

/// Direction of coverage between the two latest snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageTrend {
    /// Up by more than the threshold
    Improving,
    /// Down by more than the threshold
    Declining,
    /// Within the threshold, or too little history
    Stable,
}

/// Trend with the numbers behind it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    /// Classification
    pub trend: CoverageTrend,
    /// Percentage-point change, when two snapshots exist
    pub delta: Option<f64>,
}

impl TrendReport {
    /// Classify the change from `previous` to `current`
    #[must_use]
    pub fn between(previous: f64, current: f64, threshold: f64) -> Self {
        let delta = current - previous;
        let trend = if delta > threshold {
            CoverageTrend::Improving
        } else if delta < -threshold {
            CoverageTrend::Declining
        } else {
            CoverageTrend::Stable
        };
        Self {
            trend,
            delta: Some(delta),
        }
    }

    fn insufficient_history() -> Self {
        Self {
            trend: CoverageTrend::Stable,
            delta: None,
        }
    }
}

/// Kind of coverage warning, most urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageWarningKind {
    /// A critical pattern has no test
    CriticalCoverageGap,
    /// Coverage is going down
    CoverageDeclining,
    /// Coverage under the target
    BelowTarget,
}

impl CoverageWarningKind {
    /// Severity of the alert raised for this kind
    #[inline]
    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            Self::CriticalCoverageGap => Severity::Critical,
            Self::CoverageDeclining => Severity::High,
            Self::BelowTarget => Severity::Medium,
        }
    }
}

/// Persisted coverage warning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageWarning {
    /// Kind
    pub kind: CoverageWarningKind,
    /// Human-readable summary
    pub message: String,
    /// When raised
    pub raised_at: DateTime<Utc>,
}

/// Warnings for `metrics` and `trend`, most urgent first
#[must_use]
pub fn generate_warnings(
    metrics: &CoverageMetrics,
    trend: &TrendReport,
    config: &CoverageConfig,
) -> Vec<CoverageWarning> {
    let at = metrics.calculated_at;
    let mut warnings = Vec::new();

    let critical = metrics.severity(Severity::Critical);
    if critical.has_gap() {
        warnings.push(CoverageWarning {
            kind: CoverageWarningKind::CriticalCoverageGap,
            message: format!(
                "{} of {} critical accident patterns have no golden test",
                critical.total - critical.covered,
                critical.total
            ),
            raised_at: at,
        });
    }
    if let (CoverageTrend::Declining, Some(delta)) = (trend.trend, trend.delta) {
        warnings.push(CoverageWarning {
            kind: CoverageWarningKind::CoverageDeclining,
            message: format!(
                "coverage declined by {:.1} points to {:.1}%",
                -delta, metrics.coverage_percentage
            ),
            raised_at: at,
        });
    }
    if metrics.coverage_percentage < config.target_percentage {
        warnings.push(CoverageWarning {
            kind: CoverageWarningKind::BelowTarget,
            message: format!(
                "coverage {:.1}% is below the {:.1}% target",
                metrics.coverage_percentage, config.target_percentage
            ),
            raised_at: at,
        });
    }

    warnings.sort_by_key(|w| w.kind);
    warnings
}

/// Result of one coverage cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Current metrics
    pub metrics: CoverageMetrics,
    /// Trend against the previous snapshot
    pub trend: TrendReport,
    /// Warnings, most urgent first
    pub warnings: Vec<CoverageWarning>,
}

impl CoverageReport {
    /// Most urgent warning
    #[inline]
    #[must_use]
    pub fn primary_warning(&self) -> Option<&CoverageWarning> {
        self.warnings.first()
    }
}

/// Periodic coverage tracker
#[derive(Debug)]
pub struct CoverageTracker {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    alerts: Arc<dyn AlertSink>,
    config: CoverageConfig,
}

impl CoverageTracker {
    /// Create tracker
    ///
    /// # Errors
    /// Invalid configuration
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        alerts: Arc<dyn AlertSink>,
        config: CoverageConfig,
    ) -> Result<Self, CoverageError> {
        config.validate()?;
        Ok(Self {
            store,
            clock,
            alerts,
            config,
        })
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CoverageConfig {
        &self.config
    }

    /// Calculate coverage now
    #[must_use]
    pub fn calculate(&self, patterns: &[AccidentPattern], tests: &[GoldenTest]) -> CoverageMetrics {
        calculate_coverage(patterns, tests, self.clock.now())
    }

    /// Persist a snapshot of `metrics`
    ///
    /// # Errors
    /// Store failure
    pub async fn record_snapshot(&self, metrics: &CoverageMetrics) -> Result<CoverageSnapshot, CoverageError> {
        let snapshot = CoverageSnapshot::from(metrics);
        let record = Record::new(Scope::Coverage, SNAPSHOT_KEY, snapshot.taken_at, &snapshot)?;
        self.store.append(record).await?;
        Ok(snapshot)
    }

    /// Latest snapshots, newest first
    ///
    /// # Errors
    /// Store failure or undecodable snapshot
    pub async fn snapshots(&self, limit: usize) -> Result<Vec<CoverageSnapshot>, CoverageError> {
        let records = self
            .store
            .query(Scope::Coverage, &RecordQuery::new().key(SNAPSHOT_KEY).limit(limit))
            .await?;
        Ok(records
            .iter()
            .map(Record::decode)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Trend between the two most recent snapshots
    ///
    /// # Errors
    /// Store failure
    pub async fn trend(&self) -> Result<TrendReport, CoverageError> {
        let snapshots = self.snapshots(2).await?;
        Ok(match snapshots.as_slice() {
            [current, previous] => TrendReport::between(
                previous.coverage_percentage,
                current.coverage_percentage,
                self.config.trend_threshold_pct,
            ),
            _ => TrendReport::insufficient_history(),
        })
    }

    /// Recent warnings, newest first
    ///
    /// # Errors
    /// Store failure or undecodable warning
    pub async fn warnings(&self, limit: usize) -> Result<Vec<CoverageWarning>, CoverageError> {
        let records = self
            .store
            .query(Scope::Coverage, &RecordQuery::new().key(WARNING_KEY).limit(limit))
            .await?;
        Ok(records
            .iter()
            .map(Record::decode)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Calculate, snapshot, trend, then persist and emit warnings
    ///
    /// # Errors
    /// Store failure
    pub async fn run_cycle(
        &self,
        patterns: &[AccidentPattern],
        tests: &[GoldenTest],
    ) -> Result<CoverageReport, CoverageError> {
        let metrics = self.calculate(patterns, tests);
        self.record_snapshot(&metrics).await?;
        let trend = self.trend().await?;
        let warnings = generate_warnings(&metrics, &trend, &self.config);

        for warning in &warnings {
            let record = Record::new(Scope::Coverage, WARNING_KEY, warning.raised_at, warning)?;
            self.store.append(record).await?;
            tracing::warn!("Coverage warning {:?}: {}", warning.kind, warning.message);
            self.alerts
                .emit(Alert::new(
                    AlertKind::CoverageWarning,
                    warning.kind.severity(),
                    "coverage",
                    warning.message.clone(),
                    warning.raised_at,
                ))
                .await;
        }

        tracing::info!(
            "Coverage {:.1}% ({}/{}), trend {:?}",
            metrics.coverage_percentage,
            metrics.covered_patterns,
            metrics.total_patterns,
            trend.trend
        );
        Ok(CoverageReport {
            metrics,
            trend,
            warnings,
        })
    }
}
