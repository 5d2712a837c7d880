//! Gate configuration
//!
//! One TOML document with a section per component; every section and
//! every field is optional and falls back to its documented default.
//!
//! ```toml
//! [ledger]
//! ttl_secs = 86400
//!
//! [selection]
//! minimum_score = 0.6
//! force_include_severity = ["critical", "high"]
//!
//! [execution]
//! retry_delays_ms = [0, 5000]
//!
//! [kill_switch.high]
//! failures = 2
//! window_mins = 5
//!
//! [router.thresholds]
//! maintenance = 0.9
//!
//! [logging]
//! filter = "info,aegis_golden=debug"
//! json = true
//! ```

use aegis_coverage::CoverageConfig;
use aegis_golden::{
    ExecutionConfig, FlakyPolicy, GoldenConfig, KillSwitchConfig, ScoringWeights,
    SelectionCriteria,
};
use aegis_ledger::LedgerConfig;
use aegis_router::RouterConfig;
use aegis_types::ValidationError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Configuration could not be loaded
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File unreadable
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Config file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Not valid TOML for the schema
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed but out of range
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` overrides
    pub filter: String,
    /// JSON lines instead of human-readable output
    pub json: bool,
}

impl LoggingConfig {
    /// Validate filter directives
    ///
    /// # Errors
    /// Unparseable directives
    pub fn validate(&self) -> Result<(), ValidationError> {
        EnvFilter::try_new(&self.filter)
            .map(|_| ())
            .map_err(|e| ValidationError::InvalidConfig(format!("logging.filter: {e}")))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Complete gate configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Action ledger
    pub ledger: LedgerConfig,
    /// Selection score weights
    pub scoring: ScoringWeights,
    /// Selection policy
    pub selection: SelectionCriteria,
    /// Retries and parallelism
    pub execution: ExecutionConfig,
    /// Flaky thresholds
    pub flaky: FlakyPolicy,
    /// Kill switch thresholds
    pub kill_switch: KillSwitchConfig,
    /// Routing thresholds
    pub router: RouterConfig,
    /// Coverage thresholds
    pub coverage: CoverageConfig,
    /// Log output
    pub logging: LoggingConfig,
}

impl GateConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// Parse or validation failure
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// IO, parse or validation failure
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::info!("Loaded gate configuration from {}", path.display());
        Ok(config)
    }

    /// Validate every section
    ///
    /// # Errors
    /// First invalid section
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.ledger.validate()?;
        self.golden().validate()?;
        self.router.validate()?;
        self.coverage.validate()?;
        self.logging.validate()
    }

    /// Golden engine sections
    #[must_use]
    pub fn golden(&self) -> GoldenConfig {
        GoldenConfig {
            scoring: self.scoring,
            selection: self.selection.clone(),
            execution: self.execution.clone(),
            flaky: self.flaky,
            kill_switch: self.kill_switch,
        }
    }
}
