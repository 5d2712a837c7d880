//! Severity, blast radius and impact levels
//!
//! All three are ordered from least to most dangerous so that `Ord`
//! comparisons read naturally (`Severity::Critical > Severity::High`).

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of an accident pattern or golden test
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Cosmetic or easily reverted
    Low,
    /// Noticeable, recoverable
    Medium,
    /// Data loss or outage within a project
    High,
    /// Irreversible or system-wide damage
    Critical,
}

impl Severity {
    /// All severities, least severe first
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Severity component of the selection score
    #[inline]
    #[must_use]
    pub fn score(self) -> f64 {
        match self {
            Severity::Low => 0.25,
            Severity::Medium => 0.5,
            Severity::High => 0.75,
            Severity::Critical => 1.0,
        }
    }

    /// Lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(ValidationError::UnknownVariant {
                kind: "severity",
                value: s.to_string(),
            }),
        }
    }
}

/// Scope of damage a failure causes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlastRadius {
    /// A single file
    File,
    /// A directory tree
    Directory,
    /// A whole project
    Project,
    /// The host system or shared infrastructure
    System,
}

impl BlastRadius {
    /// Blast-radius component of the selection score
    #[inline]
    #[must_use]
    pub fn score(self) -> f64 {
        match self {
            BlastRadius::File => 0.0,
            BlastRadius::Directory => 0.33,
            BlastRadius::Project => 0.67,
            BlastRadius::System => 1.0,
        }
    }

    /// Lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BlastRadius::File => "file",
            BlastRadius::Directory => "directory",
            BlastRadius::Project => "project",
            BlastRadius::System => "system",
        }
    }
}

impl fmt::Display for BlastRadius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlastRadius {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(BlastRadius::File),
            "directory" => Ok(BlastRadius::Directory),
            "project" => Ok(BlastRadius::Project),
            "system" => Ok(BlastRadius::System),
            _ => Err(ValidationError::UnknownVariant {
                kind: "blast radius",
                value: s.to_string(),
            }),
        }
    }
}

/// Declared impact of a proposed action
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    /// Low impact
    Low,
    /// Medium impact
    Medium,
    /// High impact
    High,
    /// Critical impact
    Critical,
}

impl Impact {
    /// Highest test severity an action of this impact must pass
    ///
    /// Tests above the action's own risk tier are not required for a
    /// lower-risk action.
    #[inline]
    #[must_use]
    pub fn severity_ceiling(self) -> Severity {
        match self {
            Impact::Low => Severity::Low,
            Impact::Medium => Severity::Medium,
            Impact::High => Severity::High,
            Impact::Critical => Severity::Critical,
        }
    }

    /// Lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.severity_ceiling().as_str()
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Impact {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Impact::Low),
            "medium" => Ok(Impact::Medium),
            "high" => Ok(Impact::High),
            "critical" => Ok(Impact::Critical),
            _ => Err(ValidationError::UnknownVariant {
                kind: "impact",
                value: s.to_string(),
            }),
        }
    }
}
