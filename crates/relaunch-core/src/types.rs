//! Domain types for a deployment attempt.
//!
//! Everything here is ephemeral per run except [`StableRevisionRecord`],
//! which is the one value the revision store persists across runs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by domain type constructors and transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("revision must not be empty")]
    EmptyRevision,

    #[error("revision {0:?} contains whitespace")]
    WhitespaceInRevision(String),

    #[error("revision {0:?} must not start with '-'")]
    LeadingDash(String),

    #[error("outcome already {current}; cannot become {requested}")]
    OutcomeFinal { current: Outcome, requested: Outcome },

    #[error("an attempt cannot transition back to pending")]
    OutcomeNotTerminal,
}

// ── Revision ───────────────────────────────────────────────────────

/// An opaque source revision identifier (usually a commit hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Revision(String);

impl Revision {
    /// Validate and wrap a revision id.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(TypeError::EmptyRevision);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(TypeError::WhitespaceInRevision(id));
        }
        // Revisions are passed to git as positional arguments.
        if trimmed.starts_with('-') {
            return Err(TypeError::LeadingDash(id));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for log lines.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(12) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Revision {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Revision {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Revision> for String {
    fn from(rev: Revision) -> Self {
        rev.0
    }
}

// ── Deployment attempt ─────────────────────────────────────────────

/// Terminal status of a deployment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Success,
    RolledBack,
    Failed,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        self != Outcome::Pending
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Pending => "pending",
            Outcome::Success => "success",
            Outcome::RolledBack => "rolled_back",
            Outcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One end-to-end run of the deployment state machine.
///
/// The outcome only ever moves out of `Pending` once; [`finish`](Self::finish)
/// rejects every other transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentAttempt {
    pub target_revision: Revision,
    /// Unix timestamp (seconds) when the attempt was triggered.
    pub started_at: u64,
    /// Build attempts made beyond the first one.
    pub build_retry_count: u32,
    outcome: Outcome,
}

impl DeploymentAttempt {
    pub fn new(target_revision: Revision, started_at: u64) -> Self {
        Self {
            target_revision,
            started_at,
            build_retry_count: 0,
            outcome: Outcome::Pending,
        }
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Move the attempt to its terminal outcome.
    pub fn finish(&mut self, outcome: Outcome) -> Result<(), TypeError> {
        if !outcome.is_terminal() {
            return Err(TypeError::OutcomeNotTerminal);
        }
        if self.outcome.is_terminal() {
            return Err(TypeError::OutcomeFinal {
                current: self.outcome,
                requested: outcome,
            });
        }
        self.outcome = outcome;
        Ok(())
    }
}

// ── Stable revision record ─────────────────────────────────────────

/// The last revision that passed both internal and external verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StableRevisionRecord {
    pub commit: Revision,
    /// Unix timestamp (seconds) when the record was written.
    #[serde(default)]
    pub recorded_at: u64,
}

impl StableRevisionRecord {
    pub fn new(commit: Revision, recorded_at: u64) -> Self {
        Self {
            commit,
            recorded_at,
        }
    }
}

// ── Services ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    NotBuilt,
    Built,
    BuildFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Stopped,
    Starting,
    Running,
    Unhealthy,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Stopped => "stopped",
            RunStatus::Starting => "starting",
            RunStatus::Running => "running",
            RunStatus::Unhealthy => "unhealthy",
        };
        f.write_str(s)
    }
}

/// Per-run view of one named service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub build_status: BuildStatus,
    pub run_status: RunStatus,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            build_status: BuildStatus::NotBuilt,
            run_status: RunStatus::Stopped,
        }
    }
}

// ── Health results ─────────────────────────────────────────────────

/// What a health check was aimed at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum HealthTarget {
    /// Internal liveness check of a named service.
    Service(String),
    /// Public entry point, identified by URL.
    External(String),
}

impl fmt::Display for HealthTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthTarget::Service(name) => f.write_str(name),
            HealthTarget::External(url) => write!(f, "external:{url}"),
        }
    }
}

/// A single probe observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheckResult {
    pub target: HealthTarget,
    /// 1-based attempt number within the polling window.
    pub attempt_number: u32,
    pub passed: bool,
    /// Unix timestamp (seconds).
    pub observed_at: u64,
}

/// Seconds since the Unix epoch.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
