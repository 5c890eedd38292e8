//! Sync run lifecycle
//!
//! A run is in-memory bookkeeping for one account synchronization:
//! identity, a validated status machine, and progress counters. Nothing
//! here is persisted; restarting the process simply starts fresh runs,
//! which is safe because every catalog write is idempotent.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Result, SyncError};

// ============================================================================
// Run Identity
// ============================================================================

/// Unique identifier for a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SyncError::InvalidRunId(s.to_string()))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Run Status
// ============================================================================

/// Lifecycle states of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, not yet executing.
    Pending,
    /// Actively synchronizing.
    Running,
    /// All items were attempted.
    Completed,
    /// Aborted by a fatal error.
    Failed,
    /// Stopped on request before completion.
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Pending, RunStatus::Cancelled)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
                | (RunStatus::Running, RunStatus::Cancelled)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Counters advanced as the run moves through its phases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunProgress {
    pub items_discovered: u64,
    pub items_processed: u64,
    pub items_failed: u64,
    pub galleries_attached: u64,
    /// Percent of discovered items attempted, 0-100.
    pub percent: u8,
    /// Human-readable phase, e.g. `"posts"`.
    pub phase: String,
}

impl RunProgress {
    /// Recompute the percentage from the counters.
    pub fn update(&mut self) {
        self.percent = if self.items_discovered == 0 {
            100
        } else {
            ((self.items_processed * 100) / self.items_discovered).min(100) as u8
        };
    }
}

// ============================================================================
// Run
// ============================================================================

/// One account synchronization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: RunId,
    pub account_id: i64,
    pub status: RunStatus,
    pub progress: RunProgress,
    /// Fatal error message, present only for failed runs.
    pub error: Option<String>,
}

impl SyncRun {
    pub fn new(account_id: i64) -> Self {
        Self {
            id: RunId::new(),
            account_id,
            status: RunStatus::Pending,
            progress: RunProgress::default(),
            error: None,
        }
    }

    fn transition(&mut self, next: RunStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(SyncError::InvalidTransition {
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.transition(RunStatus::Running)
    }

    pub fn complete(&mut self) -> Result<()> {
        self.transition(RunStatus::Completed)
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition(RunStatus::Failed)?;
        self.error = Some(message.into());
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.transition(RunStatus::Cancelled)
    }
}
