//! # Event Bus
//!
//! Decoupled communication between VaultSync modules via `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The orchestrator and batch scheduler publish typed events as a sync run
//! progresses; subscribers (UI, log shipping, tests) consume them
//! independently. Slow subscribers receive `RecvError::Lagged` rather than
//! blocking publishers.
//!
//! ## Usage
//!
//! ```rust
//! use vaultsync_runtime::events::{EventBus, CoreEvent, SyncEvent};
//!
//! let bus = EventBus::new(100);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Sync(SyncEvent::Started {
//!     run_id: "run-1".to_string(),
//!     account_id: 42,
//! }))
//! .ok();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Synchronization lifecycle events
    Sync(SyncEvent),
    /// Remote background job events
    Job(JobEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Job(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Sync(SyncEvent::Started { .. }) => EventSeverity::Info,
            CoreEvent::Job(JobEvent::TimedOut { .. }) => EventSeverity::Warning,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Events emitted over the lifetime of one account synchronization run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A sync run was started for an account.
    Started {
        /// Unique identifier of the run.
        run_id: String,
        /// Source account being synchronized.
        account_id: i64,
    },
    /// One batch of content items finished dispatch and drain.
    BatchCompleted {
        run_id: String,
        /// `"post"` or `"message"`.
        content_kind: String,
        /// Zero-based index of the batch within its content kind.
        batch_index: usize,
        attempted: u64,
        succeeded: u64,
        failed: u64,
    },
    /// Incremental progress across the whole run.
    Progress {
        run_id: String,
        items_processed: u64,
        total_items: u64,
        /// Current processing phase, e.g. `"posts"` or `"messages"`.
        phase: String,
    },
    /// The run finished; all items were attempted.
    Completed {
        run_id: String,
        items_processed: u64,
        items_failed: u64,
        galleries_attached: u64,
        duration_secs: u64,
    },
    /// The run aborted with a fatal error.
    Failed {
        run_id: String,
        message: String,
        items_processed: u64,
    },
    /// The run was cancelled before completion.
    Cancelled { run_id: String },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync run started",
            SyncEvent::BatchCompleted { .. } => "Batch completed",
            SyncEvent::Progress { .. } => "Sync progress",
            SyncEvent::Completed { .. } => "Sync run completed",
            SyncEvent::Failed { .. } => "Sync run failed",
            SyncEvent::Cancelled { .. } => "Sync run cancelled",
        }
    }
}

/// Events observed while waiting on remote background jobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum JobEvent {
    /// The remote job reported a status change.
    StatusChanged {
        job_id: String,
        status: String,
    },
    /// Waiting for the remote job exceeded the configured timeout.
    TimedOut {
        job_id: String,
        timeout_secs: u64,
    },
}

impl JobEvent {
    fn description(&self) -> &str {
        match self {
            JobEvent::StatusChanged { .. } => "Remote job status changed",
            JobEvent::TimedOut { .. } => "Remote job wait timed out",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for publishing [`CoreEvent`]s.
///
/// Cloning the bus clones the sender; all clones feed the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel buffer size.
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` wrapper with optional predicate filtering.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter; only matching events are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` when the subscriber fell behind by `n` events;
    /// `RecvError::Closed` when all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }
}
