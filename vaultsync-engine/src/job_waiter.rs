//! Waiting on remote background jobs
//!
//! The catalog runs scans as background jobs. The waiter checks the job
//! once before subscribing, since short jobs are often already terminal,
//! then consumes the update stream under a deadline. A stream that closes
//! without a terminal status, or a deadline hit, degrades to one final
//! poll instead of an error: a slow scan is a reportable outcome, not a
//! failure.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, instrument, warn};
use vaultsync_catalog::{JobStatus, JobStatusSource, JobUpdates};
use vaultsync_runtime::events::{CoreEvent, EventBus, JobEvent};

use crate::error::Result;

/// Awaits a single remote job until it reaches a desired status.
pub struct JobWaiter {
    source: Arc<dyn JobStatusSource>,
    updates: Arc<dyn JobUpdates>,
    events: Arc<EventBus>,
}

impl JobWaiter {
    pub fn new(
        source: Arc<dyn JobStatusSource>,
        updates: Arc<dyn JobUpdates>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            source,
            updates,
            events,
        }
    }

    /// Wait until the job reaches `desired` or any terminal status.
    ///
    /// Returns `None` when the job is unknown to the catalog, otherwise
    /// whether the desired status was observed. Runs past the timeout
    /// resolve with one final poll.
    #[instrument(skip(self))]
    pub async fn wait(
        &self,
        job_id: &str,
        desired: JobStatus,
        timeout: Duration,
    ) -> Result<Option<bool>> {
        let Some(job) = self.source.job_status(job_id).await? else {
            debug!(job_id, "Job unknown to the catalog");
            return Ok(None);
        };
        if job.status == desired || job.status.is_terminal() {
            return Ok(Some(job.status == desired));
        }

        let deadline = Instant::now() + timeout;
        match self.updates.subscribe(job_id).await {
            Ok(mut rx) => loop {
                match timeout_at(deadline, rx.recv()).await {
                    Ok(Some(update)) => {
                        let _ = self.events.emit(CoreEvent::Job(JobEvent::StatusChanged {
                            job_id: job_id.to_string(),
                            status: update.status.to_string(),
                        }));
                        if update.status == desired || update.status.is_terminal() {
                            return Ok(Some(update.status == desired));
                        }
                    }
                    Ok(None) => {
                        warn!(job_id, "Update stream closed early, falling back to polling");
                        break;
                    }
                    Err(_) => {
                        warn!(job_id, timeout_secs = timeout.as_secs(), "Job wait timed out");
                        let _ = self.events.emit(CoreEvent::Job(JobEvent::TimedOut {
                            job_id: job_id.to_string(),
                            timeout_secs: timeout.as_secs(),
                        }));
                        break;
                    }
                }
            },
            Err(e) => {
                warn!(job_id, error = %e, "Update subscription refused, falling back to polling");
            }
        }

        // Single authoritative poll after a broken stream or deadline. A
        // failure here leaves the outcome unknown rather than aborting the
        // caller.
        match self.source.job_status(job_id).await {
            Ok(Some(job)) => Ok(Some(job.status == desired)),
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(job_id, error = %e, "Fallback poll failed, job outcome unknown");
                Ok(None)
            }
        }
    }
}
