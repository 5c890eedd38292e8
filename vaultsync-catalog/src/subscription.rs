//! Job update streams
//!
//! The catalog service exposes a push subscription for background job
//! status. [`JobUpdates`] is the seam the job waiter consumes;
//! [`PollingJobUpdates`] produces the stream by long-polling the job query
//! and forwarding status transitions, closing the channel once the job
//! reaches a terminal status or disappears.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::CatalogClient;
use crate::error::Result;
use crate::types::{Job, JobStatus};

/// Default delay between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// One status transition of a remote job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub job_id: String,
    pub status: JobStatus,
}

/// Narrow view of the catalog used to observe job status.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn job_status(&self, job_id: &str) -> Result<Option<Job>>;
}

#[async_trait]
impl<C: CatalogClient> JobStatusSource for C {
    async fn job_status(&self, job_id: &str) -> Result<Option<Job>> {
        self.find_job(job_id).await
    }
}

/// Push-style subscription to one job's status updates.
#[async_trait]
pub trait JobUpdates: Send + Sync {
    /// Open an update stream scoped to the given job id. The channel closes
    /// after a terminal status, when the job is unknown, or on stream
    /// failure; callers must treat a close without a terminal update as a
    /// broken stream and fall back to polling.
    async fn subscribe(&self, job_id: &str) -> Result<mpsc::Receiver<JobUpdate>>;
}

/// [`JobUpdates`] producer backed by repeated job queries.
pub struct PollingJobUpdates<S> {
    source: Arc<S>,
    interval: Duration,
}

impl<S: JobStatusSource + 'static> PollingJobUpdates<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self::with_interval(source, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(source: Arc<S>, interval: Duration) -> Self {
        Self { source, interval }
    }
}

#[async_trait]
impl<S: JobStatusSource + 'static> JobUpdates for PollingJobUpdates<S> {
    async fn subscribe(&self, job_id: &str) -> Result<mpsc::Receiver<JobUpdate>> {
        let (tx, rx) = mpsc::channel(16);
        let source = Arc::clone(&self.source);
        let job_id = job_id.to_string();
        let interval = self.interval;

        tokio::spawn(async move {
            let mut last: Option<JobStatus> = None;
            loop {
                match source.job_status(&job_id).await {
                    Ok(Some(job)) => {
                        if last != Some(job.status) {
                            last = Some(job.status);
                            debug!(job_id = %job_id, status = %job.status, "Job status update");
                            let update = JobUpdate {
                                job_id: job_id.clone(),
                                status: job.status,
                            };
                            if tx.send(update).await.is_err() {
                                break;
                            }
                        }
                        if job.status.is_terminal() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!(job_id = %job_id, "Job unknown, closing update stream");
                        break;
                    }
                    Err(e) => {
                        warn!(job_id = %job_id, "Job update stream failed: {}", e);
                        break;
                    }
                }
                tokio::time::sleep(interval).await;
            }
        });

        Ok(rx)
    }
}
