//! Bounded-concurrency batch scheduler for content items
//!
//! Items are processed in fixed-size batches: within a batch up to
//! `max_concurrent` items run at once under a semaphore, batches run
//! strictly one after another, and a failed item never stops its batch.
//! Cancellation is honored at batch boundaries so in-flight items always
//! drain.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use vaultsync_runtime::events::{CoreEvent, EventBus, SyncEvent};
use vaultsync_store::{Account, ContentItem, ContentKind};

use crate::error::{Result, SyncError};
use crate::gallery::AssemblyReport;

/// Per-run state handed to every item processor invocation.
#[derive(Clone)]
pub struct BatchContext {
    pub run_id: String,
    pub account: Arc<Account>,
}

/// Processes one content item; the scheduler owns dispatch and accounting.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(&self, item: ContentItem, ctx: &BatchContext) -> Result<AssemblyReport>;
}

/// Aggregate outcome of one scheduler pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchStats {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub galleries_attached: u64,
}

/// Dispatches content items over a worker pool in sequential batches.
pub struct BatchScheduler {
    processor: Arc<dyn ItemProcessor>,
    events: Arc<EventBus>,
    max_concurrent: usize,
}

impl BatchScheduler {
    pub fn new(
        processor: Arc<dyn ItemProcessor>,
        events: Arc<EventBus>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            processor,
            events,
            max_concurrent,
        }
    }

    /// Run all items of one kind through the pool. Item failures are
    /// counted, not propagated; only cancellation aborts the pass.
    pub async fn run(
        &self,
        kind: ContentKind,
        items: Vec<ContentItem>,
        batch_size: usize,
        ctx: &BatchContext,
        cancel: &CancellationToken,
    ) -> Result<BatchStats> {
        let total = items.len() as u64;
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut stats = BatchStats::default();
        let phase = match kind {
            ContentKind::Post => "posts",
            ContentKind::Message => "messages",
        };

        for (batch_index, batch) in items.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                warn!(batch_index, "Cancellation requested, stopping before batch");
                return Err(SyncError::Cancelled);
            }

            let mut handles = Vec::with_capacity(batch.len());
            for item in batch {
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    // The semaphore is never closed while we hold it.
                    Err(_) => return Err(SyncError::Cancelled),
                };
                let processor = Arc::clone(&self.processor);
                let ctx = ctx.clone();
                let item = item.clone();

                handles.push(tokio::spawn(async move {
                    let item_id = item.id;
                    let result = processor.process(item, &ctx).await;
                    drop(permit);
                    (item_id, result)
                }));
            }

            let mut batch_stats = BatchStats::default();
            for handle in handles {
                batch_stats.attempted += 1;
                match handle.await {
                    Ok((_, Ok(report))) => {
                        batch_stats.succeeded += 1;
                        if report.gallery_id.is_some() {
                            batch_stats.galleries_attached += 1;
                        }
                    }
                    Ok((item_id, Err(e))) => {
                        warn!(item_id, error = %e, "Item failed, continuing batch");
                        batch_stats.failed += 1;
                    }
                    Err(e) => {
                        error!(error = %e, "Item task panicked");
                        batch_stats.failed += 1;
                    }
                }
            }

            stats.attempted += batch_stats.attempted;
            stats.succeeded += batch_stats.succeeded;
            stats.failed += batch_stats.failed;
            stats.galleries_attached += batch_stats.galleries_attached;

            debug!(
                batch_index,
                attempted = batch_stats.attempted,
                failed = batch_stats.failed,
                "Batch drained"
            );
            let _ = self.events.emit(CoreEvent::Sync(SyncEvent::BatchCompleted {
                run_id: ctx.run_id.clone(),
                content_kind: kind.as_str().to_string(),
                batch_index,
                attempted: batch_stats.attempted,
                succeeded: batch_stats.succeeded,
                failed: batch_stats.failed,
            }));
            let _ = self.events.emit(CoreEvent::Sync(SyncEvent::Progress {
                run_id: ctx.run_id.clone(),
                items_processed: stats.attempted,
                total_items: total,
                phase: phase.to_string(),
            }));
        }

        Ok(stats)
    }
}
