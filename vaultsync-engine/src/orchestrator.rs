//! Sync orchestration
//!
//! The orchestrator owns run lifecycle: it guards one run per account,
//! spawns the run as a background task, drives the phases in order
//! (optional catalog scan, entity resolution, posts, then messages), and
//! keeps the run registry current for status queries and cancellation.
//! Cancelling a run flips its token; the scheduler honors it at the next
//! batch boundary.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use vaultsync_catalog::{CatalogClient, JobStatus, JobStatusSource, JobUpdates};
use vaultsync_runtime::config::RuntimeConfig;
use vaultsync_runtime::events::{CoreEvent, EventBus, SyncEvent};
use vaultsync_store::{
    Account, AccountId, AccountRepository, ContentItem, ContentKind, ContentRepository,
    MediaRepository,
};

use crate::batch::{BatchContext, BatchScheduler, BatchStats, ItemProcessor};
use crate::error::{Result, SyncError};
use crate::gallery::{AssemblyReport, GalleryAssembler};
use crate::job_waiter::JobWaiter;
use crate::media::MediaResolver;
use crate::merge::MergePolicy;
use crate::resolvers::{PerformerResolver, StudioResolver, TagResolver};
use crate::run::{RunId, SyncRun};

/// Per-run options supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Library paths to scan on the catalog before resolving media. When
    /// absent the run assumes the catalog index is current.
    pub scan_paths: Option<Vec<String>>,
}

/// Bookkeeping for a run that has not reached a terminal status.
struct ActiveRun {
    run_id: RunId,
    token: CancellationToken,
}

/// Assembles one gallery per item, with the public page URL for posts.
struct GalleryProcessor {
    assembler: Arc<GalleryAssembler>,
}

#[async_trait::async_trait]
impl ItemProcessor for GalleryProcessor {
    async fn process(&self, item: ContentItem, ctx: &BatchContext) -> Result<AssemblyReport> {
        // Messages have no public page.
        let url = match item.kind {
            ContentKind::Post => Some(format!("https://fansly.com/post/{}", item.id)),
            ContentKind::Message => None,
        };
        self.assembler
            .assemble(&item, &ctx.account, url.as_deref())
            .await
    }
}

/// Coordinates account synchronization runs.
pub struct SyncOrchestrator {
    config: RuntimeConfig,
    accounts: Arc<dyn AccountRepository>,
    content: Arc<dyn ContentRepository>,
    catalog: Arc<dyn CatalogClient>,
    performers: Arc<PerformerResolver>,
    studios: Arc<StudioResolver>,
    scheduler: Arc<BatchScheduler>,
    job_waiter: Arc<JobWaiter>,
    events: Arc<EventBus>,
    active: Arc<Mutex<HashMap<i64, ActiveRun>>>,
    runs: Arc<RwLock<HashMap<RunId, SyncRun>>>,
}

impl SyncOrchestrator {
    /// Wire the full engine over the given stores, catalog client, and job
    /// update stream.
    pub fn new(
        config: RuntimeConfig,
        accounts: Arc<dyn AccountRepository>,
        content: Arc<dyn ContentRepository>,
        media: Arc<dyn MediaRepository>,
        catalog: Arc<dyn CatalogClient>,
        updates: Arc<dyn JobUpdates>,
        events: Arc<EventBus>,
    ) -> Self {
        let performers = Arc::new(PerformerResolver::new(
            Arc::clone(&catalog),
            Arc::clone(&accounts),
            Arc::clone(&media),
        ));
        let studios = Arc::new(StudioResolver::new(
            Arc::clone(&catalog),
            Arc::clone(&accounts),
        ));
        let tags = Arc::new(TagResolver::new(Arc::clone(&catalog)));
        let merge = Arc::new(MergePolicy::new(
            Arc::clone(&performers),
            Arc::clone(&studios),
            tags,
        ));
        let media_resolver = Arc::new(MediaResolver::new(
            Arc::clone(&catalog),
            Arc::clone(&media),
        ));
        let assembler = Arc::new(GalleryAssembler::new(
            Arc::clone(&catalog),
            Arc::clone(&content),
            media,
            media_resolver,
            merge,
        ));
        let scheduler = Arc::new(BatchScheduler::new(
            Arc::new(GalleryProcessor { assembler }),
            Arc::clone(&events),
            config.max_concurrent_items,
        ));
        let job_waiter = Arc::new(JobWaiter::new(
            Arc::new(Arc::clone(&catalog)) as Arc<dyn JobStatusSource>,
            updates,
            Arc::clone(&events),
        ));

        Self {
            config,
            accounts,
            content,
            catalog,
            performers,
            studios,
            scheduler,
            job_waiter,
            events,
            active: Arc::new(Mutex::new(HashMap::new())),
            runs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start a sync run for an account. Returns immediately; progress is
    /// observable through events and [`SyncOrchestrator::get_run`].
    #[instrument(skip(self, options))]
    pub async fn start_sync(&self, account_id: i64, options: SyncOptions) -> Result<RunId> {
        let account = self
            .accounts
            .find_by_id(AccountId(account_id))
            .await?
            .ok_or(SyncError::AccountNotFound { account_id })?;

        let run = SyncRun::new(account_id);
        let run_id = run.id;
        let token = CancellationToken::new();
        {
            let mut active = self.active.lock().await;
            if active.contains_key(&account_id) {
                return Err(SyncError::SyncInProgress { account_id });
            }
            active.insert(
                account_id,
                ActiveRun {
                    run_id,
                    token: token.clone(),
                },
            );
        }
        self.runs.write().await.insert(run_id, run);

        info!(%run_id, account_id, "Starting sync run");
        let _ = self.events.emit(CoreEvent::Sync(SyncEvent::Started {
            run_id: run_id.to_string(),
            account_id,
        }));

        let orchestrator = self.clone_for_task();
        tokio::spawn(async move {
            orchestrator
                .run_sync_task(run_id, account, options, token)
                .await;
            let mut active = orchestrator.active.lock().await;
            active.remove(&account_id);
        });

        Ok(run_id)
    }

    /// Request cancellation of an active run.
    pub async fn cancel_sync(&self, run_id: RunId) -> Result<()> {
        let active = self.active.lock().await;
        match active.values().find(|a| a.run_id == run_id) {
            Some(entry) => {
                info!(%run_id, "Cancelling sync run");
                entry.token.cancel();
                Ok(())
            }
            None => Err(SyncError::RunNotFound {
                run_id: run_id.to_string(),
            }),
        }
    }

    /// Snapshot of a run's current state.
    pub async fn get_run(&self, run_id: RunId) -> Option<SyncRun> {
        self.runs.read().await.get(&run_id).cloned()
    }

    fn clone_for_task(&self) -> Self {
        Self {
            config: self.config.clone(),
            accounts: Arc::clone(&self.accounts),
            content: Arc::clone(&self.content),
            catalog: Arc::clone(&self.catalog),
            performers: Arc::clone(&self.performers),
            studios: Arc::clone(&self.studios),
            scheduler: Arc::clone(&self.scheduler),
            job_waiter: Arc::clone(&self.job_waiter),
            events: Arc::clone(&self.events),
            active: Arc::clone(&self.active),
            runs: Arc::clone(&self.runs),
        }
    }

    async fn run_sync_task(
        &self,
        run_id: RunId,
        account: Account,
        options: SyncOptions,
        token: CancellationToken,
    ) {
        let started = Instant::now();
        self.with_run(run_id, |run| {
            if let Err(e) = run.start() {
                error!(%run_id, error = %e, "Run refused to start");
            }
        })
        .await;

        match self.execute(run_id, account, &options, &token).await {
            Ok(stats) => {
                self.with_run(run_id, |run| {
                    if let Err(e) = run.complete() {
                        error!(%run_id, error = %e, "Run refused to complete");
                    }
                })
                .await;
                info!(%run_id, attempted = stats.attempted, failed = stats.failed, "Sync run completed");
                let _ = self.events.emit(CoreEvent::Sync(SyncEvent::Completed {
                    run_id: run_id.to_string(),
                    items_processed: stats.attempted,
                    items_failed: stats.failed,
                    galleries_attached: stats.galleries_attached,
                    duration_secs: started.elapsed().as_secs(),
                }));
            }
            Err(SyncError::Cancelled) => {
                self.with_run(run_id, |run| {
                    let _ = run.cancel();
                })
                .await;
                warn!(%run_id, "Sync run cancelled");
                let _ = self.events.emit(CoreEvent::Sync(SyncEvent::Cancelled {
                    run_id: run_id.to_string(),
                }));
            }
            Err(e) => {
                let message = e.to_string();
                let mut processed = 0;
                self.with_run(run_id, |run| {
                    processed = run.progress.items_processed;
                    if let Err(e) = run.fail(message.clone()) {
                        error!(%run_id, error = %e, "Run refused to fail");
                    }
                })
                .await;
                error!(%run_id, error = %message, "Sync run failed");
                let _ = self.events.emit(CoreEvent::Sync(SyncEvent::Failed {
                    run_id: run_id.to_string(),
                    message,
                    items_processed: processed,
                }));
            }
        }
    }

    async fn execute(
        &self,
        run_id: RunId,
        account: Account,
        options: &SyncOptions,
        token: &CancellationToken,
    ) -> Result<BatchStats> {
        // A failed or slow scan only means some media resolve on a later
        // run; it never aborts the sync.
        if let Some(paths) = &options.scan_paths {
            if let Err(e) = self.scan_library(paths).await {
                warn!(error = %e, "Catalog scan failed, continuing without it");
            }
        }

        // Resolve the account's entities up front; the merge policy takes
        // the fast linked-id path afterwards.
        self.performers.resolve(&account).await?;
        self.studios.resolve(&account).await?;

        // Re-read so the processors see the freshly written remote links.
        let account = self
            .accounts
            .find_by_id(account.id)
            .await?
            .ok_or(SyncError::AccountNotFound {
                account_id: account.id.0,
            })?;

        let ctx = BatchContext {
            run_id: run_id.to_string(),
            account: Arc::new(account),
        };

        let mut totals = BatchStats::default();
        for (kind, batch_size) in [
            (ContentKind::Post, self.config.post_batch_size),
            (ContentKind::Message, self.config.message_batch_size),
        ] {
            let items = self
                .content
                .find_for_account(ctx.account.id, kind)
                .await?;
            let phase = match kind {
                ContentKind::Post => "posts",
                ContentKind::Message => "messages",
            };
            self.with_run(run_id, |run| {
                run.progress.items_discovered += items.len() as u64;
                run.progress.phase = phase.to_string();
                run.progress.update();
            })
            .await;

            let stats = self
                .scheduler
                .run(kind, items, batch_size, &ctx, token)
                .await?;

            totals.attempted += stats.attempted;
            totals.succeeded += stats.succeeded;
            totals.failed += stats.failed;
            totals.galleries_attached += stats.galleries_attached;
            self.with_run(run_id, |run| {
                run.progress.items_processed = totals.attempted;
                run.progress.items_failed = totals.failed;
                run.progress.galleries_attached = totals.galleries_attached;
                run.progress.update();
            })
            .await;
        }

        Ok(totals)
    }

    /// Ask the catalog to index the given paths and wait for the scan. A
    /// slow or failed scan is logged and the run proceeds: media the scan
    /// would have indexed simply resolves to nothing this time.
    async fn scan_library(&self, paths: &[String]) -> Result<()> {
        let job_id = self.catalog.metadata_scan(paths).await?;
        info!(job_id, "Catalog scan started");
        let timeout = Duration::from_secs(self.config.job_wait_timeout_secs);
        match self
            .job_waiter
            .wait(&job_id, JobStatus::Finished, timeout)
            .await?
        {
            Some(true) => info!(job_id, "Catalog scan finished"),
            Some(false) => warn!(job_id, "Catalog scan did not finish in time"),
            None => warn!(job_id, "Catalog scan job vanished"),
        }
        Ok(())
    }

    async fn with_run<F>(&self, run_id: RunId, f: F)
    where
        F: FnOnce(&mut SyncRun),
    {
        let mut runs = self.runs.write().await;
        if let Some(run) = runs.get_mut(&run_id) {
            f(run);
        }
    }
}
