//! Batch download orchestration.
//!
//! A [`Downloader`] walks a descriptor's items strictly in order: one
//! conversion call, one save, a short pause, next item. Cancellation is
//! checked before every item, aborts the transfer in flight and cuts the
//! pause short. Every item ends up in the summary, whether it was saved,
//! failed, or never attempted.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::{ConversionApi, HttpConversionClient, TransferRequest};
use crate::config::{AppConfig, DownloadConfig};
use crate::error::{Error, Result};
use crate::materialize::{FileMaterializer, derive_filename};
use crate::model::{
    Descriptor, DownloadOutcome, DownloadRequest, ItemDescriptor, OutcomeResult, SkipReason,
};
use crate::policy::{ActionGate, GateDecision, OpenGate, QualityPolicy, TierPolicy};
use crate::session::{ProgressSnapshot, SessionController, SessionHandle, SessionSummary};
use crate::stats::ItemStats;

/// Trait for receiving download progress updates.
///
/// All methods have default no-op implementations for convenience.
pub trait DownloadProgress: Send + Sync {
    /// Called once the session has begun.
    fn on_session_start(&self, _total: usize) {}

    /// Called before the conversion call for an item is issued.
    fn on_item_start(&self, _index: usize, _item: &ItemDescriptor) {}

    /// Called when an item has been saved.
    fn on_item_saved(&self, _index: usize, _path: &Path, _stats: &ItemStats) {}

    /// Called when an item could not be transferred or saved.
    fn on_item_failed(&self, _index: usize, _item: &ItemDescriptor, _reason: &str) {}

    /// Called for items cancelled in flight or never attempted.
    fn on_item_skipped(&self, _index: usize, _item: &ItemDescriptor, _reason: SkipReason) {}

    /// Called after each recorded outcome with the aggregate counts.
    fn on_progress(&self, _snapshot: ProgressSnapshot) {}

    /// Called with the final summary.
    fn on_finished(&self, _summary: &SessionSummary) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl DownloadProgress for NoProgress {}

/// Progress of a spawned run, as delivered by [`DownloadHandle`].
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    Started {
        total: usize,
    },
    ItemStarted {
        index: usize,
        item: ItemDescriptor,
    },
    ItemSaved {
        index: usize,
        path: PathBuf,
        bytes: u64,
        elapsed: Duration,
    },
    ItemFailed {
        index: usize,
        item: ItemDescriptor,
        reason: String,
    },
    ItemSkipped {
        index: usize,
        item: ItemDescriptor,
        reason: SkipReason,
    },
    Progress(ProgressSnapshot),
    Finished(SessionSummary),
}

/// Forwards progress callbacks into a channel.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<DownloadEvent>,
}

impl ChannelProgress {
    #[must_use]
    pub const fn new(tx: mpsc::UnboundedSender<DownloadEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: DownloadEvent) {
        // The receiver may already be gone; the run continues regardless.
        let _ = self.tx.send(event);
    }
}

impl DownloadProgress for ChannelProgress {
    fn on_session_start(&self, total: usize) {
        self.send(DownloadEvent::Started { total });
    }

    fn on_item_start(&self, index: usize, item: &ItemDescriptor) {
        self.send(DownloadEvent::ItemStarted {
            index,
            item: item.clone(),
        });
    }

    fn on_item_saved(&self, index: usize, path: &Path, stats: &ItemStats) {
        self.send(DownloadEvent::ItemSaved {
            index,
            path: path.to_path_buf(),
            bytes: stats.bytes,
            elapsed: stats.elapsed,
        });
    }

    fn on_item_failed(&self, index: usize, item: &ItemDescriptor, reason: &str) {
        self.send(DownloadEvent::ItemFailed {
            index,
            item: item.clone(),
            reason: reason.to_string(),
        });
    }

    fn on_item_skipped(&self, index: usize, item: &ItemDescriptor, reason: SkipReason) {
        self.send(DownloadEvent::ItemSkipped {
            index,
            item: item.clone(),
            reason,
        });
    }

    fn on_progress(&self, snapshot: ProgressSnapshot) {
        self.send(DownloadEvent::Progress(snapshot));
    }

    fn on_finished(&self, summary: &SessionSummary) {
        self.send(DownloadEvent::Finished(summary.clone()));
    }
}

/// A run started with [`Downloader::start`].
#[derive(Debug)]
pub struct DownloadHandle {
    token: CancellationToken,
    events: mpsc::UnboundedReceiver<DownloadEvent>,
    task: JoinHandle<Result<SessionSummary>>,
}

impl DownloadHandle {
    /// Requests cooperative cancellation of the run.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Next progress event, or `None` once the run is over.
    pub async fn next_event(&mut self) -> Option<DownloadEvent> {
        self.events.recv().await
    }

    /// Progress events as a stream.
    pub fn events(&mut self) -> impl Stream<Item = DownloadEvent> + '_ {
        futures::stream::poll_fn(move |cx| self.events.poll_recv(cx))
    }

    /// Waits for the run to end.
    ///
    /// # Errors
    ///
    /// Returns the error that prevented the session from starting, or
    /// [`Error::Cancelled`] if the task was aborted.
    pub async fn wait(self) -> Result<SessionSummary> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(Error::Cancelled),
        }
    }
}

/// Abandons the session if the run ends without finishing it.
struct SessionGuard<'a> {
    sessions: &'a SessionController,
    handle: Option<SessionHandle>,
}

impl<'a> SessionGuard<'a> {
    const fn new(sessions: &'a SessionController, handle: SessionHandle) -> Self {
        Self {
            sessions,
            handle: Some(handle),
        }
    }

    fn disarm(&mut self) {
        self.handle = None;
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.sessions.abandon(&handle);
        }
    }
}

/// Drives download sessions against a [`ConversionApi`].
#[derive(Clone)]
pub struct Downloader {
    api: Arc<dyn ConversionApi>,
    materializer: FileMaterializer,
    sessions: Arc<SessionController>,
    config: DownloadConfig,
    policy: Arc<dyn QualityPolicy>,
    gate: Arc<dyn ActionGate>,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("materializer", &self.materializer)
            .field("sessions", &self.sessions)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Downloader {
    /// Creates a downloader with the default tier policy and an open gate.
    #[must_use]
    pub fn new(
        api: Arc<dyn ConversionApi>,
        materializer: FileMaterializer,
        config: DownloadConfig,
    ) -> Self {
        Self {
            api,
            materializer,
            sessions: Arc::new(SessionController::new()),
            config,
            policy: Arc::new(TierPolicy),
            gate: Arc::new(OpenGate),
        }
    }

    /// Creates a downloader talking HTTP to the configured service.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api = HttpConversionClient::new(&config.api)?;
        let materializer = FileMaterializer::new(&config.paths.download_dir)
            .with_force_overwrite(config.download.force_overwrite);
        Ok(Self::new(
            Arc::new(api),
            materializer,
            config.download.clone(),
        ))
    }

    /// Replaces the quality policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn QualityPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the pre-action hook.
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<dyn ActionGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Shares a session controller with other downloaders.
    #[must_use]
    pub fn with_sessions(mut self, sessions: Arc<SessionController>) -> Self {
        self.sessions = sessions;
        self
    }

    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionController> {
        &self.sessions
    }

    #[must_use]
    pub const fn config(&self) -> &DownloadConfig {
        &self.config
    }

    #[must_use]
    pub const fn materializer(&self) -> &FileMaterializer {
        &self.materializer
    }

    /// Cancels the active session, if any.
    pub fn cancel(&self) -> bool {
        self.sessions.cancel_active()
    }

    /// Downloads every item of `descriptor` and reports how it went.
    ///
    /// Per-item failures are recorded in the summary and never abort the
    /// batch.
    ///
    /// # Errors
    ///
    /// Fails before any transfer with [`Error::QualityNotAllowed`],
    /// [`Error::EmptyBatch`], [`Error::ActionDeferred`] or
    /// [`Error::SessionAlreadyActive`].
    pub async fn run(
        &self,
        descriptor: &Descriptor,
        request: &DownloadRequest,
        progress: &dyn DownloadProgress,
    ) -> Result<SessionSummary> {
        self.execute(descriptor, request, progress, None).await
    }

    /// Like [`run`](Self::run), but also stops when `token` is cancelled.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub async fn run_until_cancelled(
        &self,
        descriptor: &Descriptor,
        request: &DownloadRequest,
        progress: &dyn DownloadProgress,
        token: &CancellationToken,
    ) -> Result<SessionSummary> {
        self.execute(descriptor, request, progress, Some(token))
            .await
    }

    /// Spawns a run and returns a handle for events and cancellation.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn start(&self, descriptor: Descriptor, request: DownloadRequest) -> DownloadHandle {
        let (tx, events) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let downloader = self.clone();
        let run_token = token.clone();
        let task = tokio::spawn(async move {
            let progress = ChannelProgress::new(tx);
            downloader
                .execute(&descriptor, &request, &progress, Some(&run_token))
                .await
        });
        DownloadHandle {
            token,
            events,
            task,
        }
    }

    async fn execute(
        &self,
        descriptor: &Descriptor,
        request: &DownloadRequest,
        progress: &dyn DownloadProgress,
        parent: Option<&CancellationToken>,
    ) -> Result<SessionSummary> {
        if !self.policy.can_use_quality(request.tier, request.selection) {
            return Err(Error::QualityNotAllowed {
                quality: request.selection.quality_name().to_string(),
                tier: request.tier,
            });
        }
        let items = descriptor.items();
        if items.is_empty() {
            return Err(Error::EmptyBatch);
        }
        if self.gate.before_action().await == GateDecision::Deferred {
            log::info!("Download deferred by pre-action hook");
            return Err(Error::ActionDeferred);
        }

        let handle = match parent {
            Some(parent) => self.sessions.begin_linked(items.len(), parent)?,
            None => self.sessions.begin(items.len())?,
        };
        let mut guard = SessionGuard::new(&self.sessions, handle.clone());
        progress.on_session_start(items.len());

        for (index, item) in items.iter().enumerate() {
            if self.sessions.is_cancelled(&handle) {
                log::info!(
                    "Cancelled before item {} of {}, skipping the rest",
                    index + 1,
                    items.len()
                );
                self.skip_remaining(&handle, &items, index, progress)?;
                break;
            }

            let result = self
                .process_item(index, item, request, &handle, progress)
                .await;
            let outcome = DownloadOutcome {
                index,
                item: item.clone(),
                result,
            };
            let snapshot = self.sessions.record_outcome(&handle, outcome)?;
            progress.on_progress(snapshot);

            if index + 1 < items.len() {
                self.pace(handle.token()).await;
            }
        }

        let summary = self.sessions.finish(&handle)?;
        guard.disarm();
        progress.on_finished(&summary);
        Ok(summary)
    }

    /// Transfers and saves one item. Never fails the batch.
    async fn process_item(
        &self,
        index: usize,
        item: &ItemDescriptor,
        request: &DownloadRequest,
        handle: &SessionHandle,
        progress: &dyn DownloadProgress,
    ) -> OutcomeResult {
        progress.on_item_start(index, item);
        let started = Instant::now();

        let transfer = TransferRequest::for_item(item, request);
        let payload = match self.transfer(&transfer, handle.token()).await {
            Ok(payload) => payload,
            Err(Error::Cancelled) => {
                log::info!("Transfer of {} aborted by cancellation", item.label());
                progress.on_item_skipped(index, item, SkipReason::Cancelled);
                return OutcomeResult::Skipped {
                    reason: SkipReason::Cancelled,
                };
            }
            Err(e) => return Self::failed(index, item, &e, progress),
        };

        let filename = derive_filename(&item.title, request.format());
        match self.materializer.save(&payload, &filename).await {
            Ok(path) => {
                let stats = ItemStats {
                    bytes: u64::try_from(payload.len()).unwrap_or(u64::MAX),
                    elapsed: started.elapsed(),
                };
                log::info!("Saved {} to {}", item.label(), path.display());
                progress.on_item_saved(index, &path, &stats);
                OutcomeResult::Saved {
                    path,
                    bytes: stats.bytes,
                }
            }
            Err(e) => Self::failed(index, item, &e, progress),
        }
    }

    fn failed(
        index: usize,
        item: &ItemDescriptor,
        error: &Error,
        progress: &dyn DownloadProgress,
    ) -> OutcomeResult {
        let reason = error.to_string();
        log::warn!("Item {} ({}) failed: {reason}", index + 1, item.label());
        progress.on_item_failed(index, item, &reason);
        OutcomeResult::TransferFailed { reason }
    }

    /// One conversion call, bounded by the optional timeout and aborted on
    /// cancellation.
    async fn transfer(&self, request: &TransferRequest, token: &CancellationToken) -> Result<Bytes> {
        let call = self.api.download(request);
        let bounded = async {
            match self.config.transfer_timeout() {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::TransferFailed {
                        item: request.url.clone(),
                        reason: format!("no response within {}s", limit.as_secs()),
                    }),
                },
                None => call.await,
            }
        };
        tokio::select! {
            biased;
            () = token.cancelled() => Err(Error::Cancelled),
            result = bounded => result,
        }
    }

    /// Pause between items. Returns early on cancellation.
    async fn pace(&self, token: &CancellationToken) {
        let delay = self.config.item_delay();
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = token.cancelled() => {}
        }
    }

    fn skip_remaining(
        &self,
        handle: &SessionHandle,
        items: &[ItemDescriptor],
        from: usize,
        progress: &dyn DownloadProgress,
    ) -> Result<()> {
        let mut last = None;
        for (index, item) in items.iter().enumerate().skip(from) {
            progress.on_item_skipped(index, item, SkipReason::NotAttempted);
            let outcome = DownloadOutcome {
                index,
                item: item.clone(),
                result: OutcomeResult::Skipped {
                    reason: SkipReason::NotAttempted,
                },
            };
            last = Some(self.sessions.record_outcome(handle, outcome)?);
        }
        if let Some(snapshot) = last {
            progress.on_progress(snapshot);
        }
        Ok(())
    }
}
