//! Metadata resolution with supersede-in-flight semantics.
//!
//! Interactive callers resolve on every edit of an input field. Each call
//! takes a generation ticket; a response is only handed back if no newer
//! call has been issued since, so a slow answer for an old input can never
//! overwrite the answer for the current one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::api::ConversionApi;
use crate::error::{Error, Result};
use crate::model::{Descriptor, PlaylistDescriptor, VideoMetadata};
use crate::url::{UrlKind, classify};

/// A successfully resolved input.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Single {
        url: String,
        metadata: VideoMetadata,
    },
    Playlist(PlaylistDescriptor),
}

impl Resolved {
    /// Converts into the orchestrator's input.
    #[must_use]
    pub fn into_descriptor(self) -> Descriptor {
        match self {
            Self::Single { url, metadata } => Descriptor::Single(metadata.to_item(&url)),
            Self::Playlist(playlist) => Descriptor::Playlist(playlist),
        }
    }
}

/// Generation number of one resolution call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Resolves URLs into descriptors through a [`ConversionApi`].
pub struct MetadataResolver {
    api: Arc<dyn ConversionApi>,
    latest: AtomicU64,
}

impl MetadataResolver {
    #[must_use]
    pub fn new(api: Arc<dyn ConversionApi>) -> Self {
        Self {
            api,
            latest: AtomicU64::new(0),
        }
    }

    /// Describes a single item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MetadataUnavailable`] if the service call fails.
    pub async fn resolve_single(&self, url: &str) -> Result<VideoMetadata> {
        self.api.fetch_metadata(url).await.map_err(|e| {
            log::warn!("Metadata lookup failed for {url}: {e}");
            Error::MetadataUnavailable(e.to_string())
        })
    }

    /// Lists a playlist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PlaylistUnavailable`] if the service call fails.
    pub async fn resolve_playlist(&self, url: &str) -> Result<PlaylistDescriptor> {
        self.api.fetch_playlist(url).await.map_err(|e| {
            log::warn!("Playlist lookup failed for {url}: {e}");
            Error::PlaylistUnavailable(e.to_string())
        })
    }

    /// Classifies `raw` and resolves it the matching way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] for unusable input, otherwise the error of
    /// the matching resolve call.
    pub async fn resolve(&self, raw: &str) -> Result<Resolved> {
        let url = raw.trim();
        match classify(url) {
            UrlKind::Invalid => Err(Error::InvalidUrl(url.to_string())),
            UrlKind::SingleItem => Ok(Resolved::Single {
                url: url.to_string(),
                metadata: self.resolve_single(url).await?,
            }),
            UrlKind::Playlist => Ok(Resolved::Playlist(self.resolve_playlist(url).await?)),
        }
    }

    /// Issues a new ticket, superseding every earlier one.
    pub fn issue_ticket(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Whether `ticket` is still the most recent one.
    #[must_use]
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.0
    }

    /// Resolves `raw` unless a newer call supersedes it.
    ///
    /// Returns `Ok(None)` when the result is stale and must be discarded.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve), reported only for a current call.
    pub async fn resolve_latest(&self, raw: &str) -> Result<Option<Resolved>> {
        let ticket = self.issue_ticket();
        self.finish_if_current(ticket, raw).await
    }

    /// Waits for `quiet` and then resolves, unless superseded meanwhile.
    ///
    /// Empty input supersedes earlier calls and yields `Ok(None)` without
    /// contacting the service.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve), reported only for a current call.
    pub async fn resolve_debounced(&self, raw: &str, quiet: Duration) -> Result<Option<Resolved>> {
        let ticket = self.issue_ticket();
        if raw.trim().is_empty() {
            return Ok(None);
        }
        tokio::time::sleep(quiet).await;
        if !self.is_current(ticket) {
            log::debug!("Input changed during quiet period, dropping {raw}");
            return Ok(None);
        }
        self.finish_if_current(ticket, raw).await
    }

    async fn finish_if_current(&self, ticket: Ticket, raw: &str) -> Result<Option<Resolved>> {
        let result = self.resolve(raw).await;
        if !self.is_current(ticket) {
            log::debug!("Discarding stale resolution for {raw}");
            return Ok(None);
        }
        result.map(Some)
    }
}
