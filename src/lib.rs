//! media-dl - A library for resolving and downloading media through a
//! conversion service.
//!
//! A URL is classified as a single item or a playlist, described by the
//! metadata service, and then downloaded item by item. Each converted payload
//! is saved into the download directory. Progress, cancellation and the final
//! summary go through one session at a time.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use media_dl::{
//!     AppConfig, Downloader, DownloadRequest, HttpConversionClient, MediaSelection,
//!     AudioQuality, EntitlementTier, MetadataResolver, NoProgress,
//! };
//!
//! # async fn example() -> media_dl::Result<()> {
//! let config = AppConfig::load()?;
//! let api = Arc::new(HttpConversionClient::new(&config.api)?);
//!
//! // Describe what the URL points at
//! let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
//! let resolved = MetadataResolver::new(api.clone()).resolve(url).await?;
//!
//! // Download it as audio
//! let downloader = Downloader::from_config(&config)?;
//! let request = DownloadRequest::new(
//!     url,
//!     MediaSelection::Audio(AudioQuality::K128),
//!     EntitlementTier::Free,
//! );
//! let summary = downloader
//!     .run(&resolved.into_descriptor(), &request, &NoProgress)
//!     .await?;
//! println!("{}", summary.message());
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod api;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod format;
pub mod fs;
pub mod materialize;
pub mod model;
pub mod policy;
pub mod resolver;
pub mod session;
pub mod stats;
pub mod url;

// Re-export main types for convenience
pub use api::{ConversionApi, HttpConversionClient, TransferRequest};
pub use config::{ApiConfig, AppConfig, DownloadConfig, PathConfig};
pub use download::{
    ChannelProgress, DownloadEvent, DownloadHandle, DownloadProgress, Downloader, NoProgress,
};
pub use error::{Error, Result};
pub use format::{format_bytes, format_duration};
pub use fs::{FileSystem, TokioFileSystem};
pub use materialize::{FileMaterializer, derive_filename, sanitize_filename};
pub use model::{
    AudioQuality, Descriptor, DownloadOutcome, DownloadRequest, EntitlementTier, ItemDescriptor,
    MediaFormat, MediaSelection, OutcomeResult, PlaylistDescriptor, SkipReason, VideoMetadata,
    VideoQuality,
};
pub use policy::{ActionGate, GateDecision, OpenGate, QualityPolicy, TierPolicy, Unrestricted};
pub use resolver::{MetadataResolver, Resolved};
pub use session::{
    ProgressSnapshot, SessionController, SessionHandle, SessionState, SessionSummary,
};
pub use stats::{ItemStats, SessionStats};
pub use crate::url::{UrlKind, classify};
