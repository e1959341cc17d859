//! Error types for the media-dl library.

use thiserror::Error;

use crate::model::EntitlementTier;

/// Errors that can occur while resolving or downloading media.
#[derive(Error, Debug)]
pub enum Error {
    /// The input is empty or not a well-formed URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The metadata service could not describe a single item.
    #[error("Video info unavailable: {0}")]
    MetadataUnavailable(String),

    /// The metadata service could not list a playlist.
    #[error("Playlist unavailable: {0}")]
    PlaylistUnavailable(String),

    /// The conversion endpoint did not deliver a payload for one item.
    #[error("Transfer failed for {item}: {reason}")]
    TransferFailed {
        /// Title or id of the item.
        item: String,
        /// What went wrong.
        reason: String,
    },

    /// The session was cancelled before the operation could finish.
    #[error("Download cancelled")]
    Cancelled,

    /// A received payload could not be persisted.
    #[error("Failed to save {filename}: {source}")]
    MaterializationFailed {
        /// Filename that was being written.
        filename: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A session is already running; only one may be active at a time.
    #[error("A download session is already active")]
    SessionAlreadyActive,

    /// The handle does not refer to the active session.
    #[error("Unknown or finished download session")]
    UnknownSession,

    /// The selected quality is not available for the entitlement tier.
    #[error("Quality {quality} is not available on the {tier} tier")]
    QualityNotAllowed {
        /// Wire name of the rejected quality.
        quality: String,
        /// Tier of the requester.
        tier: EntitlementTier,
    },

    /// The pre-action hook asked to defer the download.
    #[error("Download deferred by pre-action hook")]
    ActionDeferred,

    /// A quality name that is not part of the vocabulary.
    #[error("Unknown quality: {0}")]
    UnknownQuality(String),

    /// Nothing to download.
    #[error("No items to download")]
    EmptyBatch,

    /// The service answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        /// Endpoint path that was called.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A specialized `Result` type for media-dl operations.
pub type Result<T> = std::result::Result<T, Error>;
