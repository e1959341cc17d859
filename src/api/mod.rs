//! Boundary to the external metadata and conversion service.

mod client;
pub mod models;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::model::{PlaylistDescriptor, VideoMetadata};

pub use client::HttpConversionClient;
pub use models::TransferRequest;

/// Calls the conversion backend makes available.
///
/// Every method issues exactly one outbound request and never retries.
#[async_trait]
pub trait ConversionApi: Send + Sync {
    /// Describes a single item.
    async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata>;

    /// Lists the items of a playlist in order.
    async fn fetch_playlist(&self, url: &str) -> Result<PlaylistDescriptor>;

    /// Converts one item and returns the finished payload.
    async fn download(&self, request: &TransferRequest) -> Result<Bytes>;
}
