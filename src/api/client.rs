use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};

use super::ConversionApi;
use super::models::{PlaylistResponse, TransferRequest, UrlBody};
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::model::{PlaylistDescriptor, VideoMetadata};

const METADATA_PATH: &str = "/api/metadata";
const PLAYLIST_PATH: &str = "/api/playlist-videos";
const DOWNLOAD_PATH: &str = "/api/download-proxy";

/// reqwest-backed client for the conversion service.
#[derive(Debug, Clone)]
pub struct HttpConversionClient {
    http: Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpConversionClient {
    /// Builds a client with a connection pool tuned for a single backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(http, config))
    }

    /// Uses an existing HTTP client.
    #[must_use]
    pub fn with_client(http: Client, config: &ApiConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends a JSON POST and fails on any non-success status.
    async fn post<T: serde::Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: &T,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        let mut request = self.http.post(self.endpoint(path)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            log::debug!("{path} answered {status}");
            return Err(Error::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ConversionApi for HttpConversionClient {
    async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata> {
        let response = self
            .post(METADATA_PATH, &UrlBody { url }, Some(self.request_timeout))
            .await?;
        Ok(response.json().await?)
    }

    async fn fetch_playlist(&self, url: &str) -> Result<PlaylistDescriptor> {
        let response = self
            .post(PLAYLIST_PATH, &UrlBody { url }, Some(self.request_timeout))
            .await?;
        let listing: PlaylistResponse = response.json().await?;
        Ok(listing.into_descriptor())
    }

    async fn download(&self, request: &TransferRequest) -> Result<Bytes> {
        // Conversion time depends on media length, so only the caller bounds it.
        let response = self.post(DOWNLOAD_PATH, request, None).await?;
        Ok(response.bytes().await?)
    }
}
