//! Wire types for the conversion service.

use serde::{Deserialize, Serialize};

use crate::model::{DownloadRequest, ItemDescriptor, MediaFormat, PlaylistDescriptor};

/// Body of the metadata and playlist listing calls.
#[derive(Debug, Clone, Serialize)]
pub struct UrlBody<'a> {
    pub url: &'a str,
}

/// Body of the conversion call for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub url: String,
    pub format: MediaFormat,
    /// Video resolution such as `720p`; `null` for audio.
    pub resolution: Option<String>,
    /// Audio bitrate such as `128k`; `null` for video.
    pub audio_quality: Option<String>,
    pub is_premium: bool,
}

impl TransferRequest {
    /// Builds the conversion call for `item` with the selection from `request`.
    #[must_use]
    pub fn for_item(item: &ItemDescriptor, request: &DownloadRequest) -> Self {
        Self {
            url: item.source_url.clone(),
            format: request.format(),
            resolution: request
                .selection
                .video_quality()
                .map(|q| q.as_str().to_string()),
            audio_quality: request
                .selection
                .audio_quality()
                .map(|q| q.as_str().to_string()),
            is_premium: request.tier.is_premium(),
        }
    }
}

/// Response from the playlist listing endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistResponse {
    #[serde(default)]
    pub playlist_title: Option<String>,
    #[serde(default)]
    pub total_videos: Option<usize>,
    #[serde(default)]
    pub videos: Vec<PlaylistEntry>,
}

/// One entry of a playlist listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl PlaylistResponse {
    /// Normalizes the listing, dropping entries without a URL.
    ///
    /// The returned count always matches the kept items, whatever the service
    /// reported as its total.
    #[must_use]
    pub fn into_descriptor(self) -> PlaylistDescriptor {
        let reported = self.total_videos;
        let items: Vec<ItemDescriptor> = self
            .videos
            .into_iter()
            .enumerate()
            .filter_map(|(i, entry)| {
                let Some(url) = entry.url.filter(|u| !u.trim().is_empty()) else {
                    log::warn!("Playlist entry {} has no URL, skipping", i + 1);
                    return None;
                };
                let id = entry
                    .id
                    .filter(|id| !id.trim().is_empty())
                    .unwrap_or_else(|| crate::url::item_id(&url));
                Some(ItemDescriptor {
                    id,
                    title: entry.title.unwrap_or_default().trim().to_string(),
                    source_url: url,
                })
            })
            .collect();

        if let Some(reported) = reported
            && reported != items.len()
        {
            log::warn!(
                "Playlist reported {reported} videos but listed {}",
                items.len()
            );
        }

        let title = self
            .playlist_title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled playlist".to_string());
        PlaylistDescriptor::new(title, items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AudioQuality, EntitlementTier, MediaSelection, VideoQuality};

    #[test]
    fn transfer_request_for_audio() {
        let item = ItemDescriptor::new("a", "A", "https://example.com/watch?v=a");
        let request = DownloadRequest::new(
            "https://example.com/watch?v=a",
            MediaSelection::Audio(AudioQuality::K320),
            EntitlementTier::Premium,
        );
        let body = serde_json::to_value(TransferRequest::for_item(&item, &request)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "url": "https://example.com/watch?v=a",
                "format": "audio",
                "resolution": null,
                "audioQuality": "320k",
                "isPremium": true
            })
        );
    }

    #[test]
    fn transfer_request_for_video() {
        let item = ItemDescriptor::new("a", "A", "https://example.com/watch?v=a");
        let request = DownloadRequest::new(
            "https://example.com/playlist?list=x",
            MediaSelection::Video(VideoQuality::P480),
            EntitlementTier::Free,
        );
        let body = TransferRequest::for_item(&item, &request);
        assert_eq!(body.url, "https://example.com/watch?v=a");
        assert_eq!(body.resolution.as_deref(), Some("480p"));
        assert_eq!(body.audio_quality, None);
        assert!(!body.is_premium);
    }

    #[test]
    fn playlist_response_normalizes() {
        let response: PlaylistResponse = serde_json::from_str(
            r#"{
                "playlistTitle": "Road trip",
                "totalVideos": 3,
                "videos": [
                    {"id": "a", "title": "First", "url": "https://example.com/watch?v=a"},
                    {"title": "No url"},
                    {"title": "Second", "url": "https://example.com/watch?v=b"}
                ]
            }"#,
        )
        .unwrap();
        let playlist = response.into_descriptor();
        assert_eq!(playlist.title, "Road trip");
        assert_eq!(playlist.total_count, 2);
        assert_eq!(playlist.items[0].id, "a");
        assert_eq!(playlist.items[1].id, "b");
        assert_eq!(playlist.items[1].title, "Second");
    }

    #[test]
    fn playlist_response_defaults_title() {
        let playlist = PlaylistResponse::default().into_descriptor();
        assert_eq!(playlist.title, "Untitled playlist");
        assert!(playlist.is_empty());
    }
}
