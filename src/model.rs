//! Descriptors, download requests and per-item outcomes.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::format::{format_clock, format_upload_date, format_views};

/// Container the conversion backend produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    /// MP4 video.
    Video,
    /// MP3 audio.
    Audio,
}

impl MediaFormat {
    /// Name sent to the conversion endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }

    /// File extension of the saved payload.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Video => "mp4",
            Self::Audio => "mp3",
        }
    }

    /// Filename stem used when an item has no usable title.
    #[must_use]
    pub const fn fallback_stem(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output resolution for video downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum VideoQuality {
    P480,
    #[default]
    P720,
    P1080,
    P1440,
    P2160,
    /// Whatever the source offers at its highest.
    Best,
}

impl VideoQuality {
    pub const ALL: [Self; 6] = [
        Self::P480,
        Self::P720,
        Self::P1080,
        Self::P1440,
        Self::P2160,
        Self::Best,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::P480 => "480p",
            Self::P720 => "720p",
            Self::P1080 => "1080p",
            Self::P1440 => "1440p",
            Self::P2160 => "2160p",
            Self::Best => "best",
        }
    }
}

impl fmt::Display for VideoQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoQuality {
    type Err = Error;

    /// Accepts `720`, `720p` or `720P` style names as well as `best`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let normalized = normalized.strip_suffix('p').unwrap_or(&normalized);
        match normalized {
            "480" => Ok(Self::P480),
            "720" => Ok(Self::P720),
            "1080" => Ok(Self::P1080),
            "1440" => Ok(Self::P1440),
            "2160" | "4k" => Ok(Self::P2160),
            "best" => Ok(Self::Best),
            _ => Err(Error::UnknownQuality(s.to_string())),
        }
    }
}

/// Bitrate for audio downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum AudioQuality {
    #[default]
    K128,
    K192,
    K256,
    K320,
    Max,
}

impl AudioQuality {
    pub const ALL: [Self; 5] = [Self::K128, Self::K192, Self::K256, Self::K320, Self::Max];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::K128 => "128k",
            Self::K192 => "192k",
            Self::K256 => "256k",
            Self::K320 => "320k",
            Self::Max => "max",
        }
    }
}

impl fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioQuality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let normalized = normalized.strip_suffix('k').unwrap_or(&normalized);
        match normalized {
            "128" => Ok(Self::K128),
            "192" => Ok(Self::K192),
            "256" => Ok(Self::K256),
            "320" => Ok(Self::K320),
            "max" => Ok(Self::Max),
            _ => Err(Error::UnknownQuality(s.to_string())),
        }
    }
}

/// Format plus the quality that applies to it.
///
/// A video quality can only accompany a video download and an audio quality
/// only an audio download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSelection {
    Video(VideoQuality),
    Audio(AudioQuality),
}

impl MediaSelection {
    #[must_use]
    pub const fn format(self) -> MediaFormat {
        match self {
            Self::Video(_) => MediaFormat::Video,
            Self::Audio(_) => MediaFormat::Audio,
        }
    }

    #[must_use]
    pub const fn video_quality(self) -> Option<VideoQuality> {
        match self {
            Self::Video(q) => Some(q),
            Self::Audio(_) => None,
        }
    }

    #[must_use]
    pub const fn audio_quality(self) -> Option<AudioQuality> {
        match self {
            Self::Audio(q) => Some(q),
            Self::Video(_) => None,
        }
    }

    /// Wire name of the selected quality.
    #[must_use]
    pub const fn quality_name(self) -> &'static str {
        match self {
            Self::Video(q) => q.as_str(),
            Self::Audio(q) => q.as_str(),
        }
    }
}

impl Default for MediaSelection {
    fn default() -> Self {
        Self::Video(VideoQuality::default())
    }
}

/// Subscription level of the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementTier {
    #[default]
    Free,
    Premium,
}

impl EntitlementTier {
    #[must_use]
    pub const fn is_premium(self) -> bool {
        matches!(self, Self::Premium)
    }
}

impl fmt::Display for EntitlementTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => f.write_str("free"),
            Self::Premium => f.write_str("premium"),
        }
    }
}

/// What the user asked for. Not modified once a transfer has started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub target_url: String,
    pub selection: MediaSelection,
    pub tier: EntitlementTier,
}

impl DownloadRequest {
    #[must_use]
    pub fn new(target_url: impl Into<String>, selection: MediaSelection, tier: EntitlementTier) -> Self {
        Self {
            target_url: target_url.into(),
            selection,
            tier,
        }
    }

    #[must_use]
    pub const fn format(&self) -> MediaFormat {
        self.selection.format()
    }
}

/// One downloadable unit, standalone or a playlist member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "url")]
    pub source_url: String,
}

impl ItemDescriptor {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            source_url: source_url.into(),
        }
    }

    /// Title if present, otherwise the id.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}

/// Ordered playlist listing. `total_count` always equals `items.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistDescriptor {
    pub title: String,
    pub total_count: usize,
    pub items: Vec<ItemDescriptor>,
}

impl PlaylistDescriptor {
    #[must_use]
    pub fn new(title: impl Into<String>, items: Vec<ItemDescriptor>) -> Self {
        Self {
            title: title.into(),
            total_count: items.len(),
            items,
        }
    }

    /// Keeps only the items at the given zero-based positions, in list order.
    ///
    /// Out-of-range and repeated positions are ignored.
    #[must_use]
    pub fn select(&self, positions: &[usize]) -> Self {
        let items = self
            .items
            .iter()
            .enumerate()
            .filter(|(i, _)| positions.contains(i))
            .map(|(_, item)| item.clone())
            .collect();
        Self::new(self.title.clone(), items)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Descriptive metadata for a single item as returned by the metadata service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    /// Length in seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub views: Option<u64>,
    /// `YYYYMMDD` as reported by the service.
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl VideoMetadata {
    #[must_use]
    pub fn display_title(&self) -> &str {
        non_blank(self.title.as_deref()).unwrap_or("Unknown title")
    }

    #[must_use]
    pub fn display_uploader(&self) -> &str {
        non_blank(self.uploader.as_deref())
            .or_else(|| non_blank(self.channel.as_deref()))
            .unwrap_or("Unknown")
    }

    #[must_use]
    pub fn display_duration(&self) -> String {
        format_clock(self.duration)
    }

    #[must_use]
    pub fn display_views(&self) -> String {
        format_views(self.views)
    }

    #[must_use]
    pub fn display_upload_date(&self) -> String {
        format_upload_date(self.upload_date.as_deref())
    }

    #[must_use]
    pub fn display_description(&self) -> &str {
        non_blank(self.description.as_deref()).unwrap_or("No description")
    }

    /// Builds the descriptor the orchestrator consumes for this item.
    #[must_use]
    pub fn to_item(&self, source_url: &str) -> ItemDescriptor {
        ItemDescriptor {
            id: crate::url::item_id(source_url),
            title: non_blank(self.title.as_deref()).unwrap_or_default().to_string(),
            source_url: source_url.to_string(),
        }
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Input to a download run: one item or an ordered playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    Single(ItemDescriptor),
    Playlist(PlaylistDescriptor),
}

impl Descriptor {
    /// Normalizes into the ordered item sequence to download.
    #[must_use]
    pub fn items(&self) -> Vec<ItemDescriptor> {
        match self {
            Self::Single(item) => vec![item.clone()],
            Self::Playlist(playlist) => playlist.items.clone(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Playlist(playlist) => playlist.items.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<ItemDescriptor> for Descriptor {
    fn from(item: ItemDescriptor) -> Self {
        Self::Single(item)
    }
}

impl From<PlaylistDescriptor> for Descriptor {
    fn from(playlist: PlaylistDescriptor) -> Self {
        Self::Playlist(playlist)
    }
}

/// Why an item was not transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Cancellation aborted the item's in-flight transfer.
    Cancelled,
    /// The session stopped before reaching the item.
    NotAttempted,
}

/// Result for one item of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeResult {
    Saved { path: PathBuf, bytes: u64 },
    TransferFailed { reason: String },
    Skipped { reason: SkipReason },
}

/// Per-item record kept by the session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Position in the batch.
    pub index: usize,
    pub item: ItemDescriptor,
    pub result: OutcomeResult,
}

impl DownloadOutcome {
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        matches!(self.result, OutcomeResult::Saved { .. })
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.result, OutcomeResult::TransferFailed { .. })
    }

    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self.result, OutcomeResult::Skipped { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_quality_parses_loose_names() {
        assert_eq!("720".parse::<VideoQuality>().unwrap(), VideoQuality::P720);
        assert_eq!("1080P".parse::<VideoQuality>().unwrap(), VideoQuality::P1080);
        assert_eq!("best".parse::<VideoQuality>().unwrap(), VideoQuality::Best);
        assert!("999p".parse::<VideoQuality>().is_err());
    }

    #[test]
    fn audio_quality_parses_loose_names() {
        assert_eq!("128k".parse::<AudioQuality>().unwrap(), AudioQuality::K128);
        assert_eq!("320".parse::<AudioQuality>().unwrap(), AudioQuality::K320);
        assert_eq!("MAX".parse::<AudioQuality>().unwrap(), AudioQuality::Max);
        assert!("64k".parse::<AudioQuality>().is_err());
    }

    #[test]
    fn quality_names_round_trip() {
        for q in VideoQuality::ALL {
            assert_eq!(q.as_str().parse::<VideoQuality>().unwrap(), q);
        }
        for q in AudioQuality::ALL {
            assert_eq!(q.as_str().parse::<AudioQuality>().unwrap(), q);
        }
    }

    #[test]
    fn selection_carries_exactly_one_quality() {
        let video = MediaSelection::Video(VideoQuality::P480);
        assert_eq!(video.format(), MediaFormat::Video);
        assert_eq!(video.video_quality(), Some(VideoQuality::P480));
        assert_eq!(video.audio_quality(), None);

        let audio = MediaSelection::Audio(AudioQuality::Max);
        assert_eq!(audio.format(), MediaFormat::Audio);
        assert_eq!(audio.video_quality(), None);
        assert_eq!(audio.audio_quality(), Some(AudioQuality::Max));
    }

    #[test]
    fn playlist_total_matches_items() {
        let playlist = PlaylistDescriptor::new(
            "mix",
            vec![
                ItemDescriptor::new("a", "A", "https://example.com/watch?v=a"),
                ItemDescriptor::new("b", "B", "https://example.com/watch?v=b"),
            ],
        );
        assert_eq!(playlist.total_count, 2);
    }

    #[test]
    fn playlist_select_keeps_list_order() {
        let playlist = PlaylistDescriptor::new(
            "mix",
            vec![
                ItemDescriptor::new("a", "A", "u1"),
                ItemDescriptor::new("b", "B", "u2"),
                ItemDescriptor::new("c", "C", "u3"),
            ],
        );
        let picked = playlist.select(&[2, 0, 0, 9]);
        let ids: Vec<_> = picked.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(picked.total_count, 2);
    }

    #[test]
    fn metadata_missing_fields_use_sentinels() {
        let meta = VideoMetadata::default();
        assert_eq!(meta.display_title(), "Unknown title");
        assert_eq!(meta.display_uploader(), "Unknown");
        assert_eq!(meta.display_duration(), "Unknown");
        assert_eq!(meta.display_views(), "No data");
        assert_eq!(meta.display_upload_date(), "Unknown date");
        assert_eq!(meta.display_description(), "No description");
    }

    #[test]
    fn metadata_falls_back_to_channel() {
        let meta: VideoMetadata =
            serde_json::from_str(r#"{"title":"t","channel":"Someone","uploadDate":"20240131"}"#)
                .unwrap();
        assert_eq!(meta.display_uploader(), "Someone");
        assert_eq!(meta.display_upload_date(), "2024-01-31");
    }

    #[test]
    fn metadata_accepts_channel_and_uploader_together() {
        let meta: VideoMetadata = serde_json::from_str(
            r#"{"title":"Clip","channel":"Chan","uploader":"Uploader","duration":10}"#,
        )
        .unwrap();
        assert_eq!(meta.channel.as_deref(), Some("Chan"));
        assert_eq!(meta.display_uploader(), "Uploader");
        assert_eq!(meta.display_duration(), "0:10");
    }

    #[test]
    fn metadata_to_item_uses_video_id() {
        let meta = VideoMetadata {
            title: Some("  Song  ".to_string()),
            ..VideoMetadata::default()
        };
        let item = meta.to_item("https://example.com/watch?v=abc123");
        assert_eq!(item.id, "abc123");
        assert_eq!(item.title, "Song");
    }

    #[test]
    fn descriptor_single_is_one_element_sequence() {
        let descriptor = Descriptor::from(ItemDescriptor::new("x", "X", "u"));
        assert_eq!(descriptor.len(), 1);
        assert_eq!(descriptor.items()[0].id, "x");
    }

    #[test]
    fn item_label_falls_back_to_id() {
        assert_eq!(ItemDescriptor::new("id1", " ", "u").label(), "id1");
        assert_eq!(ItemDescriptor::new("id1", "Name", "u").label(), "Name");
    }
}
