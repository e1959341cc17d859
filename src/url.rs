//! URL classification and item id extraction.

use std::sync::LazyLock;

use regex::Regex;
use ::url::{Host, Url};

/// Matches a `list=` query/fragment parameter or a `/playlist` path segment.
static PLAYLIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:[?&#;]list=[^&#\s]|/playlist(?:[/?#]|$))").expect("valid regex")
});

/// What kind of download a raw input describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlKind {
    /// Empty, whitespace-only or not a well-formed web URL.
    Invalid,
    /// A single video or track.
    SingleItem,
    /// A playlist; wins whenever a playlist marker is present.
    Playlist,
}

/// Classifies a raw user input.
///
/// Inputs without a scheme are treated as `https://`. A playlist marker
/// anywhere in a well-formed URL makes it a [`UrlKind::Playlist`], even when
/// the URL also identifies a single item.
#[must_use]
pub fn classify(raw: &str) -> UrlKind {
    let Some(url) = parse_web_url(raw) else {
        return UrlKind::Invalid;
    };
    if PLAYLIST_RE.is_match(url.as_str()) {
        UrlKind::Playlist
    } else {
        UrlKind::SingleItem
    }
}

/// Parses `raw` as an http(s) URL with a plausible host.
#[must_use]
pub fn parse_web_url(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return None;
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&candidate).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let plausible_host = match url.host()? {
        Host::Domain(domain) => {
            let domain = domain.trim_end_matches('.');
            domain == "localhost"
                || (domain.contains('.')
                    && domain
                        .split('.')
                        .all(|label| !label.is_empty() && !label.starts_with('-')))
        }
        Host::Ipv4(_) | Host::Ipv6(_) => true,
    };
    plausible_host.then_some(url)
}

/// Derives a stable id for an item URL.
///
/// Prefers the `v` query parameter, then the last path segment, then the
/// input itself.
#[must_use]
pub fn item_id(raw: &str) -> String {
    let Some(url) = parse_web_url(raw) else {
        return raw.trim().to_string();
    };
    if let Some((_, v)) = url.query_pairs().find(|(k, v)| k == "v" && !v.is_empty()) {
        return v.into_owned();
    }
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .map_or_else(|| raw.trim().to_string(), str::to_string)
}
