//! Source classification
//!
//! Maps a URL (or bare platform ID) to a [`SourceKind`] so the player
//! can choose a playback strategy before touching the network:
//!
//! - Adaptive-streaming manifest suffixes win over everything else
//! - Embed-platform URL structures are tried next, in a fixed order
//! - Anything left is treated as a plain file
//!
//! Classification is a pure string function: no network, no probing.

use serde::{Deserialize, Serialize};
use url::Url;

/// Classified kind of a playback source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Progressive file (mp4, webm, audio, anything direct)
    File,
    /// HLS manifest (.m3u8 / .m3u)
    Hls,
    /// MPEG-DASH manifest (.mpd)
    Dash,
    Youtube,
    Vimeo,
    Dailymotion,
    Facebook,
    Tiktok,
}

impl SourceKind {
    /// True for sources a native media surface plays directly
    pub fn is_native(&self) -> bool {
        matches!(self, SourceKind::File | SourceKind::Hls | SourceKind::Dash)
    }

    /// True for sources that require an embedded platform player
    pub fn is_embedded(&self) -> bool {
        !self.is_native()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::File => "file",
            SourceKind::Hls => "hls",
            SourceKind::Dash => "dash",
            SourceKind::Youtube => "youtube",
            SourceKind::Vimeo => "vimeo",
            SourceKind::Dailymotion => "dailymotion",
            SourceKind::Facebook => "facebook",
            SourceKind::Tiktok => "tiktok",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A source descriptor: the raw location plus its classified kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
}

impl Source {
    /// Explicit descriptor; the kind is taken as-is, no classification
    pub fn new(url: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    /// Classify a raw URL or bare platform ID
    pub fn classify(input: &str) -> Self {
        Self {
            url: input.to_string(),
            kind: classify(input),
        }
    }
}

impl From<&str> for Source {
    fn from(input: &str) -> Self {
        Source::classify(input)
    }
}

/// Classify a raw URL or bare platform ID into a [`SourceKind`]
pub fn classify(input: &str) -> SourceKind {
    let trimmed = input.trim();

    // Manifest suffixes take precedence over platform heuristics, so a
    // CDN path that happens to mention a platform still streams natively.
    if let Some(kind) = manifest_kind(trimmed) {
        return kind;
    }

    if let Some(kind) = parse_lenient(trimmed).as_ref().and_then(platform_kind) {
        return kind;
    }

    if let Some(kind) = bare_id_kind(trimmed) {
        return kind;
    }

    SourceKind::File
}

/// Detect adaptive-streaming manifests by path suffix
fn manifest_kind(input: &str) -> Option<SourceKind> {
    let path = strip_query_and_fragment(input).to_ascii_lowercase();
    if path.ends_with(".m3u8") || path.ends_with(".m3u") {
        Some(SourceKind::Hls)
    } else if path.ends_with(".mpd") {
        Some(SourceKind::Dash)
    } else {
        None
    }
}

/// Everything before the first `?` or `#`
fn strip_query_and_fragment(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Parse an absolute URL, retrying with an implied scheme for pasted
/// host-relative links like `youtube.com/watch?v=...`
fn parse_lenient(input: &str) -> Option<Url> {
    match Url::parse(input) {
        Ok(url) if url.has_host() => return Some(url),
        Ok(_) => return None,
        Err(_) => {}
    }
    if input.contains('.') && !input.starts_with('/') {
        if let Ok(url) = Url::parse(&format!("https://{input}")) {
            return Some(url);
        }
    }
    None
}

/// Structural platform checks, first match wins
fn platform_kind(url: &Url) -> Option<SourceKind> {
    let host = url
        .host_str()?
        .trim_start_matches("www.")
        .trim_start_matches("m.");
    let path = url.path();

    // YouTube
    if host == "youtu.be" {
        if first_segment(path).is_some() {
            return Some(SourceKind::Youtube);
        }
    }
    if host == "youtube.com" || host == "youtube-nocookie.com" || host.ends_with(".youtube.com") {
        let has_watch_id = path == "/watch" && url.query_pairs().any(|(k, _)| k == "v");
        let has_path_id = ["/embed/", "/shorts/", "/live/", "/v/"]
            .iter()
            .any(|p| path.starts_with(p) && path.len() > p.len());
        if has_watch_id || has_path_id {
            return Some(SourceKind::Youtube);
        }
    }

    // Vimeo
    if host == "vimeo.com" || host.ends_with(".vimeo.com") {
        let direct_id = first_segment(path).map(is_digits).unwrap_or(false);
        let player_id = path
            .split("/video/")
            .nth(1)
            .and_then(|rest| rest.split('/').next())
            .map(is_digits)
            .unwrap_or(false);
        if direct_id || player_id {
            return Some(SourceKind::Vimeo);
        }
    }

    // Dailymotion
    if host == "dai.ly" {
        if first_segment(path).is_some() {
            return Some(SourceKind::Dailymotion);
        }
    }
    if host == "dailymotion.com" || host.ends_with(".dailymotion.com") {
        if path.starts_with("/video/") || path.starts_with("/embed/video/") {
            return Some(SourceKind::Dailymotion);
        }
    }

    // Facebook
    if host == "fb.watch" {
        if first_segment(path).is_some() {
            return Some(SourceKind::Facebook);
        }
    }
    if host == "facebook.com" || host.ends_with(".facebook.com") {
        if path.starts_with("/watch")
            || path.contains("/videos/")
            || path == "/video.php"
            || path.starts_with("/reel/")
        {
            return Some(SourceKind::Facebook);
        }
    }

    // TikTok
    if host == "vm.tiktok.com" || host == "vt.tiktok.com" {
        if first_segment(path).is_some() {
            return Some(SourceKind::Tiktok);
        }
    }
    if host == "tiktok.com" || host.ends_with(".tiktok.com") {
        if path.contains("/video/") || path.starts_with("/embed/") {
            return Some(SourceKind::Tiktok);
        }
    }

    None
}

/// Fallback for bare platform IDs pasted without any URL around them
///
/// An 11-character YouTube-shaped token maps to YouTube, an all-digit
/// token of plausible length maps to Vimeo. Anything with path or
/// extension characters is not an ID.
fn bare_id_kind(input: &str) -> Option<SourceKind> {
    if input.is_empty() || input.contains(['/', '.', ':', '?', '#', ' ']) {
        return None;
    }
    if is_youtube_id(input) {
        return Some(SourceKind::Youtube);
    }
    if is_digits(input) && (6..=12).contains(&input.len()) {
        return Some(SourceKind::Vimeo);
    }
    None
}

fn first_segment(path: &str) -> Option<&str> {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_youtube_id(s: &str) -> bool {
    s.len() == 11
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}
