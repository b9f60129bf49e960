//! Core types shared across the player

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a player instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playback lifecycle phases
///
/// Exactly one phase is current at any time; the boolean convenience
/// flags on the snapshot are always derived from it, never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPhase {
    /// No content loaded, or playback stopped
    Idle,
    /// Source attached, initial data being fetched
    Loading,
    /// Content is playing
    Playing,
    /// Playback paused by the user or a plugin
    Paused,
    /// Playback stalled waiting for data
    Buffering,
    /// Playback reached the end of the content
    Ended,
    /// A fatal playback error occurred
    Error,
}

impl PlaybackPhase {
    /// Derive the convenience flags for this phase
    pub fn flags(self) -> PlaybackFlags {
        PlaybackFlags {
            is_playing: self == PlaybackPhase::Playing,
            is_paused: self == PlaybackPhase::Paused,
            is_loading: self == PlaybackPhase::Loading,
            is_buffering: self == PlaybackPhase::Buffering,
            is_ended: self == PlaybackPhase::Ended,
        }
    }

    /// True while the content is advancing or trying to advance
    pub fn is_active(self) -> bool {
        matches!(self, PlaybackPhase::Playing | PlaybackPhase::Buffering)
    }
}

impl Default for PlaybackPhase {
    fn default() -> Self {
        PlaybackPhase::Idle
    }
}

impl std::fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackPhase::Idle => write!(f, "idle"),
            PlaybackPhase::Loading => write!(f, "loading"),
            PlaybackPhase::Playing => write!(f, "playing"),
            PlaybackPhase::Paused => write!(f, "paused"),
            PlaybackPhase::Buffering => write!(f, "buffering"),
            PlaybackPhase::Ended => write!(f, "ended"),
            PlaybackPhase::Error => write!(f, "error"),
        }
    }
}

/// Boolean views of the playback phase
///
/// At most one flag is true. Consumers that only care about a single
/// facet (a play/pause button, a spinner) read these instead of
/// matching on the phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackFlags {
    pub is_playing: bool,
    pub is_paused: bool,
    pub is_loading: bool,
    pub is_buffering: bool,
    pub is_ended: bool,
}

/// Normalized playback error
///
/// Platform-specific error objects are reduced to a code/message pair
/// before they reach the store, so consumers never see raw platform
/// errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackError {
    /// Short machine-readable code (e.g. "network", "decode", "src_not_supported")
    pub code: String,
    /// Human-readable description
    pub message: String,
    /// Whether playback can continue without a new source
    pub fatal: bool,
}

impl PlaybackError {
    /// Create a fatal error
    pub fn fatal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            fatal: true,
        }
    }

    /// Create an error playback may recover from
    pub fn recoverable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            fatal: false,
        }
    }
}

impl std::fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Caption/subtitle track descriptor
///
/// Tracks are addressed by their position in the surface's track list;
/// the descriptor itself carries only presentation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionTrack {
    /// Human-readable label (e.g. "English (CC)")
    pub label: String,
    /// BCP-47 language code (e.g. "en", "es")
    pub language: String,
    /// Marked as the preferred track by the source
    pub is_default: bool,
}

impl CaptionTrack {
    pub fn new(label: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            language: language.into(),
            is_default: false,
        }
    }

    /// Mark as the preferred track
    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_flags_are_mutually_exclusive() {
        let phases = [
            PlaybackPhase::Idle,
            PlaybackPhase::Loading,
            PlaybackPhase::Playing,
            PlaybackPhase::Paused,
            PlaybackPhase::Buffering,
            PlaybackPhase::Ended,
            PlaybackPhase::Error,
        ];

        for phase in phases {
            let flags = phase.flags();
            let raised = [
                flags.is_playing,
                flags.is_paused,
                flags.is_loading,
                flags.is_buffering,
                flags.is_ended,
            ]
            .iter()
            .filter(|f| **f)
            .count();
            assert!(raised <= 1, "{phase} raised {raised} flags");
        }
    }

    #[test]
    fn playing_phase_sets_only_is_playing() {
        let flags = PlaybackPhase::Playing.flags();
        assert!(flags.is_playing);
        assert!(!flags.is_paused);
        assert!(!flags.is_buffering);
    }

    #[test]
    fn idle_and_error_raise_no_flags() {
        assert_eq!(PlaybackPhase::Idle.flags(), PlaybackFlags::default());
        assert_eq!(PlaybackPhase::Error.flags(), PlaybackFlags::default());
    }

    #[test]
    fn phase_display_is_lowercase() {
        assert_eq!(PlaybackPhase::Buffering.to_string(), "buffering");
        assert_eq!(PlaybackPhase::Ended.to_string(), "ended");
    }

    #[test]
    fn phase_serializes_snake_case() {
        let json = serde_json::to_string(&PlaybackPhase::Playing).unwrap();
        assert_eq!(json, "\"playing\"");
    }

    #[test]
    fn player_ids_are_unique() {
        assert_ne!(PlayerId::new(), PlayerId::new());
    }
}
