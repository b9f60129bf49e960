//! Playback surface abstraction
//!
//! A surface is whatever actually renders media: a native media
//! element, an adaptive-streaming client bridged into the same event
//! vocabulary, or an embedded platform player. The core drives it
//! through [`PlaybackSurface`] and reacts to its [`SurfaceEvent`]
//! stream; nothing platform-specific crosses this boundary.
//!
//! Capabilities are resolved once at startup into a
//! [`SurfaceCapabilities`] descriptor so call sites branch on data,
//! never on vendor probing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::SurfaceError;
use crate::source::Source;
use crate::timecode::TimeRanges;
use crate::types::CaptionTrack;

mod embed;
mod simulated;

pub use embed::EmbedSurface;
pub use simulated::SimulatedSurface;

/// What a surface can actually do, resolved once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceCapabilities {
    /// Fullscreen requests can succeed
    pub fullscreen: bool,
    /// Picture-in-picture requests can succeed
    pub pip: bool,
    /// Position/duration/buffered readings are genuine rather than
    /// approximate play-intent tracking
    pub precise_tracking: bool,
}

/// Native event vocabulary every surface translates into
///
/// The bridge consumes exactly this set; surfaces map their platform's
/// events onto it and the core never sees anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceEvent {
    /// Source attached, fetching began
    LoadStart,
    /// Duration and track layout are known
    LoadedMetadata { duration: f64 },
    /// First frame decoded
    LoadedData,
    /// Enough data to begin playback
    CanPlay,
    /// Playback was requested and accepted
    Play,
    /// Frames are advancing (fires on start and after every stall)
    Playing,
    Pause,
    Ended,
    TimeUpdate { position: f64 },
    DurationChange { duration: f64 },
    /// Buffered ranges grew
    Progress { buffered: TimeRanges },
    /// Playback stalled waiting for data
    Waiting,
    Seeking,
    Seeked { position: f64 },
    VolumeChange { volume: f64, muted: bool },
    RateChange { rate: f64 },
    Error { code: String, message: String },
    FullscreenChange { active: bool },
    PipChange { active: bool },
}

/// Handle to a playback surface
///
/// Mutating calls apply best-effort; the authoritative outcome arrives
/// through the event stream. Only `play` reports rejection directly,
/// because platforms refuse it synchronously enough to matter.
#[async_trait]
pub trait PlaybackSurface: Send + Sync {
    /// Capability descriptor for this surface
    fn capabilities(&self) -> SurfaceCapabilities;

    /// Subscribe to the surface's event stream
    fn events(&self) -> broadcast::Receiver<SurfaceEvent>;

    /// Attach a source; progress and failure arrive as events
    fn load(&self, source: &Source);

    /// Request playback start
    async fn play(&self) -> Result<(), SurfaceError>;

    /// Halt playback; synchronous, cannot fail silently
    fn pause(&self);

    /// Move the playhead; out-of-range targets are clamped by the caller
    fn seek(&self, position: f64);

    fn set_volume(&self, volume: f64);

    fn set_muted(&self, muted: bool);

    fn set_rate(&self, rate: f64);

    /// Show exactly one caption track, or hide all with `None`
    fn show_caption(&self, index: Option<usize>);

    fn paused(&self) -> bool;

    fn muted(&self) -> bool;

    /// Content duration in seconds, 0 while unknown
    fn duration(&self) -> f64;

    fn buffered(&self) -> TimeRanges;

    fn caption_tracks(&self) -> Vec<CaptionTrack>;

    /// Ask the platform to enter or leave fullscreen; confirmation
    /// arrives as a [`SurfaceEvent::FullscreenChange`]
    async fn request_fullscreen(&self, active: bool) -> Result<(), SurfaceError>;

    /// Ask the platform to enter or leave picture-in-picture
    async fn request_pip(&self, active: bool) -> Result<(), SurfaceError>;
}
