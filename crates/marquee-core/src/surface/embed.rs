//! Embedded platform surface
//!
//! Platform embeds expose almost nothing: the core can attach the
//! source, signal play/pause intent, and hear about load completion or
//! failure. Position, duration, and buffer readings stay at zero, and
//! the capability descriptor advertises the approximation through
//! `precise_tracking: false` so consumers can degrade their UI.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::SurfaceError;
use crate::source::{Source, SourceKind};
use crate::timecode::TimeRanges;
use crate::types::CaptionTrack;

use super::{PlaybackSurface, SurfaceCapabilities, SurfaceEvent};

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Default)]
struct EmbedState {
    source: Option<Source>,
    play_intent: bool,
    volume: f64,
    muted: bool,
    fullscreen: bool,
}

/// Surface wrapping an opaque embedded platform player
pub struct EmbedSurface {
    kind: SourceKind,
    state: Mutex<EmbedState>,
    events: broadcast::Sender<SurfaceEvent>,
}

impl EmbedSurface {
    pub fn new(kind: SourceKind) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            kind,
            state: Mutex::new(EmbedState {
                volume: 1.0,
                ..EmbedState::default()
            }),
            events,
        }
    }

    /// Platform this embed hosts
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Report that the embedded player finished loading
    pub fn notify_loaded(&self) {
        self.emit(SurfaceEvent::CanPlay);
    }

    /// Report that the embedded player failed to load
    pub fn notify_error(&self, code: impl Into<String>, message: impl Into<String>) {
        self.lock().play_intent = false;
        self.emit(SurfaceEvent::Error {
            code: code.into(),
            message: message.into(),
        });
    }

    fn lock(&self) -> MutexGuard<'_, EmbedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SurfaceEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl PlaybackSurface for EmbedSurface {
    fn capabilities(&self) -> SurfaceCapabilities {
        SurfaceCapabilities {
            fullscreen: true,
            pip: false,
            precise_tracking: false,
        }
    }

    fn events(&self) -> broadcast::Receiver<SurfaceEvent> {
        self.events.subscribe()
    }

    fn load(&self, source: &Source) {
        {
            let mut state = self.lock();
            state.source = Some(source.clone());
            state.play_intent = false;
        }
        self.emit(SurfaceEvent::LoadStart);
    }

    async fn play(&self) -> Result<(), SurfaceError> {
        {
            let mut state = self.lock();
            if state.play_intent {
                return Ok(());
            }
            state.play_intent = true;
        }
        self.emit(SurfaceEvent::Play);
        Ok(())
    }

    fn pause(&self) {
        {
            let mut state = self.lock();
            if !state.play_intent {
                return;
            }
            state.play_intent = false;
        }
        self.emit(SurfaceEvent::Pause);
    }

    fn seek(&self, position: f64) {
        debug!(kind = %self.kind, position, "seek ignored by embedded surface");
    }

    fn set_volume(&self, volume: f64) {
        let echo;
        {
            let mut state = self.lock();
            state.volume = volume.clamp(0.0, 1.0);
            echo = (state.volume, state.muted);
        }
        self.emit(SurfaceEvent::VolumeChange {
            volume: echo.0,
            muted: echo.1,
        });
    }

    fn set_muted(&self, muted: bool) {
        let echo;
        {
            let mut state = self.lock();
            state.muted = muted;
            echo = (state.volume, state.muted);
        }
        self.emit(SurfaceEvent::VolumeChange {
            volume: echo.0,
            muted: echo.1,
        });
    }

    fn set_rate(&self, rate: f64) {
        debug!(kind = %self.kind, rate, "rate change ignored by embedded surface");
    }

    fn show_caption(&self, _index: Option<usize>) {
        debug!(kind = %self.kind, "captions are owned by the embedded player");
    }

    fn paused(&self) -> bool {
        !self.lock().play_intent
    }

    fn muted(&self) -> bool {
        self.lock().muted
    }

    fn duration(&self) -> f64 {
        0.0
    }

    fn buffered(&self) -> TimeRanges {
        TimeRanges::new()
    }

    fn caption_tracks(&self) -> Vec<CaptionTrack> {
        Vec::new()
    }

    async fn request_fullscreen(&self, active: bool) -> Result<(), SurfaceError> {
        {
            let mut state = self.lock();
            if state.fullscreen == active {
                return Ok(());
            }
            state.fullscreen = active;
        }
        self.emit(SurfaceEvent::FullscreenChange { active });
        Ok(())
    }

    async fn request_pip(&self, _active: bool) -> Result<(), SurfaceError> {
        Err(SurfaceError::NotSupported)
    }
}
