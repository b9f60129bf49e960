//! Deterministic in-process surface
//!
//! Behaves like a well-mannered native media element without any
//! media: the driver scripts loads, playhead advancement, stalls, and
//! failures, and the surface emits the event sequences a real element
//! would. Used by the test suite and the scenario replay tool.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::config;
use crate::error::SurfaceError;
use crate::source::Source;
use crate::timecode::{clamp_time, TimeRanges};
use crate::types::CaptionTrack;

use super::{PlaybackSurface, SurfaceCapabilities, SurfaceEvent};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug)]
struct SimState {
    source: Option<Source>,
    position: f64,
    duration: f64,
    paused: bool,
    stalled: bool,
    volume: f64,
    muted: bool,
    rate: f64,
    buffered: TimeRanges,
    captions: Vec<CaptionTrack>,
    visible_caption: Option<usize>,
    fullscreen: bool,
    pip: bool,
    reject_play: Option<SurfaceError>,
    deny_fullscreen: bool,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            source: None,
            position: 0.0,
            duration: 0.0,
            paused: true,
            stalled: false,
            volume: 1.0,
            muted: false,
            rate: 1.0,
            buffered: TimeRanges::new(),
            captions: Vec::new(),
            visible_caption: None,
            fullscreen: false,
            pip: false,
            reject_play: None,
            deny_fullscreen: false,
        }
    }
}

/// Scriptable surface with native-element event semantics
pub struct SimulatedSurface {
    state: Mutex<SimState>,
    events: broadcast::Sender<SurfaceEvent>,
}

impl Default for SimulatedSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSurface {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(SimState::default()),
            events,
        }
    }

    pub fn with_caption_tracks(tracks: Vec<CaptionTrack>) -> Self {
        let surface = Self::new();
        surface.lock().captions = tracks;
        surface
    }

    /// Finish the in-flight load: metadata, first data, then ready
    pub fn complete_load(&self, duration: f64) {
        let duration = duration.max(0.0);
        self.lock().duration = duration;
        self.emit(SurfaceEvent::LoadedMetadata { duration });
        self.emit(SurfaceEvent::LoadedData);
        self.emit(SurfaceEvent::CanPlay);
    }

    /// March the playhead as if `seconds` of wall time passed
    ///
    /// Reaching the end pauses and ends playback the way a media
    /// element does: final time update, then pause, then ended.
    pub fn advance(&self, seconds: f64) {
        let mut ended = false;
        let position;
        {
            let mut state = self.lock();
            if state.paused || state.stalled {
                return;
            }
            let mut next = state.position + seconds.max(0.0) * state.rate;
            if state.duration > 0.0 && next >= state.duration {
                next = state.duration;
                state.paused = true;
                ended = true;
            }
            state.position = next;
            position = next;
        }
        self.emit(SurfaceEvent::TimeUpdate { position });
        if ended {
            self.emit(SurfaceEvent::Pause);
            self.emit(SurfaceEvent::Ended);
        }
    }

    /// Grow the buffered window to cover `0..end` seconds
    pub fn buffer_to(&self, end: f64) {
        let buffered = TimeRanges::from_pairs([(0.0, end)]);
        self.lock().buffered = buffered.clone();
        self.emit(SurfaceEvent::Progress { buffered });
    }

    /// Stall playback waiting for data
    pub fn stall(&self) {
        {
            let mut state = self.lock();
            if state.stalled {
                return;
            }
            state.stalled = true;
        }
        self.emit(SurfaceEvent::Waiting);
    }

    /// Recover from a stall and resume frame delivery
    pub fn resume(&self) {
        {
            let mut state = self.lock();
            if !state.stalled {
                return;
            }
            state.stalled = false;
        }
        self.emit(SurfaceEvent::Playing);
    }

    /// Fail playback with a platform error
    pub fn fail(&self, code: impl Into<String>, message: impl Into<String>) {
        self.lock().paused = true;
        self.emit(SurfaceEvent::Error {
            code: code.into(),
            message: message.into(),
        });
    }

    /// Make the next play request fail with `error`
    pub fn reject_next_play(&self, error: SurfaceError) {
        self.lock().reject_play = Some(error);
    }

    /// Refuse fullscreen requests from now on
    pub fn deny_fullscreen(&self) {
        self.lock().deny_fullscreen = true;
    }

    pub fn set_caption_tracks(&self, tracks: Vec<CaptionTrack>) {
        self.lock().captions = tracks;
    }

    /// Track currently shown, if any
    pub fn visible_caption(&self) -> Option<usize> {
        self.lock().visible_caption
    }

    pub fn position(&self) -> f64 {
        self.lock().position
    }

    pub fn volume(&self) -> f64 {
        self.lock().volume
    }

    pub fn rate(&self) -> f64 {
        self.lock().rate
    }

    pub fn source(&self) -> Option<Source> {
        self.lock().source.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SurfaceEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl PlaybackSurface for SimulatedSurface {
    fn capabilities(&self) -> SurfaceCapabilities {
        SurfaceCapabilities {
            fullscreen: true,
            pip: true,
            precise_tracking: true,
        }
    }

    fn events(&self) -> broadcast::Receiver<SurfaceEvent> {
        self.events.subscribe()
    }

    fn load(&self, source: &Source) {
        {
            let mut state = self.lock();
            state.source = Some(source.clone());
            state.position = 0.0;
            state.duration = 0.0;
            state.paused = true;
            state.stalled = false;
            state.buffered = TimeRanges::new();
            state.visible_caption = None;
        }
        self.emit(SurfaceEvent::LoadStart);
    }

    async fn play(&self) -> Result<(), SurfaceError> {
        let stalled;
        {
            let mut state = self.lock();
            if let Some(error) = state.reject_play.take() {
                return Err(error);
            }
            if !state.paused {
                return Ok(());
            }
            state.paused = false;
            stalled = state.stalled;
        }
        self.emit(SurfaceEvent::Play);
        if !stalled {
            self.emit(SurfaceEvent::Playing);
        }
        Ok(())
    }

    fn pause(&self) {
        {
            let mut state = self.lock();
            if state.paused {
                return;
            }
            state.paused = true;
        }
        self.emit(SurfaceEvent::Pause);
    }

    fn seek(&self, position: f64) {
        let settled;
        {
            let mut state = self.lock();
            settled = clamp_time(position, state.duration);
            state.position = settled;
        }
        self.emit(SurfaceEvent::Seeking);
        self.emit(SurfaceEvent::Seeked { position: settled });
        self.emit(SurfaceEvent::TimeUpdate { position: settled });
    }

    fn set_volume(&self, volume: f64) {
        let echo;
        {
            let mut state = self.lock();
            let volume = config::clamp_volume(volume);
            if state.volume == volume {
                return;
            }
            state.volume = volume;
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
            if state.muted == muted {
                return;
            }
            state.muted = muted;
            echo = (state.volume, state.muted);
        }
        self.emit(SurfaceEvent::VolumeChange {
            volume: echo.0,
            muted: echo.1,
        });
    }

    fn set_rate(&self, rate: f64) {
        let echo;
        {
            let mut state = self.lock();
            let rate = config::clamp_rate(rate);
            if state.rate == rate {
                return;
            }
            state.rate = rate;
            echo = rate;
        }
        self.emit(SurfaceEvent::RateChange { rate: echo });
    }

    fn show_caption(&self, index: Option<usize>) {
        let mut state = self.lock();
        match index {
            Some(i) if i < state.captions.len() => state.visible_caption = Some(i),
            Some(_) => {}
            None => state.visible_caption = None,
        }
    }

    fn paused(&self) -> bool {
        self.lock().paused
    }

    fn muted(&self) -> bool {
        self.lock().muted
    }

    fn duration(&self) -> f64 {
        self.lock().duration
    }

    fn buffered(&self) -> TimeRanges {
        self.lock().buffered.clone()
    }

    fn caption_tracks(&self) -> Vec<CaptionTrack> {
        self.lock().captions.clone()
    }

    async fn request_fullscreen(&self, active: bool) -> Result<(), SurfaceError> {
        {
            let mut state = self.lock();
            if state.deny_fullscreen {
                return Err(SurfaceError::NotAllowed);
            }
            if state.fullscreen == active {
                return Ok(());
            }
            state.fullscreen = active;
        }
        self.emit(SurfaceEvent::FullscreenChange { active });
        Ok(())
    }

    async fn request_pip(&self, active: bool) -> Result<(), SurfaceError> {
        {
            let mut state = self.lock();
            if state.pip == active {
                return Ok(());
            }
            state.pip = active;
        }
        self.emit(SurfaceEvent::PipChange { active });
        Ok(())
    }
}
