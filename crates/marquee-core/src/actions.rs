//! Action dispatch
//!
//! Translates high-level intents (play, seek, set volume, enter
//! fullscreen, ...) into paired surface effects and store updates:
//!
//! - Phase transitions that a surface confirms via event (play) are
//!   never applied optimistically; the bridge commits them
//! - Synchronous effects that cannot fail silently (pause, seek,
//!   volume) mirror into the store immediately
//! - Toggles read the surface's own flags where the store could be
//!   momentarily stale
//!
//! The dispatcher also owns the playlist cursor, the only mutable
//! state outside the store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, instrument, warn};

use crate::analytics::{EventSink, PlayerEvent};
use crate::config::{self, PlayerConfig};
use crate::error::{Error, Result};
use crate::playlist::{Playlist, PlaylistItem};
use crate::source::Source;
use crate::state::StateStore;
use crate::surface::{PlaybackSurface, SurfaceCapabilities};
use crate::timecode::clamp_time;
use crate::types::{PlaybackError, PlaybackPhase};

#[derive(Debug, Default)]
struct PlaylistCursor {
    playlist: Option<Playlist>,
    index: usize,
}

/// Translates intents into surface effects and store updates
pub struct ActionDispatcher {
    surface: Arc<dyn PlaybackSurface>,
    store: StateStore,
    sink: EventSink,
    config: PlayerConfig,
    capabilities: SurfaceCapabilities,
    cursor: Mutex<PlaylistCursor>,
}

impl ActionDispatcher {
    pub fn new(
        surface: Arc<dyn PlaybackSurface>,
        store: StateStore,
        sink: EventSink,
        config: PlayerConfig,
    ) -> Self {
        let capabilities = surface.capabilities();
        Self {
            surface,
            store,
            sink,
            config,
            capabilities,
            cursor: Mutex::new(PlaylistCursor::default()),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn sink(&self) -> &EventSink {
        &self.sink
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Capability descriptor resolved at construction
    pub fn capabilities(&self) -> SurfaceCapabilities {
        self.capabilities
    }

    /// Request playback start
    ///
    /// The playing phase is NOT set here; the bridge commits it when
    /// the surface confirms. An interruption rejection (superseded by a
    /// newer request) is swallowed; any other rejection lands in the
    /// store's error field and is reported to the caller.
    #[instrument(skip(self))]
    pub async fn play(&self) -> Result<()> {
        let snapshot = self.store.snapshot();
        if let Err(plugin) = self.store.plugins().check_before_play(&snapshot) {
            debug!(plugin, "play vetoed by plugin");
            return Err(Error::ActionVetoed {
                plugin,
                action: "play",
            });
        }

        match self.surface.play().await {
            Ok(()) => Ok(()),
            Err(reason) if reason.is_interruption() => {
                debug!("play request superseded, ignoring");
                Ok(())
            }
            Err(reason) => {
                warn!(code = reason.code(), "play request rejected");
                self.store.set_error(Some(PlaybackError::recoverable(
                    reason.code(),
                    reason.to_string(),
                )));
                Err(Error::PlayRejected { reason })
            }
        }
    }

    /// Halt playback; the paused phase is committed immediately since
    /// pause cannot fail silently the way play can
    #[instrument(skip(self))]
    pub fn pause(&self) -> Result<()> {
        let snapshot = self.store.snapshot();
        if let Err(plugin) = self.store.plugins().check_before_pause(&snapshot) {
            debug!(plugin, "pause vetoed by plugin");
            return Err(Error::ActionVetoed {
                plugin,
                action: "pause",
            });
        }

        self.surface.pause();
        if matches!(
            snapshot.phase,
            PlaybackPhase::Playing | PlaybackPhase::Buffering | PlaybackPhase::Loading
        ) {
            self.store.set_phase(PlaybackPhase::Paused);
        }
        Ok(())
    }

    /// Branch on the surface's own paused flag, not the store's, so a
    /// rapid toggle cannot race a not-yet-confirmed transition
    pub async fn toggle_play(&self) -> Result<()> {
        if self.surface.paused() {
            self.play().await
        } else {
            self.pause()
        }
    }

    /// Pause, rewind to zero, and return to idle as one logical action
    pub fn stop(&self) {
        self.surface.pause();
        self.surface.seek(0.0);
        self.store.set_current_time(0.0);
        self.store.set_phase(PlaybackPhase::Idle);
    }

    /// Seek to `position`, clamped against the surface's authoritative
    /// duration (the store's may be momentarily stale)
    pub fn seek(&self, position: f64) {
        let target = clamp_time(position, self.surface.duration());
        self.surface.seek(target);
        self.store.set_current_time(target);
    }

    /// Seek ahead by `delta` seconds, or the configured step
    pub fn seek_forward(&self, delta: Option<f64>) {
        let step = delta.unwrap_or(self.config.seek_step);
        let current = self.store.snapshot().current_time;
        self.seek(current + step);
    }

    /// Seek back by `delta` seconds, or the configured step
    pub fn seek_backward(&self, delta: Option<f64>) {
        let step = delta.unwrap_or(self.config.seek_step);
        let current = self.store.snapshot().current_time;
        self.seek(current - step);
    }

    /// Apply a clamped volume
    ///
    /// Raising the volume above zero while the surface is muted also
    /// unmutes: dragging a slider up should become audible without a
    /// separate gesture.
    pub fn set_volume(&self, volume: f64) {
        let volume = config::clamp_volume(volume);
        self.surface.set_volume(volume);
        if volume > 0.0 && self.surface.muted() {
            self.surface.set_muted(false);
            self.store.set_audio(volume, false);
        } else {
            self.store.set_volume(volume);
        }
    }

    /// Raise volume by the configured step
    pub fn volume_up(&self) {
        let current = self.store.snapshot().volume;
        self.set_volume(current + self.config.volume_step);
    }

    /// Lower volume by the configured step
    pub fn volume_down(&self) {
        let current = self.store.snapshot().volume;
        self.set_volume(current - self.config.volume_step);
    }

    pub fn mute(&self) {
        self.surface.set_muted(true);
        self.store.set_muted(true);
    }

    pub fn unmute(&self) {
        self.surface.set_muted(false);
        self.store.set_muted(false);
    }

    /// Reads the surface's mute flag, not the store's
    pub fn toggle_mute(&self) {
        if self.surface.muted() {
            self.unmute()
        } else {
            self.mute()
        }
    }

    /// Apply a policy-clamped playback rate
    pub fn set_rate(&self, rate: f64) {
        let rate = config::clamp_rate(rate);
        self.surface.set_rate(rate);
        self.store.set_rate(rate);
    }

    /// Ask the platform for fullscreen; denial is logged, never a
    /// playback error, and the store flag waits for the confirming event
    pub async fn enter_fullscreen(&self) {
        self.request_fullscreen(true).await;
    }

    pub async fn exit_fullscreen(&self) {
        self.request_fullscreen(false).await;
    }

    /// Fullscreen legitimately toggles off the store: the flag only
    /// ever flips on a confirmed platform event
    pub async fn toggle_fullscreen(&self) {
        let active = self.store.snapshot().fullscreen;
        self.request_fullscreen(!active).await;
    }

    async fn request_fullscreen(&self, active: bool) {
        if !self.capabilities.fullscreen {
            debug!("fullscreen not available on this surface");
            return;
        }
        if let Err(error) = self.surface.request_fullscreen(active).await {
            warn!(%error, active, "fullscreen request rejected");
        }
    }

    /// Picture-in-picture mirrors the fullscreen pattern; missing
    /// capability is a silent no-op
    pub async fn enter_pip(&self) {
        self.request_pip(true).await;
    }

    pub async fn exit_pip(&self) {
        self.request_pip(false).await;
    }

    pub async fn toggle_pip(&self) {
        let active = self.store.snapshot().pip;
        self.request_pip(!active).await;
    }

    async fn request_pip(&self, active: bool) {
        if !self.capabilities.pip {
            debug!("picture-in-picture not available on this surface");
            return;
        }
        if let Err(error) = self.surface.request_pip(active).await {
            warn!(%error, active, "picture-in-picture request rejected");
        }
    }

    /// Show exactly one caption track, or hide all with `None`
    ///
    /// An out-of-range index is ignored rather than raised.
    pub fn set_active_caption(&self, index: Option<usize>) {
        if let Some(i) = index {
            let count = self.surface.caption_tracks().len();
            if i >= count {
                debug!(index = i, count, "caption index out of range, ignoring");
                return;
            }
        }
        self.surface.show_caption(index);
        self.store.set_active_caption(index);
    }

    /// Toggle captions off, or back on to the preferred track
    pub fn toggle_captions(&self) {
        if self.store.snapshot().active_caption.is_some() {
            self.set_active_caption(None);
            return;
        }
        let tracks = self.surface.caption_tracks();
        if tracks.is_empty() {
            return;
        }
        let target = self
            .config
            .default_caption
            .filter(|i| *i < tracks.len())
            .or_else(|| tracks.iter().position(|t| t.is_default))
            .unwrap_or(0);
        self.set_active_caption(Some(target));
    }

    /// Attach a source (or detach with `None`) and notify the surface
    #[instrument(skip(self, source))]
    pub fn set_source(&self, source: Option<Source>) {
        match source {
            Some(source) => {
                self.store.set_source(Some(source.clone()));
                self.surface.load(&source);
                let snapshot = self.store.snapshot();
                self.sink.emit(&PlayerEvent::Load { source }, &snapshot);
            }
            None => {
                self.store.set_source(None);
            }
        }
    }

    /// Record the adaptive quality label; actual switching is the
    /// adaptive collaborator's job
    pub fn set_quality(&self, quality: Option<String>) {
        self.store.set_quality(quality);
    }

    /// Record the advertised quality ladder
    pub fn set_available_qualities(&self, qualities: Vec<String>) {
        self.store.set_available_qualities(qualities);
    }

    /// Attach a playlist and activate its start item
    pub fn attach_playlist(&self, playlist: Playlist) {
        let start = if playlist.is_empty() {
            None
        } else {
            let index = playlist.start_index.min(playlist.len() - 1);
            playlist.get(index).cloned().map(|item| (index, item))
        };

        {
            let mut cursor = self.lock_cursor();
            cursor.index = start.as_ref().map(|(index, _)| *index).unwrap_or(0);
            cursor.playlist = Some(playlist);
        }

        if let Some((_, item)) = start {
            self.activate_item(&item);
        }
    }

    /// Cursor position, while a playlist is attached
    pub fn current_track(&self) -> Option<usize> {
        let cursor = self.lock_cursor();
        cursor.playlist.as_ref().map(|_| cursor.index)
    }

    /// Advance the cursor; returns false at the end of a non-looping
    /// playlist or when none is attached
    pub fn next_track(&self) -> bool {
        let item = {
            let mut cursor = self.lock_cursor();
            let Some(playlist) = &cursor.playlist else {
                return false;
            };
            let Some(next) = playlist.next_index(cursor.index) else {
                return false;
            };
            cursor.index = next;
            playlist.get(next).cloned()
        };
        match item {
            Some(item) => {
                self.activate_item(&item);
                true
            }
            None => false,
        }
    }

    /// Step the cursor back; mirrors [`Self::next_track`] at the front edge
    pub fn previous_track(&self) -> bool {
        let item = {
            let mut cursor = self.lock_cursor();
            let Some(playlist) = &cursor.playlist else {
                return false;
            };
            let Some(previous) = playlist.previous_index(cursor.index) else {
                return false;
            };
            cursor.index = previous;
            playlist.get(previous).cloned()
        };
        match item {
            Some(item) => {
                self.activate_item(&item);
                true
            }
            None => false,
        }
    }

    /// Jump to an explicit index; out-of-range is a silent no-op
    pub fn skip_to_track(&self, index: usize) -> bool {
        let item = {
            let mut cursor = self.lock_cursor();
            let Some(playlist) = &cursor.playlist else {
                return false;
            };
            let Some(item) = playlist.get(index).cloned() else {
                return false;
            };
            cursor.index = index;
            Some(item)
        };
        match item {
            Some(item) => {
                self.activate_item(&item);
                true
            }
            None => false,
        }
    }

    /// Advance when the current item ends, if the playlist asks for it
    pub(crate) fn advance_after_end(&self) -> bool {
        let auto = self
            .lock_cursor()
            .playlist
            .as_ref()
            .map(|p| p.auto_play_next)
            .unwrap_or(false);
        if !auto {
            return false;
        }
        self.next_track()
    }

    fn activate_item(&self, item: &PlaylistItem) {
        debug!(id = %item.id, src = %item.src, "activating playlist item");
        self.set_source(Some(Source::classify(&item.src)));
    }

    fn lock_cursor(&self) -> MutexGuard<'_, PlaylistCursor> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
