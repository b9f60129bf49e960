//! Playback state store
//!
//! The store owns the single authoritative [`PlayerSnapshot`] for a
//! player instance and publishes it over a [`tokio::sync::watch`]
//! channel:
//!
//! - Every setter is one atomic transition; observers never see a
//!   snapshot whose derived fields disagree with their inputs
//! - A setter that computes an identical snapshot is a no-op and emits
//!   no change notification
//! - Plugins registered with the store observe each committed
//!   transition with the previous and current snapshot
//!
//! Setters are expected to be called from a single event-processing
//! context; the watch channel makes reads safe from anywhere.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::{self, PlayerConfig};
use crate::plugin::PluginRegistry;
use crate::source::Source;
use crate::timecode::{ratio_percent, TimeRanges};
use crate::types::{PlaybackError, PlaybackFlags, PlaybackPhase};

/// One observable snapshot of playback state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Authoritative lifecycle phase
    pub phase: PlaybackPhase,
    /// Convenience booleans derived from `phase`
    #[serde(flatten)]
    pub flags: PlaybackFlags,
    /// Last observed position in seconds
    pub current_time: f64,
    /// Content duration in seconds, 0 while unknown
    pub duration: f64,
    /// `current_time / duration` in 0..=100, 0 while duration unknown
    pub played_percent: f64,
    /// Buffered ranges as reported by the surface
    pub buffered: TimeRanges,
    /// End of the furthest buffered range over duration, 0..=100
    pub buffered_percent: f64,
    /// Volume in 0..=1, independent of mute
    pub volume: f64,
    /// Muted flag; muting does not zero the volume
    pub muted: bool,
    /// Playback rate, policy-clamped
    pub playback_rate: f64,
    /// Confirmed fullscreen state (platform event, not request)
    pub fullscreen: bool,
    /// Confirmed picture-in-picture state
    pub pip: bool,
    /// Active caption track index, `None` when captions are off
    pub active_caption: Option<usize>,
    /// Last attached source, `None` before any was set
    pub source: Option<Source>,
    /// Normalized error record; implies `phase == Error` while set
    pub error: Option<PlaybackError>,
    /// Overlay controls visibility, owned by the idle timer
    pub controls_visible: bool,
    /// Current adaptive quality label, opaque to the core
    pub quality: Option<String>,
    /// Quality labels offered by the adaptive collaborator
    pub available_qualities: Vec<String>,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            phase: PlaybackPhase::Idle,
            flags: PlaybackFlags::default(),
            current_time: 0.0,
            duration: 0.0,
            played_percent: 0.0,
            buffered: TimeRanges::new(),
            buffered_percent: 0.0,
            volume: 1.0,
            muted: false,
            playback_rate: 1.0,
            fullscreen: false,
            pip: false,
            active_caption: None,
            source: None,
            error: None,
            controls_visible: true,
            quality: None,
            available_qualities: Vec::new(),
        }
    }
}

impl PlayerSnapshot {
    /// Initial snapshot honoring the caller's audio preferences
    pub fn with_config(config: &PlayerConfig) -> Self {
        Self {
            volume: config::clamp_volume(config.initial_volume),
            muted: config.start_muted,
            playback_rate: config::clamp_rate(config.initial_rate),
            ..Self::default()
        }
    }
}

/// Owner of the canonical snapshot
///
/// Cheap to clone; all clones share the same underlying channel.
#[derive(Clone)]
pub struct StateStore {
    tx: Arc<watch::Sender<PlayerSnapshot>>,
    plugins: PluginRegistry,
}

impl StateStore {
    pub fn new(config: &PlayerConfig) -> Self {
        Self::with_plugins(config, PluginRegistry::new())
    }

    /// Store whose committed transitions are observed by `plugins`
    pub fn with_plugins(config: &PlayerConfig, plugins: PluginRegistry) -> Self {
        let (tx, _rx) = watch::channel(PlayerSnapshot::with_config(config));
        Self {
            tx: Arc::new(tx),
            plugins,
        }
    }

    /// Current snapshot by value
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.tx.borrow().clone()
    }

    /// Watch endpoint for consumers that want change notifications
    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.tx.subscribe()
    }

    /// Plugins observing this store
    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Set the lifecycle phase and rederive the convenience flags
    ///
    /// Leaving the error phase clears the error record, keeping the
    /// "error set implies error phase" invariant in both directions.
    pub fn set_phase(&self, phase: PlaybackPhase) -> bool {
        let from = self.tx.borrow().phase;
        let changed = self.transition(|snap| {
            if snap.phase == phase {
                return false;
            }
            snap.phase = phase;
            snap.flags = phase.flags();
            if phase != PlaybackPhase::Error {
                snap.error = None;
            }
            true
        });
        if changed {
            info!(from = %from, to = %phase, "playback phase transition");
        }
        changed
    }

    /// Attach a new source, or detach with `None`
    ///
    /// Attaching resets time, duration, buffer, caption, and quality
    /// fields and returns the phase to idle. It deliberately does NOT
    /// enter the loading phase: the loading indicator appears only when
    /// the surface itself reports stalling, so instant sources never
    /// flash a spinner.
    pub fn set_source(&self, source: Option<Source>) -> bool {
        let changed = match source {
            Some(source) => self.transition(|snap| {
                let mut next = reset_except_audio(snap);
                next.source = Some(source);
                commit_if_different(snap, next)
            }),
            None => self.transition(|snap| {
                let next = reset_except_audio(snap);
                commit_if_different(snap, next)
            }),
        };
        if changed {
            let snap = self.tx.borrow();
            match &snap.source {
                Some(source) => {
                    info!(url = %source.url, kind = %source.kind, "source attached")
                }
                None => debug!("source detached"),
            }
        }
        changed
    }

    /// Store the playhead position and rederive the played percentage
    pub fn set_current_time(&self, position: f64) -> bool {
        self.transition(|snap| {
            let position = sanitize(position);
            if snap.current_time == position {
                return false;
            }
            snap.current_time = position;
            snap.played_percent = ratio_percent(position, snap.duration);
            true
        })
    }

    /// Store the duration and rederive both percentages
    pub fn set_duration(&self, duration: f64) -> bool {
        self.transition(|snap| {
            let duration = sanitize(duration);
            if snap.duration == duration {
                return false;
            }
            snap.duration = duration;
            snap.played_percent = ratio_percent(snap.current_time, duration);
            snap.buffered_percent =
                ratio_percent(snap.buffered.end().unwrap_or(0.0), duration);
            true
        })
    }

    /// Store buffered ranges and rederive the buffered percentage
    pub fn set_buffered(&self, ranges: TimeRanges) -> bool {
        self.transition(|snap| {
            if snap.buffered == ranges {
                return false;
            }
            snap.buffered_percent = ratio_percent(ranges.end().unwrap_or(0.0), snap.duration);
            snap.buffered = ranges;
            true
        })
    }

    /// Store a clamped volume
    pub fn set_volume(&self, volume: f64) -> bool {
        self.transition(|snap| {
            let volume = config::clamp_volume(volume);
            if snap.volume == volume {
                return false;
            }
            snap.volume = volume;
            true
        })
    }

    /// Store the muted flag
    pub fn set_muted(&self, muted: bool) -> bool {
        self.transition(|snap| {
            if snap.muted == muted {
                return false;
            }
            snap.muted = muted;
            true
        })
    }

    /// Store volume and muted together in one transition
    ///
    /// Surfaces report both in a single volume-change event; committing
    /// them separately would publish an intermediate snapshot.
    pub fn set_audio(&self, volume: f64, muted: bool) -> bool {
        self.transition(|snap| {
            let volume = config::clamp_volume(volume);
            if snap.volume == volume && snap.muted == muted {
                return false;
            }
            snap.volume = volume;
            snap.muted = muted;
            true
        })
    }

    /// Store a policy-clamped playback rate
    pub fn set_rate(&self, rate: f64) -> bool {
        self.transition(|snap| {
            let rate = config::clamp_rate(rate);
            if snap.playback_rate == rate {
                return false;
            }
            snap.playback_rate = rate;
            true
        })
    }

    /// Record confirmed fullscreen state
    pub fn set_fullscreen(&self, fullscreen: bool) -> bool {
        self.transition(|snap| {
            if snap.fullscreen == fullscreen {
                return false;
            }
            snap.fullscreen = fullscreen;
            true
        })
    }

    /// Record confirmed picture-in-picture state
    pub fn set_pip(&self, pip: bool) -> bool {
        self.transition(|snap| {
            if snap.pip == pip {
                return false;
            }
            snap.pip = pip;
            true
        })
    }

    /// Record the active caption track index
    pub fn set_active_caption(&self, index: Option<usize>) -> bool {
        self.transition(|snap| {
            if snap.active_caption == index {
                return false;
            }
            snap.active_caption = index;
            true
        })
    }

    /// Record the current adaptive quality label
    pub fn set_quality(&self, quality: Option<String>) -> bool {
        self.transition(|snap| {
            if snap.quality == quality {
                return false;
            }
            snap.quality = quality;
            true
        })
    }

    /// Record the advertised quality ladder
    pub fn set_available_qualities(&self, qualities: Vec<String>) -> bool {
        self.transition(|snap| {
            if snap.available_qualities == qualities {
                return false;
            }
            snap.available_qualities = qualities;
            true
        })
    }

    /// Record overlay controls visibility
    pub fn set_controls_visible(&self, visible: bool) -> bool {
        self.transition(|snap| {
            if snap.controls_visible == visible {
                return false;
            }
            snap.controls_visible = visible;
            true
        })
    }

    /// Record or clear the error field
    ///
    /// A record forces the error phase in the same transition; clearing
    /// only empties the field and leaves the phase alone.
    pub fn set_error(&self, error: Option<PlaybackError>) -> bool {
        let changed = self.transition(|snap| match error {
            Some(error) => {
                if snap.error.as_ref() == Some(&error) && snap.phase == PlaybackPhase::Error {
                    return false;
                }
                snap.error = Some(error);
                snap.phase = PlaybackPhase::Error;
                snap.flags = PlaybackPhase::Error.flags();
                true
            }
            None => {
                if snap.error.is_none() {
                    return false;
                }
                snap.error = None;
                true
            }
        });
        if changed {
            if let Some(error) = &self.tx.borrow().error {
                info!(code = %error.code, fatal = error.fatal, "playback error recorded");
            }
        }
        changed
    }

    /// Restore defaults, preserving the user's volume/mute/rate
    pub fn reset(&self) -> bool {
        self.transition(|snap| {
            let next = reset_except_audio(snap);
            commit_if_different(snap, next)
        })
    }

    /// Run one atomic transition; notify watchers and plugins only when
    /// the closure actually changed the snapshot
    fn transition<F>(&self, mutate: F) -> bool
    where
        F: FnOnce(&mut PlayerSnapshot) -> bool,
    {
        let mut previous: Option<PlayerSnapshot> = None;
        let changed = self.tx.send_if_modified(|snap| {
            let before = snap.clone();
            if mutate(snap) {
                previous = Some(before);
                true
            } else {
                false
            }
        });
        if let Some(previous) = previous {
            let current = self.tx.borrow().clone();
            self.plugins.notify_state_change(&previous, &current);
        }
        changed
    }
}

/// Default snapshot carrying over the audio preferences of `snap`
fn reset_except_audio(snap: &PlayerSnapshot) -> PlayerSnapshot {
    PlayerSnapshot {
        volume: snap.volume,
        muted: snap.muted,
        playback_rate: snap.playback_rate,
        ..PlayerSnapshot::default()
    }
}

fn commit_if_different(snap: &mut PlayerSnapshot, next: PlayerSnapshot) -> bool {
    if *snap == next {
        false
    } else {
        *snap = next;
        true
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{PlayerPlugin, PluginRegistry};
    use crate::source::SourceKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn store() -> StateStore {
        StateStore::new(&PlayerConfig::default())
    }

    #[test]
    fn played_percent_tracks_both_operands() {
        let store = store();

        store.set_current_time(60.0);
        assert_eq!(store.snapshot().played_percent, 0.0);

        store.set_duration(120.0);
        assert_eq!(store.snapshot().played_percent, 50.0);

        store.set_current_time(30.0);
        assert_eq!(store.snapshot().played_percent, 25.0);

        store.set_duration(0.0);
        assert_eq!(store.snapshot().played_percent, 0.0);
    }

    #[test]
    fn buffered_percent_uses_last_range_end() {
        let store = store();
        store.set_duration(100.0);

        store.set_buffered(TimeRanges::from_pairs([(0.0, 10.0), (20.0, 40.0)]));
        assert_eq!(store.snapshot().buffered_percent, 40.0);

        store.set_buffered(TimeRanges::new());
        assert_eq!(store.snapshot().buffered_percent, 0.0);
    }

    #[test]
    fn duration_change_rederives_buffered_percent() {
        let store = store();
        store.set_duration(100.0);
        store.set_buffered(TimeRanges::from_pairs([(0.0, 50.0)]));
        assert_eq!(store.snapshot().buffered_percent, 50.0);

        store.set_duration(200.0);
        assert_eq!(store.snapshot().buffered_percent, 25.0);
    }

    #[test]
    fn phase_drives_exactly_one_flag() {
        let store = store();

        store.set_phase(PlaybackPhase::Buffering);
        let snap = store.snapshot();
        assert!(snap.flags.is_buffering);
        assert!(!snap.flags.is_playing);
        assert!(!snap.flags.is_paused);
        assert!(!snap.flags.is_ended);
        assert!(!snap.flags.is_loading);

        store.set_phase(PlaybackPhase::Playing);
        let snap = store.snapshot();
        assert!(snap.flags.is_playing);
        assert!(!snap.flags.is_buffering);
    }

    #[test]
    fn volume_is_clamped_and_idempotent() {
        let store = store();

        assert!(store.set_volume(1.5));
        assert_eq!(store.snapshot().volume, 1.0);
        assert!(!store.set_volume(1.5));

        assert!(store.set_volume(-1.0));
        assert_eq!(store.snapshot().volume, 0.0);
    }

    #[test]
    fn rate_is_policy_clamped() {
        let store = store();

        store.set_rate(5.0);
        assert_eq!(store.snapshot().playback_rate, 4.0);

        store.set_rate(0.1);
        assert_eq!(store.snapshot().playback_rate, 0.25);
    }

    #[test]
    fn noop_sets_emit_no_watch_notification() {
        let store = store();
        let mut rx = store.subscribe();

        assert!(store.set_volume(0.5));
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        assert!(!store.set_volume(0.5));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn attaching_a_source_resets_but_keeps_audio_prefs() {
        let store = store();
        store.set_volume(0.3);
        store.set_muted(true);
        store.set_rate(2.0);
        store.set_duration(120.0);
        store.set_current_time(60.0);
        store.set_active_caption(Some(1));
        store.set_phase(PlaybackPhase::Playing);

        store.set_source(Some(Source::classify("https://cdn.example.com/next.mp4")));

        let snap = store.snapshot();
        assert_eq!(snap.phase, PlaybackPhase::Idle);
        assert!(!snap.flags.is_loading, "source attach must not raise loading");
        assert_eq!(snap.current_time, 0.0);
        assert_eq!(snap.duration, 0.0);
        assert_eq!(snap.played_percent, 0.0);
        assert_eq!(snap.active_caption, None);
        assert_eq!(snap.volume, 0.3);
        assert!(snap.muted);
        assert_eq!(snap.playback_rate, 2.0);
        assert_eq!(snap.source.as_ref().map(|s| s.kind), Some(SourceKind::File));
    }

    #[test]
    fn detaching_the_source_resets_to_defaults() {
        let store = store();
        store.set_source(Some(Source::classify("clip.mp4")));
        store.set_duration(120.0);

        store.set_source(None);

        let snap = store.snapshot();
        assert_eq!(snap.source, None);
        assert_eq!(snap.duration, 0.0);
        assert_eq!(snap.phase, PlaybackPhase::Idle);
    }

    #[test]
    fn error_record_forces_error_phase() {
        let store = store();
        store.set_phase(PlaybackPhase::Playing);

        store.set_error(Some(PlaybackError::fatal("decode", "bad stream")));

        let snap = store.snapshot();
        assert_eq!(snap.phase, PlaybackPhase::Error);
        assert!(!snap.flags.is_playing);
        assert!(snap.error.is_some());
    }

    #[test]
    fn clearing_the_error_keeps_the_phase() {
        let store = store();
        store.set_error(Some(PlaybackError::fatal("network", "timeout")));

        store.set_error(None);

        let snap = store.snapshot();
        assert_eq!(snap.error, None);
        assert_eq!(snap.phase, PlaybackPhase::Error);
    }

    #[test]
    fn leaving_error_phase_clears_the_record() {
        let store = store();
        store.set_error(Some(PlaybackError::fatal("network", "timeout")));

        store.set_phase(PlaybackPhase::Idle);

        let snap = store.snapshot();
        assert_eq!(snap.error, None);
        assert_eq!(snap.phase, PlaybackPhase::Idle);
    }

    #[test]
    fn reset_preserves_audio_preferences() {
        let store = store();
        store.set_volume(0.2);
        store.set_muted(true);
        store.set_rate(0.5);
        store.set_duration(90.0);
        store.set_phase(PlaybackPhase::Ended);

        store.reset();

        let snap = store.snapshot();
        assert_eq!(snap.volume, 0.2);
        assert!(snap.muted);
        assert_eq!(snap.playback_rate, 0.5);
        assert_eq!(snap.duration, 0.0);
        assert_eq!(snap.phase, PlaybackPhase::Idle);
    }

    #[test]
    fn set_audio_commits_one_transition() {
        let counted = Arc::new(CountingPlugin::default());
        let registry = PluginRegistry::new();
        registry.register(counted.clone());
        let store = StateStore::with_plugins(&PlayerConfig::default(), registry);

        store.set_audio(0.4, true);

        assert_eq!(counted.transitions.load(Ordering::SeqCst), 1);
        let snap = store.snapshot();
        assert_eq!(snap.volume, 0.4);
        assert!(snap.muted);
    }

    #[test]
    fn plugins_observe_previous_and_current() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = PluginRegistry::new();
        registry.register(Arc::new(SnapshotDiffPlugin { seen: seen.clone() }));
        let store = StateStore::with_plugins(&PlayerConfig::default(), registry);

        store.set_phase(PlaybackPhase::Playing);
        store.set_phase(PlaybackPhase::Playing);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1, "no-op set must not notify plugins");
        let (previous, current) = &seen[0];
        assert_eq!(*previous, PlaybackPhase::Idle);
        assert_eq!(*current, PlaybackPhase::Playing);
    }

    #[derive(Default)]
    struct CountingPlugin {
        transitions: AtomicUsize,
    }

    impl PlayerPlugin for CountingPlugin {
        fn name(&self) -> &str {
            "counting"
        }

        fn on_state_change(&self, _previous: &PlayerSnapshot, _current: &PlayerSnapshot) {
            self.transitions.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct SnapshotDiffPlugin {
        seen: Arc<Mutex<Vec<(PlaybackPhase, PlaybackPhase)>>>,
    }

    impl PlayerPlugin for SnapshotDiffPlugin {
        fn name(&self) -> &str {
            "diff"
        }

        fn on_state_change(&self, previous: &PlayerSnapshot, current: &PlayerSnapshot) {
            self.seen.lock().unwrap().push((previous.phase, current.phase));
        }
    }
}
