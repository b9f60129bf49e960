//! Surface event bridge
//!
//! Normalizes the raw [`SurfaceEvent`] stream into store transitions
//! and [`PlayerEvent`] emissions. The bridge is where phase truth gets
//! decided:
//!
//! - `waiting` is the only path into the buffering phase, and a
//!   `playing` after it closes the bracket with one buffer-end
//! - `play`/`playing`/`pause`/`ended` commit the phases the dispatcher
//!   deliberately left uncommitted
//! - A settled seek reports the position before the FIRST `seeking` of
//!   a burst, so rapid scrubbing collapses into one honest from/to pair
//!
//! All handling is synchronous; [`EventBridge::run`] pumps a surface
//! receiver through it on a task, and [`EventBridge::drain`] processes
//! whatever is queued for deterministic replay.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::actions::ActionDispatcher;
use crate::analytics::{EventSink, PlayerEvent};
use crate::config::PlayerConfig;
use crate::state::{PlayerSnapshot, StateStore};
use crate::surface::SurfaceEvent;
use crate::types::{PlaybackError, PlaybackPhase};

/// Seek and readiness bookkeeping that spans multiple events
#[derive(Debug, Default)]
struct BridgeCursor {
    /// Last position that settled outside an in-flight seek
    last_settled: f64,
    /// Position before the first `seeking` of the current burst
    seek_origin: Option<f64>,
    /// Whether ready was already reported for the current source
    ready_emitted: bool,
}

/// Work a handled event left for an async context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[must_use = "follow-up work needs an async context, pass it to settle"]
pub struct BridgeFollowUp {
    /// The playlist advanced on ended and the next item wants playback
    pub start_next_track: bool,
    /// Metadata arrived; the configured default caption should activate
    /// once the surface's track list has settled
    pub activate_default_caption: bool,
}

impl BridgeFollowUp {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Normalizes surface events into store transitions and player events
pub struct EventBridge {
    store: StateStore,
    sink: EventSink,
    dispatcher: Arc<ActionDispatcher>,
    config: PlayerConfig,
    cursor: Mutex<BridgeCursor>,
}

impl EventBridge {
    pub fn new(dispatcher: Arc<ActionDispatcher>) -> Self {
        Self {
            store: dispatcher.store().clone(),
            sink: dispatcher.sink().clone(),
            config: dispatcher.config().clone(),
            dispatcher,
            cursor: Mutex::new(BridgeCursor::default()),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn sink(&self) -> &EventSink {
        &self.sink
    }

    /// Apply one surface event
    ///
    /// Returns follow-up work that needs an async context; callers
    /// without one may drop it after checking [`BridgeFollowUp::is_empty`].
    pub fn handle_event(&self, event: SurfaceEvent) -> BridgeFollowUp {
        trace!(?event, "surface event");
        let mut follow_up = BridgeFollowUp::default();

        match event {
            SurfaceEvent::LoadStart => {
                *self.lock_cursor() = BridgeCursor::default();
                self.store.set_phase(PlaybackPhase::Loading);
            }
            SurfaceEvent::LoadedMetadata { duration } => {
                self.store.set_duration(duration);
                if self.config.default_caption.is_some() {
                    follow_up.activate_default_caption = true;
                }
            }
            SurfaceEvent::LoadedData => {}
            SurfaceEvent::CanPlay => {
                let first = {
                    let mut cursor = self.lock_cursor();
                    !std::mem::replace(&mut cursor.ready_emitted, true)
                };
                if first {
                    self.emit(|s| PlayerEvent::Ready {
                        duration: s.duration,
                    });
                }
            }
            SurfaceEvent::Play => {
                self.store.set_phase(PlaybackPhase::Playing);
                self.emit(|s| PlayerEvent::Play {
                    position: s.current_time,
                });
            }
            SurfaceEvent::Playing => {
                let was_buffering = self.store.snapshot().phase == PlaybackPhase::Buffering;
                self.store.set_phase(PlaybackPhase::Playing);
                if was_buffering {
                    self.emit(|s| PlayerEvent::BufferEnd {
                        position: s.current_time,
                        buffered: s.buffered.clone(),
                        buffered_percent: s.buffered_percent,
                    });
                }
            }
            SurfaceEvent::Pause => {
                // Stop and source teardown pause the surface after the
                // store has already left active playback; that echo
                // must not resurrect a paused phase
                let phase = self.store.snapshot().phase;
                if matches!(phase, PlaybackPhase::Ended | PlaybackPhase::Idle) {
                    trace!(%phase, "ignoring pause echo");
                    return follow_up;
                }
                self.store.set_phase(PlaybackPhase::Paused);
                self.emit(|s| PlayerEvent::Pause {
                    position: s.current_time,
                });
            }
            SurfaceEvent::Ended => {
                self.store.set_phase(PlaybackPhase::Ended);
                self.emit(|s| PlayerEvent::Ended {
                    position: s.current_time,
                });
                if self.dispatcher.advance_after_end() {
                    follow_up.start_next_track = true;
                }
            }
            SurfaceEvent::TimeUpdate { position } => {
                self.store.set_current_time(position);
                {
                    let mut cursor = self.lock_cursor();
                    if cursor.seek_origin.is_none() {
                        cursor.last_settled = position;
                    }
                }
                self.emit(|s| PlayerEvent::TimeUpdate {
                    position: s.current_time,
                    played_percent: s.played_percent,
                });
            }
            SurfaceEvent::DurationChange { duration } => {
                self.store.set_duration(duration);
                self.emit(|s| PlayerEvent::DurationChange {
                    duration: s.duration,
                });
            }
            SurfaceEvent::Progress { buffered } => {
                self.store.set_buffered(buffered);
            }
            SurfaceEvent::Waiting => {
                let was_buffering = self.store.snapshot().phase == PlaybackPhase::Buffering;
                self.store.set_phase(PlaybackPhase::Buffering);
                if !was_buffering {
                    self.emit(|s| PlayerEvent::BufferStart {
                        position: s.current_time,
                        buffered: s.buffered.clone(),
                        buffered_percent: s.buffered_percent,
                    });
                }
            }
            SurfaceEvent::Seeking => {
                let mut cursor = self.lock_cursor();
                let origin = cursor.last_settled;
                cursor.seek_origin.get_or_insert(origin);
            }
            SurfaceEvent::Seeked { position } => {
                self.store.set_current_time(position);
                let from = {
                    let mut cursor = self.lock_cursor();
                    cursor.last_settled = position;
                    cursor.seek_origin.take()
                };
                // A seeked without a preceding seeking degenerates to a
                // zero-length seek
                let from = from.unwrap_or(position);
                self.emit(|s| PlayerEvent::Seek {
                    from,
                    to: s.current_time,
                });
            }
            SurfaceEvent::VolumeChange { volume, muted } => {
                self.store.set_audio(volume, muted);
                self.emit(|s| PlayerEvent::VolumeChange {
                    volume: s.volume,
                    muted: s.muted,
                });
            }
            SurfaceEvent::RateChange { rate } => {
                self.store.set_rate(rate);
                self.emit(|s| PlayerEvent::RateChange {
                    rate: s.playback_rate,
                });
            }
            SurfaceEvent::Error { code, message } => {
                let error = PlaybackError::fatal(code, message);
                self.store.set_error(Some(error.clone()));
                let snapshot = self.store.snapshot();
                self.sink.emit(
                    &PlayerEvent::Error {
                        error,
                        source: snapshot.source.clone(),
                    },
                    &snapshot,
                );
            }
            SurfaceEvent::FullscreenChange { active } => {
                self.store.set_fullscreen(active);
                self.emit(|_| {
                    if active {
                        PlayerEvent::EnterFullscreen
                    } else {
                        PlayerEvent::ExitFullscreen
                    }
                });
            }
            SurfaceEvent::PipChange { active } => {
                self.store.set_pip(active);
                self.emit(|_| {
                    if active {
                        PlayerEvent::EnterPip
                    } else {
                        PlayerEvent::ExitPip
                    }
                });
            }
        }

        follow_up
    }

    /// Handle one event and perform its follow-up work
    pub async fn process(&self, event: SurfaceEvent) {
        let follow_up = self.handle_event(event);
        self.settle(follow_up).await;
    }

    /// Perform the async follow-up work a handled event produced
    pub async fn settle(&self, follow_up: BridgeFollowUp) {
        if follow_up.activate_default_caption {
            self.schedule_default_caption();
        }
        if follow_up.start_next_track {
            if let Err(error) = self.dispatcher.play().await {
                debug!(%error, "autoplay of the next track was rejected");
            }
        }
    }

    /// Pump a surface receiver until it closes
    pub async fn run(self: Arc<Self>, mut events: broadcast::Receiver<SurfaceEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.process(event).await,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "surface event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("surface event stream closed, bridge stopping");
                    break;
                }
            }
        }
    }

    /// Process everything currently queued on `events` and report how
    /// many events were handled
    ///
    /// Replay and tests use this to reach a settled state without
    /// racing a background pump.
    pub async fn drain(&self, events: &mut broadcast::Receiver<SurfaceEvent>) -> usize {
        let mut handled = 0;
        loop {
            match events.try_recv() {
                Ok(event) => {
                    self.process(event).await;
                    handled += 1;
                }
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "surface event stream lagged during drain");
                }
                Err(_) => break,
            }
        }
        handled
    }

    /// Activate the configured default caption after the settle delay
    ///
    /// Track lists populate asynchronously after metadata; activating
    /// immediately would race an empty list. Without a runtime the list
    /// is as settled as it will get, so activate in place.
    fn schedule_default_caption(&self) {
        let Some(index) = self.config.default_caption else {
            return;
        };
        let delay = Duration::from_millis(self.config.caption_settle_ms);
        let dispatcher = Arc::clone(&self.dispatcher);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    dispatcher.set_active_caption(Some(index));
                });
            }
            Err(_) => self.dispatcher.set_active_caption(Some(index)),
        }
    }

    fn emit(&self, make: impl FnOnce(&PlayerSnapshot) -> PlayerEvent) {
        let snapshot = self.store.snapshot();
        let event = make(&snapshot);
        self.sink.emit(&event, &snapshot);
    }

    fn lock_cursor(&self) -> MutexGuard<'_, BridgeCursor> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::{Playlist, PlaylistItem};
    use crate::source::Source;
    use crate::surface::{PlaybackSurface, SimulatedSurface};
    use crate::types::CaptionTrack;
    use std::sync::Mutex as StdMutex;

    fn rig_with(
        surface: Arc<SimulatedSurface>,
        config: PlayerConfig,
    ) -> (Arc<ActionDispatcher>, EventBridge) {
        let store = StateStore::new(&config);
        let dispatcher = Arc::new(ActionDispatcher::new(
            surface,
            store,
            EventSink::new(),
            config,
        ));
        let bridge = EventBridge::new(dispatcher.clone());
        (dispatcher, bridge)
    }

    fn rig() -> (
        Arc<SimulatedSurface>,
        Arc<ActionDispatcher>,
        EventBridge,
        broadcast::Receiver<SurfaceEvent>,
    ) {
        let surface = Arc::new(SimulatedSurface::new());
        let rx = surface.events();
        let (dispatcher, bridge) = rig_with(surface.clone(), PlayerConfig::default());
        (surface, dispatcher, bridge, rx)
    }

    fn collect_kinds(sink: &EventSink) -> Arc<StdMutex<Vec<&'static str>>> {
        let kinds = Arc::new(StdMutex::new(Vec::new()));
        let sunk = kinds.clone();
        sink.on(move |event, _| sunk.lock().unwrap().push(event.kind()));
        kinds
    }

    #[tokio::test]
    async fn load_start_is_the_only_path_into_loading() {
        let (_, dispatcher, bridge, mut rx) = rig();

        dispatcher.set_source(Some(Source::classify("clip.mp4")));
        assert_eq!(
            bridge.store().snapshot().phase,
            PlaybackPhase::Idle,
            "attaching a source must not raise loading by itself"
        );

        bridge.drain(&mut rx).await;
        assert_eq!(bridge.store().snapshot().phase, PlaybackPhase::Loading);
    }

    #[tokio::test]
    async fn ready_fires_once_per_source() {
        let (surface, dispatcher, bridge, mut rx) = rig();
        let kinds = collect_kinds(bridge.sink());

        dispatcher.set_source(Some(Source::classify("clip.mp4")));
        surface.complete_load(120.0);
        bridge.drain(&mut rx).await;

        let ready = |kinds: &Arc<StdMutex<Vec<&str>>>| {
            kinds.lock().unwrap().iter().filter(|k| **k == "ready").count()
        };
        assert_eq!(ready(&kinds), 1);
        assert_eq!(bridge.store().snapshot().duration, 120.0);

        // A second canplay for the same source stays quiet
        let _ = bridge.handle_event(SurfaceEvent::CanPlay);
        assert_eq!(ready(&kinds), 1);

        // A fresh load re-arms it
        let _ = bridge.handle_event(SurfaceEvent::LoadStart);
        let _ = bridge.handle_event(SurfaceEvent::CanPlay);
        assert_eq!(ready(&kinds), 2);
    }

    #[tokio::test]
    async fn play_confirmation_commits_the_playing_phase() {
        let (surface, dispatcher, bridge, mut rx) = rig();
        let kinds = collect_kinds(bridge.sink());
        surface.complete_load(100.0);

        dispatcher.play().await.unwrap();
        bridge.drain(&mut rx).await;

        assert_eq!(bridge.store().snapshot().phase, PlaybackPhase::Playing);
        assert!(kinds.lock().unwrap().contains(&"play"));
    }

    #[tokio::test]
    async fn stall_and_resume_bracket_exactly_one_buffer_pair() {
        let (surface, dispatcher, bridge, mut rx) = rig();
        let kinds = collect_kinds(bridge.sink());
        surface.complete_load(100.0);
        dispatcher.play().await.unwrap();
        bridge.drain(&mut rx).await;

        surface.stall();
        bridge.drain(&mut rx).await;
        assert_eq!(bridge.store().snapshot().phase, PlaybackPhase::Buffering);

        surface.resume();
        bridge.drain(&mut rx).await;
        assert_eq!(bridge.store().snapshot().phase, PlaybackPhase::Playing);

        let kinds = kinds.lock().unwrap();
        assert_eq!(kinds.iter().filter(|k| **k == "buffer_start").count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == "buffer_end").count(), 1);
    }

    #[tokio::test]
    async fn playing_without_a_stall_emits_no_buffer_end() {
        let (surface, dispatcher, bridge, mut rx) = rig();
        let kinds = collect_kinds(bridge.sink());
        surface.complete_load(100.0);

        dispatcher.play().await.unwrap();
        bridge.drain(&mut rx).await;

        assert!(!kinds.lock().unwrap().contains(&"buffer_end"));
    }

    #[tokio::test]
    async fn pause_echo_after_stop_is_ignored() {
        let (surface, dispatcher, bridge, mut rx) = rig();
        surface.complete_load(100.0);
        dispatcher.play().await.unwrap();
        bridge.drain(&mut rx).await;

        dispatcher.stop();
        bridge.drain(&mut rx).await;

        let snap = bridge.store().snapshot();
        assert_eq!(snap.phase, PlaybackPhase::Idle);
        assert_eq!(snap.current_time, 0.0);
    }

    #[test]
    fn rapid_seeks_collapse_to_one_honest_pair() {
        let surface = Arc::new(SimulatedSurface::new());
        let (_, bridge) = rig_with(surface, PlayerConfig::default());
        let seeks = Arc::new(StdMutex::new(Vec::new()));
        {
            let seeks = seeks.clone();
            bridge.sink().on(move |event, _| {
                if let PlayerEvent::Seek { from, to } = event {
                    seeks.lock().unwrap().push((*from, *to));
                }
            });
        }
        let _ = bridge.handle_event(SurfaceEvent::DurationChange { duration: 100.0 });
        let _ = bridge.handle_event(SurfaceEvent::TimeUpdate { position: 10.0 });

        let _ = bridge.handle_event(SurfaceEvent::Seeking);
        let _ = bridge.handle_event(SurfaceEvent::TimeUpdate { position: 25.0 });
        let _ = bridge.handle_event(SurfaceEvent::Seeking);
        let _ = bridge.handle_event(SurfaceEvent::Seeked { position: 80.0 });

        assert_eq!(*seeks.lock().unwrap(), vec![(10.0, 80.0)]);
        assert_eq!(bridge.store().snapshot().current_time, 80.0);
    }

    #[test]
    fn a_settled_seek_rearms_the_origin() {
        let surface = Arc::new(SimulatedSurface::new());
        let (_, bridge) = rig_with(surface, PlayerConfig::default());
        let seeks = Arc::new(StdMutex::new(Vec::new()));
        {
            let seeks = seeks.clone();
            bridge.sink().on(move |event, _| {
                if let PlayerEvent::Seek { from, to } = event {
                    seeks.lock().unwrap().push((*from, *to));
                }
            });
        }

        let _ = bridge.handle_event(SurfaceEvent::TimeUpdate { position: 5.0 });
        let _ = bridge.handle_event(SurfaceEvent::Seeking);
        let _ = bridge.handle_event(SurfaceEvent::Seeked { position: 40.0 });
        let _ = bridge.handle_event(SurfaceEvent::Seeking);
        let _ = bridge.handle_event(SurfaceEvent::Seeked { position: 70.0 });

        assert_eq!(*seeks.lock().unwrap(), vec![(5.0, 40.0), (40.0, 70.0)]);
    }

    #[test]
    fn volume_echo_lands_as_one_audio_transition() {
        let surface = Arc::new(SimulatedSurface::new());
        let (_, bridge) = rig_with(surface, PlayerConfig::default());

        let _ = bridge.handle_event(SurfaceEvent::VolumeChange {
            volume: 0.3,
            muted: true,
        });

        let snap = bridge.store().snapshot();
        assert_eq!(snap.volume, 0.3);
        assert!(snap.muted);
    }

    #[test]
    fn surface_errors_are_fatal_and_carry_the_source() {
        let surface = Arc::new(SimulatedSurface::new());
        let (dispatcher, bridge) = rig_with(surface, PlayerConfig::default());
        dispatcher.set_source(Some(Source::classify("clip.mp4")));
        let errors = Arc::new(StdMutex::new(Vec::new()));
        {
            let errors = errors.clone();
            bridge.sink().on(move |event, _| {
                if let PlayerEvent::Error { error, source } = event {
                    errors.lock().unwrap().push((error.clone(), source.clone()));
                }
            });
        }

        let _ = bridge.handle_event(SurfaceEvent::Error {
            code: "decode".into(),
            message: "stream corrupt".into(),
        });

        let snap = bridge.store().snapshot();
        assert_eq!(snap.phase, PlaybackPhase::Error);
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].0.fatal);
        assert_eq!(
            errors[0].1.as_ref().map(|s| s.url.as_str()),
            Some("clip.mp4")
        );
    }

    #[test]
    fn progress_updates_the_buffered_window() {
        let surface = Arc::new(SimulatedSurface::new());
        let (_, bridge) = rig_with(surface, PlayerConfig::default());
        let _ = bridge.handle_event(SurfaceEvent::DurationChange { duration: 100.0 });

        let _ = bridge.handle_event(SurfaceEvent::Progress {
            buffered: crate::timecode::TimeRanges::from_pairs([(0.0, 25.0)]),
        });

        let snap = bridge.store().snapshot();
        assert_eq!(snap.buffered_percent, 25.0);
    }

    #[test]
    fn fullscreen_confirmation_flips_the_store_flag() {
        let surface = Arc::new(SimulatedSurface::new());
        let (_, bridge) = rig_with(surface, PlayerConfig::default());
        let kinds = collect_kinds(bridge.sink());

        let _ = bridge.handle_event(SurfaceEvent::FullscreenChange { active: true });
        assert!(bridge.store().snapshot().fullscreen);

        let _ = bridge.handle_event(SurfaceEvent::FullscreenChange { active: false });
        assert!(!bridge.store().snapshot().fullscreen);

        assert_eq!(
            *kinds.lock().unwrap(),
            vec!["enter_fullscreen", "exit_fullscreen"]
        );
    }

    #[tokio::test]
    async fn ended_with_autoplay_advances_and_requests_play() {
        let (surface, dispatcher, bridge, mut rx) = rig();
        dispatcher.attach_playlist(
            Playlist::new(vec![
                PlaylistItem::new("a", "a.mp4"),
                PlaylistItem::new("b", "b.mp4"),
            ])
            .with_auto_play_next(true),
        );
        surface.complete_load(10.0);
        dispatcher.play().await.unwrap();
        bridge.drain(&mut rx).await;

        surface.advance(15.0);
        bridge.drain(&mut rx).await;

        assert_eq!(dispatcher.current_track(), Some(1));
        assert_eq!(
            surface.source().map(|s| s.url),
            Some("b.mp4".to_string()),
            "the next item should be attached"
        );
        assert!(!surface.paused(), "autoplay should have restarted playback");
    }

    #[tokio::test]
    async fn ended_without_autoplay_stays_ended() {
        let (surface, dispatcher, bridge, mut rx) = rig();
        dispatcher.attach_playlist(Playlist::new(vec![
            PlaylistItem::new("a", "a.mp4"),
            PlaylistItem::new("b", "b.mp4"),
        ]));
        surface.complete_load(10.0);
        dispatcher.play().await.unwrap();
        bridge.drain(&mut rx).await;

        surface.advance(15.0);
        bridge.drain(&mut rx).await;

        assert_eq!(bridge.store().snapshot().phase, PlaybackPhase::Ended);
        assert_eq!(dispatcher.current_track(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn default_caption_activates_after_the_settle_delay() {
        let surface = Arc::new(SimulatedSurface::with_caption_tracks(vec![
            CaptionTrack::new("English", "en"),
        ]));
        let config = PlayerConfig {
            default_caption: Some(0),
            ..PlayerConfig::default()
        };
        let (_, bridge) = rig_with(surface.clone(), config);

        bridge
            .process(SurfaceEvent::LoadedMetadata { duration: 60.0 })
            .await;
        assert_eq!(
            bridge.store().snapshot().active_caption,
            None,
            "activation must wait for the track list to settle"
        );

        tokio::time::advance(Duration::from_millis(300)).await;
        tokio::task::yield_now().await;

        assert_eq!(bridge.store().snapshot().active_caption, Some(0));
        assert_eq!(surface.visible_caption(), Some(0));
    }

    #[tokio::test]
    async fn run_pumps_surface_events_in_the_background() {
        let surface = Arc::new(SimulatedSurface::new());
        let rx = surface.events();
        let (_, bridge) = rig_with(surface.clone(), PlayerConfig::default());
        let bridge = Arc::new(bridge);
        let store = bridge.store().clone();

        let pump = tokio::spawn(Arc::clone(&bridge).run(rx));

        surface.load(&Source::classify("clip.mp4"));
        surface.complete_load(30.0);
        let mut watch = store.subscribe();
        while store.snapshot().duration != 30.0 {
            watch.changed().await.unwrap();
        }
        assert_eq!(store.snapshot().phase, PlaybackPhase::Loading);

        pump.abort();
        assert!(pump.await.unwrap_err().is_cancelled());
    }
}
