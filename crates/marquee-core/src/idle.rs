//! Controls auto-hide timer
//!
//! Owns the `controls_visible` field of the snapshot. Controls hide
//! after a configurable idle period, but only while frames are
//! advancing and the user is not engaged with the control surface:
//!
//! - Pointer activity shows the controls and restarts the countdown
//! - Hover or focus on the controls pins them visible
//! - Leaving the playing phase forces them visible and cancels the
//!   countdown
//! - Touch taps toggle: show while hidden, hide while playing
//!
//! A zero timeout disables hiding entirely. Visibility changes reach
//! observers through the store, which already suppresses no-op writes,
//! so each actual transition notifies exactly once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, trace};

use crate::config::PlayerConfig;
use crate::state::{PlayerSnapshot, StateStore};

struct TimerInner {
    store: StateStore,
    timeout: Duration,
    /// Bumped on every re-arm or cancel; a sleeping hide task only
    /// acts if its generation is still current when it wakes
    generation: AtomicU64,
    playing: AtomicBool,
    hovering: AtomicBool,
    focused: AtomicBool,
}

/// Idle countdown for the controls overlay
///
/// Cheap to clone; all clones share the same countdown.
#[derive(Clone)]
pub struct ControlsTimer {
    inner: Arc<TimerInner>,
}

impl ControlsTimer {
    pub fn new(store: StateStore, config: &PlayerConfig) -> Self {
        Self {
            inner: Arc::new(TimerInner {
                store,
                timeout: Duration::from_millis(config.idle_timeout_ms),
                generation: AtomicU64::new(0),
                playing: AtomicBool::new(false),
                hovering: AtomicBool::new(false),
                focused: AtomicBool::new(false),
            }),
        }
    }

    /// Pointer moved inside the player area
    pub fn pointer_moved(&self) {
        self.show();
        self.arm();
    }

    /// Pointer entered the player area
    pub fn pointer_entered(&self) {
        self.show();
        self.arm();
    }

    /// Pointer left the player area; the countdown keeps running so
    /// controls still hide under an idle pointer parked elsewhere
    pub fn pointer_left(&self) {
        self.inner.hovering.store(false, Ordering::Relaxed);
        self.arm();
    }

    /// Pointer entered or left the control surface itself
    pub fn hover_controls(&self, engaged: bool) {
        self.inner.hovering.store(engaged, Ordering::Relaxed);
        if engaged {
            self.cancel();
            self.show();
        } else {
            self.arm();
        }
    }

    /// Keyboard focus landed inside the controls
    pub fn focus_in(&self) {
        self.inner.focused.store(true, Ordering::Relaxed);
        self.cancel();
        self.show();
    }

    /// Keyboard focus left the controls
    pub fn focus_out(&self) {
        self.inner.focused.store(false, Ordering::Relaxed);
        self.arm();
    }

    /// Touch tap: show when hidden, hide when visible and playing
    ///
    /// Touch devices have no hover, so the tap doubles as the explicit
    /// hide gesture. With a zero timeout hiding is disabled outright.
    pub fn tap(&self) {
        if !self.inner.store.snapshot().controls_visible {
            self.show();
            self.arm();
            return;
        }
        if self.inner.timeout.is_zero() {
            return;
        }
        if self.inner.playing.load(Ordering::Relaxed) {
            self.cancel();
            if self.inner.store.set_controls_visible(false) {
                debug!("controls hidden by tap");
            }
        }
    }

    /// Record a playing/non-playing transition
    ///
    /// Leaving playback forces the controls visible; a hidden player
    /// paused by someone else would otherwise strand the user without
    /// controls.
    pub fn sync_playback(&self, playing: bool) {
        self.inner.playing.store(playing, Ordering::Relaxed);
        if playing {
            self.arm();
        } else {
            self.cancel();
            self.show();
        }
    }

    /// Follow phase transitions on a snapshot watch
    ///
    /// Only playing-flag edges reach [`Self::sync_playback`]; routine
    /// time updates must not keep resetting the countdown.
    pub async fn follow(self, mut changes: watch::Receiver<PlayerSnapshot>) {
        let mut playing = changes.borrow().flags.is_playing;
        self.sync_playback(playing);
        while changes.changed().await.is_ok() {
            let now_playing = changes.borrow_and_update().flags.is_playing;
            if now_playing != playing {
                playing = now_playing;
                self.sync_playback(playing);
            }
        }
        debug!("snapshot watch closed, controls timer stopping");
    }

    fn show(&self) {
        if self.inner.store.set_controls_visible(true) {
            trace!("controls shown");
        }
    }

    fn cancel(&self) {
        self.inner.generation.fetch_add(1, Ordering::Relaxed);
    }

    /// Start (or restart) the countdown if hiding is currently eligible
    fn arm(&self) {
        let inner = &self.inner;
        if inner.timeout.is_zero() {
            return;
        }
        if !inner.playing.load(Ordering::Relaxed)
            || inner.hovering.load(Ordering::Relaxed)
            || inner.focused.load(Ordering::Relaxed)
        {
            return;
        }
        let generation = inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // No runtime to count down on; controls stay visible
            return;
        };
        let inner = Arc::clone(inner);
        handle.spawn(async move {
            tokio::time::sleep(inner.timeout).await;
            if inner.generation.load(Ordering::Relaxed) != generation {
                return;
            }
            if !inner.playing.load(Ordering::Relaxed)
                || inner.hovering.load(Ordering::Relaxed)
                || inner.focused.load(Ordering::Relaxed)
            {
                return;
            }
            if inner.store.set_controls_visible(false) {
                debug!("controls hidden after idle timeout");
            }
        });
    }
}
