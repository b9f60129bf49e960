//! Player configuration

use serde::{Deserialize, Serialize};

/// Lower bound for the playback rate policy clamp
pub const MIN_PLAYBACK_RATE: f64 = 0.25;
/// Upper bound for the playback rate policy clamp
pub const MAX_PLAYBACK_RATE: f64 = 4.0;

/// Player configuration
///
/// Everything here is policy, not state: changing a config value never
/// mutates a live snapshot on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Initial volume in [0, 1]
    pub initial_volume: f64,
    /// Start with audio muted
    pub start_muted: bool,
    /// Initial playback rate
    pub initial_rate: f64,
    /// Seconds skipped by seek forward/backward when no delta is given
    pub seek_step: f64,
    /// Volume change applied by the volume up/down shortcuts
    pub volume_step: f64,
    /// Idle milliseconds before overlay controls auto-hide (0 disables auto-hide)
    pub idle_timeout_ms: u64,
    /// Wait before activating the default caption track, giving the
    /// surface time to populate its track list after metadata arrives
    pub caption_settle_ms: u64,
    /// Caption track index to activate once metadata is loaded
    pub default_caption: Option<usize>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            initial_volume: 1.0,
            start_muted: false,
            initial_rate: 1.0,
            seek_step: 10.0,
            volume_step: 0.1,
            idle_timeout_ms: 3000,
            caption_settle_ms: 250,
            default_caption: None,
        }
    }
}

impl PlayerConfig {
    /// Pull out-of-range values back into their legal bounds
    ///
    /// Bad input downgrades to the nearest legal value rather than
    /// failing construction.
    pub fn normalized(mut self) -> Self {
        self.initial_volume = clamp_volume(self.initial_volume);
        self.initial_rate = clamp_rate(self.initial_rate);
        if !self.seek_step.is_finite() || self.seek_step <= 0.0 {
            self.seek_step = Self::default().seek_step;
        }
        if !self.volume_step.is_finite() || self.volume_step <= 0.0 || self.volume_step > 1.0 {
            self.volume_step = Self::default().volume_step;
        }
        self
    }
}

/// Clamp a volume into [0, 1]; non-finite input silences
pub fn clamp_volume(volume: f64) -> f64 {
    if !volume.is_finite() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0)
}

/// Clamp a playback rate into the policy bounds; non-finite input
/// resets to normal speed
pub fn clamp_rate(rate: f64) -> f64 {
    if !rate.is_finite() {
        return 1.0;
    }
    rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE)
}
