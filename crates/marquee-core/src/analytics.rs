//! Normalized player events and analytics capture
//!
//! Every normalized event the bridge or dispatcher produces fans out
//! through an [`EventSink`] to registered listeners:
//! - UI callbacks (play/pause buttons, progress reporting)
//! - the [`AnalyticsEmitter`], which timestamps and sequences records
//!   and optionally flushes them to a beacon endpoint
//!
//! Listeners run synchronously inside the event-processing context and
//! must not call back into the dispatcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::source::Source;
use crate::state::PlayerSnapshot;
use crate::timecode::TimeRanges;
use crate::types::{PlaybackError, PlayerId};

/// Normalized event vocabulary delivered to listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// A source was attached
    Load { source: Source },

    /// Enough data arrived to begin playback
    Ready { duration: f64 },

    Play { position: f64 },

    Pause { position: f64 },

    Ended { position: f64 },

    TimeUpdate { position: f64, played_percent: f64 },

    DurationChange { duration: f64 },

    /// One settled seek, with accurate endpoints even across rapid
    /// repeated seeks
    Seek { from: f64, to: f64 },

    BufferStart {
        position: f64,
        buffered: TimeRanges,
        buffered_percent: f64,
    },

    BufferEnd {
        position: f64,
        buffered: TimeRanges,
        buffered_percent: f64,
    },

    VolumeChange { volume: f64, muted: bool },

    RateChange { rate: f64 },

    EnterFullscreen,

    ExitFullscreen,

    EnterPip,

    ExitPip,

    Error {
        error: PlaybackError,
        source: Option<Source>,
    },
}

impl PlayerEvent {
    /// Stable snake_case name, matching the serialized tag
    pub fn kind(&self) -> &'static str {
        match self {
            PlayerEvent::Load { .. } => "load",
            PlayerEvent::Ready { .. } => "ready",
            PlayerEvent::Play { .. } => "play",
            PlayerEvent::Pause { .. } => "pause",
            PlayerEvent::Ended { .. } => "ended",
            PlayerEvent::TimeUpdate { .. } => "time_update",
            PlayerEvent::DurationChange { .. } => "duration_change",
            PlayerEvent::Seek { .. } => "seek",
            PlayerEvent::BufferStart { .. } => "buffer_start",
            PlayerEvent::BufferEnd { .. } => "buffer_end",
            PlayerEvent::VolumeChange { .. } => "volume_change",
            PlayerEvent::RateChange { .. } => "rate_change",
            PlayerEvent::EnterFullscreen => "enter_fullscreen",
            PlayerEvent::ExitFullscreen => "exit_fullscreen",
            PlayerEvent::EnterPip => "enter_pip",
            PlayerEvent::ExitPip => "exit_pip",
            PlayerEvent::Error { .. } => "error",
        }
    }
}

/// Receiver of normalized events
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &PlayerEvent, snapshot: &PlayerSnapshot);
}

struct FnListener<F>(F);

impl<F> EventListener for FnListener<F>
where
    F: Fn(&PlayerEvent, &PlayerSnapshot) + Send + Sync,
{
    fn on_event(&self, event: &PlayerEvent, snapshot: &PlayerSnapshot) {
        (self.0)(event, snapshot)
    }
}

/// Fan-out point for normalized events
///
/// Cheap to clone; all clones share the same listener set.
#[derive(Clone, Default)]
pub struct EventSink {
    listeners: Arc<RwLock<Vec<Arc<dyn EventListener>>>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Register a closure listener
    pub fn on<F>(&self, callback: F)
    where
        F: Fn(&PlayerEvent, &PlayerSnapshot) + Send + Sync + 'static,
    {
        self.add_listener(Arc::new(FnListener(callback)));
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver one event to every listener, in registration order
    pub fn emit(&self, event: &PlayerEvent, snapshot: &PlayerSnapshot) {
        trace!(event = event.kind(), "player event");
        let listeners: Vec<Arc<dyn EventListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.on_event(event, snapshot);
        }
    }
}

/// One captured event with identity and ordering metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerEventRecord {
    /// Unique record ID
    pub id: Uuid,
    /// Player the event belongs to
    pub player_id: PlayerId,
    /// Capture timestamp
    pub timestamp: DateTime<Utc>,
    /// Monotonic per-player sequence number
    pub sequence: u64,
    /// The event
    #[serde(flatten)]
    pub event: PlayerEvent,
}

/// Buffers normalized events and optionally flushes them to a beacon
pub struct AnalyticsEmitter {
    player_id: PlayerId,
    sequence: AtomicU64,
    buffer: Mutex<Vec<PlayerEventRecord>>,
    max_buffer_size: usize,
    beacon_url: Option<String>,
}

impl AnalyticsEmitter {
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            sequence: AtomicU64::new(0),
            buffer: Mutex::new(Vec::new()),
            max_buffer_size: 50,
            beacon_url: None,
        }
    }

    /// Emitter that posts full batches to `beacon_url`
    pub fn with_beacon(player_id: PlayerId, beacon_url: impl Into<String>) -> Self {
        Self {
            beacon_url: Some(beacon_url.into()),
            ..Self::new(player_id)
        }
    }

    /// Override the auto-flush threshold
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size.max(1);
        self
    }

    /// Capture one event
    ///
    /// When the buffer reaches its threshold and a beacon is
    /// configured, the batch is posted fire-and-forget on the current
    /// runtime.
    pub fn record(&self, event: PlayerEvent) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let record = PlayerEventRecord {
            id: Uuid::new_v4(),
            player_id: self.player_id,
            timestamp: Utc::now(),
            sequence,
            event,
        };

        let batch = {
            let mut buffer = self.lock();
            buffer.push(record);
            if self.beacon_url.is_some() && buffer.len() >= self.max_buffer_size {
                Some(buffer.drain(..).collect::<Vec<_>>())
            } else {
                None
            }
        };

        if let (Some(batch), Some(url)) = (batch, self.beacon_url.clone()) {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        post_batch(&url, &batch).await;
                    });
                }
                Err(_) => debug!(count = batch.len(), "no runtime, dropping analytics batch"),
            }
        }
    }

    /// Post everything currently buffered
    pub async fn flush(&self) {
        let batch: Vec<PlayerEventRecord> = self.lock().drain(..).collect();
        if batch.is_empty() {
            return;
        }
        if let Some(url) = &self.beacon_url {
            post_batch(url, &batch).await;
        }
    }

    /// Snapshot of buffered records
    pub fn records(&self) -> Vec<PlayerEventRecord> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PlayerEventRecord>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventListener for AnalyticsEmitter {
    fn on_event(&self, event: &PlayerEvent, _snapshot: &PlayerSnapshot) {
        self.record(event.clone());
    }
}

async fn post_batch(url: &str, batch: &[PlayerEventRecord]) {
    debug!(count = batch.len(), url, "flushing analytics batch");
    let client = reqwest::Client::new();
    if let Err(error) = client.post(url).json(&batch).send().await {
        warn!(%error, "analytics beacon post failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_delivers_in_registration_order() {
        let sink = EventSink::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let order = order.clone();
            sink.on(move |_, _| order.lock().unwrap().push(tag));
        }

        sink.emit(&PlayerEvent::Play { position: 0.0 }, &PlayerSnapshot::default());

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn listeners_see_the_snapshot_payload() {
        let sink = EventSink::new();
        let seen = Arc::new(Mutex::new(None));
        {
            let seen = seen.clone();
            sink.on(move |event, snapshot| {
                *seen.lock().unwrap() = Some((event.kind(), snapshot.volume));
            });
        }

        let mut snapshot = PlayerSnapshot::default();
        snapshot.volume = 0.25;
        sink.emit(&PlayerEvent::Pause { position: 3.0 }, &snapshot);

        assert_eq!(*seen.lock().unwrap(), Some(("pause", 0.25)));
    }

    #[test]
    fn emitter_sequences_records_monotonically() {
        let emitter = AnalyticsEmitter::new(PlayerId::new());

        emitter.record(PlayerEvent::Play { position: 0.0 });
        emitter.record(PlayerEvent::Pause { position: 5.0 });
        emitter.record(PlayerEvent::Ended { position: 9.0 });

        let records = emitter.records();
        let sequences: Vec<u64> = records.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn record_json_flattens_the_event() {
        let emitter = AnalyticsEmitter::new(PlayerId::new());
        emitter.record(PlayerEvent::Seek { from: 10.0, to: 42.0 });

        let record = &emitter.records()[0];
        let json = serde_json::to_value(record).unwrap();

        assert_eq!(json["event"], "seek");
        assert_eq!(json["from"], 10.0);
        assert_eq!(json["to"], 42.0);
        assert!(json["sequence"].is_u64());
    }

    #[test]
    fn emitter_plugs_into_the_sink() {
        let emitter = Arc::new(AnalyticsEmitter::new(PlayerId::new()));
        let sink = EventSink::new();
        sink.add_listener(emitter.clone());

        sink.emit(&PlayerEvent::Ready { duration: 12.0 }, &PlayerSnapshot::default());

        assert_eq!(emitter.records().len(), 1);
        assert_eq!(emitter.records()[0].event.kind(), "ready");
    }

    #[test]
    fn event_kinds_match_serialized_tags() {
        let events = [
            PlayerEvent::Play { position: 0.0 },
            PlayerEvent::BufferStart {
                position: 0.0,
                buffered: TimeRanges::new(),
                buffered_percent: 0.0,
            },
            PlayerEvent::EnterFullscreen,
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["event"], event.kind());
        }
    }
}
