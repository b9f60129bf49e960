//! Marquee Core - Headless Video Player Engine
//!
//! This crate provides the state-and-event core of a video player:
//! - Canonical playback state with derived-field consistency
//! - Action dispatch from user intents to surface effects
//! - Surface event normalization into state and analytics
//! - Source classification (files, adaptive streams, embeds)
//! - Controls auto-hide timer and keyboard shortcut routing
//! - Playlist advancement, plugin hooks, analytics emission
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Marquee Core                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐     │
//! │  │    Action    │   │    Event     │   │   Controls   │     │
//! │  │  Dispatcher  │   │    Bridge    │   │    Timer     │     │
//! │  └──────┬───────┘   └──────┬───────┘   └──────┬───────┘     │
//! │         │                  │                  │             │
//! │         └──────────────────┼──────────────────┘             │
//! │                            │                                │
//! │                     ┌──────┴──────┐                         │
//! │                     │    State    │──▶ watch subscribers    │
//! │                     │    Store    │──▶ plugins              │
//! │                     └──────┬──────┘                         │
//! │                            │                                │
//! │  ┌──────────────┐   ┌──────┴──────┐   ┌──────────────┐     │
//! │  │   Shortcut   │   │  Playback   │   │   Analytics  │     │
//! │  │    Router    │   │   Surface   │   │     Sink     │     │
//! │  └──────────────┘   └─────────────┘   └──────────────┘     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The [`Player`] wires one [`surface::PlaybackSurface`] to the whole
//! stack. Intents flow through the [`actions::ActionDispatcher`]; truth
//! flows back through the [`events::EventBridge`] into the
//! [`state::StateStore`], whose snapshots everyone observes.

pub mod actions;
pub mod analytics;
pub mod config;
pub mod error;
pub mod events;
pub mod idle;
pub mod keyboard;
pub mod player;
pub mod playlist;
pub mod plugin;
pub mod source;
pub mod state;
pub mod surface;
pub mod timecode;
pub mod types;

pub use actions::ActionDispatcher;
pub use analytics::{AnalyticsEmitter, EventListener, EventSink, PlayerEvent, PlayerEventRecord};
pub use config::PlayerConfig;
pub use error::{Error, Result, SurfaceError};
pub use events::EventBridge;
pub use idle::ControlsTimer;
pub use keyboard::{KeyTarget, ShortcutAction, ShortcutRouter};
pub use player::Player;
pub use playlist::{Playlist, PlaylistItem};
pub use plugin::{PlayerPlugin, PluginContext, PluginRegistry};
pub use source::{Source, SourceKind};
pub use state::{PlayerSnapshot, StateStore};
pub use surface::{
    EmbedSurface, PlaybackSurface, SimulatedSurface, SurfaceCapabilities, SurfaceEvent,
};
pub use timecode::{format_time, parse_time, TimeRanges};
pub use types::{CaptionTrack, PlaybackError, PlaybackFlags, PlaybackPhase, PlayerId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the player library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Marquee Core initialized");
}
