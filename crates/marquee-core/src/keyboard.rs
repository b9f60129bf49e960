//! Keyboard shortcut routing
//!
//! Maps key values to dispatcher calls. The router sees already-scoped
//! key events (the embedder decides which element listens) and applies
//! one policy of its own: keys aimed at text entry are never touched.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actions::ActionDispatcher;

/// Player intent a key can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutAction {
    TogglePlay,
    Stop,
    SeekForward,
    SeekBackward,
    VolumeUp,
    VolumeDown,
    ToggleMute,
    ToggleFullscreen,
    TogglePip,
    ToggleCaptions,
}

impl ShortcutAction {
    /// Human-readable label for help output
    pub fn describe(&self) -> &'static str {
        match self {
            ShortcutAction::TogglePlay => "toggle play/pause",
            ShortcutAction::Stop => "stop and rewind",
            ShortcutAction::SeekForward => "seek forward",
            ShortcutAction::SeekBackward => "seek backward",
            ShortcutAction::VolumeUp => "volume up",
            ShortcutAction::VolumeDown => "volume down",
            ShortcutAction::ToggleMute => "toggle mute",
            ShortcutAction::ToggleFullscreen => "toggle fullscreen",
            ShortcutAction::TogglePip => "toggle picture-in-picture",
            ShortcutAction::ToggleCaptions => "toggle captions",
        }
    }
}

/// Where keyboard focus sat when the key arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyTarget {
    /// The player container itself
    Player,
    /// A text input, textarea, or editable region
    TextInput,
    /// Anything else on the page
    Other,
}

/// Key-to-action router over an [`ActionDispatcher`]
pub struct ShortcutRouter {
    dispatcher: Arc<ActionDispatcher>,
    bindings: HashMap<String, ShortcutAction>,
}

impl ShortcutRouter {
    /// Router with the built-in bindings
    pub fn new(dispatcher: Arc<ActionDispatcher>) -> Self {
        Self::with_bindings(dispatcher, Self::default_bindings())
    }

    /// Router with a caller-supplied binding table
    pub fn with_bindings(
        dispatcher: Arc<ActionDispatcher>,
        bindings: HashMap<String, ShortcutAction>,
    ) -> Self {
        Self {
            dispatcher,
            bindings,
        }
    }

    /// The stock table: media-player conventions plus vim-style j/k/l
    pub fn default_bindings() -> HashMap<String, ShortcutAction> {
        let mut bindings = HashMap::new();
        bindings.insert(" ".to_string(), ShortcutAction::TogglePlay);
        bindings.insert("k".to_string(), ShortcutAction::TogglePlay);
        bindings.insert("ArrowRight".to_string(), ShortcutAction::SeekForward);
        bindings.insert("l".to_string(), ShortcutAction::SeekForward);
        bindings.insert("ArrowLeft".to_string(), ShortcutAction::SeekBackward);
        bindings.insert("j".to_string(), ShortcutAction::SeekBackward);
        bindings.insert("ArrowUp".to_string(), ShortcutAction::VolumeUp);
        bindings.insert("ArrowDown".to_string(), ShortcutAction::VolumeDown);
        bindings.insert("m".to_string(), ShortcutAction::ToggleMute);
        bindings.insert("f".to_string(), ShortcutAction::ToggleFullscreen);
        bindings.insert("p".to_string(), ShortcutAction::TogglePip);
        bindings.insert("c".to_string(), ShortcutAction::ToggleCaptions);
        bindings
    }

    /// Bind (or rebind) a key
    pub fn bind(&mut self, key: impl Into<String>, action: ShortcutAction) {
        self.bindings.insert(normalize_key(&key.into()).into_owned(), action);
    }

    /// Remove a binding
    pub fn unbind(&mut self, key: &str) {
        self.bindings.remove(normalize_key(key).as_ref());
    }

    /// The current table, sorted by key for stable display
    pub fn bindings(&self) -> Vec<(&str, ShortcutAction)> {
        let mut entries: Vec<_> = self
            .bindings
            .iter()
            .map(|(key, action)| (key.as_str(), *action))
            .collect();
        entries.sort_by_key(|(key, _)| *key);
        entries
    }

    /// Route one key event; returns whether it was consumed
    ///
    /// Keys aimed at text entry always pass through so typing never
    /// fights the player. Letter keys match case-insensitively.
    pub async fn handle(&self, key: &str, target: KeyTarget) -> bool {
        if target == KeyTarget::TextInput {
            return false;
        }
        let normalized = normalize_key(key);
        let Some(action) = self.bindings.get(normalized.as_ref()) else {
            return false;
        };
        debug!(key = %normalized, action = ?action, "shortcut");
        self.perform(*action).await;
        true
    }

    async fn perform(&self, action: ShortcutAction) {
        match action {
            ShortcutAction::TogglePlay => {
                if let Err(error) = self.dispatcher.toggle_play().await {
                    debug!(%error, "shortcut play toggle rejected");
                }
            }
            ShortcutAction::Stop => self.dispatcher.stop(),
            ShortcutAction::SeekForward => self.dispatcher.seek_forward(None),
            ShortcutAction::SeekBackward => self.dispatcher.seek_backward(None),
            ShortcutAction::VolumeUp => self.dispatcher.volume_up(),
            ShortcutAction::VolumeDown => self.dispatcher.volume_down(),
            ShortcutAction::ToggleMute => self.dispatcher.toggle_mute(),
            ShortcutAction::ToggleFullscreen => self.dispatcher.toggle_fullscreen().await,
            ShortcutAction::TogglePip => self.dispatcher.toggle_pip().await,
            ShortcutAction::ToggleCaptions => self.dispatcher.toggle_captions(),
        }
    }
}

/// Letter keys compare case-insensitively; named keys pass through
fn normalize_key(key: &str) -> Cow<'_, str> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_uppercase() => {
            Cow::Owned(c.to_ascii_lowercase().to_string())
        }
        _ => Cow::Borrowed(key),
    }
}
