//! Playlist types
//!
//! Playlists are supplied by the caller and read-only to the core; the
//! only mutable piece is the cursor the action dispatcher keeps while
//! navigating.

use serde::{Deserialize, Serialize};

/// One entry in a playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    /// Caller-chosen identifier
    pub id: String,
    /// Raw source location, classified when the item is activated
    pub src: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub poster: Option<String>,
    /// Advertised duration in seconds, if known up front
    #[serde(default)]
    pub duration: Option<f64>,
    /// Opaque caller data carried through untouched
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl PlaylistItem {
    pub fn new(id: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            src: src.into(),
            title: None,
            poster: None,
            duration: None,
            metadata: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// An ordered list of items plus navigation policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub items: Vec<PlaylistItem>,
    /// Item activated when the playlist is attached
    #[serde(default)]
    pub start_index: usize,
    /// Advance to the next item automatically when one ends
    #[serde(default)]
    pub auto_play_next: bool,
    /// Wrap navigation past either end back around
    #[serde(default, rename = "loop")]
    pub loops: bool,
}

impl Playlist {
    pub fn new(items: Vec<PlaylistItem>) -> Self {
        Self {
            items,
            start_index: 0,
            auto_play_next: false,
            loops: false,
        }
    }

    pub fn with_start_index(mut self, index: usize) -> Self {
        self.start_index = index;
        self
    }

    pub fn with_auto_play_next(mut self, auto: bool) -> Self {
        self.auto_play_next = auto;
        self
    }

    pub fn with_loop(mut self, loops: bool) -> Self {
        self.loops = loops;
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PlaylistItem> {
        self.items.get(index)
    }

    /// Index after `current`, or `None` at the end of a non-looping list
    pub fn next_index(&self, current: usize) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        if current + 1 < self.items.len() {
            Some(current + 1)
        } else if self.loops {
            Some(0)
        } else {
            None
        }
    }

    /// Index before `current`, or `None` at the start of a non-looping list
    pub fn previous_index(&self, current: usize) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        if current > 0 {
            Some(current - 1)
        } else if self.loops {
            Some(self.items.len() - 1)
        } else {
            None
        }
    }
}
