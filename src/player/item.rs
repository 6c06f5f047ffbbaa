//! Playable items.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// Anything the controller can play.
///
/// Identity for the controller's purposes is the locator string: after a
/// mutation the current item is found again by comparing locators.
pub trait PlaylistItem: Debug + Send + Sync {
    /// Resolvable audio locator (URL or file path).
    fn locator(&self) -> &str;

    /// Whether the engine may cache this item on disk.
    fn cache_enabled(&self) -> bool {
        true
    }

    /// Display title for now-playing surfaces.
    fn title(&self) -> Option<&str> {
        None
    }

    /// Display artist for now-playing surfaces.
    fn artist(&self) -> Option<&str> {
        None
    }
}

/// Shared handle to an item held by the playlist.
pub type SharedItem = Arc<dyn PlaylistItem>;

/// A plain playlist entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Audio locator
    pub locator: String,
    /// Track title
    #[serde(default)]
    pub title: Option<String>,
    /// Artist name
    #[serde(default)]
    pub artist: Option<String>,
    /// Allow on-disk caching
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,
}

fn default_cache_enabled() -> bool {
    true
}

impl Track {
    /// Create a track from its locator.
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            title: None,
            artist: None,
            cache_enabled: true,
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the artist.
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    /// Disable caching for this track.
    pub fn uncached(mut self) -> Self {
        self.cache_enabled = false;
        self
    }

    /// Wrap into a shared item.
    pub fn shared(self) -> SharedItem {
        Arc::new(self)
    }

    /// Display title, falling back to the last locator segment.
    pub fn display_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| {
            self.locator
                .rsplit(['/', '\\'])
                .next()
                .filter(|s| !s.is_empty())
                .unwrap_or("Unknown")
                .to_string()
        })
    }
}

impl PlaylistItem for Track {
    fn locator(&self) -> &str {
        &self.locator
    }

    fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }
}

/// Whether two items denote the same playable resource.
pub fn same_locator(a: &dyn PlaylistItem, b: &dyn PlaylistItem) -> bool {
    a.locator() == b.locator()
}
