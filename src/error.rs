//! Crate-wide error types.
//!
//! Library modules return [`Result`] with the [`Error`] enum below, while the
//! CLI binary uses `anyhow` for convenient propagation.
//!
//! # Policy
//!
//! Not every variant reaches a caller. Playlist mutations absorb
//! [`Error::InvalidIndex`] and [`Error::ActiveSlotProtected`] (they are logged
//! and the mutation reports `false`), transport failures surface as
//! [`PlaybackState::Error`](crate::player::PlaybackState::Error) through the
//! observer, and only deliberate user operations such as clearing the cache
//! raise an explicit error.

use std::path::PathBuf;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Index out of range for a playlist operation
    #[error("Index {index} out of range for playlist of {len} items")]
    InvalidIndex { index: usize, len: usize },

    /// Attempt to replace or remove the live slot
    #[error("Playlist slot {0} is active and cannot be changed")]
    ActiveSlotProtected(usize),

    /// The streaming engine could not open or drive a transport
    #[error("Transport failure for {locator}: {message}")]
    TransportFailure { locator: String, message: String },

    /// Cache clearing requested while something is playing
    #[error("Cannot clear cached files while playback is active")]
    CacheBusy,

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache directory is missing or unreadable
    #[error("Cache directory unavailable: {0}")]
    CacheDir(PathBuf),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an invalid index error.
    pub fn invalid_index(index: usize, len: usize) -> Self {
        Self::InvalidIndex { index, len }
    }

    /// Create a transport failure.
    pub fn transport(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportFailure {
            locator: locator.into(),
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error is one the playlist absorbs silently.
    pub fn is_absorbed(&self) -> bool {
        match self {
            Self::InvalidIndex { .. } | Self::ActiveSlotProtected(_) => true,
            Self::WithContext { source, .. } => source.is_absorbed(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_index(7, 3);
        let msg = err.to_string();
        assert!(msg.contains('7'));
        assert!(msg.contains('3'));
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::transport("http://a/1.mp3", "connection reset").context("while preloading");
        let msg = err.to_string();
        assert!(msg.contains("while preloading"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_absorbed_classification() {
        assert!(Error::invalid_index(1, 0).is_absorbed());
        assert!(Error::ActiveSlotProtected(0).is_absorbed());
        assert!(Error::ActiveSlotProtected(0).context("remove").is_absorbed());
        assert!(!Error::CacheBusy.is_absorbed());
    }

    #[test]
    fn test_result_ext() {
        let result: Result<()> = Err(Error::CacheBusy);
        let with_ctx = result.with_context("clearing cache");
        assert!(with_ctx.unwrap_err().to_string().contains("clearing cache"));
    }
}
