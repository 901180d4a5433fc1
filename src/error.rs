//! Error taxonomy surfaced by the playback controller.
//!
//! Engine-level failures are converted into these values at the controller
//! boundary; they are returned to the issuing command, pushed to subscribers
//! and kept on the snapshot, but never escape as panics.

use thiserror::Error;

use crate::engine::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// The track's resource could not be opened or decoded.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// A play/pause/seek operation failed in the engine.
    #[error("engine error: {0}")]
    Engine(String),

    /// Seek target rejected (duration unknown).
    #[error("invalid seek position")]
    InvalidPosition,

    /// Too many commands are already waiting behind an in-flight operation.
    #[error("controller busy")]
    Busy,

    /// An engine operation did not complete before the watchdog deadline.
    #[error("engine operation timed out")]
    Timeout,

    #[error("unknown track: {0}")]
    UnknownTrack(String),

    /// Seek requested while no track is loaded.
    #[error("nothing loaded")]
    NothingLoaded,

    /// The controller thread has shut down.
    #[error("controller stopped")]
    Stopped,
}

impl From<EngineError> for PlaybackError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ResourceUnavailable(msg) => Self::ResourceUnavailable(msg),
            EngineError::InvalidPosition => Self::InvalidPosition,
            other => Self::Engine(other.to_string()),
        }
    }
}
