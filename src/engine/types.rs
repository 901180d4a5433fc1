//! Engine contract shared by the rodio backend, the driver thread and tests.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

/// Opaque reference to one loaded resource inside an engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct HandleId(pub u64);

/// Point-in-time view of a loaded resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStatus {
    pub is_loaded: bool,
    pub is_playing: bool,
    pub position: Duration,
    /// `None` while the length of the resource is unknown.
    pub duration: Option<Duration>,
    /// Set once when the resource reaches its natural end.
    pub did_finish: bool,
    pub error: Option<String>,
}

/// Receives status updates for a single handle.
pub type StatusCallback = Box<dyn Fn(EngineStatus) + Send>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("cannot open {0}")]
    ResourceUnavailable(String),

    #[error("handle is not loaded")]
    InvalidHandle,

    /// Seeking needs a known duration.
    #[error("position is out of range")]
    InvalidPosition,

    /// A newer load was requested while this one ran.
    #[error("load superseded by a newer request")]
    Superseded,

    #[error("audio backend: {0}")]
    Backend(String),
}

/// Operations the controller needs from an audio backend.
///
/// Implementations are driven from a single thread and need not be `Send`.
pub trait AudioEngine {
    /// Prepare `locator` for playback, paused at position zero.
    fn load(&mut self, locator: &Path) -> Result<HandleId, EngineError>;

    fn play(&mut self, handle: HandleId) -> Result<EngineStatus, EngineError>;

    fn pause(&mut self, handle: HandleId) -> Result<EngineStatus, EngineError>;

    fn stop(&mut self, handle: HandleId) -> Result<(), EngineError>;

    /// Move to `position`, clamped to `[0, duration]`.
    fn seek(&mut self, handle: HandleId, position: Duration) -> Result<EngineStatus, EngineError>;

    /// Release the handle. Unloading an unknown handle is not an error.
    fn unload(&mut self, handle: HandleId) -> Result<(), EngineError>;

    /// Non-blocking snapshot. Unknown handles report `is_loaded == false`.
    fn status(&self, handle: HandleId) -> EngineStatus;

    /// Register the status callback for `handle`, replacing any previous one.
    fn subscribe(&mut self, handle: HandleId, callback: StatusCallback) -> Result<(), EngineError>;

    /// Give the backend a chance to emit progress and end-of-track callbacks.
    fn pump(&mut self);

    /// Fade out whatever is audible and release every handle.
    fn shutdown(&mut self, fade_out: Duration);
}
