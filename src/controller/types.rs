use std::sync::mpsc::Sender;
use std::time::Duration;

use crate::engine::{EngineError, EngineStatus, SwitchOutcome};
use crate::error::PlaybackError;
use crate::library::{Track, TrackId};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// User-facing commands, serialized by the controller thread.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PlayTrack(TrackId),
    TogglePlayPause,
    SeekTo(Duration),
    Advance(Direction),
}

/// What observers may see of the playback session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub track: Option<Track>,
    pub is_playing: bool,
    pub position: Duration,
    pub duration: Option<Duration>,
    /// A track switch is in flight.
    pub is_busy: bool,
    pub is_seeking: bool,
    pub last_error: Option<PlaybackError>,
}

impl Snapshot {
    /// Playback progress in `[0, 1]`, or 0 when the duration is unknown.
    pub fn progress(&self) -> f64 {
        match self.duration {
            Some(d) if !d.is_zero() => {
                (self.position.as_secs_f64() / d.as_secs_f64()).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }
}

/// Pushed to subscribers. Every update carries the full snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Updated(Snapshot),
    Error(PlaybackError),
}

pub(crate) type Responder = Sender<Result<(), PlaybackError>>;

/// Engine replies routed back into the controller inbox.
#[derive(Debug)]
pub(crate) enum Completion {
    Switch(Result<SwitchOutcome, EngineError>),
    Status(Result<EngineStatus, EngineError>),
}

/// Everything the controller thread reacts to.
pub(crate) enum Msg {
    Command {
        command: Command,
        reply: Option<Responder>,
    },
    Status {
        generation: u64,
        status: EngineStatus,
    },
    Completed {
        ticket: u64,
        completion: Completion,
    },
    Subscribe(Sender<PlaybackEvent>),
    Shutdown {
        fade_out: Duration,
    },
}
