use std::time::Duration;

use crate::engine::{EngineStatus, HandleId};
use crate::error::PlaybackError;
use crate::library::Track;

use super::types::Snapshot;

/// The single playback session, owned by the controller thread.
///
/// Starts empty and is filled in by the first play command.
#[derive(Debug, Default)]
pub(crate) struct PlaybackSession {
    pub active_track: Option<Track>,
    /// Live engine handle. Never leaves the controller.
    pub handle: Option<HandleId>,
    /// Only ever set from engine-confirmed status.
    pub is_playing: bool,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub is_busy: bool,
    /// Pending seek; progress callbacks leave `position` alone while set.
    pub seek_target: Option<Duration>,
    /// Bumped for every load. Status tagged with an older value is stale.
    pub generation: u64,
    /// The natural end of the current handle was already handled.
    pub finished: bool,
    pub last_error: Option<PlaybackError>,
}

impl PlaybackSession {
    /// Point the session at `track` for a new load and return its generation.
    pub fn begin_switch(&mut self, track: Track) -> u64 {
        self.generation += 1;
        self.duration = track.duration;
        self.active_track = Some(track);
        self.handle = None;
        self.is_playing = false;
        self.position = Duration::ZERO;
        self.seek_target = None;
        self.finished = false;
        self.is_busy = true;
        self.generation
    }

    pub fn apply_status(&mut self, status: &EngineStatus) {
        if !status.is_loaded {
            return;
        }
        if self.seek_target.is_none() {
            self.position = status.position;
        }
        if status.duration.is_some() {
            self.duration = status.duration;
        }
        self.is_playing = status.is_playing;
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            track: self.active_track.clone(),
            is_playing: self.is_playing,
            position: self.position,
            duration: self.duration,
            is_busy: self.is_busy,
            is_seeking: self.seek_target.is_some(),
            last_error: self.last_error.clone(),
        }
    }
}
