use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use crate::controller::{Pending, PlaybackController, PlaybackEvent, Snapshot};

/// Where a view reads playback state from.
pub trait SnapshotSource {
    fn snapshot(&self) -> Snapshot;

    /// Push channel, when the source supports one.
    fn subscribe(&self) -> Option<Receiver<PlaybackEvent>>;
}

impl SnapshotSource for PlaybackController {
    fn snapshot(&self) -> Snapshot {
        PlaybackController::snapshot(self)
    }

    fn subscribe(&self) -> Option<Receiver<PlaybackEvent>> {
        Some(PlaybackController::subscribe(self))
    }
}

/// One screen's local copy of the playback state.
///
/// The controller is authoritative. The view converges to it on activation,
/// on every pushed event, and on its own polling interval.
pub struct PlaybackView {
    state: Snapshot,
    events: Option<Receiver<PlaybackEvent>>,
    active: bool,
    interval: Duration,
    last_poll: Option<Instant>,
    /// Optimistic play/pause icon and when it was set.
    tentative: Option<(bool, Instant)>,
}

impl PlaybackView {
    pub fn new(interval: Duration) -> Self {
        Self {
            state: Snapshot::default(),
            events: None,
            active: false,
            interval,
            last_poll: None,
            tentative: None,
        }
    }

    pub fn state(&self) -> &Snapshot {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Play/pause as the screen should draw it.
    pub fn is_playing(&self) -> bool {
        self.tentative
            .map(|(playing, _)| playing)
            .unwrap_or(self.state.is_playing)
    }

    /// Replace the local state with the controller's and start listening.
    pub fn activate(&mut self, source: &impl SnapshotSource, now: Instant) {
        self.state = source.snapshot();
        self.events = source.subscribe();
        self.active = true;
        self.last_poll = Some(now);
        self.tentative = None;
    }

    /// Stop listening. The last state stays visible.
    pub fn deactivate(&mut self) {
        self.events = None;
        self.active = false;
        self.tentative = None;
    }

    /// Apply pushed events and, once per interval, poll the snapshot.
    /// Returns true when anything visible changed.
    pub fn reconcile(&mut self, source: &impl SnapshotSource, now: Instant) -> bool {
        if !self.active {
            return false;
        }
        let before = (self.state.clone(), self.is_playing());

        let pushed: Vec<PlaybackEvent> = match &self.events {
            Some(rx) => rx.try_iter().collect(),
            None => Vec::new(),
        };
        for event in pushed {
            match event {
                PlaybackEvent::Updated(snapshot) => self.accept(snapshot),
                PlaybackEvent::Error(err) => self.state.last_error = Some(err),
            }
        }

        let due = self
            .last_poll
            .is_none_or(|at| now.saturating_duration_since(at) >= self.interval);
        if due {
            let snapshot = source.snapshot();
            if snapshot.is_busy {
                // Mid-switch values are transient; only show the spinner.
                self.state.is_busy = true;
            } else {
                self.accept(snapshot);
            }
            self.last_poll = Some(now);
        }

        if let Some((_, at)) = self.tentative {
            if now.saturating_duration_since(at) >= self.interval {
                self.tentative = None;
            }
        }

        before != (self.state.clone(), self.is_playing())
    }

    /// Flip the play/pause icon right away and ask the controller to toggle.
    pub fn toggle_optimistic(&mut self, controller: &PlaybackController, now: Instant) -> Pending {
        self.mark_tentative(now);
        controller.toggle_play_pause()
    }

    pub(crate) fn mark_tentative(&mut self, now: Instant) {
        if self.state.track.is_some() {
            self.tentative = Some((!self.is_playing(), now));
        }
    }

    fn accept(&mut self, snapshot: Snapshot) {
        if let Some((playing, _)) = self.tentative {
            if snapshot.is_playing == playing {
                self.tentative = None;
            }
        }
        self.state = snapshot;
    }
}
