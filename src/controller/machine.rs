//! Controller state machine.
//!
//! Everything here runs on the controller thread. At most one engine
//! operation is in flight; commands that arrive meanwhile wait in a bounded
//! FIFO and are evaluated only when they reach the front.

use std::collections::VecDeque;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::{LoopMode, Settings};
use crate::engine::{
    EngineError, EngineLink, EngineRequest, EngineStatus, Reply, StatusCallback, SwitchOutcome,
};
use crate::error::PlaybackError;
use crate::library::{Catalog, Track, TrackId};

use super::navigation;
use super::session::PlaybackSession;
use super::types::{Command, Completion, Msg, PlaybackEvent, Responder, Snapshot};

#[derive(Debug, Clone)]
pub(crate) struct CoreSettings {
    pub load_timeout: Duration,
    pub max_queued_commands: usize,
    pub loop_mode: LoopMode,
    pub auto_advance: bool,
}

impl From<&Settings> for CoreSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            load_timeout: settings.controller.load_timeout(),
            max_queued_commands: settings.controller.max_queued_commands,
            loop_mode: settings.playback.loop_mode,
            auto_advance: settings.playback.auto_advance,
        }
    }
}

enum Job {
    User {
        command: Command,
        reply: Option<Responder>,
    },
    /// Move on from `pivot`, the track that just ended or failed to load.
    AutoAdvance { pivot: TrackId },
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Switch { auto: bool },
    Play,
    Pause,
    Seek { previous: Duration },
}

struct InFlight {
    ticket: u64,
    op: Op,
    reply: Option<Responder>,
    deadline: Instant,
}

fn respond(reply: Option<Responder>, result: Result<(), PlaybackError>) {
    if let Some(tx) = reply {
        let _ = tx.send(result);
    }
}

pub(crate) struct ControllerCore<L> {
    catalog: Arc<Catalog>,
    settings: CoreSettings,
    link: L,
    inbox: Sender<Msg>,
    session: PlaybackSession,
    in_flight: Option<InFlight>,
    deferred: VecDeque<Job>,
    next_ticket: u64,
    auto_failures: usize,
    shared: Arc<Mutex<Snapshot>>,
    subscribers: Vec<Sender<PlaybackEvent>>,
    published: Snapshot,
}

impl<L: EngineLink> ControllerCore<L> {
    pub fn new(
        catalog: Arc<Catalog>,
        settings: CoreSettings,
        link: L,
        inbox: Sender<Msg>,
        shared: Arc<Mutex<Snapshot>>,
    ) -> Self {
        Self {
            catalog,
            settings,
            link,
            inbox,
            session: PlaybackSession::default(),
            in_flight: None,
            deferred: VecDeque::new(),
            next_ticket: 0,
            auto_failures: 0,
            shared,
            subscribers: Vec::new(),
            published: Snapshot::default(),
        }
    }

    pub fn handle(&mut self, msg: Msg) {
        match msg {
            Msg::Command { command, reply } => self.submit(Job::User { command, reply }),
            Msg::Status { generation, status } => self.on_status(generation, status),
            Msg::Completed { ticket, completion } => self.on_completed(ticket, completion),
            Msg::Subscribe(tx) => self.subscribers.push(tx),
            Msg::Shutdown { fade_out } => self.shutdown(fade_out),
        }
        self.publish();
    }

    /// Watchdog and fallback status poll.
    pub fn on_tick(&mut self, now: Instant) {
        if let Some(flight) = self.in_flight.take_if(|f| now >= f.deadline) {
            warn!(ticket = flight.ticket, op = ?flight.op, "engine operation timed out");
            match flight.op {
                Op::Switch { .. } => {
                    // Whatever the abandoned load produces is now stale.
                    self.session.generation += 1;
                    self.link.supersede(self.session.generation);
                    self.session.is_busy = false;
                    self.session.is_playing = false;
                }
                Op::Seek { previous } => {
                    self.session.seek_target = None;
                    self.session.position = previous;
                }
                Op::Play | Op::Pause => {}
            }
            self.fail(PlaybackError::Timeout, flight.reply);
            self.drain();
        } else if self.in_flight.is_none() {
            self.poll_status();
        }
        self.publish();
    }

    fn submit(&mut self, job: Job) {
        if self.in_flight.is_none() {
            self.execute(job);
            return;
        }
        if self.deferred.len() >= self.settings.max_queued_commands {
            match job {
                Job::User { command, reply } => {
                    debug!(?command, "command queue full");
                    respond(reply, Err(PlaybackError::Busy));
                }
                Job::AutoAdvance { pivot } => {
                    warn!(%pivot, "command queue full, auto-advance dropped");
                }
            }
            return;
        }
        self.deferred.push_back(job);
    }

    fn drain(&mut self) {
        while self.in_flight.is_none() {
            let Some(job) = self.deferred.pop_front() else {
                break;
            };
            self.execute(job);
        }
    }

    fn execute(&mut self, job: Job) {
        match job {
            Job::User { command, reply } => self.execute_command(command, reply),
            Job::AutoAdvance { pivot } => self.auto_advance(&pivot),
        }
    }

    fn execute_command(&mut self, command: Command, reply: Option<Responder>) {
        match command {
            Command::PlayTrack(id) => {
                let track = self.catalog.find(&id).cloned();
                match track {
                    Some(track) => self.play_track(track, reply),
                    None => respond(reply, Err(PlaybackError::UnknownTrack(id.to_string()))),
                }
            }
            Command::TogglePlayPause => self.toggle(reply),
            Command::SeekTo(position) => self.seek(position, reply),
            Command::Advance(direction) => {
                let current = self.session.active_track.as_ref().map(|t| &t.id);
                let target = navigation::neighbor(&self.catalog, current, direction).cloned();
                match target {
                    Some(track) => self.play_track(track, reply),
                    None => respond(reply, Ok(())),
                }
            }
        }
    }

    fn play_track(&mut self, track: Track, reply: Option<Responder>) {
        let same = self
            .session
            .active_track
            .as_ref()
            .is_some_and(|t| t.id == track.id);
        match self.session.handle {
            Some(_) if same && self.session.is_playing => respond(reply, Ok(())),
            Some(handle) if same => self.dispatch(Op::Play, reply, Completion::Status, |r| {
                EngineRequest::Play { handle, reply: r }
            }),
            _ => self.start_switch(track, reply, false),
        }
    }

    fn toggle(&mut self, reply: Option<Responder>) {
        let Some(track) = self.session.active_track.clone() else {
            respond(reply, Ok(()));
            return;
        };
        match self.session.handle {
            // The last load failed; try it again.
            None => self.start_switch(track, reply, false),
            Some(handle) if self.session.is_playing => {
                self.dispatch(Op::Pause, reply, Completion::Status, |r| {
                    EngineRequest::Pause { handle, reply: r }
                })
            }
            Some(handle) => self.dispatch(Op::Play, reply, Completion::Status, |r| {
                EngineRequest::Play { handle, reply: r }
            }),
        }
    }

    fn seek(&mut self, position: Duration, reply: Option<Responder>) {
        let Some(handle) = self.session.handle else {
            respond(reply, Err(PlaybackError::NothingLoaded));
            return;
        };
        let Some(duration) = self.session.duration else {
            respond(reply, Err(PlaybackError::InvalidPosition));
            return;
        };
        let target = position.min(duration);
        let previous = self.session.position;
        self.session.seek_target = Some(target);
        self.session.position = target;
        self.dispatch(Op::Seek { previous }, reply, Completion::Status, |r| {
            EngineRequest::Seek {
                handle,
                position: target,
                reply: r,
            }
        });
    }

    fn auto_advance(&mut self, pivot: &TrackId) {
        let still_current = self
            .session
            .active_track
            .as_ref()
            .is_some_and(|t| &t.id == pivot);
        if !still_current {
            debug!(%pivot, "auto-advance skipped, track changed meanwhile");
            return;
        }
        let next = navigation::after_finish(&self.catalog, pivot, self.settings.loop_mode).cloned();
        match next {
            Some(track) => self.start_switch(track, None, true),
            None => debug!(%pivot, "end of catalog, playback stopped"),
        }
    }

    fn start_switch(&mut self, track: Track, reply: Option<Responder>, auto: bool) {
        let generation = self.session.begin_switch(track.clone());
        self.link.supersede(generation);
        debug!(generation, track = %track.id, auto, "switching track");

        let inbox = self.inbox.clone();
        let on_status: StatusCallback = Box::new(move |status| {
            let _ = inbox.send(Msg::Status { generation, status });
        });
        let locator = track.path;
        self.dispatch(Op::Switch { auto }, reply, Completion::Switch, |r| {
            EngineRequest::Switch {
                generation,
                locator,
                on_status,
                reply: r,
            }
        });
    }

    fn dispatch<T: Send + 'static>(
        &mut self,
        op: Op,
        reply: Option<Responder>,
        wrap: fn(Result<T, EngineError>) -> Completion,
        build: impl FnOnce(Reply<T>) -> EngineRequest,
    ) {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let inbox = self.inbox.clone();
        let engine_reply: Reply<T> = Box::new(move |result| {
            let _ = inbox.send(Msg::Completed {
                ticket,
                completion: wrap(result),
            });
        });

        self.in_flight = Some(InFlight {
            ticket,
            op,
            reply,
            deadline: Instant::now() + self.settings.load_timeout,
        });
        if let Err(err) = self.link.send(build(engine_reply)) {
            self.on_completed(ticket, wrap(Err(err)));
        }
    }

    fn on_completed(&mut self, ticket: u64, completion: Completion) {
        let Some(flight) = self.in_flight.take_if(|f| f.ticket == ticket) else {
            self.discard_late(ticket, completion);
            return;
        };

        match (flight.op, completion) {
            (Op::Switch { auto }, Completion::Switch(result)) => {
                self.finish_switch(result, flight.reply, auto)
            }
            (Op::Seek { previous }, Completion::Status(result)) => {
                self.session.seek_target = None;
                match result {
                    Ok(status) => {
                        self.session.apply_status(&status);
                        respond(flight.reply, Ok(()));
                    }
                    Err(err) => {
                        self.session.position = previous;
                        self.fail(err.into(), flight.reply);
                    }
                }
            }
            (Op::Play | Op::Pause, Completion::Status(result)) => match result {
                Ok(status) => {
                    if status.is_playing {
                        self.session.finished = false;
                    }
                    self.session.apply_status(&status);
                    respond(flight.reply, Ok(()));
                }
                Err(err) => {
                    if err == EngineError::InvalidHandle {
                        self.session.handle = None;
                        self.session.is_playing = false;
                    }
                    self.fail(err.into(), flight.reply);
                }
            },
            (op, completion) => {
                error!(?op, ?completion, "engine reply does not match the operation");
                self.session.is_busy = false;
                self.fail(
                    PlaybackError::Engine("mismatched engine reply".to_string()),
                    flight.reply,
                );
            }
        }
        self.drain();
    }

    fn finish_switch(
        &mut self,
        result: Result<SwitchOutcome, EngineError>,
        reply: Option<Responder>,
        auto: bool,
    ) {
        self.session.is_busy = false;
        match result {
            Ok(outcome) => {
                self.session.handle = Some(outcome.handle);
                self.session.apply_status(&outcome.status);
                self.auto_failures = 0;
                match outcome.play_error {
                    None => {
                        self.session.last_error = None;
                        respond(reply, Ok(()));
                    }
                    Some(err) => {
                        // Loaded but silent: stopped-but-loaded.
                        self.session.is_playing = false;
                        if auto {
                            warn!("auto-advance loaded but could not play: {err}");
                        } else {
                            self.fail(err.into(), reply);
                        }
                    }
                }
            }
            Err(err) if auto => {
                self.session.is_playing = false;
                self.auto_failures += 1;
                let Some(failed) = self.session.active_track.as_ref().map(|t| t.id.clone()) else {
                    return;
                };
                if self.auto_failures >= self.catalog.len() {
                    warn!(
                        failures = self.auto_failures,
                        "auto-advance failed for a full pass over the catalog, stopping"
                    );
                    self.auto_failures = 0;
                } else if self.deferred.iter().any(|job| matches!(job, Job::User { .. })) {
                    // A waiting user command decides what plays next.
                    warn!(track = %failed, "auto-advance load failed: {err}");
                    self.auto_failures = 0;
                } else {
                    warn!(track = %failed, "auto-advance load failed: {err}");
                    self.deferred.push_back(Job::AutoAdvance { pivot: failed });
                }
            }
            Err(err) => {
                self.session.is_playing = false;
                self.fail(err.into(), reply);
            }
        }
    }

    /// A reply for an operation the watchdog already gave up on.
    fn discard_late(&mut self, ticket: u64, completion: Completion) {
        debug!(ticket, "late engine reply discarded");
        if let Completion::Switch(Ok(outcome)) = completion {
            if self.session.handle != Some(outcome.handle) {
                if let Err(e) = self.link.send(EngineRequest::Unload {
                    handle: outcome.handle,
                }) {
                    warn!(handle = ?outcome.handle, "could not release late handle: {e}");
                }
            }
        }
    }

    fn on_status(&mut self, generation: u64, status: EngineStatus) {
        if generation != self.session.generation {
            debug!(
                generation,
                current = self.session.generation,
                "stale status dropped"
            );
            return;
        }

        self.session.apply_status(&status);

        if let Some(msg) = status.error {
            self.session.is_playing = false;
            // Leave the handle loaded but paused so polls agree with the session.
            if let Some(handle) = self.session.handle {
                self.send_untracked("pause after engine error", |reply| {
                    EngineRequest::Pause { handle, reply }
                });
            }
            self.fail(PlaybackError::Engine(msg), None);
        }

        if status.did_finish && !self.session.finished {
            self.session.finished = true;
            self.session.is_playing = false;
            if self.settings.auto_advance {
                if let Some(pivot) = self.session.active_track.as_ref().map(|t| t.id.clone()) {
                    debug!(%pivot, "track finished");
                    self.submit(Job::AutoAdvance { pivot });
                }
            }
        }
    }

    fn poll_status(&mut self) {
        let Some(handle) = self.session.handle else {
            return;
        };
        self.send_untracked("status poll", |reply| EngineRequest::Status { handle, reply });
    }

    /// Send a request outside the in-flight slot. Its status comes back
    /// tagged with the current generation, like a progress callback.
    fn send_untracked(
        &mut self,
        what: &'static str,
        build: impl FnOnce(Reply<EngineStatus>) -> EngineRequest,
    ) {
        let generation = self.session.generation;
        let inbox = self.inbox.clone();
        let reply: Reply<EngineStatus> = Box::new(move |result| match result {
            Ok(status) => {
                let _ = inbox.send(Msg::Status { generation, status });
            }
            Err(e) => debug!("{what} failed: {e}"),
        });
        if let Err(e) = self.link.send(build(reply)) {
            debug!("{what} not sent: {e}");
        }
    }

    fn fail(&mut self, err: PlaybackError, reply: Option<Responder>) {
        warn!("playback error: {err}");
        self.session.last_error = Some(err.clone());
        self.broadcast(PlaybackEvent::Error(err.clone()));
        respond(reply, Err(err));
    }

    fn shutdown(&mut self, fade_out: Duration) {
        if let Some(flight) = self.in_flight.take() {
            respond(flight.reply, Err(PlaybackError::Stopped));
        }
        for job in self.deferred.drain(..) {
            if let Job::User { reply, .. } = job {
                respond(reply, Err(PlaybackError::Stopped));
            }
        }
        self.link.shutdown(fade_out);
        self.session.handle = None;
        self.session.is_playing = false;
        self.session.is_busy = false;
        self.session.seek_target = None;
        info!("playback controller stopped");
    }

    fn publish(&mut self) {
        let snapshot = self.session.snapshot();
        if snapshot == self.published {
            return;
        }
        match self.shared.lock() {
            Ok(mut shared) => *shared = snapshot.clone(),
            Err(poisoned) => *poisoned.into_inner() = snapshot.clone(),
        }
        self.published = snapshot.clone();
        self.broadcast(PlaybackEvent::Updated(snapshot));
    }

    fn broadcast(&mut self, event: PlaybackEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub fn queued(&self) -> usize {
        self.deferred.len()
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.session.generation
    }
}
