use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::Settings;
use crate::engine::{AudioEngine, EngineError, EngineThread};
use crate::error::PlaybackError;
use crate::library::{Catalog, TrackId};

use super::machine::{ControllerCore, CoreSettings};
use super::thread::spawn_controller_thread;
use super::types::{Command, Direction, Msg, PlaybackEvent, Snapshot};

/// Outcome of a submitted command, resolved by the controller thread.
pub struct Pending {
    rx: Receiver<Result<(), PlaybackError>>,
}

impl Pending {
    /// `None` while the command is still queued or in flight.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<(), PlaybackError>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(PlaybackError::Stopped)),
        }
    }
}

/// Read access to the latest published snapshot.
struct SnapshotHandle(Arc<Mutex<Snapshot>>);

impl SnapshotHandle {
    fn get(&self) -> Snapshot {
        match self.0.lock() {
            Ok(s) => s.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Process-wide playback controller.
///
/// Owns the controller thread (session state) and, through it, the engine
/// thread (the audio handle). All methods are non-blocking.
pub struct PlaybackController {
    tx: Sender<Msg>,
    snapshot: SnapshotHandle,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackController {
    /// Start the engine and controller threads. `make_engine` runs on the
    /// engine thread.
    pub fn spawn<F, E>(catalog: Arc<Catalog>, settings: &Settings, make_engine: F) -> Self
    where
        F: FnOnce() -> Result<E, EngineError> + Send + 'static,
        E: AudioEngine,
    {
        let engine = EngineThread::spawn(make_engine, settings.audio.progress_interval());
        let (tx, rx) = mpsc::channel::<Msg>();
        let shared = Arc::new(Mutex::new(Snapshot::default()));

        let core = ControllerCore::new(
            catalog,
            CoreSettings::from(settings),
            engine,
            tx.clone(),
            shared.clone(),
        );
        let join = spawn_controller_thread(core, rx, settings.controller.tick());

        Self {
            tx,
            snapshot: SnapshotHandle(shared),
            join: Mutex::new(Some(join)),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.get()
    }

    /// Receive every snapshot change and every surfaced error from now on.
    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        let (tx, rx) = mpsc::channel();
        let _ = self.tx.send(Msg::Subscribe(tx));
        rx
    }

    pub fn play_track(&self, id: TrackId) -> Pending {
        self.command(Command::PlayTrack(id))
    }

    pub fn toggle_play_pause(&self) -> Pending {
        self.command(Command::TogglePlayPause)
    }

    pub fn seek_to(&self, position: Duration) -> Pending {
        self.command(Command::SeekTo(position))
    }

    pub fn advance(&self, direction: Direction) -> Pending {
        self.command(Command::Advance(direction))
    }

    pub fn command(&self, command: Command) -> Pending {
        let (reply, rx) = mpsc::channel();
        // A dead controller drops `reply`, which resolves the ticket as `Stopped`.
        let _ = self.tx.send(Msg::Command {
            command,
            reply: Some(reply),
        });
        Pending { rx }
    }

    /// Stop playback (fading out over `fade_out`) and join both threads.
    pub fn shutdown(&self, fade_out: Duration) {
        let _ = self.tx.send(Msg::Shutdown { fade_out });
        if let Ok(mut j) = self.join.lock() {
            if let Some(h) = j.take() {
                let _ = h.join();
            }
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.shutdown(Duration::ZERO);
    }
}
