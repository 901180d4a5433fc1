use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use super::types::{AudioEngine, EngineError, EngineStatus, HandleId, StatusCallback};

/// One-shot completion for an engine request.
pub type Reply<T> = Box<dyn FnOnce(Result<T, EngineError>) + Send>;

/// Result of a successful `Switch`: the resource is loaded even when
/// starting playback failed.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchOutcome {
    pub handle: HandleId,
    pub status: EngineStatus,
    pub play_error: Option<EngineError>,
}

pub enum EngineRequest {
    /// Release the current handle, load `locator`, subscribe and play.
    Switch {
        generation: u64,
        locator: PathBuf,
        on_status: StatusCallback,
        reply: Reply<SwitchOutcome>,
    },
    Play {
        handle: HandleId,
        reply: Reply<EngineStatus>,
    },
    Pause {
        handle: HandleId,
        reply: Reply<EngineStatus>,
    },
    Seek {
        handle: HandleId,
        position: Duration,
        reply: Reply<EngineStatus>,
    },
    Status {
        handle: HandleId,
        reply: Reply<EngineStatus>,
    },
    /// Stop and unload a specific handle (idempotent).
    Unload { handle: HandleId },
    Shutdown { fade_out: Duration },
}

impl std::fmt::Debug for EngineRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Switch {
                generation,
                locator,
                ..
            } => f
                .debug_struct("Switch")
                .field("generation", generation)
                .field("locator", locator)
                .finish(),
            Self::Play { handle, .. } => f.debug_tuple("Play").field(handle).finish(),
            Self::Pause { handle, .. } => f.debug_tuple("Pause").field(handle).finish(),
            Self::Seek {
                handle, position, ..
            } => f
                .debug_struct("Seek")
                .field("handle", handle)
                .field("position", position)
                .finish(),
            Self::Status { handle, .. } => f.debug_tuple("Status").field(handle).finish(),
            Self::Unload { handle } => f.debug_tuple("Unload").field(handle).finish(),
            Self::Shutdown { fade_out } => f.debug_tuple("Shutdown").field(fade_out).finish(),
        }
    }
}

/// How the controller talks to the engine thread.
pub trait EngineLink {
    fn send(&self, request: EngineRequest) -> Result<(), EngineError>;

    /// Publish the newest load generation; older in-flight loads are discarded.
    fn supersede(&self, generation: u64);

    /// Ask the engine to fade out and exit, then wait for it.
    fn shutdown(&mut self, fade_out: Duration);
}

/// Handle to the dedicated engine thread.
pub struct EngineThread {
    tx: Sender<EngineRequest>,
    latest: Arc<AtomicU64>,
    join: Option<JoinHandle<()>>,
}

impl EngineThread {
    /// Spawn the engine thread. `factory` runs on that thread because audio
    /// output streams are generally not `Send`.
    pub fn spawn<F, E>(factory: F, progress_interval: Duration) -> Self
    where
        F: FnOnce() -> Result<E, EngineError> + Send + 'static,
        E: AudioEngine,
    {
        let (tx, rx) = mpsc::channel::<EngineRequest>();
        let latest = Arc::new(AtomicU64::new(0));
        let latest_for_thread = latest.clone();

        let join = thread::spawn(move || match factory() {
            Ok(engine) => Driver {
                engine,
                current: None,
                latest: latest_for_thread,
            }
            .run(rx, progress_interval),
            Err(e) => {
                error!("audio backend unavailable: {e}");
                serve_unavailable(rx, e);
            }
        });

        Self {
            tx,
            latest,
            join: Some(join),
        }
    }
}

impl EngineLink for EngineThread {
    fn send(&self, request: EngineRequest) -> Result<(), EngineError> {
        self.tx
            .send(request)
            .map_err(|_| EngineError::Backend("engine thread has exited".to_string()))
    }

    fn supersede(&self, generation: u64) {
        self.latest.fetch_max(generation, Ordering::SeqCst);
    }

    fn shutdown(&mut self, fade_out: Duration) {
        let _ = self.tx.send(EngineRequest::Shutdown { fade_out });
        if let Some(h) = self.join.take() {
            let _ = h.join();
        }
    }
}

struct Driver<E> {
    engine: E,
    /// The one handle this thread keeps alive.
    current: Option<HandleId>,
    latest: Arc<AtomicU64>,
}

impl<E: AudioEngine> Driver<E> {
    fn run(mut self, rx: Receiver<EngineRequest>, progress_interval: Duration) {
        let mut last_pump = Instant::now();
        loop {
            match rx.recv_timeout(progress_interval) {
                Ok(EngineRequest::Shutdown { fade_out }) => {
                    self.engine.shutdown(fade_out);
                    break;
                }
                Ok(request) => self.handle(request),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.engine.shutdown(Duration::ZERO);
                    break;
                }
            }

            if last_pump.elapsed() >= progress_interval {
                self.engine.pump();
                last_pump = Instant::now();
            }
        }
        debug!("engine thread exiting");
    }

    fn handle(&mut self, request: EngineRequest) {
        match request {
            EngineRequest::Switch {
                generation,
                locator,
                on_status,
                reply,
            } => reply(self.switch(generation, &locator, on_status)),
            EngineRequest::Play { handle, reply } => reply(self.engine.play(handle)),
            EngineRequest::Pause { handle, reply } => reply(self.engine.pause(handle)),
            EngineRequest::Seek {
                handle,
                position,
                reply,
            } => reply(self.engine.seek(handle, position)),
            EngineRequest::Status { handle, reply } => reply(Ok(self.engine.status(handle))),
            EngineRequest::Unload { handle } => {
                if self.current == Some(handle) {
                    self.release_current();
                } else if let Err(e) = self.engine.unload(handle) {
                    warn!(?handle, "unload failed: {e}");
                }
            }
            EngineRequest::Shutdown { .. } => {}
        }
    }

    /// Stop and unload the current handle. Failures are logged and never
    /// block the caller.
    fn release_current(&mut self) {
        let Some(handle) = self.current.take() else {
            return;
        };
        if let Err(e) = self.engine.stop(handle) {
            warn!(?handle, "stop before unload failed: {e}");
        }
        if let Err(e) = self.engine.unload(handle) {
            warn!(?handle, "unload failed: {e}");
        }
    }

    fn switch(
        &mut self,
        generation: u64,
        locator: &std::path::Path,
        on_status: StatusCallback,
    ) -> Result<SwitchOutcome, EngineError> {
        self.release_current();

        let handle = self.engine.load(locator)?;

        if self.latest.load(Ordering::SeqCst) != generation {
            debug!(?handle, generation, "load superseded, unloading");
            if let Err(e) = self.engine.unload(handle) {
                warn!(?handle, "unload of superseded load failed: {e}");
            }
            return Err(EngineError::Superseded);
        }

        self.current = Some(handle);
        if let Err(e) = self.engine.subscribe(handle, on_status) {
            warn!(?handle, "subscribe failed: {e}");
        }

        let (status, play_error) = match self.engine.play(handle) {
            Ok(status) => (status, None),
            Err(e) => {
                warn!(?handle, "play after load failed: {e}");
                (self.engine.status(handle), Some(e))
            }
        };

        Ok(SwitchOutcome {
            handle,
            status,
            play_error,
        })
    }
}

/// Keep answering requests when no backend could be created.
fn serve_unavailable(rx: Receiver<EngineRequest>, cause: EngineError) {
    let fail = || EngineError::Backend(cause.to_string());
    for request in rx {
        match request {
            EngineRequest::Switch { reply, .. } => reply(Err(fail())),
            EngineRequest::Play { reply, .. }
            | EngineRequest::Pause { reply, .. }
            | EngineRequest::Seek { reply, .. }
            | EngineRequest::Status { reply, .. } => reply(Err(fail())),
            EngineRequest::Unload { .. } => {}
            EngineRequest::Shutdown { .. } => break,
        }
    }
}
