//! Scripted in-memory engine used by tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::types::{AudioEngine, EngineError, EngineStatus, HandleId, StatusCallback};

pub const MOCK_DURATION: Duration = Duration::from_secs(180);

#[derive(Debug, Clone)]
pub struct MockHandle {
    pub path: PathBuf,
    pub playing: bool,
    pub position: Duration,
    pub duration: Option<Duration>,
}

#[derive(Default)]
pub struct MockState {
    pub handles: HashMap<HandleId, MockHandle>,
    pub callbacks: HashMap<HandleId, StatusCallback>,
    pub max_live: usize,
    pub loads: Vec<PathBuf>,
    pub unloads: Vec<HandleId>,
    pub fail_load: HashSet<PathBuf>,
    pub unknown_duration: HashSet<PathBuf>,
    /// Loads of these paths block until the gate receives a message.
    pub gated: HashSet<PathBuf>,
    pub fail_play: bool,
    pub fail_unload: bool,
    pub shutdown_with: Option<Duration>,
    next_id: u64,
}

impl MockState {
    pub fn live(&self) -> usize {
        self.handles.len()
    }

    fn status_of(&self, handle: HandleId) -> EngineStatus {
        match self.handles.get(&handle) {
            Some(h) => EngineStatus {
                is_loaded: true,
                is_playing: h.playing,
                position: h.position,
                duration: h.duration,
                did_finish: false,
                error: None,
            },
            None => EngineStatus::default(),
        }
    }

    /// Invoke the subscribed callback for `handle`, if any.
    pub fn fire(&self, handle: HandleId, status: EngineStatus) -> bool {
        match self.callbacks.get(&handle) {
            Some(callback) => {
                callback(status);
                true
            }
            None => false,
        }
    }

    /// Report the natural end of the resource behind `handle`.
    pub fn finish(&mut self, handle: HandleId) -> bool {
        let Some(h) = self.handles.get_mut(&handle) else {
            return false;
        };
        h.playing = false;
        h.position = h.duration.unwrap_or_default();
        let mut status = self.status_of(handle);
        status.did_finish = true;
        self.fire(handle, status)
    }

    /// The most recently loaded handle that is still alive.
    pub fn current(&self) -> Option<HandleId> {
        self.handles.keys().max_by_key(|h| h.0).copied()
    }
}

pub type SharedMock = Arc<Mutex<MockState>>;

pub fn shared() -> SharedMock {
    Arc::new(Mutex::new(MockState::default()))
}

pub fn lock(state: &SharedMock) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct MockEngine {
    state: SharedMock,
    gate: Option<Receiver<()>>,
}

impl MockEngine {
    pub fn new(state: SharedMock) -> Self {
        Self { state, gate: None }
    }

    pub fn with_gate(state: SharedMock, gate: Receiver<()>) -> Self {
        Self {
            state,
            gate: Some(gate),
        }
    }

    fn handle_mut<T>(
        &mut self,
        handle: HandleId,
        f: impl FnOnce(&mut MockHandle) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut state = lock(&self.state);
        let h = state
            .handles
            .get_mut(&handle)
            .ok_or(EngineError::InvalidHandle)?;
        f(h)
    }
}

impl AudioEngine for MockEngine {
    fn load(&mut self, locator: &Path) -> Result<HandleId, EngineError> {
        let gated = lock(&self.state).gated.contains(locator);
        if gated {
            if let Some(gate) = &self.gate {
                let _ = gate.recv();
            }
        }

        let mut state = lock(&self.state);
        state.loads.push(locator.to_path_buf());
        if state.fail_load.contains(locator) {
            return Err(EngineError::ResourceUnavailable(
                locator.display().to_string(),
            ));
        }

        state.next_id += 1;
        let handle = HandleId(state.next_id);
        let duration = (!state.unknown_duration.contains(locator)).then_some(MOCK_DURATION);
        state.handles.insert(
            handle,
            MockHandle {
                path: locator.to_path_buf(),
                playing: false,
                position: Duration::ZERO,
                duration,
            },
        );
        state.max_live = state.max_live.max(state.handles.len());
        Ok(handle)
    }

    fn play(&mut self, handle: HandleId) -> Result<EngineStatus, EngineError> {
        if lock(&self.state).fail_play {
            return Err(EngineError::Backend("scripted play failure".to_string()));
        }
        self.handle_mut(handle, |h| {
            h.playing = true;
            Ok(())
        })?;
        Ok(self.status(handle))
    }

    fn pause(&mut self, handle: HandleId) -> Result<EngineStatus, EngineError> {
        self.handle_mut(handle, |h| {
            h.playing = false;
            Ok(())
        })?;
        Ok(self.status(handle))
    }

    fn stop(&mut self, handle: HandleId) -> Result<(), EngineError> {
        self.handle_mut(handle, |h| {
            h.playing = false;
            h.position = Duration::ZERO;
            Ok(())
        })
    }

    fn seek(&mut self, handle: HandleId, position: Duration) -> Result<EngineStatus, EngineError> {
        self.handle_mut(handle, |h| {
            let duration = h.duration.ok_or(EngineError::InvalidPosition)?;
            h.position = position.min(duration);
            Ok(())
        })?;
        Ok(self.status(handle))
    }

    fn unload(&mut self, handle: HandleId) -> Result<(), EngineError> {
        let mut state = lock(&self.state);
        if state.fail_unload {
            return Err(EngineError::Backend("scripted unload failure".to_string()));
        }
        if state.handles.remove(&handle).is_some() {
            state.callbacks.remove(&handle);
            state.unloads.push(handle);
        }
        Ok(())
    }

    fn status(&self, handle: HandleId) -> EngineStatus {
        lock(&self.state).status_of(handle)
    }

    fn subscribe(&mut self, handle: HandleId, callback: StatusCallback) -> Result<(), EngineError> {
        let mut state = lock(&self.state);
        if !state.handles.contains_key(&handle) {
            return Err(EngineError::InvalidHandle);
        }
        state.callbacks.insert(handle, callback);
        Ok(())
    }

    fn pump(&mut self) {}

    fn shutdown(&mut self, fade_out: Duration) {
        let mut state = lock(&self.state);
        state.shutdown_with = Some(fade_out);
        state.handles.clear();
        state.callbacks.clear();
    }
}
