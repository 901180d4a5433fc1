//! `rodio` backend for [`AudioEngine`].
//!
//! Each handle owns one paused `Sink`. Positions come from `Sink::get_pos`
//! plus an offset for sinks that were rebuilt with `skip_duration`.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use lofty::file::AudioFile;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use tracing::debug;

use super::types::{AudioEngine, EngineError, EngineStatus, HandleId, StatusCallback};

struct Loaded {
    path: PathBuf,
    sink: Sink,
    duration: Option<Duration>,
    /// Where the current sink's source started inside the file.
    base_offset: Duration,
    playing: bool,
    finished: bool,
    callback: Option<StatusCallback>,
}

impl Loaded {
    fn position(&self) -> Duration {
        let pos = self.base_offset + self.sink.get_pos();
        match self.duration {
            Some(d) => pos.min(d),
            None => pos,
        }
    }

    fn status(&self) -> EngineStatus {
        EngineStatus {
            is_loaded: true,
            is_playing: self.playing,
            position: self.position(),
            duration: self.duration,
            did_finish: self.finished,
            error: None,
        }
    }
}

pub struct RodioEngine {
    stream: OutputStream,
    next_id: u64,
    loaded: HashMap<HandleId, Loaded>,
}

impl RodioEngine {
    /// Open the default output device.
    pub fn open_default() -> Result<Self, EngineError> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| EngineError::Backend(e.to_string()))?;
        // rodio logs to stderr when OutputStream is dropped, which corrupts the TUI.
        stream.log_on_drop(false);
        Ok(Self {
            stream,
            next_id: 0,
            loaded: HashMap::new(),
        })
    }
}

fn decode(path: &Path) -> Result<Decoder<BufReader<File>>, EngineError> {
    let file = File::open(path).map_err(|e| {
        EngineError::ResourceUnavailable(format!("{}: {e}", path.display()))
    })?;
    Decoder::new(BufReader::new(file))
        .map_err(|e| EngineError::ResourceUnavailable(format!("{}: {e}", path.display())))
}

/// Create a paused `Sink` for `path` that starts playback at `start_at`.
fn create_sink_at(
    stream: &OutputStream,
    path: &Path,
    start_at: Duration,
) -> Result<Sink, EngineError> {
    // `skip_duration` is the fallback seeking primitive; Duration::ZERO is fine.
    let source = decode(path)?.skip_duration(start_at);
    let sink = Sink::connect_new(stream.mixer());
    sink.pause();
    sink.append(source);
    Ok(sink)
}

fn tagged_duration(path: &Path) -> Option<Duration> {
    lofty::read_from_path(path)
        .ok()
        .map(|tagged| tagged.properties().duration())
        .filter(|d| !d.is_zero())
}

fn fade_out_sinks(sinks: &[&Sink], fade_out: Duration) {
    if sinks.is_empty() {
        return;
    }
    let steps: u32 = 20;
    let step = (fade_out / steps).max(Duration::from_millis(1));
    if !fade_out.is_zero() {
        for i in 1..=steps {
            let volume = 1.0 - i as f32 / steps as f32;
            sinks.iter().for_each(|s| s.set_volume(volume));
            thread::sleep(step);
        }
    }
    sinks.iter().for_each(|s| s.set_volume(0.0));
}

impl AudioEngine for RodioEngine {
    fn load(&mut self, locator: &Path) -> Result<HandleId, EngineError> {
        let source = decode(locator)?;
        let duration = tagged_duration(locator).or_else(|| source.total_duration());

        let sink = Sink::connect_new(self.stream.mixer());
        sink.pause();
        sink.append(source);

        self.next_id += 1;
        let handle = HandleId(self.next_id);
        self.loaded.insert(
            handle,
            Loaded {
                path: locator.to_path_buf(),
                sink,
                duration,
                base_offset: Duration::ZERO,
                playing: false,
                finished: false,
                callback: None,
            },
        );
        debug!(?handle, path = %locator.display(), ?duration, "loaded");
        Ok(handle)
    }

    fn play(&mut self, handle: HandleId) -> Result<EngineStatus, EngineError> {
        let Self { stream, loaded, .. } = self;
        let l = loaded.get_mut(&handle).ok_or(EngineError::InvalidHandle)?;
        if l.finished || l.sink.empty() {
            // Played to the end (or stopped): start over.
            l.sink.stop();
            l.sink = create_sink_at(stream, &l.path, Duration::ZERO)?;
            l.base_offset = Duration::ZERO;
            l.finished = false;
        }
        l.sink.play();
        l.playing = true;
        Ok(l.status())
    }

    fn pause(&mut self, handle: HandleId) -> Result<EngineStatus, EngineError> {
        let l = self
            .loaded
            .get_mut(&handle)
            .ok_or(EngineError::InvalidHandle)?;
        l.sink.pause();
        l.playing = false;
        Ok(l.status())
    }

    fn stop(&mut self, handle: HandleId) -> Result<(), EngineError> {
        let l = self
            .loaded
            .get_mut(&handle)
            .ok_or(EngineError::InvalidHandle)?;
        l.sink.stop();
        l.playing = false;
        l.finished = false;
        l.base_offset = Duration::ZERO;
        Ok(())
    }

    fn seek(&mut self, handle: HandleId, position: Duration) -> Result<EngineStatus, EngineError> {
        let Self { stream, loaded, .. } = self;
        let l = loaded.get_mut(&handle).ok_or(EngineError::InvalidHandle)?;
        let duration = l.duration.ok_or(EngineError::InvalidPosition)?;
        let target = position.min(duration);

        let seeked = !l.sink.empty()
            && l.sink
                .try_seek(target)
                .map_err(|e| debug!(?handle, "try_seek failed, rebuilding sink: {e}"))
                .is_ok();

        if seeked {
            l.base_offset = Duration::ZERO;
        } else {
            let sink = create_sink_at(stream, &l.path, target)?;
            if l.playing {
                sink.play();
            }
            l.sink.stop();
            l.sink = sink;
            l.base_offset = target;
        }
        l.finished = false;

        // get_pos lags the seek briefly; report the target itself.
        let mut status = l.status();
        status.position = target;
        Ok(status)
    }

    fn unload(&mut self, handle: HandleId) -> Result<(), EngineError> {
        if let Some(l) = self.loaded.remove(&handle) {
            l.sink.stop();
            debug!(?handle, "unloaded");
        }
        Ok(())
    }

    fn status(&self, handle: HandleId) -> EngineStatus {
        self.loaded
            .get(&handle)
            .map(Loaded::status)
            .unwrap_or_default()
    }

    fn subscribe(&mut self, handle: HandleId, callback: StatusCallback) -> Result<(), EngineError> {
        let l = self
            .loaded
            .get_mut(&handle)
            .ok_or(EngineError::InvalidHandle)?;
        l.callback = Some(callback);
        Ok(())
    }

    fn pump(&mut self) {
        for l in self.loaded.values_mut() {
            if !l.playing {
                continue;
            }
            if l.sink.empty() {
                l.playing = false;
                l.finished = true;
            }
            if let Some(callback) = &l.callback {
                callback(l.status());
            }
        }
    }

    fn shutdown(&mut self, fade_out: Duration) {
        let audible: Vec<&Sink> = self
            .loaded
            .values()
            .filter(|l| l.playing)
            .map(|l| &l.sink)
            .collect();
        fade_out_sinks(&audible, fade_out);

        for (_, l) in self.loaded.drain() {
            l.sink.stop();
        }
    }
}
