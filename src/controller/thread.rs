use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::engine::EngineLink;

use super::machine::ControllerCore;
use super::types::Msg;

pub(super) fn spawn_controller_thread<L>(
    mut core: ControllerCore<L>,
    rx: Receiver<Msg>,
    tick: Duration,
) -> JoinHandle<()>
where
    L: EngineLink + Send + 'static,
{
    thread::spawn(move || {
        let mut last_tick = Instant::now();
        loop {
            match rx.recv_timeout(tick) {
                Ok(msg) => {
                    let stop = matches!(msg, Msg::Shutdown { .. });
                    core.handle(msg);
                    if stop {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    core.handle(Msg::Shutdown {
                        fade_out: Duration::ZERO,
                    });
                    break;
                }
            }

            let now = Instant::now();
            if now.duration_since(last_tick) >= tick {
                core.on_tick(now);
                last_tick = now;
            }
        }
        debug!("controller thread exiting");
    })
}
