//! Playback synchronization controller.
//!
//! The single owner of playback state. Commands from any screen are
//! serialized on the controller thread, engine callbacks are gated by load
//! generation, and observers read snapshots or subscribe to pushed events.

mod handle;
mod machine;
mod navigation;
mod session;
mod thread;
mod types;

pub use handle::{Pending, PlaybackController};
pub use navigation::neighbor;
pub use types::{Command, Direction, PlaybackEvent, Snapshot};
