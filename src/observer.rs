//! Per-screen views of the controller's playback state.

mod view;

pub use view::{PlaybackView, SnapshotSource};

#[cfg(test)]
mod tests;
