//! Application module: exposes the app model used by the TUI and runtime.
//!
//! The `App` model lives in `app::model` and holds the catalog cursor, the
//! screen in front and one playback view per screen.

mod model;

pub use model::*;

#[cfg(test)]
mod tests;
