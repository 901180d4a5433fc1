//! Audio engine adapter.
//!
//! [`AudioEngine`] is the contract a backend implements; [`RodioEngine`] is
//! the real one. [`EngineThread`] runs a backend on its own thread and is the
//! only thing that ever holds an engine handle.

mod driver;
mod sink;
mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use driver::{EngineLink, EngineRequest, EngineThread, Reply, SwitchOutcome};
pub use sink::RodioEngine;
pub use types::*;
