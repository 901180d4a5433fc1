//! Track catalog: scanning a music directory into an ordered, read-only list.
//!
//! The catalog is built once at startup and shared with the controller,
//! which uses its ordering as the navigation order for next/previous.

mod catalog;
mod display;
mod model;
mod scan;

pub use catalog::Catalog;
pub use model::{Track, TrackId};
pub use scan::scan;
