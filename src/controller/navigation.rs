use crate::config::LoopMode;
use crate::library::{Catalog, Track, TrackId};

use super::types::Direction;

/// Circular neighbour of `current` in catalog order.
///
/// Without a current track (or one the catalog does not know) `Next` starts
/// at the first track and `Previous` at the last.
pub fn neighbor<'a>(
    catalog: &'a Catalog,
    current: Option<&TrackId>,
    direction: Direction,
) -> Option<&'a Track> {
    let len = catalog.len();
    if len == 0 {
        return None;
    }
    let index = match (current.and_then(|id| catalog.position(id)), direction) {
        (Some(i), Direction::Next) => (i + 1) % len,
        (Some(i), Direction::Previous) => (i + len - 1) % len,
        (None, Direction::Next) => 0,
        (None, Direction::Previous) => len - 1,
    };
    catalog.get(index)
}

/// Track to play after `finished` ended on its own.
pub(crate) fn after_finish<'a>(
    catalog: &'a Catalog,
    finished: &TrackId,
    loop_mode: LoopMode,
) -> Option<&'a Track> {
    match loop_mode {
        LoopMode::LoopOne => catalog.find(finished),
        LoopMode::LoopAll => neighbor(catalog, Some(finished), Direction::Next),
        LoopMode::NoLoop => catalog
            .position(finished)
            .and_then(|i| catalog.get(i + 1)),
    }
}
