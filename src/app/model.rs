//! Application model types: `App` and `Screen`.
//!
//! The `App` struct holds the catalog, the list cursor and one
//! `PlaybackView` per screen. Playback itself lives in the controller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::library::{Catalog, Track};
use crate::observer::{PlaybackView, SnapshotSource};

/// Which screen is in front.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Screen {
    #[default]
    List,
    Player,
}

/// The main application model.
pub struct App {
    pub catalog: Arc<Catalog>,
    pub selected: usize,
    pub screen: Screen,

    pub list_view: PlaybackView,
    pub player_view: PlaybackView,

    pub follow_playback: bool,
    /// `ui.follow_playback`; when off, nothing turns following back on.
    follow_allowed: bool,
    pub pending_follow_index: Option<usize>,

    pub current_dir: Option<String>,
}

impl App {
    /// Create a new `App` over `catalog`; both views poll every `reconcile_interval`.
    pub fn new(catalog: Arc<Catalog>, reconcile_interval: Duration, follow_playback: bool) -> Self {
        Self {
            catalog,
            selected: 0,
            screen: Screen::List,

            list_view: PlaybackView::new(reconcile_interval),
            player_view: PlaybackView::new(reconcile_interval),

            follow_playback,
            follow_allowed: follow_playback,
            pending_follow_index: None,

            current_dir: None,
        }
    }

    /// Enable following playback (cursor follows currently playing track),
    /// unless the config turned it off.
    pub fn follow_playback_on(&mut self) {
        self.follow_playback = self.follow_allowed;
    }
    /// Disable follow-playback and clear any pending follow index.
    pub fn follow_playback_off(&mut self) {
        self.follow_playback = false;
        self.pending_follow_index = None;
    }
    /// Set an index to follow once the controller reports it.
    pub fn set_pending_follow_index(&mut self, idx: usize) {
        self.pending_follow_index = Some(idx);
    }
    /// Record the current directory in the app state.
    pub fn set_current_dir(&mut self, dir: String) {
        self.current_dir = Some(dir);
    }

    /// Return true if the library contains any tracks.
    pub fn has_tracks(&self) -> bool {
        !self.catalog.is_empty()
    }

    pub fn selected_track(&self) -> Option<&Track> {
        self.catalog.get(self.selected)
    }

    /// Set the selected track index, clamped to the catalog.
    pub fn set_selected(&mut self, idx: usize) {
        self.selected = idx.min(self.catalog.len().saturating_sub(1));
    }

    /// Move selection to the next track, wrapping to the first.
    pub fn next(&mut self) {
        if self.has_tracks() {
            self.selected = (self.selected + 1) % self.catalog.len();
        }
    }

    /// Move selection to the previous track, wrapping to the last.
    pub fn prev(&mut self) {
        if self.has_tracks() {
            let len = self.catalog.len();
            self.selected = (self.selected + len - 1) % len;
        }
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.catalog.len().saturating_sub(1);
    }

    /// The view of the screen in front.
    pub fn view(&self) -> &PlaybackView {
        match self.screen {
            Screen::List => &self.list_view,
            Screen::Player => &self.player_view,
        }
    }

    pub fn view_mut(&mut self) -> &mut PlaybackView {
        match self.screen {
            Screen::List => &mut self.list_view,
            Screen::Player => &mut self.player_view,
        }
    }

    /// Bring `screen` to the front: the old view stops listening and the new
    /// one resyncs from the controller.
    pub fn show(&mut self, screen: Screen, source: &impl SnapshotSource, now: Instant) {
        if self.screen != screen {
            self.view_mut().deactivate();
            self.screen = screen;
        }
        if !self.view().is_active() {
            self.view_mut().activate(source, now);
        }
        self.follow_now_playing();
    }

    /// Reconcile the front view and move the cursor along with playback.
    /// Returns true when a redraw is needed.
    pub fn reconcile(&mut self, source: &impl SnapshotSource, now: Instant) -> bool {
        let changed = self.view_mut().reconcile(source, now);
        if changed {
            self.follow_now_playing();
        }
        changed
    }

    /// Catalog index of the track the front view shows as current.
    pub fn now_playing_index(&self) -> Option<usize> {
        let track = self.view().state().track.as_ref()?;
        self.catalog.position(&track.id)
    }

    fn follow_now_playing(&mut self) {
        if !self.follow_playback {
            return;
        }
        let Some(idx) = self.now_playing_index() else {
            return;
        };
        match self.pending_follow_index {
            // Wait until the controller has moved to the track we asked for.
            Some(pending) if pending != idx => {}
            _ => {
                self.pending_follow_index = None;
                self.selected = idx;
            }
        }
    }
}
