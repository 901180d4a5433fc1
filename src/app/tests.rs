use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use super::*;
use crate::controller::{PlaybackEvent, Snapshot};
use crate::library::{Catalog, Track, TrackId};
use crate::observer::SnapshotSource;

fn t(title: &str) -> Track {
    Track {
        id: TrackId::from(title),
        path: PathBuf::from(format!("/music/{title}.mp3")),
        title: title.into(),
        artist: None,
        album: None,
        duration: None,
        display: title.into(),
    }
}

fn app_with(titles: &[&str], follow_playback: bool) -> App {
    let catalog = Catalog::new(titles.iter().map(|s| t(s)).collect());
    App::new(Arc::new(catalog), Duration::ZERO, follow_playback)
}

fn app(titles: &[&str]) -> App {
    app_with(titles, true)
}

#[derive(Default)]
struct Polled(RefCell<Snapshot>);

impl Polled {
    fn playing(&self, title: &str) {
        *self.0.borrow_mut() = Snapshot {
            track: Some(t(title)),
            is_playing: true,
            ..Snapshot::default()
        };
    }
}

impl SnapshotSource for Polled {
    fn snapshot(&self) -> Snapshot {
        self.0.borrow().clone()
    }

    fn subscribe(&self) -> Option<Receiver<PlaybackEvent>> {
        None
    }
}

#[test]
fn next_prev_wrap_around() {
    let mut app = app(&["Alpha", "Beta", "Gamma"]);

    app.prev();
    assert_eq!(app.selected, 2);
    app.next();
    assert_eq!(app.selected, 0);
    app.next();
    assert_eq!(app.selected, 1);

    app.select_last();
    assert_eq!(app.selected, 2);
    app.select_first();
    assert_eq!(app.selected, 0);
}

#[test]
fn selection_is_a_noop_on_an_empty_library() {
    let mut app = app(&[]);
    assert!(!app.has_tracks());
    app.next();
    app.prev();
    app.set_selected(4);
    assert_eq!(app.selected, 0);
    assert!(app.selected_track().is_none());
}

#[test]
fn set_selected_clamps_to_the_catalog() {
    let mut app = app(&["Alpha", "Beta"]);
    app.set_selected(9);
    assert_eq!(app.selected, 1);
    assert_eq!(app.selected_track().map(|t| t.title.as_str()), Some("Beta"));
}

#[test]
fn switching_screens_moves_the_subscription() {
    let source = Polled::default();
    source.playing("Beta");
    let now = Instant::now();
    let mut app = app(&["Alpha", "Beta"]);

    app.show(Screen::List, &source, now);
    assert!(app.list_view.is_active());
    assert!(!app.player_view.is_active());

    app.show(Screen::Player, &source, now);
    assert_eq!(app.screen, Screen::Player);
    assert!(!app.list_view.is_active());
    assert!(app.player_view.is_active());
    assert_eq!(app.view().state(), &source.snapshot());
}

#[test]
fn cursor_follows_playback_until_the_user_moves_it() {
    let source = Polled::default();
    let now = Instant::now();
    let mut app = app(&["Alpha", "Beta", "Gamma"]);
    app.show(Screen::List, &source, now);

    source.playing("Gamma");
    assert!(app.reconcile(&source, now));
    assert_eq!(app.selected, 2);

    app.follow_playback_off();
    app.prev();
    source.playing("Alpha");
    app.reconcile(&source, now);
    assert_eq!(app.selected, 1);
}

#[test]
fn pending_follow_waits_for_the_requested_track() {
    let source = Polled::default();
    source.playing("Alpha");
    let now = Instant::now();
    let mut app = app(&["Alpha", "Beta", "Gamma"]);
    app.show(Screen::List, &source, now);
    assert_eq!(app.selected, 0);

    // Enter on Gamma while Alpha is still reported.
    app.set_selected(2);
    app.set_pending_follow_index(2);
    source.0.borrow_mut().position = Duration::from_secs(1);
    app.reconcile(&source, now);
    assert_eq!(app.selected, 2);
    assert_eq!(app.pending_follow_index, Some(2));

    source.playing("Gamma");
    app.reconcile(&source, now);
    assert_eq!(app.selected, 2);
    assert_eq!(app.pending_follow_index, None);
}

#[test]
fn now_playing_index_comes_from_the_front_view() {
    let source = Polled::default();
    let now = Instant::now();
    let mut app = app(&["Alpha", "Beta"]);
    assert_eq!(app.now_playing_index(), None);

    source.playing("Beta");
    app.show(Screen::Player, &source, now);
    assert_eq!(app.now_playing_index(), Some(1));
}

#[test]
fn disabled_follow_setting_survives_playback_keys() {
    let source = Polled::default();
    let now = Instant::now();
    let mut app = app_with(&["Alpha", "Beta", "Gamma"], false);
    app.show(Screen::List, &source, now);

    app.follow_playback_on();
    assert!(!app.follow_playback);

    source.playing("Gamma");
    app.reconcile(&source, now);
    assert_eq!(app.selected, 0);
}

#[test]
fn playback_keys_turn_following_back_on() {
    let mut app = app(&["Alpha"]);
    app.follow_playback_off();
    app.follow_playback_on();
    assert!(app.follow_playback);
}
