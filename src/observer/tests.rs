use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use super::*;
use crate::controller::{PlaybackEvent, Snapshot};
use crate::error::PlaybackError;
use crate::library::{Track, TrackId};

#[derive(Default)]
struct FakeSource {
    current: RefCell<Snapshot>,
    push: bool,
    subscribers: RefCell<Vec<Sender<PlaybackEvent>>>,
}

impl FakeSource {
    fn pushing() -> Self {
        Self {
            push: true,
            ..Self::default()
        }
    }

    fn set(&self, snapshot: Snapshot) {
        *self.current.borrow_mut() = snapshot.clone();
        self.subscribers
            .borrow_mut()
            .retain(|tx| tx.send(PlaybackEvent::Updated(snapshot.clone())).is_ok());
    }

    fn error(&self, err: PlaybackError) {
        for tx in self.subscribers.borrow().iter() {
            let _ = tx.send(PlaybackEvent::Error(err.clone()));
        }
    }
}

impl SnapshotSource for FakeSource {
    fn snapshot(&self) -> Snapshot {
        self.current.borrow().clone()
    }

    fn subscribe(&self) -> Option<Receiver<PlaybackEvent>> {
        if !self.push {
            return None;
        }
        let (tx, rx) = mpsc::channel();
        self.subscribers.borrow_mut().push(tx);
        Some(rx)
    }
}

fn track(name: &str) -> Track {
    Track {
        id: TrackId::from(name),
        path: PathBuf::from(format!("/music/{name}.mp3")),
        title: name.to_string(),
        artist: None,
        album: None,
        duration: Some(Duration::from_secs(200)),
        display: name.to_string(),
    }
}

fn playing(name: &str, secs: u64) -> Snapshot {
    Snapshot {
        track: Some(track(name)),
        is_playing: true,
        position: Duration::from_secs(secs),
        duration: Some(Duration::from_secs(200)),
        ..Snapshot::default()
    }
}

#[test]
fn activation_replaces_the_whole_local_state() {
    let source = FakeSource::default();
    source.set(playing("a", 12));
    let mut view = PlaybackView::new(Duration::from_millis(300));
    assert!(!view.is_active());

    view.activate(&source, Instant::now());
    assert!(view.is_active());
    assert_eq!(view.state(), &playing("a", 12));
    assert!(view.is_playing());
}

#[test]
fn two_views_converge_with_or_without_push() {
    let before = playing("a", 1);
    let cases = [
        ("track changed", playing("b", 1)),
        (
            "play state changed",
            Snapshot {
                is_playing: false,
                ..playing("a", 1)
            },
        ),
        (
            "both changed",
            Snapshot {
                is_playing: false,
                ..playing("b", 7)
            },
        ),
        ("neither changed", playing("a", 1)),
    ];

    let now = Instant::now();
    for (case, after) in cases {
        for push in [false, true] {
            for activate_after_change in [false, true] {
                let label = format!("{case}: push={push} late={activate_after_change}");
                let source = if push {
                    FakeSource::pushing()
                } else {
                    FakeSource::default()
                };
                source.set(before.clone());

                let mut list = PlaybackView::new(Duration::ZERO);
                let mut player = PlaybackView::new(Duration::ZERO);
                list.activate(&source, now);
                if !activate_after_change {
                    player.activate(&source, now);
                }

                // A command from one screen changes the controller state.
                source.set(after.clone());
                assert_eq!(list.state(), &before, "{label}");

                if activate_after_change {
                    player.activate(&source, now);
                }
                list.reconcile(&source, now);
                player.reconcile(&source, now);

                assert_eq!(list.state(), &after, "{label}");
                assert_eq!(player.state(), &after, "{label}");
                assert_eq!(list.is_playing(), after.is_playing, "{label}");
                assert_eq!(player.is_playing(), after.is_playing, "{label}");
            }
        }
    }
}

#[test]
fn polling_waits_for_the_interval() {
    let source = FakeSource::default();
    source.set(playing("a", 1));
    let t0 = Instant::now();
    let mut view = PlaybackView::new(Duration::from_millis(300));
    view.activate(&source, t0);

    source.set(playing("a", 2));
    assert!(!view.reconcile(&source, t0 + Duration::from_millis(100)));
    assert_eq!(view.state().position, Duration::from_secs(1));

    assert!(view.reconcile(&source, t0 + Duration::from_millis(300)));
    assert_eq!(view.state().position, Duration::from_secs(2));
}

#[test]
fn busy_poll_only_takes_the_busy_flag() {
    let source = FakeSource::default();
    source.set(playing("a", 30));
    let now = Instant::now();
    let mut view = PlaybackView::new(Duration::ZERO);
    view.activate(&source, now);

    source.set(Snapshot {
        track: Some(track("b")),
        is_busy: true,
        ..Snapshot::default()
    });
    view.reconcile(&source, now);

    let state = view.state();
    assert!(state.is_busy);
    assert_eq!(state.track.as_ref().map(|t| t.title.as_str()), Some("a"));
    assert_eq!(state.position, Duration::from_secs(30));
}

#[test]
fn optimistic_icon_clears_when_the_controller_agrees() {
    let source = FakeSource::default();
    source.set(playing("a", 3));
    let now = Instant::now();
    let mut view = PlaybackView::new(Duration::from_millis(300));
    view.activate(&source, now);

    view.mark_tentative(now);
    assert!(!view.is_playing());
    assert!(view.state().is_playing);

    source.set(Snapshot {
        is_playing: false,
        ..playing("a", 3)
    });
    view.reconcile(&source, now + Duration::from_millis(300));
    assert!(!view.is_playing());
    assert!(!view.state().is_playing);
}

#[test]
fn optimistic_icon_expires_after_one_interval() {
    let source = FakeSource::default();
    source.set(playing("a", 3));
    let t0 = Instant::now();
    let mut view = PlaybackView::new(Duration::from_millis(300));
    view.activate(&source, t0);

    view.mark_tentative(t0);
    assert!(!view.is_playing());

    // The controller never confirmed the pause.
    view.reconcile(&source, t0 + Duration::from_millis(300));
    assert!(view.is_playing());
}

#[test]
fn optimistic_toggle_needs_a_track() {
    let source = FakeSource::default();
    let now = Instant::now();
    let mut view = PlaybackView::new(Duration::from_millis(300));
    view.activate(&source, now);
    view.mark_tentative(now);
    assert!(!view.is_playing());
    assert_eq!(view.state(), &Snapshot::default());
}

#[test]
fn deactivated_view_keeps_its_last_state() {
    let source = FakeSource::pushing();
    source.set(playing("a", 5));
    let now = Instant::now();
    let mut view = PlaybackView::new(Duration::ZERO);
    view.activate(&source, now);
    view.deactivate();

    source.set(playing("b", 0));
    assert!(!view.reconcile(&source, now));
    assert_eq!(view.state(), &playing("a", 5));

    view.activate(&source, now);
    assert_eq!(view.state(), &playing("b", 0));
}

#[test]
fn pushed_errors_are_shown() {
    let source = FakeSource::pushing();
    source.set(playing("a", 5));
    let t0 = Instant::now();
    let mut view = PlaybackView::new(Duration::from_secs(60));
    view.activate(&source, t0);

    source.error(PlaybackError::Timeout);
    assert!(view.reconcile(&source, t0));
    assert_eq!(view.state().last_error, Some(PlaybackError::Timeout));
}
