use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::debug;

use crate::app::{App, Screen};
use crate::config;
use crate::controller::{Direction, Pending, PlaybackController};
use crate::ui;

/// State tracked by the runtime event loop across iterations.
#[derive(Default)]
pub struct EventLoopState {
    /// Internal two-key prefix state used for `gg` handling.
    pub pending_gg: bool,
    /// Commands the controller has not answered yet.
    in_flight: Vec<(&'static str, Pending)>,
}

impl EventLoopState {
    fn issue(&mut self, what: &'static str, pending: Pending) {
        self.in_flight.push((what, pending));
    }

    /// Drop answered commands. Failures are already on the views; they are
    /// only logged here.
    fn settle(&mut self) {
        self.in_flight
            .retain(|(what, pending)| match pending.wait_timeout(Duration::ZERO) {
                None => true,
                Some(Ok(())) => false,
                Some(Err(e)) => {
                    debug!(command = *what, "command failed: {e}");
                    false
                }
            });
    }
}

/// Main terminal event loop: handles input, reconciles the front view with
/// the controller and draws. Returns `Ok(())` when the user quits.
pub fn run(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    settings: &config::Settings,
    app: &mut App,
    controller: &PlaybackController,
    state: &mut EventLoopState,
) -> Result<(), Box<dyn std::error::Error>> {
    app.show(app.screen, controller, Instant::now());

    loop {
        state.settle();
        app.reconcile(controller, Instant::now());

        terminal.draw(|f| ui::draw(f, app, settings))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key_event(key, settings, app, controller, state) {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Returns true when the user asked to quit.
fn handle_key_event(
    key: KeyEvent,
    settings: &config::Settings,
    app: &mut App,
    controller: &PlaybackController,
    state: &mut EventLoopState,
) -> bool {
    let now = Instant::now();

    if key.code != KeyCode::Char('g') {
        state.pending_gg = false;
    }

    match (app.screen, key.code) {
        (_, KeyCode::Char('q')) => return true,
        (_, KeyCode::Char('p') | KeyCode::Char(' ')) => {
            app.follow_playback_on();
            let pending = app.view_mut().toggle_optimistic(controller, now);
            state.issue("toggle", pending);
        }

        (Screen::List, KeyCode::Char('g')) => {
            if state.pending_gg {
                state.pending_gg = false;
                app.follow_playback_off();
                app.select_first();
            } else {
                state.pending_gg = true;
            }
        }
        (Screen::List, KeyCode::Char('G')) => {
            app.follow_playback_off();
            app.select_last();
        }
        (Screen::List, KeyCode::Char('j') | KeyCode::Down) => {
            app.follow_playback_off();
            app.next();
        }
        (Screen::List, KeyCode::Char('k') | KeyCode::Up) => {
            app.follow_playback_off();
            app.prev();
        }
        (Screen::List, KeyCode::Enter) => {
            if let Some(track) = app.selected_track() {
                let id = track.id.clone();
                debug!(track = %id, "play from list");
                app.follow_playback_on();
                app.set_pending_follow_index(app.selected);
                state.issue("play", controller.play_track(id));
                app.show(Screen::Player, controller, now);
            }
        }

        (Screen::Player, KeyCode::Esc) => app.show(Screen::List, controller, now),
        (Screen::Player, KeyCode::Char('l')) => {
            app.follow_playback_on();
            state.issue("next", controller.advance(Direction::Next));
        }
        (Screen::Player, KeyCode::Char('h')) => {
            app.follow_playback_on();
            state.issue("previous", controller.advance(Direction::Previous));
        }
        (Screen::Player, KeyCode::Char('L')) => {
            let step = Duration::from_secs(settings.controls.scrub_seconds);
            let target = app.view().state().position.saturating_add(step);
            state.issue("seek", controller.seek_to(target));
        }
        (Screen::Player, KeyCode::Char('H')) => {
            let step = Duration::from_secs(settings.controls.scrub_seconds);
            let target = app.view().state().position.saturating_sub(step);
            state.issue("seek", controller.seek_to(target));
        }
        (Screen::Player, KeyCode::Char(c)) if c.is_ascii_digit() => {
            if let Some(target) = percent_of(app.view().state().duration, c) {
                state.issue("seek", controller.seek_to(target));
            }
        }

        _ => {}
    }

    false
}

/// `0`..`9` map to 0 %..90 % of `duration`.
fn percent_of(duration: Option<Duration>, digit: char) -> Option<Duration> {
    let tenths = digit.to_digit(10)?;
    Some(duration? * tenths / 10)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::engine::mock::{self, MockEngine};
    use crate::library::Catalog;

    #[test]
    fn answered_commands_are_settled() {
        let controller = PlaybackController::spawn(
            Arc::new(Catalog::default()),
            &config::Settings::default(),
            || Ok(MockEngine::new(mock::shared())),
        );
        let mut state = EventLoopState::default();
        state.issue("toggle", controller.toggle_play_pause());

        let deadline = Instant::now() + Duration::from_secs(5);
        while !state.in_flight.is_empty() && Instant::now() < deadline {
            state.settle();
            thread::sleep(Duration::from_millis(5));
        }
        assert!(state.in_flight.is_empty());
    }

    #[test]
    fn digits_jump_to_tenths() {
        let d = Some(Duration::from_secs(200));
        assert_eq!(percent_of(d, '0'), Some(Duration::ZERO));
        assert_eq!(percent_of(d, '5'), Some(Duration::from_secs(100)));
        assert_eq!(percent_of(d, '9'), Some(Duration::from_secs(180)));
        assert_eq!(percent_of(None, '5'), None);
        assert_eq!(percent_of(d, 'x'), None);
    }
}
