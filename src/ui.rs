//! UI rendering helpers for the terminal user interface.
//!
//! This module contains functions to render the TUI using `ratatui`. Both
//! screens draw only from their own `PlaybackView`, never from the controller.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style, Stylize},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Padding, Paragraph, Wrap},
};
use std::{collections::BTreeMap, sync::LazyLock, time::Duration};

use crate::app::{App, Screen};
use crate::config::{LoopMode, Settings};
use crate::controller::Snapshot;

static CONTROLS_MAP: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut map = BTreeMap::new();
    map.insert("j/k", "up/down");
    map.insert("gg/G", "top/bottom");
    map.insert("enter", "play + open player");
    map.insert("space/p", "play/pause");
    map.insert("h/l", "prev/next song");
    // H/L is filled dynamically from config.
    map.insert("0-9", "jump to 0-90%");
    map.insert("esc", "back to list");
    map.insert("q", "quit");
    map
});

/// Render the controls help text for `screen`, incorporating scrub seconds.
fn controls_text(screen: Screen, scrub_seconds: u64) -> String {
    let order: &[&str] = match screen {
        Screen::List => &["j/k", "gg/G", "enter", "space/p", "q"],
        Screen::Player => &["space/p", "h/l", "H/L", "0-9", "esc", "q"],
    };
    order
        .iter()
        .filter_map(|k| {
            if *k == "H/L" {
                Some(format!("[H/L] scrub -/+{}s", scrub_seconds))
            } else {
                CONTROLS_MAP.get(*k).map(|v| format!("[{}] {}", k, v))
            }
        })
        .collect::<Vec<String>>()
        .join(" | ")
}

/// Format a `Duration` as `MM:SS`.
fn format_mmss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// `elapsed / total`, with `--:--` when the total is unknown.
fn time_text(state: &Snapshot) -> String {
    let total = state
        .duration
        .map(format_mmss)
        .unwrap_or_else(|| "--:--".to_string());
    format!("{} / {}", format_mmss(state.position), total)
}

fn play_icon(playing: bool) -> &'static str {
    if playing { "▶" } else { "⏸" }
}

fn loop_text(mode: LoopMode) -> &'static str {
    match mode {
        LoopMode::NoLoop => "PLAYBACK: No-loop",
        LoopMode::LoopAll => "PLAYBACK: Loop-around",
        LoopMode::LoopOne => "PLAYBACK: Repeat-one",
    }
}

fn status_text(app: &App, settings: &Settings) -> String {
    let view = app.view();
    let state = view.state();
    let mut parts: Vec<String> = Vec::new();

    if app.follow_playback {
        parts.push(" CURSOR: Follow".to_string());
    } else {
        parts.push(" CURSOR: Free-roam".to_string());
    }
    if settings.playback.auto_advance {
        parts.push(loop_text(settings.playback.loop_mode).to_string());
    } else {
        parts.push("PLAYBACK: Single".to_string());
    }

    match &state.track {
        Some(track) => {
            parts.push(format!("Song: {} [{}]", track.display, time_text(state)));
            if state.is_busy {
                parts.push("Loading…".to_string());
            } else if view.is_playing() {
                parts.push("Playing".to_string());
            } else {
                parts.push("Paused".to_string());
            }
        }
        None => parts.push("Stopped".to_string()),
    }

    if let Some(dir) = &app.current_dir {
        parts.push(format!("Dir: {}", dir));
    }

    parts.join(" • ")
}

/// Render the entire UI into the provided `frame` using `app` state and settings.
pub fn draw(frame: &mut Frame, app: &App, settings: &Settings) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    // Header
    let header = Paragraph::new(settings.ui.header_text.as_str())
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" encore ")
                .title_alignment(Alignment::Center),
        );
    frame.render_widget(header, chunks[0]);

    // Status box
    let status = Paragraph::new(status_text(app, settings))
        .block(
            Block::bordered()
                .padding(Padding {
                    left: 1,
                    right: 0,
                    top: 0,
                    bottom: 0,
                })
                .title(" status "),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(status, chunks[1]);

    match app.screen {
        Screen::List => draw_list(frame, app, chunks[2]),
        Screen::Player => draw_player(frame, app, chunks[2]),
    }

    let footer = Paragraph::new(controls_text(app.screen, settings.controls.scrub_seconds))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" controls ")
                .padding(Padding {
                    left: 1,
                    right: 0,
                    top: 0,
                    bottom: 0,
                }),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, chunks[3]);
}

fn draw_list(frame: &mut Frame, app: &App, area: Rect) {
    let tracks = app.catalog.list_tracks();
    let playing = app.now_playing_index();
    let icon = play_icon(app.view().is_playing());

    // Center the selected item when possible by creating a visible window.
    // Only build ListItems for the visible window.
    let total = tracks.len();
    let list_height = area.height.saturating_sub(2) as usize;
    let sel_pos = app.selected.min(total.saturating_sub(1));
    let (start, end, selected_pos_in_visible) = if total <= list_height || list_height == 0 {
        (0, total, sel_pos)
    } else {
        let half = list_height / 2;
        let mut start = sel_pos.saturating_sub(half);
        if start + list_height > total {
            start = total - list_height;
        }
        (start, start + list_height, sel_pos - start)
    };

    let visible_items: Vec<ListItem> = tracks[start..end]
        .iter()
        .enumerate()
        .map(|(offset, track)| {
            if playing == Some(start + offset) {
                ListItem::new(format!("{} {}", icon, track.display))
                    .style(Style::default().add_modifier(Modifier::BOLD))
            } else {
                ListItem::new(format!("  {}", track.display))
            }
        })
        .collect();

    let list = List::new(visible_items)
        .block(Block::default().borders(Borders::ALL).title(" tracks "))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    let mut state = ListState::default();
    if total > 0 {
        state.select(Some(selected_pos_in_visible));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_player(frame: &mut Frame, app: &App, area: Rect) {
    let view = app.view();
    let state = view.state();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" now playing ")
        .padding(Padding {
            left: 1,
            right: 1,
            top: 0,
            bottom: 0,
        });
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(2),
        ])
        .split(inner);

    let meta = match &state.track {
        Some(track) => format!(
            "{}\n{}\n{}",
            track.title,
            track.artist.as_deref().unwrap_or("-"),
            track.album.as_deref().unwrap_or("-"),
        ),
        None => "Nothing playing".to_string(),
    };
    frame.render_widget(
        Paragraph::new(meta)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        rows[0],
    );

    let state_line = if state.is_busy {
        "Loading…".to_string()
    } else if state.is_seeking {
        format!("{} seeking", play_icon(view.is_playing()))
    } else {
        play_icon(view.is_playing()).to_string()
    };
    frame.render_widget(
        Paragraph::new(state_line).alignment(Alignment::Center),
        rows[1],
    );

    let gauge = Gauge::default()
        .gauge_style(Style::default().add_modifier(Modifier::BOLD))
        .ratio(state.progress())
        .label(time_text(state));
    frame.render_widget(gauge, rows[2]);

    if let Some(err) = &state.last_error {
        frame.render_widget(
            Paragraph::new(format!("error: {}", err))
                .red()
                .wrap(Wrap { trim: true }),
            rows[3],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controls_text_depends_on_screen() {
        let list = controls_text(Screen::List, 5);
        assert!(list.contains("[enter] play + open player"));
        assert!(!list.contains("H/L"));

        let player = controls_text(Screen::Player, 10);
        assert!(player.contains("[H/L] scrub -/+10s"));
        assert!(player.contains("[esc] back to list"));
    }

    #[test]
    fn time_text_handles_unknown_duration() {
        let mut state = Snapshot {
            position: Duration::from_secs(75),
            ..Snapshot::default()
        };
        assert_eq!(time_text(&state), "01:15 / --:--");

        state.duration = Some(Duration::from_secs(3600 + 5));
        assert_eq!(time_text(&state), "01:15 / 60:05");
    }
}
