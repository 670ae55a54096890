//! Frame rendering.
//!
//! `render()` is the single entry point, called once per `AppEvent::Render`
//! inside `terminal.draw()`. Panels draw first; then this frame's cell
//! positions are written into the review document, connectors are recomputed
//! if something moved, and connectors, preview, status bar and help are drawn
//! on top.

pub mod conversation;
pub mod diff_view;
pub mod file_tree;
pub mod help;
pub mod keybindings;
pub mod layout;
pub mod overlay;

use ratatui::Frame;

use threadlens_core::overlay::recompute_geometry;

use crate::app::{AppState, Mode};
use crate::theme::Theme;
use crate::view::{Column, FrameGeometry};
use layout::{compute_layout, inner_rect, render_status_bar};

pub fn render(frame: &mut Frame, state: &mut AppState, theme: &Theme) {
    let screen = frame.area();
    let columns = state.review.columns();
    let (placed, status_bar) = compute_layout(screen, &columns, state);

    // Cached for the next keypress: page sizes and mouse hit-testing.
    state.screen = screen;
    state.column_rects = placed.clone();
    let mut geometry = FrameGeometry {
        screen,
        ..FrameGeometry::default()
    };
    for &(column, area) in &placed {
        let inner = inner_rect(area);
        match column {
            Column::Conversation => {
                state.conversation_viewport_height = inner.height;
                geometry.conversation = Some(inner);
            }
            Column::Files => {
                state.files_viewport_height = inner.height;
                geometry.files = Some(inner);
            }
            Column::Diff => {
                state.diff_viewport_height = inner.height;
                state.diff_area = inner;
                geometry.diff = inner;
            }
        }
    }

    for &(column, area) in &placed {
        match column {
            Column::Conversation => conversation::render_conversation(frame, area, state, theme),
            Column::Files => file_tree::render_file_list(frame, area, state, theme),
            Column::Diff => diff_view::render_diff(frame, area, state, theme),
        }
    }

    // Offsets are final only after the stateful widgets have rendered.
    geometry.diff_scroll = state.diff_scroll;
    geometry.message_offset = state.message_list_state.offset();
    state.review.sync_geometry(&geometry);
    if state.geometry.take() {
        state.connectors = recompute_geometry(state.review.doc(), &state.entries);
    }

    overlay::render_connectors(frame, state, theme);
    overlay::render_preview(frame, state, theme);
    render_status_bar(frame, status_bar, state, theme);

    if state.mode == Mode::HelpOverlay {
        help::render_help_overlay(frame, theme, state.help_scroll);
    }
}
