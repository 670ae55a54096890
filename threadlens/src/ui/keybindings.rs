//! Key and mouse dispatch.
//!
//! Translates crossterm events into `AppState` transitions and returns a
//! `KeyAction` for the work only the event loop can do (quitting, starting a
//! mapping load).

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Position;

use crate::app::{AppState, Mode, PanelFocus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Continue,
    Quit,
    /// Forget the cached mapping reference and load again.
    ReloadMapping,
}

const WHEEL_LINES: u16 = 3;

pub fn handle_key(key: KeyEvent, state: &mut AppState) -> KeyAction {
    match state.mode {
        Mode::HelpOverlay => handle_help(key, state),
        Mode::Normal => handle_normal(key, state),
    }
}

fn handle_normal(key: KeyEvent, state: &mut AppState) -> KeyAction {
    if let Some(action) = handle_scroll_key(key, state) {
        return action;
    }

    match key.code {
        KeyCode::Char('H') => state.focus = state.focus.prev(),
        KeyCode::Char('L') => state.focus = state.focus.next(),

        KeyCode::Enter => match state.focus {
            PanelFocus::Conversation => {
                state.jump_to_selected_anchor();
            }
            PanelFocus::Files => state.jump_to_selected_file(),
            PanelFocus::Diff => {}
        },

        KeyCode::Char('{') => state.prev_file(),
        KeyCode::Char('}') => state.next_file(),
        KeyCode::Char('[') => state.prev_hunk(),
        KeyCode::Char(']') => state.next_hunk(),
        KeyCode::Char('<') => state.shrink_diff_panel(),
        KeyCode::Char('>') => state.grow_diff_panel(),

        KeyCode::Char('r') => return KeyAction::ReloadMapping,
        KeyCode::Char('R') => state.request_diff(),

        KeyCode::Char('?') => {
            state.help_scroll = 0;
            state.mode = Mode::HelpOverlay;
        }
        KeyCode::Char('q') | KeyCode::Esc => return KeyAction::Quit,
        _ => {}
    }
    KeyAction::Continue
}

/// j/k/g/G and the Ctrl page keys. `None` when the key is not a scroll key.
fn handle_scroll_key(key: KeyEvent, state: &mut AppState) -> Option<KeyAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => state.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => state.scroll_up(1),
        KeyCode::Char('g') => state.scroll_top(),
        KeyCode::Char('G') => state.scroll_bottom(),
        KeyCode::Char('d') if ctrl => state.half_page_down(),
        KeyCode::Char('u') if ctrl => state.half_page_up(),
        KeyCode::Char('f') if ctrl => state.full_page_down(),
        KeyCode::Char('b') if ctrl => state.full_page_up(),
        _ => return None,
    }
    Some(KeyAction::Continue)
}

fn handle_help(key: KeyEvent, state: &mut AppState) -> KeyAction {
    match key.code {
        KeyCode::Char('j') => state.help_scroll = state.help_scroll.saturating_add(1),
        KeyCode::Char('k') => state.help_scroll = state.help_scroll.saturating_sub(1),
        KeyCode::Char('g') => state.help_scroll = 0,
        KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q') => state.mode = Mode::Normal,
        _ => {}
    }
    KeyAction::Continue
}

/// Click focuses the column under the pointer, the wheel scrolls, and moving
/// over a linked hunk header shows its preview.
pub fn handle_mouse(mouse: MouseEvent, state: &mut AppState) -> KeyAction {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            let pos = Position { x: mouse.column, y: mouse.row };
            if let Some(&(column, _)) = state
                .column_rects
                .iter()
                .find(|(_, rect)| rect.width > 0 && rect.contains(pos))
            {
                state.focus = PanelFocus::of(column);
            }
        }
        MouseEventKind::ScrollUp if state.mode == Mode::HelpOverlay => {
            state.help_scroll = state.help_scroll.saturating_sub(WHEEL_LINES);
        }
        MouseEventKind::ScrollDown if state.mode == Mode::HelpOverlay => {
            state.help_scroll = state.help_scroll.saturating_add(WHEEL_LINES);
        }
        MouseEventKind::ScrollUp => {
            state.scroll_up(WHEEL_LINES);
            state.hover.leave();
        }
        MouseEventKind::ScrollDown => {
            state.scroll_down(WHEEL_LINES);
            state.hover.leave();
        }
        MouseEventKind::Moved if state.mode == Mode::Normal => {
            state.hover_at(mouse.column, mouse.row);
        }
        _ => {}
    }
    KeyAction::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Column;
    use ratatui::layout::Rect;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn focus_and_quit_keys() {
        let mut state = AppState::default();
        assert_eq!(handle_key(key(KeyCode::Char('L')), &mut state), KeyAction::Continue);
        assert_eq!(state.focus, PanelFocus::Files);
        assert_eq!(handle_key(key(KeyCode::Char('r')), &mut state), KeyAction::ReloadMapping);
        assert_eq!(handle_key(key(KeyCode::Char('q')), &mut state), KeyAction::Quit);
    }

    #[test]
    fn help_overlay_swallows_quit() {
        let mut state = AppState::default();
        handle_key(key(KeyCode::Char('?')), &mut state);
        assert_eq!(state.mode, Mode::HelpOverlay);
        assert_eq!(handle_key(key(KeyCode::Char('q')), &mut state), KeyAction::Continue);
        assert_eq!(state.mode, Mode::Normal);
    }

    #[test]
    fn click_focuses_the_column_under_the_pointer() {
        let mut state = AppState::default();
        state.column_rects = vec![
            (Column::Conversation, Rect::new(0, 0, 30, 20)),
            (Column::Diff, Rect::new(29, 0, 50, 20)),
        ];
        let click = MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 40,
            row: 5,
            modifiers: KeyModifiers::NONE,
        };
        handle_mouse(click, &mut state);
        assert_eq!(state.focus, PanelFocus::Diff);
    }
}
