//! Diff panel.
//!
//! Only `diff_lines[diff_scroll..diff_scroll + height]` is materialized per
//! frame, so rendering cost follows the viewport, not the diff size. Hunk
//! headers that the loaded mapping links to a conversation are restyled and
//! carry the number of messages behind them.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem},
};

use crate::app::{AppState, PanelFocus};
use crate::git::types::RowKind;
use crate::theme::Theme;
use crate::ui::layout::{inner_rect, panel_block};
use crate::view::mapping_hunk_id;

pub fn render_diff(frame: &mut Frame, area: Rect, state: &mut AppState, theme: &Theme) {
    let is_focused = state.focus == PanelFocus::Diff;
    let title = if state.base.is_empty() {
        "Diff".to_owned()
    } else {
        format!("Diff {}..HEAD", state.base)
    };
    frame.render_widget(panel_block(title, is_focused, theme), area);
    let inner = inner_rect(area);

    if state.diff_lines.is_empty() {
        let msg = if state.diff_loading {
            "Computing diff..."
        } else {
            "No changes against the base branch."
        };
        frame.render_widget(List::new(vec![ListItem::new(Line::raw(msg))]), inner);
        return;
    }

    let total = state.diff_lines.len();
    state.diff_scroll = state.diff_scroll.min(total.saturating_sub(1));
    let visible_start = state.diff_scroll;
    let visible_end = (visible_start + usize::from(inner.height)).min(total);

    let mapping = state.panel.mapping();
    let items: Vec<ListItem> = (visible_start..visible_end)
        .map(|idx| {
            let line = &state.diff_lines[idx];
            let linked = state
                .rows
                .get(idx)
                .and_then(|row| match row.kind {
                    RowKind::HunkHeader { hunk } => state.hunks.get(hunk),
                    _ => None,
                })
                .zip(mapping)
                .and_then(|(hunk, mapping)| {
                    mapping_hunk_id(mapping, hunk).map(|id| mapping.messages_for_hunk(id).len())
                });
            match linked {
                Some(messages) => ListItem::new(linked_header(line, messages, theme)),
                None => ListItem::new(line.clone()),
            }
        })
        .collect();

    frame.render_widget(List::new(items), inner);
}

fn linked_header(line: &Line<'static>, messages: usize, theme: &Theme) -> Line<'static> {
    let style = Style::default()
        .fg(theme.diff_hunk_linked)
        .add_modifier(Modifier::BOLD);
    let mut spans: Vec<Span<'static>> = line
        .spans
        .iter()
        .map(|span| Span::styled(span.content.clone(), style))
        .collect();
    let noun = if messages == 1 { "message" } else { "messages" };
    spans.push(Span::styled(
        format!("  ◆ {messages} {noun}"),
        Style::default().fg(theme.connector_marker),
    ));
    Line::from(spans)
}
