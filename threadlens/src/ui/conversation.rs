//! Conversation panel: the mapping's messages in conversation order, or an
//! inline notice while loading and when nothing could be loaded.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, Paragraph, Wrap},
};

use threadlens_core::index::IndexedMapping;
use threadlens_core::pipeline::PanelState;

use crate::app::{AppState, PanelFocus};
use crate::theme::Theme;
use crate::ui::layout::{inner_rect, panel_block};

pub fn render_conversation(frame: &mut Frame, area: Rect, state: &mut AppState, theme: &Theme) {
    let is_focused = state.focus == PanelFocus::Conversation;
    let count = state.review.message_items().len();
    let title = if count > 0 {
        format!("Conversation ({count})")
    } else {
        "Conversation".to_owned()
    };
    let block = panel_block(title, is_focused, theme);

    let notice = match &state.panel {
        PanelState::Loading => Some(Line::styled(
            "Loading conversation…",
            Style::default().fg(theme.panel_notice),
        )),
        PanelState::Empty => Some(Line::styled(
            "No conversation mapping found for this branch.",
            Style::default().fg(theme.panel_notice),
        )),
        PanelState::Failed(reason) => Some(Line::styled(
            format!("Could not load the conversation: {reason}"),
            Style::default().fg(theme.panel_error),
        )),
        PanelState::Ready(_) if count == 0 => Some(Line::styled(
            "The mapping has no messages.",
            Style::default().fg(theme.panel_notice),
        )),
        PanelState::Ready(_) => None,
    };
    if let Some(line) = notice {
        frame.render_widget(block, area);
        frame.render_widget(
            Paragraph::new(line).wrap(Wrap { trim: true }),
            inner_rect(area),
        );
        return;
    }

    let Some(mapping) = state.panel.mapping() else {
        return;
    };
    let items: Vec<ListItem> = state
        .review
        .message_items()
        .iter()
        .map(|(_, id)| message_item(mapping, id, theme))
        .collect();

    let list = List::new(items).block(block).highlight_style(
        Style::default()
            .fg(theme.message_selected)
            .add_modifier(Modifier::REVERSED),
    );
    frame.render_stateful_widget(list, area, &mut state.message_list_state);
}

/// `role  first line of content  ·N` where N counts the message's edits.
fn message_item(mapping: &IndexedMapping, id: &str, theme: &Theme) -> ListItem<'static> {
    let Some(message) = mapping.message(id) else {
        return ListItem::new(Line::raw(id.to_owned()));
    };
    let first_line = message
        .content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .to_owned();
    let mut spans = vec![
        Span::styled(
            format!("{:<9} ", message.role),
            Style::default().fg(theme.role(&message.role)).add_modifier(Modifier::BOLD),
        ),
        Span::raw(first_line),
    ];
    let edits = mapping.edits_for_message(id).len();
    if edits > 0 {
        spans.push(Span::styled(
            format!("  ·{edits}"),
            Style::default().fg(theme.connector_marker),
        ));
    }
    ListItem::new(Line::from(spans))
}
