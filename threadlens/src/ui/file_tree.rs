//! Files sidebar: one row per changed file with its status badge, change
//! counts and how many conversation anchors point into it.

use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{List, ListItem},
};

use threadlens_core::anchor::paths_match;

use crate::app::{AppState, PanelFocus};
use crate::git::types::FileSummary;
use crate::theme::Theme;
use crate::ui::layout::panel_block;

const MAX_PATH_CHARS: usize = 28;

pub fn render_file_list(frame: &mut Frame, area: Rect, state: &mut AppState, theme: &Theme) {
    let is_focused = state.focus == PanelFocus::Files;
    let title = match state.file_summaries.len() {
        0 => "Files".to_owned(),
        n => format!("Files ({n})"),
    };
    let block = panel_block(title, is_focused, theme);

    let items: Vec<ListItem> = if state.file_summaries.is_empty() {
        let msg = if state.diff_loading { "Loading..." } else { "No changes" };
        vec![ListItem::new(Line::raw(msg))]
    } else {
        state
            .file_summaries
            .iter()
            .map(|f| {
                let anchors = state
                    .entries
                    .iter()
                    .filter(|e| paths_match(&e.file_path, &f.path))
                    .count();
                file_summary_item(f, anchors, theme)
            })
            .collect()
    };

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().fg(theme.border_active));

    frame.render_stateful_widget(list, area, &mut state.file_list_state);
}

/// `[M] …/src/main.rs  +42 -7  ◆3`
fn file_summary_item(f: &FileSummary, anchors: usize, theme: &Theme) -> ListItem<'static> {
    let badge_color = match f.status {
        'A' => theme.file_added,
        'D' => theme.file_removed,
        'R' => theme.file_renamed,
        _ => theme.file_modified,
    };
    let mut spans = vec![
        Span::styled(format!("[{}] ", f.status), Style::default().fg(badge_color)),
        Span::raw(shorten_path(&f.path)),
    ];
    if f.added > 0 || f.removed > 0 {
        spans.push(Span::styled(
            format!("  +{} -{}", f.added, f.removed),
            Style::default().fg(theme.panel_notice),
        ));
    }
    if anchors > 0 {
        spans.push(Span::styled(
            format!("  ◆{anchors}"),
            Style::default().fg(theme.connector_marker),
        ));
    }
    ListItem::new(Line::from(spans))
}

/// Keeps the tail of long paths. Counts chars so multi-byte names never split.
fn shorten_path(path: &str) -> String {
    let len = path.chars().count();
    if len <= MAX_PATH_CHARS {
        return path.to_owned();
    }
    let tail: String = path.chars().skip(len - (MAX_PATH_CHARS - 1)).collect();
    format!("…{tail}")
}

#[cfg(test)]
mod tests {
    use super::shorten_path;

    #[test]
    fn long_paths_keep_their_tail() {
        let short = shorten_path("crates/engine/src/some/deeply/nested/module.rs");
        assert_eq!(short.chars().count(), 28);
        assert!(short.starts_with('…'));
        assert!(short.ends_with("nested/module.rs"));
        assert_eq!(shorten_path("src/main.rs"), "src/main.rs");
    }
}
