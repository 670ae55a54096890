//! Column layout and status bar.
//!
//! Columns appear in the order the review document's layout node lists them.
//! `Spacing::Overlap(1)` with fuzzy border merging lets neighbouring panels
//! share one border column.

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Margin, Rect, Spacing},
    style::{Modifier, Style},
    symbols::merge::MergeStrategy,
    text::{Line, Span},
    widgets::{Block, BorderType, Paragraph},
};

use threadlens_core::pipeline::PanelState;

use crate::app::{AppState, Mode};
use crate::theme::Theme;
use crate::view::Column;

/// Below this width the files column is hidden.
const FULL_WIDTH: u16 = 120;
/// Below this width only the diff is shown.
const MIN_SPLIT_WIDTH: u16 = 80;

/// Returns the visible columns with their outer rects, and the status bar row.
pub fn compute_layout(area: Rect, columns: &[Column], state: &AppState) -> (Vec<(Column, Rect)>, Rect) {
    let [main_area, status_bar] =
        area.layout(&Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]));

    let visible: Vec<Column> = columns
        .iter()
        .copied()
        .filter(|column| match column {
            Column::Diff => true,
            Column::Conversation => area.width >= MIN_SPLIT_WIDTH,
            Column::Files => area.width >= FULL_WIDTH,
        })
        .collect();

    let constraints: Vec<Constraint> = visible
        .iter()
        .map(|column| match column {
            Column::Conversation => Constraint::Percentage(state.conversation_pct),
            Column::Files => Constraint::Percentage(state.files_pct),
            Column::Diff => Constraint::Fill(1),
        })
        .collect();
    let rects = Layout::horizontal(constraints)
        .spacing(Spacing::Overlap(1))
        .split(main_area);

    (visible.into_iter().zip(rects.iter().copied()).collect(), status_bar)
}

/// Panel area without its 1-cell border.
pub fn inner_rect(area: Rect) -> Rect {
    area.inner(Margin { vertical: 1, horizontal: 1 })
}

/// Thick border when focused, plain otherwise. Fuzzy merging because exact
/// merging mis-joins thick and plain borders.
pub fn panel_block<'a>(title: impl Into<Line<'a>>, is_focused: bool, theme: &Theme) -> Block<'a> {
    let (border_style, border_type) = if is_focused {
        (Style::default().fg(theme.border_active), BorderType::Thick)
    } else {
        (Style::default().fg(theme.border_inactive), BorderType::Plain)
    };

    Block::bordered()
        .title(title)
        .border_type(border_type)
        .border_style(border_style)
        .merge_borders(MergeStrategy::Fuzzy)
}

/// Mode, compared range, conversation and load state, then any notice.
pub fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState, theme: &Theme) {
    let mode_text = match state.mode {
        Mode::Normal => " NORMAL ",
        Mode::HelpOverlay => " HELP ",
    };
    let mut spans = vec![
        Span::styled(
            mode_text,
            Style::default().fg(theme.status_mode).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" {}..HEAD ", state.base)),
    ];
    if let Some(context) = &state.context {
        spans.push(Span::raw(format!(" {} ", context.identity)));
    }
    let panel = match &state.panel {
        PanelState::Loading if state.context.is_none() => String::new(),
        PanelState::Loading => " loading conversation… ".to_owned(),
        PanelState::Empty => " no conversation ".to_owned(),
        PanelState::Failed(_) => " conversation failed ".to_owned(),
        PanelState::Ready(mapping) => format!(
            " {} messages · {} links ",
            mapping.mapping().messages.len(),
            state.connectors.len()
        ),
    };
    spans.push(Span::raw(panel));
    if state.diff_loading {
        spans.push(Span::raw(" computing diff… "));
    }
    if let Some(notice) = state.notice.as_ref().or(state.diff_error.as_ref()) {
        spans.push(Span::styled(
            format!(" {notice} "),
            Style::default().fg(theme.panel_error),
        ));
    }

    frame.render_widget(
        Paragraph::new(Line::from(spans))
            .style(Style::default().bg(theme.status_bar_bg).fg(theme.status_bar_fg)),
        area,
    );
}
