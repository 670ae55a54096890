//! Key reference overlay, drawn last over a cleared area.

use ratatui::{
    Frame,
    layout::Constraint,
    style::{Modifier, Style},
    text::{Line, Text},
    widgets::{Block, Clear, Paragraph, Wrap},
};

use crate::theme::Theme;

/// Skipped below 60 columns, where the box would collapse.
pub fn render_help_overlay(frame: &mut Frame, theme: &Theme, help_scroll: u16) {
    if frame.area().width < 60 {
        return;
    }

    let overlay_area = frame
        .area()
        .centered(Constraint::Percentage(80), Constraint::Percentage(80));
    frame.render_widget(Clear, overlay_area);

    let block = Block::bordered()
        .title(" Keys · j/k scroll · ? or Esc to close ")
        .border_style(Style::default().fg(theme.border_active));

    frame.render_widget(
        Paragraph::new(help_text(theme))
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((help_scroll, 0)),
        overlay_area,
    );
}

fn help_text(theme: &Theme) -> Text<'static> {
    let heading = |title: &'static str| {
        Line::styled(
            title,
            Style::default()
                .fg(theme.border_active)
                .add_modifier(Modifier::BOLD),
        )
    };
    Text::from(vec![
        heading("Navigation"),
        Line::from("  j / k         Scroll down / up one line"),
        Line::from("  g / G         Jump to top / bottom"),
        Line::from("  Ctrl-d / u    Half page down / up"),
        Line::from("  Ctrl-f / b    Full page down / up"),
        Line::from("  H / L         Focus the panel to the left / right"),
        Line::from("  mouse wheel   Scroll the focused panel"),
        Line::from(""),
        heading("Conversation"),
        Line::from("  Enter         Scroll the diff to the selected message's change"),
        Line::from("  r             Forget the cached mapping and load it again"),
        Line::from(""),
        heading("Files"),
        Line::from("  { / }         Previous / next file"),
        Line::from("  Enter         Scroll the diff to the selected file"),
        Line::from(""),
        heading("Diff"),
        Line::from("  [ / ]         Previous / next hunk"),
        Line::from("  < / >         Shrink / grow the diff column"),
        Line::from("  hover         Show the messages behind a linked hunk header"),
        Line::from("  R             Recompute the diff"),
        Line::from(""),
        heading("General"),
        Line::from("  ?             Open / close this overlay"),
        Line::from("  q / Esc       Quit"),
    ])
}
