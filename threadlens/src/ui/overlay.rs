//! Connectors from conversation messages to their diff anchors, and the hunk
//! hover preview. Both are drawn straight into the frame buffer after the
//! panels so they sit on top.

use ratatui::{
    Frame,
    buffer::Buffer,
    layout::{Position, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph},
};

use threadlens_core::overlay::HoverPreview;

use crate::app::{preview_origin, preview_size, AppState};
use crate::theme::Theme;
use crate::view::{px_to_cell, CELL_WIDTH};

const CURVE_GLYPH: &str = "·";
const MARKER_GLYPH: &str = "◆";

/// Draws every connector computed for this frame. Curves only paint blank
/// cells so panel text stays readable; markers always paint.
pub fn render_connectors(frame: &mut Frame, state: &AppState, theme: &Theme) {
    let selected = state.selected_message_id();
    let area = frame.area();
    let buf = frame.buffer_mut();

    for path in &state.connectors {
        let is_selected = state
            .entries
            .get(path.entry)
            .is_some_and(|entry| Some(entry.message_id.as_str()) == selected);
        let color = if is_selected {
            theme.connector_selected
        } else {
            theme.connector
        };

        let span_cells = ((path.curve.to.x - path.curve.from.x).abs() / CELL_WIDTH).ceil() as usize;
        for point in path.curve.sample(span_cells.max(1) * 2) {
            if let Some((x, y)) = px_to_cell(point) {
                paint(buf, area, x, y, CURVE_GLYPH, color, true);
            }
        }
        if let Some((x, y)) = px_to_cell(path.curve.marker) {
            paint(buf, area, x, y, MARKER_GLYPH, theme.connector_marker, false);
        }
    }
}

fn paint(buf: &mut Buffer, area: Rect, x: u16, y: u16, glyph: &str, color: Color, blank_only: bool) {
    let pos = Position { x, y };
    if !area.contains(pos) {
        return;
    }
    if let Some(cell) = buf.cell_mut(pos) {
        if blank_only && cell.symbol() != " " {
            return;
        }
        cell.set_symbol(glyph).set_fg(color);
    }
}

/// The preview box for the hunk under the pointer, if any.
pub fn render_preview(frame: &mut Frame, state: &AppState, theme: &Theme) {
    let Some(preview) = state.hover.current() else {
        return;
    };
    let area = preview_area(preview, frame.area());
    if area.width < 3 || area.height < 3 {
        return;
    }

    let mut lines: Vec<Line> = preview
        .content
        .lines
        .iter()
        .map(|line| {
            Line::from(vec![
                Span::styled(line.role.clone(), Style::default().fg(theme.role(&line.role))),
                Span::raw(": "),
                Span::raw(line.excerpt.clone()),
            ])
        })
        .collect();
    if let Some(more) = &preview.content.more {
        lines.push(Line::styled(more.clone(), Style::default().fg(theme.panel_notice)));
    }

    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::bordered().border_style(Style::default().fg(theme.preview_border)),
        ),
        area,
    );
}

/// Preview rect in cells, clipped to the screen.
fn preview_area(preview: &HoverPreview, screen: Rect) -> Rect {
    let size = preview_size(&preview.content);
    let (x, y) = preview_origin(preview.position);
    let width = (size.width / CELL_WIDTH).ceil() as u16;
    let height = (size.height / crate::view::CELL_HEIGHT).ceil() as u16;
    Rect::new(x, y, width, height).intersection(screen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadlens_core::document::Point;
    use threadlens_core::overlay::{PreviewContent, PreviewLine};

    #[test]
    fn preview_is_clipped_to_the_screen() {
        let preview = HoverPreview {
            content: PreviewContent {
                hunk_id: "h".into(),
                lines: vec![PreviewLine {
                    message_id: "m".into(),
                    role: "user".into(),
                    excerpt: "a fairly long excerpt".into(),
                }],
                more: None,
            },
            position: Point::new(36.0 * CELL_WIDTH, 0.0),
        };
        let area = preview_area(&preview, Rect::new(0, 0, 40, 10));
        assert_eq!(area, Rect::new(36, 0, 4, 3));
    }
}
