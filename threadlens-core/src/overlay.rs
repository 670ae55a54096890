//! Connector geometry between conversation entries and diff anchors, and the
//! hover preview shown over hunks.

use crate::anchor::{self, MatchStrategy};
use crate::document::{Document, NodeId, Point, Rect, Size};
use crate::index::IndexedMapping;

const MIN_CONTROL_OFFSET: f64 = 60.0;
const MAX_CONTROL_OFFSET: f64 = 180.0;

/// One edit target hanging off a rendered message list item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorEntry {
    pub list_item: NodeId,
    pub message_id: String,
    pub edit_id: String,
    pub file_path: String,
    pub line: Option<u32>,
    pub hunk_id: Option<String>,
}

/// Expands rendered list items (`(node, message id)`) into one entry per
/// anchor target of every edit the message made.
pub fn collect_entries(mapping: &IndexedMapping, list_items: &[(NodeId, String)]) -> Vec<AnchorEntry> {
    let mut entries = Vec::new();
    for (list_item, message_id) in list_items {
        for edit in mapping.edits_for_message(message_id) {
            for target in anchor::anchor_targets(edit, mapping) {
                entries.push(AnchorEntry {
                    list_item: *list_item,
                    message_id: message_id.clone(),
                    edit_id: edit.id.clone(),
                    file_path: target.file_path,
                    line: target.line,
                    hunk_id: target.hunk_id,
                });
            }
        }
    }
    entries
}

/// Cubic Bézier from a list item to its anchor. `marker` is where the
/// endpoint marker is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connector {
    pub from: Point,
    pub control_a: Point,
    pub control_b: Point,
    pub to: Point,
    pub marker: Point,
}

impl Connector {
    /// Point on the curve at `t` in `[0, 1]`.
    pub fn point_at(&self, t: f64) -> Point {
        let t = t.clamp(0.0, 1.0);
        let u = 1.0 - t;
        let (w0, w1, w2, w3) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
        Point {
            x: w0 * self.from.x + w1 * self.control_a.x + w2 * self.control_b.x + w3 * self.to.x,
            y: w0 * self.from.y + w1 * self.control_a.y + w2 * self.control_b.y + w3 * self.to.y,
        }
    }

    /// `steps + 1` evenly spaced points, endpoints included.
    pub fn sample(&self, steps: usize) -> Vec<Point> {
        let steps = steps.max(1);
        (0..=steps)
            .map(|i| self.point_at(i as f64 / steps as f64))
            .collect()
    }
}

/// Horizontal distance of both control points from their endpoints.
pub fn control_offset(dx: f64) -> f64 {
    (dx.abs() / 2.0).clamp(MIN_CONTROL_OFFSET, MAX_CONTROL_OFFSET)
}

/// Connector from `source`'s trailing edge to `target`'s leading edge, both
/// at their vertical middle.
pub fn connector_between(source: Rect, target: Rect) -> Connector {
    let from = Point::new(source.right(), source.center_y());
    let to = Point::new(target.left(), target.center_y());
    let offset = control_offset(to.x - from.x);
    Connector {
        from,
        control_a: Point::new(from.x + offset, from.y),
        control_b: Point::new(to.x - offset, to.y),
        to,
        marker: to,
    }
}

/// A connector together with what it links.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorPath {
    pub entry: usize,
    pub target: NodeId,
    pub strategy: MatchStrategy,
    pub curve: Connector,
}

/// Resolves every entry against the current document and builds connectors
/// for the pairs that are on screen. Entries whose anchor cannot be found, or
/// whose source or target is fully outside the viewport, produce nothing.
pub fn recompute_geometry<D: Document + ?Sized>(doc: &D, entries: &[AnchorEntry]) -> Vec<ConnectorPath> {
    let viewport = doc.viewport();
    entries
        .iter()
        .enumerate()
        .filter_map(|(entry, anchor_entry)| {
            let source = doc.bounding_rect(anchor_entry.list_item)?;
            if source.is_outside(viewport) {
                return None;
            }
            let located = anchor::locate(doc, &anchor_entry.file_path, anchor_entry.line)?;
            let target = doc.bounding_rect(located.node)?;
            if target.is_outside(viewport) {
                return None;
            }
            Some(ConnectorPath {
                entry,
                target: located.node,
                strategy: located.strategy,
                curve: connector_between(source, target),
            })
        })
        .collect()
}

/// Coalesces scroll and resize notifications into at most one geometry pass
/// per frame.
#[derive(Debug, Default)]
pub struct FrameGate {
    pending: bool,
}

impl FrameGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self) {
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Called once per frame; returns whether a pass should run now.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

/// Maximum number of messages listed in a hover preview.
pub const PREVIEW_LIMIT: usize = 5;
const PREVIEW_EXCERPT_CHARS: usize = 72;
/// Distance between the pointer and the preview's top-left corner.
pub const PREVIEW_OFFSET: f64 = 12.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewLine {
    pub message_id: String,
    pub role: String,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewContent {
    pub hunk_id: String,
    pub lines: Vec<PreviewLine>,
    /// `"+N more"` when more than [`PREVIEW_LIMIT`] messages touched the hunk.
    pub more: Option<String>,
}

/// Preview of the messages that produced `hunk_id`; `None` when there are none.
pub fn build_preview(mapping: &IndexedMapping, hunk_id: &str) -> Option<PreviewContent> {
    let messages = mapping.messages_for_hunk(hunk_id);
    if messages.is_empty() {
        return None;
    }
    let lines = messages
        .iter()
        .take(PREVIEW_LIMIT)
        .map(|m| PreviewLine {
            message_id: m.id.clone(),
            role: m.role.clone(),
            excerpt: excerpt(&m.content),
        })
        .collect();
    let hidden = messages.len().saturating_sub(PREVIEW_LIMIT);
    Some(PreviewContent {
        hunk_id: hunk_id.to_owned(),
        lines,
        more: (hidden > 0).then(|| format!("+{hidden} more")),
    })
}

fn excerpt(content: &str) -> String {
    let first = content.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if first.chars().count() <= PREVIEW_EXCERPT_CHARS {
        return first.to_owned();
    }
    let mut cut: String = first.chars().take(PREVIEW_EXCERPT_CHARS - 1).collect();
    cut.push('…');
    cut
}

/// Top-left corner for a preview of `size` near `pointer`, kept inside
/// `viewport`.
pub fn place_preview(pointer: Point, size: Size, viewport: Size) -> Point {
    let x = (pointer.x + PREVIEW_OFFSET).min(viewport.width - size.width).max(0.0);
    let y = (pointer.y + PREVIEW_OFFSET).min(viewport.height - size.height).max(0.0);
    Point::new(x, y)
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoverPreview {
    pub content: PreviewContent,
    pub position: Point,
}

/// Tracks the preview for the hunk under the pointer.
#[derive(Debug, Default)]
pub struct HoverState {
    current: Option<HoverPreview>,
}

impl HoverState {
    /// Shows (or moves) the preview for `hunk_id`. `size` computes the
    /// preview's rendered size from its content.
    pub fn enter(
        &mut self,
        mapping: &IndexedMapping,
        hunk_id: &str,
        pointer: Point,
        viewport: Size,
        size: impl FnOnce(&PreviewContent) -> Size,
    ) -> Option<&HoverPreview> {
        let content = match self.current.take() {
            Some(existing) if existing.content.hunk_id == hunk_id => existing.content,
            _ => build_preview(mapping, hunk_id)?,
        };
        let position = place_preview(pointer, size(&content), viewport);
        self.current = Some(HoverPreview { content, position });
        self.current.as_ref()
    }

    pub fn leave(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&HoverPreview> {
        self.current.as_ref()
    }
}
