//! The review document behind the terminal UI.
//!
//! The diff and the file list are mirrored into a [`MemoryDocument`] shaped
//! like a hosted review page: a `main` shell with a file-filter sidebar and a
//! `#files` region of `data-path` blocks holding `data-line-number` rows. The
//! conversation panel is mounted into it by container discovery, and the
//! renderer writes cell positions back as pixel rectangles every frame so the
//! anchor and connector code can run unchanged.

use std::collections::HashMap;

use ratatui::layout::Rect as CellRect;

use threadlens_core::anchor::{FILE_PATH_ATTR, LINE_NUMBER_ATTR, LINE_SIDE_ATTR};
use threadlens_core::discovery::{init_panel, MountState, MountWatcher, FILE_FILTER_ATTR, LAYOUT_ATTR};
use threadlens_core::document::{Document, NodeId, Point, Query, Rect, Size};
use threadlens_core::index::IndexedMapping;
use threadlens_core::memdoc::MemoryDocument;

use crate::git::types::{GitResultPayload, OwnedDiffHunk, RowKind};

/// Pixel size of one terminal cell in document coordinates.
pub const CELL_WIDTH: f64 = 8.0;
pub const CELL_HEIGHT: f64 = 16.0;

pub const MESSAGE_ID_ATTR: &str = "data-message-id";
const HUNK_ATTR: &str = "data-hunk";

/// A top-level column of the terminal layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Conversation,
    Files,
    Diff,
}

/// Where each column landed on screen this frame (inner areas, borders excluded).
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameGeometry {
    pub screen: CellRect,
    pub conversation: Option<CellRect>,
    pub files: Option<CellRect>,
    pub diff: CellRect,
    pub diff_scroll: usize,
    pub message_offset: usize,
}

pub fn cell_to_px(area: CellRect) -> Rect {
    Rect::new(
        f64::from(area.x) * CELL_WIDTH,
        f64::from(area.y) * CELL_HEIGHT,
        f64::from(area.width) * CELL_WIDTH,
        f64::from(area.height) * CELL_HEIGHT,
    )
}

/// Cell containing `point`, or `None` when it lies left of or above the screen.
pub fn px_to_cell(point: Point) -> Option<(u16, u16)> {
    if point.x < 0.0 || point.y < 0.0 {
        return None;
    }
    let col = (point.x / CELL_WIDTH).floor();
    let row = (point.y / CELL_HEIGHT).floor();
    (col <= f64::from(u16::MAX) && row <= f64::from(u16::MAX)).then_some((col as u16, row as u16))
}

/// Centre of the cell at (`col`, `row`) in pixels.
pub fn cell_center(col: u16, row: u16) -> Point {
    Point::new(
        (f64::from(col) + 0.5) * CELL_WIDTH,
        (f64::from(row) + 0.5) * CELL_HEIGHT,
    )
}

#[derive(Debug)]
pub struct ReviewDocument {
    doc: MemoryDocument,
    shell: NodeId,
    sidebar: Option<NodeId>,
    files: Option<NodeId>,
    file_blocks: Vec<NodeId>,
    /// One node per diff row; file header rows map to their file block.
    row_nodes: Vec<NodeId>,
    node_rows: HashMap<NodeId, usize>,
    row_files: Vec<usize>,
    message_list: Option<NodeId>,
    message_items: Vec<(NodeId, String)>,
    watcher: MountWatcher,
}

impl Default for ReviewDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewDocument {
    /// An empty review shell. The panel is created right away and mounted as
    /// soon as diff content shows up.
    pub fn new() -> Self {
        let mut doc = MemoryDocument::new(Size::default());
        let root = doc.root();
        let shell = doc.element(root, "main", &[]);
        let watcher = init_panel(&mut doc);
        Self {
            doc,
            shell,
            sidebar: None,
            files: None,
            file_blocks: Vec::new(),
            row_nodes: Vec::new(),
            node_rows: HashMap::new(),
            row_files: Vec::new(),
            message_list: None,
            message_items: Vec::new(),
            watcher,
        }
    }

    pub fn doc(&self) -> &MemoryDocument {
        &self.doc
    }

    pub fn panel(&self) -> NodeId {
        self.watcher.panel()
    }

    pub fn mount_state(&self) -> MountState {
        self.watcher.state()
    }

    /// Retries mounting if the document changed since the last attempt.
    pub fn poll_mount(&mut self) -> MountState {
        self.watcher.poll(&mut self.doc)
    }

    /// Replaces the sidebar and diff content with `payload`.
    pub fn load_diff(&mut self, payload: &GitResultPayload) {
        let (sidebar, files) = self.ensure_regions();
        self.doc.clear_children(sidebar);
        self.doc.clear_children(files);
        self.file_blocks.clear();
        self.row_nodes.clear();
        self.node_rows.clear();
        self.row_files.clear();

        self.doc.element(
            sidebar,
            "input",
            &[(FILE_FILTER_ATTR, ""), ("aria-label", "Filter changed files")],
        );
        let list = self.doc.element(sidebar, "ul", &[]);
        for (idx, file) in payload.files.iter().enumerate() {
            let anchor = format!("diff-{idx}");
            let href = format!("#{anchor}");
            let item = self.doc.element(list, "li", &[]);
            self.doc.element(item, "a", &[("href", href.as_str())]);
            let block = self.doc.element(
                files,
                "div",
                &[(FILE_PATH_ATTR, file.path.as_str()), ("id", anchor.as_str())],
            );
            self.file_blocks.push(block);
        }

        for (row_idx, row) in payload.rows.iter().enumerate() {
            let Some(&block) = self.file_blocks.get(row.file) else {
                continue;
            };
            let node = match row.kind {
                RowKind::FileHeader => block,
                RowKind::HunkHeader { hunk } => {
                    let hunk = hunk.to_string();
                    self.doc.element(block, "div", &[(HUNK_ATTR, hunk.as_str())])
                }
                RowKind::Line {
                    old_lineno,
                    new_lineno,
                    ..
                } => self.line_node(block, row.file, old_lineno, new_lineno),
            };
            self.row_nodes.push(node);
            self.row_files.push(row.file);
            self.node_rows.entry(node).or_insert(row_idx);
        }
    }

    fn ensure_regions(&mut self) -> (NodeId, NodeId) {
        if let (Some(sidebar), Some(files)) = (self.sidebar, self.files) {
            return (sidebar, files);
        }
        let sidebar = self.doc.element(self.shell, "nav", &[]);
        let files = self.doc.element(self.shell, "div", &[("id", "files")]);
        self.sidebar = Some(sidebar);
        self.files = Some(files);
        (sidebar, files)
    }

    fn line_node(
        &mut self,
        block: NodeId,
        file: usize,
        old_lineno: Option<u32>,
        new_lineno: Option<u32>,
    ) -> NodeId {
        match (new_lineno, old_lineno) {
            (Some(new), _) => {
                let line = new.to_string();
                let id = format!("diff-{file}R{new}");
                self.doc.element(
                    block,
                    "div",
                    &[
                        (LINE_NUMBER_ATTR, line.as_str()),
                        (LINE_SIDE_ATTR, "new"),
                        ("id", id.as_str()),
                    ],
                )
            }
            (None, Some(old)) => {
                let line = old.to_string();
                self.doc.element(
                    block,
                    "div",
                    &[(LINE_NUMBER_ATTR, line.as_str()), (LINE_SIDE_ATTR, "old")],
                )
            }
            (None, None) => self.doc.element(block, "div", &[]),
        }
    }

    /// Rebuilds the message list inside the panel, in mapping order.
    pub fn set_messages(&mut self, mapping: Option<&IndexedMapping>) {
        let panel = self.panel();
        let list = match self.message_list {
            Some(list) => list,
            None => {
                let list = self.doc.element(panel, "ol", &[]);
                self.message_list = Some(list);
                list
            }
        };
        self.doc.clear_children(list);
        self.message_items.clear();
        let Some(mapping) = mapping else {
            return;
        };
        for message in mapping.ordered_messages() {
            let item = self
                .doc
                .element(list, "li", &[(MESSAGE_ID_ATTR, message.id.as_str())]);
            self.message_items.push((item, message.id.clone()));
        }
    }

    pub fn message_items(&self) -> &[(NodeId, String)] {
        &self.message_items
    }

    /// Diff row rendering `node`, if it is a row or a file block.
    pub fn row_of(&self, node: NodeId) -> Option<usize> {
        self.node_rows.get(&node).copied()
    }

    /// Column order as dictated by the layout node. Before the panel is
    /// mounted only the review content is shown.
    pub fn columns(&self) -> Vec<Column> {
        let root = self.doc.root();
        let Some(layout) = self.doc.query_first(root, &Query::HasAttr(LAYOUT_ATTR)) else {
            return vec![Column::Files, Column::Diff];
        };
        let mut columns = Vec::with_capacity(3);
        for child in self.doc.children(layout) {
            let column = if child == self.panel() {
                Column::Conversation
            } else if self.files.is_some_and(|files| self.doc.contains(child, files)) {
                Column::Diff
            } else if self.sidebar.is_some_and(|sidebar| self.doc.contains(child, sidebar)) {
                Column::Files
            } else {
                continue;
            };
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        if !columns.contains(&Column::Files) && self.sidebar.is_some() {
            columns.insert(columns.len().saturating_sub(1), Column::Files);
        }
        columns
    }

    /// Writes this frame's positions into the document. Rows and list items
    /// outside their panel's visible window get no rectangle.
    pub fn sync_geometry(&mut self, frame: &FrameGeometry) {
        let screen = cell_to_px(frame.screen);
        self.doc.clear_rects();
        self.doc.set_viewport(Size::new(screen.width, screen.height));

        if let Some(area) = frame.conversation {
            self.doc.set_rect(self.panel(), cell_to_px(area));
            let visible = self
                .message_items
                .iter()
                .enumerate()
                .skip(frame.message_offset)
                .take(usize::from(area.height));
            for (screen_row, (_, (item, _))) in visible.enumerate() {
                let row = CellRect::new(area.x, area.y + screen_row as u16, area.width, 1);
                self.doc.set_rect(*item, cell_to_px(row));
            }
        }
        if let (Some(area), Some(sidebar)) = (frame.files, self.sidebar) {
            self.doc.set_rect(sidebar, cell_to_px(area));
        }

        let area = frame.diff;
        if let Some(files) = self.files {
            self.doc.set_rect(files, cell_to_px(area));
        }
        let mut block_spans: HashMap<usize, (u16, u16)> = HashMap::new();
        let visible = self
            .row_nodes
            .iter()
            .zip(&self.row_files)
            .enumerate()
            .skip(frame.diff_scroll)
            .take(usize::from(area.height));
        for (screen_row, (_, (&node, &file))) in visible.enumerate() {
            let y = area.y + screen_row as u16;
            let span = block_spans.entry(file).or_insert((y, y));
            span.1 = y;
            if self.file_blocks.get(file) != Some(&node) {
                self.doc
                    .set_rect(node, cell_to_px(CellRect::new(area.x, y, area.width, 1)));
            }
        }
        for (file, (top, bottom)) in block_spans {
            if let Some(&block) = self.file_blocks.get(file) {
                let rows = CellRect::new(area.x, top, area.width, bottom - top + 1);
                self.doc.set_rect(block, cell_to_px(rows));
            }
        }
    }
}

/// The mapping hunk that corresponds to a hunk of the local diff: same file
/// (suffix-aware) and same new-side start.
pub fn mapping_hunk_id<'m>(mapping: &'m IndexedMapping, hunk: &OwnedDiffHunk) -> Option<&'m str> {
    mapping
        .mapping()
        .hunks
        .iter()
        .find(|h| {
            h.new_start == hunk.new_start
                && threadlens_core::anchor::paths_match(&h.file_path, &hunk.file_path)
        })
        .map(|h| h.id.as_str())
}
