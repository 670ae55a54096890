//! Central application state.
//!
//! Pure state plus the transitions the key handlers and the event loop apply
//! to it. Rendering reads it; nothing here draws.

use crossbeam_channel::Sender;
use ratatui::layout::Rect as CellRect;
use ratatui::widgets::ListState;

use threadlens_core::anchor;
use threadlens_core::document::{Point, Size};
use threadlens_core::locator::TextRegion;
use threadlens_core::overlay::{collect_entries, AnchorEntry, ConnectorPath, FrameGate, HoverState, PreviewContent};
use threadlens_core::pipeline::PanelState;
use threadlens_core::types::ConversationIdentity;

use crate::git::types::{DiffRow, FileSummary, GitRequest, GitResultPayload, OwnedDiffHunk, RepoContext, RowKind};
use crate::view::{self, Column, ReviewDocument, CELL_HEIGHT, CELL_WIDTH};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Normal,
    HelpOverlay,
}

/// Which panel receives scroll and selection keys.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PanelFocus {
    #[default]
    Conversation,
    Files,
    Diff,
}

impl PanelFocus {
    pub fn prev(self) -> Self {
        match self {
            PanelFocus::Conversation => PanelFocus::Diff,
            PanelFocus::Files => PanelFocus::Conversation,
            PanelFocus::Diff => PanelFocus::Files,
        }
    }

    pub fn next(self) -> Self {
        match self {
            PanelFocus::Conversation => PanelFocus::Files,
            PanelFocus::Files => PanelFocus::Diff,
            PanelFocus::Diff => PanelFocus::Conversation,
        }
    }

    pub fn of(column: Column) -> Self {
        match column {
            Column::Conversation => PanelFocus::Conversation,
            Column::Files => PanelFocus::Files,
            Column::Diff => PanelFocus::Diff,
        }
    }
}

pub struct AppState {
    pub mode: Mode,
    pub focus: PanelFocus,
    pub help_scroll: u16,

    pub message_list_state: ListState,
    pub file_list_state: ListState,
    /// usize so diffs longer than 65535 rows scroll; clamped by the renderer.
    pub diff_scroll: usize,

    /// Inner panel heights from the previous frame, for page-wise scrolling.
    pub conversation_viewport_height: u16,
    pub files_viewport_height: u16,
    pub diff_viewport_height: u16,
    /// Outer rects of the visible columns from the previous frame, for mouse hits.
    pub column_rects: Vec<(Column, CellRect)>,
    /// Inner rect of the diff panel from the previous frame.
    pub diff_area: CellRect,
    pub screen: CellRect,

    /// Width percentages of the conversation and files columns; the diff
    /// takes the rest.
    pub conversation_pct: u16,
    pub files_pct: u16,

    pub base: String,
    pub diff_lines: Vec<ratatui::text::Line<'static>>,
    pub rows: Vec<DiffRow>,
    pub hunks: Vec<OwnedDiffHunk>,
    pub file_summaries: Vec<FileSummary>,
    pub hunk_offsets: Vec<usize>,
    pub file_line_offsets: Vec<usize>,
    pub hunk_cursor: usize,
    pub diff_loading: bool,
    pub diff_error: Option<String>,
    pub context: Option<RepoContext>,

    pub panel: PanelState,
    /// Incremented per mapping load; stale results are dropped.
    pub load_generation: u64,
    pub review: ReviewDocument,
    pub entries: Vec<AnchorEntry>,
    pub connectors: Vec<ConnectorPath>,
    pub geometry: FrameGate,
    pub hover: HoverState,

    /// One-line feedback shown in the status bar.
    pub notice: Option<String>,
    pub git_tx: Option<Sender<GitRequest>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            focus: PanelFocus::default(),
            help_scroll: 0,
            message_list_state: ListState::default(),
            file_list_state: ListState::default(),
            diff_scroll: 0,
            conversation_viewport_height: 0,
            files_viewport_height: 0,
            diff_viewport_height: 0,
            column_rects: Vec::new(),
            diff_area: CellRect::default(),
            screen: CellRect::default(),
            conversation_pct: 30,
            files_pct: 18,
            base: "main".to_owned(),
            diff_lines: Vec::new(),
            rows: Vec::new(),
            hunks: Vec::new(),
            file_summaries: Vec::new(),
            hunk_offsets: Vec::new(),
            file_line_offsets: Vec::new(),
            hunk_cursor: 0,
            diff_loading: false,
            diff_error: None,
            context: None,
            panel: PanelState::default(),
            load_generation: 0,
            review: ReviewDocument::new(),
            entries: Vec::new(),
            connectors: Vec::new(),
            geometry: FrameGate::new(),
            hover: HoverState::default(),
            notice: None,
            git_tx: None,
        }
    }
}

impl AppState {
    pub fn with_base(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            ..Self::default()
        }
    }

    /// Asks the git worker for the branch diff.
    pub fn request_diff(&mut self) {
        if let Some(tx) = &self.git_tx {
            self.diff_loading = true;
            let _ = tx.send(GitRequest::LoadDiff {
                base: self.base.clone(),
            });
        }
    }

    pub fn scroll_down(&mut self, lines: u16) {
        match self.focus {
            PanelFocus::Conversation => self.message_list_state.scroll_down_by(lines),
            PanelFocus::Files => self.file_list_state.scroll_down_by(lines),
            PanelFocus::Diff => {
                self.diff_scroll = self.diff_scroll.saturating_add(usize::from(lines));
            }
        }
        self.geometry.request();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        match self.focus {
            PanelFocus::Conversation => self.message_list_state.scroll_up_by(lines),
            PanelFocus::Files => self.file_list_state.scroll_up_by(lines),
            PanelFocus::Diff => {
                self.diff_scroll = self.diff_scroll.saturating_sub(usize::from(lines));
            }
        }
        self.geometry.request();
    }

    pub fn scroll_top(&mut self) {
        match self.focus {
            PanelFocus::Conversation => self.message_list_state.select_first(),
            PanelFocus::Files => self.file_list_state.select_first(),
            PanelFocus::Diff => self.diff_scroll = 0,
        }
        self.geometry.request();
    }

    pub fn scroll_bottom(&mut self) {
        match self.focus {
            PanelFocus::Conversation => self.message_list_state.select_last(),
            PanelFocus::Files => self.file_list_state.select_last(),
            PanelFocus::Diff => self.diff_scroll = self.diff_lines.len().saturating_sub(1),
        }
        self.geometry.request();
    }

    fn focused_height(&self) -> u16 {
        match self.focus {
            PanelFocus::Conversation => self.conversation_viewport_height,
            PanelFocus::Files => self.files_viewport_height,
            PanelFocus::Diff => self.diff_viewport_height,
        }
    }

    pub fn half_page_down(&mut self) {
        self.scroll_down((self.focused_height() / 2).max(1));
    }

    pub fn half_page_up(&mut self) {
        self.scroll_up((self.focused_height() / 2).max(1));
    }

    pub fn full_page_down(&mut self) {
        self.scroll_down(self.focused_height().max(1));
    }

    pub fn full_page_up(&mut self) {
        self.scroll_up(self.focused_height().max(1));
    }

    pub fn prev_hunk(&mut self) {
        if self.hunk_offsets.is_empty() {
            return;
        }
        self.hunk_cursor = self.hunk_cursor.saturating_sub(1);
        self.diff_scroll = self.hunk_offsets[self.hunk_cursor];
        self.geometry.request();
    }

    pub fn next_hunk(&mut self) {
        if self.hunk_offsets.is_empty() {
            return;
        }
        self.hunk_cursor = (self.hunk_cursor + 1).min(self.hunk_offsets.len() - 1);
        self.diff_scroll = self.hunk_offsets[self.hunk_cursor];
        self.geometry.request();
    }

    pub fn prev_file(&mut self) {
        if self.file_summaries.is_empty() {
            return;
        }
        let idx = self.file_list_state.selected().unwrap_or(0).saturating_sub(1);
        self.file_list_state.select(Some(idx));
        self.jump_to_selected_file();
    }

    pub fn next_file(&mut self) {
        if self.file_summaries.is_empty() {
            return;
        }
        let idx = self
            .file_list_state
            .selected()
            .map_or(0, |i| (i + 1).min(self.file_summaries.len() - 1));
        self.file_list_state.select(Some(idx));
        self.jump_to_selected_file();
    }

    /// Installs a new diff and mirrors it into the review document.
    pub fn apply_git_result(&mut self, payload: GitResultPayload) {
        self.review.load_diff(&payload);
        self.review.poll_mount();

        self.file_summaries = payload.files;
        self.diff_lines = payload.highlighted_lines;
        self.rows = payload.rows;
        self.hunks = payload.hunks;
        self.hunk_offsets = payload.hunk_offsets;
        self.file_line_offsets = payload.file_line_offsets;
        self.diff_error = payload.error;
        self.context = payload.context;
        self.diff_loading = false;
        self.diff_scroll = self.diff_scroll.min(self.diff_lines.len().saturating_sub(1));
        self.hunk_cursor = 0;
        if self.file_list_state.selected().is_none() && !self.file_summaries.is_empty() {
            self.file_list_state.select_first();
        }
        self.hover.leave();
        // Anchors may now resolve against rows that did not exist before.
        self.rebuild_entries();
    }

    /// Starts a new mapping load generation. Returns what to load it for, or
    /// `None` while the conversation identity is unknown.
    pub fn begin_mapping_load(&mut self) -> Option<(u64, ConversationIdentity, Vec<TextRegion>)> {
        let context = self.context.as_ref()?;
        let (identity, view) = (context.identity.clone(), context.view.clone());
        self.load_generation += 1;
        self.panel = PanelState::Loading;
        self.set_mapping_view();
        Some((self.load_generation, identity, view))
    }

    /// Applies a finished load unless a newer one has started since.
    pub fn apply_mapping(&mut self, generation: u64, state: PanelState) -> bool {
        if generation != self.load_generation {
            tracing::debug!(generation, current = self.load_generation, "dropping superseded mapping load");
            return false;
        }
        self.panel = state;
        self.set_mapping_view();
        if self.message_list_state.selected().is_none() && !self.review.message_items().is_empty() {
            self.message_list_state.select_first();
        }
        true
    }

    fn set_mapping_view(&mut self) {
        self.review.set_messages(self.panel.mapping());
        self.hover.leave();
        self.rebuild_entries();
    }

    fn rebuild_entries(&mut self) {
        self.entries = match self.panel.mapping() {
            Some(mapping) => collect_entries(mapping, self.review.message_items()),
            None => Vec::new(),
        };
        self.connectors.clear();
        self.geometry.request();
    }

    pub fn selected_message_id(&self) -> Option<&str> {
        let idx = self.message_list_state.selected()?;
        self.review
            .message_items()
            .get(idx)
            .map(|(_, id)| id.as_str())
    }

    /// Scrolls the diff to the first resolvable anchor of the selected
    /// message. Returns whether one was found.
    pub fn jump_to_selected_anchor(&mut self) -> bool {
        let Some(message_id) = self.selected_message_id() else {
            return false;
        };
        let row = self
            .entries
            .iter()
            .filter(|entry| entry.message_id == message_id)
            .filter_map(|entry| anchor::locate(self.review.doc(), &entry.file_path, entry.line))
            .find_map(|located| self.review.row_of(located.node));
        match row {
            Some(row) => {
                self.diff_scroll = row.saturating_sub(usize::from(self.diff_viewport_height / 3));
                self.focus = PanelFocus::Diff;
                self.notice = None;
                self.geometry.request();
                true
            }
            None => {
                self.notice = Some("no anchor in this diff for the selected message".to_owned());
                false
            }
        }
    }

    /// Scrolls the diff to the file selected in the sidebar.
    pub fn jump_to_selected_file(&mut self) {
        let Some(idx) = self.file_list_state.selected() else {
            return;
        };
        if let Some(&offset) = self.file_line_offsets.get(idx) {
            self.diff_scroll = offset;
            self.hunk_cursor = self
                .hunk_offsets
                .iter()
                .position(|&h| h >= offset)
                .unwrap_or(0);
            self.focus = PanelFocus::Diff;
            self.geometry.request();
        }
    }

    /// Shows the preview for the hunk header under the pointer, or hides it.
    pub fn hover_at(&mut self, col: u16, row: u16) {
        let area = self.diff_area;
        let inside = col >= area.x
            && col < area.x.saturating_add(area.width)
            && row >= area.y
            && row < area.y.saturating_add(area.height);
        let hunk_id = inside
            .then(|| self.diff_scroll + usize::from(row - area.y))
            .and_then(|idx| self.rows.get(idx))
            .and_then(|r| match r.kind {
                RowKind::HunkHeader { hunk } => self.hunks.get(hunk),
                _ => None,
            })
            .zip(self.panel.mapping())
            .and_then(|(hunk, mapping)| view::mapping_hunk_id(mapping, hunk))
            .map(str::to_owned);

        let (Some(hunk_id), Some(mapping)) = (hunk_id, self.panel.mapping()) else {
            self.hover.leave();
            return;
        };
        let viewport = view::cell_to_px(self.screen);
        self.hover.enter(
            mapping,
            &hunk_id,
            view::cell_center(col, row),
            Size::new(viewport.width, viewport.height),
            preview_size,
        );
    }

    pub fn grow_diff_panel(&mut self) {
        const MIN_SIDE: u16 = 10;
        const STEP: u16 = 4;
        let from_conversation = (STEP / 2).min(self.conversation_pct.saturating_sub(MIN_SIDE));
        let from_files = (STEP - STEP / 2).min(self.files_pct.saturating_sub(MIN_SIDE));
        self.conversation_pct -= from_conversation;
        self.files_pct -= from_files;
        self.geometry.request();
    }

    pub fn shrink_diff_panel(&mut self) {
        const MAX_SIDES: u16 = 70;
        const STEP: u16 = 4;
        let room = MAX_SIDES.saturating_sub(self.conversation_pct + self.files_pct);
        let total = STEP.min(room);
        self.conversation_pct += total / 2;
        self.files_pct += total - total / 2;
        self.geometry.request();
    }
}

/// Rendered size of a preview box: the widest line plus borders, one row per
/// line plus the "+N more" row.
pub fn preview_size(content: &PreviewContent) -> Size {
    let widest = content
        .lines
        .iter()
        .map(|l| l.role.chars().count() + 2 + l.excerpt.chars().count())
        .chain(content.more.iter().map(|m| m.chars().count()))
        .max()
        .unwrap_or(0);
    let rows = content.lines.len() + usize::from(content.more.is_some());
    Size::new(
        (widest + 2) as f64 * CELL_WIDTH,
        (rows + 2) as f64 * CELL_HEIGHT,
    )
}

/// Pixel position of the preview's top-left corner, as a cell.
pub fn preview_origin(position: Point) -> (u16, u16) {
    view::px_to_cell(position).unwrap_or((0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::types::FileSummary;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use threadlens_core::index::IndexedMapping;
    use threadlens_core::types::{Edit, EditHunkLink, Hunk, Mapping, Message};

    fn payload() -> GitResultPayload {
        GitResultPayload {
            files: vec![FileSummary { path: "src/lib.rs".into(), status: 'M', added: 1, removed: 0 }],
            hunks: vec![OwnedDiffHunk {
                file_path: "src/lib.rs".into(),
                header: "@@ -4,2 +4,3 @@".into(),
                old_start: 4,
                old_lines: 2,
                new_start: 4,
                new_lines: 3,
                lines: Vec::new(),
            }],
            rows: vec![
                DiffRow { file: 0, kind: RowKind::FileHeader },
                DiffRow { file: 0, kind: RowKind::HunkHeader { hunk: 0 } },
                DiffRow {
                    file: 0,
                    kind: RowKind::Line { hunk: 0, old_lineno: None, new_lineno: Some(5) },
                },
            ],
            highlighted_lines: vec![Default::default(); 3],
            file_line_offsets: vec![0],
            hunk_offsets: vec![1],
            context: Some(RepoContext {
                identity: ConversationIdentity::new("acme", "widgets", "feature"),
                view: Vec::new(),
            }),
            ..GitResultPayload::default()
        }
    }

    fn mapping() -> IndexedMapping {
        IndexedMapping::new(Mapping {
            messages: vec![Message {
                id: "m1".into(),
                role: "assistant".into(),
                content: "Tightened the parser".into(),
                timestamp: None,
                parent_id: None,
                tool: None,
            }],
            edits: vec![Edit {
                id: "e1".into(),
                file_path: "src/lib.rs".into(),
                start_line: Some(5),
                end_line: Some(6),
                message_id: Some("m1".into()),
                user_message_id: None,
                confidence: "exact".into(),
                tool: None,
            }],
            hunks: vec![Hunk {
                id: "h1".into(),
                file_path: "src/lib.rs".into(),
                old_start: 4,
                old_lines: 2,
                new_start: 4,
                new_lines: 3,
            }],
            edit_hunks: vec![EditHunkLink { edit_id: "e1".into(), hunk_id: "h1".into() }],
            ..Mapping::default()
        })
    }

    #[test]
    fn focus_cycles_through_all_panels() {
        let focus = PanelFocus::Conversation;
        assert_eq!(focus.next().next().next(), focus);
        assert_eq!(focus.prev(), PanelFocus::Diff);
    }

    #[test]
    fn stale_mapping_loads_are_dropped() {
        let mut state = AppState::default();
        state.apply_git_result(payload());

        let (first, _, _) = state.begin_mapping_load().unwrap();
        let (second, identity, _) = state.begin_mapping_load().unwrap();
        assert_eq!(identity.thread_id, "feature");

        assert!(!state.apply_mapping(first, PanelState::Empty));
        assert_eq!(state.panel, PanelState::Loading);
        assert!(state.apply_mapping(second, PanelState::Ready(Arc::new(mapping()))));
        assert_eq!(state.selected_message_id(), Some("m1"));
    }

    #[test]
    fn enter_jumps_to_the_hunk_of_the_selected_message() {
        let mut state = AppState::default();
        state.apply_git_result(payload());
        let (generation, _, _) = state.begin_mapping_load().unwrap();
        state.apply_mapping(generation, PanelState::Ready(Arc::new(mapping())));

        // The edit is linked to h1, whose new side starts at line 4; only line
        // 5 is rendered, so the file block is the anchor.
        assert!(state.jump_to_selected_anchor());
        assert_eq!(state.diff_scroll, 0);
        assert_eq!(state.focus, PanelFocus::Diff);
    }

    #[test]
    fn hovering_a_linked_hunk_header_shows_its_messages() {
        let mut state = AppState::default();
        state.apply_git_result(payload());
        let (generation, _, _) = state.begin_mapping_load().unwrap();
        state.apply_mapping(generation, PanelState::Ready(Arc::new(mapping())));
        state.screen = CellRect::new(0, 0, 120, 40);
        state.diff_area = CellRect::new(60, 1, 59, 30);

        state.hover_at(70, 2);
        let preview = state.hover.current().unwrap();
        assert_eq!(preview.content.hunk_id, "h1");
        assert_eq!(preview.content.lines[0].excerpt, "Tightened the parser");

        state.hover_at(70, 3);
        assert!(state.hover.current().is_none());
    }

    #[test]
    fn next_file_selects_and_scrolls() {
        let mut state = AppState::default();
        let mut payload = payload();
        payload.files.push(FileSummary { path: "src/main.rs".into(), status: 'A', added: 3, removed: 0 });
        payload.file_line_offsets.push(2);
        state.apply_git_result(payload);

        state.next_file();
        assert_eq!(state.file_list_state.selected(), Some(1));
        assert_eq!(state.diff_scroll, 2);
        state.next_file();
        assert_eq!(state.file_list_state.selected(), Some(1));
        state.prev_file();
        assert_eq!(state.diff_scroll, 0);
    }

    #[test]
    fn preview_size_counts_borders_and_more_row() {
        let content = PreviewContent {
            hunk_id: "h".into(),
            lines: vec![threadlens_core::overlay::PreviewLine {
                message_id: "m".into(),
                role: "user".into(),
                excerpt: "abcd".into(),
            }],
            more: Some("+3 more".into()),
        };
        assert_eq!(preview_size(&content), Size::new(12.0 * CELL_WIDTH, 4.0 * CELL_HEIGHT));
    }
}
