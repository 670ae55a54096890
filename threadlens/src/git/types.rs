//! Owned data passed from the git worker thread to the UI thread.
//!
//! Nothing here borrows from `git2`, so every value is `Send` and can be kept
//! in `AppState` as is.

use ratatui::style::Color;

use threadlens_core::locator::TextRegion;
use threadlens_core::types::ConversationIdentity;

/// Diff colors, baked into the rendered lines on the worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffPalette {
    pub added: Color,
    pub removed: Color,
    pub context: Color,
    pub hunk_header: Color,
    pub gutter: Color,
}

impl Default for DiffPalette {
    fn default() -> Self {
        Self {
            added: Color::Green,
            removed: Color::Red,
            context: Color::DarkGray,
            hunk_header: Color::Cyan,
            gutter: Color::DarkGray,
        }
    }
}

/// A single line of diff output.
///
/// `origin` follows `git2::DiffLine::origin()`: `'+'`, `'-'` or `' '`.
#[derive(Debug, Clone)]
pub struct OwnedDiffLine {
    pub origin: char,
    pub content: String,
    pub old_lineno: Option<u32>,
    pub new_lineno: Option<u32>,
}

/// One `@@` block, tagged with the file it belongs to.
#[derive(Debug, Clone)]
pub struct OwnedDiffHunk {
    pub file_path: String,
    /// Raw `@@ -a,b +c,d @@` header.
    pub header: String,
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub lines: Vec<OwnedDiffLine>,
}

/// Per-file statistics for the files sidebar.
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub path: String,
    /// `'M'` modified, `'A'` added, `'D'` deleted, `'R'` renamed.
    pub status: char,
    pub added: usize,
    pub removed: usize,
}

/// What a rendered diff row shows. Indices point into the payload's `files`
/// and `hunks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    FileHeader,
    HunkHeader { hunk: usize },
    Line {
        hunk: usize,
        old_lineno: Option<u32>,
        new_lineno: Option<u32>,
    },
}

/// Metadata for one entry of `highlighted_lines`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffRow {
    pub file: usize,
    pub kind: RowKind,
}

/// Where the conversation for this branch lives and what is "on screen" for
/// reference discovery: the head commit message.
#[derive(Debug, Clone)]
pub struct RepoContext {
    pub identity: ConversationIdentity,
    pub view: Vec<TextRegion>,
}

/// Requests handled by the git worker.
#[derive(Debug)]
pub enum GitRequest {
    /// Diff the merge base of `base` and HEAD against HEAD.
    LoadDiff { base: String },
}

/// Result payload sent back as `AppEvent::GitResult(Box<_>)`.
#[derive(Debug, Default)]
pub struct GitResultPayload {
    pub base: String,
    pub hunks: Vec<OwnedDiffHunk>,
    pub files: Vec<FileSummary>,
    /// Highlighted diff, built on the worker thread.
    pub highlighted_lines: Vec<ratatui::text::Line<'static>>,
    /// Parallel to `highlighted_lines`.
    pub rows: Vec<DiffRow>,
    /// Row index of every hunk header, for `[` / `]`.
    pub hunk_offsets: Vec<usize>,
    /// Row index of every file header.
    pub file_line_offsets: Vec<usize>,
    pub context: Option<RepoContext>,
    /// Set when the diff could not be computed.
    pub error: Option<String>,
}
