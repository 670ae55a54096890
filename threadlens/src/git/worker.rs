//! Background thread that owns the `git2::Repository`.
//!
//! `Repository` is `!Send`, so it is opened inside the thread and never leaves
//! it. Requests arrive over crossbeam, results go out as `AppEvent::GitResult`.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crossbeam_channel::Receiver;
use git2::{Delta, Diff, DiffOptions, Repository};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use similar::{ChangeTag, TextDiff};
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, ThemeSet};
use syntect::parsing::SyntaxSet;
use tokio::sync::mpsc::UnboundedSender;

use threadlens_core::locator::TextRegion;
use threadlens_core::types::ConversationIdentity;

use crate::event::AppEvent;
use crate::git::types::{
    DiffPalette, DiffRow, FileSummary, GitRequest, GitResultPayload, OwnedDiffHunk, OwnedDiffLine, RepoContext,
    RowKind,
};

static PS: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static TS: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const SYNTAX_THEME: &str = "base16-ocean.dark";

/// Opens the repository containing `path` and serves requests until every
/// sender is dropped.
pub fn git_worker_loop(
    path: PathBuf,
    palette: DiffPalette,
    rx: Receiver<GitRequest>,
    event_tx: UnboundedSender<AppEvent>,
) {
    // Warm the syntax tables before the first request.
    let _ = &*PS;
    let _ = &*TS;

    let repo = match Repository::discover(&path) {
        Ok(repo) => repo,
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "cannot open repository");
            let payload = GitResultPayload {
                error: Some(format!("not a git repository: {}", err.message())),
                ..GitResultPayload::default()
            };
            let _ = event_tx.send(AppEvent::GitResult(Box::new(payload)));
            return;
        }
    };

    for request in rx {
        let payload = handle_request(&repo, &palette, request);
        if event_tx.send(AppEvent::GitResult(Box::new(payload))).is_err() {
            break;
        }
    }
}

fn handle_request(repo: &Repository, palette: &DiffPalette, request: GitRequest) -> GitResultPayload {
    match request {
        GitRequest::LoadDiff { base } => {
            let context = match repo_context(repo) {
                Ok(context) => Some(context),
                Err(err) => {
                    tracing::warn!(error = %err, "cannot derive conversation identity");
                    None
                }
            };
            match branch_diff(repo, &base) {
                Ok(diff) => {
                    let mut payload = process_diff(&diff, palette);
                    tracing::info!(%base, files = payload.files.len(), hunks = payload.hunks.len(), "diff loaded");
                    payload.base = base;
                    payload.context = context;
                    payload
                }
                Err(err) => {
                    tracing::warn!(%base, error = %err, "diff failed");
                    GitResultPayload {
                        error: Some(format!("cannot diff against '{base}': {}", err.message())),
                        base,
                        context,
                        ..GitResultPayload::default()
                    }
                }
            }
        }
    }
}

/// Identity from the `origin` remote and the current branch; the head commit
/// message is the visible text searched for references.
pub fn repo_context(repo: &Repository) -> Result<RepoContext, git2::Error> {
    let head = repo.head()?;
    let branch = head.shorthand().unwrap_or("HEAD").to_owned();
    let message = head
        .peel_to_commit()?
        .message()
        .unwrap_or_default()
        .to_owned();

    let identity = repo
        .find_remote("origin")
        .ok()
        .and_then(|remote| {
            remote
                .url()
                .and_then(|url| ConversationIdentity::from_remote(url, branch.clone()))
        })
        .unwrap_or_else(|| ConversationIdentity::new("local", workdir_name(repo), branch.clone()));

    Ok(RepoContext {
        identity,
        view: vec![TextRegion::plain(message)],
    })
}

fn workdir_name(repo: &Repository) -> String {
    repo.workdir()
        .or_else(|| repo.path().parent())
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "repository".to_owned())
}

/// HEAD against its merge base with `base` (plain `base` when the histories
/// are unrelated).
fn branch_diff<'r>(repo: &'r Repository, base: &str) -> Result<Diff<'r>, git2::Error> {
    let head = repo.head()?.peel_to_commit()?;
    let base_commit = repo.revparse_single(base)?.peel_to_commit()?;
    let fork = repo
        .merge_base(base_commit.id(), head.id())
        .and_then(|oid| repo.find_commit(oid))
        .unwrap_or(base_commit);
    let mut opts = DiffOptions::new();
    repo.diff_tree_to_tree(Some(&fork.tree()?), Some(&head.tree()?), Some(&mut opts))
}

fn process_diff(diff: &Diff<'_>, palette: &DiffPalette) -> GitResultPayload {
    let (files, hunks, hunk_files) = extract(diff);
    let rendered = render_rows(&files, &hunks, &hunk_files, palette);
    GitResultPayload {
        hunks,
        files,
        highlighted_lines: rendered.lines,
        rows: rendered.rows,
        hunk_offsets: rendered.hunk_offsets,
        file_line_offsets: rendered.file_line_offsets,
        ..GitResultPayload::default()
    }
}

/// Walks the diff once, converting files, hunks and lines to owned values.
/// The third vector holds the file index of every hunk.
fn extract(diff: &Diff<'_>) -> (Vec<FileSummary>, Vec<OwnedDiffHunk>, Vec<usize>) {
    // git2 invokes the callbacks sequentially on this thread.
    let files: RefCell<Vec<FileSummary>> = RefCell::new(Vec::new());
    let hunks: RefCell<Vec<OwnedDiffHunk>> = RefCell::new(Vec::new());
    let hunk_files: RefCell<Vec<usize>> = RefCell::new(Vec::new());

    let _ = diff.foreach(
        &mut |delta, _progress| {
            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unknown".to_owned());
            let status = match delta.status() {
                Delta::Added => 'A',
                Delta::Deleted => 'D',
                Delta::Renamed => 'R',
                _ => 'M',
            };
            files.borrow_mut().push(FileSummary {
                path,
                status,
                added: 0,
                removed: 0,
            });
            true
        },
        None,
        Some(&mut |_delta, hunk| {
            let files = files.borrow();
            let file = files.len().saturating_sub(1);
            hunks.borrow_mut().push(OwnedDiffHunk {
                file_path: files.last().map(|f| f.path.clone()).unwrap_or_default(),
                header: String::from_utf8_lossy(hunk.header()).into_owned(),
                old_start: hunk.old_start(),
                old_lines: hunk.old_lines(),
                new_start: hunk.new_start(),
                new_lines: hunk.new_lines(),
                lines: Vec::new(),
            });
            hunk_files.borrow_mut().push(file);
            true
        }),
        Some(&mut |_delta, _hunk, line| {
            let origin = line.origin();
            if let Some(file) = files.borrow_mut().last_mut() {
                match origin {
                    '+' => file.added += 1,
                    '-' => file.removed += 1,
                    _ => {}
                }
            }
            if !matches!(origin, '+' | '-' | ' ') {
                return true;
            }
            if let Some(hunk) = hunks.borrow_mut().last_mut() {
                hunk.lines.push(OwnedDiffLine {
                    origin,
                    content: String::from_utf8_lossy(line.content()).into_owned(),
                    old_lineno: line.old_lineno(),
                    new_lineno: line.new_lineno(),
                });
            }
            true
        }),
    );

    (files.into_inner(), hunks.into_inner(), hunk_files.into_inner())
}

#[derive(Default)]
struct Rendered {
    lines: Vec<Line<'static>>,
    rows: Vec<DiffRow>,
    hunk_offsets: Vec<usize>,
    file_line_offsets: Vec<usize>,
}

impl Rendered {
    fn push(&mut self, row: DiffRow, line: Line<'static>) {
        self.rows.push(row);
        self.lines.push(line);
    }
}

/// Lays the diff out file by file: a file header row, then each hunk header
/// followed by its lines. Consecutive `-`/`+` pairs get word-level emphasis.
fn render_rows(
    files: &[FileSummary],
    hunks: &[OwnedDiffHunk],
    hunk_files: &[usize],
    palette: &DiffPalette,
) -> Rendered {
    let mut out = Rendered::default();

    for (file_idx, file) in files.iter().enumerate() {
        out.file_line_offsets.push(out.lines.len());
        out.push(
            DiffRow {
                file: file_idx,
                kind: RowKind::FileHeader,
            },
            Line::from(Span::styled(
                format!("── {} ", file.path),
                Style::default().add_modifier(Modifier::BOLD),
            )),
        );

        let mut highlighter = Highlighter::for_path(&file.path);
        let file_hunks = hunks
            .iter()
            .enumerate()
            .filter(|(idx, _)| hunk_files.get(*idx) == Some(&file_idx));
        for (hunk_idx, hunk) in file_hunks {
            out.hunk_offsets.push(out.lines.len());
            out.push(
                DiffRow {
                    file: file_idx,
                    kind: RowKind::HunkHeader { hunk: hunk_idx },
                },
                Line::from(Span::styled(
                    hunk.header.trim_end().to_owned(),
                    Style::default().fg(palette.hunk_header),
                )),
            );
            render_hunk_lines(&mut out, &mut highlighter, palette, (file_idx, hunk_idx), &hunk.lines);
        }
    }
    out
}

fn render_hunk_lines(
    out: &mut Rendered,
    highlighter: &mut Highlighter,
    palette: &DiffPalette,
    (file, hunk): (usize, usize),
    lines: &[OwnedDiffLine],
) {
    let row = |line: &OwnedDiffLine| DiffRow {
        file,
        kind: RowKind::Line {
            hunk,
            old_lineno: line.old_lineno,
            new_lineno: line.new_lineno,
        },
    };
    let mut pending: Option<(&OwnedDiffLine, Vec<Span<'static>>)> = None;

    for line in lines {
        let code = line.content.trim_end_matches(['\n', '\r']);
        let spans = highlighter.spans(code);
        match line.origin {
            '+' => {
                let new_spans = match pending.take() {
                    Some((removed, _)) => {
                        let old_code = removed.content.trim_end_matches(['\n', '\r']);
                        let (old_words, new_words) = word_diff_spans(old_code, code, palette);
                        out.push(row(removed), decorate(removed, old_words, palette));
                        new_words
                    }
                    None => spans,
                };
                out.push(row(line), decorate(line, new_spans, palette));
            }
            '-' => {
                if let Some((removed, spans)) = pending.take() {
                    out.push(row(removed), decorate(removed, spans, palette));
                }
                pending = Some((line, spans));
            }
            _ => {
                if let Some((removed, spans)) = pending.take() {
                    out.push(row(removed), decorate(removed, spans, palette));
                }
                out.push(row(line), decorate(line, spans, palette));
            }
        }
    }
    if let Some((removed, spans)) = pending.take() {
        out.push(row(removed), decorate(removed, spans, palette));
    }
}

/// Prepends the line-number gutter and the origin marker.
fn decorate(line: &OwnedDiffLine, body: Vec<Span<'static>>, palette: &DiffPalette) -> Line<'static> {
    let number = |n: Option<u32>| n.map_or_else(|| "    ".to_owned(), |n| format!("{n:>4}"));
    let (marker, color) = match line.origin {
        '+' => ("+ ", palette.added),
        '-' => ("- ", palette.removed),
        _ => ("  ", palette.gutter),
    };
    let mut spans = vec![
        Span::styled(
            format!("{} {} ", number(line.old_lineno), number(line.new_lineno)),
            Style::default().fg(palette.gutter),
        ),
        Span::styled(marker, Style::default().fg(color)),
    ];
    spans.extend(body);
    Line::from(spans)
}

/// Per-file syntect state; falls back to plain spans when no theme loaded.
struct Highlighter {
    inner: Option<HighlightLines<'static>>,
}

impl Highlighter {
    fn for_path(path: &str) -> Self {
        let ps: &'static SyntaxSet = &PS;
        let ts: &'static ThemeSet = &TS;
        let syntax = ps
            .find_syntax_by_extension(file_ext(path))
            .unwrap_or_else(|| ps.find_syntax_plain_text());
        let theme = ts.themes.get(SYNTAX_THEME).or_else(|| ts.themes.values().next());
        Self {
            inner: theme.map(|theme| HighlightLines::new(syntax, theme)),
        }
    }

    fn spans(&mut self, code: &str) -> Vec<Span<'static>> {
        let Some(h) = self.inner.as_mut() else {
            return vec![Span::raw(code.to_owned())];
        };
        let ranges = h.highlight_line(code, &PS).unwrap_or_default();
        if ranges.is_empty() {
            return vec![Span::raw(code.to_owned())];
        }
        ranges
            .into_iter()
            .map(|(style, text)| Span::styled(text.to_owned(), to_ratatui_style(style)))
            .collect()
    }
}

fn to_ratatui_style(style: syntect::highlighting::Style) -> Style {
    let color = |c: syntect::highlighting::Color| (c.a > 0).then_some(Color::Rgb(c.r, c.g, c.b));
    let mut out = Style::default();
    if let Some(fg) = color(style.foreground) {
        out = out.fg(fg);
    }
    for (font, modifier) in [
        (FontStyle::BOLD, Modifier::BOLD),
        (FontStyle::ITALIC, Modifier::ITALIC),
        (FontStyle::UNDERLINE, Modifier::UNDERLINED),
    ] {
        if style.font_style.contains(font) {
            out = out.add_modifier(modifier);
        }
    }
    out
}

/// Word-level spans for a removed/added pair; changed words are bold.
fn word_diff_spans(
    old_line: &str,
    new_line: &str,
    palette: &DiffPalette,
) -> (Vec<Span<'static>>, Vec<Span<'static>>) {
    let diff = TextDiff::from_words(old_line, new_line);
    let mut old_spans = Vec::new();
    let mut new_spans = Vec::new();

    for op in diff.ops() {
        for change in diff.iter_inline_changes(op) {
            for (emphasized, value) in change.iter_strings_lossy() {
                let text = value.into_owned();
                let styled = |color: Color| {
                    let style = Style::default().fg(color);
                    if emphasized {
                        style.add_modifier(Modifier::BOLD)
                    } else {
                        style
                    }
                };
                match change.tag() {
                    ChangeTag::Delete => old_spans.push(Span::styled(text, styled(palette.removed))),
                    ChangeTag::Insert => new_spans.push(Span::styled(text, styled(palette.added))),
                    ChangeTag::Equal => {
                        let span = Span::styled(text, Style::default().fg(palette.context));
                        old_spans.push(span.clone());
                        new_spans.push(span);
                    }
                }
            }
        }
    }
    (old_spans, new_spans)
}

fn file_ext(path: &str) -> &str {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("txt")
}
