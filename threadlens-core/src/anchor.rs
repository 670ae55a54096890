//! Resolves edits and hunks to nodes of the review document.

use crate::document::{Document, NodeId, Query};
use crate::index::IndexedMapping;
use crate::types::Edit;

/// Attribute naming the file a diff block renders.
pub const FILE_PATH_ATTR: &str = "data-path";
/// Attribute carrying a line number on a diff cell.
pub const LINE_NUMBER_ATTR: &str = "data-line-number";
/// Attribute carrying the side of a diff cell; `old` cells are never markers.
pub const LINE_SIDE_ATTR: &str = "data-side";

const OLD_SIDE: &str = "old";

/// One place an edit should point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorTarget {
    pub file_path: String,
    pub line: Option<u32>,
    pub hunk_id: Option<String>,
}

/// Anchor targets for `edit`: one per linked hunk (at the hunk's new start),
/// or the edit's own file and start line when it has no linked hunks.
pub fn anchor_targets(edit: &Edit, mapping: &IndexedMapping) -> Vec<AnchorTarget> {
    let hunks = mapping.hunks_for_edit(&edit.id);
    if hunks.is_empty() {
        return vec![AnchorTarget {
            file_path: edit.file_path.clone(),
            line: edit.start_line,
            hunk_id: None,
        }];
    }
    hunks
        .into_iter()
        .map(|hunk| AnchorTarget {
            file_path: hunk.file_path.clone(),
            line: Some(hunk.new_start),
            hunk_id: Some(hunk.id.clone()),
        })
        .collect()
}

/// Which step of the lookup chain produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    ScopedLineMarker,
    ScopedLineAnchor,
    GlobalLineMarker,
    GlobalLineAnchor,
    FileContainer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub node: NodeId,
    pub strategy: MatchStrategy,
}

/// Finds the node for `file_path` at `line`.
///
/// Tries, in order: a new-side line marker inside the file container, a line
/// anchor id ending in `R<line>` inside the container, the same two lookups
/// across the whole document, and finally the file container itself.
pub fn locate<D: Document + ?Sized>(doc: &D, file_path: &str, line: Option<u32>) -> Option<Located> {
    let container = locate_file_container(doc, file_path);

    if let Some(line) = line {
        let line_text = line.to_string();
        let anchor_suffix = format!("R{line}");
        let mut scopes = Vec::with_capacity(2);
        if let Some(container) = container {
            scopes.push((
                container,
                MatchStrategy::ScopedLineMarker,
                MatchStrategy::ScopedLineAnchor,
            ));
        }
        scopes.push((
            doc.root(),
            MatchStrategy::GlobalLineMarker,
            MatchStrategy::GlobalLineAnchor,
        ));

        for (scope, marker_strategy, anchor_strategy) in scopes {
            if let Some(node) = line_marker(doc, scope, &line_text) {
                return Some(Located {
                    node,
                    strategy: marker_strategy,
                });
            }
            if let Some(node) = doc.query_first(scope, &Query::IdSuffix(&anchor_suffix)) {
                return Some(Located {
                    node,
                    strategy: anchor_strategy,
                });
            }
        }
    }

    container.map(|node| Located {
        node,
        strategy: MatchStrategy::FileContainer,
    })
}

fn line_marker<D: Document + ?Sized>(doc: &D, scope: NodeId, line: &str) -> Option<NodeId> {
    doc.query_all(scope, &Query::AttrEq(LINE_NUMBER_ATTR, line))
        .into_iter()
        .find(|&node| doc.attribute(node, LINE_SIDE_ATTR) != Some(OLD_SIDE))
}

/// Finds the block rendering `file_path`: an exact `data-path` match first,
/// then any block whose path matches on a `/` boundary in either direction.
pub fn locate_file_container<D: Document + ?Sized>(doc: &D, file_path: &str) -> Option<NodeId> {
    let root = doc.root();
    if let Some(node) = doc.query_first(root, &Query::AttrEq(FILE_PATH_ATTR, file_path)) {
        return Some(node);
    }
    doc.query_all(root, &Query::HasAttr(FILE_PATH_ATTR))
        .into_iter()
        .find(|&node| {
            doc.attribute(node, FILE_PATH_ATTR)
                .is_some_and(|path| paths_match(path, file_path))
        })
}

/// Path equality, or one path being a `/`-aligned suffix of the other.
pub fn paths_match(a: &str, b: &str) -> bool {
    let a = a.trim_start_matches("./");
    let b = b.trim_start_matches("./");
    a == b || is_path_suffix(a, b) || is_path_suffix(b, a)
}

fn is_path_suffix(long: &str, short: &str) -> bool {
    !short.is_empty()
        && long.len() > short.len()
        && long.ends_with(short)
        && long[..long.len() - short.len()].ends_with('/')
}
