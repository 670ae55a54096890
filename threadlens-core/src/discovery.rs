//! Finds the diff and file-list regions of the review document and mounts the
//! conversation panel next to them.
//!
//! The resulting layout node always has the children
//! `[panel, sidebar branch, primary branch]` (or `[panel, primary]` when no
//! sidebar was found). Every operation here is idempotent: running it against
//! an already-mounted document leaves exactly one layout and one panel.

use crate::anchor::{FILE_PATH_ATTR, LINE_NUMBER_ATTR};
use crate::document::{Document, DocumentMut, MutationSubscription, NodeId, Query};

/// Marks the layout node created by [`attach`].
pub const LAYOUT_ATTR: &str = "data-threadlens-layout";
/// Marks the conversation panel.
pub const PANEL_ATTR: &str = "data-threadlens-panel";
/// Explicit file-filter input marker.
pub const FILE_FILTER_ATTR: &str = "data-file-filter";
/// Marks the hidden node that keeps an unmounted panel on the document.
pub const PANEL_HOLDER_ATTR: &str = "data-threadlens-pending";

const KNOWN_PRIMARY_LOCATIONS: [Query<'static>; 3] = [
    Query::Id("files"),
    Query::Class("js-diff-progressive-container"),
    Query::HasAttr("data-diff-root"),
];

const STRUCTURAL_WRAPPERS: [&str; 5] = ["table", "tbody", "thead", "tr", "td"];

/// Locates the region holding the rendered diff.
pub fn find_primary_region<D: Document + ?Sized>(doc: &D) -> Option<NodeId> {
    let root = doc.root();
    for query in &KNOWN_PRIMARY_LOCATIONS {
        if let Some(node) = doc.query_first(root, query) {
            return Some(node);
        }
    }
    common_region(doc, &Query::HasAttr(FILE_PATH_ATTR))
        .or_else(|| common_region(doc, &Query::HasAttr(LINE_NUMBER_ATTR)))
}

/// Common ancestor of at least two matches, lifted out of table structure.
/// The document root is not a usable region.
fn common_region<D: Document + ?Sized>(doc: &D, query: &Query<'_>) -> Option<NodeId> {
    let root = doc.root();
    let nodes = doc.query_all(root, query);
    if nodes.len() < 2 {
        return None;
    }
    let mut region = doc.common_ancestor(&nodes)?;
    while STRUCTURAL_WRAPPERS
        .iter()
        .any(|tag| doc.tag(region).eq_ignore_ascii_case(tag))
    {
        region = doc.parent(region)?;
    }
    (region != root).then_some(region)
}

/// Locates the changed-files sidebar by walking up from its filter input.
pub fn find_sidebar_region<D: Document + ?Sized>(doc: &D) -> Option<NodeId> {
    let root = doc.root();
    let input = doc
        .query_first(root, &Query::HasAttr(FILE_FILTER_ATTR))
        .or_else(|| doc.query_first(root, &Query::AttrContains("aria-label", "filter")))?;

    let has_file_entries = |node: NodeId| {
        doc.query_first(node, &Query::HasAttr(FILE_PATH_ATTR)).is_some()
            || doc.query_first(node, &Query::AttrPrefix("href", "#diff-")).is_some()
    };
    doc.closest_ancestor(input, &has_file_entries)
        .filter(|&node| node != root)
}

/// How [`attach`] mounted the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// A layout now holds the panel, the sidebar branch and the primary branch.
    TwoColumn,
    /// No usable sidebar; the layout wraps the primary region only.
    WrappedPrimary,
    /// An existing layout already held everything; only the panel position was checked.
    Reused,
}

/// Returns the existing panel, or creates one parked in a hidden holder
/// under the root. Until [`attach`] moves it into a layout, later calls
/// still find it there.
pub fn ensure_panel<D: DocumentMut + ?Sized>(doc: &mut D) -> NodeId {
    let root = doc.root();
    if let Some(panel) = doc.query_first(root, &Query::HasAttr(PANEL_ATTR)) {
        return panel;
    }
    let holder = match doc.query_first(root, &Query::HasAttr(PANEL_HOLDER_ATTR)) {
        Some(holder) => holder,
        None => {
            let holder = doc.create_element("template", &[(PANEL_HOLDER_ATTR, "")]);
            doc.append_child(root, holder);
            holder
        }
    };
    let panel = doc.create_element("aside", &[(PANEL_ATTR, "")]);
    doc.append_child(holder, panel);
    panel
}

/// Mounts `panel` beside the review content. `None` means the primary region
/// is not rendered yet and nothing was changed.
pub fn attach<D: DocumentMut + ?Sized>(doc: &mut D, panel: NodeId) -> Option<AttachOutcome> {
    let root = doc.root();
    let primary = find_primary_region(doc)?;
    let existing = doc.query_first(root, &Query::HasAttr(LAYOUT_ATTR));

    if let Some(layout) = existing {
        if doc.contains(layout, primary) && doc.contains(layout, panel) {
            let sidebar_settled = find_sidebar_region(doc)
                .is_none_or(|sidebar| doc.contains(layout, sidebar));
            if sidebar_settled {
                ensure_first_child(doc, layout, panel);
                return Some(AttachOutcome::Reused);
            }
        }
    }

    if let Some(sidebar) = find_sidebar_region(doc) {
        if let Some(split) = split_branches(doc, primary, sidebar) {
            let outcome = mount_two_column(doc, split, existing, panel);
            tracing::debug!(?outcome, "conversation panel mounted");
            return Some(outcome);
        }
    }

    if let Some(layout) = existing {
        ensure_first_child(doc, layout, panel);
        return Some(AttachOutcome::Reused);
    }

    let parent = doc.parent(primary)?;
    let layout = doc.create_element("div", &[(LAYOUT_ATTR, "")]);
    doc.insert_before(parent, layout, Some(primary));
    doc.append_child(layout, primary);
    doc.prepend_child(layout, panel);
    tracing::debug!("conversation panel mounted around primary region");
    Some(AttachOutcome::WrappedPrimary)
}

struct Split {
    common: NodeId,
    sidebar_branch: NodeId,
    primary_branch: NodeId,
}

/// Direct children of the primary/sidebar common ancestor leading to each.
fn split_branches<D: Document + ?Sized>(doc: &D, primary: NodeId, sidebar: NodeId) -> Option<Split> {
    let common = doc.common_ancestor(&[primary, sidebar])?;
    if common == doc.root() || common == primary || common == sidebar {
        return None;
    }
    let sidebar_branch = child_toward(doc, common, sidebar)?;
    let primary_branch = child_toward(doc, common, primary)?;
    (sidebar_branch != primary_branch).then_some(Split {
        common,
        sidebar_branch,
        primary_branch,
    })
}

fn child_toward<D: Document + ?Sized>(doc: &D, ancestor: NodeId, node: NodeId) -> Option<NodeId> {
    let mut current = node;
    loop {
        let parent = doc.parent(current)?;
        if parent == ancestor {
            return Some(current);
        }
        current = parent;
    }
}

fn mount_two_column<D: DocumentMut + ?Sized>(
    doc: &mut D,
    split: Split,
    existing: Option<NodeId>,
    panel: NodeId,
) -> AttachOutcome {
    let Split {
        common,
        sidebar_branch,
        primary_branch,
    } = split;

    if existing == Some(common) {
        ensure_first_child(doc, common, panel);
        return AttachOutcome::Reused;
    }

    let layout = match existing {
        Some(layout) if layout != primary_branch => {
            unwrap_layout(doc, layout, panel);
            layout
        }
        Some(layout) => layout,
        None => doc.create_element("div", &[(LAYOUT_ATTR, "")]),
    };
    doc.insert_before(common, layout, Some(sidebar_branch));
    if primary_branch == layout {
        // The layout already wraps the primary region; slot the sidebar in ahead of it.
        let first_content = doc.children(layout).into_iter().find(|&c| c != panel);
        doc.insert_before(layout, sidebar_branch, first_content);
    } else {
        doc.append_child(layout, sidebar_branch);
        doc.append_child(layout, primary_branch);
    }
    ensure_first_child(doc, layout, panel);
    AttachOutcome::TwoColumn
}

/// Moves every non-panel child of `layout` back to where the layout sits.
fn unwrap_layout<D: DocumentMut + ?Sized>(doc: &mut D, layout: NodeId, panel: NodeId) {
    let Some(parent) = doc.parent(layout) else {
        return;
    };
    for child in doc.children(layout) {
        if child != panel {
            doc.insert_before(parent, child, Some(layout));
        }
    }
}

fn ensure_first_child<D: DocumentMut + ?Sized>(doc: &mut D, layout: NodeId, panel: NodeId) {
    if doc.children(layout).first() != Some(&panel) {
        doc.prepend_child(layout, panel);
    }
}

/// Result of a mount attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    Mounted(AttachOutcome),
    Waiting,
}

/// Retries [`attach`] on structural changes until it succeeds once.
#[derive(Debug)]
pub struct MountWatcher {
    panel: NodeId,
    subscription: Option<MutationSubscription>,
    outcome: Option<AttachOutcome>,
}

impl MountWatcher {
    /// Attempts to mount immediately; subscribes to document changes if the
    /// review content is not there yet.
    pub fn start<D: DocumentMut + ?Sized>(doc: &mut D, panel: NodeId) -> Self {
        let mut watcher = Self {
            panel,
            subscription: None,
            outcome: attach(doc, panel),
        };
        if watcher.outcome.is_none() {
            tracing::debug!("review content not rendered yet, watching for changes");
            watcher.subscription = Some(doc.observe());
        }
        watcher
    }

    pub fn panel(&self) -> NodeId {
        self.panel
    }

    pub fn state(&self) -> MountState {
        self.outcome.map_or(MountState::Waiting, MountState::Mounted)
    }

    pub fn is_watching(&self) -> bool {
        self.subscription.is_some()
    }

    /// Drains pending change notifications and retries once if there were any.
    /// The subscription is cancelled on the first success.
    pub fn poll<D: DocumentMut + ?Sized>(&mut self, doc: &mut D) -> MountState {
        if self.outcome.is_some() {
            return self.state();
        }
        let Some(subscription) = self.subscription.as_mut() else {
            return MountState::Waiting;
        };
        let mut changed = false;
        while subscription.records.try_recv().is_ok() {
            changed = true;
        }
        if !changed {
            return MountState::Waiting;
        }

        if let Some(outcome) = attach(doc, self.panel) {
            self.outcome = Some(outcome);
            self.cancel(doc);
            tracing::info!(?outcome, "conversation panel mounted after document change");
        }
        self.state()
    }

    pub fn cancel<D: DocumentMut + ?Sized>(&mut self, doc: &mut D) {
        if let Some(subscription) = self.subscription.take() {
            doc.unobserve(subscription.id);
        }
    }
}

/// Idempotent entry point: finds or creates the panel and mounts it.
pub fn init_panel<D: DocumentMut + ?Sized>(doc: &mut D) -> MountWatcher {
    let panel = ensure_panel(doc);
    MountWatcher::start(doc, panel)
}
