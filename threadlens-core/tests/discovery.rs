mod common;

use pretty_assertions::assert_eq;

use threadlens_core::discovery::{
    attach, ensure_panel, find_primary_region, find_sidebar_region, init_panel, AttachOutcome,
    MountState, MountWatcher, LAYOUT_ATTR, PANEL_ATTR, PANEL_HOLDER_ATTR,
};
use threadlens_core::document::{Document, DocumentMut, Query, Size};
use threadlens_core::memdoc::MemoryDocument;

fn count(doc: &MemoryDocument, attr: &str) -> usize {
    doc.query_all(doc.root(), &Query::HasAttr(attr)).len()
}

#[test]
fn primary_region_is_the_common_ancestor_of_file_blocks() {
    let page = common::review_page();
    assert_eq!(find_primary_region(&page.doc), Some(page.diff_root));
}

#[test]
fn known_primary_location_takes_precedence() {
    let mut page = common::review_page();
    let known = page.doc.create_element("div", &[("id", "files")]);
    page.doc.append_child(page.page, known);

    assert_eq!(find_primary_region(&page.doc), Some(known));
}

#[test]
fn table_wrappers_are_skipped_when_lifting_the_region() {
    let mut doc = MemoryDocument::new(Size::new(800.0, 600.0));
    let root = doc.root();
    let wrap = doc.element(root, "section", &[]);
    let table = doc.element(wrap, "table", &[]);
    let tbody = doc.element(table, "tbody", &[]);
    let row = doc.element(tbody, "tr", &[]);
    doc.element(row, "td", &[("data-path", "a.rs")]);
    doc.element(row, "td", &[("data-path", "b.rs")]);

    assert_eq!(find_primary_region(&doc), Some(wrap));
}

#[test]
fn line_rows_are_the_second_fallback() {
    let mut doc = MemoryDocument::new(Size::new(800.0, 600.0));
    let root = doc.root();
    let region = doc.element(root, "div", &[]);
    doc.element(region, "div", &[("data-line-number", "1")]);
    doc.element(region, "div", &[("data-line-number", "2")]);

    assert_eq!(find_primary_region(&doc), Some(region));
}

#[test]
fn a_region_spanning_the_whole_document_is_rejected() {
    let mut doc = MemoryDocument::new(Size::new(800.0, 600.0));
    let root = doc.root();
    doc.element(root, "div", &[("data-path", "a.rs")]);
    doc.element(root, "div", &[("data-path", "b.rs")]);

    assert_eq!(find_primary_region(&doc), None);
}

#[test]
fn sidebar_is_found_from_its_filter_input() {
    let page = common::review_page();
    assert_eq!(find_sidebar_region(&page.doc), Some(page.sidebar));
}

#[test]
fn attach_builds_a_two_column_layout_once() {
    let mut page = common::review_page();
    let panel = ensure_panel(&mut page.doc);

    assert_eq!(attach(&mut page.doc, panel), Some(AttachOutcome::TwoColumn));
    assert_eq!(attach(&mut page.doc, panel), Some(AttachOutcome::Reused));

    assert_eq!(count(&page.doc, LAYOUT_ATTR), 1);
    assert_eq!(count(&page.doc, PANEL_ATTR), 1);
    let layout = page
        .doc
        .query_first(page.doc.root(), &Query::HasAttr(LAYOUT_ATTR))
        .unwrap();
    assert_eq!(page.doc.children(layout), vec![panel, page.sidebar, page.diff_root]);
    assert_eq!(page.doc.parent(layout), Some(page.page));
}

#[test]
fn primary_region_is_wrapped_when_there_is_no_sidebar() {
    let mut page = common::review_page();
    page.doc.detach(page.sidebar);
    let panel = ensure_panel(&mut page.doc);

    assert_eq!(attach(&mut page.doc, panel), Some(AttachOutcome::WrappedPrimary));
    assert_eq!(attach(&mut page.doc, panel), Some(AttachOutcome::Reused));

    let layout = page.doc.parent(page.diff_root).unwrap();
    assert!(page.doc.attribute(layout, LAYOUT_ATTR).is_some());
    assert_eq!(page.doc.children(layout), vec![panel, page.diff_root]);
    assert_eq!(count(&page.doc, LAYOUT_ATTR), 1);
}

#[test]
fn late_sidebar_is_pulled_into_the_existing_layout() {
    let mut page = common::review_page();
    page.doc.detach(page.sidebar);
    let panel = ensure_panel(&mut page.doc);
    attach(&mut page.doc, panel);

    page.doc.prepend_child(page.page, page.sidebar);
    assert_eq!(attach(&mut page.doc, panel), Some(AttachOutcome::TwoColumn));

    let layout = page.doc.parent(page.diff_root).unwrap();
    assert_eq!(page.doc.children(layout), vec![panel, page.sidebar, page.diff_root]);
    assert_eq!(count(&page.doc, LAYOUT_ATTR), 1);
}

#[test]
fn init_is_idempotent() {
    let mut page = common::review_page();

    let first = init_panel(&mut page.doc);
    let second = init_panel(&mut page.doc);

    assert_eq!(first.panel(), second.panel());
    assert_eq!(second.state(), MountState::Mounted(AttachOutcome::Reused));
    assert_eq!(count(&page.doc, LAYOUT_ATTR), 1);
    assert_eq!(count(&page.doc, PANEL_ATTR), 1);
}

#[test]
fn init_before_mount_is_idempotent() {
    let mut doc = MemoryDocument::new(Size::new(800.0, 600.0));
    let root = doc.root();

    let mut first = init_panel(&mut doc);
    let mut second = init_panel(&mut doc);
    assert_eq!(first.panel(), second.panel());
    assert_eq!(first.state(), MountState::Waiting);
    assert_eq!(second.state(), MountState::Waiting);
    assert_eq!(count(&doc, PANEL_ATTR), 1);
    assert_eq!(count(&doc, PANEL_HOLDER_ATTR), 1);

    let shell = doc.element(root, "main", &[]);
    let files = doc.element(shell, "div", &[("id", "files")]);
    doc.element(files, "div", &[("data-path", "a.rs")]);

    assert_eq!(
        first.poll(&mut doc),
        MountState::Mounted(AttachOutcome::WrappedPrimary)
    );
    assert_eq!(second.poll(&mut doc), MountState::Mounted(AttachOutcome::Reused));

    assert_eq!(count(&doc, PANEL_ATTR), 1);
    assert_eq!(count(&doc, LAYOUT_ATTR), 1);
    let layout = doc.parent(files).unwrap();
    assert_eq!(doc.children(layout), vec![first.panel(), files]);
    assert_eq!(doc.observer_count(), 0);
}

#[test]
fn mount_watcher_retries_on_changes_and_unsubscribes() {
    let mut doc = MemoryDocument::new(Size::new(800.0, 600.0));
    let root = doc.root();
    let panel = ensure_panel(&mut doc);

    let mut watcher = MountWatcher::start(&mut doc, panel);
    assert_eq!(watcher.state(), MountState::Waiting);
    assert!(watcher.is_watching());
    assert_eq!(doc.observer_count(), 1);

    // Nothing changed: no retry.
    assert_eq!(watcher.poll(&mut doc), MountState::Waiting);

    // An unrelated change is not enough.
    let shell = doc.element(root, "main", &[]);
    assert_eq!(watcher.poll(&mut doc), MountState::Waiting);
    assert!(watcher.is_watching());

    let files = doc.element(shell, "div", &[("id", "files")]);
    doc.element(files, "div", &[("data-path", "a.rs")]);
    assert_eq!(
        watcher.poll(&mut doc),
        MountState::Mounted(AttachOutcome::WrappedPrimary)
    );
    assert!(!watcher.is_watching());
    assert_eq!(doc.observer_count(), 0);

    // Later changes are ignored once mounted.
    doc.element(files, "div", &[("data-path", "b.rs")]);
    assert_eq!(
        watcher.poll(&mut doc),
        MountState::Mounted(AttachOutcome::WrappedPrimary)
    );
}
