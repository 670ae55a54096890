mod common;

use pretty_assertions::assert_eq;

use threadlens_core::index::{build_indices, IndexedMapping};
use threadlens_core::types::{Edit, Mapping};

fn ids<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    items.into_iter().collect()
}

#[test]
fn build_indices_is_pure() {
    let mapping = common::sample_mapping();
    let snapshot = mapping.clone();

    let first = build_indices(&mapping);
    let second = build_indices(&mapping);

    assert_eq!(first, second);
    assert_eq!(mapping, snapshot);
}

#[test]
fn untimestamped_messages_sort_first_in_encounter_order() {
    let mapping = Mapping {
        messages: vec![
            common::message("1", None),
            common::message("2", Some("2025-01-01T00:00:00Z")),
            common::message("3", None),
        ],
        ..Mapping::default()
    };
    let indexed = IndexedMapping::new(mapping);

    let order = indexed.ordered_messages();
    assert_eq!(ids(order.iter().map(|m| m.id.as_str())), vec!["1", "3", "2"]);
}

#[test]
fn timestamps_compare_lexicographically() {
    let mapping = Mapping {
        messages: vec![
            common::message("late", Some("2025-02-01T09:00:00Z")),
            common::message("early", Some("2025-01-15T23:59:59Z")),
        ],
        ..Mapping::default()
    };
    let indexed = IndexedMapping::new(mapping);

    let order = indexed.ordered_messages();
    assert_eq!(ids(order.iter().map(|m| m.id.as_str())), vec!["early", "late"]);
}

#[test]
fn relational_lookups_follow_links() {
    let indexed = IndexedMapping::new(common::sample_mapping());

    let hunks = indexed.hunks_for_edit("e2");
    assert_eq!(ids(hunks.iter().map(|h| h.id.as_str())), vec!["h1", "h2"]);
    assert!(indexed.hunks_for_edit("e1").is_empty());

    let edits = indexed.edits_for_message("m2");
    assert_eq!(ids(edits.iter().map(|e| e.id.as_str())), vec!["e2"]);

    let messages = indexed.messages_for_hunk("h2");
    assert_eq!(ids(messages.iter().map(|m| m.id.as_str())), vec!["m2"]);
    assert!(indexed.messages_for_hunk("missing").is_empty());
}

#[test]
fn duplicates_and_dangling_references_are_tolerated() {
    let mut mapping = common::sample_mapping();
    mapping.messages.push(common::message("m1", Some("2030-01-01T00:00:00Z")));
    mapping.edit_hunks.push(common::link("e2", "h1"));
    mapping.edit_hunks.push(common::link("e1", "ghost"));
    mapping.edits.push(common::edit("e4", "m2", "src/lib.rs", Some(12)));
    mapping.edit_hunks.push(common::link("e4", "h1"));
    let indexed = IndexedMapping::new(mapping);

    // First occurrence of a duplicated id wins.
    assert_eq!(indexed.message("m1").and_then(|m| m.timestamp.clone()), None);
    // Duplicate links collapse; dangling hunk ids are skipped.
    assert_eq!(indexed.hunks_for_edit("e2").len(), 2);
    assert!(indexed.hunks_for_edit("e1").is_empty());
    // Two edits of the same message on one hunk list that message once.
    assert_eq!(
        ids(indexed.messages_for_hunk("h1").iter().map(|m| m.id.as_str())),
        vec!["m2"]
    );
}

#[test]
fn edits_fall_back_to_the_user_message() {
    let mut mapping = common::sample_mapping();
    mapping.messages.push(common::message("u1", None));
    mapping.edits.push(Edit {
        message_id: None,
        user_message_id: Some("u1".to_owned()),
        ..common::edit("e9", "unused", "src/lib.rs", Some(1))
    });
    let indexed = IndexedMapping::new(mapping);

    let edits = indexed.edits_for_message("u1");
    assert_eq!(ids(edits.iter().map(|e| e.id.as_str())), vec!["e9"]);
}
