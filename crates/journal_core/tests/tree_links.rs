use journal_core::db::open_db_in_memory;
use journal_core::{Block, Journal};
use rusqlite::Connection;

fn ids(blocks: &[Block]) -> Vec<&str> {
    blocks.iter().map(|block| block.id.as_str()).collect()
}

fn chain(journal: &Journal<'_>, names: &[&str]) {
    for &name in names {
        journal.create_block(name, "note", Some(name)).unwrap();
    }
    for pair in names.windows(2) {
        assert!(journal.link_blocks(pair[0], pair[1]).unwrap());
    }
}

fn link_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM links;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn direct_cycle_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();
    chain(&journal, &["a", "b"]);

    assert!(!journal.link_blocks("b", "a").unwrap());
    assert_eq!(link_count(&conn), 1);
}

#[test]
fn transitive_cycle_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();
    chain(&journal, &["a", "b", "c"]);

    assert!(!journal.link_blocks("c", "a").unwrap());
    assert_eq!(link_count(&conn), 2);
}

#[test]
fn relinking_existing_pair_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();
    chain(&journal, &["a", "b"]);

    assert!(journal.link_blocks("a", "b").unwrap());
    assert_eq!(link_count(&conn), 1);
}

#[test]
fn linking_missing_block_returns_false() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();
    journal.create_block("a", "note", Some("a")).unwrap();

    assert!(!journal.link_blocks("a", "ghost").unwrap());
    assert!(!journal.link_blocks("ghost", "a").unwrap());
    assert_eq!(link_count(&conn), 0);
}

#[test]
fn unlink_removes_only_that_edge() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();
    chain(&journal, &["a", "b", "c"]);

    assert!(journal.unlink_blocks("a", "b").unwrap());
    assert!(!journal.unlink_blocks("a", "b").unwrap());
    assert!(journal.get_parent("b").unwrap().is_none());
    assert_eq!(ids(&journal.get_children("b").unwrap()), vec!["c"]);
}

#[test]
fn ancestors_are_ordered_root_first() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();
    chain(&journal, &["root", "p", "c", "g"]);

    assert_eq!(ids(&journal.get_ancestors("g").unwrap()), vec!["root", "p", "c"]);
    assert!(journal.get_ancestors("root").unwrap().is_empty());
}

#[test]
fn deleting_parent_empties_children_but_keeps_child_blocks() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();
    chain(&journal, &["parent", "child"]);

    assert!(journal.delete_block("parent").unwrap());

    assert!(journal.get_block("parent").unwrap().is_none());
    assert!(journal.get_children("parent").unwrap().is_empty());
    assert!(journal.get_block("child").unwrap().is_some());
    assert_eq!(link_count(&conn), 0);
}

#[test]
fn move_block_reparents() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();
    chain(&journal, &["old", "x"]);
    journal.create_block("new", "note", Some("new")).unwrap();

    assert!(journal.move_block("x", "new").unwrap());

    assert!(journal.get_children("old").unwrap().is_empty());
    assert_eq!(ids(&journal.get_children("new").unwrap()), vec!["x"]);
    assert_eq!(journal.get_parent("x").unwrap().unwrap().id, "new");
}

#[test]
fn moving_under_own_descendant_fails_and_changes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();
    chain(&journal, &["top", "x", "mid", "leaf"]);

    assert!(!journal.move_block("x", "leaf").unwrap());

    assert_eq!(journal.get_parent("x").unwrap().unwrap().id, "top");
    assert!(journal.get_children("leaf").unwrap().is_empty());
    assert_eq!(link_count(&conn), 3);
}

#[test]
fn moving_to_missing_parent_fails() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();
    chain(&journal, &["old", "x"]);

    assert!(!journal.move_block("x", "ghost").unwrap());
    assert_eq!(journal.get_parent("x").unwrap().unwrap().id, "old");
}

#[test]
fn siblings_are_the_parents_other_children() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();
    let parent = journal.create_block("Parent", "note", None).unwrap();
    let child1 = journal
        .create_child_block(&parent, "Child1", "note", None)
        .unwrap()
        .unwrap();
    let child2 = journal
        .create_child_block(&parent, "Child2", "note", None)
        .unwrap()
        .unwrap();

    assert_eq!(ids(&journal.get_siblings(&child1).unwrap()), vec![child2.as_str()]);
    assert_eq!(journal.get_children(&parent).unwrap().len(), 2);
    assert!(journal.get_siblings(&parent).unwrap().is_empty());
}

#[test]
fn create_child_block_requires_existing_parent() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();

    assert!(journal
        .create_child_block("ghost", "orphan", "note", None)
        .unwrap()
        .is_none());
    assert!(journal.list_blocks(&Default::default()).unwrap().is_empty());
}

#[test]
fn create_sibling_block_shares_parent() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();
    chain(&journal, &["parent", "first"]);

    let second = journal
        .create_sibling_block("first", "second", "note", Some("second"))
        .unwrap()
        .unwrap();

    assert_eq!(second, "second");
    assert_eq!(ids(&journal.get_children("parent").unwrap()), vec!["first", "second"]);
}

#[test]
fn create_sibling_of_parentless_block_returns_none() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();
    journal.create_block("alone", "note", Some("alone")).unwrap();

    assert!(journal
        .create_sibling_block("alone", "x", "note", None)
        .unwrap()
        .is_none());
    assert_eq!(journal.list_blocks(&Default::default()).unwrap().len(), 1);
}

#[test]
fn children_keep_link_order() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();
    journal.create_block("root", "note", Some("root")).unwrap();
    let expected: Vec<String> = (0..5)
        .map(|i| {
            journal
                .create_child_block("root", &format!("child {i}"), "note", None)
                .unwrap()
                .unwrap()
        })
        .collect();

    let children = journal.get_children("root").unwrap();
    let actual: Vec<String> = children.into_iter().map(|block| block.id).collect();
    assert_eq!(actual, expected);
}
