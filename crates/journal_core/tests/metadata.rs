use journal_core::db::open_db_in_memory;
use journal_core::Journal;
use rusqlite::Connection;

#[test]
fn last_write_wins_per_key() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();
    let id = journal.create_block("task", "task", None).unwrap();

    assert!(journal.set_metadata(&id, "status", "open").unwrap());
    assert!(journal.set_metadata(&id, "status", "done").unwrap());
    assert!(journal.set_metadata(&id, "owner", "sam").unwrap());

    assert_eq!(
        journal.get_metadata(&id, "status").unwrap().as_deref(),
        Some("done")
    );
    let all = journal.list_metadata(&id).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all.keys().collect::<Vec<_>>(), vec!["owner", "status"]);
}

#[test]
fn metadata_on_missing_block_is_refused() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();

    assert!(!journal.set_metadata("ghost", "k", "v").unwrap());
    assert!(journal.get_metadata("ghost", "k").unwrap().is_none());
}

#[test]
fn delete_metadata_removes_one_key() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();
    let id = journal.create_block("x", "note", None).unwrap();
    journal.set_metadata(&id, "a", "1").unwrap();
    journal.set_metadata(&id, "b", "2").unwrap();

    assert!(journal.delete_metadata(&id, "a").unwrap());
    assert!(!journal.delete_metadata(&id, "a").unwrap());
    assert_eq!(journal.list_metadata(&id).unwrap().len(), 1);
}

#[test]
fn metadata_is_removed_with_its_block() {
    let conn = open_db_in_memory().unwrap();
    let journal = Journal::try_new(&conn).unwrap();
    let id = journal.create_block("x", "note", None).unwrap();
    journal.set_metadata(&id, "k", "v").unwrap();

    assert!(journal.delete_block(&id).unwrap());

    assert_eq!(metadata_rows(&conn), 0);
}

fn metadata_rows(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM metadata;", [], |row| row.get(0))
        .unwrap()
}
