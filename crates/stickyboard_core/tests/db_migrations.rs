use rusqlite::Connection;
use stickyboard_core::db::migrations::latest_version;
use stickyboard_core::db::{open_db, open_db_in_memory, DbError};
use stickyboard_core::repo::category_repo::SqliteCategoryRepository;
use stickyboard_core::repo::note_repo::SqliteNoteRepository;
use stickyboard_core::RepoError;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "categories");
    assert_table_exists(&conn, "notes");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.sqlite3");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "notes");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repositories_reject_unmigrated_connections() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteNoteRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
    assert!(SqliteCategoryRepository::try_new(&conn).is_err());
}

#[test]
fn foreign_keys_are_enforced_on_notes() {
    let conn = open_db_in_memory().unwrap();
    let result = conn.execute(
        "INSERT INTO notes (note_uuid, user_id, category_uuid, content, sort_order)
         VALUES ('n1', 'u1', 'missing-category', 'x', 0);",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn negative_sort_order_is_rejected_by_schema() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO categories (category_uuid, user_id, name, sort_order)
         VALUES ('c1', 'u1', 'To Do', 0);",
        [],
    )
    .unwrap();
    let result = conn.execute(
        "INSERT INTO notes (note_uuid, user_id, category_uuid, content, sort_order)
         VALUES ('n1', 'u1', 'c1', 'x', -1);",
        [],
    );
    assert!(result.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
