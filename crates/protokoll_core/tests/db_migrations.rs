use protokoll_core::db::migrations::{apply_migrations, latest_version, revert_migrations};
use protokoll_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "organizations");
    assert_table_exists(&conn, "users");
    assert_table_exists(&conn, "protocols");
    assert_table_exists(&conn, "additional_users");
    assert_table_exists(&conn, "protocol_templates");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("protokoll.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "organizations");
}

#[test]
fn reapplying_migrations_on_migrated_connection_is_a_no_op() {
    let mut conn = open_db_in_memory().unwrap();

    apply_migrations(&mut conn).unwrap();
    apply_migrations(&mut conn).unwrap();

    assert_eq!(schema_version(&conn), latest_version());
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
fn revert_to_zero_drops_tables_in_reverse_dependency_order() {
    let mut conn = open_db_in_memory().unwrap();

    revert_migrations(&mut conn, 0).unwrap();

    assert_eq!(schema_version(&conn), 0);
    for table in [
        "additional_users",
        "protocols",
        "users",
        "organizations",
        "protocol_templates",
    ] {
        assert_table_missing(&conn, table);
    }
}

#[test]
fn revert_one_step_then_reapply_restores_full_schema() {
    let mut conn = open_db_in_memory().unwrap();

    revert_migrations(&mut conn, 1).unwrap();
    assert_eq!(schema_version(&conn), 1);
    assert_table_missing(&conn, "protocol_templates");
    assert_table_exists(&conn, "protocols");

    apply_migrations(&mut conn).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "protocol_templates");
}

#[test]
fn revert_to_current_or_higher_version_is_a_no_op() {
    let mut conn = open_db_in_memory().unwrap();

    revert_migrations(&mut conn, latest_version()).unwrap();
    revert_migrations(&mut conn, latest_version() + 5).unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "organizations");
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn table_exists(conn: &Connection, table_name: &str) -> bool {
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
    exists == 1
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    assert!(table_exists(conn, table_name), "table {table_name} does not exist");
}

fn assert_table_missing(conn: &Connection, table_name: &str) {
    assert!(!table_exists(conn, table_name), "table {table_name} still exists");
}
