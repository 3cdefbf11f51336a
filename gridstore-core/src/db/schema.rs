//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.
//! Three relations: stored files, filter predicates, and the junction table
//! pinning a filter to a (file, sheet, column) coordinate.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: files, filters, and the coordinate junction table
    r#"
    CREATE TABLE IF NOT EXISTS files (
        id       INTEGER PRIMARY KEY AUTOINCREMENT,
        name     TEXT NOT NULL,
        ext      TEXT NOT NULL DEFAULT '',
        content  BLOB NOT NULL
    );

    CREATE TABLE IF NOT EXISTS filters (
        id       INTEGER PRIMARY KEY AUTOINCREMENT,
        -- method is free text here; the filter engine validates it at apply time
        method   TEXT NOT NULL,
        input    TEXT NOT NULL,
        enabled  INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS file_filters (
        file_id   INTEGER NOT NULL REFERENCES files(id),
        filter_id INTEGER NOT NULL REFERENCES filters(id),
        sheet     INTEGER NOT NULL,
        -- "column" is an SQL keyword, hence col
        col       INTEGER NOT NULL,

        UNIQUE(file_id, filter_id)
    );

    CREATE INDEX IF NOT EXISTS idx_file_filters_coordinate
        ON file_filters(file_id, sheet, col);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Run migrations twice - should be idempotent
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables = ["files", "filters", "file_filters"];

        for table in tables {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_foreign_keys() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        run_migrations(&conn).unwrap();

        let fk_list: Vec<(String, String)> = conn
            .prepare("PRAGMA foreign_key_list(file_filters)")
            .unwrap()
            .query_map([], |row| {
                Ok((row.get::<_, String>(2)?, row.get::<_, String>(3)?))
            })
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(
            fk_list.iter().any(|(table, _)| table == "files"),
            "file_filters should reference files"
        );
        assert!(
            fk_list.iter().any(|(table, _)| table == "filters"),
            "file_filters should reference filters"
        );
    }

    #[test]
    fn test_relation_uniqueness_key() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO files (name, ext, content) VALUES ('a', '.csv', x'00')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO filters (method, input, enabled) VALUES ('exact', 'x', 1)",
            [],
        )
        .unwrap();

        conn.execute(
            "INSERT INTO file_filters (file_id, filter_id, sheet, col) VALUES (1, 1, 0, 0)",
            [],
        )
        .unwrap();

        // Same (file_id, filter_id) at a different coordinate is rejected by
        // the uniqueness key, even though the coordinate differs
        let dup = conn.execute(
            "INSERT INTO file_filters (file_id, filter_id, sheet, col) VALUES (1, 1, 2, 3)",
            [],
        );
        assert!(dup.is_err());
    }
}
