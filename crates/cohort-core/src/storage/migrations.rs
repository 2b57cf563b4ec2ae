//! Database schema migrations for cohort.
//!
//! Migrations are versioned and applied automatically when opening the
//! database. The `schema_version` table tracks the current version.

use rusqlite::{Connection, Result as SqliteResult};

/// Apply all pending migrations to bring the database to the current
/// schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Create the schema_version table if it doesn't exist.
fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or(0)
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: Initial schema (baseline).
///
/// A no-op since the tables are created by StudyStore::migrate()
/// directly.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    set_schema_version(conn, 1)?;
    Ok(())
}

/// Migration v2: Add definition-order tracking to weekly schedules.
///
/// Adds a `position` column so that two weekly schedules resolving to
/// the identical instant break ties deterministically toward the first
/// declared definition. Existing rows default to 0 and fall back to
/// rowid order.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE weekly_schedules ADD COLUMN position INTEGER NOT NULL DEFAULT 0;",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE weekly_schedules (
                id          TEXT PRIMARY KEY,
                survey_id   TEXT NOT NULL,
                day_of_week INTEGER NOT NULL,
                hour        INTEGER NOT NULL,
                minute      INTEGER NOT NULL
            );",
        )
        .unwrap();
        conn
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = base_conn();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 2);
    }

    #[test]
    fn v2_adds_position_column() {
        let conn = base_conn();
        migrate(&conn).unwrap();
        conn.execute(
            "INSERT INTO weekly_schedules (id, survey_id, day_of_week, hour, minute, position)
             VALUES ('w1', 's1', 1, 9, 0, 3)",
            [],
        )
        .unwrap();
        let position: i64 = conn
            .query_row(
                "SELECT position FROM weekly_schedules WHERE id = 'w1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(position, 3);
    }
}
