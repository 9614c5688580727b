use std::path::Path;

use rusqlite::Connection;

use super::DatabaseError;

/// Latest schema version. `run_migrations` brings any older store up to this.
pub const SCHEMA_VERSION: i64 = 5;

/// Open a SQLite connection to the given path and run migrations
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing)
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "PRAGMA journal_mode=DELETE;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

/// Run all pending migrations, strictly in version order.
///
/// Each step is idempotent (`IF NOT EXISTS` / `INSERT OR IGNORE`), so a
/// partially-applied step can be re-run after a failure. There is no DDL
/// rollback: the contract is at-least-once idempotent retry. A failing
/// step aborts the open with `MigrationFailed`.
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_current_version(conn);

    for version in (current_version + 1)..=SCHEMA_VERSION {
        tracing::info!(version, "running migration");
        apply_step(conn, version)?;
    }

    Ok(())
}

/// Apply a single migration step. Safe to re-run on a store already at or
/// past this version.
pub fn apply_step(conn: &Connection, version: i64) -> Result<(), DatabaseError> {
    let sql = match version {
        1 => include_str!("../../resources/migrations/001_initial.sql"),
        2 => include_str!("../../resources/migrations/002_indexes.sql"),
        3 => include_str!("../../resources/migrations/003_composite_indexes.sql"),
        4 => include_str!("../../resources/migrations/004_audit_rbac.sql"),
        5 => include_str!("../../resources/migrations/005_consents_care_plans.sql"),
        _ => {
            return Err(DatabaseError::MigrationFailed {
                version,
                reason: "unknown migration version".into(),
            })
        }
    };

    conn.execute_batch(sql)
        .map_err(|e| DatabaseError::MigrationFailed {
            version,
            reason: e.to_string(),
        })?;

    // v3 also carries the optional FTS5 virtual tables. Applied tolerantly:
    // an engine built without fts5 still migrates, and text search falls
    // back to substring matching.
    if version == 3 {
        let fts_sql = include_str!("../../resources/migrations/003_fts.sql");
        if let Err(e) = conn.execute_batch(fts_sql) {
            tracing::warn!(error = %e, "full-text index unavailable, search will use LIKE fallback");
        }
    }

    Ok(())
}

/// Get the current schema version (0 if no schema exists yet)
pub fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get::<_, i64>(0),
    )
    .unwrap_or(0)
}

/// Whether the FTS5 virtual tables were created for this store.
pub fn fts_available(conn: &Connection) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='patients_fts'",
        [],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n > 0)
    .unwrap_or(false)
}

/// Count tables in the database (for verification)
pub fn count_tables(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_initializes_all_tables() {
        let conn = open_memory_database().unwrap();
        // 12 v1 tables + schema_version + 5 v4 tables + 2 v5 tables = 19,
        // plus fts shadow tables when fts5 is compiled in.
        let count = count_tables(&conn).unwrap();
        assert!(count >= 19, "Expected at least 19 tables, got {count}");
    }

    #[test]
    fn schema_version_is_current() {
        let conn = open_memory_database().unwrap();
        assert_eq!(get_current_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn migrations_idempotent() {
        let conn = open_memory_database().unwrap();
        // Run migrations again — should not error
        let result = run_migrations(&conn);
        assert!(result.is_ok());
    }

    #[test]
    fn migration_step_rerun_is_noop() {
        let conn = open_memory_database().unwrap();
        let tables_before = count_tables(&conn).unwrap();
        let indexes_before: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index'",
                [],
                |row| row.get(0),
            )
            .unwrap();

        for version in 1..=SCHEMA_VERSION {
            apply_step(&conn, version).unwrap();
        }

        assert_eq!(count_tables(&conn).unwrap(), tables_before);
        let indexes_after: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(indexes_after, indexes_before);
        assert_eq!(get_current_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn unknown_migration_version_fails() {
        let conn = open_memory_database().unwrap();
        let result = apply_step(&conn, SCHEMA_VERSION + 1);
        assert!(matches!(
            result,
            Err(DatabaseError::MigrationFailed { .. })
        ));
    }

    #[test]
    fn foreign_keys_enabled() {
        let conn = open_memory_database().unwrap();
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn rbac_roles_seeded() {
        let conn = open_memory_database().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM roles", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn database_opens_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carebridge.db");
        let conn = open_database(&path).unwrap();
        assert_eq!(get_current_version(&conn), SCHEMA_VERSION);

        // Re-open — should be idempotent
        let conn2 = open_database(&path).unwrap();
        assert_eq!(get_current_version(&conn2), SCHEMA_VERSION);
    }

    #[test]
    fn upgrade_runs_every_intermediate_step() {
        // A store stopped at v2 must pass through v3 and v4 to reach v5.
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        apply_step(&conn, 1).unwrap();
        apply_step(&conn, 2).unwrap();
        assert_eq!(get_current_version(&conn), 2);

        run_migrations(&conn).unwrap();
        assert_eq!(get_current_version(&conn), SCHEMA_VERSION);

        // v4 and v5 tables exist
        for table in ["audit_log", "feature_flags", "consents", "care_plans"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }
}
