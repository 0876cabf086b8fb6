//! Forward-only migration runner.
//!
//! Applied versions are recorded in `_migrations`. Reopening a fully
//! migrated database applies nothing. Migrations flagged
//! `requires_vector` are skipped (not recorded) when the vector extension
//! failed to load, so a later open on a host where the extension is
//! available retries them.

use crate::db::schema::MIGRATIONS;
use crate::error::DbResult;
use rusqlite::Connection;
use tracing::{debug, info, warn};

fn ensure_migrations_table(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );",
    )?;
    Ok(())
}

fn applied_versions(conn: &Connection) -> DbResult<Vec<u32>> {
    let mut stmt = conn.prepare("SELECT version FROM _migrations ORDER BY version")?;
    let versions = stmt
        .query_map([], |row| row.get::<_, u32>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(versions)
}

/// Runs every migration not yet applied, in version order.
///
/// Vector-dependent migrations are skipped (and left unrecorded) when
/// `vector_available` is false.
///
/// # Errors
///
/// Returns `DbError::Migration` if a migration's SQL batch fails.
pub fn run(conn: &Connection, vector_available: bool) -> DbResult<()> {
    ensure_migrations_table(conn)?;
    let applied = applied_versions(conn)?;

    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }
        if migration.requires_vector && !vector_available {
            debug!(
                version = migration.version,
                name = migration.name,
                "skipping vector-dependent migration, extension unavailable"
            );
            continue;
        }

        info!(version = migration.version, name = migration.name, "applying migration");
        let tx = conn.unchecked_transaction().map_err(crate::error::DbError::Sqlite)?;
        tx.execute_batch(migration.sql)
            .map_err(|e| crate::error::DbError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;
        tx.execute(
            "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                migration.version,
                migration.name,
                crate::db::now_iso8601()
            ],
        )
        .map_err(crate::error::DbError::Sqlite)?;
        tx.commit().map_err(crate::error::DbError::Sqlite)?;
    }

    if !vector_available {
        warn!("opening in degraded mode: vector extension unavailable, keyword-only search");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pragmas::apply_pragmas;

    #[test]
    fn test_fresh_database_migrates() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn).unwrap();
        run(&conn, false).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(Result::ok)
            .collect();

        assert!(tables.contains(&"observations".to_string()));
        assert!(tables.contains(&"tool_registry".to_string()));
        assert!(tables.contains(&"_migrations".to_string()));
        // Vector tables are NOT created without the extension.
        assert!(!tables.contains(&"vec_observations".to_string()));
    }

    #[test]
    fn test_vector_migration_skipped_then_retried() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn).unwrap();
        run(&conn, false).unwrap();

        let applied = applied_versions(&conn).unwrap();
        assert_eq!(applied, vec![1]);

        // A later open with vector support available retries the skipped step.
        run(&conn, true).unwrap();
        let applied = applied_versions(&conn).unwrap();
        assert_eq!(applied, vec![1, 2]);
    }

    #[test]
    fn test_migration_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn).unwrap();
        run(&conn, false).unwrap();
        let before = applied_versions(&conn).unwrap();
        run(&conn, false).unwrap();
        let after = applied_versions(&conn).unwrap();
        assert_eq!(before, after);
    }
}
