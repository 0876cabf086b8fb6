//! Database core: connection pool, PRAGMA setup, vector-extension loading,
//! and migration bootstrapping.
//!
//! `rusqlite::Connection` is not `Sync`, so every long-lived holder of the
//! database goes through an `r2d2` pool rather than sharing one connection
//! across threads.

pub mod migrations;
pub mod pragmas;
pub mod schema;

use crate::error::{DbError, DbResult};
use chrono::Utc;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use tracing::warn;

pub type Pool = r2d2::Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

static VEC_EXTENSION_REGISTERED: Once = Once::new();

/// Registers the `sqlite-vec` extension as an auto-extension for every
/// connection opened in this process from this point on. Safe to call more
/// than once; only the first call takes effect.
fn register_vector_extension() {
    VEC_EXTENSION_REGISTERED.call_once(|| {
        // SAFETY: `sqlite3_vec_init` matches the `sqlite3_auto_extension`
        // entry point signature required by SQLite's C API.
        unsafe {
            let init_fn: rusqlite::ffi::sqlite3_loadable_extension_entry =
                std::mem::transmute(sqlite_vec::sqlite3_vec_init as *const ());
            let rc = rusqlite::ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != rusqlite::ffi::SQLITE_OK {
                warn!(code = rc, "failed to register sqlite-vec auto-extension");
            }
        }
    });
}

/// Probes whether `vec0` virtual tables actually work on this connection.
/// Registration can succeed while the extension itself is unusable on a
/// given platform/build, so this is a real functional check, not just
/// "did `sqlite3_auto_extension` return OK".
fn probe_vector_support(conn: &Connection) -> bool {
    conn.execute_batch(
        "CREATE VIRTUAL TABLE temp.__vec_probe USING vec0(embedding float[384]);
         DROP TABLE temp.__vec_probe;",
    )
    .is_ok()
}

/// Returns the current time as an RFC 3339 string, the timestamp format
/// used for every stored `_at` column.
#[must_use]
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339()
}

/// The database core. Cheap to clone (it's a pool handle); expensive to
/// open (runs migrations).
pub struct Database {
    pool: Pool,
    has_vector_support: AtomicBool,
}

impl Database {
    /// Opens (creating if absent) a database file on disk, applies
    /// PRAGMAs, attempts to load the vector extension, and runs pending
    /// migrations.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the file cannot be opened or a migration
    /// fails.
    pub fn open(path: &Path) -> DbResult<Self> {
        register_vector_extension();

        let manager = SqliteConnectionManager::file(path);
        let pool = r2d2::Pool::builder().max_size(8).build(manager)?;
        Self::from_pool(pool)
    }

    /// Opens an in-memory database, for tests and benchmarks. Because WAL
    /// mode has no effect on `:memory:` databases, a single-connection
    /// pool is used so all callers see the same in-memory instance.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if schema migration fails.
    pub fn in_memory() -> DbResult<Self> {
        register_vector_extension();

        let manager = SqliteConnectionManager::memory();
        let pool = r2d2::Pool::builder().max_size(1).build(manager)?;
        Self::from_pool(pool)
    }

    fn from_pool(pool: Pool) -> DbResult<Self> {
        let conn = pool.get()?;
        pragmas::apply_pragmas(&conn)?;
        let has_vector_support = probe_vector_support(&conn);
        migrations::run(&conn, has_vector_support)?;
        drop(conn);

        Ok(Self {
            pool,
            has_vector_support: AtomicBool::new(has_vector_support),
        })
    }

    /// Borrows a pooled connection.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if the pool is exhausted or a connection
    /// cannot be established.
    pub fn conn(&self) -> DbResult<PooledConnection> {
        let conn = self.pool.get()?;
        pragmas::apply_pragmas(&conn)?;
        Ok(conn)
    }

    /// Whether vector search is available on this process's connections.
    #[must_use]
    pub fn has_vector_support(&self) -> bool {
        self.has_vector_support.load(Ordering::Relaxed)
    }

    /// Best-effort passive WAL checkpoint. Never fails the caller -- a
    /// checkpoint failure on close must not prevent shutdown.
    pub fn checkpoint(&self) {
        if let Ok(conn) = self.conn() {
            if let Err(e) = conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);") {
                warn!(error = %e, "WAL checkpoint failed on close");
            }
        }
    }
}

impl From<r2d2::Error> for DbError {
    fn from(e: r2d2::Error) -> Self {
        DbError::Pool(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_reopen_file_database_preserves_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("laminark.db");

        {
            let db = Database::open(&path).unwrap();
            let conn = db.conn().unwrap();
            conn.execute(
                "INSERT INTO observations
                    (public_id, project_fingerprint, session_id, source, title, content, kind, created_at, updated_at)
                 VALUES ('o1', 'fp1', NULL, 'hook:Write', NULL, 'hello', 'change', ?1, ?1)",
                rusqlite::params![now_iso8601()],
            )
            .unwrap();
            db.checkpoint();
        }

        let db = Database::open(&path).unwrap();
        let conn = db.conn().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_fts_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("laminark.db");

        {
            let db = Database::open(&path).unwrap();
            let conn = db.conn().unwrap();
            conn.execute(
                "INSERT INTO observations
                    (public_id, project_fingerprint, session_id, source, title, content, kind, created_at, updated_at)
                 VALUES ('o1', 'fp1', NULL, 'hook:Write', NULL, 'Implement JWT refresh', 'change', ?1, ?1)",
                rusqlite::params![now_iso8601()],
            )
            .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let conn = db.conn().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM observations_fts WHERE observations_fts MATCH 'JWT'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
