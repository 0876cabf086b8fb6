//! `SQLite` PRAGMA configuration.
//!
//! Order matters: `journal_mode` must be set before `busy_timeout` so that
//! the WAL's own lock semantics are in place before callers start relying
//! on the busy handler to wait out writer contention.

use crate::error::DbResult;
use rusqlite::Connection;

/// Applies the fixed PRAGMA sequence for a new connection.
///
/// # Errors
///
/// Returns `DbError::Sqlite` if any PRAGMA statement fails.
pub fn apply_pragmas(conn: &Connection) -> DbResult<()> {
    conn.prepare("PRAGMA journal_mode = WAL")?.query([])?.next()?;
    conn.prepare("PRAGMA busy_timeout = 5000")?.query([])?.next()?;
    conn.prepare("PRAGMA synchronous = NORMAL")?.query([])?.next()?;
    conn.prepare("PRAGMA cache_size = -8000")?.query([])?.next()?;
    conn.prepare("PRAGMA foreign_keys = ON")?.query([])?.next()?;
    conn.prepare("PRAGMA temp_store = MEMORY")?.query([])?.next()?;
    conn.prepare("PRAGMA wal_autocheckpoint = 1000")?.query([])?.next()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pragmas_apply() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn).unwrap();

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        // In-memory databases use "memory" journal mode instead of WAL.
        assert!(journal_mode.to_lowercase() == "wal" || journal_mode.to_lowercase() == "memory");

        let foreign_keys: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);
    }
}
