//! Session repository: a bounded host interaction.

use crate::db::{now_iso8601, Database};
use crate::error::DbResult;
use crate::repo::Session;
use crate::types::ProjectFingerprint;
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

pub struct SessionRepository {
    db: Arc<Database>,
    project_fingerprint: ProjectFingerprint,
}

impl SessionRepository {
    #[must_use]
    pub fn new(db: Arc<Database>, project_fingerprint: ProjectFingerprint) -> Self {
        Self { db, project_fingerprint }
    }

    /// Opens a new session. Idempotent on the same id: re-creating an
    /// existing, not-yet-ended session returns the existing row.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the insert fails.
    pub fn create(&self, id: &str) -> DbResult<Session> {
        let conn = self.db.conn()?;
        if let Some(existing) = self.get_by_id_conn(&conn, id)? {
            return Ok(existing);
        }
        conn.execute(
            "INSERT INTO sessions (id, project_fingerprint, started_at)
             VALUES (?1, ?2, ?3)",
            params![id, self.project_fingerprint.as_str(), now_iso8601()],
        )?;
        self.get_by_id_conn(&conn, id)?
            .ok_or_else(|| crate::error::DbError::RowNotFound(format!("session {id} vanished after insert")))
    }

    /// Ends a session at most once. Ending an already-ended session is a
    /// no-op that returns `false`.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the update fails.
    pub fn end(&self, id: &str, summary: Option<&str>) -> DbResult<bool> {
        let conn = self.db.conn()?;
        let changed = conn.execute(
            "UPDATE sessions SET ended_at = ?1, summary = ?2
             WHERE id = ?3 AND project_fingerprint = ?4 AND ended_at IS NULL",
            params![now_iso8601(), summary, id, self.project_fingerprint.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// # Errors
    ///
    /// Returns `DbError` if the query fails.
    pub fn get_by_id(&self, id: &str) -> DbResult<Option<Session>> {
        let conn = self.db.conn()?;
        self.get_by_id_conn(&conn, id)
    }

    fn get_by_id_conn(&self, conn: &rusqlite::Connection, id: &str) -> DbResult<Option<Session>> {
        conn.query_row(
            "SELECT id, project_fingerprint, started_at, ended_at, summary
             FROM sessions WHERE id = ?1 AND project_fingerprint = ?2",
            params![id, self.project_fingerprint.as_str()],
            row_to_session,
        )
        .optional()
        .map_err(crate::error::DbError::Sqlite)
    }

    /// Most recent session by `started_at DESC, rowid DESC`.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the query fails.
    pub fn get_latest(&self) -> DbResult<Option<Session>> {
        let conn = self.db.conn()?;
        conn.query_row(
            "SELECT id, project_fingerprint, started_at, ended_at, summary
             FROM sessions WHERE project_fingerprint = ?1
             ORDER BY started_at DESC, rowid DESC LIMIT 1",
            params![self.project_fingerprint.as_str()],
            row_to_session,
        )
        .optional()
        .map_err(crate::error::DbError::Sqlite)
    }

    /// The currently open (not-yet-ended) session, if any.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the query fails.
    pub fn get_active(&self) -> DbResult<Option<Session>> {
        let conn = self.db.conn()?;
        conn.query_row(
            "SELECT id, project_fingerprint, started_at, ended_at, summary
             FROM sessions WHERE project_fingerprint = ?1 AND ended_at IS NULL
             ORDER BY started_at DESC, rowid DESC LIMIT 1",
            params![self.project_fingerprint.as_str()],
            row_to_session,
        )
        .optional()
        .map_err(crate::error::DbError::Sqlite)
    }
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        project_fingerprint: row.get(1)?,
        started_at: row.get(2)?,
        ended_at: row.get(3)?,
        summary: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> SessionRepository {
        let db = Arc::new(Database::in_memory().unwrap());
        SessionRepository::new(db, ProjectFingerprint("fp".into()))
    }

    #[test]
    fn test_create_and_end_once() {
        let repo = repo();
        repo.create("s1").unwrap();
        assert!(repo.end("s1", Some("did things")).unwrap());
        // Second end is a no-op.
        assert!(!repo.end("s1", Some("again")).unwrap());

        let session = repo.get_by_id("s1").unwrap().unwrap();
        assert_eq!(session.summary.as_deref(), Some("did things"));
    }

    #[test]
    fn test_summary_only_after_end() {
        let repo = repo();
        let session = repo.create("s1").unwrap();
        assert!(session.summary.is_none());
        assert!(session.ended_at.is_none());
    }

    #[test]
    fn test_active_session() {
        let repo = repo();
        repo.create("s1").unwrap();
        assert!(repo.get_active().unwrap().is_some());
        repo.end("s1", None).unwrap();
        assert!(repo.get_active().unwrap().is_none());
    }
}
