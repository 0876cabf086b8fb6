//! Notification repository: operator-visible suggestions or status.

use crate::db::{now_iso8601, Database};
use crate::error::DbResult;
use crate::repo::Notification;
use crate::types::ProjectFingerprint;
use rusqlite::{params, Row};
use std::sync::Arc;

pub struct NotificationRepository {
    db: Arc<Database>,
    project_fingerprint: ProjectFingerprint,
}

impl NotificationRepository {
    #[must_use]
    pub fn new(db: Arc<Database>, project_fingerprint: ProjectFingerprint) -> Self {
        Self { db, project_fingerprint }
    }

    /// # Errors
    ///
    /// Returns `DbError` if the insert fails.
    pub fn create(&self, message: &str) -> DbResult<Notification> {
        let conn = self.db.conn()?;
        let now = now_iso8601();
        conn.execute(
            "INSERT INTO notifications (project_fingerprint, message, created_at) VALUES (?1, ?2, ?3)",
            params![self.project_fingerprint.as_str(), message, now],
        )?;
        let id = conn.last_insert_rowid();
        Ok(Notification {
            id,
            project_fingerprint: self.project_fingerprint.as_str().to_string(),
            message: message.to_string(),
            created_at: now,
        })
    }

    /// Most recent notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the query fails.
    pub fn list_recent(&self, limit: usize) -> DbResult<Vec<Notification>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, project_fingerprint, message, created_at FROM notifications
             WHERE project_fingerprint = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![self.project_fingerprint.as_str(), limit as i64], row_to_notification)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        project_fingerprint: row.get(1)?,
        message: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_list() {
        let db = Arc::new(Database::in_memory().unwrap());
        let repo = NotificationRepository::new(db, ProjectFingerprint("a".into()));
        repo.create("tool registry rectification suggested").unwrap();
        let rows = repo.list_recent(10).unwrap();
        assert_eq!(rows.len(), 1);
    }
}
