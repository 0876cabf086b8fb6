//! Debug-path repository: investigation arcs. As with thought branches,
//! the detector deciding when an investigation starts/ends is external;
//! this repository only persists and retrieves.

use crate::db::{now_iso8601, Database};
use crate::error::DbResult;
use crate::repo::{DebugPath, PathWaypoint};
use crate::types::ProjectFingerprint;
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

pub struct DebugPathRepository {
    db: Arc<Database>,
    project_fingerprint: ProjectFingerprint,
}

impl DebugPathRepository {
    #[must_use]
    pub fn new(db: Arc<Database>, project_fingerprint: ProjectFingerprint) -> Self {
        Self { db, project_fingerprint }
    }

    /// # Errors
    ///
    /// Returns `DbError` if the insert fails.
    pub fn create(&self, id: &str, session_id: Option<&str>, label: &str) -> DbResult<DebugPath> {
        let conn = self.db.conn()?;
        let now = now_iso8601();
        conn.execute(
            "INSERT INTO debug_paths (id, project_fingerprint, session_id, label, resolved, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![id, self.project_fingerprint.as_str(), session_id, label, now],
        )?;
        Ok(DebugPath {
            id: id.to_string(),
            project_fingerprint: self.project_fingerprint.as_str().to_string(),
            session_id: session_id.map(str::to_string),
            label: label.to_string(),
            resolved: false,
            created_at: now,
        })
    }

    /// Appends a waypoint describing one step of the investigation.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the path does not belong to this project, or
    /// the insert fails.
    pub fn add_waypoint(&self, debug_path_id: &str, position: i64, description: &str) -> DbResult<()> {
        let conn = self.db.conn()?;
        conn.execute(
            "INSERT INTO path_waypoints (debug_path_id, position, description, created_at)
             SELECT ?1, ?2, ?3, ?4
             WHERE EXISTS (SELECT 1 FROM debug_paths WHERE id = ?1 AND project_fingerprint = ?5)",
            params![debug_path_id, position, description, now_iso8601(), self.project_fingerprint.as_str()],
        )?;
        Ok(())
    }

    /// Marks an investigation resolved.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the update fails.
    pub fn mark_resolved(&self, id: &str) -> DbResult<bool> {
        let conn = self.db.conn()?;
        let changed = conn.execute(
            "UPDATE debug_paths SET resolved = 1 WHERE id = ?1 AND project_fingerprint = ?2",
            params![id, self.project_fingerprint.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// # Errors
    ///
    /// Returns `DbError` if the query fails.
    pub fn get_by_id(&self, id: &str) -> DbResult<Option<DebugPath>> {
        let conn = self.db.conn()?;
        conn.query_row(
            "SELECT id, project_fingerprint, session_id, label, resolved, created_at
             FROM debug_paths WHERE id = ?1 AND project_fingerprint = ?2",
            params![id, self.project_fingerprint.as_str()],
            row_to_path,
        )
        .optional()
        .map_err(crate::error::DbError::Sqlite)
    }

    /// Waypoints for a path, in recorded order.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the query fails.
    pub fn waypoints(&self, debug_path_id: &str) -> DbResult<Vec<PathWaypoint>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT pw.debug_path_id, pw.position, pw.description, pw.created_at
             FROM path_waypoints pw
             JOIN debug_paths dp ON dp.id = pw.debug_path_id
             WHERE pw.debug_path_id = ?1 AND dp.project_fingerprint = ?2
             ORDER BY pw.position ASC",
        )?;
        let rows = stmt
            .query_map(params![debug_path_id, self.project_fingerprint.as_str()], row_to_waypoint)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_path(row: &Row<'_>) -> rusqlite::Result<DebugPath> {
    Ok(DebugPath {
        id: row.get(0)?,
        project_fingerprint: row.get(1)?,
        session_id: row.get(2)?,
        label: row.get(3)?,
        resolved: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
    })
}

fn row_to_waypoint(row: &Row<'_>) -> rusqlite::Result<PathWaypoint> {
    Ok(PathWaypoint {
        debug_path_id: row.get(0)?,
        position: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_path_lifecycle() {
        let db = Arc::new(Database::in_memory().unwrap());
        let repo = DebugPathRepository::new(db, ProjectFingerprint("a".into()));

        repo.create("dp-1", Some("s1"), "intermittent 500 on checkout").unwrap();
        repo.add_waypoint("dp-1", 0, "reproduced with curl").unwrap();
        repo.add_waypoint("dp-1", 1, "found stale cache entry").unwrap();
        assert!(repo.mark_resolved("dp-1").unwrap());

        let path = repo.get_by_id("dp-1").unwrap().unwrap();
        assert!(path.resolved);
        assert_eq!(repo.waypoints("dp-1").unwrap().len(), 2);
    }
}
