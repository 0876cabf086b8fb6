//! Thought-branch repository: detected work units. The detector that
//! decides branch boundaries is an external collaborator; this repository
//! only persists and retrieves what it decides.

use crate::db::{now_iso8601, Database};
use crate::error::DbResult;
use crate::repo::ThoughtBranch;
use crate::types::ProjectFingerprint;
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

pub struct ThoughtBranchRepository {
    db: Arc<Database>,
    project_fingerprint: ProjectFingerprint,
}

impl ThoughtBranchRepository {
    #[must_use]
    pub fn new(db: Arc<Database>, project_fingerprint: ProjectFingerprint) -> Self {
        Self { db, project_fingerprint }
    }

    /// # Errors
    ///
    /// Returns `DbError` if the insert fails.
    pub fn create(&self, id: &str, session_id: Option<&str>, label: &str) -> DbResult<ThoughtBranch> {
        let conn = self.db.conn()?;
        let now = now_iso8601();
        conn.execute(
            "INSERT INTO thought_branches (id, project_fingerprint, session_id, label, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, self.project_fingerprint.as_str(), session_id, label, now],
        )?;
        Ok(ThoughtBranch {
            id: id.to_string(),
            project_fingerprint: self.project_fingerprint.as_str().to_string(),
            session_id: session_id.map(str::to_string),
            label: label.to_string(),
            created_at: now,
        })
    }

    /// Appends an observation to a branch at the given position.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the branch or observation does not belong to
    /// this project, or the insert fails.
    pub fn add_observation(&self, branch_id: &str, observation_id: i64, position: i64) -> DbResult<()> {
        let conn = self.db.conn()?;
        conn.execute(
            "INSERT INTO branch_observations (branch_id, observation_id, position)
             SELECT ?1, ?2, ?3
             WHERE EXISTS (SELECT 1 FROM thought_branches WHERE id = ?1 AND project_fingerprint = ?4)
               AND EXISTS (SELECT 1 FROM observations WHERE id = ?2 AND project_fingerprint = ?4)",
            params![branch_id, observation_id, position, self.project_fingerprint.as_str()],
        )?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `DbError` if the query fails.
    pub fn get_by_id(&self, id: &str) -> DbResult<Option<ThoughtBranch>> {
        let conn = self.db.conn()?;
        conn.query_row(
            "SELECT id, project_fingerprint, session_id, label, created_at
             FROM thought_branches WHERE id = ?1 AND project_fingerprint = ?2",
            params![id, self.project_fingerprint.as_str()],
            row_to_branch,
        )
        .optional()
        .map_err(crate::error::DbError::Sqlite)
    }

    /// Observation ids belonging to a branch, in recorded order.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the query fails.
    pub fn observation_ids(&self, branch_id: &str) -> DbResult<Vec<i64>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT bo.observation_id
             FROM branch_observations bo
             JOIN thought_branches tb ON tb.id = bo.branch_id
             WHERE bo.branch_id = ?1 AND tb.project_fingerprint = ?2
             ORDER BY bo.position ASC",
        )?;
        let rows = stmt
            .query_map(params![branch_id, self.project_fingerprint.as_str()], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_branch(row: &Row<'_>) -> rusqlite::Result<ThoughtBranch> {
    Ok(ThoughtBranch {
        id: row.get(0)?,
        project_fingerprint: row.get(1)?,
        session_id: row.get(2)?,
        label: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::observations::ObservationRepository;
    use crate::repo::{Kind, NewObservation};

    #[test]
    fn test_branch_with_observations() {
        let db = Arc::new(Database::in_memory().unwrap());
        let fp = ProjectFingerprint("a".into());
        let obs_repo = ObservationRepository::new(Arc::clone(&db), fp.clone());
        let branch_repo = ThoughtBranchRepository::new(Arc::clone(&db), fp);

        let obs = obs_repo
            .create(NewObservation {
                session_id: None,
                source: "hook:Edit".to_string(),
                title: None,
                content: "refactor auth module".to_string(),
                kind: Kind::Change,
            })
            .unwrap();

        branch_repo.create("branch-1", None, "auth refactor").unwrap();
        branch_repo.add_observation("branch-1", obs.id, 0).unwrap();

        let ids = branch_repo.observation_ids("branch-1").unwrap();
        assert_eq!(ids, vec![obs.id]);
    }
}
