//! Observation repository: the atomic memory record.

use crate::db::{now_iso8601, Database};
use crate::error::DbResult;
use crate::repo::{Classification, Kind, NewObservation, Observation, ObservationPatch};
use crate::types::ProjectFingerprint;
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

/// Filters accepted by [`ObservationRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub session_id: Option<String>,
    pub since: Option<String>,
    pub kind: Option<Kind>,
    pub limit: usize,
    pub include_unclassified: bool,
}

pub struct ObservationRepository {
    db: Arc<Database>,
    project_fingerprint: ProjectFingerprint,
}

impl ObservationRepository {
    #[must_use]
    pub fn new(db: Arc<Database>, project_fingerprint: ProjectFingerprint) -> Self {
        Self { db, project_fingerprint }
    }

    /// Inserts a new, unclassified observation. Content must be non-empty.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if content is empty or the insert fails.
    pub fn create(&self, input: NewObservation) -> DbResult<Observation> {
        self.create_classified(input, None)
    }

    /// Inserts a new observation with an explicit classification verdict.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if content is empty or the insert fails.
    pub fn create_classified(
        &self,
        input: NewObservation,
        classification: Option<Classification>,
    ) -> DbResult<Observation> {
        if input.content.trim().is_empty() {
            return Err(crate::error::DbError::RowNotFound(
                "observation content must be non-empty".to_string(),
            ));
        }

        let conn = self.db.conn()?;
        let now = now_iso8601();
        let public_id = uuid::Uuid::new_v4().to_string();

        conn.execute(
            "INSERT INTO observations
                (public_id, project_fingerprint, session_id, source, title, content, kind,
                 classification, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                public_id,
                self.project_fingerprint.as_str(),
                input.session_id,
                input.source,
                input.title,
                input.content,
                input.kind.as_str(),
                classification.map(Classification::as_str),
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.get_by_id_conn(&conn, id)?.ok_or_else(|| {
            crate::error::DbError::RowNotFound(format!("observation {id} vanished after insert"))
        })
    }

    /// Fetches one observation, scoped to this repository's project.
    /// Returns `Ok(None)` for a missing or cross-project id -- never an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the underlying query fails.
    pub fn get_by_id(&self, id: i64) -> DbResult<Option<Observation>> {
        let conn = self.db.conn()?;
        self.get_by_id_conn(&conn, id)
    }

    fn get_by_id_conn(&self, conn: &rusqlite::Connection, id: i64) -> DbResult<Option<Observation>> {
        conn.query_row(
            "SELECT id, public_id, project_fingerprint, session_id, source, title, content, kind,
                    classification, embedding_model, embedding_version, embedded_at,
                    created_at, updated_at, deleted_at
             FROM observations
             WHERE id = ?1 AND project_fingerprint = ?2",
            params![id, self.project_fingerprint.as_str()],
            row_to_observation,
        )
        .optional()
        .map_err(crate::error::DbError::Sqlite)
    }

    /// Lists observations ordered by `created_at DESC, id DESC`. The
    /// rowid tiebreaker is mandatory: `created_at` has only second
    /// precision.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the query fails.
    pub fn list(&self, filter: &ListFilter) -> DbResult<Vec<Observation>> {
        let conn = self.db.conn()?;
        let mut sql = String::from(
            "SELECT id, public_id, project_fingerprint, session_id, source, title, content, kind,
                    classification, embedding_model, embedding_version, embedded_at,
                    created_at, updated_at, deleted_at
             FROM observations
             WHERE project_fingerprint = ?1 AND deleted_at IS NULL",
        );

        if filter.session_id.is_some() {
            sql.push_str(" AND session_id = ?2");
        }
        if filter.since.is_some() {
            sql.push_str(" AND created_at >= ?3");
        }
        if filter.kind.is_some() {
            sql.push_str(" AND kind = ?4");
        }
        if !filter.include_unclassified {
            sql.push_str(" AND classification IS NOT NULL");
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?5");

        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(
                params![
                    self.project_fingerprint.as_str(),
                    filter.session_id,
                    filter.since,
                    filter.kind.map(Kind::as_str),
                    filter.limit as i64,
                ],
                row_to_observation,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Applies a patch to mutable fields only. Never touches project
    /// fingerprint, content, or source. A patch targeting a missing or
    /// cross-project id is a silent zero-row update, not an error.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the update statement fails.
    pub fn update(&self, id: i64, patch: &ObservationPatch) -> DbResult<bool> {
        let conn = self.db.conn()?;
        let current = self.get_by_id_conn(&conn, id)?;
        let Some(current) = current else { return Ok(false) };

        let kind = patch.kind.unwrap_or(current.kind).as_str();
        let classification = patch
            .classification
            .map(Classification::as_str)
            .or(current.classification.map(Classification::as_str));
        let embedding_model = patch.embedding_model.clone().or(current.embedding_model);
        let embedding_version = patch.embedding_version.clone().or(current.embedding_version);
        let embedded_at = patch.embedded_at.clone().or(current.embedded_at);

        let changed = conn.execute(
            "UPDATE observations
             SET kind = ?1, classification = ?2, embedding_model = ?3,
                 embedding_version = ?4, embedded_at = ?5, updated_at = ?6
             WHERE id = ?7 AND project_fingerprint = ?8",
            params![
                kind,
                classification,
                embedding_model,
                embedding_version,
                embedded_at,
                now_iso8601(),
                id,
                self.project_fingerprint.as_str(),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Soft-deletes an observation by setting `deleted_at`.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the update statement fails.
    pub fn soft_delete(&self, id: i64) -> DbResult<bool> {
        let conn = self.db.conn()?;
        let changed = conn.execute(
            "UPDATE observations SET deleted_at = ?1, updated_at = ?1
             WHERE id = ?2 AND project_fingerprint = ?3 AND deleted_at IS NULL",
            params![now_iso8601(), id, self.project_fingerprint.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Clears `deleted_at`, restoring a soft-deleted observation.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the update statement fails.
    pub fn restore(&self, id: i64) -> DbResult<bool> {
        let conn = self.db.conn()?;
        let changed = conn.execute(
            "UPDATE observations SET deleted_at = NULL, updated_at = ?1
             WHERE id = ?2 AND project_fingerprint = ?3",
            params![now_iso8601(), id, self.project_fingerprint.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Counts non-deleted observations scoped to this project.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the query fails.
    pub fn count(&self) -> DbResult<i64> {
        let conn = self.db.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM observations WHERE project_fingerprint = ?1 AND deleted_at IS NULL",
            params![self.project_fingerprint.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Lists observations lacking an embedding, for the embedding worker.
    /// Not project-scoped: the worker drains across all projects.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the query fails.
    pub fn list_unembedded(db: &Database, limit: usize) -> DbResult<Vec<Observation>> {
        let conn = db.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, public_id, project_fingerprint, session_id, source, title, content, kind,
                    classification, embedding_model, embedding_version, embedded_at,
                    created_at, updated_at, deleted_at
             FROM observations
             WHERE embedded_at IS NULL AND deleted_at IS NULL
             ORDER BY created_at ASC, id ASC
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_observation)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Hard-deletes observations soft-deleted before `before` (RFC 3339).
    /// Not project-scoped: administrative purge runs across every project
    /// in the database. The base table's `AFTER DELETE` trigger cleans up
    /// the FTS shadow rows; `vec_observations` has no such trigger (vec0
    /// doesn't support them), so its rows are deleted by rowid up front.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if a delete statement fails.
    pub fn purge_soft_deleted_before(db: &Database, before: &str) -> DbResult<usize> {
        let conn = db.conn()?;
        if db.has_vector_support() {
            conn.execute(
                "DELETE FROM vec_observations WHERE rowid IN
                    (SELECT id FROM observations WHERE deleted_at IS NOT NULL AND deleted_at < ?1)",
                params![before],
            )?;
        }
        let deleted = conn.execute(
            "DELETE FROM observations WHERE deleted_at IS NOT NULL AND deleted_at < ?1",
            params![before],
        )?;
        Ok(deleted)
    }
}

/// Exposed to [`crate::search`], which joins `observations` against FTS
/// and vector virtual tables and needs the same row mapping.
pub(crate) fn row_to_observation_pub(row: &Row<'_>) -> rusqlite::Result<Observation> {
    row_to_observation(row)
}

fn row_to_observation(row: &Row<'_>) -> rusqlite::Result<Observation> {
    let kind_str: String = row.get(7)?;
    let classification_str: Option<String> = row.get(8)?;
    Ok(Observation {
        id: row.get(0)?,
        public_id: row.get(1)?,
        project_fingerprint: row.get(2)?,
        session_id: row.get(3)?,
        source: row.get(4)?,
        title: row.get(5)?,
        content: row.get(6)?,
        kind: kind_str.parse().unwrap_or(Kind::Unclassified),
        classification: classification_str.and_then(|s| s.parse().ok()),
        embedding_model: row.get(9)?,
        embedding_version: row.get(10)?,
        embedded_at: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
        deleted_at: row.get(14)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> (Arc<Database>, ObservationRepository) {
        let db = Arc::new(Database::in_memory().unwrap());
        let fp = ProjectFingerprint("fp-test".to_string());
        let repo = ObservationRepository::new(Arc::clone(&db), fp);
        (db, repo)
    }

    fn new_obs(content: &str) -> NewObservation {
        NewObservation {
            session_id: None,
            source: "hook:Write".to_string(),
            title: None,
            content: content.to_string(),
            kind: Kind::Change,
        }
    }

    #[test]
    fn test_create_and_get() {
        let (_db, repo) = repo();
        let obs = repo.create(new_obs("hello world")).unwrap();
        let fetched = repo.get_by_id(obs.id).unwrap().unwrap();
        assert_eq!(fetched.content, "hello world");
        assert_eq!(fetched.project_fingerprint, "fp-test");
    }

    #[test]
    fn test_empty_content_rejected() {
        let (_db, repo) = repo();
        assert!(repo.create(new_obs("   ")).is_err());
    }

    #[test]
    fn test_cross_project_isolation() {
        let db = Arc::new(Database::in_memory().unwrap());
        let repo_a = ObservationRepository::new(Arc::clone(&db), ProjectFingerprint("a".into()));
        let repo_b = ObservationRepository::new(Arc::clone(&db), ProjectFingerprint("b".into()));

        let obs = repo_a.create(new_obs("alpha secret")).unwrap();
        assert!(repo_b.get_by_id(obs.id).unwrap().is_none());
    }

    #[test]
    fn test_soft_delete_excluded_from_list() {
        let (_db, repo) = repo();
        let obs = repo.create_classified(new_obs("x"), Some(Classification::Discovery)).unwrap();
        repo.soft_delete(obs.id).unwrap();

        let filter = ListFilter {
            limit: 10,
            include_unclassified: true,
            ..Default::default()
        };
        let rows = repo.list(&filter).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_update_never_touches_fingerprint() {
        let (_db, repo) = repo();
        let obs = repo.create(new_obs("x")).unwrap();
        let patch = ObservationPatch {
            kind: Some(Kind::Decision),
            ..Default::default()
        };
        assert!(repo.update(obs.id, &patch).unwrap());
        let fetched = repo.get_by_id(obs.id).unwrap().unwrap();
        assert_eq!(fetched.kind, Kind::Decision);
        assert_eq!(fetched.project_fingerprint, "fp-test");
    }

    #[test]
    fn test_update_missing_id_is_false_not_error() {
        let (_db, repo) = repo();
        let patch = ObservationPatch::default();
        assert!(!repo.update(9999, &patch).unwrap());
    }

    #[test]
    fn test_list_tiebreaker_order() {
        let (_db, repo) = repo();
        for i in 0..5 {
            repo.create_classified(new_obs(&format!("entry {i}")), Some(Classification::Discovery))
                .unwrap();
        }
        let filter = ListFilter { limit: 10, ..Default::default() };
        let rows = repo.list(&filter).unwrap();
        // Same-second inserts must come back in reverse insertion (id DESC) order.
        let ids: Vec<i64> = rows.iter().map(|o| o.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_purge_only_removes_old_soft_deletes() {
        let (db, repo) = repo();
        let old = repo.create(new_obs("ancient")).unwrap();
        let recent = repo.create(new_obs("fresh")).unwrap();
        repo.soft_delete(old.id).unwrap();
        repo.soft_delete(recent.id).unwrap();

        // Backdate the old row's deleted_at so the cutoff only catches it.
        db.conn()
            .unwrap()
            .execute("UPDATE observations SET deleted_at = '2000-01-01T00:00:00Z' WHERE id = ?1", params![old.id])
            .unwrap();

        let purged = ObservationRepository::purge_soft_deleted_before(&db, "2020-01-01T00:00:00Z").unwrap();
        assert_eq!(purged, 1);
        assert!(repo.get_by_id(old.id).unwrap().is_none());
        assert!(repo.get_by_id(recent.id).unwrap().is_some());
    }
}
