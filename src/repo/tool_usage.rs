//! Tool usage event queries. Events are append-only rows written
//! alongside (not inside) the tool registry's counter update -- see
//! [`crate::repo::tool_registry::ToolRegistryRepository::record_or_create`].

use crate::db::Database;
use crate::error::DbResult;
use crate::repo::ToolUsageEvent;
use crate::types::ProjectFingerprint;
use rusqlite::{params, Row};
use std::sync::Arc;

pub struct ToolUsageRepository {
    db: Arc<Database>,
    project_fingerprint: ProjectFingerprint,
}

impl ToolUsageRepository {
    #[must_use]
    pub fn new(db: Arc<Database>, project_fingerprint: ProjectFingerprint) -> Self {
        Self { db, project_fingerprint }
    }

    /// Usage events for one tool within the last `window_days`.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the query fails.
    pub fn get_usage_for_tool(&self, name: &str, window_days: u32) -> DbResult<Vec<ToolUsageEvent>> {
        let conn = self.db.conn()?;
        let since = (chrono::Utc::now() - chrono::Duration::days(i64::from(window_days))).to_rfc3339();
        let mut stmt = conn.prepare_cached(
            "SELECT id, tool_name, session_id, project_fingerprint, success, created_at
             FROM tool_usage_events
             WHERE tool_name = ?1 AND project_fingerprint = ?2 AND created_at >= ?3
             ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map(params![name, self.project_fingerprint.as_str(), since], row_to_event)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Usage events for one session, in this project.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the query fails.
    pub fn get_usage_for_session(&self, session_id: &str) -> DbResult<Vec<ToolUsageEvent>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, tool_name, session_id, project_fingerprint, success, created_at
             FROM tool_usage_events
             WHERE session_id = ?1 AND project_fingerprint = ?2
             ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map(params![session_id, self.project_fingerprint.as_str()], row_to_event)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Usage events at or after an absolute timestamp, in this project.
    /// Used by the context assembler's tool-ranking window (the last K
    /// events).
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the query fails.
    pub fn get_usage_since(&self, since_iso: &str, limit: usize) -> DbResult<Vec<ToolUsageEvent>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, tool_name, session_id, project_fingerprint, success, created_at
             FROM tool_usage_events
             WHERE project_fingerprint = ?1 AND created_at >= ?2
             ORDER BY created_at DESC, id DESC
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![self.project_fingerprint.as_str(), since_iso, limit as i64], row_to_event)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<ToolUsageEvent> {
    Ok(ToolUsageEvent {
        id: row.get(0)?,
        tool_name: row.get(1)?,
        session_id: row.get(2)?,
        project_fingerprint: row.get(3)?,
        success: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::tool_registry::ToolRegistryRepository;
    use crate::repo::ToolRegistryDefaults;
    use crate::types::Scope;

    #[test]
    fn test_usage_queries_scoped() {
        let db = Arc::new(Database::in_memory().unwrap());
        let registry = ToolRegistryRepository::new(Arc::clone(&db), ProjectFingerprint("a".into()));
        let usage = ToolUsageRepository::new(Arc::clone(&db), ProjectFingerprint("a".into()));

        let defaults = ToolRegistryDefaults {
            tool_type: "mcp_tool".to_string(),
            scope: Scope::Project,
            source_origin: "organic".to_string(),
            project_fingerprint: Some("a".to_string()),
            description: None,
            server_name: None,
            trigger_hints: None,
        };
        registry.record_or_create("search", &defaults, Some("s1"), true).unwrap();

        let for_tool = usage.get_usage_for_tool("search", 7).unwrap();
        assert_eq!(for_tool.len(), 1);

        let for_session = usage.get_usage_for_session("s1").unwrap();
        assert_eq!(for_session.len(), 1);
        assert!(for_session[0].success);
    }
}
