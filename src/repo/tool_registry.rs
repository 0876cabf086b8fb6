//! Tool registry repository: the cross-project tool catalog and the
//! scope-resolution predicate.
//!
//! The scope predicate below is the single place this crate decides
//! project-visibility for tools. It is never re-derived at another call
//! site -- see the module test `test_scope_matrix` for the coverage this
//! demands.

use crate::db::{now_iso8601, Database};
use crate::error::DbResult;
use crate::repo::{ToolRegistryDefaults, ToolRegistryEntry};
use crate::types::{ProjectFingerprint, Scope};
use rusqlite::{params, Row};
use std::sync::Arc;
use tracing::warn;

/// SQL fragment implementing the scope-resolution rule. Bind the caller's
/// project fingerprint twice, once per `?` occurrence.
///
/// Deliberately NOT `scope = 'global' OR project_fingerprint = ?` -- that
/// naive form leaks a project-scoped row whose `project_fingerprint`
/// happens to be unbound into every other project's view.
const SCOPE_PREDICATE: &str = "(scope = 'global' \
     OR (scope = 'project' AND project_fingerprint = ?) \
     OR (scope = 'plugin' AND (project_fingerprint IS NULL OR project_fingerprint = ?)))";

/// Ordering bucket for tool types in `getAvailableForSession` results.
/// Lower sorts first.
fn tool_type_bucket(tool_type: &str) -> i32 {
    match tool_type {
        "builtin" => 0,
        "mcp_tool" => 1,
        "mcp_server" => 2,
        "skill" => 3,
        "slash_command" => 4,
        "plugin" => 5,
        _ => 6,
    }
}

pub struct ToolRegistryRepository {
    db: Arc<Database>,
    project_fingerprint: ProjectFingerprint,
}

impl ToolRegistryRepository {
    #[must_use]
    pub fn new(db: Arc<Database>, project_fingerprint: ProjectFingerprint) -> Self {
        Self { db, project_fingerprint }
    }

    /// Insert-or-update on `(name, project_fingerprint)`. On conflict,
    /// `description` is `COALESCE`d against the existing value, `source_origin`
    /// and `status` are overwritten, `usage_count` is left untouched, and
    /// `scope` is **never** overwritten -- the first writer's scope wins.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the upsert statement fails.
    pub fn upsert(&self, defaults: &ToolRegistryDefaults, name: &str) -> DbResult<()> {
        let conn = self.db.conn()?;
        let now = now_iso8601();
        conn.execute(
            "INSERT INTO tool_registry
                (name, tool_type, scope, source_origin, project_fingerprint, description,
                 server_name, trigger_hints, status, usage_count, discovered_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'active', 0, ?9, ?9)
             ON CONFLICT(name, COALESCE(project_fingerprint, '')) DO UPDATE SET
                description = COALESCE(tool_registry.description, excluded.description),
                source_origin = excluded.source_origin,
                status = 'active',
                server_name = COALESCE(excluded.server_name, tool_registry.server_name),
                trigger_hints = COALESCE(excluded.trigger_hints, tool_registry.trigger_hints),
                updated_at = excluded.updated_at",
            params![
                name,
                defaults.tool_type,
                defaults.scope.as_str(),
                defaults.source_origin,
                defaults.project_fingerprint,
                defaults.description,
                defaults.server_name,
                defaults.trigger_hints,
                now,
            ],
        )?;
        Ok(())
    }

    /// Records a tool invocation: upserts the entry (creating it with
    /// `defaults` if unseen), then atomically increments its usage
    /// counter and `last_used_at`, then -- only if `session_id` is given
    /// -- inserts a supplementary [`crate::repo::ToolUsageEvent`] row. The
    /// event insert is not transactionally bound to the counter update;
    /// its failure is logged and swallowed, never propagated.
    ///
    /// # Errors
    ///
    /// Returns `DbError` only if the counter update itself fails.
    pub fn record_or_create(
        &self,
        name: &str,
        defaults: &ToolRegistryDefaults,
        session_id: Option<&str>,
        success: bool,
    ) -> DbResult<()> {
        self.upsert(defaults, name)?;

        let conn = self.db.conn()?;
        let now = now_iso8601();
        conn.execute(
            "UPDATE tool_registry
             SET usage_count = usage_count + 1, last_used_at = ?1, updated_at = ?1
             WHERE name = ?2 AND COALESCE(project_fingerprint, '') = COALESCE(?3, '')",
            params![now, name, defaults.project_fingerprint],
        )?;

        if let Some(session_id) = session_id {
            let project_fingerprint = defaults
                .project_fingerprint
                .clone()
                .unwrap_or_else(|| self.project_fingerprint.as_str().to_string());
            let result = conn.execute(
                "INSERT INTO tool_usage_events
                    (tool_name, session_id, project_fingerprint, success, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![name, session_id, project_fingerprint, success as i64, now],
            );
            if let Err(e) = result {
                warn!(tool = name, error = %e, "tool usage event insert failed, continuing");
            }
        }

        Ok(())
    }

    /// Tools visible to this repository's project, applying the full
    /// scope predicate at the SQL level.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the query fails.
    pub fn get_available_for_session(&self) -> DbResult<Vec<ToolRegistryEntry>> {
        let conn = self.db.conn()?;
        let fp = self.project_fingerprint.as_str();
        let sql = format!(
            "SELECT name, tool_type, scope, source_origin, project_fingerprint, description,
                    server_name, trigger_hints, status, usage_count, last_used_at,
                    discovered_at, updated_at
             FROM tool_registry
             WHERE status = 'active' AND {SCOPE_PREDICATE}"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let mut rows = stmt
            .query_map(params![fp, fp], row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.sort_by(|a, b| {
            tool_type_bucket(&a.tool_type)
                .cmp(&tool_type_bucket(&b.tool_type))
                .then(b.usage_count.cmp(&a.usage_count))
                .then(b.discovered_at.cmp(&a.discovered_at))
        });
        Ok(rows)
    }

    /// Tool registry entries with a description but no embedding yet, for
    /// the embedding worker. Not project-scoped: the worker drains across
    /// all projects.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the query fails.
    pub fn list_unembedded(db: &Database, limit: usize) -> DbResult<Vec<ToolRegistryEntry>> {
        let conn = db.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT name, tool_type, scope, source_origin, project_fingerprint, description,
                    server_name, trigger_hints, status, usage_count, last_used_at,
                    discovered_at, updated_at
             FROM tool_registry
             WHERE embedded_at IS NULL AND description IS NOT NULL
             ORDER BY discovered_at ASC
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Records that a tool registry entry's description has been
    /// embedded, identified by its `(name, project_fingerprint)` key
    /// (mirroring the upsert conflict target).
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the update fails.
    pub fn mark_embedded(db: &Database, name: &str, project_fingerprint: Option<&str>, model: &str) -> DbResult<()> {
        let conn = db.conn()?;
        conn.execute(
            "UPDATE tool_registry SET embedding_model = ?1, embedded_at = ?2
             WHERE name = ?3 AND COALESCE(project_fingerprint, '') = COALESCE(?4, '')",
            params![model, now_iso8601(), name, project_fingerprint],
        )?;
        Ok(())
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<ToolRegistryEntry> {
    let scope_str: String = row.get(2)?;
    Ok(ToolRegistryEntry {
        name: row.get(0)?,
        tool_type: row.get(1)?,
        scope: scope_str.parse().unwrap_or(Scope::Plugin),
        source_origin: row.get(3)?,
        project_fingerprint: row.get(4)?,
        description: row.get(5)?,
        server_name: row.get(6)?,
        trigger_hints: row.get(7)?,
        status: row.get(8)?,
        usage_count: row.get(9)?,
        last_used_at: row.get(10)?,
        discovered_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults(scope: Scope, fp: Option<&str>) -> ToolRegistryDefaults {
        ToolRegistryDefaults {
            tool_type: "mcp_tool".to_string(),
            scope,
            source_origin: "config_scan".to_string(),
            project_fingerprint: fp.map(str::to_string),
            description: Some("does a thing".to_string()),
            server_name: None,
            trigger_hints: None,
        }
    }

    #[test]
    fn test_upsert_never_overwrites_scope() {
        let db = Arc::new(Database::in_memory().unwrap());
        let repo = ToolRegistryRepository::new(Arc::clone(&db), ProjectFingerprint("a".into()));

        repo.upsert(&defaults(Scope::Global, None), "tool_x").unwrap();
        // A later organic-discovery write tries to downgrade scope to project.
        repo.upsert(&defaults(Scope::Project, Some("a")), "tool_x").unwrap();

        let conn = db.conn().unwrap();
        let scope: String = conn
            .query_row(
                "SELECT scope FROM tool_registry WHERE name = 'tool_x'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(scope, "global");
    }

    #[test]
    fn test_record_or_create_increments_and_events_independent() {
        let db = Arc::new(Database::in_memory().unwrap());
        let repo = ToolRegistryRepository::new(Arc::clone(&db), ProjectFingerprint("a".into()));
        let d = defaults(Scope::Project, Some("a"));

        repo.record_or_create("tool_x", &d, Some("s1"), true).unwrap();
        repo.record_or_create("tool_x", &d, Some("s1"), true).unwrap();
        repo.record_or_create("tool_x", &d, None, true).unwrap();

        let conn = db.conn().unwrap();
        let usage_count: i64 = conn
            .query_row("SELECT usage_count FROM tool_registry WHERE name = 'tool_x'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(usage_count, 3);

        let event_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tool_usage_events WHERE tool_name = 'tool_x'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(event_count, 2);
    }

    #[test]
    fn test_scope_matrix() {
        let db = Arc::new(Database::in_memory().unwrap());
        let repo_a = ToolRegistryRepository::new(Arc::clone(&db), ProjectFingerprint("a".into()));
        let repo_b = ToolRegistryRepository::new(Arc::clone(&db), ProjectFingerprint("b".into()));

        repo_a.upsert(&defaults(Scope::Global, None), "global_tool").unwrap();
        repo_a.upsert(&defaults(Scope::Project, Some("a")), "a_only_tool").unwrap();
        repo_a.upsert(&defaults(Scope::Plugin, None), "plugin_any").unwrap();
        repo_a.upsert(&defaults(Scope::Plugin, Some("a")), "plugin_a").unwrap();

        let names_for_a: Vec<String> = repo_a
            .get_available_for_session()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert!(names_for_a.contains(&"global_tool".to_string()));
        assert!(names_for_a.contains(&"a_only_tool".to_string()));
        assert!(names_for_a.contains(&"plugin_any".to_string()));
        assert!(names_for_a.contains(&"plugin_a".to_string()));

        let names_for_b: Vec<String> = repo_b
            .get_available_for_session()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert!(names_for_b.contains(&"global_tool".to_string()));
        assert!(!names_for_b.contains(&"a_only_tool".to_string()));
        assert!(names_for_b.contains(&"plugin_any".to_string()));
        assert!(!names_for_b.contains(&"plugin_a".to_string()));
    }
}
