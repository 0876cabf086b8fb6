//! The capture pipeline: turns one hook invocation's stdin payload into,
//! at most, one persisted observation plus a best-effort tool-registry
//! usage event.
//!
//! The hard rule for every function in this module's call path: any
//! error, anywhere, is swallowed and the pipeline simply admits nothing.
//! `laminark-hook` must never print to stdout (the host treats stdout as
//! injected context) or exit non-zero for an assistant tool call that has
//! nothing to do with laminark.

pub mod admission;
pub mod fileexclude;
pub mod redaction;
pub mod selfref;
pub mod summary;

use crate::db::Database;
use crate::repo::observations::ObservationRepository;
use crate::repo::tool_registry::ToolRegistryRepository;
use crate::repo::{Classification, Kind, NewObservation, ToolRegistryDefaults};
use crate::types::{ProjectFingerprint, Scope};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// The subset of a hook's JSON payload this pipeline reads. Hosts send
/// additional fields; everything else is ignored, not an error.
#[derive(Debug, Deserialize)]
pub struct HookPayload {
    pub hook_event_name: Option<String>,
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Value,
    #[serde(default)]
    pub tool_response: Value,
    pub cwd: Option<String>,
    pub session_id: Option<String>,
}

/// Parses one hook payload from raw stdin bytes. A parse failure is
/// reported to the caller so it can exit 0 without doing anything further
/// -- it is never itself an error the process surfaces.
#[must_use]
pub fn parse_payload(raw: &str) -> Option<HookPayload> {
    serde_json::from_str(raw).ok()
}

/// Runs the full pipeline for one parsed payload. Returns `true` if an
/// observation was committed. Never returns `Err` -- every internal
/// failure is logged at `debug` and treated as "nothing to admit".
pub fn process(db: &Arc<Database>, payload: &HookPayload, additional_redaction_patterns: &[String]) -> bool {
    let Some(event) = payload.hook_event_name.as_deref() else {
        return false;
    };
    if !matches!(event, "PostToolUse" | "PostToolUseFailure") {
        debug!(event, "hook event not captured");
        return false;
    }

    let Some(tool_name) = payload.tool_name.as_deref() else { return false };
    if selfref::is_self_referential(tool_name) {
        return false;
    }

    if let Some(path) = extract_touched_path(tool_name, &payload.tool_input) {
        if fileexclude::is_excluded_file(&path) {
            debug!(path, "excluded file, skipping capture");
            return false;
        }
    }

    let is_error = event == "PostToolUseFailure";
    let summary = summary::summarize(tool_name, &payload.tool_input, &payload.tool_response, is_error);
    let redacted_content = redaction::redact(&summary.content, additional_redaction_patterns);

    if !admission::should_admit(tool_name, &redacted_content) {
        return false;
    }

    let Some(cwd) = payload.cwd.as_deref() else { return false };
    let fingerprint = ProjectFingerprint::from_root(Path::new(cwd));

    let obs_repo = ObservationRepository::new(Arc::clone(db), fingerprint.clone());
    let created = obs_repo.create_classified(
        NewObservation {
            session_id: payload.session_id.clone(),
            source: format!("hook:{tool_name}"),
            title: summary.title,
            content: redacted_content,
            kind: Kind::Unclassified,
        },
        Some(Classification::Discovery),
    );

    let Ok(_observation) = created else {
        return false;
    };

    // Non-transactional by design: a failure here must never roll back
    // the observation write or propagate to the hook's exit code.
    let registry = ToolRegistryRepository::new(Arc::clone(db), fingerprint.clone());
    let defaults = ToolRegistryDefaults {
        tool_type: classify_tool_type(tool_name),
        scope: Scope::Project,
        source_origin: "organic".to_string(),
        project_fingerprint: Some(fingerprint.as_str().to_string()),
        description: None,
        server_name: None,
        trigger_hints: None,
    };
    if let Err(e) = registry.record_or_create(tool_name, &defaults, payload.session_id.as_deref(), !is_error) {
        debug!(error = %e, "tool registry event not recorded");
    }

    true
}

fn classify_tool_type(tool_name: &str) -> String {
    if tool_name.starts_with("mcp__") {
        "mcp_tool".to_string()
    } else {
        "builtin".to_string()
    }
}

fn extract_touched_path(tool_name: &str, tool_input: &Value) -> Option<String> {
    match tool_name {
        "Read" | "Edit" | "Write" | "MultiEdit" | "NotebookEdit" => {
            tool_input.get("file_path").and_then(Value::as_str).map(str::to_string)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::observations::ListFilter;
    use serde_json::json;

    fn db() -> Arc<Database> {
        Arc::new(Database::in_memory().unwrap())
    }

    #[test]
    fn test_malformed_payload_parses_to_none() {
        assert!(parse_payload("not json").is_none());
    }

    #[test]
    fn test_self_referential_tool_not_captured() {
        let db = db();
        let payload = HookPayload {
            hook_event_name: Some("PostToolUse".to_string()),
            tool_name: Some("mcp__laminark__recall".to_string()),
            tool_input: json!({}),
            tool_response: Value::Null,
            cwd: Some("/tmp".to_string()),
            session_id: None,
        };
        assert!(!process(&db, &payload, &[]));
    }

    #[test]
    fn test_excluded_file_not_captured() {
        let db = db();
        let payload = HookPayload {
            hook_event_name: Some("PostToolUse".to_string()),
            tool_name: Some("Read".to_string()),
            tool_input: json!({"file_path": "/repo/.env.production"}),
            tool_response: Value::Null,
            cwd: Some("/repo".to_string()),
            session_id: None,
        };
        assert!(!process(&db, &payload, &[]));
    }

    #[test]
    fn test_meaningful_edit_captured_and_scoped() {
        let db = db();
        let payload = HookPayload {
            hook_event_name: Some("PostToolUse".to_string()),
            tool_name: Some("Edit".to_string()),
            tool_input: json!({"file_path": "src/auth/session.rs"}),
            tool_response: Value::Null,
            cwd: Some("/repo/project-a".to_string()),
            session_id: Some("s1".to_string()),
        };
        assert!(process(&db, &payload, &[]));

        let fingerprint = ProjectFingerprint::from_root(Path::new("/repo/project-a"));
        let repo = ObservationRepository::new(Arc::clone(&db), fingerprint);
        let rows = repo
            .list(&ListFilter { limit: 10, include_unclassified: true, ..Default::default() })
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].content.contains("session.rs"));
    }

    #[test]
    fn test_unrecognized_event_not_captured() {
        let db = db();
        let payload = HookPayload {
            hook_event_name: Some("SessionStart".to_string()),
            tool_name: None,
            tool_input: Value::Null,
            tool_response: Value::Null,
            cwd: Some("/tmp".to_string()),
            session_id: None,
        };
        assert!(!process(&db, &payload, &[]));
    }
}
