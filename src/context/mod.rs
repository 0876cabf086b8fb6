//! Context assembler: renders a bounded, ordered text block of recalled
//! memory for injection into an assistant's context window.
//!
//! Sections render in a fixed order -- session summary, changes,
//! decisions, references, findings, tools -- and are dropped from the
//! back when the assembled text would exceed [`MAX_CONTEXT_CHARS`]:
//! tools first, then references, then findings, then changes. Decisions
//! and the session summary are never dropped.

use crate::repo::Observation;
use chrono::{DateTime, Utc};

/// Hard ceiling on the assembled context's length, in characters.
pub const MAX_CONTEXT_CHARS: usize = 6000;

/// Sub-budget for the tools section alone, in characters.
pub const TOOLS_SUB_BUDGET: usize = 500;

const MAX_CHANGES: usize = 10;
const MAX_DECISIONS: usize = 5;
const MAX_REFERENCES: usize = 3;
const MAX_FINDINGS: usize = 5;

/// A ranked, dedup'd tool entry ready to render. Built by the caller
/// (typically the `discover_tools`/`recall` RPC handlers) from
/// [`crate::repo::ToolRegistryEntry`] rows plus usage-share ranking --
/// this module only renders, it doesn't rank.
#[derive(Clone)]
pub struct ToolSummary {
    pub name: String,
    pub server_name: Option<String>,
    pub description: Option<String>,
}

/// Input to the assembler: already-fetched, already-filtered observations
/// bucketed by kind, plus a session summary and the ranked tool list.
pub struct ContextInput {
    pub session_summary: Option<String>,
    pub changes: Vec<Observation>,
    pub decisions: Vec<Observation>,
    pub references: Vec<Observation>,
    pub findings: Vec<Observation>,
    pub tools: Vec<ToolSummary>,
}

/// Renders a relative-time phrase for an RFC 3339 timestamp, e.g. "3
/// hours ago", "yesterday", "2 weeks ago". Falls back to the raw
/// timestamp string if it cannot be parsed.
#[must_use]
pub fn relative_time(iso: &str, now: DateTime<Utc>) -> String {
    let Ok(then) = DateTime::parse_from_rfc3339(iso) else {
        return iso.to_string();
    };
    let then = then.with_timezone(&Utc);
    let delta = now.signed_duration_since(then);

    let minutes = delta.num_minutes();
    let hours = delta.num_hours();
    let days = delta.num_days();

    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes} minute{} ago", plural(minutes))
    } else if hours < 24 {
        format!("{hours} hour{} ago", plural(hours))
    } else if days == 1 {
        "yesterday".to_string()
    } else if days < 7 {
        format!("{days} day{} ago", plural(days))
    } else {
        let weeks = days / 7;
        if weeks <= 1 {
            "1 week ago".to_string()
        } else {
            format!("{weeks} weeks ago")
        }
    }
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// First 8 chars of an observation's public id, the handle a follow-up
/// tool call (e.g. resolving a finding) references it by.
fn id_handle(obs: &Observation) -> &str {
    let end = obs.public_id.char_indices().nth(8).map_or(obs.public_id.len(), |(i, _)| i);
    &obs.public_id[..end]
}

fn render_section(title: &str, items: &[Observation], now: DateTime<Utc>, with_handle: bool) -> String {
    if items.is_empty() {
        return String::new();
    }
    let mut out = format!("## {title}\n");
    for obs in items {
        if with_handle {
            out.push_str(&format!(
                "- [{}] {} ({})\n",
                id_handle(obs),
                obs.content,
                relative_time(&obs.created_at, now)
            ));
        } else {
            out.push_str(&format!("- {} ({})\n", obs.content, relative_time(&obs.created_at, now)));
        }
    }
    out
}

/// Renders the tools section, truncating entries (not just omitting them)
/// once the 500-char sub-budget is exhausted, so the section never blows
/// the overall ceiling on its own.
fn render_tools(tools: &[ToolSummary]) -> String {
    if tools.is_empty() {
        return String::new();
    }
    let header = "## Available Tools\n";
    let mut out = String::from(header);
    for tool in tools {
        let line = match (&tool.server_name, &tool.description) {
            (Some(server), Some(desc)) => format!("- `{server}::{}` -- {desc}\n", tool.name),
            (Some(server), None) => format!("- `{server}::{}`\n", tool.name),
            (None, Some(desc)) => format!("- `{}` -- {desc}\n", tool.name),
            (None, None) => format!("- `{}`\n", tool.name),
        };
        if out.len() + line.len() > TOOLS_SUB_BUDGET {
            break;
        }
        out.push_str(&line);
    }
    if out == header {
        return String::new();
    }
    out
}

fn render_session(summary: &str) -> String {
    format!("## Session\n{summary}\n")
}

/// Assembles the bounded context block. Applies per-section caps, then
/// (if still over budget) drops whole sections in order tools →
/// references → findings → changes, re-rendering and re-measuring after
/// each drop. Decisions and the session summary are never dropped.
#[must_use]
pub fn assemble(input: &ContextInput, now: DateTime<Utc>) -> String {
    let mut changes = input.changes.clone();
    changes.truncate(MAX_CHANGES);
    let mut decisions = input.decisions.clone();
    decisions.truncate(MAX_DECISIONS);
    let mut references = input.references.clone();
    references.truncate(MAX_REFERENCES);
    let mut findings = input.findings.clone();
    findings.truncate(MAX_FINDINGS);
    let tools = input.tools.clone();

    let mut include_tools = true;
    let mut include_references = true;
    let mut include_findings = true;
    let mut include_changes = true;

    loop {
        let rendered = render_all(
            input.session_summary.as_deref(),
            if include_changes { &changes } else { &[] },
            &decisions,
            if include_references { &references } else { &[] },
            if include_findings { &findings } else { &[] },
            if include_tools { &tools } else { &[] },
            now,
        );

        if rendered.chars().count() <= MAX_CONTEXT_CHARS {
            return rendered;
        }

        // Drop order: tools -> references -> findings -> changes.
        // Decisions and session summary are never dropped.
        if include_tools {
            include_tools = false;
        } else if include_references {
            include_references = false;
        } else if include_findings {
            include_findings = false;
        } else if include_changes {
            include_changes = false;
        } else {
            return rendered;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn render_all(
    session_summary: Option<&str>,
    changes: &[Observation],
    decisions: &[Observation],
    references: &[Observation],
    findings: &[Observation],
    tools: &[ToolSummary],
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    if let Some(summary) = session_summary {
        out.push_str(&render_session(summary));
    }
    out.push_str(&render_section("Recent Changes", changes, now, false));
    out.push_str(&render_section("Active Decisions", decisions, now, false));
    out.push_str(&render_section("Reference Docs", references, now, false));
    out.push_str(&render_section("Recent Findings", findings, now, true));
    out.push_str(&render_tools(tools));
    out
}

#[cfg(test)]
fn make_observation(kind: crate::repo::Kind, content: &str, created_at: &str) -> Observation {
    Observation {
        id: 0,
        public_id: "0123456789abcdef".to_string(),
        project_fingerprint: "fp".to_string(),
        session_id: None,
        source: "test".to_string(),
        title: None,
        content: content.to_string(),
        kind,
        classification: None,
        embedding_model: None,
        embedding_version: None,
        embedded_at: None,
        created_at: created_at.to_string(),
        updated_at: created_at.to_string(),
        deleted_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::Kind;
    use chrono::Duration;

    #[test]
    fn test_relative_time_buckets() {
        let now = Utc::now();
        assert_eq!(relative_time(&now.to_rfc3339(), now), "just now");
        assert_eq!(relative_time(&(now - Duration::hours(1)).to_rfc3339(), now), "1 hour ago");
        assert_eq!(relative_time(&(now - Duration::days(1)).to_rfc3339(), now), "yesterday");
        assert_eq!(relative_time(&(now - Duration::days(10)).to_rfc3339(), now), "1 week ago");
        assert_eq!(relative_time(&(now - Duration::days(35)).to_rfc3339(), now), "5 weeks ago");
    }

    #[test]
    fn test_decisions_never_dropped() {
        let now = Utc::now();
        let decisions: Vec<Observation> = (0..MAX_DECISIONS)
            .map(|_| make_observation(Kind::Decision, &"x".repeat(MAX_CONTEXT_CHARS), &now.to_rfc3339()))
            .collect();
        let input = ContextInput {
            session_summary: None,
            changes: vec![make_observation(Kind::Change, "a change", &now.to_rfc3339())],
            decisions,
            references: vec![],
            findings: vec![],
            tools: vec![],
        };
        let rendered = assemble(&input, now);
        assert!(rendered.contains("## Active Decisions"));
        assert!(!rendered.contains("## Recent Changes")); // dropped to make room
    }

    #[test]
    fn test_session_summary_never_dropped() {
        let now = Utc::now();
        let decisions = vec![make_observation(Kind::Decision, &"x".repeat(MAX_CONTEXT_CHARS), &now.to_rfc3339())];
        let input = ContextInput {
            session_summary: Some("very important session context".to_string()),
            changes: vec![],
            decisions,
            references: vec![],
            findings: vec![],
            tools: vec![],
        };
        let rendered = assemble(&input, now);
        assert!(rendered.contains("## Session"));
    }

    #[test]
    fn test_fits_under_budget_keeps_everything() {
        let now = Utc::now();
        let input = ContextInput {
            session_summary: Some("working on auth".to_string()),
            changes: vec![make_observation(Kind::Change, "edited session.rs", &now.to_rfc3339())],
            decisions: vec![make_observation(Kind::Decision, "use JWT", &now.to_rfc3339())],
            references: vec![make_observation(Kind::Reference, "see RFC 7519", &now.to_rfc3339())],
            findings: vec![make_observation(Kind::Finding, "found a race", &now.to_rfc3339())],
            tools: vec![ToolSummary {
                name: "search".to_string(),
                server_name: None,
                description: Some("finds things".to_string()),
            }],
        };
        let rendered = assemble(&input, now);
        assert!(rendered.contains("## Session"));
        assert!(rendered.contains("## Recent Changes"));
        assert!(rendered.contains("## Active Decisions"));
        assert!(rendered.contains("## Reference Docs"));
        assert!(rendered.contains("## Recent Findings"));
        assert!(rendered.contains("## Available Tools"));
    }

    #[test]
    fn test_findings_carry_id_handle() {
        let now = Utc::now();
        let input = ContextInput {
            session_summary: None,
            changes: vec![],
            decisions: vec![],
            references: vec![],
            findings: vec![make_observation(Kind::Finding, "race in worker drain", &now.to_rfc3339())],
            tools: vec![],
        };
        let rendered = assemble(&input, now);
        assert!(rendered.contains("[01234567]"));
    }

    #[test]
    fn test_tools_section_respects_sub_budget() {
        let now = Utc::now();
        let tools: Vec<ToolSummary> = (0..50)
            .map(|i| ToolSummary {
                name: format!("tool_{i}"),
                server_name: Some("some_server".to_string()),
                description: Some("a moderately long description of what this tool does".to_string()),
            })
            .collect();
        let input = ContextInput {
            session_summary: None,
            changes: vec![],
            decisions: vec![],
            references: vec![],
            findings: vec![],
            tools,
        };
        let rendered = assemble(&input, now);
        let tools_section_start = rendered.find("## Available Tools").unwrap();
        assert!(rendered[tools_section_start..].len() <= TOOLS_SUB_BUDGET + "## Available Tools\n".len());
    }
}
