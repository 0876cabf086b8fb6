//! Repositories: one per entity, each auto-scoped to a single project
//! fingerprint. No repository exposes an API that can return a row from a
//! different project -- every statement carries the fingerprint as a bound
//! parameter, never as an application-level filter.

pub mod debug_paths;
pub mod notifications;
pub mod observations;
pub mod sessions;
pub mod thought_branches;
pub mod tool_registry;
pub mod tool_usage;

use serde::{Deserialize, Serialize};

/// Semantic category of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Change,
    Decision,
    Finding,
    Reference,
    Unclassified,
}

impl Kind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Change => "change",
            Self::Decision => "decision",
            Self::Finding => "finding",
            Self::Reference => "reference",
            Self::Unclassified => "unclassified",
        }
    }
}

impl std::str::FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "change" => Ok(Self::Change),
            "decision" => Ok(Self::Decision),
            "finding" => Ok(Self::Finding),
            "reference" => Ok(Self::Reference),
            "unclassified" => Ok(Self::Unclassified),
            other => Err(format!("unknown kind: {other}")),
        }
    }
}

/// Pipeline verdict: discovery vs. noise. Distinct from `Kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Discovery,
    Noise,
}

impl Classification {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Noise => "noise",
        }
    }
}

impl std::str::FromStr for Classification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discovery" => Ok(Self::Discovery),
            "noise" => Ok(Self::Noise),
            other => Err(format!("unknown classification: {other}")),
        }
    }
}

/// The atomic memory record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Stable surrogate rowid (stable across vacuum; FTS content-rowid).
    pub id: i64,
    pub public_id: String,
    pub project_fingerprint: String,
    pub session_id: Option<String>,
    pub source: String,
    pub title: Option<String>,
    pub content: String,
    pub kind: Kind,
    pub classification: Option<Classification>,
    pub embedding_model: Option<String>,
    pub embedding_version: Option<String>,
    pub embedded_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

/// Input to create a new observation.
#[derive(Debug, Clone)]
pub struct NewObservation {
    pub session_id: Option<String>,
    pub source: String,
    pub title: Option<String>,
    pub content: String,
    pub kind: Kind,
}

/// Mutable-field patch for an existing observation. `None` fields are left
/// unchanged; project fingerprint is never a patchable field.
#[derive(Debug, Clone, Default)]
pub struct ObservationPatch {
    pub kind: Option<Kind>,
    pub classification: Option<Classification>,
    pub embedding_model: Option<String>,
    pub embedding_version: Option<String>,
    pub embedded_at: Option<String>,
}

/// A bounded host interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub project_fingerprint: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub summary: Option<String>,
}

/// One row per discoverable tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRegistryEntry {
    pub name: String,
    pub tool_type: String,
    pub scope: crate::types::Scope,
    pub source_origin: String,
    pub project_fingerprint: Option<String>,
    pub description: Option<String>,
    pub server_name: Option<String>,
    pub trigger_hints: Option<String>,
    pub status: String,
    pub usage_count: i64,
    pub last_used_at: Option<String>,
    pub discovered_at: String,
    pub updated_at: String,
}

/// Defaults used when a tool is seen for the first time.
#[derive(Debug, Clone)]
pub struct ToolRegistryDefaults {
    pub tool_type: String,
    pub scope: crate::types::Scope,
    pub source_origin: String,
    pub project_fingerprint: Option<String>,
    pub description: Option<String>,
    pub server_name: Option<String>,
    pub trigger_hints: Option<String>,
}

/// One row per tool invocation. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUsageEvent {
    pub id: i64,
    pub tool_name: String,
    pub session_id: Option<String>,
    pub project_fingerprint: String,
    pub success: bool,
    pub created_at: String,
}

/// An operator-visible suggestion or status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub project_fingerprint: String,
    pub message: String,
    pub created_at: String,
}

/// A detected work unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtBranch {
    pub id: String,
    pub project_fingerprint: String,
    pub session_id: Option<String>,
    pub label: String,
    pub created_at: String,
}

/// An investigation arc.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugPath {
    pub id: String,
    pub project_fingerprint: String,
    pub session_id: Option<String>,
    pub label: String,
    pub resolved: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathWaypoint {
    pub debug_path_id: String,
    pub position: i64,
    pub description: String,
    pub created_at: String,
}
