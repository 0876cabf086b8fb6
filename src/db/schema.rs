//! Schema migrations.
//!
//! Each migration is a forward-only, idempotent step identified by a
//! monotonic version number. Migrations that require the vector extension
//! are marked `requires_vector` so [`super::migrations::run`] can skip them
//! on a degraded-mode open and retry them on a later open where the
//! extension loads successfully.

/// One forward-only schema step.
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
    pub requires_vector: bool,
}

/// The ordered list of all migrations. Never reorder or remove an entry --
/// append new ones with the next version number.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "core_tables",
        requires_vector: false,
        sql: r#"
        CREATE TABLE IF NOT EXISTS observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            public_id TEXT NOT NULL UNIQUE,
            project_fingerprint TEXT NOT NULL,
            session_id TEXT,
            source TEXT NOT NULL,
            title TEXT,
            content TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'unclassified',
            classification TEXT,
            embedding_model TEXT,
            embedding_version TEXT,
            embedded_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_observations_project_created
            ON observations(project_fingerprint, created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_observations_classification
            ON observations(classification, project_fingerprint);

        CREATE INDEX IF NOT EXISTS idx_observations_session
            ON observations(session_id);

        CREATE VIRTUAL TABLE IF NOT EXISTS observations_fts USING fts5(
            title,
            content,
            content='observations',
            content_rowid='id',
            tokenize='porter unicode61'
        );

        CREATE TRIGGER IF NOT EXISTS observations_ai AFTER INSERT ON observations BEGIN
            INSERT INTO observations_fts(rowid, title, content)
            VALUES (new.id, new.title, new.content);
        END;

        CREATE TRIGGER IF NOT EXISTS observations_ad AFTER DELETE ON observations BEGIN
            INSERT INTO observations_fts(observations_fts, rowid, title, content)
            VALUES ('delete', old.id, old.title, old.content);
        END;

        CREATE TRIGGER IF NOT EXISTS observations_au AFTER UPDATE ON observations BEGIN
            INSERT INTO observations_fts(observations_fts, rowid, title, content)
            VALUES ('delete', old.id, old.title, old.content);
            INSERT INTO observations_fts(rowid, title, content)
            VALUES (new.id, new.title, new.content);
        END;

        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            project_fingerprint TEXT NOT NULL,
            started_at TEXT NOT NULL,
            ended_at TEXT,
            summary TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_project_started
            ON sessions(project_fingerprint, started_at DESC);

        CREATE TABLE IF NOT EXISTS tool_registry (
            name TEXT NOT NULL,
            tool_type TEXT NOT NULL,
            scope TEXT NOT NULL,
            source_origin TEXT NOT NULL,
            project_fingerprint TEXT,
            description TEXT,
            server_name TEXT,
            trigger_hints TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            usage_count INTEGER NOT NULL DEFAULT 0,
            last_used_at TEXT,
            discovered_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_tool_registry_identity
            ON tool_registry(name, COALESCE(project_fingerprint, ''));

        CREATE INDEX IF NOT EXISTS idx_tool_registry_scope
            ON tool_registry(scope, project_fingerprint);

        CREATE VIRTUAL TABLE IF NOT EXISTS tool_registry_fts USING fts5(
            name,
            description,
            content='',
            tokenize='porter unicode61'
        );

        CREATE TABLE IF NOT EXISTS tool_usage_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tool_name TEXT NOT NULL,
            session_id TEXT,
            project_fingerprint TEXT NOT NULL,
            success INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tool_usage_tool_created
            ON tool_usage_events(tool_name, created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_tool_usage_session
            ON tool_usage_events(session_id);

        CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_fingerprint TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_project_created
            ON notifications(project_fingerprint, created_at DESC);

        CREATE TABLE IF NOT EXISTS thought_branches (
            id TEXT PRIMARY KEY,
            project_fingerprint TEXT NOT NULL,
            session_id TEXT,
            label TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS branch_observations (
            branch_id TEXT NOT NULL REFERENCES thought_branches(id),
            observation_id INTEGER NOT NULL REFERENCES observations(id),
            position INTEGER NOT NULL,
            PRIMARY KEY (branch_id, observation_id)
        );

        CREATE TABLE IF NOT EXISTS debug_paths (
            id TEXT PRIMARY KEY,
            project_fingerprint TEXT NOT NULL,
            session_id TEXT,
            label TEXT NOT NULL,
            resolved INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS path_waypoints (
            debug_path_id TEXT NOT NULL REFERENCES debug_paths(id),
            position INTEGER NOT NULL,
            description TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (debug_path_id, position)
        );
        "#,
    },
    Migration {
        version: 2,
        name: "vector_indices",
        requires_vector: true,
        sql: r"
        CREATE VIRTUAL TABLE IF NOT EXISTS vec_observations USING vec0(
            embedding float[384] distance_metric=cosine
        );

        CREATE VIRTUAL TABLE IF NOT EXISTS vec_tool_registry USING vec0(
            embedding float[384] distance_metric=cosine
        );
        ",
    },
    Migration {
        version: 3,
        name: "tool_registry_embedding_tracking",
        requires_vector: false,
        sql: r"
        ALTER TABLE tool_registry ADD COLUMN embedding_model TEXT;
        ALTER TABLE tool_registry ADD COLUMN embedded_at TEXT;
        ",
    },
    Migration {
        version: 4,
        name: "tool_registry_fts_external_content",
        requires_vector: false,
        sql: r"
        DROP TABLE IF EXISTS tool_registry_fts;

        CREATE VIRTUAL TABLE tool_registry_fts USING fts5(
            name,
            description,
            content='tool_registry',
            content_rowid='rowid',
            tokenize='porter unicode61'
        );

        CREATE TRIGGER IF NOT EXISTS tool_registry_ai AFTER INSERT ON tool_registry BEGIN
            INSERT INTO tool_registry_fts(rowid, name, description)
            VALUES (new.rowid, new.name, new.description);
        END;

        CREATE TRIGGER IF NOT EXISTS tool_registry_ad AFTER DELETE ON tool_registry BEGIN
            INSERT INTO tool_registry_fts(tool_registry_fts, rowid, name, description)
            VALUES ('delete', old.rowid, old.name, old.description);
        END;

        CREATE TRIGGER IF NOT EXISTS tool_registry_au AFTER UPDATE ON tool_registry BEGIN
            INSERT INTO tool_registry_fts(tool_registry_fts, rowid, name, description)
            VALUES ('delete', old.rowid, old.name, old.description);
            INSERT INTO tool_registry_fts(rowid, name, description)
            VALUES (new.rowid, new.name, new.description);
        END;

        INSERT INTO tool_registry_fts(rowid, name, description)
        SELECT rowid, name, description FROM tool_registry;
        ",
    },
];
