//! Error types for laminark.
//!
//! Uses thiserror for ergonomic error handling with proper error chain
//! propagation. Each variant maps to one of the error-kind policies a
//! caller (hook, RPC client, web UI) needs to branch on: invalid input,
//! not found, degraded capability, contention, transient, or fatal.

use thiserror::Error;

/// Top-level error for the crate.
#[derive(Error, Debug)]
pub enum LaminarkError {
    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("search error: {0}")]
    Search(#[from] SearchError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("migration {version} failed: {reason}")]
    Migration { version: u32, reason: String },

    #[error("row not found: {0}")]
    RowNotFound(String),

    #[error("database is locked")]
    Locked,

    #[error("vector search unavailable: {0}")]
    VectorDegraded(String),
}

/// Capture-pipeline errors. The hook never propagates these to its exit
/// code -- they are logged to stderr and the hook still exits 0.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("malformed hook payload: {0}")]
    MalformedPayload(String),

    #[error("unrecognized event name: {0}")]
    UnknownEvent(String),

    #[error("admission rejected: {0}")]
    NotAdmitted(String),
}

/// Search operation errors.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("query rejected after sanitization: {0}")]
    EmptyQuery(String),

    #[error("limit must be positive and bounded")]
    InvalidLimit,

    #[error("FTS5 query error: {0}")]
    Fts(String),

    #[error("vector search unavailable")]
    VectorUnavailable,
}

/// Embedding-subsystem errors. `embed()` itself never returns `Err` to its
/// callers (it returns `Option<Embedding>`); this type exists for the
/// provider-construction path (model load, remote endpoint config).
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("remote embedding request failed: {0}")]
    Remote(String),
}

pub type Result<T> = std::result::Result<T, LaminarkError>;
pub type DbResult<T> = std::result::Result<T, DbError>;
pub type CaptureResult<T> = std::result::Result<T, CaptureError>;
pub type SearchResult<T> = std::result::Result<T, SearchError>;
pub type EmbeddingResult<T> = std::result::Result<T, EmbeddingError>;

impl LaminarkError {
    /// Returns a machine-readable error code for structured RPC responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(e) => e.code(),
            Self::Capture(e) => e.code(),
            Self::Search(e) => e.code(),
            Self::Embedding(e) => e.code(),
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Whether an RPC caller can plausibly fix this by retrying with
    /// different input, as opposed to a server-side fault. Client-fixable
    /// errors go on the tool result's error channel (LLM-visible); the
    /// rest go on the protocol error channel.
    #[must_use]
    pub fn is_client_fixable(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::NotFound(_)
                | Self::Capture(CaptureError::MalformedPayload(_) | CaptureError::UnknownEvent(_) | CaptureError::NotAdmitted(_))
                | Self::Search(SearchError::EmptyQuery(_) | SearchError::InvalidLimit)
                | Self::Database(DbError::RowNotFound(_))
        )
    }
}

impl DbError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::Pool(_) => "POOL_ERROR",
            Self::Migration { .. } => "MIGRATION_ERROR",
            Self::RowNotFound(_) => "NOT_FOUND",
            Self::Locked => "DB_LOCKED",
            Self::VectorDegraded(_) => "VECTOR_DEGRADED",
        }
    }
}

impl CaptureError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            Self::UnknownEvent(_) => "UNKNOWN_EVENT",
            Self::NotAdmitted(_) => "NOT_ADMITTED",
        }
    }
}

impl SearchError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyQuery(_) => "EMPTY_QUERY",
            Self::InvalidLimit => "INVALID_LIMIT",
            Self::Fts(_) => "FTS_ERROR",
            Self::VectorUnavailable => "VECTOR_DEGRADED",
        }
    }
}

impl EmbeddingError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ModelLoad(_) => "MODEL_LOAD_ERROR",
            Self::Remote(_) => "REMOTE_EMBEDDING_ERROR",
        }
    }
}

// Conversion to rmcp protocol errors, so a server-fault `LaminarkError` can
// cross the `?` boundary in a tool handler. Client-fixable errors never
// reach this -- they're routed to `CallToolResult::error` instead, see
// `is_client_fixable`.
impl From<LaminarkError> for rmcp::ErrorData {
    fn from(err: LaminarkError) -> Self {
        rmcp::ErrorData::internal_error(err.to_string(), None)
    }
}
