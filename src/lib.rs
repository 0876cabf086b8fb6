//! laminark: persistent, project-scoped memory substrate for an AI coding
//! assistant.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   stdin JSON    ┌─────────────────────────────┐
//! │  hook process │ ───────────────▶│         capture             │
//! │ (laminark-hook)│                 │ filter → summarize → redact │
//! └───────────────┘                 │  → admit → commit           │
//!                                   └──────────────┬──────────────┘
//!                                                  │
//! ┌──────────────────────────────────────────────▼──────────────┐
//! │                         repo (per entity)                    │
//! │   observations · sessions · tool_registry · tool_usage ·     │
//! │   notifications · thought_branches · debug_paths             │
//! └───────────────┬───────────────────────────────┬──────────────┘
//!                 │                               │
//!         ┌───────▼────────┐             ┌────────▼────────┐
//!         │     search      │             │    embedding     │
//!         │ fts · vector ·  │◀────────────│  background      │
//!         │      rrf        │  vec tables │  5s tick worker  │
//!         └───────┬────────┘             └─────────────────┘
//!                 │
//!       ┌─────────▼──────────┐
//!       │   context assembler │
//!       └─────────┬──────────┘
//!                 │
//!     ┌───────────▼────────────┐      ┌───────────────────┐
//!     │ rpc (stdio, rmcp)       │      │  web (loopback,    │
//!     │ recall · save_memory ·  │      │  axum, read-only)  │
//!     │ discover_tools · ...    │      │                     │
//!     └────────────┬────────────┘      └─────────────────────┘
//!                  │
//!         ┌────────▼────────┐
//!         │  SQLite (WAL) +  │
//!         │  sqlite-vec ext  │
//!         └─────────────────┘
//! ```
//!
//! Everything above the database is wired together by `laminark-daemon`.
//! `laminark-hook` runs only the capture half, as a short-lived process
//! invoked once per assistant tool call.

pub mod capture;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod repo;
pub mod rpc;
pub mod search;
pub mod types;
pub mod web;

pub use error::{LaminarkError, Result};
pub use types::{Embedding, MatchType, ProjectFingerprint, Score, Scope};
