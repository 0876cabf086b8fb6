//! Embedding subsystem: turns observation/tool-description text into
//! 384-dimensional vectors, and a background worker that keeps the
//! `vec_observations`/`vec_tool_registry` tables caught up without ever
//! blocking the capture path or the RPC event loop.

pub mod local;
pub mod provider;
pub mod remote;
pub mod worker;

pub use provider::EmbeddingProvider;
pub use worker::EmbeddingWorker;
