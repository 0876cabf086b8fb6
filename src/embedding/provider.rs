//! The embedding provider contract. `embed` never throws to its callers:
//! a model load failure, a timed-out remote request, or any other
//! failure all collapse to `None`, so the embedding worker's drain loop
//! never needs error-handling branches at the call site -- a missing
//! embedding is just "try again next tick".

use crate::types::Embedding;
use async_trait::async_trait;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds one piece of text. Returns `None` on any failure.
    async fn embed(&self, text: &str) -> Option<Embedding>;

    /// A short identifier recorded alongside every embedded row, e.g.
    /// `"local:all-MiniLM-L6-v2"` or `"remote:<endpoint-host>"`. Used to
    /// detect a model change that should trigger re-embedding.
    fn model_id(&self) -> &str;

    /// The version of this provider's embedding output, recorded
    /// alongside `model_id`. Bumped when the same `model_id` starts
    /// producing vectors that aren't comparable to previously stored ones
    /// (a model upgrade, a changed pooling/normalization step).
    fn model_version(&self) -> &str;
}
