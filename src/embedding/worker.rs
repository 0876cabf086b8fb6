//! Background embedding worker: ticks every 5 seconds, drains a bounded
//! batch of unembedded observations and tool-registry descriptions, and
//! writes results into the `vec_*` virtual tables. Runs on its own tokio
//! task inside `laminark-daemon`; never shares a call stack with the RPC
//! event loop, so a slow embedding model never delays a `recall` response.

use crate::db::Database;
use crate::embedding::provider::EmbeddingProvider;
use crate::error::DbError;
use crate::repo::observations::ObservationRepository;
use crate::repo::tool_registry::ToolRegistryRepository;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const TICK: Duration = Duration::from_secs(5);
const OBSERVATION_BATCH: usize = 10;
const TOOL_DESCRIPTION_BATCH: usize = 5;

pub struct EmbeddingWorker {
    db: Arc<Database>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingWorker {
    #[must_use]
    pub fn new(db: Arc<Database>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { db, provider }
    }

    /// Runs the drain loop until `shutdown` resolves. Each tick is
    /// independent: a failure draining one batch never blocks or crashes
    /// the loop -- it's logged and retried next tick.
    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(TICK);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.drain_observations().await;
                    self.drain_tool_descriptions().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("embedding worker shutting down");
                        return;
                    }
                }
            }
        }
    }

    async fn drain_observations(&self) {
        let batch = match ObservationRepository::list_unembedded(&self.db, OBSERVATION_BATCH) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "failed to list unembedded observations");
                return;
            }
        };
        if batch.is_empty() {
            return;
        }
        debug!(count = batch.len(), "embedding observation batch");

        for obs in batch {
            let Some(embedding) = self.provider.embed(&obs.content).await else {
                continue;
            };
            if let Err(e) =
                write_observation_embedding(&self.db, obs.id, &embedding, self.provider.model_id(), self.provider.model_version())
            {
                warn!(observation_id = obs.id, error = %e, "failed to persist observation embedding");
            }
        }
    }

    async fn drain_tool_descriptions(&self) {
        let batch = match ToolRegistryRepository::list_unembedded(&self.db, TOOL_DESCRIPTION_BATCH) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "failed to list unembedded tool descriptions");
                return;
            }
        };
        if batch.is_empty() {
            return;
        }
        debug!(count = batch.len(), "embedding tool description batch");

        for entry in batch {
            let Some(description) = entry.description.as_deref() else { continue };
            let Some(embedding) = self.provider.embed(description).await else { continue };
            if let Err(e) = write_tool_embedding(
                &self.db,
                &entry.name,
                entry.project_fingerprint.as_deref(),
                &embedding,
                self.provider.model_id(),
            ) {
                warn!(tool = %entry.name, error = %e, "failed to persist tool description embedding");
            }
        }
    }
}

fn write_observation_embedding(
    db: &Database,
    observation_id: i64,
    embedding: &crate::types::Embedding,
    model_id: &str,
    model_version: &str,
) -> Result<(), DbError> {
    if db.has_vector_support() {
        let conn = db.conn()?;
        conn.execute(
            "INSERT INTO vec_observations(rowid, embedding) VALUES (?1, ?2)
             ON CONFLICT(rowid) DO UPDATE SET embedding = excluded.embedding",
            rusqlite::params![observation_id, embedding.to_le_bytes()],
        )?;
    }

    // embedded_at is stamped even in degraded mode: it still records that
    // this observation was attempted, so the worker doesn't retry it
    // forever once vector support is permanently unavailable.
    let conn = db.conn()?;
    conn.execute(
        "UPDATE observations SET embedding_model = ?1, embedding_version = ?2, embedded_at = ?3 WHERE id = ?4",
        rusqlite::params![model_id, model_version, crate::db::now_iso8601(), observation_id],
    )?;
    Ok(())
}

fn write_tool_embedding(
    db: &Database,
    name: &str,
    project_fingerprint: Option<&str>,
    embedding: &crate::types::Embedding,
    model_id: &str,
) -> Result<(), DbError> {
    if db.has_vector_support() {
        let conn = db.conn()?;
        let rowid: i64 = conn.query_row(
            "SELECT rowid FROM tool_registry WHERE name = ?1 AND COALESCE(project_fingerprint, '') = COALESCE(?2, '')",
            rusqlite::params![name, project_fingerprint],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO vec_tool_registry(rowid, embedding) VALUES (?1, ?2)
             ON CONFLICT(rowid) DO UPDATE SET embedding = excluded.embedding",
            rusqlite::params![rowid, embedding.to_le_bytes()],
        )?;
    }
    ToolRegistryRepository::mark_embedded(db, name, project_fingerprint, model_id)
}
