//! Local embedding provider backed by `fastembed`'s MiniLM sentence model.
//! Runs entirely on-box -- no network call, no remote dependency -- which
//! is why it's the default.

use crate::embedding::provider::EmbeddingProvider;
use crate::types::Embedding;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

const MODEL_ID: &str = "local:all-MiniLM-L6-v2";
const MODEL_VERSION: &str = "1";

pub struct LocalProvider {
    model: Mutex<TextEmbedding>,
}

impl LocalProvider {
    /// Loads the MiniLM model into `cache_dir`, downloading it on first
    /// use if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be initialized.
    pub fn new(cache_dir: PathBuf) -> anyhow::Result<Self> {
        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_cache_dir(cache_dir);
        let model = TextEmbedding::try_new(options)?;
        Ok(Self { model: Mutex::new(model) })
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    async fn embed(&self, text: &str) -> Option<Embedding> {
        let text = text.to_string();
        let Ok(mut model) = self.model.lock() else {
            warn!("local embedding model mutex poisoned");
            return None;
        };
        let result = model.embed(vec![text], None).ok()?;
        let vector = result.into_iter().next()?;
        Embedding::normalized(vector)
    }

    fn model_id(&self) -> &str {
        MODEL_ID
    }

    fn model_version(&self) -> &str {
        MODEL_VERSION
    }
}
