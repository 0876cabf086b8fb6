//! Remote embedding provider: posts text to an HTTP endpoint returning a
//! JSON vector, for hosts that would rather not bundle a local model.
//! Opt-in via `LAMINARK_EMBEDDING_MODE=remote` + `LAMINARK_EMBEDDING_ENDPOINT`.

use crate::embedding::provider::EmbeddingProvider;
use crate::types::Embedding;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Wire-contract version of the embed-by-POST request/response shape
/// above, not the remote model's own version (which this provider has no
/// way to query).
const PROTOCOL_VERSION: &str = "1";

pub struct RemoteProvider {
    client: reqwest::Client,
    endpoint: String,
    model_id: String,
}

impl RemoteProvider {
    #[must_use]
    pub fn new(endpoint: String) -> Self {
        let model_id = format!("remote:{}", endpoint_host(&endpoint));
        Self {
            client: reqwest::Client::builder().timeout(std::time::Duration::from_secs(10)).build().unwrap_or_default(),
            endpoint,
            model_id,
        }
    }
}

fn endpoint_host(endpoint: &str) -> String {
    reqwest::Url::parse(endpoint).ok().and_then(|u| u.host_str().map(str::to_string)).unwrap_or_else(|| endpoint.to_string())
}

#[async_trait]
impl EmbeddingProvider for RemoteProvider {
    async fn embed(&self, text: &str) -> Option<Embedding> {
        let response = match self.client.post(&self.endpoint).json(&EmbedRequest { input: text }).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "remote embedding request failed");
                return None;
            }
        };
        let parsed = response_json(response).await?;
        Embedding::normalized(parsed.embedding)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn model_version(&self) -> &str {
        PROTOCOL_VERSION
    }
}

async fn response_json(response: reqwest::Response) -> Option<EmbedResponse> {
    match response.error_for_status() {
        Ok(response) => response.json::<EmbedResponse>().await.ok(),
        Err(e) => {
            warn!(error = %e, "remote embedding endpoint returned an error status");
            None
        }
    }
}
