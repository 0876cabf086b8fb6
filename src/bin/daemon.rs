//! `laminark-daemon`: the long-lived process. Serves the MCP tool surface
//! on stdio, runs the embedding worker on its own tick, and optionally
//! serves the local read-only web UI. One process per project, started by
//! the host on session entry and left running.

use laminark::config::{Config, EmbeddingMode};
use laminark::db::Database;
use laminark::embedding::local::LocalProvider;
use laminark::embedding::provider::EmbeddingProvider;
use laminark::embedding::worker::EmbeddingWorker;
use laminark::rpc::server::LaminarkServer;
use laminark::types::ProjectFingerprint;
use laminark::web;
use rmcp::ServiceExt;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_WEB_PORT: u16 = 7761;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    init_logging(&config);

    let root = std::env::current_dir()?;
    let fingerprint = ProjectFingerprint::from_root(&root);

    std::fs::create_dir_all(&config.data_dir)?;
    let db = Arc::new(Database::open(&config.db_path())?);

    let embedding_provider = build_embedding_provider(&config).await;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker_handle = embedding_provider.clone().map(|provider| {
        let worker = EmbeddingWorker::new(Arc::clone(&db), provider);
        tokio::spawn(worker.run(shutdown_rx))
    });

    let web_handle = {
        let db = Arc::clone(&db);
        let fingerprint = fingerprint.clone();
        tokio::spawn(web::run(db, fingerprint, DEFAULT_WEB_PORT))
    };

    let server = LaminarkServer::new(Arc::clone(&db), fingerprint, embedding_provider);
    let service = server.serve(rmcp::transport::io::stdio()).await?;

    tokio::select! {
        result = service.waiting() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "MCP service loop exited with an error");
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining");
        }
    }

    let _ = shutdown_tx.send(true);
    if let Some(handle) = worker_handle {
        let _ = handle.await;
    }
    web_handle.abort();
    db.checkpoint();

    Ok(())
}

fn init_logging(config: &Config) {
    let directive = if config.debug { "laminark=debug" } else { "laminark=info" };
    let filter = EnvFilter::from_default_env().add_directive(directive.parse().unwrap_or_default());
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Builds the configured embedding provider. Falls back to no provider
/// (search stays keyword-only) if the local model fails to load or no
/// remote endpoint is configured -- a degraded embedding subsystem must
/// never stop the daemon from serving the rest of its tools.
async fn build_embedding_provider(config: &Config) -> Option<Arc<dyn EmbeddingProvider>> {
    match config.embedding_mode {
        EmbeddingMode::Local => {
            let cache_dir = config.model_cache_dir();
            match tokio::task::spawn_blocking(move || LocalProvider::new(cache_dir)).await {
                Ok(Ok(provider)) => Some(Arc::new(provider) as Arc<dyn EmbeddingProvider>),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "failed to load local embedding model, continuing without embeddings");
                    None
                }
                Err(e) => {
                    tracing::warn!(error = %e, "embedding model init task panicked");
                    None
                }
            }
        }
        EmbeddingMode::Remote => match &config.embedding_endpoint {
            Some(endpoint) => Some(Arc::new(laminark::embedding::remote::RemoteProvider::new(endpoint.clone())) as Arc<dyn EmbeddingProvider>),
            None => {
                tracing::warn!("embedding mode is remote but no endpoint configured, continuing without embeddings");
                None
            }
        },
    }
}

/// Resolves once either `ctrl_c` or, on unix, `SIGTERM` fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::warn!(error = %e, "could not install SIGTERM handler"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
