//! The local HTTP projection: loopback-only, read-only JSON endpoints
//! mirroring repository reads, plus one `/events` SSE stream for live
//! updates. Port-resilient -- see [`run`].

use crate::db::Database;
use crate::error::LaminarkError;
use crate::repo::debug_paths::DebugPathRepository;
use crate::repo::observations::{ListFilter, ObservationRepository};
use crate::repo::sessions::SessionRepository;
use crate::repo::thought_branches::ThoughtBranchRepository;
use crate::repo::tool_registry::ToolRegistryRepository;
use crate::repo::{DebugPath, Kind, Observation, PathWaypoint, Session, ThoughtBranch, ToolRegistryEntry};
use crate::rpc::tools::{execute_graph_stats, GraphStatsInput, GraphStatsOutput};
use crate::types::ProjectFingerprint;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

const PORT_RETRY_ATTEMPTS: u16 = 5;
const EVENT_BUFFER: usize = 256;
const POLL_TICK: Duration = Duration::from_secs(5);

/// One committed observation, broadcast to `/events` subscribers. New rows
/// surface here within one poll tick of being written, independent of
/// whether they've been embedded yet.
#[derive(Debug, Clone, Serialize)]
pub struct ObservationEvent {
    pub id: i64,
    pub kind: Kind,
    pub title: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    db: Arc<Database>,
    fingerprint: ProjectFingerprint,
    events: broadcast::Sender<ObservationEvent>,
}

/// Binds to loopback starting at `start_port`, retrying the next port up
/// to `PORT_RETRY_ATTEMPTS` times on "address in use". If every attempt
/// fails, logs a warning and returns -- the web UI is non-essential, the
/// RPC server must not die because its port is taken.
pub async fn run(db: Arc<Database>, fingerprint: ProjectFingerprint, start_port: u16) {
    let (tx, _rx) = broadcast::channel(EVENT_BUFFER);
    let state = AppState { db: Arc::clone(&db), fingerprint: fingerprint.clone(), events: tx.clone() };

    let listener = match bind_with_retry(start_port).await {
        Some(listener) => listener,
        None => {
            warn!(attempts = PORT_RETRY_ATTEMPTS, "could not bind web server to any port, continuing without it");
            return;
        }
    };
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "web server listening");
    }

    tokio::spawn(poll_new_observations(db, fingerprint, tx));

    if let Err(e) = axum::serve(listener, build_router(state)).await {
        warn!(error = %e, "web server exited");
    }
}

async fn bind_with_retry(start_port: u16) -> Option<TcpListener> {
    for attempt in 0..PORT_RETRY_ATTEMPTS {
        let port = start_port + attempt;
        match TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => return Some(listener),
            Err(e) => debug!(port, error = %e, "web server port unavailable, trying next"),
        }
    }
    None
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/observations", get(list_observations))
        .route("/api/sessions/latest", get(latest_session))
        .route("/api/graph/stats", get(graph_stats))
        .route("/api/graph/branches/:id", get(get_branch))
        .route("/api/graph/paths/:id", get(get_debug_path))
        .route("/api/tools", get(list_tools))
        .route("/events", get(events))
        .with_state(state)
}

struct AppError(LaminarkError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LaminarkError::NotFound(_) => StatusCode::NOT_FOUND,
            LaminarkError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string(), "code": self.0.code() }))).into_response()
    }
}

/// Runs blocking repository work on a worker thread, same bridge pattern
/// as the RPC server's `spawn_tool`.
async fn call<T, F>(f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(AppError(e)),
        Err(e) => Err(AppError(LaminarkError::Config(format!("background task join failure: {e}")))),
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsQuery {
    kind: Option<String>,
    since: Option<String>,
    limit: Option<usize>,
}

async fn list_observations(State(state): State<AppState>, Query(q): Query<ObservationsQuery>) -> Result<Json<Vec<Observation>>, AppError> {
    let repo = ObservationRepository::new(Arc::clone(&state.db), state.fingerprint.clone());
    let filter = ListFilter {
        kind: q.kind.as_deref().and_then(|k| k.parse::<Kind>().ok()),
        since: q.since,
        limit: q.limit.unwrap_or(50).min(200),
        include_unclassified: true,
        ..Default::default()
    };
    let rows = call(move || repo.list(&filter).map_err(LaminarkError::Database)).await?;
    Ok(Json(rows))
}

async fn latest_session(State(state): State<AppState>) -> Result<Json<Option<Session>>, AppError> {
    let repo = SessionRepository::new(Arc::clone(&state.db), state.fingerprint.clone());
    let session = call(move || repo.get_latest().map_err(LaminarkError::Database)).await?;
    Ok(Json(session))
}

async fn graph_stats(State(state): State<AppState>) -> Result<Json<GraphStatsOutput>, AppError> {
    let db = Arc::clone(&state.db);
    let fp = state.fingerprint.clone();
    let stats = call(move || execute_graph_stats(&db, &fp, GraphStatsInput {})).await?;
    Ok(Json(stats))
}

#[derive(Debug, Serialize)]
struct BranchView {
    branch: ThoughtBranch,
    observation_ids: Vec<i64>,
}

async fn get_branch(State(state): State<AppState>, AxumPath(id): AxumPath<String>) -> Result<Json<BranchView>, AppError> {
    let db = Arc::clone(&state.db);
    let fp = state.fingerprint.clone();
    let view = call(move || {
        let repo = ThoughtBranchRepository::new(db, fp);
        let branch = repo
            .get_by_id(&id)
            .map_err(LaminarkError::Database)?
            .ok_or_else(|| LaminarkError::NotFound(format!("thought branch {id}")))?;
        let observation_ids = repo.observation_ids(&id).map_err(LaminarkError::Database)?;
        Ok(BranchView { branch, observation_ids })
    })
    .await?;
    Ok(Json(view))
}

#[derive(Debug, Serialize)]
struct DebugPathView {
    path: DebugPath,
    waypoints: Vec<PathWaypoint>,
}

async fn get_debug_path(State(state): State<AppState>, AxumPath(id): AxumPath<String>) -> Result<Json<DebugPathView>, AppError> {
    let db = Arc::clone(&state.db);
    let fp = state.fingerprint.clone();
    let view = call(move || {
        let repo = DebugPathRepository::new(db, fp);
        let path = repo
            .get_by_id(&id)
            .map_err(LaminarkError::Database)?
            .ok_or_else(|| LaminarkError::NotFound(format!("debug path {id}")))?;
        let waypoints = repo.waypoints(&id).map_err(LaminarkError::Database)?;
        Ok(DebugPathView { path, waypoints })
    })
    .await?;
    Ok(Json(view))
}

async fn list_tools(State(state): State<AppState>) -> Result<Json<Vec<ToolRegistryEntry>>, AppError> {
    let db = Arc::clone(&state.db);
    let fp = state.fingerprint.clone();
    let tools = call(move || {
        let repo = ToolRegistryRepository::new(db, fp);
        repo.get_available_for_session().map_err(LaminarkError::Database)
    })
    .await?;
    Ok(Json(tools))
}

/// SSE stream of newly committed observations, fed by [`poll_new_observations`]
/// rather than by a per-connection query.
async fn events(State(state): State<AppState>) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(|msg| match msg {
        Ok(event) => Event::default().json_data(&event).ok().map(Ok),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Polls for observations committed since the last tick and rebroadcasts
/// them. Runs on the same cadence as the embedding worker's tick, so a new
/// row surfaces within one tick of being written, whether or not it's been
/// embedded yet.
async fn poll_new_observations(db: Arc<Database>, fingerprint: ProjectFingerprint, tx: broadcast::Sender<ObservationEvent>) {
    let mut last_id = 0i64;
    let mut interval = tokio::time::interval(POLL_TICK);
    loop {
        interval.tick().await;
        let db = Arc::clone(&db);
        let fingerprint = fingerprint.clone();
        let result: Result<Vec<Observation>, tokio::task::JoinError> = tokio::task::spawn_blocking(move || {
            let repo = ObservationRepository::new(db, fingerprint);
            repo.list(&ListFilter { limit: 50, include_unclassified: true, ..Default::default() }).unwrap_or_default()
        })
        .await
        .map(Ok)
        .and_then(|r| r);
        let Ok(rows) = result else { continue };

        for obs in rows.into_iter().rev() {
            if obs.id > last_id {
                last_id = obs.id;
                let _ = tx.send(ObservationEvent { id: obs.id, kind: obs.kind, title: obs.title });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        let db = Arc::new(Database::in_memory().unwrap());
        let (tx, _rx) = broadcast::channel(EVENT_BUFFER);
        AppState { db, fingerprint: ProjectFingerprint("fp".into()), events: tx }
    }

    #[tokio::test]
    async fn test_list_observations_empty_project() {
        let state = state();
        let result = list_observations(State(state), Query(ObservationsQuery { kind: None, since: None, limit: None })).await;
        assert!(result.unwrap().0.is_empty());
    }

    #[tokio::test]
    async fn test_get_branch_not_found() {
        let state = state();
        let result = get_branch(State(state), AxumPath("missing".to_string())).await;
        assert!(result.is_err());
    }
}
