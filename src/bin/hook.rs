//! `laminark-hook`: the short-lived hook entry point. One process per host
//! event, fed the event JSON on stdin. Must never print to stdout except
//! for `SessionStart` (the host treats that stdout as injected context)
//! and must always exit 0 -- a misbehaving hook must never break the
//! assistant's tool loop.

use laminark::capture::{self, HookPayload};
use laminark::config::Config;
use laminark::db::Database;
use laminark::repo::sessions::SessionRepository;
use laminark::rpc::tools::{self, RecallInput};
use laminark::types::ProjectFingerprint;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    let config = Config::load();
    init_logging(&config);

    let mut raw = String::new();
    if std::io::stdin().read_to_string(&mut raw).is_err() {
        return;
    }
    let Some(payload) = capture::parse_payload(&raw) else {
        return;
    };

    run(&config, &payload);
}

fn init_logging(config: &Config) {
    let directive = if config.debug { "laminark=debug" } else { "laminark=info" };
    let filter = EnvFilter::from_default_env().add_directive(directive.parse().unwrap_or_default());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn run(config: &Config, payload: &HookPayload) {
    let Some(event) = payload.hook_event_name.as_deref() else {
        return;
    };
    let Some(cwd) = payload.cwd.as_deref() else {
        tracing::debug!("hook payload missing cwd, dropping");
        return;
    };

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        tracing::warn!(error = %e, "could not create data directory");
        return;
    }
    let db = match Database::open(&config.db_path()) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::warn!(error = %e, "could not open database");
            return;
        }
    };

    let fingerprint = ProjectFingerprint::from_root(Path::new(cwd));

    match event {
        "SessionStart" => handle_session_start(&db, &fingerprint, payload.session_id.as_deref()),
        "SessionEnd" | "Stop" => handle_session_end(&db, &fingerprint, payload.session_id.as_deref()),
        "PostToolUse" | "PostToolUseFailure" => {
            capture::process(&db, payload, &config.privacy.additional_patterns);
        }
        other => tracing::debug!(event = other, "unrecognized hook event, ignoring"),
    }
}

/// Opens (or resumes) the session, then prints the bounded context bundle
/// to stdout -- the one event for which stdout is the host's injected
/// context channel rather than a log.
fn handle_session_start(db: &Arc<Database>, fingerprint: &ProjectFingerprint, session_id: Option<&str>) {
    if let Some(id) = session_id {
        let sessions = SessionRepository::new(Arc::clone(db), fingerprint.clone());
        if let Err(e) = sessions.create(id) {
            tracing::warn!(error = %e, "could not open session");
        }
    }

    let input = RecallInput { query: None, kind: None, since: None, limit: None };
    match tools::execute_recall(db, fingerprint, input, None) {
        Ok(output) => println!("{}", output.text),
        Err(e) => tracing::warn!(error = %e, "could not assemble session-start context"),
    }
}

/// Ends the active session, if one with this id is still open. Writes
/// nothing to stdout.
fn handle_session_end(db: &Arc<Database>, fingerprint: &ProjectFingerprint, session_id: Option<&str>) {
    let Some(id) = session_id else { return };
    let sessions = SessionRepository::new(Arc::clone(db), fingerprint.clone());
    if let Err(e) = sessions.end(id, None) {
        tracing::warn!(error = %e, "could not end session");
    }
}
