//! `laminark`: read/maintenance-only administration CLI for the memory
//! database. Never writes observations -- persisting memory is the hook's
//! job alone (see `src/bin/hook.rs`); this binary only reports on and
//! prunes what's already there.
//!
//! Usage:
//!   laminark stats
//!   laminark migrate
//!   laminark purge --before <rfc3339>

use clap::{Parser, Subcommand};
use laminark::config::Config;
use laminark::db::Database;
use laminark::repo::observations::ObservationRepository;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "laminark")]
#[command(about = "Administration CLI for the laminark memory database")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show counts across the whole database (all projects)
    Stats,

    /// Apply any pending migrations and report the current state
    Migrate,

    /// Hard-delete observations soft-deleted before a cutoff date
    Purge {
        /// RFC 3339 cutoff; soft-deletes older than this are removed
        #[arg(long)]
        before: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // CRITICAL: Log to stderr only, matching the hook and daemon binaries.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("laminark=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();
    std::fs::create_dir_all(&config.data_dir)?;
    let db = Arc::new(Database::open(&config.db_path())?);

    match cli.command {
        Commands::Stats => run_stats(&db),
        Commands::Migrate => run_migrate(&db),
        Commands::Purge { before } => run_purge(&db, &before),
    }
}

fn run_stats(db: &Arc<Database>) -> anyhow::Result<()> {
    let conn = db.conn()?;
    let observations: i64 = conn.query_row("SELECT COUNT(*) FROM observations WHERE deleted_at IS NULL", [], |r| r.get(0))?;
    let soft_deleted: i64 = conn.query_row("SELECT COUNT(*) FROM observations WHERE deleted_at IS NOT NULL", [], |r| r.get(0))?;
    let unembedded: i64 = conn.query_row(
        "SELECT COUNT(*) FROM observations WHERE embedded_at IS NULL AND deleted_at IS NULL",
        [],
        |r| r.get(0),
    )?;
    let sessions: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?;
    let projects: i64 = conn.query_row("SELECT COUNT(DISTINCT project_fingerprint) FROM observations", [], |r| r.get(0))?;
    let thought_branches: i64 = conn.query_row("SELECT COUNT(*) FROM thought_branches", [], |r| r.get(0))?;
    let debug_paths: i64 = conn.query_row("SELECT COUNT(*) FROM debug_paths", [], |r| r.get(0))?;

    let stats = serde_json::json!({
        "observations": observations,
        "soft_deleted": soft_deleted,
        "unembedded": unembedded,
        "sessions": sessions,
        "projects": projects,
        "thought_branches": thought_branches,
        "debug_paths": debug_paths,
        "vector_support": db.has_vector_support(),
    });
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn run_migrate(db: &Arc<Database>) -> anyhow::Result<()> {
    // `Database::open` already ran every pending migration on this
    // process's open -- this just reports what's on record.
    let conn = db.conn()?;
    let applied: i64 = conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))?;
    println!("{applied} migrations applied, vector support: {}", db.has_vector_support());
    Ok(())
}

fn run_purge(db: &Arc<Database>, before: &str) -> anyhow::Result<()> {
    let purged = ObservationRepository::purge_soft_deleted_before(db, before)?;
    println!("purged {purged} observation(s) soft-deleted before {before}");
    Ok(())
}
