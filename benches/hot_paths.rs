//! Performance benchmarks for laminark hot paths.
//!
//! Measures the core operations that dominate runtime:
//! - FTS5 keyword search at different observation counts
//! - RRF fusion across keyword and vector legs
//! - Score arithmetic
//! - Observation insert throughput
//!
//! Run with: `cargo bench`
//! View reports: `open target/criterion/report/index.html`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use laminark::db::Database;
use laminark::repo::observations::ObservationRepository;
use laminark::repo::{Kind, NewObservation};
use laminark::search::{self, rrf};
use laminark::types::{ProjectFingerprint, Score};
use std::sync::Arc;

fn new_obs(content: String) -> NewObservation {
    NewObservation { session_id: None, source: "hook:Edit".to_string(), title: None, content, kind: Kind::Change }
}

fn seeded_repo(count: usize) -> (Arc<Database>, ObservationRepository, ProjectFingerprint) {
    let db = Arc::new(Database::in_memory().expect("failed to create database"));
    let fp = ProjectFingerprint("bench-project".to_string());
    let repo = ObservationRepository::new(Arc::clone(&db), fp.clone());

    for i in 0..count {
        let content = format!(
            "Investigated authentication flow in request handler {i}. \
             Found that token refresh races with session teardown."
        );
        repo.create(new_obs(content)).expect("failed to insert observation");
    }

    (db, repo, fp)
}

// ============================================================================
// FTS keyword search benchmarks
// ============================================================================

/// Benchmarks FTS5 keyword search at different observation counts.
fn bench_keyword_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyword_search");

    for count in [100, 1_000, 5_000] {
        let (db, _repo, fp) = seeded_repo(count);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(count), &(db, fp), |b, (db, fp)| {
            b.iter(|| black_box(search::keyword_search(db, fp, "authentication", 20)))
        });
    }

    group.finish();
}

/// Benchmarks keyword search with queries of varying term count.
fn bench_keyword_query_complexity(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyword_query_complexity");
    let (db, _repo, fp) = seeded_repo(1_000);

    let queries = [("single_term", "authentication"), ("two_terms", "token refresh"), ("phrase", "\"session teardown\"")];

    for (name, query) in queries {
        group.bench_with_input(BenchmarkId::new("query", name), &query, |b, query| {
            b.iter(|| black_box(search::keyword_search(&db, &fp, query, 20)))
        });
    }

    group.finish();
}

// ============================================================================
// RRF fusion benchmarks
// ============================================================================

/// Benchmarks reciprocal rank fusion at different candidate-list sizes.
///
/// This is the hot path `hybrid_search` calls after both legs return.
fn bench_rrf_fuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("rrf_fuse");

    for leg_size in [10, 50, 200] {
        let keyword_ids: Vec<i64> = (0..leg_size).collect();
        let vector_ids: Vec<i64> = (leg_size / 2..leg_size + leg_size / 2).collect();

        group.throughput(Throughput::Elements(leg_size as u64 * 2));
        group.bench_with_input(BenchmarkId::from_parameter(leg_size), &(keyword_ids, vector_ids), |b, (kw, vec)| {
            b.iter(|| black_box(rrf::fuse(&[kw.clone(), vec.clone()])))
        });
    }

    group.finish();
}

// ============================================================================
// Score benchmarks
// ============================================================================

/// Benchmarks score construction and clamping.
fn bench_score_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_operations");

    group.bench_function("new", |b| b.iter(|| Score::new(black_box(0.75))));

    group.bench_function("new_out_of_range", |b| b.iter(|| Score::new(black_box(1.8))));

    group.finish();
}

// ============================================================================
// Observation insert benchmarks
// ============================================================================

/// Benchmarks a single observation insert, the hot path the hook process
/// runs once per captured tool call.
fn bench_observation_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("observation_insert");

    group.throughput(Throughput::Elements(1));
    group.bench_function("single", |b| {
        let db = Arc::new(Database::in_memory().expect("failed to create database"));
        let fp = ProjectFingerprint("bench-project".to_string());
        let repo = ObservationRepository::new(db, fp);
        let mut i = 0usize;
        b.iter(|| {
            i += 1;
            black_box(repo.create(new_obs(format!("observation {i}"))))
        })
    });

    group.finish();
}

criterion_group!(search_benches, bench_keyword_search, bench_keyword_query_complexity, bench_rrf_fuse,);

criterion_group!(score_benches, bench_score_operations,);

criterion_group!(db_benches, bench_observation_insert,);

criterion_main!(search_benches, score_benches, db_benches);
