//! Search: keyword (FTS5/BM25), vector (KNN), and hybrid fusion (RRF).
//!
//! All three entry points are project-scoped and bounded by an explicit
//! `limit`; none of them can return a row from another project or an
//! unbounded result set.

pub mod fts;
pub mod rrf;
pub mod vector;

use crate::db::Database;
use crate::error::SearchResult;
use crate::repo::Observation;
use crate::types::{Embedding, MatchType, ProjectFingerprint, Score};

pub struct SearchHit {
    pub observation: Observation,
    pub score: Score,
    pub match_type: MatchType,
}

/// Plain keyword search. See [`fts::search_keyword`].
///
/// # Errors
///
/// Returns `SearchError` if `limit` is zero or the FTS query fails.
pub fn keyword_search(
    db: &Database,
    project_fingerprint: &ProjectFingerprint,
    query: &str,
    limit: usize,
) -> SearchResult<Vec<SearchHit>> {
    let hits = fts::search_keyword(db, project_fingerprint, query, limit)?;
    Ok(hits
        .into_iter()
        .map(|h| SearchHit { observation: h.observation, score: h.score, match_type: MatchType::Fts })
        .collect())
}

/// Plain vector search. See [`vector::search_vector`].
///
/// # Errors
///
/// Returns `SearchError` if `limit` is zero.
pub fn vector_search(
    db: &Database,
    project_fingerprint: &ProjectFingerprint,
    query_embedding: &Embedding,
    limit: usize,
) -> SearchResult<Vec<SearchHit>> {
    let hits = vector::search_vector(db, project_fingerprint, query_embedding, limit)?;
    Ok(hits
        .into_iter()
        .map(|h| SearchHit { observation: h.observation, score: h.score, match_type: MatchType::Vector })
        .collect())
}

/// Fuses keyword and vector legs with reciprocal rank fusion.
///
/// Each leg is queried for up to `2 * limit` candidates before fusion, so
/// the final top-`limit` list isn't starved by one leg returning mostly
/// duplicates of the other. When the vector extension is unavailable (or
/// no query embedding is supplied), this degrades to FTS-only results
/// tagged `MatchType::Fts` -- it never errors on a missing vector leg.
///
/// # Errors
///
/// Returns `SearchError` if `limit` is zero or the FTS query fails.
pub fn hybrid_search(
    db: &Database,
    project_fingerprint: &ProjectFingerprint,
    query: &str,
    query_embedding: Option<&Embedding>,
    limit: usize,
) -> SearchResult<Vec<SearchHit>> {
    if limit == 0 {
        return Err(crate::error::SearchError::InvalidLimit);
    }
    let leg_limit = limit * 2;

    let fts_hits = fts::search_keyword(db, project_fingerprint, query, leg_limit)?;
    let vector_hits = match query_embedding {
        Some(embedding) if db.has_vector_support() => {
            vector::search_vector(db, project_fingerprint, embedding, leg_limit)?
        }
        _ => Vec::new(),
    };

    if vector_hits.is_empty() {
        return Ok(fts_hits
            .into_iter()
            .take(limit)
            .map(|h| SearchHit { observation: h.observation, score: h.score, match_type: MatchType::Fts })
            .collect());
    }

    let fts_ids: Vec<i64> = fts_hits.iter().map(|h| h.observation.id).collect();
    let vector_ids: Vec<i64> = vector_hits.iter().map(|h| h.observation.id).collect();
    let fused_ids = rrf::fuse(&[fts_ids.clone(), vector_ids.clone()]);

    let fts_set: std::collections::HashSet<i64> = fts_ids.into_iter().collect();
    let vector_set: std::collections::HashSet<i64> = vector_ids.into_iter().collect();

    let mut by_id: std::collections::HashMap<i64, Observation> = std::collections::HashMap::new();
    for hit in fts_hits {
        by_id.entry(hit.observation.id).or_insert(hit.observation);
    }
    for hit in vector_hits {
        by_id.entry(hit.observation.id).or_insert(hit.observation);
    }

    let results = fused_ids
        .into_iter()
        .take(limit)
        .filter_map(|(id, fused_score)| {
            let observation = by_id.remove(&id)?;
            let match_type = match (fts_set.contains(&id), vector_set.contains(&id)) {
                (true, true) => MatchType::Hybrid,
                (true, false) => MatchType::Fts,
                (false, true) => MatchType::Vector,
                (false, false) => MatchType::Hybrid, // unreachable: id came from one of the two sets
            };
            Some(SearchHit { observation, score: Score::new(fused_score), match_type })
        })
        .collect();

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::repo::observations::ObservationRepository;
    use crate::repo::{Kind, NewObservation};
    use std::sync::Arc;

    #[test]
    fn test_hybrid_falls_back_to_fts_without_vector_support() {
        let db = Arc::new(Database::in_memory().unwrap());
        let fp = ProjectFingerprint("a".into());
        let repo = ObservationRepository::new(Arc::clone(&db), fp.clone());
        repo.create(NewObservation {
            session_id: None,
            source: "hook:Edit".into(),
            title: None,
            content: "fix flaky checkout test".into(),
            kind: Kind::Change,
        })
        .unwrap();

        // No query embedding supplied -- must degrade to FTS-only and tag
        // results accordingly, never error.
        let hits = hybrid_search(&db, &fp, "flaky checkout", None, 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].match_type, MatchType::Fts);
    }

    #[test]
    fn test_hybrid_zero_limit_rejected() {
        let db = Database::in_memory().unwrap();
        let fp = ProjectFingerprint("a".into());
        assert!(hybrid_search(&db, &fp, "x", None, 0).is_err());
    }
}
