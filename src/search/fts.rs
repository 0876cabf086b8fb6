//! Keyword search over `observations_fts` (porter + unicode61 tokenizer).
//!
//! User queries reach FTS5's `MATCH` operator verbatim unless sanitized
//! first -- FTS5 query syntax treats `"`, `*`, parentheses, brackets, `^`,
//! and braces as operators, and bare `AND`/`OR`/`NOT`/`NEAR` as keywords.
//! Passing a query through unsanitized lets a user's literal search text
//! (e.g. `"foo" OR bar*`) silently become a query-syntax expression instead
//! of a literal match.

use crate::db::Database;
use crate::error::{SearchError, SearchResult};
use crate::repo::observations::row_to_observation_pub;
use crate::repo::Observation;
use crate::types::{ProjectFingerprint, Score};
use rusqlite::params;

const STRIPPED_CHARS: &[char] = &['"', '*', '(', ')', '[', ']', '^', '{', '}'];
const OPERATOR_WORDS: &[&str] = &["AND", "OR", "NOT", "NEAR"];

/// Strips FTS5 operator syntax and pure-operator tokens from a user query,
/// returning the surviving literal tokens in order.
///
/// Returns an empty vec if every token was operator syntax -- the caller
/// must treat that as an empty result set without ever touching the
/// database, not as "match everything".
#[must_use]
pub fn sanitize(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|tok| tok.chars().filter(|c| !STRIPPED_CHARS.contains(c)).collect::<String>())
        .filter(|tok| !tok.is_empty())
        .filter(|tok| !OPERATOR_WORDS.contains(&tok.to_uppercase().as_str()))
        .collect()
}

/// Builds an FTS5 `MATCH` expression from sanitized tokens: each token
/// quoted as a literal phrase, joined by FTS5's implicit `AND`.
fn build_match_expr(tokens: &[String]) -> String {
    tokens.iter().map(|t| format!("\"{t}\"")).collect::<Vec<_>>().join(" ")
}

pub struct FtsHit {
    pub observation: Observation,
    pub score: Score,
}

/// Keyword search, scoped to one project. Returns an empty list (not an
/// error) when sanitization leaves no tokens.
///
/// # Errors
///
/// Returns `SearchError` if `limit` is zero, or the FTS query fails.
pub fn search_keyword(
    db: &Database,
    project_fingerprint: &ProjectFingerprint,
    query: &str,
    limit: usize,
) -> SearchResult<Vec<FtsHit>> {
    if limit == 0 {
        return Err(SearchError::InvalidLimit);
    }

    let tokens = sanitize(query);
    if tokens.is_empty() {
        return Ok(Vec::new());
    }
    let match_expr = build_match_expr(&tokens);

    let conn = db.conn().map_err(|e| SearchError::Fts(e.to_string()))?;
    let mut stmt = conn
        .prepare_cached(
            "SELECT o.id, o.public_id, o.project_fingerprint, o.session_id, o.source, o.title,
                    o.content, o.kind, o.classification, o.embedding_model, o.embedding_version,
                    o.embedded_at, o.created_at, o.updated_at, o.deleted_at,
                    bm25(observations_fts, 10.0, 1.0) AS rank
             FROM observations_fts
             JOIN observations o ON o.id = observations_fts.rowid
             WHERE observations_fts MATCH ?1
               AND o.project_fingerprint = ?2
               AND o.deleted_at IS NULL
             ORDER BY rank ASC
             LIMIT ?3",
        )
        .map_err(|e| SearchError::Fts(e.to_string()))?;

    let rows = stmt
        .query_map(params![match_expr, project_fingerprint.as_str(), limit as i64], |row| {
            let observation = row_to_observation_pub(row)?;
            // BM25 scores are negative (lower is more relevant). Fold into
            // a positive [0, 1) similarity so it composes with vector
            // cosine scores under the same fusion interface.
            let rank: f64 = row.get(15)?;
            let score = Score::new(1.0 / (1.0 + rank.abs()));
            Ok(FtsHit { observation, score })
        })
        .map_err(|e| SearchError::Fts(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SearchError::Fts(e.to_string()))?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::repo::observations::ObservationRepository;
    use crate::repo::{Kind, NewObservation};
    use std::sync::Arc;

    #[test]
    fn test_sanitize_strips_operator_syntax() {
        let tokens = sanitize("\"foo\" OR bar* (baz)");
        assert_eq!(tokens, vec!["foo".to_string(), "bar".to_string(), "baz".to_string()]);
    }

    #[test]
    fn test_sanitize_all_operators_yields_empty() {
        assert!(sanitize("AND OR NOT").is_empty());
        assert!(sanitize("\"\" ** ()").is_empty());
    }

    #[test]
    fn test_empty_query_short_circuits_without_hitting_db() {
        let db = Database::in_memory().unwrap();
        let fp = ProjectFingerprint("fp1".into());
        let hits = search_keyword(&db, &fp, "AND OR", 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_keyword_search_scoped_to_project() {
        let db = Arc::new(Database::in_memory().unwrap());
        let fp_a = ProjectFingerprint("a".into());
        let fp_b = ProjectFingerprint("b".into());
        let repo_a = ObservationRepository::new(Arc::clone(&db), fp_a.clone());
        let repo_b = ObservationRepository::new(Arc::clone(&db), fp_b.clone());

        repo_a
            .create(NewObservation {
                session_id: None,
                source: "hook:Edit".into(),
                title: None,
                content: "implement JWT refresh token rotation".into(),
                kind: Kind::Change,
            })
            .unwrap();
        repo_b
            .create(NewObservation {
                session_id: None,
                source: "hook:Edit".into(),
                title: None,
                content: "implement JWT refresh token rotation".into(),
                kind: Kind::Change,
            })
            .unwrap();

        let hits = search_keyword(&db, &fp_a, "JWT refresh", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].observation.project_fingerprint, "a");
    }

    #[test]
    fn test_zero_limit_rejected() {
        let db = Database::in_memory().unwrap();
        let fp = ProjectFingerprint("a".into());
        assert!(search_keyword(&db, &fp, "foo", 0).is_err());
    }
}
