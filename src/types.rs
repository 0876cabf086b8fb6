//! Type-safe newtypes for laminark.
//!
//! These newtypes provide compile-time safety and semantic clarity
//! for core domain concepts.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// Opaque, stable identifier for a project, derived from the canonicalized
/// project root path.
///
/// Every row that must stay scoped to a single project carries one of these.
/// It is never derived from anything the user supplies at query time --
/// only from the filesystem path the hook or daemon was started against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectFingerprint(pub String);

impl ProjectFingerprint {
    /// Derives a fingerprint from a project root path.
    ///
    /// The path is canonicalized first so that `.`, symlinks, and relative
    /// invocations of the hook all collapse to the same fingerprint for the
    /// same project.
    #[must_use]
    pub fn from_root(root: &Path) -> Self {
        let canonical = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string_lossy().as_bytes());
        let result = hasher.finalize();
        let hex: String = result[..8].iter().map(|b| format!("{b:02x}")).collect();
        Self(hex)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scope under which a tool-registry entry is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Global,
    Project,
    Plugin,
}

impl Scope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Project => "project",
            Self::Plugin => "plugin",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(Self::Global),
            "project" => Ok(Self::Project),
            "plugin" => Ok(Self::Plugin),
            other => Err(format!("unknown scope: {other}")),
        }
    }
}

/// Which retrieval leg produced a search hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Fts,
    Vector,
    Hybrid,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fts => "fts",
            Self::Vector => "vector",
            Self::Hybrid => "hybrid",
        };
        write!(f, "{s}")
    }
}

/// Relevance / fusion score in range `[0.0, 1.0]`.
///
/// Saturating constructor ensures scores never exceed bounds, making score
/// merging operations safe.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(f64);

impl Score {
    pub const ZERO: Self = Self(0.0);
    pub const MAX: Self = Self(1.0);

    #[must_use]
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    #[must_use]
    pub const fn new_unchecked(value: f64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn as_f64(self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self::new(self.0 + other.0)
    }

    #[must_use]
    pub fn weighted(self, weight: f64) -> Self {
        Self::new(self.0 * weight)
    }
}

impl Default for Score {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// A 384-dimensional, L2-normalized embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    pub const DIM: usize = 384;

    /// Builds an embedding, normalizing it to unit length.
    ///
    /// Returns `None` for a zero vector (normalization is undefined).
    #[must_use]
    pub fn normalized(values: Vec<f32>) -> Option<Self> {
        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm <= f32::EPSILON {
            return None;
        }
        Some(Self(values.into_iter().map(|v| v / norm).collect()))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Serializes to the little-endian `float[384]` blob layout `sqlite-vec` expects.
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}

// Compile-time assertions for thread safety.
#[cfg(test)]
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}

    assert_send_sync::<ProjectFingerprint>();
    assert_send_sync::<Score>();
    assert_send_sync::<Embedding>();
    assert_send_sync::<Scope>();
    assert_send_sync::<MatchType>();
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_saturation() {
        assert_eq!(Score::new(1.5).as_f64(), 1.0);
        assert_eq!(Score::new(-0.5).as_f64(), 0.0);
        assert_eq!(Score::new(0.5).as_f64(), 0.5);
    }

    #[test]
    fn test_score_merge() {
        let s1 = Score::new(0.6);
        let s2 = Score::new(0.7);
        assert_eq!(s1.merge(s2).as_f64(), 1.0);
    }

    #[test]
    fn test_fingerprint_stable_for_same_path() {
        let dir = std::env::temp_dir();
        let a = ProjectFingerprint::from_root(&dir);
        let b = ProjectFingerprint::from_root(&dir);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_differs_for_different_paths() {
        let a = ProjectFingerprint::from_root(Path::new("/tmp/project-a"));
        let b = ProjectFingerprint::from_root(Path::new("/tmp/project-b"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_scope_roundtrip() {
        for s in [Scope::Global, Scope::Project, Scope::Plugin] {
            let parsed: Scope = s.as_str().parse().unwrap();
            assert_eq!(parsed, s);
        }
    }

    #[test]
    fn test_embedding_normalized() {
        let e = Embedding::normalized(vec![3.0, 4.0]).unwrap();
        let norm: f32 = e.as_slice().iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_embedding_zero_vector_rejected() {
        assert!(Embedding::normalized(vec![0.0, 0.0]).is_none());
    }
}
