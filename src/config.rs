//! Configuration: environment variables, optional JSON config file, and
//! default directory resolution.
//!
//! Resolution order for any setting that has both an env var and a config
//! file key: env var wins. This mirrors how the hook and daemon are meant
//! to be configured identically without requiring the short-lived hook
//! process to parse a config file on every invocation when an env var is
//! already enough.

use serde::Deserialize;
use std::path::PathBuf;

const ENV_DEBUG: &str = "LAMINARK_DEBUG";
const ENV_DATA_DIR: &str = "LAMINARK_DATA_DIR";
const ENV_EMBEDDING_MODE: &str = "LAMINARK_EMBEDDING_MODE";
const ENV_EMBEDDING_ENDPOINT: &str = "LAMINARK_EMBEDDING_ENDPOINT";

/// Which embedding backend the embedding worker should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingMode {
    #[default]
    Local,
    Remote,
}

impl std::str::FromStr for EmbeddingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(format!("unknown embedding mode: {other}")),
        }
    }
}

/// Privacy-related overrides loadable from the JSON config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyConfig {
    #[serde(default)]
    pub additional_patterns: Vec<String>,
    #[serde(default)]
    pub excluded_files: Vec<String>,
}

/// The on-disk JSON config file shape, `<data_dir>/config.json`. Every
/// field is optional -- a missing or absent file is equivalent to all
/// defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub privacy: PrivacyConfig,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub debug: bool,
    pub data_dir: PathBuf,
    pub embedding_mode: EmbeddingMode,
    pub embedding_endpoint: Option<String>,
    pub privacy: PrivacyConfig,
}

impl Config {
    /// Resolves configuration from the environment and, if present, a
    /// `config.json` under the resolved data directory.
    #[must_use]
    pub fn load() -> Self {
        let data_dir = data_dir();
        let file = load_file_config(&data_dir);

        let debug = std::env::var(ENV_DEBUG).map(|v| v == "1" || v == "true").unwrap_or(file.debug);
        let embedding_mode = std::env::var(ENV_EMBEDDING_MODE)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        let embedding_endpoint = std::env::var(ENV_EMBEDDING_ENDPOINT).ok();

        Self {
            debug,
            data_dir,
            embedding_mode,
            embedding_endpoint,
            privacy: file.privacy,
        }
    }

    /// The SQLite database file path for this data directory.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("laminark.db")
    }

    /// Directory the embedding worker caches its local model in.
    #[must_use]
    pub fn model_cache_dir(&self) -> PathBuf {
        self.data_dir.join("models")
    }
}

/// `~/.local/share/laminark` (or platform equivalent via `dirs`), overridable
/// with `LAMINARK_DATA_DIR`.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        return PathBuf::from(dir);
    }
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("/tmp")).join("laminark")
}

fn load_file_config(data_dir: &std::path::Path) -> FileConfig {
    let path = data_dir.join("config.json");
    let Ok(contents) = std::fs::read_to_string(path) else {
        return FileConfig::default();
    };
    serde_json::from_str(&contents).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_mode_roundtrip() {
        assert_eq!("local".parse::<EmbeddingMode>().unwrap(), EmbeddingMode::Local);
        assert_eq!("REMOTE".parse::<EmbeddingMode>().unwrap(), EmbeddingMode::Remote);
        assert!("bogus".parse::<EmbeddingMode>().is_err());
    }

    #[test]
    fn test_missing_config_file_yields_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = load_file_config(dir.path());
        assert!(!cfg.debug);
        assert!(cfg.privacy.additional_patterns.is_empty());
    }

    #[test]
    fn test_config_file_parses() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"debug": true, "privacy": {"excludedFiles": ["*.pem"]}}"#,
        )
        .unwrap();
        let cfg = load_file_config(dir.path());
        assert!(cfg.debug);
        assert_eq!(cfg.privacy.excluded_files, vec!["*.pem".to_string()]);
    }
}
