//! File-exclusion patterns: paths that must never be captured in an
//! observation's content, regardless of what tool touched them.
//!
//! Patterns are a small, fixed set of glob shapes (`exact`, `prefix*`,
//! `*suffix`, `*contains*`) rather than full glob syntax -- this mirrors
//! the pattern-kind split laminark's security module uses for sensitive
//! files, reimplemented here against basenames rather than full paths.

#[derive(Clone, Copy)]
enum Pattern {
    Prefix(&'static str),
    Suffix(&'static str),
    Exact(&'static str),
}

const EXCLUDED_FILE_PATTERNS: &[Pattern] = &[
    Pattern::Prefix(".env"),
    Pattern::Prefix("credentials"),
    Pattern::Prefix("secrets"),
    Pattern::Suffix(".pem"),
    Pattern::Suffix(".key"),
    Pattern::Prefix("id_rsa"),
];

/// Whether a file path (as it appears in a tool's arguments) matches an
/// excluded pattern. Matches against the basename only, case-sensitively.
#[must_use]
pub fn is_excluded_file(path: &str) -> bool {
    let basename = path.rsplit(['/', '\\']).next().unwrap_or(path);
    EXCLUDED_FILE_PATTERNS.iter().any(|p| match p {
        Pattern::Prefix(p) => basename.starts_with(p),
        Pattern::Suffix(p) => basename.ends_with(p),
        Pattern::Exact(p) => basename == *p,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_files_excluded() {
        assert!(is_excluded_file(".env"));
        assert!(is_excluded_file(".env.production"));
        assert!(is_excluded_file("/home/user/project/.env.local"));
    }

    #[test]
    fn test_key_material_excluded() {
        assert!(is_excluded_file("server.pem"));
        assert!(is_excluded_file("private.key"));
        assert!(is_excluded_file("id_rsa"));
        assert!(is_excluded_file("id_rsa.pub"));
    }

    #[test]
    fn test_credentials_and_secrets_excluded() {
        assert!(is_excluded_file("credentials.json"));
        assert!(is_excluded_file("secrets.yaml"));
    }

    #[test]
    fn test_ordinary_source_file_not_excluded() {
        assert!(!is_excluded_file("src/main.rs"));
        assert!(!is_excluded_file("README.md"));
        assert!(!is_excluded_file("keystore_reader.rs"));
    }
}
