//! Admission filter: decides whether a summarized tool call is worth
//! persisting as an observation at all. Most tool calls are routine noise
//! (a `Read` of a file that was already read, an `ls`-equivalent `Bash`
//! call); admitting all of them would flood search results with chaff.

/// Content-length floor below which nothing is ever admitted, regardless
/// of tool type or score -- a one-word summary carries no retrievable
/// signal.
const MIN_CONTENT_LEN: usize = 8;

/// Minimum combined relevance score required to admit.
const ADMISSION_FLOOR: f64 = 0.35;

fn tool_type_weight(tool_name: &str) -> f64 {
    match tool_name {
        "Write" | "Edit" | "MultiEdit" => 0.4,
        "Bash" => 0.2,
        "Read" => 0.1,
        "Grep" | "Glob" => 0.15,
        _ if tool_name.starts_with("mcp__") => 0.3,
        _ => 0.2,
    }
}

fn length_bonus(content_len: usize) -> f64 {
    match content_len {
        0..=9 => 0.0,
        10..=200 => 0.2,
        201..=500 => 0.3,
        _ => 0.1,
    }
}

/// Keywords whose presence in a summary signals it describes a decision
/// or a non-trivial finding rather than routine activity.
const SIGNAL_KEYWORDS: &[&str] =
    &["fix", "bug", "error", "decide", "because", "workaround", "root cause", "refactor"];

fn keyword_bonus(content: &str) -> f64 {
    let lower = content.to_lowercase();
    if SIGNAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        0.2
    } else {
        0.0
    }
}

/// Extensions common enough in a tool-call summary to count as "a file
/// path is present" without pulling in a regex for this filter.
const PATH_EXTENSIONS: &[&str] =
    &[".rs", ".ts", ".tsx", ".js", ".jsx", ".py", ".go", ".rb", ".java", ".c", ".cpp", ".h", ".toml", ".json", ".yaml", ".yml", ".md", ".sql", ".sh"];

fn file_path_bonus(content: &str) -> f64 {
    let has_path = content.split_whitespace().any(|tok| tok.contains('/') || PATH_EXTENSIONS.iter().any(|ext| tok.ends_with(ext)));
    if has_path {
        0.15
    } else {
        0.0
    }
}

/// Noise patterns that sink a `Bash`/`Read`/`Grep`/`Glob` summary's score
/// regardless of other factors -- these tools are admitted only when they
/// clear this bar on top of the floor.
const NOISE_PATTERNS: &[&str] = &["ls ", "pwd", "cd ", "cat ", "echo "];

fn is_noise_command(tool_name: &str, content: &str) -> bool {
    matches!(tool_name, "Bash" | "Read" | "Grep" | "Glob")
        && NOISE_PATTERNS.iter().any(|p| content.contains(p))
}

/// Relevance score in `[0.0, 1.0]` combining tool-type weight, content
/// length, keyword signal, and file-path presence.
#[must_use]
pub fn score(tool_name: &str, content: &str) -> f64 {
    (tool_type_weight(tool_name) + length_bonus(content.len()) + keyword_bonus(content) + file_path_bonus(content)).min(1.0)
}

/// Whether a summarized tool call should be admitted as an observation.
#[must_use]
pub fn should_admit(tool_name: &str, content: &str) -> bool {
    if content.trim().len() < MIN_CONTENT_LEN {
        return false;
    }
    if is_noise_command(tool_name, content) {
        return false;
    }
    score(tool_name, content) >= ADMISSION_FLOOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_admitted() {
        assert!(should_admit("Edit", "Edited src/auth/session.rs to rotate refresh tokens"));
    }

    #[test]
    fn test_short_content_rejected() {
        assert!(!should_admit("Edit", "ok"));
    }

    #[test]
    fn test_noise_bash_command_rejected() {
        assert!(!should_admit("Bash", "Ran: ls -la"));
    }

    #[test]
    fn test_meaningful_bash_admitted() {
        assert!(should_admit("Bash", "Ran: cargo test -- --nocapture to reproduce the flaky failure"));
    }

    #[test]
    fn test_plain_read_of_short_path_rejected() {
        assert!(!should_admit("Read", "Read x.rs"));
    }
}
