//! Per-tool semantic summary extraction.
//!
//! Turns a raw hook payload (`tool_name`, `tool_input`, `tool_response`)
//! into the short, human-readable `(title, content)` pair that actually
//! gets stored and indexed -- storing the raw JSON payload verbatim would
//! blow past admission's length buckets and bury the FTS index in
//! boilerplate keys every tool call repeats.

use serde_json::Value;

pub struct Summary {
    pub title: Option<String>,
    pub content: String,
}

fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

/// Builds a summary for one tool call. Never panics on a malformed or
/// partially-populated payload -- every field access degrades to a
/// placeholder rather than failing.
#[must_use]
pub fn summarize(tool_name: &str, tool_input: &Value, tool_response: &Value, is_error: bool) -> Summary {
    let content = match tool_name {
        "Edit" | "MultiEdit" => {
            let path = str_field(tool_input, "file_path").unwrap_or("<unknown file>");
            format!("Edited {path}")
        }
        "Write" => {
            let path = str_field(tool_input, "file_path").unwrap_or("<unknown file>");
            format!("Wrote {path}")
        }
        "Read" => {
            let path = str_field(tool_input, "file_path").unwrap_or("<unknown file>");
            format!("Read {path}")
        }
        "Bash" => {
            let cmd = str_field(tool_input, "command").unwrap_or("<unknown command>");
            format!("Ran: {cmd}")
        }
        "Grep" => {
            let pattern = str_field(tool_input, "pattern").unwrap_or("<unknown pattern>");
            format!("Searched for \"{pattern}\"")
        }
        "Glob" => {
            let pattern = str_field(tool_input, "pattern").unwrap_or("<unknown pattern>");
            format!("Listed files matching \"{pattern}\"")
        }
        other => format!("Called {other}"),
    };

    let content = if is_error {
        let message = str_field(tool_response, "error")
            .or_else(|| str_field(tool_response, "message"))
            .unwrap_or("unknown error");
        format!("{content} -- failed: {message}")
    } else {
        content
    };

    Summary { title: None, content }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_edit_summary() {
        let input = json!({"file_path": "src/auth.rs"});
        let summary = summarize("Edit", &input, &Value::Null, false);
        assert_eq!(summary.content, "Edited src/auth.rs");
    }

    #[test]
    fn test_bash_summary() {
        let input = json!({"command": "cargo test"});
        let summary = summarize("Bash", &input, &Value::Null, false);
        assert_eq!(summary.content, "Ran: cargo test");
    }

    #[test]
    fn test_failed_tool_includes_error() {
        let input = json!({"file_path": "x.rs"});
        let response = json!({"error": "permission denied"});
        let summary = summarize("Write", &input, &response, true);
        assert!(summary.content.contains("failed: permission denied"));
    }

    #[test]
    fn test_unknown_tool_falls_back() {
        let summary = summarize("SomeCustomTool", &Value::Null, &Value::Null, false);
        assert_eq!(summary.content, "Called SomeCustomTool");
    }
}
