//! Self-referential filter: a hook event caused by laminark's own RPC
//! tools must never be captured, or every `recall` call would write an
//! observation describing itself, and `recall` calls would show up as
//! "relevant" context for future `recall` calls.

/// Tool-name prefixes that identify a call into laminark's own MCP server.
pub const LAMINARK_PREFIXES: &[&str] = &["mcp__laminark__", "laminark_"];

#[must_use]
pub fn is_self_referential(tool_name: &str) -> bool {
    LAMINARK_PREFIXES.iter().any(|p| tool_name.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mcp_prefix_filtered() {
        assert!(is_self_referential("mcp__laminark__recall"));
    }

    #[test]
    fn test_cli_prefix_filtered() {
        assert!(is_self_referential("laminark_save_memory"));
    }

    #[test]
    fn test_ordinary_tool_not_filtered() {
        assert!(!is_self_referential("Edit"));
        assert!(!is_self_referential("mcp__other_server__search"));
    }
}
