//! The `LaminarkServer` MCP handler: one project fingerprint, five tools,
//! a response-truncation and timing middleware wrapped around the
//! generated tool router.

use crate::db::Database;
use crate::embedding::provider::EmbeddingProvider;
use crate::rpc::tools as rpc_tools;
use crate::types::{Embedding, ProjectFingerprint};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::tool::ToolCallContext;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParams, ProtocolVersion, RawContent, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{tool, tool_router, RoleServer, ServerHandler};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Same ceiling the teacher's MCP server applies before a response would
/// blow an LLM client's context window.
const MAX_RESPONSE_BYTES: usize = 512 * 1024;

fn truncate_response(mut text: String) -> String {
    if text.len() <= MAX_RESPONSE_BYTES {
        return text;
    }
    let original_len = text.len();
    let search_region = &text[..MAX_RESPONSE_BYTES];
    let cut_point = search_region.rfind(',').or_else(|| search_region.rfind('\n')).unwrap_or(MAX_RESPONSE_BYTES);
    let safe_cut = text.floor_char_boundary(cut_point + 1);
    text.truncate(safe_cut);
    text.push_str(&format!("...\n[TRUNCATED: response exceeded {original_len} bytes, showing first {safe_cut}]"));
    text
}

fn truncate_call_tool_result(mut result: CallToolResult) -> CallToolResult {
    for content in &mut result.content {
        if let RawContent::Text(ref mut text) = content.raw {
            if text.text.len() > MAX_RESPONSE_BYTES {
                text.text = truncate_response(std::mem::take(&mut text.text));
            }
        }
    }
    result
}

/// Runs a blocking repository/search call on a worker thread and
/// classifies the result: client-fixable errors surface on the tool's
/// own error channel (LLM-visible, worth a retry), everything else goes
/// to the protocol error channel.
async fn spawn_tool<T, F>(f: F) -> Result<CallToolResult, rmcp::ErrorData>
where
    T: Serialize + Send + 'static,
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(output)) => {
            let json = serde_json::to_string(&output).map_err(|e| rmcp::ErrorData::internal_error(e.to_string(), None))?;
            Ok(CallToolResult::success(vec![Content::text(json)]))
        }
        Ok(Err(e)) => {
            if e.is_client_fixable() {
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            } else {
                Err(e.into())
            }
        }
        Err(e) => Err(rmcp::ErrorData::internal_error(e.to_string(), None)),
    }
}

#[derive(Clone)]
pub struct LaminarkServer {
    db: Arc<Database>,
    project_fingerprint: ProjectFingerprint,
    embedding: Option<Arc<dyn EmbeddingProvider>>,
    tool_router: ToolRouter<LaminarkServer>,
}

impl LaminarkServer {
    /// Binds a server to one project for its whole process lifetime --
    /// unlike a dynamic multi-workspace server, there is no tool that
    /// rebinds the fingerprint at runtime.
    #[must_use]
    pub fn new(db: Arc<Database>, project_fingerprint: ProjectFingerprint, embedding: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self { db, project_fingerprint, embedding, tool_router: Self::tool_router() }
    }

    async fn embed_query(&self, query: &str) -> Option<Embedding> {
        match &self.embedding {
            Some(provider) => provider.embed(query).await,
            None => None,
        }
    }
}

#[tool_router]
impl LaminarkServer {
    #[tool(
        description = "Recall project memory: with a query, runs hybrid keyword+vector search over past observations; without one, returns the bounded session-start context bundle (recent changes, active decisions, references, findings, ranked tools).",
        annotations(title = "Recall Memory", read_only_hint = true, destructive_hint = false, idempotent_hint = true, open_world_hint = false)
    )]
    async fn recall(&self, Parameters(params): Parameters<rpc_tools::RecallInput>) -> Result<CallToolResult, rmcp::ErrorData> {
        let embedding = match params.query.as_deref() {
            Some(q) if !q.trim().is_empty() => self.embed_query(q).await,
            _ => None,
        };
        let db = Arc::clone(&self.db);
        let fp = self.project_fingerprint.clone();
        spawn_tool(move || rpc_tools::execute_recall(&db, &fp, params, embedding.as_ref())).await
    }

    #[tool(
        description = "Save a memory explicitly. Bypasses admission filtering -- an explicit call is always persisted as a discovery, never discarded as noise.",
        annotations(title = "Save Memory", read_only_hint = false, destructive_hint = false, idempotent_hint = false, open_world_hint = false)
    )]
    async fn save_memory(&self, Parameters(params): Parameters<rpc_tools::SaveMemoryInput>) -> Result<CallToolResult, rmcp::ErrorData> {
        let db = Arc::clone(&self.db);
        let fp = self.project_fingerprint.clone();
        spawn_tool(move || rpc_tools::execute_save_memory(&db, &fp, params)).await
    }

    #[tool(
        description = "Discover available tools (MCP tools/servers, skills, slash commands) matching a keyword, scope-filtered to this project and deduped by server.",
        annotations(title = "Discover Tools", read_only_hint = true, destructive_hint = false, idempotent_hint = true, open_world_hint = false)
    )]
    async fn discover_tools(&self, Parameters(params): Parameters<rpc_tools::DiscoverToolsInput>) -> Result<CallToolResult, rmcp::ErrorData> {
        let embedding = self.embed_query(&params.query).await;
        let db = Arc::clone(&self.db);
        let fp = self.project_fingerprint.clone();
        spawn_tool(move || rpc_tools::execute_discover_tools(&db, &fp, params, embedding.as_ref())).await
    }

    #[tool(
        description = "Aggregate counts over this project's knowledge graph: observations, thought branches, debug paths (open and resolved).",
        annotations(title = "Graph Stats", read_only_hint = true, destructive_hint = false, idempotent_hint = true, open_world_hint = false)
    )]
    async fn graph_stats(&self, Parameters(params): Parameters<rpc_tools::GraphStatsInput>) -> Result<CallToolResult, rmcp::ErrorData> {
        let db = Arc::clone(&self.db);
        let fp = self.project_fingerprint.clone();
        spawn_tool(move || rpc_tools::execute_graph_stats(&db, &fp, params)).await
    }

    #[tool(
        description = "Resolve one thought branch (its ordered observations) or one debug path (its ordered waypoints and resolved status). Exactly one of branch_id/debug_path_id is required.",
        annotations(title = "Query Graph", read_only_hint = true, destructive_hint = false, idempotent_hint = true, open_world_hint = false)
    )]
    async fn query_graph(&self, Parameters(params): Parameters<rpc_tools::QueryGraphInput>) -> Result<CallToolResult, rmcp::ErrorData> {
        let db = Arc::clone(&self.db);
        let fp = self.project_fingerprint.clone();
        spawn_tool(move || rpc_tools::execute_query_graph(&db, &fp, params)).await
    }
}

// Manual impl (no #[tool_handler]) so call_tool can be wrapped with
// timing and response truncation.
impl ServerHandler for LaminarkServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            server_info: Implementation {
                name: "laminark".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            capabilities: ServerCapabilities::builder().enable_tools().enable_logging().build(),
            instructions: Some(
                "laminark: persistent project memory.\n\n\
                 Call 'recall' at the start of a session with no query to get the \
                 bounded context bundle, or with a query to search past observations. \
                 Call 'save_memory' to explicitly persist something worth remembering. \
                 Call 'discover_tools' to find tools relevant to a task."
                    .to_string(),
            ),
        }
    }

    async fn call_tool(&self, request: CallToolRequestParams, context: RequestContext<RoleServer>) -> Result<CallToolResult, rmcp::ErrorData> {
        let tool_name = request.name.to_string();
        let start = std::time::Instant::now();

        let tcc = ToolCallContext::new(self, request, context);
        let result = self.tool_router.call(tcc).await;

        let is_error = result.as_ref().is_ok_and(|r| r.is_error == Some(true)) || result.is_err();
        if is_error {
            warn!(tool = %tool_name, elapsed_ms = start.elapsed().as_millis(), "tool call failed");
        } else {
            tracing::debug!(tool = %tool_name, elapsed_ms = start.elapsed().as_millis(), "tool call ok");
        }

        result.map(truncate_call_tool_result)
    }

    async fn list_tools(&self, _request: Option<PaginatedRequestParams>, _context: RequestContext<RoleServer>) -> Result<ListToolsResult, rmcp::ErrorData> {
        Ok(ListToolsResult { tools: self.tool_router.list_all(), next_cursor: None, meta: None })
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tool_router.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_under_limit_unchanged() {
        let input = "short".to_string();
        assert_eq!(truncate_response(input.clone()), input);
    }

    #[test]
    fn test_truncate_over_limit_adds_notice() {
        let input = "x".repeat(MAX_RESPONSE_BYTES + 1000);
        let result = truncate_response(input);
        assert!(result.contains("[TRUNCATED:"));
    }
}
