//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    fetch::{SwFetchParams, fetch_impl},
    lifecycle::{SwInstallParams, SwMessageParams, install_impl, message_impl, status_impl},
    species::{SpeciesAnalyzeParams, SpeciesSearchParams, analyze_impl, search_impl, sound_impl},
    store::{
        HistoryRecordParams, PreferenceGetParams, PreferenceSetParams, history_clear_impl, history_list_impl,
        history_record_impl, preference_get_impl, preference_set_impl,
    },
};

use naturia_client::{ReactorHandle, SpeciesClient, WorkerSettings};
use naturia_core::{CacheDb, SoundLookup};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use url::Url;

/// The main MCP server handler for naturia-sw.
#[derive(Clone)]
pub struct NaturiaServer {
    db: CacheDb,
    reactor: ReactorHandle,
    settings: WorkerSettings,
    origin: Url,
    species: SpeciesClient,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl NaturiaServer {
    /// Create a new server handler over a running reactor.
    pub fn new(db: CacheDb, reactor: ReactorHandle, settings: WorkerSettings, origin: Url) -> Self {
        let species = SpeciesClient::new(Arc::new(reactor.clone()), origin.clone());
        Self { db, reactor, settings, origin, species, tool_router: Self::tool_router() }
    }

    #[tool(description = "Dispatch a request through the offline intermediary. Returns the response and whether it came from the network, the cache or was synthesized.")]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.reactor, &self.origin, &self.settings.api_paths, params.0).await
    }

    #[tool(description = "Install a cache version (default: the configured one) by fetching its manifest. Activates it unless configured to wait.")]
    async fn sw_install(&self, params: Parameters<SwInstallParams>) -> Result<CallToolResult, McpError> {
        install_impl(&self.reactor, &self.settings, params.0).await
    }

    #[tool(description = "Send a control message. {\"type\": \"SKIP_WAITING\"} activates the waiting version now.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.reactor, params.0).await
    }

    #[tool(description = "Report the active and waiting versions and the stored cache generations.")]
    async fn sw_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.reactor).await
    }

    #[tool(description = "List remembered species lookups, newest first (at most 20).")]
    async fn history_list(&self) -> Result<CallToolResult, McpError> {
        history_list_impl(&self.db).await
    }

    #[tool(description = "Remember a species lookup result. A repeat of the same species moves it to the front.")]
    async fn history_record(&self, params: Parameters<HistoryRecordParams>) -> Result<CallToolResult, McpError> {
        history_record_impl(&self.db, params.0).await
    }

    #[tool(description = "Forget every remembered lookup.")]
    async fn history_clear(&self) -> Result<CallToolResult, McpError> {
        history_clear_impl(&self.db).await
    }

    #[tool(description = "Read a user preference such as theme.")]
    async fn preference_get(&self, params: Parameters<PreferenceGetParams>) -> Result<CallToolResult, McpError> {
        preference_get_impl(&self.db, params.0).await
    }

    #[tool(description = "Store a user preference. theme takes light or dark; install_prompt_dismissed_at takes an RFC 3339 timestamp.")]
    async fn preference_set(&self, params: Parameters<PreferenceSetParams>) -> Result<CallToolResult, McpError> {
        preference_set_impl(&self.db, params.0).await
    }

    #[tool(description = "Identify the species in a photograph (base64 image). Species results are added to the history.")]
    async fn species_analyze(&self, params: Parameters<SpeciesAnalyzeParams>) -> Result<CallToolResult, McpError> {
        analyze_impl(&self.db, &self.species, params.0).await
    }

    #[tool(description = "Look a species up by name through the intermediary. Species results are added to the history.")]
    async fn species_search(&self, params: Parameters<SpeciesSearchParams>) -> Result<CallToolResult, McpError> {
        search_impl(&self.db, &self.species, params.0).await
    }

    #[tool(description = "Find an audio recording of a species.")]
    async fn species_sound(&self, params: Parameters<SoundLookup>) -> Result<CallToolResult, McpError> {
        sound_impl(&self.species, params.0).await
    }
}

impl ServerHandler for NaturiaServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "naturia-sw".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
