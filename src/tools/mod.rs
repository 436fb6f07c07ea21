pub mod memory_retrieve;
pub mod memory_save;

use memory_retrieve::MemoryRetrieveParams;
use memory_save::{MemorySaveParams, MemorySaveResponse};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};

use crate::memory::service::MemoryService;
use crate::memory::types::parse_tags;

/// The Tessera MCP tool handler. Holds the shared [`MemoryService`] and
/// exposes `memory_save` and `memory_retrieve` via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct TesseraTools {
    tool_router: ToolRouter<Self>,
    service: MemoryService,
}

#[tool_router]
impl TesseraTools {
    pub fn new(service: MemoryService) -> Self {
        Self {
            tool_router: Self::tool_router(),
            service,
        }
    }

    /// Save a fact for later recall.
    #[tool(description = "Save a fact or preference about the user so it can be recalled in later conversations. Use for stable information: preferences, names, projects, decisions.")]
    pub async fn memory_save(
        &self,
        Parameters(params): Parameters<MemorySaveParams>,
    ) -> Result<String, String> {
        let tags = params.tags.as_deref().map(parse_tags).unwrap_or_default();

        tracing::info!(
            text_len = params.text.len(),
            tags = tags.len(),
            "memory_save called"
        );

        let id = self
            .service
            .save(&params.text, &tags)
            .await
            .map_err(|e| e.to_string())?;

        let response = MemorySaveResponse {
            message: format!("Memory saved successfully (id: {id})"),
            id,
        };
        serde_json::to_string(&response).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Recall memories relevant to a query.
    #[tool(description = "Recall saved memories relevant to a question. Returns a ranked list combining keyword and semantic matches, plus related conversation history.")]
    pub async fn memory_retrieve(
        &self,
        Parameters(params): Parameters<MemoryRetrieveParams>,
    ) -> Result<String, String> {
        tracing::info!(query = %params.query, "memory_retrieve called");

        self.service
            .retrieve(&params.query)
            .await
            .map_err(|e| e.to_string())
    }
}

#[tool_handler]
impl ServerHandler for TesseraTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Tessera is a long-term memory server. Use memory_save to remember facts \
                 about the user and memory_retrieve to recall them before answering."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
