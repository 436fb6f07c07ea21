//! MCP `memory_retrieve` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `memory_retrieve` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryRetrieveParams {
    /// Natural language question or keywords to look up.
    #[schemars(
        description = "Natural language question or keywords describing what to recall, e.g. 'which editor does the user prefer?'"
    )]
    pub query: String,
}
