use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemorySaveParams {
    #[schemars(description = "The fact or preference to remember, as a short natural language sentence")]
    pub text: String,

    #[schemars(
        description = "Optional comma-separated labels, e.g. 'work, editor'. Informational only."
    )]
    pub tags: Option<String>,
}

/// Response body of a successful `memory_save` call.
#[derive(Debug, Serialize, Deserialize)]
pub struct MemorySaveResponse {
    pub message: String,
    pub id: String,
}
