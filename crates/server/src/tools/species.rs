//! species_analyze, species_search and species_sound tool implementations.
//!
//! All three call the species API through the intermediary, so they degrade to
//! the offline reply instead of failing when the network is gone.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use naturia_client::SpeciesClient;
use naturia_core::{ApiReply, CacheDb, SoundLookup, SpeciesKind};

use super::json_result;
use crate::error::ToolError;

/// Input parameters for species_analyze tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SpeciesAnalyzeParams {
    /// The photograph, base64 encoded.
    pub image_base64: String,

    /// Original filename; its extension picks the image type.
    #[serde(default = "default_filename")]
    pub filename: String,

    /// "insecto" (default) or "planta".
    #[serde(default)]
    pub kind: SpeciesKind,
}

fn default_filename() -> String {
    "imagen.jpg".into()
}

/// Input parameters for species_search tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SpeciesSearchParams {
    /// Common or scientific name, or a short description.
    pub query: String,

    /// "insecto" (default) or "planta".
    #[serde(default)]
    pub kind: SpeciesKind,
}

/// Output structure for species_analyze and species_search tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SpeciesSearchOutput {
    /// The API reply, species or error, as received.
    pub reply: ApiReply,
    /// Whether the result was added to the history.
    pub recorded: bool,
}

/// Implementation of the species_analyze tool.
///
/// Like species_search, a species reply is remembered in the history.
pub async fn analyze_impl(
    db: &CacheDb, species: &SpeciesClient, params: SpeciesAnalyzeParams,
) -> Result<CallToolResult, McpError> {
    let image = STANDARD
        .decode(params.image_base64.trim())
        .map_err(|e| ToolError::InvalidInput(format!("image_base64: {e}")))?;

    let reply = species.analyze_image(&image, &params.filename, params.kind).await?;
    let recorded = remember(db, &reply).await?;
    json_result(&SpeciesSearchOutput { reply, recorded })
}

/// Implementation of the species_search tool.
///
/// A species reply is remembered in the history.
pub async fn search_impl(
    db: &CacheDb, species: &SpeciesClient, params: SpeciesSearchParams,
) -> Result<CallToolResult, McpError> {
    let reply = species.search_text(&params.query, params.kind).await?;
    let recorded = remember(db, &reply).await?;
    json_result(&SpeciesSearchOutput { reply, recorded })
}

async fn remember(db: &CacheDb, reply: &ApiReply) -> Result<bool, McpError> {
    match reply {
        ApiReply::Species(result) => {
            db.record_history(result).await?;
            Ok(true)
        }
        ApiReply::Error { .. } => Ok(false),
    }
}

/// Implementation of the species_sound tool.
pub async fn sound_impl(species: &SpeciesClient, params: SoundLookup) -> Result<CallToolResult, McpError> {
    let reply = species.lookup_sound(&params).await?;
    json_result(&reply)
}
