//! History and preference tool implementations.

use chrono::{DateTime, Utc};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use naturia_core::store::{INSTALL_DISMISSED_KEY, THEME_KEY};
use naturia_core::{CacheDb, HistoryEntry, SpeciesResult, Theme};

use super::json_result;
use crate::error::ToolError;

/// Output structure for history_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HistoryListOutput {
    /// Remembered lookups, newest first.
    pub entries: Vec<HistoryEntry>,
}

/// Input parameters for history_record tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HistoryRecordParams {
    /// The lookup result, in the API's own field names.
    pub result: SpeciesResult,
}

/// Output structure for history_clear tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HistoryClearOutput {
    pub deleted: u64,
}

/// Input parameters for preference_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PreferenceGetParams {
    pub key: String,
}

/// Input parameters for preference_set tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PreferenceSetParams {
    pub key: String,
    /// `theme` takes "light" or "dark"; `install_prompt_dismissed_at`
    /// takes an RFC 3339 timestamp.
    pub value: String,
}

/// Output structure for preference tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PreferenceOutput {
    pub key: String,
    pub value: Option<String>,
}

/// Implementation of the history_list tool.
pub async fn history_list_impl(db: &CacheDb) -> Result<CallToolResult, McpError> {
    let entries = db.list_history().await?;
    json_result(&HistoryListOutput { entries })
}

/// Implementation of the history_record tool.
pub async fn history_record_impl(db: &CacheDb, params: HistoryRecordParams) -> Result<CallToolResult, McpError> {
    if params.result.name.trim().is_empty() {
        return Err(ToolError::InvalidInput("result.nombre cannot be empty".into()).into());
    }

    db.record_history(&params.result).await?;
    history_list_impl(db).await
}

/// Implementation of the history_clear tool.
pub async fn history_clear_impl(db: &CacheDb) -> Result<CallToolResult, McpError> {
    let deleted = db.clear_history().await?;
    json_result(&HistoryClearOutput { deleted })
}

/// Implementation of the preference_get tool.
pub async fn preference_get_impl(db: &CacheDb, params: PreferenceGetParams) -> Result<CallToolResult, McpError> {
    let value = match params.key.as_str() {
        THEME_KEY => Some(db.theme().await?.as_str().to_string()),
        _ => db.get_preference(&params.key).await?,
    };
    json_result(&PreferenceOutput { key: params.key, value })
}

/// Implementation of the preference_set tool.
///
/// Typed keys are validated before they are stored.
pub async fn preference_set_impl(db: &CacheDb, params: PreferenceSetParams) -> Result<CallToolResult, McpError> {
    match params.key.as_str() {
        THEME_KEY => {
            let theme: Theme = params
                .value
                .parse()
                .map_err(|_| ToolError::InvalidInput("theme must be light or dark".into()))?;
            db.set_theme(theme).await?;
        }
        INSTALL_DISMISSED_KEY => {
            let at = DateTime::parse_from_rfc3339(&params.value)
                .map_err(|e| ToolError::InvalidInput(format!("{INSTALL_DISMISSED_KEY}: {e}")))?;
            db.dismiss_install_prompt(at.with_timezone(&Utc)).await?;
        }
        _ => db.set_preference(&params.key, &params.value).await?,
    }

    preference_get_impl(db, PreferenceGetParams { key: params.key }).await
}
