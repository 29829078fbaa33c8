//! sw_install, sw_message and sw_status tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use naturia_client::{ActivationReport, ControlMessage, ReactorHandle, WorkerSettings};
use naturia_core::Error;

use super::json_result;

/// Input parameters for sw_install tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwInstallParams {
    /// Version to install (default: the configured cache version).
    #[serde(default)]
    pub version: Option<String>,
}

/// Input parameters for sw_message tool: the message itself, e.g.
/// `{"type": "SKIP_WAITING"}`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    #[serde(flatten)]
    pub message: ControlMessage,
}

/// Output structure for sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageOutput {
    /// Set when a waiting worker was activated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated: Option<ActivationReport>,
}

/// Implementation of the sw_install tool.
pub async fn install_impl(
    reactor: &ReactorHandle, settings: &WorkerSettings, params: SwInstallParams,
) -> Result<CallToolResult, McpError> {
    let settings = match params.version {
        Some(version) if version.trim().is_empty() => {
            return Err(Error::InvalidInput("version cannot be empty".into()).into());
        }
        Some(version) => settings.clone().with_version(version.trim()),
        None => settings.clone(),
    };

    let outcome = reactor.install(settings).await?;
    json_result(&outcome)
}

/// Implementation of the sw_message tool.
pub async fn message_impl(reactor: &ReactorHandle, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let activated = reactor.message(params.message).await?;
    json_result(&SwMessageOutput { activated })
}

/// Implementation of the sw_status tool.
pub async fn status_impl(reactor: &ReactorHandle) -> Result<CallToolResult, McpError> {
    let status = reactor.status().await?;
    json_result(&status)
}
