//! MCP tool implementations.
//!
//! This module contains all tools exposed by the naturia-sw server.

pub mod fetch;
pub mod lifecycle;
pub mod species;
pub mod store;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ToolError;

/// Serialize tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| ToolError::EncodeFailed(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod testing {
    use naturia_client::{FetchConfig, HttpFetcher, Reactor, ReactorHandle, WorkerSettings};
    use naturia_core::{AppConfig, CacheDb};
    use rmcp::model::CallToolResult;
    use std::sync::Arc;

    /// A reactor over an in-memory store, fetching from `origin`.
    pub async fn reactor(origin: &str, manifest: &[&str]) -> (CacheDb, ReactorHandle, WorkerSettings) {
        let config = AppConfig {
            origin: origin.to_string(),
            manifest: manifest.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        };
        let settings = WorkerSettings::from_config(&config).unwrap();
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(HttpFetcher::new(FetchConfig::from(&config)).unwrap());
        let handle = Reactor::start(db.clone(), fetcher, settings.clone(), config.skip_waiting)
            .await
            .unwrap();
        (db, handle, settings)
    }

    /// Decode the JSON text a tool returned.
    pub fn output<T: serde::de::DeserializeOwned>(result: &CallToolResult) -> T {
        let text = result
            .content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.clone())
            .expect("Expected text content");
        serde_json::from_str(&text).unwrap()
    }
}
