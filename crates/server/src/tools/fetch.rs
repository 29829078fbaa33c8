//! sw_fetch tool implementation.
//!
//! Dispatches one request through the intermediary, as if the page had
//! issued it.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use naturia_client::ReactorHandle;
use naturia_client::fetch::resolve;
use naturia_core::{Classification, Destination, Error, InterceptedRequest, RequestMode, ResponseSource};

use super::json_result;

/// Input parameters for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path resolved against the application origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode: "navigate", "cors" (default), "no-cors" or "same-origin".
    #[serde(default)]
    pub mode: RequestMode,

    /// Declared destination: "document", "style", "script", "image", "font",
    /// "manifest", "audio" or "empty" (default).
    #[serde(default)]
    pub destination: Destination,

    /// Request headers as name/value pairs.
    #[serde(default)]
    pub headers: Vec<(String, String)>,

    /// Optional request body, sent as UTF-8.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// Canonical URL the request was made for.
    pub url: String,
    pub classification: Classification,
    /// Where the response came from: network, cache or synthesized.
    pub source: ResponseSource,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Body as text, when it is valid UTF-8.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub body_bytes: usize,
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(
    reactor: &ReactorHandle, origin: &Url, api_paths: &[String], params: SwFetchParams,
) -> Result<CallToolResult, McpError> {
    if params.method.trim().is_empty() {
        return Err(Error::InvalidInput("method cannot be empty".into()).into());
    }

    let url = resolve(origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let mut request = InterceptedRequest::get(url, params.mode, params.destination).with_method(params.method.trim());
    for (name, value) in params.headers {
        request = request.with_header(name, value);
    }
    if let Some(body) = params.body {
        request = request.with_body(body);
    }

    let classification = request.classify(api_paths);
    let url = request.url.to_string();
    let served = reactor.fetch(request).await?;

    let response = served.response;
    let output = SwFetchOutput {
        url,
        classification,
        source: served.source,
        status: response.status,
        body_bytes: response.body.len(),
        body: String::from_utf8(response.body).ok(),
        headers: response.headers,
    };
    json_result(&output)
}
