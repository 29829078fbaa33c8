//! Response snapshots and the locally synthesized offline responses.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Served for navigations when neither the network nor the cache answers.
const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Sin conexión - NaturIA Chile</title>
<style>
body { font-family: sans-serif; display: flex; flex-direction: column; align-items: center;
       justify-content: center; min-height: 100vh; margin: 0; text-align: center; padding: 20px; }
button { padding: 15px 30px; border: none; border-radius: 25px; font-size: 1.1rem; cursor: pointer; }
</style>
</head>
<body>
<h1>Sin conexión</h1>
<p>Parece que no tienes conexión a internet.<br>Conéctate y vuelve a intentar.</p>
<button id="retry" onclick="location.reload()">Reintentar</button>
</body>
</html>
"#;

/// Status, headers and body of a response, as delivered or as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ResponseSnapshot {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self { status, headers, body }
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// The 503 JSON body returned for API calls made while offline.
    pub fn offline_api_error(notice: &str) -> Self {
        let body = serde_json::json!({ "error": notice, "offline": true });
        Self {
            status: 503,
            headers: vec![("content-type".into(), "application/json".into())],
            body: body.to_string().into_bytes(),
        }
    }

    /// The minimal HTML page returned for navigations with nothing cached.
    pub fn offline_page() -> Self {
        Self {
            status: 200,
            headers: vec![("content-type".into(), "text/html; charset=utf-8".into())],
            body: OFFLINE_PAGE.as_bytes().to_vec(),
        }
    }
}

/// Where a delivered response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
    Synthesized,
}

/// A response handed back to the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Served {
    pub response: ResponseSnapshot,
    pub source: ResponseSource,
}

impl Served {
    pub fn network(response: ResponseSnapshot) -> Self {
        Self { response, source: ResponseSource::Network }
    }

    pub fn cache(response: ResponseSnapshot) -> Self {
        Self { response, source: ResponseSource::Cache }
    }

    pub fn synthesized(response: ResponseSnapshot) -> Self {
        Self { response, source: ResponseSource::Synthesized }
    }
}
