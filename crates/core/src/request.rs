//! Intercepted requests and their classification.
//!
//! Classification is a pure function of the URL path, the declared
//! destination and the request mode. It is computed once per request.

use serde::{Deserialize, Serialize};
use url::Url;

/// How the page issued the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// A full-page load.
    Navigate,
    #[default]
    Cors,
    NoCors,
    SameOrigin,
}

/// The kind of resource the page expects back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Style,
    Script,
    Image,
    Font,
    Manifest,
    Audio,
    /// `fetch()`/XHR with no declared destination.
    #[default]
    Empty,
}

impl Destination {
    /// Style, script, image and font resources.
    pub fn is_static_asset(&self) -> bool {
        matches!(self, Self::Style | Self::Script | Self::Image | Self::Font)
    }
}

/// The strategy bucket a request falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    ApiCall,
    StaticAsset,
    Navigation,
    Other,
}

/// A request seen by the intermediary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
    pub destination: Destination,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl InterceptedRequest {
    /// A `GET` with no body.
    pub fn get(url: Url, mode: RequestMode, destination: Destination) -> Self {
        Self { method: "GET".into(), url, mode, destination, headers: Vec::new(), body: None }
    }

    /// A full-page navigation to `url`.
    pub fn navigate(url: Url) -> Self {
        Self::get(url, RequestMode::Navigate, Destination::Document)
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into().to_ascii_uppercase();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Classify against the configured API path fragments.
    pub fn classify<S: AsRef<str>>(&self, api_paths: &[S]) -> Classification {
        classify(self.url.path(), self.mode, self.destination, api_paths)
    }

    /// True when the request targets the application root.
    pub fn is_root(&self) -> bool {
        self.url.path() == "/"
    }
}

/// Classify a request.
///
/// API paths win over everything else, then static destinations, then
/// navigations; anything left is `Other`.
pub fn classify<S: AsRef<str>>(
    path: &str, mode: RequestMode, destination: Destination, api_paths: &[S],
) -> Classification {
    if api_paths.iter().any(|p| !p.as_ref().is_empty() && path.contains(p.as_ref())) {
        Classification::ApiCall
    } else if destination.is_static_asset() {
        Classification::StaticAsset
    } else if mode == RequestMode::Navigate {
        Classification::Navigation
    } else {
        Classification::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const API: &[&str] = &["/analizar", "/buscar"];

    fn url(path: &str) -> Url {
        Url::parse("https://naturia.test").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_api_paths() {
        let req = InterceptedRequest::get(url("/analizar"), RequestMode::Cors, Destination::Empty).with_method("post");
        assert_eq!(req.classify(API), Classification::ApiCall);
        assert_eq!(req.method, "POST");

        let req = InterceptedRequest::get(url("/buscar-sonido"), RequestMode::Cors, Destination::Empty);
        assert_eq!(req.classify(API), Classification::ApiCall);
    }

    #[test]
    fn test_api_wins_over_destination() {
        let req = InterceptedRequest::get(url("/buscar/thumb.png"), RequestMode::NoCors, Destination::Image);
        assert_eq!(req.classify(API), Classification::ApiCall);
    }

    #[test]
    fn test_static_destinations() {
        for destination in [Destination::Style, Destination::Script, Destination::Image, Destination::Font] {
            let req = InterceptedRequest::get(url("/static/x"), RequestMode::NoCors, destination);
            assert_eq!(req.classify(API), Classification::StaticAsset, "{destination:?}");
        }
    }

    #[test]
    fn test_manifest_and_audio_are_other() {
        let req = InterceptedRequest::get(url("/static/manifest.json"), RequestMode::Cors, Destination::Manifest);
        assert_eq!(req.classify(API), Classification::Other);

        let req = InterceptedRequest::get(url("/static/sounds/grillo.mp3"), RequestMode::NoCors, Destination::Audio);
        assert_eq!(req.classify(API), Classification::Other);
    }

    #[test]
    fn test_navigation() {
        let req = InterceptedRequest::navigate(url("/"));
        assert_eq!(req.classify(API), Classification::Navigation);
        assert!(req.is_root());

        let req = InterceptedRequest::navigate(url("/acerca"));
        assert_eq!(req.classify(API), Classification::Navigation);
        assert!(!req.is_root());
    }

    #[test]
    fn test_plain_fetch_is_other() {
        let req = InterceptedRequest::get(url("/salud"), RequestMode::Cors, Destination::Empty);
        assert_eq!(req.classify(API), Classification::Other);
    }

    #[test]
    fn test_empty_api_fragment_ignored() {
        let req = InterceptedRequest::get(url("/salud"), RequestMode::Cors, Destination::Empty);
        assert_eq!(req.classify(&[""]), Classification::Other);
    }

    #[test]
    fn test_classification_serde() {
        let json = serde_json::to_string(&Classification::StaticAsset).unwrap();
        assert_eq!(json, "\"static-asset\"");
        let mode: RequestMode = serde_json::from_str("\"navigate\"").unwrap();
        assert_eq!(mode, RequestMode::Navigate);
    }
}
