//! Client for the classification/search API and the audio lookup.
//!
//! Requests go through any [`Fetcher`]: straight to the network with an
//! [`HttpFetcher`](crate::fetch::HttpFetcher), or through the intermediary
//! with a [`ReactorHandle`](crate::intermediary::ReactorHandle), in which
//! case an offline call comes back as `ApiReply::Error { offline: true }`.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use url::Url;

use naturia_core::{
    ApiReply, Destination, Error, InterceptedRequest, RequestMode, ResponseSnapshot, SoundLookup, SoundReply,
    SpeciesKind,
};

use crate::fetch::Fetcher;

const ANALYZE_PATH: &str = "/analizar";
const SEARCH_PATH: &str = "/buscar";
const SOUND_PATH: &str = "/buscar-sonido";

/// Longest upstream body quoted in an error message.
const ERROR_EXCERPT: usize = 200;

#[derive(Serialize)]
struct SearchQuery<'a> {
    query: &'a str,
    #[serde(rename = "type")]
    kind: SpeciesKind,
}

/// Typed calls against the species API.
#[derive(Clone)]
pub struct SpeciesClient {
    fetcher: Arc<dyn Fetcher>,
    origin: Url,
}

impl SpeciesClient {
    pub fn new(fetcher: Arc<dyn Fetcher>, origin: Url) -> Self {
        Self { fetcher, origin }
    }

    /// Identify the species in a photograph.
    ///
    /// Sent as `multipart/form-data` with the image under `imagen` and the
    /// kind under `tipo`.
    pub async fn analyze_image(&self, image: &[u8], filename: &str, kind: SpeciesKind) -> Result<ApiReply, Error> {
        if image.is_empty() {
            return Err(Error::InvalidInput("image cannot be empty".into()));
        }

        let boundary = boundary(image, filename);
        let body = multipart_body(&boundary, image, filename, kind);
        let request = self
            .post(ANALYZE_PATH)?
            .with_header("content-type", format!("multipart/form-data; boundary={boundary}"))
            .with_body(body);

        let response = self.fetcher.fetch(&request).await?;
        parse(&response)
    }

    /// Look a species up by name or description.
    pub async fn search_text(&self, query: &str, kind: SpeciesKind) -> Result<ApiReply, Error> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("query cannot be empty".into()));
        }

        let body = serde_json::to_vec(&SearchQuery { query, kind })
            .map_err(|e| Error::InvalidInput(format!("unserializable query: {e}")))?;
        let response = self.fetcher.fetch(&self.post_json(SEARCH_PATH, body)?).await?;
        parse(&response)
    }

    /// Find an audio recording for a species.
    pub async fn lookup_sound(&self, lookup: &SoundLookup) -> Result<SoundReply, Error> {
        let body = serde_json::to_vec(lookup).map_err(|e| Error::InvalidInput(format!("unserializable lookup: {e}")))?;
        let response = self.fetcher.fetch(&self.post_json(SOUND_PATH, body)?).await?;
        parse(&response)
    }

    fn post(&self, path: &str) -> Result<InterceptedRequest, Error> {
        let url = self.origin.join(path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))?;
        Ok(InterceptedRequest::get(url, RequestMode::Cors, Destination::Empty)
            .with_method("POST")
            .with_header("accept", "application/json"))
    }

    fn post_json(&self, path: &str, body: Vec<u8>) -> Result<InterceptedRequest, Error> {
        Ok(self.post(path)?.with_header("content-type", "application/json").with_body(body))
    }
}

/// Decode a JSON reply whatever its status; upstream errors carry an
/// `error` field and are passed through as data.
fn parse<T: serde::de::DeserializeOwned>(response: &ResponseSnapshot) -> Result<T, Error> {
    serde_json::from_slice(&response.body).map_err(|e| {
        let text = response.body_text();
        let excerpt: String = text.chars().take(ERROR_EXCERPT).collect();
        Error::Upstream(format!("status {}: unreadable reply ({e}): {excerpt}", response.status))
    })
}

fn boundary(image: &[u8], filename: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(filename.as_bytes());
    hasher.update(image);
    let digest = hex::encode(hasher.finalize());
    format!("naturia-{}", &digest[..32])
}

fn image_mime(filename: &str) -> &'static str {
    let ext = filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Filename as it may appear inside a part header: no quotes, backslashes
/// or control characters.
fn header_safe_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    match cleaned.trim() {
        "" => "imagen".to_string(),
        name => name.to_string(),
    }
}

fn multipart_body(boundary: &str, image: &[u8], filename: &str, kind: SpeciesKind) -> Vec<u8> {
    let filename = header_safe_filename(filename);
    let mut body = Vec::with_capacity(image.len() + 512);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"imagen\"; filename=\"{filename}\"\r\nContent-Type: {}\r\n\r\n",
            image_mime(&filename)
        )
        .as_bytes(),
    );
    body.extend_from_slice(image);
    body.extend_from_slice(
        format!("\r\n--{boundary}\r\nContent-Disposition: form-data; name=\"tipo\"\r\n\r\n{kind}\r\n--{boundary}--\r\n")
            .as_bytes(),
    );
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchConfig, HttpFetcher};
    use crate::intermediary::testing::{ScriptedFetcher, settings};
    use crate::intermediary::Reactor;
    use naturia_core::{CacheDb, DangerLevel};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn client(server: &MockServer) -> SpeciesClient {
        let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
        SpeciesClient::new(Arc::new(fetcher), Url::parse(&server.uri()).unwrap())
    }

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_body("b", b"JPEG", "foto.jpg", SpeciesKind::Planta);
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--b\r\nContent-Disposition: form-data; name=\"imagen\"; filename=\"foto.jpg\""));
        assert!(text.contains("Content-Type: image/jpeg\r\n\r\nJPEG\r\n"));
        assert!(text.contains("name=\"tipo\"\r\n\r\nplanta\r\n"));
        assert!(text.ends_with("--b--\r\n"));
    }

    #[test]
    fn test_multipart_filename_cannot_add_headers() {
        let body = multipart_body("b", b"JPEG", "a.jpg\r\nX-Injected: y\"", SpeciesKind::Insecto);
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("filename=\"a.jpgX-Injected: y\"\r\n"));
        assert!(!text.contains("\r\nX-Injected"));
    }

    #[test]
    fn test_blank_filename_gets_default() {
        assert_eq!(header_safe_filename("\r\n"), "imagen");
        assert_eq!(header_safe_filename("copihue.png"), "copihue.png");
    }

    #[test]
    fn test_image_mime() {
        assert_eq!(image_mime("IMG_001.JPG"), "image/jpeg");
        assert_eq!(image_mime("hoja.webp"), "image/webp");
        assert_eq!(image_mime("captura"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_analyze_image_sends_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analizar"))
            .and(|req: &Request| {
                let content_type = req.headers.get("content-type").and_then(|v| v.to_str().ok()).unwrap_or("");
                let body = String::from_utf8_lossy(&req.body);
                content_type.starts_with("multipart/form-data; boundary=naturia-")
                    && body.contains("name=\"imagen\"; filename=\"chinita.jpg\"")
                    && body.contains("name=\"tipo\"\r\n\r\ninsecto")
            })
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "nombre": "Chinita",
                "cientifico": "Eriopis connexa",
                "descripcion": "Coleóptero depredador de pulgones.",
                "habitat": "Jardines",
                "peligrosidad": "Baja",
                "dato_curioso": "Hiberna en grupos.",
                "puntos": 40
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client(&server)
            .analyze_image(b"\xff\xd8\xff\xe0", "chinita.jpg", SpeciesKind::Insecto)
            .await
            .unwrap();
        let ApiReply::Species(species) = reply else { panic!("expected species, got {reply:?}") };
        assert_eq!(species.name, "Chinita");
        assert_eq!(species.danger, DangerLevel::Low);
        assert_eq!(species.points, 40);
    }

    #[tokio::test]
    async fn test_search_text_sends_json_and_passes_errors_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/buscar"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({ "query": "copihue", "type": "planta" })))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": "No encontré información sobre \"copihue\"",
                "tipo": "planta"
            })))
            .mount(&server)
            .await;

        let reply = client(&server).search_text("  copihue ", SpeciesKind::Planta).await.unwrap();
        assert_eq!(
            reply,
            ApiReply::Error { error: "No encontré información sobre \"copihue\"".into(), offline: false, code: None }
        );
    }

    #[tokio::test]
    async fn test_lookup_sound() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/buscar-sonido"))
            .and(body_json(serde_json::json!({ "name": "Chicharra", "scientificName": "Tettigades chilensis", "type": "insecto" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "found": true,
                "sound": { "url": "https://xeno-canto.test/1.mp3", "source": "xeno-canto", "soundType": "canto" }
            })))
            .mount(&server)
            .await;

        let lookup = SoundLookup {
            name: "Chicharra".into(),
            scientific_name: Some("Tettigades chilensis".into()),
            kind: SpeciesKind::Insecto,
        };
        let reply = client(&server).lookup_sound(&lookup).await.unwrap();
        assert!(reply.found);
        assert_eq!(reply.sound.unwrap().source, "xeno-canto");
    }

    #[tokio::test]
    async fn test_unreadable_reply_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .mount(&server)
            .await;

        let result = client(&server).search_text("chinita", SpeciesKind::Insecto).await;
        assert!(matches!(result, Err(Error::Upstream(msg)) if msg.starts_with("status 502")));
    }

    #[tokio::test]
    async fn test_empty_inputs_rejected() {
        let server = MockServer::start().await;
        let client = client(&server);
        assert!(matches!(client.search_text("  ", SpeciesKind::Insecto).await, Err(Error::InvalidInput(_))));
        assert!(matches!(client.analyze_image(&[], "x.jpg", SpeciesKind::Insecto).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_offline_through_intermediary() {
        let fetcher = ScriptedFetcher::new();
        let db = CacheDb::open_in_memory().await.unwrap();
        let handle = Reactor::start(db, fetcher.clone(), settings("v1", &[]), true).await.unwrap();
        handle.install(settings("v1", &[])).await.unwrap();
        fetcher.set_offline(true);

        let origin = Url::parse(crate::intermediary::testing::ORIGIN).unwrap();
        let client = SpeciesClient::new(Arc::new(handle), origin);
        let reply = client.search_text("chinita", SpeciesKind::Insecto).await.unwrap();
        assert_eq!(reply, ApiReply::Error { error: "Sin conexión".into(), offline: true, code: None });
    }
}
