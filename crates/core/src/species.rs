//! Wire types of the classification/search API and the audio lookup.
//!
//! Field names follow the upstream JSON, which is in Spanish.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Points shown when the upstream omits or garbles `puntos`.
pub const DEFAULT_POINTS: u32 = 50;

/// What the user photographed or asked about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SpeciesKind {
    #[default]
    Insecto,
    Planta,
}

impl SpeciesKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insecto => "insecto",
            Self::Planta => "planta",
        }
    }
}

impl fmt::Display for SpeciesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Danger level, parsed case-insensitively from `baja`/`media`/`alta`
/// (English spellings accepted too). Anything else reads as `Low`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DangerLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl DangerLevel {
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "media" | "medium" => Self::Medium,
            "alta" | "high" => Self::High,
            _ => Self::Low,
        }
    }
}

impl<'de> Deserialize<'de> for DangerLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Self::parse_lenient).unwrap_or_default())
    }
}

fn default_points() -> u32 {
    DEFAULT_POINTS
}

/// Accepts `42`, `42.9`, `"42"` or `"42 pts"`, keeping the leading whole
/// number. Zero, negatives and anything without leading digits become the
/// default.
fn lenient_points<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let points = match raw {
        Some(serde_json::Value::Number(n)) => leading_integer(&n.to_string()),
        Some(serde_json::Value::String(s)) => leading_integer(&s),
        _ => None,
    };
    Ok(points.filter(|p| *p > 0).unwrap_or(DEFAULT_POINTS))
}

fn leading_integer(text: &str) -> Option<u32> {
    let text = text.trim_start();
    let text = text.strip_prefix('+').unwrap_or(text);
    let end = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
    text[..end].parse().ok()
}

/// An identified species.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SpeciesResult {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "cientifico", default)]
    pub scientific_name: String,
    #[serde(rename = "descripcion", default)]
    pub description: String,
    #[serde(default)]
    pub habitat: String,
    #[serde(rename = "dato_curioso", default)]
    pub curiosity: String,
    #[serde(rename = "peligrosidad", default)]
    pub danger: DangerLevel,
    #[serde(rename = "puntos", default = "default_points", deserialize_with = "lenient_points")]
    pub points: u32,
    #[serde(rename = "imagen", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "regiones", default, skip_serializing_if = "Vec::is_empty")]
    pub regions: Vec<String>,
    #[serde(rename = "sonido", default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<SoundInfo>,
}

/// Either a species or an application error from upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(untagged)]
pub enum ApiReply {
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        offline: bool,
        #[serde(rename = "codigo_error", default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    Species(Box<SpeciesResult>),
}

/// Request body for the audio lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SoundLookup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scientific_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: SpeciesKind,
}

/// Audio recording metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SoundInfo {
    pub url: String,
    pub source: String,
    #[serde(default)]
    pub sound_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Reply of the audio lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SoundReply {
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<SoundInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_species() {
        let json = r#"{
            "nombre": "Chinita",
            "cientifico": "Eriopis connexa",
            "descripcion": "Un escarabajo pequeño.",
            "habitat": "Zona central",
            "peligrosidad": "Baja",
            "dato_curioso": "Come pulgones.",
            "puntos": 35,
            "regiones": ["Valparaíso", "Metropolitana"]
        }"#;

        let reply: ApiReply = serde_json::from_str(json).unwrap();
        let ApiReply::Species(species) = reply else { panic!("expected species") };
        assert_eq!(species.name, "Chinita");
        assert_eq!(species.scientific_name, "Eriopis connexa");
        assert_eq!(species.danger, DangerLevel::Low);
        assert_eq!(species.points, 35);
        assert_eq!(species.regions.len(), 2);
        assert!(species.sound.is_none());
    }

    #[test]
    fn test_parse_error_reply_verbatim() {
        let json = r#"{"error": "No pude identificar un insecto en esta imagen.", "tipo": "insecto"}"#;
        let reply: ApiReply = serde_json::from_str(json).unwrap();
        assert_eq!(
            reply,
            ApiReply::Error {
                error: "No pude identificar un insecto en esta imagen.".into(),
                offline: false,
                code: None,
            }
        );
    }

    #[test]
    fn test_parse_offline_reply() {
        let json = r#"{"error": "Sin conexión", "offline": true}"#;
        let reply: ApiReply = serde_json::from_str(json).unwrap();
        assert!(matches!(reply, ApiReply::Error { offline: true, .. }));
    }

    #[test]
    fn test_lenient_points() {
        let species: SpeciesResult = serde_json::from_str(r#"{"nombre": "A", "puntos": "80"}"#).unwrap();
        assert_eq!(species.points, 80);

        let species: SpeciesResult = serde_json::from_str(r#"{"nombre": "A", "puntos": "muchos"}"#).unwrap();
        assert_eq!(species.points, DEFAULT_POINTS);

        let species: SpeciesResult = serde_json::from_str(r#"{"nombre": "A", "puntos": "42abc"}"#).unwrap();
        assert_eq!(species.points, 42);

        let species: SpeciesResult = serde_json::from_str(r#"{"nombre": "A", "puntos": 42.9}"#).unwrap();
        assert_eq!(species.points, 42);

        let species: SpeciesResult = serde_json::from_str(r#"{"nombre": "A", "puntos": "0"}"#).unwrap();
        assert_eq!(species.points, DEFAULT_POINTS);

        let species: SpeciesResult = serde_json::from_str(r#"{"nombre": "A", "puntos": "-5"}"#).unwrap();
        assert_eq!(species.points, DEFAULT_POINTS);

        let species: SpeciesResult = serde_json::from_str(r#"{"nombre": "A"}"#).unwrap();
        assert_eq!(species.points, DEFAULT_POINTS);
    }

    #[test]
    fn test_danger_levels() {
        assert_eq!(DangerLevel::parse_lenient("MEDIA"), DangerLevel::Medium);
        assert_eq!(DangerLevel::parse_lenient(" alta "), DangerLevel::High);
        assert_eq!(DangerLevel::parse_lenient("high"), DangerLevel::High);
        assert_eq!(DangerLevel::parse_lenient("desconocida"), DangerLevel::Low);

        let species: SpeciesResult = serde_json::from_str(r#"{"nombre": "A", "peligrosidad": null}"#).unwrap();
        assert_eq!(species.danger, DangerLevel::Low);
    }

    #[test]
    fn test_sound_lookup_wire_format() {
        let lookup =
            SoundLookup { name: "Chincol".into(), scientific_name: Some("Zonotrichia capensis".into()), kind: SpeciesKind::Insecto };
        let json = serde_json::to_value(&lookup).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "name": "Chincol", "scientificName": "Zonotrichia capensis", "type": "insecto" })
        );
    }

    #[test]
    fn test_sound_reply() {
        let json = r#"{"found": true, "sound": {"url": "https://x.test/a.mp3", "source": "Xeno-Canto", "soundType": "canto", "quality": "A"}}"#;
        let reply: SoundReply = serde_json::from_str(json).unwrap();
        let sound = reply.sound.unwrap();
        assert!(reply.found);
        assert_eq!(sound.sound_type, "canto");
        assert_eq!(sound.quality.as_deref(), Some("A"));
        assert!(sound.location.is_none());

        let reply: SoundReply = serde_json::from_str(r#"{"found": false}"#).unwrap();
        assert!(!reply.found);
    }
}
