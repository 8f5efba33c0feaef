//! Garments detected by the vision model, and the tolerant parser that
//! pulls them out of free-text completion output.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Used when the model finds nothing it can describe.
pub const NO_GARMENT_DESCRIPTION: &str = "No se detectó prenda clara.";

/// One entry of the model's `prendas` array, kept verbatim so it can be
/// stored as `metadata_ia` and echoed back to the caller.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectedGarment(Map<String, Value>);

impl DetectedGarment {
    /// Non-object entries become an empty garment so the count is preserved.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Text of a field. Strings are returned as-is, other scalars as their
    /// JSON text; `null`, empty and missing fields yield `None`.
    pub fn field(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn nombre(&self) -> Option<String> {
        self.field("nombre")
    }

    pub fn color(&self) -> Option<String> {
        self.field("color")
    }

    pub fn tipo(&self) -> Option<String> {
        self.field("tipo")
    }

    /// `{nombre} ({color}) - {tipo}` with placeholders for missing fields.
    pub fn description(&self) -> String {
        format!(
            "{} ({}) - {}",
            self.nombre().unwrap_or_else(|| "Prenda".into()),
            self.color().unwrap_or_else(|| "desconocido".into()),
            self.tipo().unwrap_or_else(|| "sin tipo".into()),
        )
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl Serialize for DetectedGarment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DetectionParseError {
    #[error("no JSON object found in completion output")]
    NoJsonObject,
    #[error("invalid JSON in completion output: {0}")]
    InvalidJson(String),
}

/// Extract detected garments from raw completion text.
///
/// Slices from the first `{` to the last `}` and parses that as JSON. A
/// missing or non-array `prendas` field yields an empty list.
pub fn extract_detections(raw: &str) -> Result<Vec<DetectedGarment>, DetectionParseError> {
    let start = raw.find('{').ok_or(DetectionParseError::NoJsonObject)?;
    let end = raw.rfind('}').ok_or(DetectionParseError::NoJsonObject)?;
    if end < start {
        return Err(DetectionParseError::NoJsonObject);
    }

    let parsed: Value = serde_json::from_str(&raw[start..=end])
        .map_err(|err| DetectionParseError::InvalidJson(err.to_string()))?;

    let detections = match parsed.get("prendas") {
        Some(Value::Array(items)) => items
            .iter()
            .cloned()
            .map(DetectedGarment::from_value)
            .collect(),
        _ => Vec::new(),
    };

    Ok(detections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_json_wrapped_in_prose_and_fences() {
        let raw = "Claro, aquí tienes:\n```json\n{\"prendas\":[{\"nombre\":\"Camisa\",\"color\":\"azul\",\"tipo\":\"casual\"}]}\n```";
        let detections = extract_detections(raw).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].description(), "Camisa (azul) - casual");
    }

    #[test]
    fn missing_prendas_is_empty_not_error() {
        assert_eq!(extract_detections("{\"otra\": 1}").unwrap(), Vec::new());
        assert_eq!(extract_detections("{\"prendas\": \"x\"}").unwrap(), Vec::new());
    }

    #[test]
    fn rejects_text_without_object() {
        assert_eq!(
            extract_detections("no veo ninguna prenda"),
            Err(DetectionParseError::NoJsonObject)
        );
        assert_eq!(
            extract_detections("} al revés {"),
            Err(DetectionParseError::NoJsonObject)
        );
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            extract_detections("{\"prendas\": [}"),
            Err(DetectionParseError::InvalidJson(_))
        ));
    }

    #[test]
    fn description_placeholders() {
        let garment = DetectedGarment::from_value(json!({"color": "rojo"}));
        assert_eq!(garment.description(), "Prenda (rojo) - sin tipo");

        let garment = DetectedGarment::from_value(json!({"nombre": "", "color": null, "tipo": 3}));
        assert_eq!(garment.description(), "Prenda (desconocido) - 3");
    }

    #[test]
    fn non_object_entries_keep_their_slot() {
        let detections = extract_detections("{\"prendas\": [\"camisa\", {\"nombre\": \"Falda\"}]}").unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].to_value(), json!({}));
        assert_eq!(detections[1].nombre().as_deref(), Some("Falda"));
    }

    #[test]
    fn serializes_verbatim() {
        let value = json!({"nombre": "Camisa", "color": "azul", "tipo": "casual", "talla": "M"});
        let garment = DetectedGarment::from_value(value.clone());
        assert_eq!(serde_json::to_value(&garment).unwrap(), value);
    }
}
