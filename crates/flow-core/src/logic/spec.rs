//! `LogicSpec`: forma serializada de la lógica de usuario.
//!
//! Los bytes son un sobre JSON `{"logic": <id de fábrica>, "params": {...}}`.
//! En la descripción del grafo viajan como texto base64; embebidos en un
//! atributo blob viajan como bytes crudos.
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::constants::RUNTIME_VERSION;
use crate::errors::{FlowError, FlowResult};
use crate::hashing::hash_bytes;
use crate::model::ValueShape;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogicEnvelope {
    pub logic: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicSpec {
    /// Forma de los valores que recibe la lógica.
    pub shape: ValueShape,
    #[serde(with = "base64_text")]
    pub bytes: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serializer_id: Option<String>,
}

impl LogicSpec {
    pub fn new(shape: ValueShape, logic: &str, params: serde_json::Value) -> FlowResult<Self> {
        let envelope = LogicEnvelope { logic: logic.to_string(),
                                       params };
        let bytes = serde_json::to_vec(&envelope).map_err(|e| FlowError::Internal(format!("encode envelope: {e}")))?;
        Ok(Self { shape,
                  bytes,
                  serializer_id: None })
    }

    pub fn from_bytes(shape: ValueShape, bytes: Vec<u8>) -> Self {
        Self { shape,
               bytes,
               serializer_id: None }
    }

    pub fn with_serializer(mut self, id: impl Into<String>) -> Self {
        self.serializer_id = Some(id.into());
        self
    }

    /// Decodifica el sobre. Bytes corruptos ⇒ `FlowError::Deserialization`.
    pub fn envelope(&self) -> FlowResult<LogicEnvelope> {
        serde_json::from_slice(&self.bytes).map_err(|e| FlowError::Deserialization(format!("logic envelope: {e}")))
    }

    pub fn to_text(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn from_text(shape: ValueShape, text: &str) -> FlowResult<Self> {
        let bytes = BASE64.decode(text.trim()).map_err(FlowError::deserialization)?;
        Ok(Self::from_bytes(shape, bytes))
    }

    /// Identidad estable de los bytes (incluye la versión del runtime).
    pub fn fingerprint(&self) -> String {
        let mut input = Vec::with_capacity(RUNTIME_VERSION.len() + self.bytes.len());
        input.extend_from_slice(RUNTIME_VERSION.as_bytes());
        input.extend_from_slice(&self.bytes);
        hash_bytes(&input)
    }
}

mod base64_text {
    use super::BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        BASE64.decode(text.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spec_embeds_as_base64_text_in_json() {
        let spec = LogicSpec::new(ValueShape::PrimitiveString, "upper", json!({"n": 1})).expect("spec");
        let text = serde_json::to_string(&spec).expect("serialize");
        assert!(text.contains(&spec.to_text()));
        let back: LogicSpec = serde_json::from_str(&text).expect("deserialize");
        assert_eq!(back, spec);
        assert_eq!(back.envelope().expect("envelope").logic, "upper");
    }

    #[test]
    fn corrupt_bytes_fail_with_deserialization() {
        let spec = LogicSpec::from_bytes(ValueShape::BinaryBlob, vec![0xff, 0x00, 0x13]);
        assert!(matches!(spec.envelope(), Err(FlowError::Deserialization(_))));
        assert!(LogicSpec::from_text(ValueShape::BinaryBlob, "not base64!").is_err());
    }

    #[test]
    fn fingerprint_tracks_bytes() {
        let a = LogicSpec::new(ValueShape::PrimitiveString, "a", json!(null)).expect("spec");
        let b = LogicSpec::new(ValueShape::PrimitiveString, "b", json!(null)).expect("spec");
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
    }
}
