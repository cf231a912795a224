//! Serializers enchufables para objetos embebidos.
//!
//! Un serializer se identifica con un `SerializerDescriptor` autodescriptivo
//! (id + versión + opciones). El descriptor viaja en el esquema del stream
//! como texto base64 y el lado receptor reconstruye el serializer a partir de
//! él mediante la fábrica registrada con ese id.
use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_SERIALIZER_ID;
use crate::errors::{FlowError, FlowResult};
use crate::hashing::{hash_value, to_canonical_json};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializerDescriptor {
    pub id: String,
    pub version: u32,
    #[serde(default)]
    pub options: serde_json::Value,
}

impl SerializerDescriptor {
    pub fn new(id: impl Into<String>, version: u32) -> Self {
        Self { id: id.into(),
               version,
               options: serde_json::Value::Null }
    }

    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = options;
        self
    }

    fn as_json(&self) -> serde_json::Value {
        serde_json::json!({ "id": self.id, "version": self.version, "options": self.options })
    }

    /// Forma textual (base64 de JSON canónico) embebible en la descripción del grafo.
    pub fn to_text(&self) -> String {
        BASE64.encode(to_canonical_json(&self.as_json()))
    }

    pub fn from_text(text: &str) -> FlowResult<Self> {
        let raw = BASE64.decode(text.trim()).map_err(FlowError::deserialization)?;
        serde_json::from_slice(&raw).map_err(FlowError::deserialization)
    }

    pub fn fingerprint(&self) -> String {
        hash_value(&self.as_json())
    }
}

impl fmt::Display for SerializerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", self.id, self.version)
    }
}

/// Convierte objetos embebidos a bytes y de vuelta.
pub trait Serializer: Send + Sync + fmt::Debug {
    fn descriptor(&self) -> SerializerDescriptor;
    fn serialize(&self, value: &serde_json::Value) -> FlowResult<Vec<u8>>;
    fn deserialize(&self, bytes: &[u8]) -> FlowResult<serde_json::Value>;
}

/// Reconstruye un serializer a partir de su descriptor.
pub type SerializerFactory = Arc<dyn Fn(&SerializerDescriptor) -> FlowResult<Arc<dyn Serializer>> + Send + Sync>;

/// Serializer por defecto: JSON compacto.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub const VERSION: u32 = 1;

    pub fn factory() -> SerializerFactory {
        Arc::new(|d: &SerializerDescriptor| {
            if d.version != Self::VERSION {
                return Err(FlowError::Deserialization(format!("incompatible serializer {d}, expected v{}",
                                                              Self::VERSION)));
            }
            Ok(Arc::new(JsonSerializer) as Arc<dyn Serializer>)
        })
    }
}

impl Serializer for JsonSerializer {
    fn descriptor(&self) -> SerializerDescriptor {
        SerializerDescriptor::new(DEFAULT_SERIALIZER_ID, Self::VERSION)
    }

    fn serialize(&self, value: &serde_json::Value) -> FlowResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(FlowError::codec)
    }

    fn deserialize(&self, bytes: &[u8]) -> FlowResult<serde_json::Value> {
        serde_json::from_slice(bytes).map_err(FlowError::codec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_text_roundtrip_is_stable() {
        let d = SerializerDescriptor::new("json", 1).with_options(json!({"b": 1, "a": 2}));
        let text = d.to_text();
        let back = SerializerDescriptor::from_text(&text).expect("decode descriptor");
        assert_eq!(back, d);
        assert_eq!(back.fingerprint(), d.fingerprint());
        assert_eq!(back.fingerprint().len(), 64);
    }

    #[test]
    fn corrupt_descriptor_is_a_deserialization_error() {
        assert!(matches!(SerializerDescriptor::from_text("%%%"), Err(FlowError::Deserialization(_))));
    }

    #[test]
    fn json_factory_rejects_other_versions() {
        let f = JsonSerializer::factory();
        assert!(f(&SerializerDescriptor::new("json", 1)).is_ok());
        assert!(f(&SerializerDescriptor::new("json", 2)).is_err());
    }
}
