//! Registro de codecs: forma declarada → codec.
//!
//! - String/Blob/Markup: singletons sin estado.
//! - BoxedObject: codec ligado a un serializer (por defecto o del llamador),
//!   identificado por su descriptor para que el receptor lo reconstruya.
//! - StructuredRecord: requiere el esquema completo (`resolve_schema`).
//!
//! Ningún fallo de serializer se descarta: se envuelve en `FlowError::Codec`.

mod builtin;
mod object;
mod record;
mod serializer;

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use log::debug;

pub use builtin::{BlobCodec, MarkupCodec, StringCodec};
pub use object::{LiveObject, ObjectCodec, ObjectPayload};
pub use record::RecordCodec;
pub use serializer::{JsonSerializer, Serializer, SerializerDescriptor, SerializerFactory};

use crate::config::CONFIG;
use crate::constants::DEFAULT_SERIALIZER_ID;
use crate::errors::{FlowError, FlowResult};
use crate::model::{StreamSchema, Tuple, Value, ValueShape};

/// Par de funciones puras Value ↔ Tuple para un esquema.
pub trait Codec: Send + Sync + fmt::Debug {
    fn shape(&self) -> ValueShape;
    fn schema(&self) -> Arc<StreamSchema>;
    fn encode(&self, value: Value) -> FlowResult<Tuple>;
    fn decode(&self, tuple: &Tuple) -> FlowResult<Value>;
}

pub struct CodecRegistry {
    factories: DashMap<String, SerializerFactory>,
    default_serializer: String,
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("CodecRegistry")
         .field("serializers", &ids)
         .field("default_serializer", &self.default_serializer)
         .finish()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistry {
    /// Registro con el serializer JSON y el default de la configuración.
    pub fn new() -> Self {
        Self::with_default_serializer(&CONFIG.default_serializer)
    }

    pub fn with_default_serializer(id: &str) -> Self {
        let factories: DashMap<String, SerializerFactory> = DashMap::new();
        factories.insert(DEFAULT_SERIALIZER_ID.to_string(), JsonSerializer::factory());
        Self { factories,
               default_serializer: id.to_string() }
    }

    /// Registra (o reemplaza) la fábrica de un serializer personalizado.
    pub fn register_serializer(&self, id: impl Into<String>, factory: SerializerFactory) {
        let id = id.into();
        debug!("codec:register_serializer id={id}");
        self.factories.insert(id, factory);
    }

    /// Reconstruye un serializer a partir de su descriptor.
    pub fn serializer(&self, descriptor: &SerializerDescriptor) -> FlowResult<Arc<dyn Serializer>> {
        let factory = self.factories
                          .get(&descriptor.id)
                          .map(|f| f.value().clone())
                          .ok_or_else(|| FlowError::UnknownSerializer(descriptor.id.clone()))?;
        factory(descriptor)
    }

    pub fn has_serializer(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn default_serializer_id(&self) -> &str {
        &self.default_serializer
    }

    pub fn default_serializer(&self) -> FlowResult<Arc<dyn Serializer>> {
        // La versión 1 es la única que conocen los serializers incluidos.
        self.serializer(&SerializerDescriptor::new(self.default_serializer.clone(), JsonSerializer::VERSION))
    }

    /// Resuelve el codec de una forma. `serializer` sólo aplica a BoxedObject.
    pub fn resolve(&self, shape: ValueShape, serializer: Option<Arc<dyn Serializer>>) -> FlowResult<Arc<dyn Codec>> {
        match shape {
            ValueShape::PrimitiveString => Ok(builtin::STRING_CODEC.clone()),
            ValueShape::BinaryBlob => Ok(builtin::BLOB_CODEC.clone()),
            ValueShape::MarkupDocument => Ok(builtin::MARKUP_CODEC.clone()),
            ValueShape::BoxedObject => {
                let serializer = match serializer {
                    Some(s) => s,
                    None => self.default_serializer()?,
                };
                debug!("codec:resolve shape=BoxedObject serializer={}", serializer.descriptor());
                Ok(Arc::new(ObjectCodec::new(serializer)))
            }
            ValueShape::StructuredRecord => {
                Err(FlowError::Codec("StructuredRecord needs its declared schema (use resolve_schema)".into()))
            }
        }
    }

    /// Resuelve el codec de un esquema declarado (lado receptor).
    pub fn resolve_schema(&self, schema: &StreamSchema) -> FlowResult<Arc<dyn Codec>> {
        match schema.shape {
            ValueShape::StructuredRecord => Ok(Arc::new(RecordCodec::new(Arc::new(schema.clone()))?)),
            ValueShape::BoxedObject => {
                let serializer = match &schema.serializer {
                    Some(d) => Some(self.serializer(d)?),
                    None => None,
                };
                self.resolve(schema.shape, serializer)
            }
            shape => self.resolve(shape, None),
        }
    }
}
