//! Representación de cable de un dato (`Tuple`).
use std::sync::Arc;

use once_cell::sync::Lazy;

use super::{AttributeKind, StreamSchema};
use crate::codec::ObjectPayload;
use crate::errors::{FlowError, FlowResult};

// Buffer vacío compartido: los blobs de longitud cero no reservan payload.
static EMPTY_BLOB: Lazy<Arc<[u8]>> = Lazy::new(|| Arc::from(Vec::<u8>::new()));

/// Devuelve el buffer vacío compartido.
pub fn empty_blob() -> Arc<[u8]> {
    EMPTY_BLOB.clone()
}

#[derive(Debug, Clone)]
pub enum Attribute {
    Rstring(String),
    Int64(i64),
    Float64(f64),
    Boolean(bool),
    Blob(Arc<[u8]>),
    Xml(String),
    /// Blob que transporta un objeto embebido (vivo o ya en bytes).
    Object(ObjectPayload),
}

impl Attribute {
    pub fn kind(&self) -> AttributeKind {
        match self {
            Attribute::Rstring(_) => AttributeKind::Rstring,
            Attribute::Int64(_) => AttributeKind::Int64,
            Attribute::Float64(_) => AttributeKind::Float64,
            Attribute::Boolean(_) => AttributeKind::Boolean,
            Attribute::Blob(_) | Attribute::Object(_) => AttributeKind::Blob,
            Attribute::Xml(_) => AttributeKind::Xml,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tuple {
    schema: Arc<StreamSchema>,
    attributes: Vec<Attribute>,
}

impl Tuple {
    /// Crea un tuple verificando aridad y tipos contra el esquema.
    pub fn new(schema: Arc<StreamSchema>, attributes: Vec<Attribute>) -> FlowResult<Self> {
        if schema.len() != attributes.len() {
            return Err(FlowError::Codec(format!("schema {} expects {} attributes, got {}",
                                                schema,
                                                schema.len(),
                                                attributes.len())));
        }
        for (decl, attr) in schema.attributes.iter().zip(attributes.iter()) {
            if decl.kind != attr.kind() {
                return Err(FlowError::Codec(format!("attribute '{}' declared {} but got {}",
                                                    decl.name,
                                                    decl.kind,
                                                    attr.kind())));
            }
        }
        Ok(Self { schema, attributes })
    }

    pub fn schema(&self) -> &Arc<StreamSchema> {
        &self.schema
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn get(&self, index: usize) -> Option<&Attribute> {
        self.attributes.get(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Attribute> {
        self.schema.index_of(name).and_then(|i| self.attributes.get(i))
    }

    /// Forma que tendría el tuple al cruzar a otro proceso: los objetos vivos
    /// se sustituyen por sus bytes (cacheados en el objeto).
    pub fn materialize(&self) -> FlowResult<Tuple> {
        let mut attributes = Vec::with_capacity(self.attributes.len());
        for attr in &self.attributes {
            let a = match attr {
                Attribute::Object(ObjectPayload::Live(live)) => Attribute::Object(ObjectPayload::Bytes(live.bytes()?)),
                other => other.clone(),
            };
            attributes.push(a);
        }
        Ok(Self { schema: self.schema.clone(),
                  attributes })
    }
}
