//! Codec de registros estructurados: campos de `Value::Record` ↔ atributos
//! declarados, por nombre y con verificación de tipo.
use std::sync::Arc;

use indexmap::IndexMap;

use super::Codec;
use crate::errors::{FlowError, FlowResult};
use crate::model::{empty_blob, Attribute, AttributeKind, StreamSchema, Tuple, Value, ValueShape};

#[derive(Debug)]
pub struct RecordCodec {
    schema: Arc<StreamSchema>,
}

impl RecordCodec {
    pub fn new(schema: Arc<StreamSchema>) -> FlowResult<Self> {
        if schema.shape != ValueShape::StructuredRecord {
            return Err(FlowError::Codec(format!("record codec needs a StructuredRecord schema, got {:?}", schema.shape)));
        }
        Ok(Self { schema })
    }
}

fn to_attribute(name: &str, kind: AttributeKind, value: Value) -> FlowResult<Attribute> {
    let attr = match (kind, value) {
        (AttributeKind::Rstring, Value::String(s)) => Attribute::Rstring(s),
        (AttributeKind::Int64, Value::Int(i)) => Attribute::Int64(i),
        (AttributeKind::Float64, Value::Float(x)) => Attribute::Float64(x),
        (AttributeKind::Boolean, Value::Bool(b)) => Attribute::Boolean(b),
        (AttributeKind::Blob, Value::Blob(b)) if b.is_empty() => Attribute::Blob(empty_blob()),
        (AttributeKind::Blob, Value::Blob(b)) => Attribute::Blob(Arc::from(b)),
        (AttributeKind::Xml, Value::Markup(doc)) => Attribute::Xml(doc),
        (kind, other) => {
            return Err(FlowError::Codec(format!("field '{name}': cannot store {} in {kind}", other.type_name())));
        }
    };
    Ok(attr)
}

fn from_attribute(attr: &Attribute) -> FlowResult<Value> {
    let v = match attr {
        Attribute::Rstring(s) => Value::String(s.clone()),
        Attribute::Int64(i) => Value::Int(*i),
        Attribute::Float64(x) => Value::Float(*x),
        Attribute::Boolean(b) => Value::Bool(*b),
        Attribute::Blob(b) if b.is_empty() => Value::Blob(Vec::new()),
        Attribute::Blob(b) => Value::Blob(b.to_vec()),
        Attribute::Xml(doc) => Value::Markup(doc.clone()),
        Attribute::Object(_) => return Err(FlowError::Codec("object payload inside a record tuple".into())),
    };
    Ok(v)
}

impl Codec for RecordCodec {
    fn shape(&self) -> ValueShape {
        ValueShape::StructuredRecord
    }

    fn schema(&self) -> Arc<StreamSchema> {
        self.schema.clone()
    }

    fn encode(&self, value: Value) -> FlowResult<Tuple> {
        let mut fields = match value {
            Value::Record(fields) => fields,
            other => return Err(FlowError::Codec(format!("cannot encode {} value as record", other.type_name()))),
        };
        let mut attributes = Vec::with_capacity(self.schema.len());
        for decl in &self.schema.attributes {
            let v = fields.shift_remove(&decl.name)
                          .ok_or_else(|| FlowError::Codec(format!("missing field '{}' for {}", decl.name, self.schema)))?;
            attributes.push(to_attribute(&decl.name, decl.kind, v)?);
        }
        if !fields.is_empty() {
            let extra: Vec<&String> = fields.keys().collect();
            return Err(FlowError::Codec(format!("fields {extra:?} not declared in {}", self.schema)));
        }
        Tuple::new(self.schema(), attributes)
    }

    fn decode(&self, tuple: &Tuple) -> FlowResult<Value> {
        if tuple.schema().as_ref() != self.schema.as_ref() {
            return Err(FlowError::Codec(format!("expected {}, got {}", self.schema, tuple.schema())));
        }
        let mut fields = IndexMap::with_capacity(self.schema.len());
        for (decl, attr) in self.schema.attributes.iter().zip(tuple.attributes()) {
            fields.insert(decl.name.clone(), from_attribute(attr)?);
        }
        Ok(Value::Record(fields))
    }
}
