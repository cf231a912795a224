//! Codecs sin estado para las formas conocidas (string, blob, markup).
//!
//! Son singletons: `CodecRegistry::resolve` devuelve siempre el mismo `Arc`.
use std::sync::Arc;

use once_cell::sync::Lazy;

use super::Codec;
use crate::errors::{FlowError, FlowResult};
use crate::model::{empty_blob, Attribute, StreamSchema, Tuple, Value, ValueShape};

static STRING_SCHEMA: Lazy<Arc<StreamSchema>> = Lazy::new(|| Arc::new(StreamSchema::string()));
static BLOB_SCHEMA: Lazy<Arc<StreamSchema>> = Lazy::new(|| Arc::new(StreamSchema::blob()));
static MARKUP_SCHEMA: Lazy<Arc<StreamSchema>> = Lazy::new(|| Arc::new(StreamSchema::markup()));

pub(crate) static STRING_CODEC: Lazy<Arc<dyn Codec>> = Lazy::new(|| Arc::new(StringCodec));
pub(crate) static BLOB_CODEC: Lazy<Arc<dyn Codec>> = Lazy::new(|| Arc::new(BlobCodec));
pub(crate) static MARKUP_CODEC: Lazy<Arc<dyn Codec>> = Lazy::new(|| Arc::new(MarkupCodec));

/// Extrae el único atributo de un tuple tras verificar la forma.
fn single_attribute(tuple: &Tuple, shape: ValueShape) -> FlowResult<&Attribute> {
    if tuple.schema().shape != shape {
        return Err(FlowError::Codec(format!("expected {:?} tuple, got {:?} ({})",
                                            shape,
                                            tuple.schema().shape,
                                            tuple.schema())));
    }
    tuple.get(0)
         .ok_or_else(|| FlowError::Codec(format!("empty tuple for {shape:?}")))
}

fn mismatch(shape: ValueShape, value: &Value) -> FlowError {
    FlowError::Codec(format!("cannot encode {} value as {:?}", value.type_name(), shape))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl Codec for StringCodec {
    fn shape(&self) -> ValueShape {
        ValueShape::PrimitiveString
    }

    fn schema(&self) -> Arc<StreamSchema> {
        STRING_SCHEMA.clone()
    }

    fn encode(&self, value: Value) -> FlowResult<Tuple> {
        match value {
            Value::String(s) => Tuple::new(self.schema(), vec![Attribute::Rstring(s)]),
            other => Err(mismatch(self.shape(), &other)),
        }
    }

    fn decode(&self, tuple: &Tuple) -> FlowResult<Value> {
        match single_attribute(tuple, self.shape())? {
            Attribute::Rstring(s) => Ok(Value::String(s.clone())),
            other => Err(FlowError::Codec(format!("unexpected {} attribute", other.kind()))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BlobCodec;

impl Codec for BlobCodec {
    fn shape(&self) -> ValueShape {
        ValueShape::BinaryBlob
    }

    fn schema(&self) -> Arc<StreamSchema> {
        BLOB_SCHEMA.clone()
    }

    fn encode(&self, value: Value) -> FlowResult<Tuple> {
        match value {
            Value::Blob(bytes) if bytes.is_empty() => Tuple::new(self.schema(), vec![Attribute::Blob(empty_blob())]),
            Value::Blob(bytes) => Tuple::new(self.schema(), vec![Attribute::Blob(Arc::from(bytes))]),
            other => Err(mismatch(self.shape(), &other)),
        }
    }

    fn decode(&self, tuple: &Tuple) -> FlowResult<Value> {
        match single_attribute(tuple, self.shape())? {
            // Vec::new no reserva memoria.
            Attribute::Blob(b) if b.is_empty() => Ok(Value::Blob(Vec::new())),
            Attribute::Blob(b) => Ok(Value::Blob(b.to_vec())),
            other => Err(FlowError::Codec(format!("unexpected {} attribute", other.kind()))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupCodec;

impl Codec for MarkupCodec {
    fn shape(&self) -> ValueShape {
        ValueShape::MarkupDocument
    }

    fn schema(&self) -> Arc<StreamSchema> {
        MARKUP_SCHEMA.clone()
    }

    fn encode(&self, value: Value) -> FlowResult<Tuple> {
        match value {
            Value::Markup(doc) => Tuple::new(self.schema(), vec![Attribute::Xml(doc)]),
            other => Err(mismatch(self.shape(), &other)),
        }
    }

    fn decode(&self, tuple: &Tuple) -> FlowResult<Value> {
        match single_attribute(tuple, self.shape())? {
            Attribute::Xml(doc) => Ok(Value::Markup(doc.clone())),
            other => Err(FlowError::Codec(format!("unexpected {} attribute", other.kind()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_roundtrip_including_empty() {
        for v in [vec![], vec![0u8], vec![1, 2, 3, 255]] {
            let t = BlobCodec.encode(Value::Blob(v.clone())).expect("encode");
            assert_eq!(BlobCodec.decode(&t).expect("decode"), Value::Blob(v));
        }
    }

    #[test]
    fn empty_blobs_share_the_payload() {
        let a = BlobCodec.encode(Value::Blob(vec![])).expect("encode");
        let b = BlobCodec.encode(Value::Blob(Vec::with_capacity(16))).expect("encode");
        match (a.get(0), b.get(0)) {
            (Some(Attribute::Blob(x)), Some(Attribute::Blob(y))) => assert!(Arc::ptr_eq(x, y)),
            _ => panic!("expected blob attributes"),
        }
    }

    #[test]
    fn shape_mismatch_is_reported() {
        assert!(matches!(StringCodec.encode(Value::Int(1)), Err(FlowError::Codec(_))));
        let t = MarkupCodec.encode(Value::Markup("<a/>".into())).expect("encode");
        assert!(StringCodec.decode(&t).is_err());
        assert_eq!(MarkupCodec.decode(&t).expect("decode"), Value::Markup("<a/>".into()));
    }
}
