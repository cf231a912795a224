//! Codec de objetos embebidos (`BoxedObject`).
//!
//! Dos codificaciones físicas del mismo atributo blob:
//! - `ObjectPayload::Live`: el productor está en el mismo proceso y el objeto
//!   viaja tal cual. Decodificar no deserializa nada.
//! - `ObjectPayload::Bytes`: el tuple llegó de otro proceso; se deserializa
//!   con el serializer del esquema.
//!
//! Los bytes de un objeto vivo se calculan perezosamente la primera vez que
//! alguien los pide (`LiveObject::bytes`) y se cachean: distintos accesores
//! del tuple los solicitan repetidamente.
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::{Codec, Serializer};
use crate::errors::{FlowError, FlowResult};
use crate::model::{Attribute, StreamSchema, Tuple, Value, ValueShape};

pub struct LiveObject {
    value: Arc<serde_json::Value>,
    serializer: Arc<dyn Serializer>,
    bytes: OnceCell<Arc<[u8]>>,
}

impl LiveObject {
    pub fn new(value: Arc<serde_json::Value>, serializer: Arc<dyn Serializer>) -> Self {
        Self { value,
               serializer,
               bytes: OnceCell::new() }
    }

    pub fn value(&self) -> &Arc<serde_json::Value> {
        &self.value
    }

    /// Bytes del objeto, serializados una sola vez.
    pub fn bytes(&self) -> FlowResult<Arc<[u8]>> {
        self.bytes
            .get_or_try_init(|| self.serializer.serialize(&self.value).map(Arc::from))
            .cloned()
    }

    pub fn is_encoded(&self) -> bool {
        self.bytes.get().is_some()
    }
}

impl fmt::Debug for LiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveObject")
         .field("value", &self.value)
         .field("serializer", &self.serializer.descriptor())
         .field("encoded", &self.is_encoded())
         .finish()
    }
}

#[derive(Debug, Clone)]
pub enum ObjectPayload {
    Live(Arc<LiveObject>),
    Bytes(Arc<[u8]>),
}

/// Codec ligado a un serializer concreto.
#[derive(Debug)]
pub struct ObjectCodec {
    serializer: Arc<dyn Serializer>,
    schema: Arc<StreamSchema>,
}

impl ObjectCodec {
    pub fn new(serializer: Arc<dyn Serializer>) -> Self {
        let schema = Arc::new(StreamSchema::object(serializer.descriptor()));
        Self { serializer, schema }
    }

    pub fn serializer(&self) -> &Arc<dyn Serializer> {
        &self.serializer
    }
}

impl Codec for ObjectCodec {
    fn shape(&self) -> ValueShape {
        ValueShape::BoxedObject
    }

    fn schema(&self) -> Arc<StreamSchema> {
        self.schema.clone()
    }

    /// Siempre produce la forma viva; la serialización queda diferida.
    fn encode(&self, value: Value) -> FlowResult<Tuple> {
        let object = match value {
            Value::Object(o) => o,
            other => return Err(FlowError::Codec(format!("cannot encode {} value as BoxedObject", other.type_name()))),
        };
        let live = LiveObject::new(object, self.serializer.clone());
        Tuple::new(self.schema(), vec![Attribute::Object(ObjectPayload::Live(Arc::new(live)))])
    }

    fn decode(&self, tuple: &Tuple) -> FlowResult<Value> {
        if tuple.schema().shape != ValueShape::BoxedObject {
            return Err(FlowError::Codec(format!("expected BoxedObject tuple, got {}", tuple.schema())));
        }
        match tuple.get(0) {
            Some(Attribute::Object(ObjectPayload::Live(live))) => Ok(Value::Object(live.value().clone())),
            Some(Attribute::Object(ObjectPayload::Bytes(bytes))) => {
                let v = self.serializer
                            .deserialize(bytes)
                            .map_err(|e| FlowError::Codec(format!("object decode via {}: {e}", self.serializer.descriptor())))?;
                Ok(Value::Object(Arc::new(v)))
            }
            // Un blob plano producido fuera del runtime: mismos bytes.
            Some(Attribute::Blob(bytes)) => {
                let v = self.serializer.deserialize(bytes)?;
                Ok(Value::Object(Arc::new(v)))
            }
            Some(other) => Err(FlowError::Codec(format!("unexpected {} attribute", other.kind()))),
            None => Err(FlowError::Codec("empty object tuple".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonSerializer;
    use serde_json::json;

    #[test]
    fn live_path_shares_the_object() {
        let codec = ObjectCodec::new(Arc::new(JsonSerializer));
        let obj = Arc::new(json!({"a": [1, 2]}));
        let t = codec.encode(Value::Object(obj.clone())).expect("encode");
        match codec.decode(&t).expect("decode") {
            Value::Object(back) => assert!(Arc::ptr_eq(&back, &obj)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bytes_are_cached_after_first_request() {
        let live = LiveObject::new(Arc::new(json!("x")), Arc::new(JsonSerializer));
        assert!(!live.is_encoded());
        let a = live.bytes().expect("bytes");
        let b = live.bytes().expect("bytes");
        assert!(live.is_encoded());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn materialized_tuple_decodes_through_serializer() {
        let codec = ObjectCodec::new(Arc::new(JsonSerializer));
        let t = codec.encode(Value::object(json!({"k": "v"}))).expect("encode");
        let wire = t.materialize().expect("materialize");
        assert!(matches!(wire.get(0), Some(Attribute::Object(ObjectPayload::Bytes(_)))));
        assert_eq!(codec.decode(&wire).expect("decode"), Value::object(json!({"k": "v"})));
    }
}
