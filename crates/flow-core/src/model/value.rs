//! Valores de aplicación y su forma declarada (`ValueShape`).
//!
//! Un `Value` es lo que ve la lógica de usuario; el `Tuple` es lo que viaja
//! por el cable. Los objetos embebidos (`Object`) son JSON neutral compartido
//! por `Arc`: dentro del mismo proceso nunca se copian ni se serializan.
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Forma declarada de los valores de un stream. Inmutable una vez declarada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueShape {
    PrimitiveString,
    BinaryBlob,
    MarkupDocument,
    BoxedObject,
    StructuredRecord,
}

/// Valor de aplicación.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Blob(Vec<u8>),
    Markup(String),
    Object(Arc<serde_json::Value>),
    Record(IndexMap<String, Value>),
}

impl Value {
    /// Construye un objeto embebido a partir de cualquier JSON.
    pub fn object(v: serde_json::Value) -> Self {
        Value::Object(Arc::new(v))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Markup(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<serde_json::Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Nombre corto de la variante (para diagnósticos).
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Blob(_) => "blob",
            Value::Markup(_) => "markup",
            Value::Object(_) => "object",
            Value::Record(_) => "record",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Blob(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s:?}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Blob(b) => write!(f, "blob[{}]", b.len()),
            Value::Markup(s) => write!(f, "xml({s})"),
            Value::Object(o) => write!(f, "{o}"),
            Value::Record(fields) => {
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
