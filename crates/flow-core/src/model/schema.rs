//! Esquema declarado de un stream.
//!
//! Las formas conocidas tienen un esquema fijo de un solo atributo; sólo
//! `StructuredRecord` declara atributos arbitrarios. `BoxedObject` lleva
//! además el descriptor del serializer, de modo que el lado que decodifica
//! puede reconstruirlo sin coordinación fuera de banda.
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ValueShape;
use crate::codec::SerializerDescriptor;
use crate::constants::{BINARY_ATTRIBUTE, MARKUP_ATTRIBUTE, OBJECT_ATTRIBUTE, STRING_ATTRIBUTE};

/// Tipos de atributo del formato de cable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeKind {
    Rstring,
    Int64,
    Float64,
    Boolean,
    Blob,
    Xml,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttributeKind::Rstring => "rstring",
            AttributeKind::Int64 => "int64",
            AttributeKind::Float64 => "float64",
            AttributeKind::Boolean => "boolean",
            AttributeKind::Blob => "blob",
            AttributeKind::Xml => "xml",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDecl {
    pub name: String,
    pub kind: AttributeKind,
}

impl AttributeDecl {
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self { name: name.into(), kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSchema {
    pub shape: ValueShape,
    pub attributes: Vec<AttributeDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serializer: Option<SerializerDescriptor>,
}

impl StreamSchema {
    pub fn string() -> Self {
        Self::single(ValueShape::PrimitiveString, STRING_ATTRIBUTE, AttributeKind::Rstring)
    }

    pub fn blob() -> Self {
        Self::single(ValueShape::BinaryBlob, BINARY_ATTRIBUTE, AttributeKind::Blob)
    }

    pub fn markup() -> Self {
        Self::single(ValueShape::MarkupDocument, MARKUP_ATTRIBUTE, AttributeKind::Xml)
    }

    /// Esquema de objetos embebidos ligado a un serializer concreto.
    pub fn object(serializer: SerializerDescriptor) -> Self {
        let mut s = Self::single(ValueShape::BoxedObject, OBJECT_ATTRIBUTE, AttributeKind::Blob);
        s.serializer = Some(serializer);
        s
    }

    pub fn record(attributes: Vec<AttributeDecl>) -> Self {
        Self { shape: ValueShape::StructuredRecord,
               attributes,
               serializer: None }
    }

    fn single(shape: ValueShape, name: &str, kind: AttributeKind) -> Self {
        Self { shape,
               attributes: vec![AttributeDecl::new(name, kind)],
               serializer: None }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl fmt::Display for StreamSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tuple<")?;
        for (i, a) in self.attributes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", a.kind, a.name)?;
        }
        write!(f, ">")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_schemas_render_like_spl() {
        assert_eq!(StreamSchema::string().to_string(), "tuple<rstring string>");
        assert_eq!(StreamSchema::blob().to_string(), "tuple<blob binary>");
        assert_eq!(StreamSchema::markup().to_string(), "tuple<xml document>");
        let rec = StreamSchema::record(vec![AttributeDecl::new("id", AttributeKind::Int64),
                                            AttributeDecl::new("name", AttributeKind::Rstring)]);
        assert_eq!(rec.to_string(), "tuple<int64 id, rstring name>");
        assert_eq!(rec.index_of("name"), Some(1));
    }
}
