//! Descripción del grafo consumida por el contenedor.
//!
//! Por stream: forma declarada, atributos y descriptor opcional del
//! serializer (texto base64). Por operador: su lógica serializada. La
//! construcción del grafo es externa; `Topology` es el punto mínimo donde el
//! runtime añade elementos (condiciones independientes de stream).
use serde::{Deserialize, Serialize};

use crate::codec::SerializerDescriptor;
use crate::errors::{FlowError, FlowResult};
use crate::logic::LogicSpec;
use crate::model::{AttributeDecl, StreamSchema, ValueShape};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDecl {
    pub name: String,
    pub shape: ValueShape,
    pub attributes: Vec<AttributeDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serializer: Option<String>,
}

impl StreamDecl {
    pub fn from_schema(name: impl Into<String>, schema: &StreamSchema) -> Self {
        Self { name: name.into(),
               shape: schema.shape,
               attributes: schema.attributes.clone(),
               serializer: schema.serializer.as_ref().map(SerializerDescriptor::to_text) }
    }

    pub fn schema(&self) -> FlowResult<StreamSchema> {
        let serializer = self.serializer.as_deref().map(SerializerDescriptor::from_text).transpose()?;
        Ok(StreamSchema { shape: self.shape,
                          attributes: self.attributes.clone(),
                          serializer })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub logic: LogicSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDescription {
    pub name: String,
    pub streams: Vec<StreamDecl>,
    pub operators: Vec<OperatorDecl>,
}

impl GraphDescription {
    pub fn stream(&self, name: &str) -> Option<&StreamDecl> {
        self.streams.iter().find(|s| s.name == name)
    }

    pub fn operator(&self, name: &str) -> Option<&OperatorDecl> {
        self.operators.iter().find(|o| o.name == name)
    }

    pub fn to_json(&self) -> FlowResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| FlowError::Internal(format!("graph to json: {e}")))
    }

    pub fn from_json(text: &str) -> FlowResult<Self> {
        serde_json::from_str(text).map_err(FlowError::deserialization)
    }
}

/// Constructor incremental de `GraphDescription`.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    graph: GraphDescription,
}

impl Topology {
    pub fn new(name: impl Into<String>) -> Self {
        Self { graph: GraphDescription { name: name.into(),
                                         ..GraphDescription::default() } }
    }

    pub fn name(&self) -> &str {
        &self.graph.name
    }

    pub fn add_stream(&mut self, name: &str, schema: &StreamSchema) -> FlowResult<()> {
        if self.graph.stream(name).is_some() {
            return Err(FlowError::Internal(format!("stream '{name}' already declared")));
        }
        self.graph.streams.push(StreamDecl::from_schema(name, schema));
        Ok(())
    }

    pub fn add_operator(&mut self, op: OperatorDecl) -> FlowResult<()> {
        if self.graph.operator(&op.name).is_some() {
            return Err(FlowError::Internal(format!("operator '{}' already declared", op.name)));
        }
        for stream in op.input.iter().chain(op.output.iter()) {
            if self.graph.stream(stream).is_none() {
                return Err(FlowError::Internal(format!("operator '{}' references unknown stream '{stream}'", op.name)));
            }
        }
        self.graph.operators.push(op);
        Ok(())
    }

    pub fn graph(&self) -> &GraphDescription {
        &self.graph
    }

    pub fn into_description(self) -> GraphDescription {
        self.graph
    }
}
