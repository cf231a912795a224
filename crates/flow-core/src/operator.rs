//! Pegamento contenedor ↔ lógica: decodifica el tuple de entrada, invoca el
//! handle y codifica el valor devuelto con el codec de salida.
use std::sync::Arc;

use log::trace;

use crate::codec::Codec;
use crate::context::ContainerContext;
use crate::errors::{FlowError, FlowResult};
use crate::graph::{GraphDescription, OperatorDecl, StreamDecl};
use crate::logic::{new_handle, LogicHandle};
use crate::model::{Tuple, ValueShape};

pub struct FunctionOperator {
    name: String,
    input: Option<Arc<dyn Codec>>,
    output: Option<Arc<dyn Codec>>,
    handle: Arc<dyn LogicHandle>,
    ctx: Arc<ContainerContext>,
}

impl FunctionOperator {
    /// Instala el operador `decl` del grafo en el contenedor.
    pub fn from_decl(ctx: Arc<ContainerContext>, graph: &GraphDescription, decl: &OperatorDecl) -> FlowResult<Self> {
        let resolve = |stream: Option<&StreamDecl>| -> FlowResult<Option<Arc<dyn Codec>>> {
            match stream {
                None => Ok(None),
                Some(d) => Ok(Some(ctx.codecs().resolve_schema(&d.schema()?)?)),
            }
        };
        let input_decl = lookup(graph, decl.input.as_deref())?;
        if let Some(input_decl) = input_decl {
            check_logic_input(&ctx, decl, input_decl)?;
        }
        let input = resolve(input_decl)?;
        let output = resolve(lookup(graph, decl.output.as_deref())?)?;
        let handle = new_handle(ctx.clone(), &decl.logic)?;
        Ok(Self { name: decl.name.clone(),
                  input,
                  output,
                  handle,
                  ctx })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> &Arc<dyn LogicHandle> {
        &self.handle
    }

    pub fn process(&self, tuple: &Tuple) -> FlowResult<Option<Tuple>> {
        let codec = self.input
                        .as_ref()
                        .ok_or_else(|| FlowError::Internal(format!("operator '{}' has no input stream", self.name)))?;
        let value = codec.decode(tuple)?;
        trace!(target: self.ctx.log_target(), "process operator={} value={value}", self.name);
        match (self.handle.invoke(value)?, &self.output) {
            (Some(out), Some(codec)) => Ok(Some(codec.encode(out)?)),
            // Sin stream de salida el valor devuelto se descarta.
            (Some(_), None) | (None, _) => Ok(None),
        }
    }

    pub fn close(&self) {
        self.handle.close();
    }
}

fn lookup<'g>(graph: &'g GraphDescription, name: Option<&str>) -> FlowResult<Option<&'g StreamDecl>> {
    match name {
        None => Ok(None),
        Some(name) => graph.stream(name)
                           .map(Some)
                           .ok_or_else(|| FlowError::Internal(format!("unknown stream '{name}'"))),
    }
}

/// La lógica debe declarar la forma del stream que consume y, si fija un
/// serializer, el mismo que usa ese stream.
fn check_logic_input(ctx: &ContainerContext, decl: &OperatorDecl, input: &StreamDecl) -> FlowResult<()> {
    let logic = &decl.logic;
    if logic.shape != input.shape {
        return Err(FlowError::Config(format!("operator '{}' logic expects {:?} but stream '{}' carries {:?}",
                                             decl.name, logic.shape, input.name, input.shape)));
    }
    let Some(id) = logic.serializer_id.as_deref() else { return Ok(()) };
    if logic.shape != ValueShape::BoxedObject {
        return Err(FlowError::Config(format!("operator '{}' names serializer '{id}' for a {:?} stream",
                                             decl.name, logic.shape)));
    }
    if !ctx.codecs().has_serializer(id) {
        return Err(FlowError::UnknownSerializer(id.to_string()));
    }
    let stream_id = match input.schema()?.serializer {
        Some(d) => d.id,
        None => ctx.codecs().default_serializer_id().to_string(),
    };
    if stream_id != id {
        return Err(FlowError::Config(format!("operator '{}' logic serializer '{id}' differs from stream '{}' serializer '{stream_id}'",
                                             decl.name, input.name)));
    }
    Ok(())
}
