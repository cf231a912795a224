//! Ejecución de un grafo completo dentro de un único contenedor.
//!
//! Es el "job" del modo embebido: instala cada operador, encamina los tuples
//! por nombre de stream y simula la restauración desde checkpoint
//! reinstalando la lógica de todos los operadores.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use flow_core::model::Tuple;
use flow_core::{ContainerContext, FlowResult, FunctionOperator, GraphDescription, LogicHandle, MetricSource,
                RegionControl, Value};
use log::{debug, info};

use crate::errors::{OracleError, OracleResult};
use crate::tester::JobView;

/// Región consistente local: anota las peticiones de reset para que el
/// harness las aplique fuera del hilo que las pide.
#[derive(Debug, Default)]
pub struct LocalRegion {
    pending: AtomicU64,
    requested: AtomicU64,
}

impl LocalRegion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requested(&self) -> u64 {
        self.requested.load(Ordering::SeqCst)
    }

    /// Peticiones aún no aplicadas (y las marca como aplicadas).
    pub fn take_pending(&self) -> u64 {
        self.pending.swap(0, Ordering::SeqCst)
    }
}

impl RegionControl for LocalRegion {
    fn request_reset(&self) -> FlowResult<()> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.requested.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Deployed {
    input: Option<String>,
    output: Option<String>,
    operator: FunctionOperator,
}

pub struct LocalJob {
    ctx: Arc<ContainerContext>,
    graph: GraphDescription,
    deployed: Vec<Deployed>,
}

impl LocalJob {
    pub fn submit(ctx: Arc<ContainerContext>, graph: GraphDescription) -> OracleResult<Self> {
        let mut deployed: Vec<Deployed> = Vec::with_capacity(graph.operators.len());
        for decl in &graph.operators {
            match FunctionOperator::from_decl(ctx.clone(), &graph, decl) {
                Ok(operator) => deployed.push(Deployed { input: decl.input.clone(),
                                                         output: decl.output.clone(),
                                                         operator }),
                Err(e) => {
                    for d in deployed.iter().rev() {
                        d.operator.close();
                    }
                    return Err(e.into());
                }
            }
        }
        info!(target: ctx.log_target(), "job:submitted graph={} operators={}", graph.name, deployed.len());
        Ok(Self { ctx,
                  graph,
                  deployed })
    }

    pub fn context(&self) -> &Arc<ContainerContext> {
        &self.ctx
    }

    pub fn graph(&self) -> &GraphDescription {
        &self.graph
    }

    /// Inyecta un valor en `stream` y lo propaga por el grafo.
    pub fn send(&self, stream: &str, value: Value) -> OracleResult<()> {
        let decl = self.graph
                       .stream(stream)
                       .ok_or_else(|| OracleError::UnknownStream(stream.to_string()))?;
        let codec = self.ctx.codecs().resolve_schema(&decl.schema()?)?;
        let tuple = codec.encode(value)?;
        self.deliver(stream, &tuple)
    }

    fn deliver(&self, stream: &str, tuple: &Tuple) -> OracleResult<()> {
        for d in self.deployed.iter().filter(|d| d.input.as_deref() == Some(stream)) {
            if let (Some(out), Some(next)) = (d.operator.process(tuple)?, d.output.as_deref()) {
                self.deliver(next, &out)?;
            }
        }
        Ok(())
    }

    /// Restauración simulada: cada operador reinstala su lógica.
    pub fn restore(&self) -> OracleResult<()> {
        for d in &self.deployed {
            let handle = d.operator.handle();
            handle.reinitialize(&handle.spec())?;
        }
        info!(target: self.ctx.log_target(), "job:restored operators={}", self.deployed.len());
        Ok(())
    }

    /// Aplica los resets pedidos a `region`. Devuelve si hubo alguno.
    pub fn apply_resets(&self, region: &LocalRegion) -> OracleResult<bool> {
        let pending = region.take_pending();
        if pending == 0 {
            return Ok(false);
        }
        debug!(target: self.ctx.log_target(), "job:apply_resets pending={pending}");
        self.restore()?;
        Ok(true)
    }

    pub fn shutdown(&self) {
        for d in self.deployed.iter().rev() {
            d.operator.close();
        }
    }
}

impl JobView for LocalJob {
    fn operator_handle(&self, operator: &str) -> Option<Arc<dyn LogicHandle>> {
        self.deployed
            .iter()
            .find(|d| d.operator.name() == operator)
            .map(|d| d.operator.handle().clone())
    }

    fn metric_source(&self) -> Arc<dyn MetricSource> {
        self.ctx.clone()
    }
}

impl Drop for LocalJob {
    fn drop(&mut self) {
        self.shutdown();
    }
}
