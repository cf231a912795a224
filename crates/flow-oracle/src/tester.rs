//! Declaración de condiciones sobre una topología y binding tras el envío.
//!
//! Cada condición de stream añade un operador checker que consume el stream
//! observado (sin salida). El nombre de la condición determina el nombre del
//! operador, la memoria de condición y las métricas publicadas.
use std::sync::Arc;

use flow_core::logic::LogicRegistry;
use flow_core::{CoreConfig, GraphDescription, Logic, LogicHandle, LogicSpec, MetricSource, OperatorDecl, Topology,
                Value, ValueShape, CONFIG};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::checker::ConditionChecker;
use crate::condition::{Condition, EmbeddedCondition, MetricCondition, Observable};
use crate::errors::{OracleError, OracleResult};
use crate::resetter::{register_resetter, ResetCondition, Resetter, StreamIndependent};
use crate::variants::{register_checkers, to_params, Contents, ContentsParams, CountMode, CountParams, Predicate,
                      PredicateFn, TupleCount, CONTENTS_LOGIC, PREDICATE_LOGIC_PREFIX, TUPLE_COUNT_LOGIC};

pub const CHECKER_OPERATOR_PREFIX: &str = "condition:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// El harness comparte proceso con los checkers.
    Embedded,
    /// Sólo las métricas publicadas son visibles.
    Distributed,
}

/// Lo que el binding necesita del job ya enviado.
pub trait JobView {
    fn operator_handle(&self, operator: &str) -> Option<Arc<dyn LogicHandle>>;
    fn metric_source(&self) -> Arc<dyn MetricSource>;
}

type Binder = Box<dyn Fn(&dyn JobView, ExecutionMode, &str) -> OracleResult<()> + Send + Sync>;

pub struct Tester {
    topology: Topology,
    registry: Arc<LogicRegistry>,
    mode: ExecutionMode,
    config: CoreConfig,
    binders: Vec<(String, Binder)>,
}

impl Tester {
    pub fn new(topology: Topology, registry: Arc<LogicRegistry>, mode: ExecutionMode) -> Self {
        register_checkers(&registry);
        register_resetter(&registry);
        Self { topology,
               registry,
               mode,
               config: CONFIG.clone(),
               binders: Vec::new() }
    }

    /// Sustituye la configuración; un prefijo con ':' o intervalos
    /// invertidos harían ilegibles las métricas y el resetter.
    pub fn with_config(mut self, config: CoreConfig) -> OracleResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn topology_mut(&mut self) -> &mut Topology {
        &mut self.topology
    }

    pub fn graph(&self) -> &GraphDescription {
        self.topology.graph()
    }

    pub fn registry(&self) -> &Arc<LogicRegistry> {
        &self.registry
    }

    /// Nombres de las condiciones declaradas, en orden.
    pub fn conditions(&self) -> Vec<&str> {
        self.binders.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn next_name(&self, scope: &str, kind: &str) -> OracleResult<String> {
        let name = format!("{scope}_{kind}_{}", self.binders.len());
        if name.contains(':') {
            return Err(OracleError::InvalidName(name));
        }
        Ok(name)
    }

    fn stream_shape(&self, stream: &str) -> OracleResult<ValueShape> {
        self.topology
            .graph()
            .stream(stream)
            .map(|s| s.shape)
            .ok_or_else(|| OracleError::UnknownStream(stream.to_string()))
    }

    fn add_checker(&mut self,
                   stream: &str,
                   name: &str,
                   logic_id: &str,
                   params: serde_json::Value)
                   -> OracleResult<String> {
        let logic = LogicSpec::new(self.stream_shape(stream)?, logic_id, params)?;
        let operator = format!("{CHECKER_OPERATOR_PREFIX}{name}");
        self.topology.add_operator(OperatorDecl { name: operator.clone(),
                                                  input: Some(stream.to_string()),
                                                  output: None,
                                                  logic })?;
        debug!("tester:declare condition={name} stream={stream} logic={logic_id}");
        Ok(operator)
    }

    fn declare<T: Observable>(&mut self,
                              name: String,
                              operator: String,
                              sentinel: T::Output,
                              from_seq: fn(u64) -> Option<T::Output>)
                              -> Arc<Condition<T::Output>> {
        let condition = Arc::new(Condition::new(name.clone(), sentinel));
        let target = condition.clone();
        let condition_name = name.clone();
        let binder: Binder = Box::new(move |job: &dyn JobView,
                                            mode: ExecutionMode,
                                            prefix: &str|
                                            -> OracleResult<()> {
            match mode {
                ExecutionMode::Embedded => {
                    let handle = job.operator_handle(&operator)
                                    .ok_or_else(|| OracleError::NotDeployed(operator.clone()))?;
                    target.bind(Arc::new(EmbeddedCondition::<T>::new(handle)));
                }
                ExecutionMode::Distributed => {
                    target.bind(Arc::new(MetricCondition::new(condition_name.clone(),
                                                              prefix,
                                                              job.metric_source(),
                                                              from_seq)));
                }
            }
            Ok(())
        });
        self.binders.push((name, binder));
        condition
    }

    /// Número de valores en `stream`: exacto o mínimo.
    pub fn tuple_count(&mut self, stream: &str, expected: u64, exact: bool) -> OracleResult<Arc<Condition<u64>>> {
        let name = self.next_name(stream, "count")?;
        let mode = if exact { CountMode::Exact } else { CountMode::AtLeast };
        let params = to_params(&CountParams { name: name.clone(),
                                              expected,
                                              mode })?;
        let operator = self.add_checker(stream, &name, TUPLE_COUNT_LOGIC, params)?;
        Ok(self.declare::<ConditionChecker<TupleCount>>(name, operator, 0, Some))
    }

    /// Contenido exacto de `stream`, en orden o como multiconjunto.
    pub fn contents(&mut self,
                    stream: &str,
                    expected: Vec<Value>,
                    ordered: bool)
                    -> OracleResult<Arc<Condition<Vec<Value>>>> {
        let name = self.next_name(stream, "contents")?;
        let params = to_params(&ContentsParams { name: name.clone(),
                                                 expected,
                                                 ordered })?;
        let operator = self.add_checker(stream, &name, CONTENTS_LOGIC, params)?;
        Ok(self.declare::<ConditionChecker<Contents>>(name, operator, Vec::new(), |_| None))
    }

    /// Todos los valores de `stream` cumplen `predicate`.
    pub fn tuple_check<F>(&mut self,
                          stream: &str,
                          description: &str,
                          predicate: F)
                          -> OracleResult<Arc<Condition<Option<Value>>>>
        where F: Fn(&Value) -> bool + Send + Sync + 'static
    {
        self.stream_shape(stream)?;
        let name = self.next_name(stream, "check")?;
        let logic_id = format!("{PREDICATE_LOGIC_PREFIX}{name}");
        let test: PredicateFn = Arc::new(predicate);
        let (checker_name, desc) = (name.clone(), description.to_string());
        self.registry.register(logic_id.clone(), move |_params| {
                         Ok(Arc::new(Predicate::new(desc.clone(), test.clone()).checker(checker_name.clone())) as Arc<dyn Logic>)
                     });
        let params = serde_json::json!({ "name": name, "description": description });
        let operator = self.add_checker(stream, &name, &logic_id, params)?;
        Ok(self.declare::<ConditionChecker<Predicate>>(name, operator, None, |_| None))
    }

    /// Fuerza al menos `minimum` resets de la región consistente.
    pub fn resets(&mut self, minimum: u64) -> OracleResult<Arc<Condition<u64>>> {
        let name = self.next_name("region", "resets")?;
        let condition = ResetCondition::new(minimum, self.config.reset_min_interval, self.config.reset_max_interval);
        condition.add_to(&mut self.topology, &name)?;
        let operator = ResetCondition::operator_name(&name);
        Ok(self.declare::<Resetter>(name, operator, 0, Some))
    }

    /// Liga todas las condiciones declaradas al job enviado.
    pub fn bind(&self, job: &dyn JobView) -> OracleResult<()> {
        for (name, binder) in &self.binders {
            binder(job, self.mode, &self.config.metric_prefix)?;
            debug!("tester:bind condition={name} mode={:?}", self.mode);
        }
        info!("tester:bound conditions={} mode={:?}", self.binders.len(), self.mode);
        Ok(())
    }
}
