//! Pipeline de demostración: letras → mayúsculas, observado por condiciones.
//!
//! El grafo tiene un único operador (`upper`) y el harness declara una
//! cuenta mínima, una cuenta exacta, el contenido como multiconjunto y un
//! predicado sobre el stream de salida.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use flow_core::context::MetricSample;
use flow_core::logic::LogicRegistry;
use flow_core::{ContainerContext, CoreConfig, FlowError, FnLogic, Logic, LogicSpec, OperatorDecl, StreamSchema,
                Topology, Value, ValueShape};
use flow_oracle::{Condition, ExecutionMode, LocalJob, Tester};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::{DemoError, DemoResult};

pub const INPUT_STREAM: &str = "letters";
pub const OUTPUT_STREAM: &str = "shouted";

/// Estado final de una condición, tal como lo ve el harness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionReport {
    pub name: String,
    pub valid: bool,
    pub failed: bool,
    pub detail: String,
}

impl ConditionReport {
    fn of<R>(condition: &Condition<R>) -> Self
        where R: Clone + Send + Sync + 'static
    {
        Self { name:   condition.name().to_string(),
               valid:  condition.valid(),
               failed: condition.failed(),
               detail: condition.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoReport {
    pub job: String,
    pub mode: ExecutionMode,
    pub sent: usize,
    pub conditions: Vec<ConditionReport>,
    pub metrics: Vec<MetricSample>,
    pub finished_at: DateTime<Utc>,
}

impl DemoReport {
    pub fn all_valid(&self) -> bool {
        self.conditions.iter().all(|c| c.valid && !c.failed)
    }
}

pub fn registry() -> Arc<LogicRegistry> {
    let reg = Arc::new(LogicRegistry::new());
    reg.register("upper", |_| {
           Ok(Arc::new(FnLogic::new(|v: Value| match v.as_str() {
                           Some(s) => Ok(Some(Value::String(s.to_uppercase()))),
                           None => Err(FlowError::Codec(format!("expected string, got {}", v.type_name()))),
                       })) as Arc<dyn Logic>)
       });
    reg
}

pub fn topology() -> DemoResult<Topology> {
    let mut topo = Topology::new("alphabet");
    topo.add_stream(INPUT_STREAM, &StreamSchema::string())?;
    topo.add_stream(OUTPUT_STREAM, &StreamSchema::string())?;
    let logic = LogicSpec::new(ValueShape::PrimitiveString, "upper", json!({}))?;
    topo.add_operator(OperatorDecl { name: "upper".into(),
                                     input: Some(INPUT_STREAM.into()),
                                     output: Some(OUTPUT_STREAM.into()),
                                     logic })?;
    Ok(topo)
}

/// Envía `input` carácter a carácter y devuelve el estado de las condiciones.
pub fn run(input: &str, mode: ExecutionMode, config: CoreConfig) -> DemoResult<DemoReport> {
    config.validate()?;
    let reg = registry();
    let mut tester = Tester::new(topology()?, reg.clone(), mode).with_config(config.clone())?;
    let letters: Vec<Value> = input.chars().map(|c| Value::String(c.to_string())).collect();
    let expected: Vec<Value> = input.chars()
                                    .map(|c| Value::String(c.to_uppercase().to_string()))
                                    .collect();

    let at_least = tester.tuple_count(OUTPUT_STREAM, expected.len().min(1) as u64, false)?;
    let exact = tester.tuple_count(OUTPUT_STREAM, expected.len() as u64, true)?;
    let contents = tester.contents(OUTPUT_STREAM, expected, false)?;
    let upper = tester.tuple_check(OUTPUT_STREAM, "no lowercase letters", |v| {
                          v.as_str().is_some_and(|s| !s.chars().any(char::is_lowercase))
                      })?;

    let ctx = ContainerContext::builder("pe-demo").config(config).logic_registry(reg).build();
    let job = LocalJob::submit(ctx.clone(), tester.graph().clone())?;
    tester.bind(&job)?;

    let sent = letters.len();
    for v in letters {
        job.send(INPUT_STREAM, v)?;
    }
    let report = DemoReport { job: ctx.job_id().to_string(),
                              mode,
                              sent,
                              conditions: vec![ConditionReport::of(&at_least),
                                               ConditionReport::of(&exact),
                                               ConditionReport::of(&contents),
                                               ConditionReport::of(&upper)],
                              metrics: ctx.metrics().snapshot(),
                              finished_at: Utc::now() };
    job.shutdown();
    info!("demo:finished sent={sent} valid={}", report.all_valid());
    Ok(report)
}

/// Como `run`, pero exige que todas las condiciones sean válidas.
pub fn run_checked(input: &str, mode: ExecutionMode, config: CoreConfig) -> DemoResult<DemoReport> {
    let report = run(input, mode, config)?;
    if let Some(bad) = report.conditions.iter().find(|c| !c.valid || c.failed) {
        return Err(DemoError::Unsatisfied(bad.detail.clone()));
    }
    Ok(report)
}
