//! Variantes concretas de condición y sus fábricas de lógica.
//!
//! Count y contents se describen completamente con parámetros JSON y se
//! registran bajo ids fijos. Los predicados son closures: el `Tester`
//! registra una fábrica por condición.
mod contents;
mod count;
mod predicate;

use std::sync::Arc;

pub use contents::Contents;
pub use count::{CountMode, TupleCount};
pub use predicate::{Predicate, PredicateFn};

use flow_core::logic::LogicRegistry;
use flow_core::{FlowError, FlowResult, Logic, Value};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub const TUPLE_COUNT_LOGIC: &str = "tupleflow.check.tuple_count";
pub const CONTENTS_LOGIC: &str = "tupleflow.check.contents";
pub const PREDICATE_LOGIC_PREFIX: &str = "tupleflow.check.predicate.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountParams {
    pub name: String,
    pub expected: u64,
    pub mode: CountMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentsParams {
    pub name: String,
    pub expected: Vec<Value>,
    pub ordered: bool,
}

pub(crate) fn parse_params<P: DeserializeOwned>(params: &serde_json::Value) -> FlowResult<P> {
    serde_json::from_value(params.clone()).map_err(FlowError::deserialization)
}

pub(crate) fn to_params<P: Serialize>(params: &P) -> FlowResult<serde_json::Value> {
    serde_json::to_value(params).map_err(|e| FlowError::Internal(format!("encode params: {e}")))
}

/// Registra las fábricas de count y contents.
pub fn register_checkers(registry: &LogicRegistry) {
    registry.register(TUPLE_COUNT_LOGIC, |params| {
                let p: CountParams = parse_params(params)?;
                Ok(Arc::new(TupleCount::new(p.expected, p.mode).checker(p.name)) as Arc<dyn Logic>)
            });
    registry.register(CONTENTS_LOGIC, |params| {
                let p: ContentsParams = parse_params(params)?;
                let check = if p.ordered { Contents::ordered(p.expected) } else { Contents::unordered(p.expected) };
                Ok(Arc::new(check.checker(p.name)) as Arc<dyn Logic>)
            });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::ConditionChecker;
    use flow_core::{LogicSpec, ValueShape};

    #[test]
    fn contents_factory_rebuilds_from_params() {
        let registry = LogicRegistry::new();
        register_checkers(&registry);
        let params = to_params(&ContentsParams { name: "c".into(),
                                                 expected: vec![Value::from("a"), Value::Int(1)],
                                                 ordered: true }).expect("params");
        let spec = LogicSpec::new(ValueShape::PrimitiveString, CONTENTS_LOGIC, params).expect("spec");
        let logic = registry.load(&spec).expect("load");
        let checker = logic.as_any().downcast_ref::<ConditionChecker<Contents>>().expect("contents checker");
        assert_eq!(checker.name(), "c");
        checker.accept(&Value::from("a"));
        checker.accept(&Value::Int(1));
        assert!(checker.valid());
    }

    #[test]
    fn bad_params_are_deserialization_errors() {
        let registry = LogicRegistry::new();
        register_checkers(&registry);
        let spec = LogicSpec::new(ValueShape::PrimitiveString, TUPLE_COUNT_LOGIC, serde_json::json!({"name": 1}))
            .expect("spec");
        assert!(matches!(registry.load(&spec), Err(FlowError::Deserialization(_))));
    }
}
