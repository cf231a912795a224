//! flow-oracle: condiciones evaluadas en vivo sobre los streams de un job.
//!
//! - `checker`: máquina de estados común y métricas valid/seq/fail.
//! - `variants`: cuenta, contenido (ordenado o no) y predicado.
//! - `condition`: la condición que ve el harness y sus modos de binding.
//! - `tester`: declaración sobre la topología y binding tras el envío.
//! - `resetter`: condición independiente de stream que fuerza resets.
//! - `local`: ejecución embebida de un grafo en un contenedor.
pub mod checker;
pub mod condition;
pub mod errors;
pub mod local;
pub mod resetter;
pub mod tester;
pub mod variants;

pub use checker::{metric_name, Check, CheckerState, ConditionChecker, ConditionState, Verdict};
pub use condition::{Condition, ConditionImpl, EmbeddedCondition, MetricCondition, Observable};
pub use errors::{OracleError, OracleResult};
pub use local::{LocalJob, LocalRegion};
pub use resetter::{ResetCondition, Resetter, StreamIndependent};
pub use tester::{ExecutionMode, JobView, Tester};
pub use variants::{Contents, CountMode, Predicate, TupleCount};
