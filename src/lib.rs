//! TupleFlow Rust
//!
//! Reexporta el runtime (`flow_core`) y el oráculo de pruebas
//! (`flow_oracle`), y agrega un pipeline de demostración.
pub mod demo;
pub mod errors;

pub use flow_core;
pub use flow_oracle;

/// Lo habitual para declarar un grafo y sus condiciones.
pub mod prelude {
    pub use flow_core::{ContainerContext, CoreConfig, FlowError, FlowResult, FnLogic, Logic, LogicRegistry, LogicSpec,
                        OperatorDecl, StreamSchema, Topology, Value, ValueShape};
    pub use flow_oracle::{Condition, ExecutionMode, LocalJob, LocalRegion, OracleError, OracleResult, Tester};
}
