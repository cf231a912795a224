use flow_core::FlowError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errores del lado del oráculo (declaración y binding de condiciones).
///
/// Una condición que falla NO produce un error: queda en estado `Failed` y
/// su forma `Display` contiene el diagnóstico.
#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum OracleError {
    #[error(transparent)] Flow(#[from] FlowError),
    #[error("stream not declared in topology: {0}")] UnknownStream(String),
    #[error("invalid condition name '{0}': ':' is reserved for metric names")] InvalidName(String),
    #[error("operator '{0}' is not deployed in the job")] NotDeployed(String),
}

pub type OracleResult<T> = Result<T, OracleError>;
