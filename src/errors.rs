use flow_core::FlowError;
use flow_oracle::OracleError;
use thiserror::Error;

/// Errores del binario de demostración.
#[derive(Debug, Error)]
pub enum DemoError {
    #[error("Error del runtime: {0}")]
    Flow(#[from] FlowError),
    #[error("Error del oráculo: {0}")]
    Oracle(#[from] OracleError),
    #[error("Error de serialización: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Condición no satisfecha: {0}")]
    Unsatisfied(String),
}

pub type DemoResult<T> = Result<T, DemoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsatisfied_variant_format() {
        let err = DemoError::Unsatisfied("letters_count_0".into());
        assert_eq!(err.to_string(), "Condición no satisfecha: letters_count_0");
    }

    #[test]
    fn flow_errors_convert() {
        let err: DemoError = FlowError::Closed.into();
        assert!(matches!(err, DemoError::Flow(FlowError::Closed)));
    }
}
