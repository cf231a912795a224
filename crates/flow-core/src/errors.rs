//! Errores del núcleo del contenedor.
//!
//! Taxonomía:
//! - `Deserialization`: lógica o valor serializado corrupto/incompatible
//!   (fatal en construcción).
//! - `Codec`: fallo de encode/decode; siempre se envuelve, nunca se descarta.
//! - `ResourceClose`: un hook de cierre falló. Se registra en el log y no
//!   aborta el cierre de los demás eslabones.
//!
//! Las violaciones de condiciones NO son errores: son un estado terminal con
//! diagnóstico (ver crate `flow-oracle`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum FlowError {
    #[error("deserialization failed: {0}")] Deserialization(String),
    #[error("codec error: {0}")] Codec(String),
    #[error("close failed on link {link}: {message}")] ResourceClose { link: usize, message: String },
    #[error("unknown logic factory: {0}")] UnknownLogic(String),
    #[error("unknown serializer: {0}")] UnknownSerializer(String),
    #[error("wrapper chain deeper than {0} links (cyclic chain?)")] ChainTooDeep(usize),
    #[error("logic handle already closed")] Closed,
    #[error("invalid configuration: {0}")] Config(String),
    #[error("internal: {0}")] Internal(String),
}

impl FlowError {
    /// Envuelve un error de serde como fallo de codec.
    pub fn codec(err: impl std::fmt::Display) -> Self {
        Self::Codec(err.to_string())
    }

    pub fn deserialization(err: impl std::fmt::Display) -> Self {
        Self::Deserialization(err.to_string())
    }
}

pub type FlowResult<T> = Result<T, FlowError>;
