//! Registro de fábricas de lógica: id del sobre → constructor.
//!
//! Sustituye a la instalación por reflexión: un `LogicSpec` sólo puede
//! construir lógica cuyo id haya sido registrado explícitamente.
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use super::{Logic, LogicSpec};
use crate::errors::{FlowError, FlowResult};

pub type LogicFactory = Arc<dyn Fn(&serde_json::Value) -> FlowResult<Arc<dyn Logic>> + Send + Sync>;

#[derive(Default)]
pub struct LogicRegistry {
    factories: DashMap<String, LogicFactory>,
}

impl fmt::Debug for LogicRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        f.debug_struct("LogicRegistry").field("factories", &ids).finish()
    }
}

impl LogicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra (o reemplaza) una fábrica.
    pub fn register<F>(&self, id: impl Into<String>, factory: F)
        where F: Fn(&serde_json::Value) -> FlowResult<Arc<dyn Logic>> + Send + Sync + 'static
    {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Deserializa la lógica descrita por `spec`.
    pub fn load(&self, spec: &LogicSpec) -> FlowResult<Arc<dyn Logic>> {
        let envelope = spec.envelope()?;
        // Se clona la fábrica para no retener el shard del mapa durante la construcción.
        let factory = self.factories
                          .get(&envelope.logic)
                          .map(|f| f.value().clone())
                          .ok_or_else(|| FlowError::UnknownLogic(envelope.logic.clone()))?;
        factory(&envelope.params)
    }
}
