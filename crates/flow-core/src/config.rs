//! Carga de configuración del runtime desde variables de entorno.
//! Usa convención `TUPLEFLOW_*`; los valores inválidos caen a los defaults.

use std::env;
use std::time::Duration;

use dotenvy::dotenv;
use log::warn;
use once_cell::sync::Lazy;

use crate::constants::{DEFAULT_MAX_CHAIN_DEPTH, DEFAULT_METRIC_PREFIX, DEFAULT_SERIALIZER_ID};
use crate::errors::FlowError;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

/// Configuración global, evaluada una sola vez.
pub static CONFIG: Lazy<CoreConfig> = Lazy::new(CoreConfig::from_env);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub metric_prefix: String,
    pub max_chain_depth: usize,
    pub default_serializer: String,
    pub reset_min_interval: Duration,
    pub reset_max_interval: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self { metric_prefix: DEFAULT_METRIC_PREFIX.to_string(),
               max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
               default_serializer: DEFAULT_SERIALIZER_ID.to_string(),
               reset_min_interval: Duration::from_millis(1_000),
               reset_max_interval: Duration::from_millis(5_000) }
    }
}

impl CoreConfig {
    pub fn from_env() -> Self {
        // asegura que .env se haya cargado
        Lazy::force(&DOTENV_LOADED);
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Construye la configuración a partir de `lookup` (clave → valor). El
    /// resultado siempre pasa `validate()`: lo incoherente cae al default.
    pub fn from_vars<F>(lookup: F) -> Self
        where F: Fn(&str) -> Option<String>
    {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let metric_prefix = match text("TUPLEFLOW_METRIC_PREFIX") {
            Some(p) if p.contains(':') => {
                warn!("config:ignored TUPLEFLOW_METRIC_PREFIX={p} reason=contains ':'");
                defaults.metric_prefix.clone()
            }
            Some(p) => p,
            None => defaults.metric_prefix.clone(),
        };
        let max_chain_depth = number("TUPLEFLOW_MAX_CHAIN_DEPTH").and_then(|d| usize::try_from(d).ok())
                                                                 .filter(|d| *d > 0)
                                                                 .unwrap_or(defaults.max_chain_depth);
        let default_serializer = text("TUPLEFLOW_DEFAULT_SERIALIZER").unwrap_or(defaults.default_serializer.clone());
        let mut reset_min_interval = number("TUPLEFLOW_RESET_MIN_INTERVAL_MS").map(Duration::from_millis)
                                                                             .unwrap_or(defaults.reset_min_interval);
        let mut reset_max_interval = number("TUPLEFLOW_RESET_MAX_INTERVAL_MS").map(Duration::from_millis)
                                                                             .unwrap_or(defaults.reset_max_interval);
        if reset_min_interval > reset_max_interval {
            warn!("config:ignored reset interval min={reset_min_interval:?} > max={reset_max_interval:?}");
            reset_min_interval = defaults.reset_min_interval;
            reset_max_interval = defaults.reset_max_interval;
        }
        Self { metric_prefix,
               max_chain_depth,
               default_serializer,
               reset_min_interval,
               reset_max_interval }
    }

    /// Verifica la coherencia entre campos (no sólo su formato).
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.metric_prefix.contains(':') {
            return Err(FlowError::Config(format!("metric prefix '{}' must not contain ':'", self.metric_prefix)));
        }
        if self.reset_min_interval > self.reset_max_interval {
            return Err(FlowError::Config(format!("reset interval min {:?} > max {:?}",
                                                 self.reset_min_interval, self.reset_max_interval)));
        }
        Ok(())
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
