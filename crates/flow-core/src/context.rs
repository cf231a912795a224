//! Contexto del contenedor entregado a la lógica de usuario.
//!
//! Es un handle opaco para la lógica: identificadores de job/contenedor,
//! creación de métricas, registros de lógica y codecs, el target de log
//! inyectado y la memoria de condiciones que sobrevive a un reinitialize.
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::CodecRegistry;
use crate::config::{CoreConfig, CONFIG};
use crate::errors::{FlowError, FlowResult};
use crate::logic::LogicRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// Función leída por el hilo de monitorización; debe ser lock-free.
pub type MetricSupplier = Arc<dyn Fn() -> i64 + Send + Sync>;

struct Metric {
    description: String,
    kind: MetricKind,
    supplier: MetricSupplier,
}

/// Lectura puntual de una métrica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub description: String,
    pub kind: MetricKind,
    pub value: i64,
    pub taken_at: DateTime<Utc>, // metadato (sólo para el harness)
}

/// Lectura de métricas por nombre exacto (local o remota).
pub trait MetricSource: Send + Sync {
    fn read_metric(&self, name: &str) -> Option<i64>;
}

#[derive(Default)]
pub struct MetricRegistry {
    metrics: DashMap<String, Metric>,
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry").field("count", &self.metrics.len()).finish()
    }
}

impl MetricRegistry {
    /// Registra una métrica. Re-registrar el mismo nombre (tras un
    /// reinitialize) sustituye el supplier; cambiar el tipo es un error.
    pub fn create_metric(&self,
                         name: &str,
                         description: &str,
                         kind: MetricKind,
                         supplier: MetricSupplier)
                         -> FlowResult<()> {
        if let Some(existing) = self.metrics.get(name) {
            if existing.kind != kind {
                return Err(FlowError::Internal(format!("metric '{name}' already registered as {:?}", existing.kind)));
            }
        }
        self.metrics.insert(name.to_string(),
                            Metric { description: description.to_string(),
                                     kind,
                                     supplier });
        Ok(())
    }

    pub fn read(&self, name: &str) -> Option<i64> {
        self.metrics.get(name).map(|m| (m.supplier)())
    }

    pub fn kind(&self, name: &str) -> Option<MetricKind> {
        self.metrics.get(name).map(|m| m.kind)
    }

    /// Instantánea ordenada por nombre.
    pub fn snapshot(&self) -> Vec<MetricSample> {
        let now = Utc::now();
        let mut samples: Vec<MetricSample> = self.metrics
                                                 .iter()
                                                 .map(|e| MetricSample { name: e.key().clone(),
                                                                         description: e.description.clone(),
                                                                         kind: e.kind,
                                                                         value: (e.supplier)(),
                                                                         taken_at: now })
                                                 .collect();
        samples.sort_by(|a, b| a.name.cmp(&b.name));
        samples
    }
}

impl MetricSource for MetricRegistry {
    fn read_metric(&self, name: &str) -> Option<i64> {
        self.read(name)
    }
}

/// Estado de una condición que debe sobrevivir a la reconstrucción de su
/// lógica: el fallo es absorbente y la secuencia monótona.
#[derive(Debug, Default)]
pub struct ConditionMemory {
    pub failed: AtomicBool,
    pub seq: AtomicU64,
}

impl ConditionMemory {
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

/// Control de la región consistente del contenedor (externo al core).
pub trait RegionControl: Send + Sync {
    /// Solicita un reset de la región (restauración desde checkpoint).
    fn request_reset(&self) -> FlowResult<()>;
}

pub struct ContainerContext {
    job_id: Uuid,
    container_id: String,
    consistent_region: bool,
    config: CoreConfig,
    log_target: String,
    metrics: MetricRegistry,
    memory: DashMap<String, Arc<ConditionMemory>>,
    logic: Arc<LogicRegistry>,
    codecs: Arc<CodecRegistry>,
    region: Option<Arc<dyn RegionControl>>,
}

impl fmt::Debug for ContainerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerContext")
         .field("job_id", &self.job_id)
         .field("container_id", &self.container_id)
         .field("consistent_region", &self.consistent_region)
         .field("log_target", &self.log_target)
         .field("metrics", &self.metrics)
         .finish()
    }
}

impl ContainerContext {
    pub fn builder(container_id: impl Into<String>) -> ContextBuilder {
        ContextBuilder { job_id: Uuid::new_v4(),
                         container_id: container_id.into(),
                         consistent_region: false,
                         config: None,
                         log_target: None,
                         logic: None,
                         codecs: None,
                         region: None }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn in_consistent_region(&self) -> bool {
        self.consistent_region
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Target del sink de logs inyectado para este contenedor.
    pub fn log_target(&self) -> &str {
        &self.log_target
    }

    pub fn metrics(&self) -> &MetricRegistry {
        &self.metrics
    }

    pub fn create_metric(&self,
                         name: &str,
                         description: &str,
                         kind: MetricKind,
                         supplier: MetricSupplier)
                         -> FlowResult<()> {
        debug!(target: self.log_target(), "metric:create name={name} kind={kind:?}");
        self.metrics.create_metric(name, description, kind, supplier)
    }

    pub fn logic_registry(&self) -> &Arc<LogicRegistry> {
        &self.logic
    }

    pub fn codecs(&self) -> &Arc<CodecRegistry> {
        &self.codecs
    }

    pub fn region_control(&self) -> Option<&Arc<dyn RegionControl>> {
        self.region.as_ref()
    }

    /// Memoria persistente de la condición `name` (se crea al primer uso).
    pub fn condition_memory(&self, name: &str) -> Arc<ConditionMemory> {
        self.memory.entry(name.to_string()).or_default().value().clone()
    }
}

impl MetricSource for ContainerContext {
    fn read_metric(&self, name: &str) -> Option<i64> {
        self.metrics.read(name)
    }
}

pub struct ContextBuilder {
    job_id: Uuid,
    container_id: String,
    consistent_region: bool,
    config: Option<CoreConfig>,
    log_target: Option<String>,
    logic: Option<Arc<LogicRegistry>>,
    codecs: Option<Arc<CodecRegistry>>,
    region: Option<Arc<dyn RegionControl>>,
}

impl ContextBuilder {
    pub fn job_id(mut self, job_id: Uuid) -> Self {
        self.job_id = job_id;
        self
    }

    pub fn consistent_region(mut self, enabled: bool) -> Self {
        self.consistent_region = enabled;
        self
    }

    pub fn config(mut self, config: CoreConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = Some(target.into());
        self
    }

    pub fn logic_registry(mut self, registry: Arc<LogicRegistry>) -> Self {
        self.logic = Some(registry);
        self
    }

    pub fn codec_registry(mut self, registry: Arc<CodecRegistry>) -> Self {
        self.codecs = Some(registry);
        self
    }

    pub fn region_control(mut self, region: Arc<dyn RegionControl>) -> Self {
        self.region = Some(region);
        self.consistent_region = true;
        self
    }

    pub fn build(self) -> Arc<ContainerContext> {
        let config = self.config.unwrap_or_else(|| CONFIG.clone());
        let log_target = self.log_target
                             .unwrap_or_else(|| format!("tupleflow::container::{}", self.container_id));
        let codecs = self.codecs
                         .unwrap_or_else(|| Arc::new(CodecRegistry::with_default_serializer(&config.default_serializer)));
        Arc::new(ContainerContext { job_id: self.job_id,
                                    container_id: self.container_id,
                                    consistent_region: self.consistent_region,
                                    config,
                                    log_target,
                                    metrics: MetricRegistry::default(),
                                    memory: DashMap::new(),
                                    logic: self.logic.unwrap_or_default(),
                                    codecs,
                                    region: self.region })
    }
}
