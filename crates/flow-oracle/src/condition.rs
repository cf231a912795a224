//! Frente del oráculo: la condición que ve el harness de test.
//!
//! Antes del envío del job una `Condition` es inerte (`valid()`/`failed()`
//! devuelven false y `result()` el centinela declarado). Tras `bind` delega
//! en la implementación ligada según el modo de ejecución:
//! - `EmbeddedCondition`: lee el checker vivo a través del handle de su lógica,
//!   de modo que sigue a la instancia nueva tras un reinitialize.
//! - `MetricCondition`: consulta las métricas publicadas por nombre exacto.
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use flow_core::{LogicHandle, MetricSource};
use log::debug;
use parking_lot::RwLock;

use crate::checker::{metric_name, FAIL_METRIC, SEQ_METRIC, VALID_METRIC};

/// Lógica que expone un veredicto (checkers y resetter).
pub trait Observable: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    fn valid(&self) -> bool;
    fn failed(&self) -> bool;
    fn result(&self) -> Self::Output;
    fn describe(&self) -> String;
}

/// Implementación ligada a una condición.
pub trait ConditionImpl<R>: Send + Sync {
    fn valid(&self) -> bool;
    fn failed(&self) -> bool;
    /// `None` si el resultado no está disponible en este modo.
    fn result(&self) -> Option<R>;
    fn describe(&self) -> String;
}

pub struct Condition<R> {
    name: String,
    sentinel: R,
    bound: RwLock<Option<Arc<dyn ConditionImpl<R>>>>,
}

impl<R> Condition<R> where R: Clone + Send + Sync + 'static
{
    pub fn new(name: impl Into<String>, sentinel: R) -> Self {
        Self { name: name.into(),
               sentinel,
               bound: RwLock::new(None) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bind(&self, imp: Arc<dyn ConditionImpl<R>>) {
        debug!("condition:bind name={}", self.name);
        *self.bound.write() = Some(imp);
    }

    pub fn is_bound(&self) -> bool {
        self.bound.read().is_some()
    }

    fn bound(&self) -> Option<Arc<dyn ConditionImpl<R>>> {
        self.bound.read().clone()
    }

    pub fn valid(&self) -> bool {
        self.bound().is_some_and(|b| b.valid())
    }

    pub fn failed(&self) -> bool {
        self.bound().is_some_and(|b| b.failed())
    }

    pub fn result(&self) -> R {
        self.bound()
            .and_then(|b| b.result())
            .unwrap_or_else(|| self.sentinel.clone())
    }
}

impl<R> fmt::Display for Condition<R> where R: Clone + Send + Sync + 'static
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bound() {
            Some(b) => f.write_str(&b.describe()),
            None => write!(f, "condition '{}' not submitted", self.name),
        }
    }
}

impl<R> fmt::Debug for Condition<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
         .field("name", &self.name)
         .field("bound", &self.bound.read().is_some())
         .finish()
    }
}

/// Modo embebido: el checker vive en el mismo proceso que el harness.
pub struct EmbeddedCondition<T> {
    handle: Arc<dyn LogicHandle>,
    _observed: PhantomData<fn() -> T>,
}

impl<T: Observable> EmbeddedCondition<T> {
    pub fn new(handle: Arc<dyn LogicHandle>) -> Self {
        Self { handle,
               _observed: PhantomData }
    }

    fn with<U>(&self, f: impl FnOnce(&T) -> U) -> Option<U> {
        let logic = self.handle.get();
        logic.as_any().downcast_ref::<T>().map(f)
    }
}

impl<T: Observable> ConditionImpl<T::Output> for EmbeddedCondition<T> {
    fn valid(&self) -> bool {
        self.with(|t| t.valid()).unwrap_or(false)
    }

    fn failed(&self) -> bool {
        self.with(|t| t.failed()).unwrap_or(false)
    }

    fn result(&self) -> Option<T::Output> {
        self.with(|t| t.result())
    }

    fn describe(&self) -> String {
        self.with(|t| t.describe())
            .unwrap_or_else(|| "bound logic is not a condition".to_string())
    }
}

type SeqMapper<R> = Box<dyn Fn(u64) -> Option<R> + Send + Sync>;

/// Modo distribuido: sólo se conocen las métricas publicadas.
pub struct MetricCondition<R> {
    name: String,
    source: Arc<dyn MetricSource>,
    valid_metric: String,
    seq_metric: String,
    fail_metric: String,
    from_seq: SeqMapper<R>,
}

impl<R> MetricCondition<R> {
    pub fn new<F>(name: impl Into<String>, prefix: &str, source: Arc<dyn MetricSource>, from_seq: F) -> Self
        where F: Fn(u64) -> Option<R> + Send + Sync + 'static
    {
        let name = name.into();
        Self { valid_metric: metric_name(prefix, VALID_METRIC, &name),
               seq_metric: metric_name(prefix, SEQ_METRIC, &name),
               fail_metric: metric_name(prefix, FAIL_METRIC, &name),
               name,
               source,
               from_seq: Box::new(from_seq) }
    }

    fn read(&self, metric: &str) -> Option<i64> {
        self.source.read_metric(metric)
    }
}

impl<R> ConditionImpl<R> for MetricCondition<R> where R: Send + Sync
{
    fn valid(&self) -> bool {
        // fail tiene prioridad: una lectura de valid puede ser anterior al fallo
        self.read(&self.valid_metric) == Some(1) && !self.failed()
    }

    fn failed(&self) -> bool {
        self.read(&self.fail_metric) == Some(1)
    }

    fn result(&self) -> Option<R> {
        let seq = self.read(&self.seq_metric)?;
        (self.from_seq)(u64::try_from(seq).ok()?)
    }

    fn describe(&self) -> String {
        let show = |m: &str| self.read(m).map_or_else(|| "n/a".to_string(), |v| v.to_string());
        format!("condition '{}' (metrics) valid={} fail={} seq={}",
                self.name,
                show(&self.valid_metric),
                show(&self.fail_metric),
                show(&self.seq_metric))
    }
}
