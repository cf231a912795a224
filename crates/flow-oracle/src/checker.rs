//! Núcleo común de las condiciones: máquina de estados
//! Pending → Valid (revocable) → Failed (absorbente).
//!
//! `failed() = persistent OR transient`, `valid() = flag AND NOT failed()`.
//! El flag persistente y la secuencia viven en la `ConditionMemory` del
//! contenedor, de modo que sobreviven a un reinitialize que reconstruye el
//! checker. El count y el flag transitorio son de la instancia.
//!
//! Todo lo observable desde el hilo de métricas es atómico; la variante
//! (`Check`) se muta bajo un mutex que sólo toca el hilo de proceso.
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use flow_core::context::ConditionMemory;
use flow_core::{ContainerContext, FlowError, FlowResult, Initializable, Logic, MetricKind, Value};
use log::{info, trace, warn};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::condition::Observable;

pub const VALID_METRIC: &str = "valid";
pub const SEQ_METRIC: &str = "seq";
pub const FAIL_METRIC: &str = "fail";

const DEFAULT_TARGET: &str = "flow_oracle::checker";

/// `<prefix>:<metric>:<condition>`
pub fn metric_name(prefix: &str, metric: &str, condition: &str) -> String {
    format!("{prefix}:{metric}:{condition}")
}

/// Resultado de examinar un valor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Sin cambios en el flag de validez.
    Pending,
    Valid,
    Fail(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionState {
    Pending,
    Valid,
    Failed,
}

impl fmt::Display for ConditionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionState::Pending => "pending",
            ConditionState::Valid => "valid",
            ConditionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub struct CheckerState {
    memory: Arc<ConditionMemory>,
    count: AtomicU64,
    valid: AtomicBool,
    transient_failed: AtomicBool,
}

impl CheckerState {
    pub fn new(memory: Arc<ConditionMemory>) -> Self {
        Self { memory,
               count: AtomicU64::new(0),
               valid: AtomicBool::new(false),
               transient_failed: AtomicBool::new(false) }
    }

    pub fn failed(&self) -> bool {
        self.memory.has_failed() || self.transient_failed.load(Ordering::SeqCst)
    }

    pub fn valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst) && !self.failed()
    }

    pub fn state(&self) -> ConditionState {
        if self.failed() {
            ConditionState::Failed
        } else if self.valid() {
            ConditionState::Valid
        } else {
            ConditionState::Pending
        }
    }

    /// Valores aceptados por esta instancia.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    /// Secuencia monótona, compartida con instancias anteriores.
    pub fn seq(&self) -> u64 {
        self.memory.seq.load(Ordering::SeqCst)
    }

    /// Avanza secuencia y count; devuelve el count nuevo.
    pub(crate) fn record(&self) -> u64 {
        self.memory.seq.fetch_add(1, Ordering::SeqCst);
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Marca la condición como válida. Nunca tiene efecto tras un fallo.
    pub(crate) fn set_valid(&self) -> bool {
        if self.failed() {
            return false;
        }
        self.valid.store(true, Ordering::SeqCst);
        true
    }

    pub(crate) fn fail(&self) {
        self.transient_failed.store(true, Ordering::SeqCst);
        self.memory.failed.store(true, Ordering::SeqCst);
        self.valid.store(false, Ordering::SeqCst);
    }

    /// Publica valid/seq/fail para el hilo de monitorización.
    pub fn register_metrics(self: &Arc<Self>, ctx: &ContainerContext, name: &str) -> FlowResult<()> {
        let prefix = &ctx.config().metric_prefix;
        let s = self.clone();
        ctx.create_metric(&metric_name(prefix, VALID_METRIC, name),
                          "1 when the condition is valid",
                          MetricKind::Gauge,
                          Arc::new(move || s.valid() as i64))?;
        let s = self.clone();
        ctx.create_metric(&metric_name(prefix, SEQ_METRIC, name),
                          "values seen by the condition",
                          MetricKind::Counter,
                          Arc::new(move || s.seq() as i64))?;
        let s = self.clone();
        ctx.create_metric(&metric_name(prefix, FAIL_METRIC, name),
                          "1 once the condition has failed",
                          MetricKind::Gauge,
                          Arc::new(move || s.failed() as i64))?;
        Ok(())
    }
}

/// Una variante concreta de condición.
pub trait Check: Send + fmt::Debug + 'static {
    type Output: Clone + Send + Sync + fmt::Debug + 'static;

    /// Nombre corto de la variante (diagnósticos y logs).
    const KIND: &'static str;

    /// Veredicto antes de ver ningún valor.
    fn initial(&self) -> Verdict {
        Verdict::Pending
    }

    /// Examina el valor número `count` (empezando en 1).
    fn check(&mut self, count: u64, value: &Value) -> Verdict;

    fn result(&self) -> Self::Output;

    fn expected(&self) -> String;

    fn received(&self) -> String;
}

/// Lógica que observa un stream y calcula el veredicto de una variante.
pub struct ConditionChecker<C: Check> {
    name: String,
    check: Mutex<C>,
    state: OnceCell<Arc<CheckerState>>,
    failure: Mutex<Option<String>>,
    log_target: OnceCell<String>,
}

impl<C: Check> ConditionChecker<C> {
    pub fn new(name: impl Into<String>, check: C) -> Self {
        Self { name: name.into(),
               check: Mutex::new(check),
               state: OnceCell::new(),
               failure: Mutex::new(None),
               log_target: OnceCell::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> &str {
        self.log_target.get().map(String::as_str).unwrap_or(DEFAULT_TARGET)
    }

    fn attach(&self, memory: Arc<ConditionMemory>) -> Arc<CheckerState> {
        let state = Arc::new(CheckerState::new(memory));
        let verdict = self.check.lock().initial();
        self.apply(&state, verdict);
        state
    }

    /// Estado adjunto. Sólo `accept` lo crea fuera de `initialize`, con una
    /// memoria privada (uso sin contenedor).
    fn attached(&self) -> &Arc<CheckerState> {
        self.state.get_or_init(|| self.attach(Arc::new(ConditionMemory::default())))
    }

    /// Estado observable. Leerlo nunca adjunta memoria.
    pub fn state(&self) -> ConditionState {
        if let Some(state) = self.state.get() {
            return state.state();
        }
        match self.check.lock().initial() {
            Verdict::Pending => ConditionState::Pending,
            Verdict::Valid => ConditionState::Valid,
            Verdict::Fail(_) => ConditionState::Failed,
        }
    }

    fn apply(&self, state: &CheckerState, verdict: Verdict) {
        match verdict {
            Verdict::Pending => {}
            Verdict::Valid => {
                state.set_valid();
            }
            Verdict::Fail(reason) => {
                warn!(target: self.target(), "checker:failed name={} kind={} reason={reason}", self.name, C::KIND);
                self.failure.lock().get_or_insert(reason);
                state.fail();
            }
        }
    }

    /// Procesa un valor. No hace nada si la condición ya falló.
    pub fn accept(&self, value: &Value) {
        let state = self.attached();
        if state.failed() {
            return;
        }
        let count = state.record();
        let verdict = self.check.lock().check(count, value);
        trace!(target: self.target(), "checker:accept name={} count={count} verdict={verdict:?}", self.name);
        self.apply(state, verdict);
    }

    pub fn valid(&self) -> bool {
        self.state() == ConditionState::Valid
    }

    pub fn failed(&self) -> bool {
        self.state() == ConditionState::Failed
    }

    pub fn result(&self) -> C::Output {
        self.check.lock().result()
    }

    pub fn failure(&self) -> Option<String> {
        self.failure.lock().clone()
    }
}

impl<C: Check> fmt::Debug for ConditionChecker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionChecker")
         .field("name", &self.name)
         .field("kind", &C::KIND)
         .field("state", &self.state.get().map(|s| s.state()))
         .finish()
    }
}

impl<C: Check> fmt::Display for ConditionChecker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        write!(f, "{} condition '{}' {state}", C::KIND, self.name)?;
        if state == ConditionState::Failed {
            match self.failure.lock().as_deref() {
                Some(reason) => write!(f, ": {reason}")?,
                None => write!(f, ": failure recorded before restart")?,
            }
        }
        let check = self.check.lock();
        write!(f, "; expected {}, received {}", check.expected(), check.received())
    }
}

impl<C: Check> Initializable for ConditionChecker<C> {
    fn initialize(&self, ctx: &Arc<ContainerContext>) -> FlowResult<()> {
        if self.state.get().is_some() {
            return Err(FlowError::Internal(format!("checker '{}' accepted values before initialize", self.name)));
        }
        let _ = self.log_target.set(ctx.log_target().to_string());
        let state = self.state.get_or_init(|| self.attach(ctx.condition_memory(&self.name)));
        state.register_metrics(ctx, &self.name)?;
        info!(target: self.target(),
              "checker:initialize name={} kind={} seq={} state={}", self.name, C::KIND, state.seq(), state.state());
        Ok(())
    }
}

impl<C: Check> Logic for ConditionChecker<C> {
    fn call(&self, value: Value) -> FlowResult<Option<Value>> {
        self.accept(&value);
        Ok(None)
    }

    fn as_initializable(&self) -> Option<&dyn Initializable> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<C: Check> Observable for ConditionChecker<C> {
    type Output = C::Output;

    fn valid(&self) -> bool {
        ConditionChecker::valid(self)
    }

    fn failed(&self) -> bool {
        ConditionChecker::failed(self)
    }

    fn result(&self) -> C::Output {
        ConditionChecker::result(self)
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Válida al tercer valor; falla con un valor negativo.
    #[derive(Debug, Default)]
    struct ThirdPositive {
        seen: u64,
    }

    impl Check for ThirdPositive {
        type Output = u64;
        const KIND: &'static str = "third_positive";

        fn check(&mut self, count: u64, value: &Value) -> Verdict {
            self.seen = count;
            match value.as_int() {
                Some(i) if i < 0 => Verdict::Fail(format!("negative value {i}")),
                _ if count >= 3 => Verdict::Valid,
                _ => Verdict::Pending,
            }
        }

        fn result(&self) -> u64 {
            self.seen
        }

        fn expected(&self) -> String {
            "3 positive values".into()
        }

        fn received(&self) -> String {
            format!("{} values", self.seen)
        }
    }

    #[test]
    fn failure_is_absorbing() {
        let c = ConditionChecker::new("t", ThirdPositive::default());
        for i in 1..=3 {
            c.accept(&Value::Int(i));
        }
        assert!(c.valid());
        c.accept(&Value::Int(-1));
        assert!(c.failed() && !c.valid());
        c.accept(&Value::Int(5));
        assert!(!c.valid());
        // los valores posteriores al fallo no se cuentan
        assert_eq!(c.result(), 4);
        assert!(!c.attached().set_valid());
        let text = c.to_string();
        assert!(text.contains("failed: negative value -1"), "{text}");
    }

    #[test]
    fn failure_survives_rebuild_through_shared_memory() {
        let ctx = ContainerContext::builder("pe").build();
        let first = ConditionChecker::new("shared", ThirdPositive::default());
        first.initialize(&ctx).expect("initialize");
        first.accept(&Value::Int(-3));
        assert!(first.failed());

        let rebuilt = ConditionChecker::new("shared", ThirdPositive::default());
        rebuilt.initialize(&ctx).expect("initialize");
        for i in 1..=5 {
            rebuilt.accept(&Value::Int(i));
        }
        assert!(rebuilt.failed() && !rebuilt.valid());
        assert!(rebuilt.to_string().contains("before restart"));
    }

    #[test]
    fn reading_before_initialize_keeps_shared_memory() {
        let ctx = ContainerContext::builder("pe").build();
        let first = ConditionChecker::new("early", ThirdPositive::default());
        first.initialize(&ctx).expect("initialize");
        first.accept(&Value::Int(-1));

        let rebuilt = ConditionChecker::new("early", ThirdPositive::default());
        assert!(!rebuilt.valid() && !rebuilt.failed());
        assert!(rebuilt.to_string().contains("pending"));
        rebuilt.initialize(&ctx).expect("initialize");
        assert!(rebuilt.failed());
    }

    #[test]
    fn accept_before_initialize_is_rejected() {
        let ctx = ContainerContext::builder("pe").build();
        let c = ConditionChecker::new("late", ThirdPositive::default());
        c.accept(&Value::Int(1));
        assert!(matches!(c.initialize(&ctx), Err(FlowError::Internal(_))));
    }

    #[test]
    fn metrics_track_state() {
        let ctx = ContainerContext::builder("pe").build();
        let c = ConditionChecker::new("m", ThirdPositive::default());
        c.initialize(&ctx).expect("initialize");
        let prefix = ctx.config().metric_prefix.clone();
        let read = |metric: &str| ctx.metrics().read(&metric_name(&prefix, metric, "m"));
        assert_eq!((read(VALID_METRIC), read(SEQ_METRIC), read(FAIL_METRIC)), (Some(0), Some(0), Some(0)));
        for i in 1..=3 {
            c.accept(&Value::Int(i));
        }
        assert_eq!((read(VALID_METRIC), read(SEQ_METRIC), read(FAIL_METRIC)), (Some(1), Some(3), Some(0)));
        c.accept(&Value::Int(-1));
        assert_eq!((read(VALID_METRIC), read(FAIL_METRIC)), (Some(0), Some(1)));
        assert_eq!(ctx.metrics().kind(&metric_name(&prefix, SEQ_METRIC, "m")), Some(MetricKind::Counter));
    }
}
