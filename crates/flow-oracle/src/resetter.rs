//! Condiciones independientes de stream.
//!
//! `ResetCondition` añade al grafo un operador sin entradas cuya lógica
//! (`Resetter`) fuerza resets de la región consistente a intervalos
//! aleatorios. La condición es válida tras un número mínimo de resets; el
//! contador vive en la memoria de condición y por tanto sobrevive a los
//! reinitialize que provocan esos mismos resets.
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flow_core::logic::LogicRegistry;
use flow_core::{Closeable, ContainerContext, FlowError, FlowResult, Initializable, Logic, LogicSpec, OperatorDecl,
                RegionControl, Topology, Value, ValueShape};
use log::{debug, info, warn};
use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::checker::{CheckerState, ConditionState};
use crate::condition::Observable;
use crate::variants::{parse_params, to_params};

pub const RESETTER_LOGIC: &str = "tupleflow.resetter";
pub const RESETTER_OPERATOR_PREFIX: &str = "resetter:";

/// Condición que no observa ningún stream y se instala en el grafo.
pub trait StreamIndependent {
    fn add_to(&self, topology: &mut Topology, name: &str) -> FlowResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetParams {
    pub name: String,
    pub minimum: u64,
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetCondition {
    pub minimum: u64,
    pub min_interval: Duration,
    pub max_interval: Duration,
}

impl ResetCondition {
    pub fn new(minimum: u64, min_interval: Duration, max_interval: Duration) -> Self {
        Self { minimum,
               min_interval,
               max_interval }
    }

    pub fn operator_name(name: &str) -> String {
        format!("{RESETTER_OPERATOR_PREFIX}{name}")
    }
}

impl StreamIndependent for ResetCondition {
    fn add_to(&self, topology: &mut Topology, name: &str) -> FlowResult<()> {
        if self.min_interval > self.max_interval {
            return Err(FlowError::Config(format!("reset interval min {:?} > max {:?}",
                                                 self.min_interval, self.max_interval)));
        }
        let params = to_params(&ResetParams { name: name.to_string(),
                                              minimum: self.minimum,
                                              min_interval_ms: self.min_interval.as_millis() as u64,
                                              max_interval_ms: self.max_interval.as_millis() as u64 })?;
        let logic = LogicSpec::new(ValueShape::PrimitiveString, RESETTER_LOGIC, params)?;
        topology.add_operator(OperatorDecl { name: Self::operator_name(name),
                                             input: None,
                                             output: None,
                                             logic })
    }
}

pub fn register_resetter(registry: &LogicRegistry) {
    registry.register(RESETTER_LOGIC, |params| {
                let p: ResetParams = parse_params(params)?;
                Ok(Arc::new(Resetter::new(p)) as Arc<dyn Logic>)
            });
}

struct Worker {
    stop: Arc<(Mutex<bool>, Condvar)>,
    thread: JoinHandle<()>,
}

/// Lógica del resetter: un hilo de fondo que pide resets a la región.
pub struct Resetter {
    params: ResetParams,
    state: OnceCell<Arc<CheckerState>>,
    worker: Mutex<Option<Worker>>,
}

impl Resetter {
    pub fn new(params: ResetParams) -> Self {
        Self { params,
               state: OnceCell::new(),
               worker: Mutex::new(None) }
    }

    /// Estado adjunto por `initialize`; `None` antes.
    pub fn state(&self) -> Option<&Arc<CheckerState>> {
        self.state.get()
    }

    pub fn resets(&self) -> u64 {
        self.state().map_or(0, |s| s.seq())
    }

    fn spawn(&self,
             ctx: &ContainerContext,
             state: Arc<CheckerState>,
             region: Arc<dyn RegionControl>)
             -> FlowResult<Worker> {
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let params = self.params.clone();
        let target = ctx.log_target().to_string();
        let flag = stop.clone();
        let thread = thread::Builder::new().name(format!("resetter-{}", params.name))
                                           .spawn(move || run(params, state, region, flag, target))
                                           .map_err(|e| FlowError::Internal(format!("spawn resetter: {e}")))?;
        Ok(Worker { stop, thread })
    }
}

fn run(params: ResetParams,
       state: Arc<CheckerState>,
       region: Arc<dyn RegionControl>,
       stop: Arc<(Mutex<bool>, Condvar)>,
       target: String) {
    let mut rng = rand::thread_rng();
    let (lock, cvar) = &*stop;
    let (lo, hi) = (params.min_interval_ms, params.max_interval_ms.max(params.min_interval_ms));
    loop {
        let wait = Duration::from_millis(rng.gen_range(lo..=hi));
        {
            let mut stopped = lock.lock();
            if !*stopped {
                cvar.wait_for(&mut stopped, wait);
            }
            if *stopped {
                break;
            }
        }
        match region.request_reset() {
            Ok(()) => {
                state.record();
                if state.seq() >= params.minimum {
                    state.set_valid();
                }
                info!(target: target.as_str(), "resetter:reset name={} resets={}", params.name, state.seq());
            }
            Err(e) => warn!(target: target.as_str(), "resetter:reset_failed name={} err={e}", params.name),
        }
    }
    debug!(target: target.as_str(), "resetter:stopped name={}", params.name);
}

impl fmt::Debug for Resetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resetter")
         .field("params", &self.params)
         .field("running", &self.worker.lock().is_some())
         .finish()
    }
}

impl Initializable for Resetter {
    fn initialize(&self, ctx: &Arc<ContainerContext>) -> FlowResult<()> {
        let state = self.state
                        .get_or_init(|| Arc::new(CheckerState::new(ctx.condition_memory(&self.params.name))))
                        .clone();
        state.register_metrics(ctx, &self.params.name)?;
        if state.seq() >= self.params.minimum {
            state.set_valid();
        }
        let Some(region) = ctx.region_control().cloned() else {
            warn!(target: ctx.log_target(), "resetter:no_region name={}", self.params.name);
            return Ok(());
        };
        let worker = self.spawn(ctx, state.clone(), region)?;
        info!(target: ctx.log_target(),
              "resetter:start name={} minimum={} resets={}", self.params.name, self.params.minimum, state.seq());
        *self.worker.lock() = Some(worker);
        Ok(())
    }
}

impl Closeable for Resetter {
    fn close(&self) -> FlowResult<()> {
        let Some(worker) = self.worker.lock().take() else { return Ok(()) };
        {
            let (lock, cvar) = &*worker.stop;
            *lock.lock() = true;
            cvar.notify_all();
        }
        if worker.thread.thread().id() == thread::current().id() {
            return Ok(());
        }
        worker.thread
              .join()
              .map_err(|_| FlowError::Internal(format!("resetter '{}' thread panicked", self.params.name)))
    }
}

impl Logic for Resetter {
    fn call(&self, _value: Value) -> FlowResult<Option<Value>> {
        Ok(None)
    }

    fn as_initializable(&self) -> Option<&dyn Initializable> {
        Some(self)
    }

    fn as_closeable(&self) -> Option<&dyn Closeable> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Observable for Resetter {
    type Output = u64;

    fn valid(&self) -> bool {
        self.state().is_some_and(|s| s.valid())
    }

    fn failed(&self) -> bool {
        self.state().is_some_and(|s| s.failed())
    }

    fn result(&self) -> u64 {
        self.resets()
    }

    fn describe(&self) -> String {
        let state = self.state().map_or(ConditionState::Pending, |s| s.state());
        format!("resets condition '{}' {state}; expected at least {} resets, received {}",
                self.params.name,
                self.params.minimum,
                self.resets())
    }
}
