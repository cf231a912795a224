//! Handles de lógica: dueños de la instancia viva dentro del contenedor.
//!
//! - `ResettableLogic`: caso general. `reinitialize` construye e inicializa la
//!   cadena nueva fuera del lock y sólo después la intercambia, de modo que
//!   `get()` nunca observa una instancia a medio construir.
//! - `StatelessLogic`: la lógica se calcula una vez y nunca se reinstala.
//!   Sólo es válida cuando la lógica es inmutable.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::RwLock;

use super::{InstalledChain, Logic, LogicSpec};
use crate::context::ContainerContext;
use crate::errors::{FlowError, FlowResult};
use crate::model::Value;

pub trait LogicHandle: Send + Sync {
    /// Lógica viva (raíz de la cadena).
    fn get(&self) -> Arc<dyn Logic>;

    /// Callback por tuple, protegido frente a un `close` concurrente.
    fn invoke(&self, value: Value) -> FlowResult<Option<Value>>;

    fn reinitialize(&self, spec: &LogicSpec) -> FlowResult<()>;

    /// Cierre best-effort; los errores se registran, nunca se propagan.
    fn close(&self);

    fn is_closed(&self) -> bool;

    fn spec(&self) -> LogicSpec;
}

/// Instala la lógica y elige el handle: sin estado sólo si la lógica lo
/// declara y el contenedor no pertenece a una región consistente.
pub fn new_handle(ctx: Arc<ContainerContext>, spec: &LogicSpec) -> FlowResult<Arc<dyn LogicHandle>> {
    let chain = InstalledChain::load(&ctx, spec)?;
    if chain.root().is_stateless() && !ctx.in_consistent_region() {
        Ok(Arc::new(StatelessLogic::from_chain(ctx, chain)?))
    } else {
        Ok(Arc::new(ResettableLogic::from_chain(ctx, chain)?))
    }
}

fn install(ctx: &Arc<ContainerContext>, chain: &InstalledChain) -> FlowResult<()> {
    info!(target: ctx.log_target(),
          "install:start fingerprint={} depth={}", chain.fingerprint(), chain.depth());
    if let Err(e) = chain.initialize(ctx) {
        warn!(target: ctx.log_target(), "install:failed fingerprint={} err={e}", chain.fingerprint());
        // Lo que ya se inicializó se libera antes de propagar.
        chain.close(ctx);
        return Err(e);
    }
    Ok(())
}

pub struct ResettableLogic {
    ctx: Arc<ContainerContext>,
    current: RwLock<Arc<InstalledChain>>,
    closed: AtomicBool,
}

impl ResettableLogic {
    pub fn new(ctx: Arc<ContainerContext>, spec: &LogicSpec) -> FlowResult<Self> {
        let chain = InstalledChain::load(&ctx, spec)?;
        Self::from_chain(ctx, chain)
    }

    pub fn from_chain(ctx: Arc<ContainerContext>, chain: InstalledChain) -> FlowResult<Self> {
        install(&ctx, &chain)?;
        Ok(Self { ctx,
                  current: RwLock::new(Arc::new(chain)),
                  closed: AtomicBool::new(false) })
    }

    fn current(&self) -> Arc<InstalledChain> {
        self.current.read().clone()
    }

    pub fn fingerprint(&self) -> String {
        self.current().fingerprint().to_string()
    }
}

impl LogicHandle for ResettableLogic {
    fn get(&self) -> Arc<dyn Logic> {
        self.current().root().clone()
    }

    fn invoke(&self, value: Value) -> FlowResult<Option<Value>> {
        loop {
            if self.is_closed() {
                return Err(FlowError::Closed);
            }
            let chain = self.current();
            if let Some(_guards) = chain.acquire() {
                return chain.root().call(value);
            }
            // Cadena reemplazada por un reinitialize entre la lectura y los
            // locks: se reintenta con la actual.
            debug!(target: self.ctx.log_target(), "invoke:retry replaced fingerprint={}", chain.fingerprint());
        }
    }

    fn reinitialize(&self, spec: &LogicSpec) -> FlowResult<()> {
        if self.is_closed() {
            return Err(FlowError::Closed);
        }
        let chain = Arc::new(InstalledChain::load(&self.ctx, spec)?);
        install(&self.ctx, &chain)?;
        let previous = {
            let mut guard = self.current.write();
            // close() pudo ejecutarse mientras se inicializaba la cadena nueva.
            if self.is_closed() {
                drop(guard);
                warn!(target: self.ctx.log_target(),
                      "reinitialize:closed_during_install fingerprint={}", chain.fingerprint());
                chain.close(&self.ctx);
                return Err(FlowError::Closed);
            }
            std::mem::replace(&mut *guard, chain)
        };
        info!(target: self.ctx.log_target(),
              "reinitialize:swapped from={} to={}", previous.fingerprint(), spec.fingerprint());
        // La instancia reemplazada no vuelve a usarse; se liberan sus recursos.
        previous.close(&self.ctx);
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Tras marcar `closed`, ningún reinitialize vuelve a intercambiar.
        self.current().close(&self.ctx);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn spec(&self) -> LogicSpec {
        self.current().spec().clone()
    }
}

pub struct StatelessLogic {
    ctx: Arc<ContainerContext>,
    chain: InstalledChain,
    closed: AtomicBool,
}

impl StatelessLogic {
    pub fn new(ctx: Arc<ContainerContext>, spec: &LogicSpec) -> FlowResult<Self> {
        let chain = InstalledChain::load(&ctx, spec)?;
        Self::from_chain(ctx, chain)
    }

    pub fn from_chain(ctx: Arc<ContainerContext>, chain: InstalledChain) -> FlowResult<Self> {
        install(&ctx, &chain)?;
        Ok(Self { ctx,
                  chain,
                  closed: AtomicBool::new(false) })
    }
}

impl LogicHandle for StatelessLogic {
    fn get(&self) -> Arc<dyn Logic> {
        self.chain.root().clone()
    }

    fn invoke(&self, value: Value) -> FlowResult<Option<Value>> {
        if self.is_closed() {
            return Err(FlowError::Closed);
        }
        self.chain.invoke(value)
    }

    fn reinitialize(&self, spec: &LogicSpec) -> FlowResult<()> {
        debug!(target: self.ctx.log_target(),
               "reinitialize:skipped stateless fingerprint={} requested={}",
               self.chain.fingerprint(),
               spec.fingerprint());
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.chain.close(&self.ctx);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn spec(&self) -> LogicSpec {
        self.chain.spec().clone()
    }
}
