//! Cadena de lógica instalada: raíz + eslabones recorridos una vez.
//!
//! - `initialize`: de fuera hacia dentro, sólo eslabones `Initializable`.
//! - `invoke`: toma los locks de los eslabones `Closeable` (de fuera hacia
//!   dentro) mientras dura la llamada.
//! - `close`: de dentro hacia fuera, un eslabón cada vez bajo su lock. Cada
//!   eslabón se cierra como mucho una vez; un fallo se registra y no impide
//!   cerrar el resto.
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};

use super::{Logic, LogicSpec};
use crate::context::ContainerContext;
use crate::errors::{FlowError, FlowResult};
use crate::model::Value;

struct Link {
    index: usize,
    logic: Arc<dyn Logic>,
    lock: Mutex<()>,
    closed: AtomicBool,
}

pub struct InstalledChain {
    spec: LogicSpec,
    fingerprint: String,
    links: Vec<Link>,
}

impl fmt::Debug for InstalledChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstalledChain")
         .field("fingerprint", &self.fingerprint)
         .field("depth", &self.links.len())
         .finish()
    }
}

/// Recorre la cadena hasta el primer eslabón que no es wrapper.
pub(crate) fn walk_chain(root: &Arc<dyn Logic>, max_depth: usize) -> FlowResult<Vec<Arc<dyn Logic>>> {
    let mut links = vec![root.clone()];
    let mut current = root.clone();
    while let Some(next) = current.inner() {
        if links.len() >= max_depth {
            return Err(FlowError::ChainTooDeep(max_depth));
        }
        links.push(next.clone());
        current = next;
    }
    Ok(links)
}

impl InstalledChain {
    /// Deserializa la lógica de `spec` con el registro del contexto.
    pub fn load(ctx: &ContainerContext, spec: &LogicSpec) -> FlowResult<Self> {
        let root = ctx.logic_registry().load(spec)?;
        Self::from_root(ctx, spec.clone(), root)
    }

    pub fn from_root(ctx: &ContainerContext, spec: LogicSpec, root: Arc<dyn Logic>) -> FlowResult<Self> {
        let links = walk_chain(&root, ctx.config().max_chain_depth)?.into_iter()
                                                                    .enumerate()
                                                                    .map(|(index, logic)| Link { index,
                                                                                                 logic,
                                                                                                 lock: Mutex::new(()),
                                                                                                 closed: AtomicBool::new(false) })
                                                                    .collect();
        let fingerprint = spec.fingerprint();
        Ok(Self { spec,
                  fingerprint,
                  links })
    }

    pub fn root(&self) -> &Arc<dyn Logic> {
        // walk_chain siempre devuelve al menos la raíz.
        &self.links[0].logic
    }

    pub fn spec(&self) -> &LogicSpec {
        &self.spec
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn depth(&self) -> usize {
        self.links.len()
    }

    pub fn initialize(&self, ctx: &Arc<ContainerContext>) -> FlowResult<()> {
        for link in &self.links {
            if let Some(init) = link.logic.as_initializable() {
                debug!(target: ctx.log_target(), "initialize:link index={} fingerprint={}", link.index, self.fingerprint);
                init.initialize(ctx)?;
            }
        }
        Ok(())
    }

    /// Toma los locks de los eslabones `Closeable`. `None` si alguno ya se
    /// cerró; el llamador decide si reintenta con otra cadena.
    pub fn acquire(&self) -> Option<Vec<MutexGuard<'_, ()>>> {
        let mut guards: Vec<MutexGuard<'_, ()>> = Vec::new();
        for link in self.links.iter().filter(|l| l.logic.as_closeable().is_some()) {
            guards.push(link.lock.lock());
            if link.closed.load(Ordering::SeqCst) {
                return None;
            }
        }
        Some(guards)
    }

    pub fn invoke(&self, value: Value) -> FlowResult<Option<Value>> {
        let Some(_guards) = self.acquire() else { return Err(FlowError::Closed) };
        self.root().call(value)
    }

    /// Cierra los eslabones que poseen recursos. Devuelve cuántos se cerraron
    /// en esta llamada.
    pub fn close(&self, ctx: &ContainerContext) -> usize {
        let mut closed = 0;
        for link in self.links.iter().rev() {
            let Some(closeable) = link.logic.as_closeable() else { continue };
            let _guard = link.lock.lock();
            if link.closed.swap(true, Ordering::SeqCst) {
                continue;
            }
            closed += 1;
            if let Err(e) = closeable.close() {
                let err = FlowError::ResourceClose { link: link.index,
                                                     message: e.to_string() };
                warn!(target: ctx.log_target(), "close:link_failed fingerprint={} err={err}", self.fingerprint);
            }
        }
        debug!(target: ctx.log_target(), "close:done fingerprint={} closed={closed}", self.fingerprint);
        closed
    }
}
