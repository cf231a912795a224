//! Puente de ciclo de vida de la lógica de usuario.
//!
//! La lógica instalada en un contenedor puede ser una cadena arbitraria de
//! decoradores. Cada eslabón expone opcionalmente tres capacidades, que se
//! consultan eslabón a eslabón:
//! - `inner()` (Wrapper): siguiente eslabón hacia dentro.
//! - `as_initializable()`: recibe el contexto al instalar (de fuera hacia dentro).
//! - `as_closeable()`: posee recursos; se cierra bajo su propio lock.
//!
//! La cadena no debe ser cíclica. No es detectable en general; el recorrido
//! está acotado por `CoreConfig::max_chain_depth` y falla con
//! `FlowError::ChainTooDeep` si se supera.

mod chain;
mod handle;
mod registry;
mod spec;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub use chain::InstalledChain;
pub use handle::{new_handle, LogicHandle, ResettableLogic, StatelessLogic};
pub use registry::{LogicFactory, LogicRegistry};
pub use spec::{LogicEnvelope, LogicSpec};

use crate::context::ContainerContext;
use crate::errors::FlowResult;
use crate::model::Value;

/// Un eslabón de lógica de usuario.
pub trait Logic: Send + Sync + fmt::Debug {
    /// Callback por tuple. `None` significa que no hay valor de salida.
    fn call(&self, value: Value) -> FlowResult<Option<Value>>;

    fn inner(&self) -> Option<Arc<dyn Logic>> {
        None
    }

    fn as_initializable(&self) -> Option<&dyn Initializable> {
        None
    }

    fn as_closeable(&self) -> Option<&dyn Closeable> {
        None
    }

    /// La lógica es inmutable: puede compartirse sin reinstalar.
    fn is_stateless(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}

pub trait Initializable {
    fn initialize(&self, ctx: &Arc<ContainerContext>) -> FlowResult<()>;
}

pub trait Closeable {
    fn close(&self) -> FlowResult<()>;
}

type CallFn = dyn Fn(Value) -> FlowResult<Option<Value>> + Send + Sync;

/// Adaptador: cualquier closure como lógica sin capacidades.
pub struct FnLogic {
    f: Box<CallFn>,
    stateless: bool,
}

impl FnLogic {
    pub fn new<F>(f: F) -> Self
        where F: Fn(Value) -> FlowResult<Option<Value>> + Send + Sync + 'static
    {
        Self { f: Box::new(f),
               stateless: false }
    }

    /// Igual que `new` pero declarando la lógica inmutable.
    pub fn stateless<F>(f: F) -> Self
        where F: Fn(Value) -> FlowResult<Option<Value>> + Send + Sync + 'static
    {
        Self { f: Box::new(f),
               stateless: true }
    }
}

impl fmt::Debug for FnLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnLogic").field("stateless", &self.stateless).finish()
    }
}

impl Logic for FnLogic {
    fn call(&self, value: Value) -> FlowResult<Option<Value>> {
        (self.f)(value)
    }

    fn is_stateless(&self) -> bool {
        self.stateless
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
