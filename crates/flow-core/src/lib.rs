//! flow-core: runtime embebido en un contenedor de procesamiento de streams.
//!
//! - `codec`: registro forma → codec (Value ↔ Tuple).
//! - `logic`: instalación, reinitialize y cierre de la lógica de usuario.
//! - `context`: contexto del contenedor (métricas, registros, memoria).
//! - `graph` / `operator`: lo mínimo del grafo que el runtime consume.
pub mod codec;
pub mod config;
pub mod constants;
pub mod context;
pub mod errors;
pub mod graph;
pub mod hashing;
pub mod logic;
pub mod model;
pub mod operator;

pub use codec::{Codec, CodecRegistry, JsonSerializer, Serializer, SerializerDescriptor};
pub use config::{CoreConfig, CONFIG};
pub use context::{ContainerContext, MetricKind, MetricRegistry, MetricSource, RegionControl};
pub use errors::{FlowError, FlowResult};
pub use graph::{GraphDescription, OperatorDecl, StreamDecl, Topology};
pub use logic::{new_handle, Closeable, FnLogic, Initializable, Logic, LogicHandle, LogicRegistry, LogicSpec,
                ResettableLogic, StatelessLogic};
pub use model::{Attribute, AttributeDecl, AttributeKind, StreamSchema, Tuple, Value, ValueShape};
pub use operator::FunctionOperator;
