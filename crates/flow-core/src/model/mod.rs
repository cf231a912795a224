//! Modelos neutrales (Value, Tuple, StreamSchema).

pub mod schema;
pub mod tuple;
pub mod value;

pub use schema::{AttributeDecl, AttributeKind, StreamSchema};
pub use tuple::{empty_blob, Attribute, Tuple};
pub use value::{Value, ValueShape};
