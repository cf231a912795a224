//! Constantes del runtime del contenedor.
//!
//! Los nombres de atributos de los esquemas fijos forman parte del formato de
//! cable: cambiarlos rompe la compatibilidad con productores de otros procesos.

/// Versión lógica del formato de sobres de lógica y descriptores. Se incluye
/// en el fingerprint de `LogicSpec`.
pub const RUNTIME_VERSION: &str = "T1.0";

/// Prefijo por defecto de las métricas de condiciones.
pub const DEFAULT_METRIC_PREFIX: &str = "condition";

/// Límite por defecto de eslabones al recorrer una cadena de wrappers.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 64;

/// Id del serializer por defecto para objetos embebidos.
pub const DEFAULT_SERIALIZER_ID: &str = "json";

pub const STRING_ATTRIBUTE: &str = "string";
pub const BINARY_ATTRIBUTE: &str = "binary";
pub const MARKUP_ATTRIBUTE: &str = "document";
pub const OBJECT_ATTRIBUTE: &str = "__spl_po";
