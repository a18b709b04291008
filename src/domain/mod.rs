//! Domain layer: request-scoped documents and the conversion lifecycle.

pub mod document;
pub mod types;
