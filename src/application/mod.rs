//! Application services: sanitization, the renderer seam and the conversion pipeline.

pub mod convert;
pub mod error;
pub mod renderer;
pub mod sanitize;
