//! Schema projection entry points.
//!
//! # Responsibility
//! - Fold an editable field tree into the simplified output schema.
//! - Render projected schemas as display JSON.

pub mod projector;
