//! Core logic for the schema builder.
//! This crate owns the field tree, its projection and snapshot persistence.

pub mod db;
pub mod logging;
pub mod model;
pub mod projection;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::field::{Field, FieldId, FieldKind, FieldPatch};
pub use model::field_tree::{FieldRow, FieldTree, TreeValidationError};
pub use model::snapshot::{
    validate_schema_name, SchemaSnapshot, SnapshotId, SnapshotValidationError,
};
pub use projection::projector::{project, render_schema_json, ProjectedSchema};
pub use repo::schema_store::{
    InMemorySchemaStore, SchemaStore, SqliteSchemaStore, StoreError, StoreResult,
    DEFAULT_STORE_KEY,
};
pub use service::editor_service::{DeleteOutcome, EditorError, SchemaEditor};

/// Minimal health-check API for front-end wiring.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
