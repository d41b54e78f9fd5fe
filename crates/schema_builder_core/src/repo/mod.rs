//! Persistence contracts and implementations.
//!
//! # Responsibility
//! - Define the snapshot store contract the editor depends on.
//! - Isolate encoding and SQLite details from session orchestration.
//!
//! # Invariants
//! - Store reads degrade corrupt data to an empty collection.
//! - Store writes replace the whole collection.

pub mod schema_store;
