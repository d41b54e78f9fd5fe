//! Schema editor domain model.
//!
//! # Responsibility
//! - Define the field tree edited in one session.
//! - Define the saved snapshot shape persisted by stores.
//!
//! # Invariants
//! - Field ids are unique across one tree.
//! - Snapshots are immutable; changing a schema means saving a new one.

pub mod field;
pub mod field_tree;
pub mod snapshot;
