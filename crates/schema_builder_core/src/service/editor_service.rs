//! Schema editor session service.
//!
//! # Responsibility
//! - Own the editable field tree, pending schema name and snapshot list of
//!   one editing session.
//! - Route save/load/delete through an injected `SchemaStore`.
//!
//! # Invariants
//! - The in-memory snapshot list only changes after the store accepted the
//!   new collection.
//! - Blank schema names and empty trees are never saved.
//! - Deleting requires the caller's confirmation; declining touches nothing.
//! - Projections are always recomputed from the current tree.

use crate::model::field::{Field, FieldId, FieldPatch};
use crate::model::field_tree::{FieldRow, FieldTree, TreeValidationError};
use crate::model::snapshot::{SchemaSnapshot, SnapshotId, SnapshotValidationError};
use crate::projection::projector::{project, render_schema_json, ProjectedSchema};
use crate::repo::schema_store::{SchemaStore, StoreError};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Errors from editor session operations.
#[derive(Debug)]
pub enum EditorError {
    /// Schema name is blank after trim.
    InvalidSchemaName,
    /// There is nothing to save.
    EmptyFieldTree,
    /// Target snapshot does not exist.
    SnapshotNotFound(SnapshotId),
    /// Stored snapshot tree cannot be edited.
    InvalidSnapshot {
        snapshot_id: SnapshotId,
        source: TreeValidationError,
    },
    /// Store-level failure.
    Store(StoreError),
}

impl Display for EditorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSchemaName => write!(f, "please enter a schema name"),
            Self::EmptyFieldTree => write!(f, "schema has no fields to save"),
            Self::SnapshotNotFound(id) => write!(f, "saved schema not found: {id}"),
            Self::InvalidSnapshot {
                snapshot_id,
                source,
            } => write!(f, "saved schema {snapshot_id} cannot be loaded: {source}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EditorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSnapshot { source, .. } => Some(source),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for EditorError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<SnapshotValidationError> for EditorError {
    fn from(value: SnapshotValidationError) -> Self {
        match value {
            SnapshotValidationError::BlankName => Self::InvalidSchemaName,
        }
    }
}

/// Result of a confirmed or declined delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Snapshot removed and collection persisted.
    Deleted,
    /// Caller declined; nothing changed.
    Declined,
}

/// One editing session over an injected snapshot store.
pub struct SchemaEditor<S: SchemaStore> {
    store: S,
    tree: FieldTree,
    schema_name: String,
    snapshots: Vec<SchemaSnapshot>,
}

impl<S: SchemaStore> SchemaEditor<S> {
    /// Opens a session and loads the saved collection.
    ///
    /// Store read failures degrade to an empty collection.
    pub fn open(store: S) -> Self {
        let snapshots = match store.load_all() {
            Ok(snapshots) => snapshots,
            Err(err) => {
                error!(
                    "event=editor_open module=editor status=degraded error={}",
                    err
                );
                Vec::new()
            }
        };
        info!(
            "event=editor_open module=editor status=ok snapshot_count={}",
            snapshots.len()
        );
        Self {
            store,
            tree: FieldTree::new(),
            schema_name: String::new(),
            snapshots,
        }
    }

    pub fn tree(&self) -> &FieldTree {
        &self.tree
    }

    pub fn fields(&self) -> &[Arc<Field>] {
        self.tree.fields()
    }

    /// Depth-first rows for rendering the editable tree.
    pub fn rows(&self) -> Vec<FieldRow<'_>> {
        self.tree.rows()
    }

    /// Adds a blank field at root level or under `parent_id`.
    pub fn add_field(&mut self, parent_id: Option<&FieldId>) -> Option<Arc<Field>> {
        let created = self.tree.insert(parent_id);
        if created.is_none() {
            debug!("event=field_add module=editor status=noop reason=parent_not_found");
        }
        created
    }

    /// Removes a field and its subtree.
    pub fn remove_field(&mut self, field_id: &FieldId, parent_id: Option<&FieldId>) -> bool {
        let removed = self.tree.remove(field_id, parent_id);
        if !removed {
            debug!("event=field_remove module=editor status=noop field_id={field_id}");
        }
        removed
    }

    /// Applies a partial update to one field.
    pub fn update_field(
        &mut self,
        field_id: &FieldId,
        patch: &FieldPatch,
        parent_id: Option<&FieldId>,
    ) -> bool {
        let updated = self.tree.update(field_id, patch, parent_id);
        if !updated {
            debug!("event=field_update module=editor status=noop field_id={field_id}");
        }
        updated
    }

    /// Live projection of the current tree.
    pub fn projected_schema(&self) -> ProjectedSchema {
        project(self.tree.fields())
    }

    /// Live projection rendered as display JSON.
    pub fn preview_json(&self) -> String {
        render_schema_json(&self.projected_schema())
    }

    pub fn schema_name(&self) -> &str {
        self.schema_name.as_str()
    }

    pub fn set_schema_name(&mut self, name: impl Into<String>) {
        self.schema_name = name.into();
    }

    /// Returns whether `save_schema` would pass input validation.
    pub fn can_save(&self) -> bool {
        !self.schema_name.trim().is_empty() && !self.tree.is_empty()
    }

    /// Saves the current tree as a new snapshot stamped with the current time.
    pub fn save_schema(&mut self) -> Result<SnapshotId, EditorError> {
        self.save_schema_at(Utc::now())
    }

    /// Saves the current tree as a new snapshot stamped `created_at`.
    ///
    /// On success the tree and pending name are reset.
    ///
    /// # Errors
    /// - `InvalidSchemaName` when the pending name is blank.
    /// - `EmptyFieldTree` when the tree has no fields.
    /// - `Store` when persisting the collection fails; nothing changes then.
    pub fn save_schema_at(
        &mut self,
        created_at: DateTime<Utc>,
    ) -> Result<SnapshotId, EditorError> {
        let captured = SchemaSnapshot::capture(self.schema_name.as_str(), &self.tree, created_at);
        let snapshot = match captured {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("event=schema_save module=editor status=rejected reason=blank_name");
                return Err(err.into());
            }
        };
        if self.tree.is_empty() {
            warn!("event=schema_save module=editor status=rejected reason=empty_tree");
            return Err(EditorError::EmptyFieldTree);
        }

        let snapshot_id = snapshot.id.clone();
        let field_count = snapshot.field_count();
        let mut next = Vec::with_capacity(self.snapshots.len() + 1);
        next.extend(self.snapshots.iter().cloned());
        next.push(snapshot);
        self.persist(next, "schema_save")?;

        self.tree = FieldTree::new();
        self.schema_name.clear();
        info!(
            "event=schema_save module=editor status=ok snapshot_id={} field_count={}",
            snapshot_id, field_count
        );
        Ok(snapshot_id)
    }

    /// Saved snapshots in save order.
    pub fn snapshots(&self) -> &[SchemaSnapshot] {
        &self.snapshots
    }

    pub fn snapshot(&self, snapshot_id: &SnapshotId) -> Option<&SchemaSnapshot> {
        self.snapshots
            .iter()
            .find(|snapshot| &snapshot.id == snapshot_id)
    }

    /// Replaces the editable tree with a saved snapshot's tree.
    ///
    /// The snapshot stays untouched; saving again creates a new snapshot.
    pub fn load_snapshot(&mut self, snapshot_id: &SnapshotId) -> Result<(), EditorError> {
        let snapshot = self
            .snapshot(snapshot_id)
            .ok_or_else(|| EditorError::SnapshotNotFound(snapshot_id.clone()))?;
        let tree = FieldTree::try_from_shared(snapshot.fields.clone()).map_err(|source| {
            EditorError::InvalidSnapshot {
                snapshot_id: snapshot_id.clone(),
                source,
            }
        })?;

        self.tree = tree;
        info!(
            "event=schema_load module=editor status=ok snapshot_id={} field_count={}",
            snapshot_id,
            self.tree.node_count()
        );
        Ok(())
    }

    /// Deletes one snapshot after `confirm` approves it.
    ///
    /// # Errors
    /// - `SnapshotNotFound` when the id is unknown; `confirm` is not called.
    /// - `Store` when persisting fails; the in-memory list is unchanged.
    pub fn delete_snapshot<F>(
        &mut self,
        snapshot_id: &SnapshotId,
        confirm: F,
    ) -> Result<DeleteOutcome, EditorError>
    where
        F: FnOnce(&SchemaSnapshot) -> bool,
    {
        let snapshot = self
            .snapshot(snapshot_id)
            .ok_or_else(|| EditorError::SnapshotNotFound(snapshot_id.clone()))?;
        if !confirm(snapshot) {
            debug!("event=schema_delete module=editor status=declined snapshot_id={snapshot_id}");
            return Ok(DeleteOutcome::Declined);
        }

        let next: Vec<SchemaSnapshot> = self
            .snapshots
            .iter()
            .filter(|snapshot| &snapshot.id != snapshot_id)
            .cloned()
            .collect();
        self.persist(next, "schema_delete")?;
        info!("event=schema_delete module=editor status=ok snapshot_id={snapshot_id}");
        Ok(DeleteOutcome::Deleted)
    }

    fn persist(&mut self, next: Vec<SchemaSnapshot>, event: &str) -> Result<(), EditorError> {
        if let Err(err) = self.store.save_all(&next) {
            error!("event={event} module=editor status=error error={err}");
            return Err(err.into());
        }
        self.snapshots = next;
        Ok(())
    }
}
