//! Editable field tree.
//!
//! # Responsibility
//! - Own the root field sequence of one editing session.
//! - Provide insert/remove/update addressed by `(field_id, parent_id?)`.
//!
//! # Invariants
//! - Field ids are unique across the whole tree.
//! - Every mutation rebuilds only the path from the root to the edited
//!   sibling list; all other subtrees stay shared (`Arc::ptr_eq`).
//! - Operations addressed at an unknown id are no-ops, never errors.

use crate::model::field::{Field, FieldId, FieldPatch};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Errors raised when adopting an externally supplied tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeValidationError {
    /// Two nodes share the same id.
    DuplicateFieldId(FieldId),
}

impl Display for TreeValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateFieldId(id) => write!(f, "duplicate field id in tree: {id}"),
        }
    }
}

impl Error for TreeValidationError {}

/// One rendered row of a depth-first tree listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRow<'a> {
    /// Nesting depth, `0` for root-level fields.
    pub depth: usize,
    /// Enclosing field, `None` at root level.
    pub parent_id: Option<&'a FieldId>,
    pub field: &'a Field,
}

/// Root sequence of the editable schema tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTree {
    fields: Vec<Arc<Field>>,
}

impl FieldTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from owned root fields.
    ///
    /// # Errors
    /// - `DuplicateFieldId` when any id occurs twice.
    pub fn try_from_fields(
        fields: impl IntoIterator<Item = Field>,
    ) -> Result<Self, TreeValidationError> {
        Self::try_from_shared(fields.into_iter().map(Arc::new).collect())
    }

    /// Builds a tree that shares the given root fields, e.g. from a snapshot.
    ///
    /// # Errors
    /// - `DuplicateFieldId` when any id occurs twice.
    pub fn try_from_shared(fields: Vec<Arc<Field>>) -> Result<Self, TreeValidationError> {
        let mut seen = HashSet::new();
        ensure_unique_ids(&fields, &mut seen)?;
        Ok(Self { fields })
    }

    /// Root-level fields in order.
    pub fn fields(&self) -> &[Arc<Field>] {
        &self.fields
    }

    /// Returns a shared handle on the root sequence.
    pub fn share(&self) -> Vec<Arc<Field>> {
        self.fields.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Counts every node, descendants included.
    pub fn node_count(&self) -> usize {
        count_nodes(&self.fields)
    }

    /// Finds a node anywhere in the tree.
    pub fn find(&self, field_id: &FieldId) -> Option<&Arc<Field>> {
        find_in(&self.fields, field_id)
    }

    /// Appends a fresh field to the root sequence or under `parent_id`.
    ///
    /// Returns `None` without changing the tree when `parent_id` is unknown.
    pub fn insert(&mut self, parent_id: Option<&FieldId>) -> Option<Arc<Field>> {
        let created = Arc::new(Field::new());
        let applied = self.rebuild(parent_id, |siblings| {
            let mut next = Vec::with_capacity(siblings.len() + 1);
            next.extend(siblings.iter().cloned());
            next.push(Arc::clone(&created));
            Some(next)
        });
        applied.then_some(created)
    }

    /// Removes `field_id` and its subtree from the root sequence or from the
    /// children of `parent_id`.
    ///
    /// Returns `false` when nothing matched.
    pub fn remove(&mut self, field_id: &FieldId, parent_id: Option<&FieldId>) -> bool {
        self.rebuild(parent_id, |siblings| {
            let index = siblings.iter().position(|field| &field.id == field_id)?;
            let mut next = siblings.to_vec();
            next.remove(index);
            Some(next)
        })
    }

    /// Merges `patch` into `field_id`, found at root level or under `parent_id`.
    ///
    /// Returns `false` when nothing matched.
    pub fn update(
        &mut self,
        field_id: &FieldId,
        patch: &FieldPatch,
        parent_id: Option<&FieldId>,
    ) -> bool {
        self.rebuild(parent_id, |siblings| {
            let index = siblings.iter().position(|field| &field.id == field_id)?;
            let mut next = siblings.to_vec();
            next[index] = Arc::new(patch.apply(&siblings[index]));
            Some(next)
        })
    }

    /// Depth-first listing, descending only into nested fields.
    pub fn rows(&self) -> Vec<FieldRow<'_>> {
        let mut rows = Vec::new();
        collect_rows(&self.fields, None, 0, &mut rows);
        rows
    }

    fn rebuild<F>(&mut self, parent_id: Option<&FieldId>, edit: F) -> bool
    where
        F: Fn(&[Arc<Field>]) -> Option<Vec<Arc<Field>>>,
    {
        let rebuilt = match parent_id {
            None => edit(&self.fields),
            Some(parent_id) => rebuild_under(&self.fields, parent_id, &edit),
        };
        match rebuilt {
            Some(fields) => {
                self.fields = fields;
                true
            }
            None => false,
        }
    }
}

/// Locates `parent_id` below `fields`, applies `edit` to its children, and
/// rebuilds every ancestor on the way back up.
///
/// Returns `None` when the parent is missing or `edit` declined.
fn rebuild_under<F>(
    fields: &[Arc<Field>],
    parent_id: &FieldId,
    edit: &F,
) -> Option<Vec<Arc<Field>>>
where
    F: Fn(&[Arc<Field>]) -> Option<Vec<Arc<Field>>>,
{
    for (index, field) in fields.iter().enumerate() {
        let children = if &field.id == parent_id {
            // ids are unique, so the search ends here either way
            Some(edit(&field.children)?)
        } else {
            rebuild_under(&field.children, parent_id, edit)
        };

        if let Some(children) = children {
            let mut next = fields.to_vec();
            next[index] = Arc::new(field.rebuilt_with_children(children));
            return Some(next);
        }
    }
    None
}

fn ensure_unique_ids<'a>(
    fields: &'a [Arc<Field>],
    seen: &mut HashSet<&'a FieldId>,
) -> Result<(), TreeValidationError> {
    for field in fields {
        if !seen.insert(&field.id) {
            return Err(TreeValidationError::DuplicateFieldId(field.id.clone()));
        }
        ensure_unique_ids(&field.children, seen)?;
    }
    Ok(())
}

fn count_nodes(fields: &[Arc<Field>]) -> usize {
    fields
        .iter()
        .map(|field| 1 + count_nodes(&field.children))
        .sum()
}

fn find_in<'a>(fields: &'a [Arc<Field>], field_id: &FieldId) -> Option<&'a Arc<Field>> {
    for field in fields {
        if &field.id == field_id {
            return Some(field);
        }
        if let Some(found) = find_in(&field.children, field_id) {
            return Some(found);
        }
    }
    None
}

fn collect_rows<'a>(
    fields: &'a [Arc<Field>],
    parent_id: Option<&'a FieldId>,
    depth: usize,
    rows: &mut Vec<FieldRow<'a>>,
) {
    for field in fields {
        rows.push(FieldRow {
            depth,
            parent_id,
            field: field.as_ref(),
        });
        if field.is_nested() {
            collect_rows(&field.children, Some(&field.id), depth + 1, rows);
        }
    }
}
