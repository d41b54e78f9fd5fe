//! Field domain model.
//!
//! # Responsibility
//! - Define one node of the editable schema tree.
//! - Provide partial-update patches applied by tree operations.
//!
//! # Invariants
//! - `id` is assigned at creation and never changes for the node lifetime.
//! - `children` is always present; it is only meaningful for `FieldKind::Nested`.
//! - Children are shared through `Arc`, so a node is never mutated in place
//!   once it is part of a tree.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Opaque field identifier, unique across one tree.
///
/// Fresh ids are random UUID strings. Ids read from storage are accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the raw token.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for FieldId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for FieldId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for FieldId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declared value category of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free-form text value.
    #[default]
    #[serde(rename = "string")]
    Text,
    /// Numeric value.
    Number,
    /// Sub-tree of child fields.
    Nested,
}

impl FieldKind {
    /// Wire name, as stored in serialized trees.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "string",
            Self::Number => "number",
            Self::Nested => "nested",
        }
    }
}

/// One node of the schema tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub id: FieldId,
    /// User-entered label. Empty names are skipped by projection.
    pub name: String,
    /// Serialized as `type` to match the stored tree format.
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Editor metadata only; never projected.
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub children: Vec<Arc<Field>>,
}

impl Field {
    /// Creates a blank field with a fresh id.
    ///
    /// # Invariants
    /// - `kind` starts as `FieldKind::Text`, `required` as `false`.
    /// - `children` starts empty.
    pub fn new() -> Self {
        Self::with_id(FieldId::generate())
    }

    /// Creates a blank field with a caller-provided id.
    pub fn with_id(id: FieldId) -> Self {
        Self {
            id,
            name: String::new(),
            kind: FieldKind::default(),
            required: false,
            children: Vec::new(),
        }
    }

    /// Builder helper used by import paths and tests.
    pub fn named(name: impl Into<String>, kind: FieldKind) -> Self {
        let mut field = Self::new();
        field.name = name.into();
        field.kind = kind;
        field
    }

    /// Builder helper that appends children.
    pub fn with_children(mut self, children: impl IntoIterator<Item = Field>) -> Self {
        self.children.extend(children.into_iter().map(Arc::new));
        self
    }

    /// Returns a copy of this node carrying `children` instead of its own.
    ///
    /// Only the node itself is rebuilt; sibling subtrees stay shared.
    pub(crate) fn rebuilt_with_children(&self, children: Vec<Arc<Field>>) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind,
            required: self.required,
            children,
        }
    }

    /// Returns whether children are part of this node's schema.
    pub fn is_nested(&self) -> bool {
        self.kind == FieldKind::Nested
    }
}

impl Default for Field {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial attribute update for one field.
///
/// `None` leaves the attribute unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPatch {
    pub name: Option<String>,
    pub kind: Option<FieldKind>,
    pub required: Option<bool>,
}

impl FieldPatch {
    pub fn name(value: impl Into<String>) -> Self {
        Self {
            name: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn kind(value: FieldKind) -> Self {
        Self {
            kind: Some(value),
            ..Self::default()
        }
    }

    pub fn required(value: bool) -> Self {
        Self {
            required: Some(value),
            ..Self::default()
        }
    }

    /// Produces the patched copy of `field`.
    ///
    /// Existing children are kept when the kind changes, so a node switched
    /// to `Nested` always has a defined child list.
    pub fn apply(&self, field: &Field) -> Field {
        let mut patched = field.rebuilt_with_children(field.children.clone());
        if let Some(name) = &self.name {
            patched.name = name.clone();
        }
        if let Some(kind) = self.kind {
            patched.kind = kind;
        }
        if let Some(required) = self.required {
            patched.required = required;
        }
        patched
    }
}

#[cfg(test)]
mod tests {
    use super::{Field, FieldId, FieldKind, FieldPatch};

    #[test]
    fn new_field_uses_defaults() {
        let field = Field::new();
        assert!(!field.id.as_str().is_empty());
        assert_eq!(field.name, "");
        assert_eq!(field.kind, FieldKind::Text);
        assert!(!field.required);
        assert!(field.children.is_empty());
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(FieldId::generate(), FieldId::generate());
    }

    #[test]
    fn kind_wire_names_match_serde() {
        for kind in [FieldKind::Text, FieldKind::Number, FieldKind::Nested] {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }

    #[test]
    fn patch_changes_only_given_attributes() {
        let mut field = Field::with_id(FieldId::from("f1"));
        field.name = "age".to_string();

        let patched = FieldPatch::required(true).apply(&field);
        assert_eq!(patched.id, field.id);
        assert_eq!(patched.name, "age");
        assert_eq!(patched.kind, FieldKind::Text);
        assert!(patched.required);
    }

    #[test]
    fn patch_to_nested_keeps_children_defined() {
        let field = Field::named("address", FieldKind::Text);
        let patched = FieldPatch::kind(FieldKind::Nested).apply(&field);
        assert!(patched.is_nested());
        assert!(patched.children.is_empty());
    }
}
