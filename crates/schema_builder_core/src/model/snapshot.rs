//! Saved schema snapshot model.
//!
//! # Responsibility
//! - Define the named, timestamped copy of a field tree and its projection.
//! - Own the stored wire shape of one snapshot.
//!
//! # Invariants
//! - Snapshots are immutable once created; only whole-record deletion exists.
//! - `name` is never blank after trim.
//! - `projected_schema` is the projection of `fields` at save time.

use crate::model::field::Field;
use crate::model::field_tree::FieldTree;
use crate::projection::projector::{project, ProjectedSchema};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Opaque snapshot identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for SnapshotId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SnapshotId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for SnapshotId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validation errors for snapshot creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotValidationError {
    /// Schema name is empty or whitespace-only.
    BlankName,
}

impl Display for SnapshotValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "schema name must not be blank"),
        }
    }
}

impl Error for SnapshotValidationError {}

/// Named saved copy of a field tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub id: SnapshotId,
    /// Name as entered by the user.
    pub name: String,
    /// Stored redundantly so listings render without re-projecting.
    #[serde(rename = "schema")]
    pub projected_schema: ProjectedSchema,
    pub fields: Vec<Arc<Field>>,
    #[serde(rename = "createdAt", with = "iso8601_millis")]
    pub created_at: DateTime<Utc>,
}

impl SchemaSnapshot {
    /// Captures `tree` under `name`.
    ///
    /// The snapshot shares the tree's nodes instead of copying them.
    /// `created_at` is truncated to the stored millisecond precision.
    ///
    /// # Errors
    /// - `BlankName` when `name` is empty after trim.
    pub fn capture(
        name: impl Into<String>,
        tree: &FieldTree,
        created_at: DateTime<Utc>,
    ) -> Result<Self, SnapshotValidationError> {
        let name = name.into();
        validate_schema_name(&name)?;
        Ok(Self {
            id: SnapshotId::generate(),
            name,
            projected_schema: project(tree.fields()),
            fields: tree.share(),
            created_at: created_at.trunc_subsecs(3),
        })
    }

    /// Counts every stored field node.
    pub fn field_count(&self) -> usize {
        fn count(fields: &[Arc<Field>]) -> usize {
            fields.iter().map(|field| 1 + count(&field.children)).sum()
        }
        count(&self.fields)
    }
}

/// Checks that a schema name is usable for saving.
pub fn validate_schema_name(name: &str) -> Result<(), SnapshotValidationError> {
    if name.trim().is_empty() {
        return Err(SnapshotValidationError::BlankName);
    }
    Ok(())
}

/// `createdAt` codec: RFC 3339 UTC with millisecond precision on write,
/// any RFC 3339 offset on read.
mod iso8601_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|value| value.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
