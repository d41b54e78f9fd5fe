//! Pure projection from field trees to output schemas.
//!
//! # Invariants
//! - Fields whose trimmed name is empty are skipped at every depth.
//! - Keys are names exactly as entered; later siblings overwrite earlier ones
//!   while the key keeps its first position.
//! - `required` never reaches the output.

use crate::model::field::{Field, FieldKind};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Projected schema: an insertion-ordered mapping from field name to either a
/// kind label or a nested mapping.
pub type ProjectedSchema = Map<String, Value>;

/// Projects `fields` into an output mapping.
pub fn project(fields: &[Arc<Field>]) -> ProjectedSchema {
    let mut schema = ProjectedSchema::new();
    for field in fields {
        if field.name.trim().is_empty() {
            continue;
        }
        let value = match field.kind {
            FieldKind::Text => Value::from("STRING"),
            FieldKind::Number => Value::from("NUMBER"),
            FieldKind::Nested => Value::Object(project(&field.children)),
        };
        schema.insert(field.name.clone(), value);
    }
    schema
}

/// Renders a projected schema as two-space indented JSON.
pub fn render_schema_json(schema: &ProjectedSchema) -> String {
    format!("{:#}", Value::Object(schema.clone()))
}

#[cfg(test)]
mod tests {
    use super::{project, render_schema_json};
    use crate::model::field::{Field, FieldKind};
    use std::sync::Arc;

    #[test]
    fn empty_tree_projects_to_empty_mapping() {
        let schema = project(&[]);
        assert!(schema.is_empty());
        assert_eq!(render_schema_json(&schema), "{}");
    }

    #[test]
    fn duplicate_names_keep_first_position_and_last_value() {
        let fields = vec![
            Arc::new(Field::named("a", FieldKind::Text)),
            Arc::new(Field::named("b", FieldKind::Text)),
            Arc::new(Field::named("a", FieldKind::Number)),
        ];

        let schema = project(&fields);
        let keys: Vec<&str> = schema.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(schema["a"], "NUMBER");
    }

    #[test]
    fn render_uses_two_space_indentation() {
        let fields = vec![Arc::new(Field::named("age", FieldKind::Number))];
        assert_eq!(
            render_schema_json(&project(&fields)),
            "{\n  \"age\": \"NUMBER\"\n}"
        );
    }
}
