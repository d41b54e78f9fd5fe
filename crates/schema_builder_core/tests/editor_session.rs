use chrono::{TimeZone, Utc};
use schema_builder_core::db::open_db_in_memory;
use schema_builder_core::{
    DeleteOutcome, EditorError, FieldId, FieldKind, FieldPatch, InMemorySchemaStore,
    SchemaEditor, SchemaSnapshot, SchemaStore, SnapshotId, SqliteSchemaStore, StoreError,
    StoreResult,
};
use serde_json::json;
use std::cell::Cell;

/// Store whose writes always fail.
struct ReadOnlyStore {
    inner: InMemorySchemaStore,
}

impl SchemaStore for ReadOnlyStore {
    fn load_all(&self) -> StoreResult<Vec<SchemaSnapshot>> {
        self.inner.load_all()
    }

    fn save_all(&self, _snapshots: &[SchemaSnapshot]) -> StoreResult<()> {
        Err(StoreError::InvalidKey)
    }
}

/// Store whose reads always fail.
struct BrokenReadStore;

impl SchemaStore for BrokenReadStore {
    fn load_all(&self) -> StoreResult<Vec<SchemaSnapshot>> {
        Err(StoreError::MissingRequiredTable("kv_entries"))
    }

    fn save_all(&self, _snapshots: &[SchemaSnapshot]) -> StoreResult<()> {
        Ok(())
    }
}

fn add_named<S: SchemaStore>(
    editor: &mut SchemaEditor<S>,
    name: &str,
    kind: FieldKind,
    parent_id: Option<&FieldId>,
) -> FieldId {
    let created = editor.add_field(parent_id).unwrap();
    editor.update_field(
        &created.id,
        &FieldPatch {
            name: Some(name.to_string()),
            kind: Some(kind),
            required: None,
        },
        parent_id,
    );
    created.id.clone()
}

fn save_named<S: SchemaStore>(editor: &mut SchemaEditor<S>, name: &str) -> SnapshotId {
    add_named(editor, "age", FieldKind::Number, None);
    editor.set_schema_name(name);
    editor
        .save_schema_at(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
        .unwrap()
}

#[test]
fn live_preview_tracks_every_edit() {
    let mut editor = SchemaEditor::open(InMemorySchemaStore::new());
    assert_eq!(editor.preview_json(), "{}");

    let address = add_named(&mut editor, "address", FieldKind::Nested, None);
    let city = add_named(&mut editor, "city", FieldKind::Text, Some(&address));
    assert_eq!(
        serde_json::Value::Object(editor.projected_schema()),
        json!({"address": {"city": "STRING"}})
    );

    editor.update_field(&city, &FieldPatch::kind(FieldKind::Number), Some(&address));
    assert_eq!(
        serde_json::Value::Object(editor.projected_schema()),
        json!({"address": {"city": "NUMBER"}})
    );

    editor.remove_field(&city, Some(&address));
    assert_eq!(
        editor.preview_json(),
        "{\n  \"address\": {}\n}"
    );
}

#[test]
fn save_with_blank_name_is_rejected() {
    let store = InMemorySchemaStore::new();
    let mut editor = SchemaEditor::open(&store);
    add_named(&mut editor, "age", FieldKind::Number, None);

    for name in ["", "   "] {
        editor.set_schema_name(name);
        assert!(!editor.can_save());
        let err = editor.save_schema().unwrap_err();
        assert!(matches!(err, EditorError::InvalidSchemaName));
    }

    assert!(editor.snapshots().is_empty());
    assert!(store.raw().is_none());
    assert_eq!(editor.tree().node_count(), 1);
}

#[test]
fn save_with_empty_tree_is_rejected() {
    let store = InMemorySchemaStore::new();
    let mut editor = SchemaEditor::open(&store);
    editor.set_schema_name("users");

    let err = editor.save_schema().unwrap_err();
    assert!(matches!(err, EditorError::EmptyFieldTree));
    assert!(editor.snapshots().is_empty());
    assert!(store.raw().is_none());
}

#[test]
fn save_persists_snapshot_and_resets_session() {
    let store = InMemorySchemaStore::new();
    let mut editor = SchemaEditor::open(&store);
    let address = add_named(&mut editor, "address", FieldKind::Nested, None);
    let street = add_named(&mut editor, "street", FieldKind::Text, Some(&address));
    editor.update_field(&street, &FieldPatch::required(true), Some(&address));
    editor.set_schema_name("Customer");

    let snapshot_id = editor.save_schema().unwrap();
    assert!(editor.snapshot(&snapshot_id).unwrap().created_at <= Utc::now());

    assert!(editor.tree().is_empty());
    assert_eq!(editor.schema_name(), "");
    let snapshot = editor.snapshot(&snapshot_id).unwrap();
    assert_eq!(snapshot.name, "Customer");
    assert_eq!(
        serde_json::Value::Object(snapshot.projected_schema.clone()),
        json!({"address": {"street": "STRING"}})
    );
    assert!(snapshot.fields[0].children[0].required);

    let persisted = store.load_all().unwrap();
    assert_eq!(persisted, editor.snapshots().to_vec());
}

#[test]
fn saves_append_in_order() {
    let store = InMemorySchemaStore::new();
    let mut editor = SchemaEditor::open(&store);

    let first = save_named(&mut editor, "first");
    let second = save_named(&mut editor, "second");

    let ids: Vec<&SnapshotId> = editor.snapshots().iter().map(|s| &s.id).collect();
    assert_eq!(ids, vec![&first, &second]);
    assert_eq!(store.load_all().unwrap().len(), 2);
}

#[test]
fn reopening_loads_persisted_snapshots() {
    let store = InMemorySchemaStore::new();
    let snapshot_id = {
        let mut editor = SchemaEditor::open(&store);
        save_named(&mut editor, "people")
    };

    let editor = SchemaEditor::open(&store);
    assert_eq!(editor.snapshots().len(), 1);
    assert_eq!(editor.snapshot(&snapshot_id).unwrap().name, "people");
}

#[test]
fn open_degrades_corrupt_and_failing_stores_to_empty() {
    let corrupt = SchemaEditor::open(InMemorySchemaStore::with_raw("[{]"));
    assert!(corrupt.snapshots().is_empty());

    let broken = SchemaEditor::open(BrokenReadStore);
    assert!(broken.snapshots().is_empty());
}

#[test]
fn failed_persist_leaves_session_untouched() {
    let mut editor = SchemaEditor::open(ReadOnlyStore {
        inner: InMemorySchemaStore::new(),
    });
    add_named(&mut editor, "age", FieldKind::Number, None);
    editor.set_schema_name("users");

    let err = editor.save_schema().unwrap_err();
    assert!(matches!(err, EditorError::Store(_)));
    assert!(editor.snapshots().is_empty());
    assert_eq!(editor.schema_name(), "users");
    assert_eq!(editor.tree().node_count(), 1);
}

#[test]
fn load_snapshot_replaces_tree_and_keeps_snapshot() {
    let store = InMemorySchemaStore::new();
    let mut editor = SchemaEditor::open(&store);
    let snapshot_id = save_named(&mut editor, "people");
    add_named(&mut editor, "scratch", FieldKind::Text, None);

    editor.load_snapshot(&snapshot_id).unwrap();

    let names: Vec<&str> = editor.fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["age"]);

    let age = editor.fields()[0].id.clone();
    editor.update_field(&age, &FieldPatch::name("years"), None);
    assert_eq!(
        editor.snapshot(&snapshot_id).unwrap().fields[0].name,
        "age"
    );

    editor.set_schema_name("people v2");
    let second = editor.save_schema().unwrap();
    assert_ne!(second, snapshot_id);
    assert_eq!(editor.snapshots().len(), 2);
}

#[test]
fn load_unknown_snapshot_fails() {
    let mut editor = SchemaEditor::open(InMemorySchemaStore::new());
    let err = editor.load_snapshot(&SnapshotId::from("nope")).unwrap_err();
    assert!(matches!(err, EditorError::SnapshotNotFound(id) if id.as_str() == "nope"));
}

#[test]
fn load_snapshot_with_duplicate_ids_is_rejected() {
    let raw = r#"[{
        "id": "s1",
        "name": "broken",
        "schema": {},
        "fields": [
            {"id": "1", "name": "a", "type": "string", "required": false},
            {"id": "1", "name": "b", "type": "string", "required": false}
        ],
        "createdAt": "2024-01-01T00:00:00.000Z"
    }]"#;
    let mut editor = SchemaEditor::open(InMemorySchemaStore::with_raw(raw));

    let err = editor.load_snapshot(&SnapshotId::from("s1")).unwrap_err();
    assert!(matches!(err, EditorError::InvalidSnapshot { .. }));
    assert!(editor.tree().is_empty());
}

#[test]
fn confirmed_delete_leaves_the_other_snapshot_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSchemaStore::try_new(&conn).unwrap();
    let mut editor = SchemaEditor::open(&store);
    let first = save_named(&mut editor, "first");
    let second = save_named(&mut editor, "second");
    let kept = editor.snapshot(&second).unwrap().clone();

    let outcome = editor.delete_snapshot(&first, |_| true).unwrap();

    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert_eq!(store.load_all().unwrap(), vec![kept.clone()]);
    assert_eq!(editor.snapshots(), &[kept]);
}

#[test]
fn declined_delete_is_noop() {
    let store = InMemorySchemaStore::new();
    let mut editor = SchemaEditor::open(&store);
    let snapshot_id = save_named(&mut editor, "keep me");
    let raw_before = store.raw();

    let asked = Cell::new(0);
    let outcome = editor
        .delete_snapshot(&snapshot_id, |snapshot| {
            asked.set(asked.get() + 1);
            assert_eq!(snapshot.name, "keep me");
            false
        })
        .unwrap();

    assert_eq!(outcome, DeleteOutcome::Declined);
    assert_eq!(asked.get(), 1);
    assert_eq!(store.raw(), raw_before);
    assert_eq!(editor.snapshots().len(), 1);
}

#[test]
fn delete_unknown_snapshot_never_asks() {
    let mut editor = SchemaEditor::open(InMemorySchemaStore::new());
    let err = editor
        .delete_snapshot(&SnapshotId::from("missing"), |_| {
            panic!("confirmation must not be requested")
        })
        .unwrap_err();
    assert!(matches!(err, EditorError::SnapshotNotFound(_)));
}

#[test]
fn edits_addressed_at_unknown_ids_are_noops() {
    let mut editor = SchemaEditor::open(InMemorySchemaStore::new());
    let age = add_named(&mut editor, "age", FieldKind::Number, None);
    let missing = FieldId::from("missing");

    assert!(editor.add_field(Some(&missing)).is_none());
    assert!(!editor.remove_field(&missing, None));
    assert!(!editor.update_field(&age, &FieldPatch::name("x"), Some(&missing)));
    assert_eq!(editor.preview_json(), "{\n  \"age\": \"NUMBER\"\n}");
}

#[test]
fn deep_tree_survives_reopen_and_later_saves() {
    let store = InMemorySchemaStore::new();
    let deep_id = {
        let mut editor = SchemaEditor::open(&store);
        save_named(&mut editor, "flat");

        let mut parent: Option<FieldId> = None;
        for level in 0..70 {
            let id = add_named(
                &mut editor,
                &format!("level{level}"),
                FieldKind::Nested,
                parent.as_ref(),
            );
            parent = Some(id);
        }
        editor.set_schema_name("deep");
        editor.save_schema().unwrap()
    };

    let mut editor = SchemaEditor::open(&store);
    assert_eq!(editor.snapshots().len(), 2);

    editor.load_snapshot(&deep_id).unwrap();
    assert_eq!(editor.tree().node_count(), 70);
    assert_eq!(editor.rows().last().unwrap().depth, 69);

    editor.set_schema_name("deep again");
    editor.save_schema().unwrap();
    assert_eq!(store.load_all().unwrap().len(), 3);
}
