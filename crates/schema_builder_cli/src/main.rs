//! Command-line front end for the schema builder.
//!
//! # Responsibility
//! - Drive editor sessions from tree files and stored snapshots.
//! - Render trees and projected schemas as terminal text.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use schema_builder_core::db::open_db;
use schema_builder_core::{
    core_version, default_log_level, init_logging, ping, render_schema_json, DeleteOutcome,
    EditorError, Field, FieldId, FieldPatch, InMemorySchemaStore, SchemaEditor, SchemaSnapshot, SchemaStore,
    SnapshotId, SqliteSchemaStore, DEFAULT_STORE_KEY,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about = "Compose and store simple JSON schemas", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// SQLite file holding saved schemas
    #[arg(long, global = true, env = "SCHEMA_BUILDER_DB", default_value = "schema_builder.sqlite3")]
    db: PathBuf,

    /// Storage key the snapshot collection lives under
    #[arg(long, global = true, env = "SCHEMA_BUILDER_STORE_KEY", default_value = DEFAULT_STORE_KEY)]
    store_key: String,

    /// Directory for rolling log files; logging is off when unset
    #[arg(long, global = true, env = "SCHEMA_BUILDER_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, global = true, env = "SCHEMA_BUILDER_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check core linkage
    Ping,
    /// Print the projected schema of a field tree file
    Project {
        /// JSON array of fields
        path: PathBuf,
    },
    /// Save a field tree file as a named schema
    Save {
        /// Schema name
        #[arg(long, short)]
        name: String,
        /// JSON array of fields
        path: PathBuf,
    },
    /// List saved schemas
    List,
    /// Show one saved schema
    Show {
        /// Saved schema id
        id: String,
    },
    /// Delete one saved schema
    Delete {
        /// Saved schema id
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli)?;

    match &cli.command {
        Commands::Ping => {
            println!("schema_builder_core ping={}", ping());
            println!("schema_builder_core version={}", core_version());
        }
        Commands::Project { path } => {
            let mut editor = SchemaEditor::open(InMemorySchemaStore::new());
            replay_tree_file(&mut editor, path)?;
            println!("{}", editor.preview_json());
        }
        Commands::Save { name, path } => {
            let conn = open_db(&cli.db).context("failed to open schema database")?;
            let store = SqliteSchemaStore::try_with_key(&conn, cli.store_key.as_str())?;
            let mut editor = SchemaEditor::open(store);
            replay_tree_file(&mut editor, path)?;
            editor.set_schema_name(name.as_str());
            let snapshot_id = editor.save_schema()?;
            println!("Schema saved successfully! id={snapshot_id}");
        }
        Commands::List => {
            let conn = open_db(&cli.db).context("failed to open schema database")?;
            let editor = SchemaEditor::open(SqliteSchemaStore::try_with_key(
                &conn,
                cli.store_key.as_str(),
            )?);
            if editor.snapshots().is_empty() {
                println!("No saved schemas found.");
            }
            for snapshot in editor.snapshots() {
                println!(
                    "{}\t{}\tcreated {}\tfields={}",
                    snapshot.id,
                    snapshot.name,
                    snapshot.created_at.date_naive(),
                    snapshot.field_count()
                );
            }
        }
        Commands::Show { id } => {
            let conn = open_db(&cli.db).context("failed to open schema database")?;
            let mut editor = SchemaEditor::open(SqliteSchemaStore::try_with_key(
                &conn,
                cli.store_key.as_str(),
            )?);
            let snapshot_id = SnapshotId::from(id.as_str());
            print!("{}", show_text(&mut editor, &snapshot_id)?);
        }
        Commands::Delete { id, yes } => {
            let conn = open_db(&cli.db).context("failed to open schema database")?;
            let mut editor = SchemaEditor::open(SqliteSchemaStore::try_with_key(
                &conn,
                cli.store_key.as_str(),
            )?);
            let snapshot_id = SnapshotId::from(id.as_str());
            let outcome = editor.delete_snapshot(&snapshot_id, |snapshot| {
                *yes || confirm_delete(snapshot)
            })?;
            match outcome {
                DeleteOutcome::Deleted => println!("Deleted schema {snapshot_id}"),
                DeleteOutcome::Declined => println!("Kept schema {snapshot_id}"),
            }
        }
    }
    Ok(())
}

fn setup_logging(cli: &Cli) -> Result<()> {
    let Some(log_dir) = &cli.log_dir else {
        return Ok(());
    };
    let log_dir = if log_dir.is_absolute() {
        log_dir.clone()
    } else {
        std::env::current_dir()
            .context("failed to resolve current directory")?
            .join(log_dir)
    };
    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    init_logging(level, &log_dir.to_string_lossy())
        .map_err(|err| anyhow!("failed to initialize logging: {err}"))?;
    info!("event=cli_start module=cli status=ok");
    Ok(())
}

/// Rebuilds a tree file inside `editor` through the regular add/update path,
/// so stored ids are regenerated.
fn replay_tree_file<S: SchemaStore>(editor: &mut SchemaEditor<S>, path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read `{}`", path.display()))?;
    let fields: Vec<Field> = serde_json::from_str(&raw)
        .with_context(|| format!("`{}` is not a JSON array of fields", path.display()))?;
    for field in &fields {
        replay_field(editor, field, None);
    }
    Ok(())
}

fn replay_field<S: SchemaStore>(
    editor: &mut SchemaEditor<S>,
    field: &Field,
    parent_id: Option<&FieldId>,
) {
    let Some(created) = editor.add_field(parent_id) else {
        return;
    };
    let patch = FieldPatch {
        name: Some(field.name.clone()),
        kind: Some(field.kind),
        required: Some(field.required),
    };
    editor.update_field(&created.id, &patch, parent_id);
    for child in &field.children {
        replay_field(editor, child, Some(&created.id));
    }
}

/// Renders a saved tree outline followed by its stored schema.
///
/// Trees that cannot be loaded for editing still show their stored schema.
fn show_text<S: SchemaStore>(
    editor: &mut SchemaEditor<S>,
    snapshot_id: &SnapshotId,
) -> Result<String> {
    let mut text = match editor.load_snapshot(snapshot_id) {
        Ok(()) => outline_text(editor),
        Err(EditorError::InvalidSnapshot { source, .. }) => {
            warn!("event=schema_show module=cli status=degraded snapshot_id={snapshot_id}");
            format!("(outline unavailable: {source})\n")
        }
        Err(err) => return Err(err.into()),
    };
    let snapshot = editor
        .snapshot(snapshot_id)
        .ok_or_else(|| anyhow!("saved schema not found: {snapshot_id}"))?;
    text.push_str(&snapshot_text(snapshot));
    Ok(text)
}

fn snapshot_text(snapshot: &SchemaSnapshot) -> String {
    format!(
        "{} ({})\nCreated: {}\n{}\n",
        snapshot.name,
        snapshot.id,
        snapshot.created_at.date_naive(),
        render_schema_json(&snapshot.projected_schema)
    )
}

fn outline_text<S: SchemaStore>(editor: &SchemaEditor<S>) -> String {
    let mut text = String::new();
    for row in editor.rows() {
        let name = if row.field.name.trim().is_empty() {
            "(unnamed)"
        } else {
            row.field.name.as_str()
        };
        let required = if row.field.required { " required" } else { "" };
        text.push_str(&format!(
            "{}{} [{}{}]\n",
            "  ".repeat(row.depth),
            name,
            row.field.kind.as_str(),
            required
        ));
    }
    text
}

fn confirm_delete(snapshot: &SchemaSnapshot) -> bool {
    print!(
        "Are you sure you want to delete schema `{}`? [y/N] ",
        snapshot.name
    );
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
