//! Command execution for the `jsonkv` binary.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;

use crate::config::{Command, OutputFormat};
use crate::store::{Entry, SetMode, Store};

/// Whether a command found what it was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    NotFound,
}

#[derive(Serialize)]
struct EntriesOutput<'a> {
    entries: &'a [Entry],
    total: usize,
}

#[derive(Serialize)]
struct CountOutput {
    count: usize,
}

/// Run `command` against `store`, writing results to `out`.
pub async fn run(
    store: &Store,
    command: Command,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<Outcome> {
    match command {
        Command::Prepare { collection } => {
            store.prepare_collection(&collection).await?;
            if format == OutputFormat::Text {
                writeln!(out, "Collection {collection} ready.")?;
            }
        }
        Command::Get { collection, key } => {
            let value: Option<Value> = store.get_by_key(&collection, &key).await?;
            match value {
                Some(value) => write_value(out, &value, format)?,
                None => return Ok(Outcome::NotFound),
            }
        }
        Command::List { collection } => {
            let entries: Vec<Entry> = store.get_all(&collection).await?;
            write_entries(out, &entries, format)?;
        }
        Command::Prefix { collection, prefix } => {
            let entries: Vec<Entry> = store.get_by_prefix(&collection, &prefix).await?;
            write_entries(out, &entries, format)?;
        }
        Command::Set {
            collection,
            key,
            value,
            update,
            upsert,
        } => {
            let value: Value =
                serde_json::from_str(&value).context("value must be valid JSON")?;
            let mode = if upsert {
                SetMode::Upsert
            } else {
                SetMode::from_update_flag(update)
            };
            let stored = store.set_by_key(&collection, &key, value, mode).await?;
            write_value(out, &stored, format)?;
        }
        Command::Delete { collection, key } => {
            let removed = store.delete_by_key(&collection, &key).await?;
            write_count(out, removed, format)?;
            if removed == 0 {
                return Ok(Outcome::NotFound);
            }
        }
        Command::Clear { collection } => {
            let removed = store.delete_all(&collection).await?;
            write_count(out, removed, format)?;
        }
        Command::Count { collection } => {
            let count = store.count(&collection).await?;
            write_count(out, count, format)?;
        }
    }

    Ok(Outcome::Done)
}

fn write_value(out: &mut impl Write, value: &Value, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "{value}")?,
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(value)?)?,
    }
    Ok(())
}

fn write_entries(out: &mut impl Write, entries: &[Entry], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            if entries.is_empty() {
                writeln!(out, "No entries found.")?;
            } else {
                for entry in entries {
                    writeln!(out, "{:<40} {}", entry.id, entry.value)?;
                }
                writeln!(out)?;
                writeln!(out, "Total: {} entries", entries.len())?;
            }
        }
        OutputFormat::Json => {
            let output = EntriesOutput {
                entries,
                total: entries.len(),
            };
            writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
        }
    }
    Ok(())
}

fn write_count(out: &mut impl Write, count: usize, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "{count}")?,
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(&CountOutput { count })?)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn run_text(store: &Store, command: Command) -> (Outcome, String) {
        let mut out = Vec::new();
        let outcome = run(store, command, OutputFormat::Text, &mut out)
            .await
            .unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_set_get_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(temp_dir.path().join("cli.db")).unwrap();
        let items = || "items".to_string();

        run_text(&store, Command::Prepare { collection: items() }).await;

        let (_, stdout) = run_text(
            &store,
            Command::Set {
                collection: items(),
                key: "a".into(),
                value: r#"{"n":1}"#.into(),
                update: false,
                upsert: false,
            },
        )
        .await;
        assert_eq!(stdout.trim(), r#"{"n":1}"#);

        let (outcome, stdout) = run_text(
            &store,
            Command::Get {
                collection: items(),
                key: "a".into(),
            },
        )
        .await;
        assert_eq!(outcome, Outcome::Done);
        assert_eq!(stdout.trim(), r#"{"n":1}"#);

        let (outcome, stdout) = run_text(
            &store,
            Command::Delete {
                collection: items(),
                key: "a".into(),
            },
        )
        .await;
        assert_eq!(outcome, Outcome::Done);
        assert_eq!(stdout.trim(), "1");

        let (outcome, stdout) = run_text(
            &store,
            Command::Get {
                collection: items(),
                key: "a".into(),
            },
        )
        .await;
        assert_eq!(outcome, Outcome::NotFound);
        assert!(stdout.is_empty());
    }

    #[tokio::test]
    async fn test_list_as_json() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(temp_dir.path().join("cli.db")).unwrap();
        store.prepare_collection("items").await.unwrap();
        store
            .set_by_key("items", "a", json!([1, 2]), SetMode::Insert)
            .await
            .unwrap();

        let mut out = Vec::new();
        run(
            &store,
            Command::List {
                collection: "items".into(),
            },
            OutputFormat::Json,
            &mut out,
        )
        .await
        .unwrap();

        let parsed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(
            parsed,
            json!({ "entries": [{ "id": "a", "value": [1, 2] }], "total": 1 })
        );
    }

    #[tokio::test]
    async fn test_invalid_json_value_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(temp_dir.path().join("cli.db")).unwrap();
        store.prepare_collection("items").await.unwrap();

        let mut out = Vec::new();
        let result = run(
            &store,
            Command::Set {
                collection: "items".into(),
                key: "a".into(),
                value: "{not json".into(),
                update: false,
                upsert: false,
            },
            OutputFormat::Text,
            &mut out,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(store.count("items").await.unwrap(), 0);
    }
}
