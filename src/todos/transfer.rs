//! Export / import of the todo list as a JSON backup document.

use std::collections::HashSet;

use chrono::{DateTime, TimeZone};
use serde_json::Value;

use super::model::{Todo, TodoId};
use super::store::MAX_SEQ_ID;
use crate::error::ImportError;

/// Pretty-printed JSON array of exactly the records given.
pub fn export_document(todos: &[Todo]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(todos)
}

/// `todos-backup-2025-03-12_14-05-09-3-todos.json`
pub fn backup_file_name<Tz: TimeZone>(now: &DateTime<Tz>, count: usize) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "todos-backup-{}-{count}-todos.json",
        now.format("%Y-%m-%d_%H-%M-%S")
    )
}

/// Parse and validate a backup document.
///
/// Accepts only a JSON array whose entries are valid todos with distinct ids.
pub fn import_document(raw: &str) -> Result<Vec<Todo>, ImportError> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Array(entries) = value else {
        return Err(ImportError::NotAnArray);
    };

    let mut todos = Vec::with_capacity(entries.len());
    let mut seen = HashSet::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let todo: Todo = serde_json::from_value(entry).map_err(|e| ImportError::InvalidRecord {
            index,
            reason: e.to_string(),
        })?;
        todo.check()
            .map_err(|reason| ImportError::InvalidRecord { index, reason })?;
        if let TodoId::Seq(id) = todo.id {
            if id >= MAX_SEQ_ID {
                return Err(ImportError::IdOutOfRange { index, id });
            }
        }
        if !seen.insert(todo.id.clone()) {
            return Err(ImportError::DuplicateId { id: todo.id });
        }
        todos.push(todo);
    }
    Ok(todos)
}
