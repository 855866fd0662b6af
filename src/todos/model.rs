//! Todo records, ids, patches and change-feed messages.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum title length, counted in characters.
pub const MAX_TITLE_CHARS: usize = 100;

/// Store-assigned identifier.
///
/// The server hands out sequential integers; the local client hands out
/// time-plus-random tokens. Serialized as a bare JSON number or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TodoId {
    Seq(u64),
    Token(String),
}

impl TodoId {
    /// Interpret a path segment or command argument as an id.
    ///
    /// Digits-only input is a sequential id, anything else a token.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<u64>() {
            Ok(n) => Self::Seq(n),
            Err(_) => Self::Token(raw.to_string()),
        }
    }
}

impl From<u64> for TodoId {
    fn from(n: u64) -> Self {
        Self::Seq(n)
    }
}

impl From<&str> for TodoId {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seq(n) => write!(f, "{n}"),
            Self::Token(t) => write!(f, "{t}"),
        }
    }
}

/// A single to-do item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    /// Unique ID, immutable.
    pub id: TodoId,
    /// Trimmed, non-empty title. Older client backups call this `text`.
    #[serde(alias = "text")]
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    /// Fixed at creation.
    pub created_at: DateTime<Utc>,
    /// Present iff `completed`.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Todo {
    /// Flip to `completed`, stamping or clearing `completed_at`.
    ///
    /// Re-completing an already completed todo keeps the original stamp.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        match (self.completed, completed) {
            (false, true) => self.completed_at = Some(now),
            (_, false) => self.completed_at = None,
            (true, true) => {}
        }
        self.completed = completed;
    }

    /// Check the record-level invariants. Used when accepting foreign data.
    pub fn check(&self) -> Result<(), String> {
        let trimmed = validate_title(&self.title).map_err(|e| e.to_string())?;
        if trimmed != self.title {
            return Err("title has surrounding whitespace".to_string());
        }
        if self.completed != self.completed_at.is_some() {
            return Err("completedAt must be set exactly when completed is true".to_string());
        }
        Ok(())
    }
}

/// Trim a title and enforce the non-empty / length rules.
pub fn validate_title(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    let length = trimmed.chars().count();
    if length > MAX_TITLE_CHARS {
        return Err(ValidationError::TitleTooLong {
            length,
            max: MAX_TITLE_CHARS,
        });
    }
    Ok(trimmed.to_string())
}

/// Input for `TodoStore::create`.
#[derive(Debug, Clone)]
pub struct NewTodo {
    pub title: String,
    pub completed: bool,
    /// Defaults to the creation instant.
    pub created_at: Option<DateTime<Utc>>,
}

impl NewTodo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            completed: false,
            created_at: None,
        }
    }

    /// Builder: start out completed.
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Builder: backdate or postdate the creation stamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Partial update. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TodoPatch {
    #[serde(default, alias = "text")]
    pub title: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

impl TodoPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            completed: None,
        }
    }

    pub fn completed(completed: bool) -> Self {
        Self {
            title: None,
            completed: Some(completed),
        }
    }
}

/// Counts shown next to the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TodoStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

/// Messages sent over the change feed (server → client).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TodoWsMessage {
    /// Full list, sent on connect and after a lagged receiver.
    TodosSync { todos: Vec<Todo> },
    TodoCreated { todo: Todo },
    TodoUpdated { todo: Todo },
    TodoDeleted { id: TodoId },
    /// Bulk clear; clients should re-fetch or drop the affected rows.
    TodosCleared { deleted: usize },
}
