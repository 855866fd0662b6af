//! Error types for the todo app.

use crate::todos::model::TodoId;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Todo error: {0}")]
    Todo(#[from] TodoError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Key-value persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejected title input. User-correctable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Title is required")]
    EmptyTitle,

    #[error("Title is too long ({length} > {max} characters)")]
    TitleTooLong { length: usize, max: usize },
}

/// Store operation errors.
#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Todo {id} not found")]
    NotFound { id: TodoId },

    #[error("No sequential ids left")]
    IdsExhausted,

    #[error("Failed to persist todos: {0}")]
    Persistence(#[from] StorageError),
}

/// Backup documents that cannot be imported. The store is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Backup is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Backup must be a JSON array of todos")]
    NotAnArray,

    #[error("Backup entry {index} is invalid: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Backup entry {index} has id {id}, above the largest allowed id")]
    IdOutOfRange { index: usize, id: u64 },

    #[error("Backup contains duplicate id {id}")]
    DuplicateId { id: TodoId },
}

/// Unparseable filter selections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("Unknown status filter: {0}")]
    UnknownStatus(String),

    #[error("Unknown date filter: {0}")]
    UnknownDate(String),

    #[error("Month must be between 1 and 12, got {0}")]
    MonthOutOfRange(u32),

    #[error("Date filter {0:?} cannot be combined with month or year; use date=custom")]
    ConflictingDate(String),
}

/// Unparseable client command lines.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command: {0} (try `help`)")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid number {0:?}")]
    InvalidNumber(String),

    #[error(transparent)]
    Filter(#[from] FilterError),
}
