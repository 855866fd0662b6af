//! TodoStore — the authoritative, ordered todo collection.
//!
//! Newest todos sit at the front. Every successful mutation hands the full
//! collection to a `TodoPersistence` before returning.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info};

use super::model::{NewTodo, Todo, TodoId, TodoPatch, TodoStats, validate_title};
use crate::error::{StorageError, TodoError};
use crate::storage::KeyValueStore;

/// Storage key for the serialized todo array.
pub const TODOS_KEY: &str = "todos";

/// Sequential ids stay below this; `u64::MAX` itself is never minted.
pub const MAX_SEQ_ID: u64 = u64::MAX;

/// Length of the random suffix on token ids.
const TOKEN_RANDOM_CHARS: usize = 11;

/// Where the store writes its collection after each mutation.
pub trait TodoPersistence: Send + Sync {
    /// Load the previously saved collection, newest first.
    fn load(&self) -> Result<Vec<Todo>, StorageError>;

    /// Replace the saved collection.
    fn save(&self, todos: &[Todo]) -> Result<(), StorageError>;
}

/// Process memory only. Nothing survives a restart.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPersistence;

impl TodoPersistence for NoPersistence {
    fn load(&self) -> Result<Vec<Todo>, StorageError> {
        Ok(Vec::new())
    }

    fn save(&self, _todos: &[Todo]) -> Result<(), StorageError> {
        Ok(())
    }
}

/// JSON array under a fixed key in a key-value store.
#[derive(Debug, Clone)]
pub struct KvPersistence<S> {
    kv: S,
    key: String,
}

impl<S: KeyValueStore> KvPersistence<S> {
    pub fn new(kv: S) -> Self {
        Self {
            kv,
            key: TODOS_KEY.to_string(),
        }
    }
}

impl<S: KeyValueStore> TodoPersistence for KvPersistence<S> {
    fn load(&self) -> Result<Vec<Todo>, StorageError> {
        match self.kv.get(&self.key)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, todos: &[Todo]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(todos)?;
        self.kv.set(&self.key, &raw)
    }
}

/// How fresh ids are minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdStrategy {
    /// 1, 2, 3, ... Reset by `clear_all`.
    Sequential,
    /// Base-36 millisecond timestamp followed by base-36 random characters.
    Token,
}

pub struct TodoStore {
    todos: Vec<Todo>,
    strategy: IdStrategy,
    next_seq: u64,
    persistence: Box<dyn TodoPersistence>,
}

impl std::fmt::Debug for TodoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoStore")
            .field("len", &self.todos.len())
            .field("strategy", &self.strategy)
            .field("next_seq", &self.next_seq)
            .finish()
    }
}

impl TodoStore {
    /// Empty, memory-only store with sequential ids.
    pub fn in_memory() -> Self {
        Self {
            todos: Vec::new(),
            strategy: IdStrategy::Sequential,
            next_seq: 1,
            persistence: Box::new(NoPersistence),
        }
    }

    /// Open a store over `persistence`, loading whatever it already holds.
    pub fn open(
        persistence: impl TodoPersistence + 'static,
        strategy: IdStrategy,
    ) -> Result<Self, StorageError> {
        let todos = persistence.load()?;
        let next_seq = next_seq_after(&todos);
        info!(count = todos.len(), ?strategy, "Todo store opened");
        Ok(Self {
            todos,
            strategy,
            next_seq,
            persistence: Box::new(persistence),
        })
    }

    /// Add the two demo records the server historically started with.
    pub fn seed_demo(&mut self) -> Result<(), TodoError> {
        self.create(NewTodo::new("Second demo todo").with_completed(true))?;
        self.create(NewTodo::new("First demo todo"))?;
        Ok(())
    }

    /// Full ordered sequence, newest first.
    pub fn list(&self) -> &[Todo] {
        &self.todos
    }

    pub fn len(&self) -> usize {
        self.todos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.is_empty()
    }

    pub fn get(&self, id: &TodoId) -> Result<&Todo, TodoError> {
        self.todos
            .iter()
            .find(|t| &t.id == id)
            .ok_or_else(|| TodoError::NotFound { id: id.clone() })
    }

    /// Validate, assign an id and insert at the front.
    pub fn create(&mut self, new: NewTodo) -> Result<Todo, TodoError> {
        let title = validate_title(&new.title)?;
        let now = Utc::now();
        let todo = Todo {
            id: self.next_id(now)?,
            title,
            completed: new.completed,
            created_at: new.created_at.unwrap_or(now),
            completed_at: new.completed.then_some(now),
        };

        self.todos.insert(0, todo.clone());
        self.persist()?;

        info!(id = %todo.id, title = %todo.title, "Todo created");
        Ok(todo)
    }

    /// Apply a patch. Nothing changes if validation fails.
    pub fn update(&mut self, id: &TodoId, patch: TodoPatch) -> Result<Todo, TodoError> {
        let title = patch.title.as_deref().map(validate_title).transpose()?;
        let todo = self.find_mut(id)?;

        if let Some(title) = title {
            todo.title = title;
        }
        if let Some(completed) = patch.completed {
            todo.set_completed(completed, Utc::now());
        }
        let updated = todo.clone();
        self.persist()?;

        info!(id = %id, completed = updated.completed, "Todo updated");
        Ok(updated)
    }

    /// Flip completion.
    pub fn toggle(&mut self, id: &TodoId) -> Result<Todo, TodoError> {
        let completed = self.get(id)?.completed;
        self.update(id, TodoPatch::completed(!completed))
    }

    /// Remove and return a todo.
    pub fn delete(&mut self, id: &TodoId) -> Result<Todo, TodoError> {
        let index = self
            .todos
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| TodoError::NotFound { id: id.clone() })?;
        let removed = self.todos.remove(index);
        self.persist()?;

        info!(id = %id, "Todo deleted");
        Ok(removed)
    }

    /// Remove everything. Sequential ids restart at 1. An empty store is
    /// not written back.
    pub fn clear_all(&mut self) -> Result<usize, TodoError> {
        let removed = self.todos.len();
        if self.strategy == IdStrategy::Sequential {
            self.next_seq = 1;
        }
        if removed == 0 {
            debug!("No todos to clear");
            return Ok(0);
        }
        self.todos.clear();
        self.persist()?;

        info!(count = removed, "All todos cleared");
        Ok(removed)
    }

    /// Remove completed todos. Zero matches is a no-op.
    pub fn clear_completed(&mut self) -> Result<usize, TodoError> {
        let before = self.todos.len();
        self.todos.retain(|t| !t.completed);
        let removed = before - self.todos.len();
        if removed == 0 {
            debug!("No completed todos to clear");
            return Ok(0);
        }
        self.persist()?;

        info!(count = removed, "Completed todos cleared");
        Ok(removed)
    }

    /// Swap in a whole collection (backup import). Callers validate first.
    pub fn replace_all(&mut self, todos: Vec<Todo>) -> Result<usize, TodoError> {
        self.next_seq = self.next_seq.max(next_seq_after(&todos));
        self.todos = todos;
        self.persist()?;

        info!(count = self.todos.len(), "Todos replaced");
        Ok(self.todos.len())
    }

    pub fn stats(&self) -> TodoStats {
        let total = self.todos.len();
        let completed = self.todos.iter().filter(|t| t.completed).count();
        TodoStats {
            total,
            completed,
            pending: total - completed,
        }
    }

    fn find_mut(&mut self, id: &TodoId) -> Result<&mut Todo, TodoError> {
        self.todos
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| TodoError::NotFound { id: id.clone() })
    }

    fn persist(&self) -> Result<(), TodoError> {
        self.persistence.save(&self.todos)?;
        Ok(())
    }

    fn next_id(&mut self, now: DateTime<Utc>) -> Result<TodoId, TodoError> {
        match self.strategy {
            IdStrategy::Sequential => {
                let id = self.next_seq;
                if id >= MAX_SEQ_ID {
                    return Err(TodoError::IdsExhausted);
                }
                self.next_seq += 1;
                Ok(TodoId::Seq(id))
            }
            IdStrategy::Token => {
                let taken: HashSet<&TodoId> = self.todos.iter().map(|t| &t.id).collect();
                loop {
                    let candidate = TodoId::Token(token_id(now));
                    if !taken.contains(&candidate) {
                        return Ok(candidate);
                    }
                }
            }
        }
    }
}

/// First sequential id not used by `todos`. Saturates at `MAX_SEQ_ID`.
fn next_seq_after(todos: &[Todo]) -> u64 {
    todos
        .iter()
        .filter_map(|t| match t.id {
            TodoId::Seq(n) => Some(n),
            TodoId::Token(_) => None,
        })
        .max()
        .map_or(1, |max| max.saturating_add(1))
}

fn token_id(now: DateTime<Utc>) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
    let mut token = to_base36(millis);
    let mut rng = rand::thread_rng();
    for _ in 0..TOKEN_RANDOM_CHARS {
        let digit = rng.gen_range(0..36u32);
        token.push(char::from_digit(digit, 36).unwrap_or('0'));
    }
    token
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(char::from_digit((n % 36) as u32, 36).unwrap_or('0'));
        n /= 36;
    }
    digits.iter().rev().collect()
}
