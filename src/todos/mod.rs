//! Todo domain — records, the ordered store, filtered views, backups, and
//! the HTTP surface that serves them.

pub mod backup;
pub mod model;
pub mod query;
pub mod routes;
pub mod store;
pub mod transfer;
pub mod ws;

pub use backup::{BackupAdvisor, BackupDecision, BackupPrompt, BackupReminder, ReminderKind};
pub use model::{NewTodo, Todo, TodoId, TodoPatch, TodoStats, TodoWsMessage};
pub use query::{DateFilter, StatusFilter, TodoQuery, available_years};
pub use routes::{ApiError, AppState, todo_routes};
pub use store::{IdStrategy, KvPersistence, NoPersistence, TodoPersistence, TodoStore};
