//! Backup reminders: nag the user to export when no backup happened today.
//!
//! Purely advisory: skipping a reminder never loses data. State lives in the
//! key-value store next to the todos:
//! - `lastBackupDate`: ISO date of the last successful export
//! - `backupReminderNeeded`: set when the user left without backing up

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::storage::KeyValueStore;

pub const LAST_BACKUP_KEY: &str = "lastBackupDate";
pub const REMINDER_KEY: &str = "backupReminderNeeded";

/// Why the user is being asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    /// The app is closing and today has no backup yet.
    Closing,
    /// The last session ended without a backup.
    Missed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupReminder {
    pub kind: ReminderKind,
    pub todo_count: usize,
}

impl BackupReminder {
    pub fn message(&self) -> String {
        match self.kind {
            ReminderKind::Closing => format!(
                "You have {} todo(s) but no backup today. Back up now?",
                self.todo_count
            ),
            ReminderKind::Missed => format!(
                "Last time you left without a backup. You have {} todo(s). Back up now?",
                self.todo_count
            ),
        }
    }
}

/// Host-side yes/no question.
#[async_trait]
pub trait BackupPrompt: Send {
    async fn confirm_backup(&mut self, reminder: &BackupReminder) -> bool;
}

/// What the host should do after a lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupDecision {
    /// Nothing to ask about.
    NotNeeded,
    /// The user agreed; the host should export now.
    ExportRequested,
    /// The user declined.
    Declined,
}

pub struct BackupAdvisor<S> {
    kv: S,
}

impl<S: KeyValueStore> BackupAdvisor<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    pub fn last_backup(&self) -> Result<Option<NaiveDate>, StorageError> {
        Ok(self
            .kv
            .get(LAST_BACKUP_KEY)?
            .and_then(|raw| raw.trim().parse().ok()))
    }

    pub fn reminder_pending(&self) -> Result<bool, StorageError> {
        Ok(self.kv.get(REMINDER_KEY)?.as_deref() == Some("true"))
    }

    /// Non-empty store and no export stamped for `today`.
    pub fn needs_backup(&self, todo_count: usize, today: NaiveDate) -> Result<bool, StorageError> {
        Ok(todo_count > 0 && self.last_backup()? != Some(today))
    }

    /// A successful export happened.
    pub fn record_export(&self, today: NaiveDate) -> Result<(), StorageError> {
        self.kv.set(LAST_BACKUP_KEY, &today.to_string())?;
        self.kv.remove(REMINDER_KEY)?;
        info!(date = %today, "Backup recorded");
        Ok(())
    }

    /// The app is going away. Ask once; remember a refusal for next load.
    pub async fn on_close<P: BackupPrompt + ?Sized>(
        &self,
        prompt: &mut P,
        todo_count: usize,
        today: NaiveDate,
    ) -> Result<BackupDecision, StorageError> {
        if !self.needs_backup(todo_count, today)? {
            return Ok(BackupDecision::NotNeeded);
        }
        let reminder = BackupReminder {
            kind: ReminderKind::Closing,
            todo_count,
        };
        if prompt.confirm_backup(&reminder).await {
            return Ok(BackupDecision::ExportRequested);
        }
        self.kv.set(REMINDER_KEY, "true")?;
        info!(todo_count, "Backup declined on close");
        Ok(BackupDecision::Declined)
    }

    /// The app was hidden. No prompt, just remember to ask next time.
    pub fn on_hidden(&self, todo_count: usize, today: NaiveDate) -> Result<bool, StorageError> {
        if !self.needs_backup(todo_count, today)? {
            return Ok(false);
        }
        self.kv.set(REMINDER_KEY, "true")?;
        debug!(todo_count, "Backup reminder flagged on hide");
        Ok(true)
    }

    /// Startup. Re-ask if the last session ended without a backup; the flag
    /// is cleared whatever the answer.
    pub async fn on_load<P: BackupPrompt + ?Sized>(
        &self,
        prompt: &mut P,
        todo_count: usize,
        today: NaiveDate,
    ) -> Result<BackupDecision, StorageError> {
        if !self.reminder_pending()? {
            return Ok(BackupDecision::NotNeeded);
        }
        if !self.needs_backup(todo_count, today)? {
            return Ok(BackupDecision::NotNeeded);
        }
        let reminder = BackupReminder {
            kind: ReminderKind::Missed,
            todo_count,
        };
        let accepted = prompt.confirm_backup(&reminder).await;
        self.kv.remove(REMINDER_KEY)?;
        Ok(if accepted {
            BackupDecision::ExportRequested
        } else {
            BackupDecision::Declined
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    /// Answers with a fixed reply and records what it was asked.
    struct Scripted {
        answer: bool,
        asked: Vec<BackupReminder>,
    }

    impl Scripted {
        fn answering(answer: bool) -> Self {
            Self {
                answer,
                asked: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl BackupPrompt for Scripted {
        async fn confirm_backup(&mut self, reminder: &BackupReminder) -> bool {
            self.asked.push(*reminder);
            self.answer
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn record_export_stamps_today_and_clears_flag() {
        let kv = MemoryStore::new();
        let advisor = BackupAdvisor::new(kv.clone());
        kv.set(REMINDER_KEY, "true").unwrap();

        advisor.record_export(day(12)).unwrap();
        assert_eq!(advisor.last_backup().unwrap(), Some(day(12)));
        assert!(!advisor.reminder_pending().unwrap());
        assert!(!advisor.needs_backup(3, day(12)).unwrap());
        assert!(advisor.needs_backup(3, day(13)).unwrap());
    }

    #[test]
    fn empty_store_never_needs_backup() {
        let advisor = BackupAdvisor::new(MemoryStore::new());
        assert!(!advisor.needs_backup(0, day(12)).unwrap());
        assert!(!advisor.on_hidden(0, day(12)).unwrap());
    }

    #[tokio::test]
    async fn close_without_backup_prompts() {
        let advisor = BackupAdvisor::new(MemoryStore::new());
        let mut prompt = Scripted::answering(true);

        let decision = advisor.on_close(&mut prompt, 2, day(12)).await.unwrap();
        assert_eq!(decision, BackupDecision::ExportRequested);
        assert_eq!(prompt.asked.len(), 1);
        assert_eq!(prompt.asked[0].kind, ReminderKind::Closing);
        assert!(!advisor.reminder_pending().unwrap());
    }

    #[tokio::test]
    async fn declined_close_sets_flag() {
        let advisor = BackupAdvisor::new(MemoryStore::new());
        let mut prompt = Scripted::answering(false);

        let decision = advisor.on_close(&mut prompt, 2, day(12)).await.unwrap();
        assert_eq!(decision, BackupDecision::Declined);
        assert!(advisor.reminder_pending().unwrap());
    }

    #[tokio::test]
    async fn close_after_backup_today_is_silent() {
        let advisor = BackupAdvisor::new(MemoryStore::new());
        advisor.record_export(day(12)).unwrap();
        let mut prompt = Scripted::answering(true);

        let decision = advisor.on_close(&mut prompt, 5, day(12)).await.unwrap();
        assert_eq!(decision, BackupDecision::NotNeeded);
        assert!(prompt.asked.is_empty());
    }

    #[tokio::test]
    async fn load_reprompts_and_clears_flag_either_way() {
        for answer in [true, false] {
            let advisor = BackupAdvisor::new(MemoryStore::new());
            assert!(advisor.on_hidden(4, day(12)).unwrap());

            let mut prompt = Scripted::answering(answer);
            let decision = advisor.on_load(&mut prompt, 4, day(13)).await.unwrap();

            let expected = if answer {
                BackupDecision::ExportRequested
            } else {
                BackupDecision::Declined
            };
            assert_eq!(decision, expected);
            assert_eq!(prompt.asked[0].kind, ReminderKind::Missed);
            assert!(!advisor.reminder_pending().unwrap());
        }
    }

    #[tokio::test]
    async fn load_without_flag_is_silent() {
        let advisor = BackupAdvisor::new(MemoryStore::new());
        let mut prompt = Scripted::answering(true);
        let decision = advisor.on_load(&mut prompt, 4, day(12)).await.unwrap();
        assert_eq!(decision, BackupDecision::NotNeeded);
        assert!(prompt.asked.is_empty());
    }

    #[tokio::test]
    async fn load_skips_when_backed_up_today() {
        let kv = MemoryStore::new();
        let advisor = BackupAdvisor::new(kv.clone());
        advisor.record_export(day(12)).unwrap();
        kv.set(REMINDER_KEY, "true").unwrap();

        let mut prompt = Scripted::answering(true);
        let decision = advisor.on_load(&mut prompt, 4, day(12)).await.unwrap();
        assert_eq!(decision, BackupDecision::NotNeeded);
        assert!(prompt.asked.is_empty());
    }

    #[test]
    fn reminder_messages_mention_count() {
        let reminder = BackupReminder {
            kind: ReminderKind::Missed,
            todo_count: 7,
        };
        assert!(reminder.message().contains("7 todo(s)"));
    }
}
