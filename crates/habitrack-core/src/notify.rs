//! Notification collaborator.
//!
//! Reminders are recurring daily triggers identified by `habit_{id}`, so
//! scheduling the same habit twice replaces the earlier trigger.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{CoreError, Result};
use crate::model::ReminderTime;
use crate::storage::{Database, ReminderRecord};

/// Body shown on every habit reminder.
pub const REMINDER_BODY: &str = "Time to practice your habit!";

/// Platform identifier for a habit's reminder.
pub fn reminder_identifier(habit_id: &str) -> String {
    format!("habit_{habit_id}")
}

/// Build the stored form of a reminder.
pub fn reminder_for(habit_id: &str, title: &str, emoji: &str, time: ReminderTime) -> ReminderRecord {
    ReminderRecord {
        identifier: reminder_identifier(habit_id),
        habit_id: habit_id.to_string(),
        title: format!("{emoji} {title}"),
        body: REMINDER_BODY.to_string(),
        hour: time.hour(),
        minute: time.minute(),
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Cancel any reminder for `habit_id`, then register a daily trigger.
    async fn schedule(&self, habit_id: &str, title: &str, emoji: &str, time: ReminderTime) -> Result<()>;

    async fn cancel(&self, habit_id: &str) -> Result<()>;

    /// Remove every reminder scheduled by the app.
    async fn cancel_all(&self) -> Result<()>;
}

/// Used where the host has no notification support. Every call succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn schedule(&self, habit_id: &str, _title: &str, _emoji: &str, _time: ReminderTime) -> Result<()> {
        tracing::debug!(habit_id, "notifications unsupported, reminder not scheduled");
        Ok(())
    }

    async fn cancel(&self, _habit_id: &str) -> Result<()> {
        Ok(())
    }

    async fn cancel_all(&self) -> Result<()> {
        Ok(())
    }
}

/// Reminders persisted in the device database.
///
/// A desktop scheduler (or the CLI's `reminders due`) reads the book to
/// find which reminders fire at a given local time.
pub struct ReminderBook {
    db: Mutex<Database>,
}

impl ReminderBook {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> rusqlite::Result<T>) -> Result<T> {
        let db = self
            .db
            .lock()
            .map_err(|e| CoreError::Cache(format!("lock error: {e}")))?;
        Ok(f(&db)?)
    }

    pub fn list(&self) -> Result<Vec<ReminderRecord>> {
        self.with_db(|db| db.reminders())
    }

    /// Reminders that fire at `time` local time.
    pub fn due_at(&self, time: ReminderTime) -> Result<Vec<ReminderRecord>> {
        self.with_db(|db| db.reminders_at(time.hour(), time.minute()))
    }
}

#[async_trait]
impl Notifier for ReminderBook {
    async fn schedule(&self, habit_id: &str, title: &str, emoji: &str, time: ReminderTime) -> Result<()> {
        let record = reminder_for(habit_id, title, emoji, time);
        self.with_db(|db| {
            db.reminder_delete(&record.identifier)?;
            db.reminder_upsert(&record)
        })?;
        tracing::info!(habit_id, %time, "reminder scheduled");
        Ok(())
    }

    async fn cancel(&self, habit_id: &str) -> Result<()> {
        let existed = self.with_db(|db| db.reminder_delete(&reminder_identifier(habit_id)))?;
        tracing::info!(habit_id, existed, "reminder cancelled");
        Ok(())
    }

    async fn cancel_all(&self) -> Result<()> {
        let removed = self.with_db(|db| db.reminder_clear())?;
        tracing::info!(removed, "all reminders cancelled");
        Ok(())
    }
}

/// A call received by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierCall {
    Schedule(ReminderRecord),
    Cancel(String),
    CancelAll,
}

/// Notifier that records every call; for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<NotifierCall>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<NotifierCall> {
        self.lock().clone()
    }

    /// Habit ids passed to `cancel`, in call order.
    pub fn cancelled(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                NotifierCall::Cancel(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Reminders passed to `schedule`, in call order.
    pub fn scheduled(&self) -> Vec<ReminderRecord> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                NotifierCall::Schedule(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<NotifierCall>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn schedule(&self, habit_id: &str, title: &str, emoji: &str, time: ReminderTime) -> Result<()> {
        self.lock()
            .push(NotifierCall::Schedule(reminder_for(habit_id, title, emoji, time)));
        Ok(())
    }

    async fn cancel(&self, habit_id: &str) -> Result<()> {
        self.lock().push(NotifierCall::Cancel(habit_id.to_string()));
        Ok(())
    }

    async fn cancel_all(&self) -> Result<()> {
        self.lock().push(NotifierCall::CancelAll);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nine() -> ReminderTime {
        "09:00".parse().unwrap()
    }

    #[test]
    fn reminder_content() {
        let r = reminder_for("h1", "Read", "📖", nine());
        assert_eq!(r.identifier, "habit_h1");
        assert_eq!(r.title, "📖 Read");
        assert_eq!(r.body, REMINDER_BODY);
        assert_eq!((r.hour, r.minute), (9, 0));
    }

    #[tokio::test]
    async fn rescheduling_replaces_trigger() {
        let book = ReminderBook::new(Database::open_memory().unwrap());
        book.schedule("h1", "Read", "📖", nine()).await.unwrap();
        book.schedule("h1", "Read", "📖", "21:15".parse().unwrap())
            .await
            .unwrap();

        let all = book.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!((all[0].hour, all[0].minute), (21, 15));
        assert!(book.due_at(nine()).unwrap().is_empty());
        assert_eq!(book.due_at("21:15".parse().unwrap()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancel_and_cancel_all() {
        let book = ReminderBook::new(Database::open_memory().unwrap());
        book.schedule("h1", "Read", "📖", nine()).await.unwrap();
        book.schedule("h2", "Run", "🏃", nine()).await.unwrap();

        book.cancel("h1").await.unwrap();
        // Cancelling something never scheduled is fine.
        book.cancel("h1").await.unwrap();
        assert_eq!(book.list().unwrap().len(), 1);

        book.cancel_all().await.unwrap();
        assert!(book.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn recording_notifier_keeps_order() {
        let n = RecordingNotifier::new();
        n.schedule("h1", "Read", "📖", nine()).await.unwrap();
        n.cancel("h1").await.unwrap();
        n.cancel_all().await.unwrap();
        assert_eq!(n.calls().len(), 3);
        assert_eq!(n.cancelled(), vec!["h1".to_string()]);
        assert_eq!(n.scheduled()[0].identifier, "habit_h1");
    }
}
