//! SQLite-backed device storage.
//!
//! Provides persistent storage for:
//! - Key-value cache entries (`habits_{user}`, `logs_{user}`)
//! - Scheduled habit reminders

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::{data_dir, migrations};

/// A recurring daily reminder as stored on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub identifier: String,
    pub habit_id: String,
    pub title: String,
    pub body: String,
    pub hour: u8,
    pub minute: u8,
}

/// SQLite database for device-local state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/habitrack/habitrack.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let path = data_dir()?.join("habitrack.db");
        Ok(Self::open_at(path)?)
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        migrations::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        migrations::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove every kv entry. Returns the number of entries removed.
    pub fn kv_clear(&self) -> Result<usize, rusqlite::Error> {
        self.conn.execute("DELETE FROM kv", [])
    }

    /// Insert or replace the reminder with the record's identifier.
    pub fn reminder_upsert(&self, reminder: &ReminderRecord) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO reminders
                (identifier, habit_id, title, body, hour, minute, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                reminder.identifier,
                reminder.habit_id,
                reminder.title,
                reminder.body,
                reminder.hour,
                reminder.minute,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Delete a reminder. Returns whether one existed.
    pub fn reminder_delete(&self, identifier: &str) -> Result<bool, rusqlite::Error> {
        let affected = self
            .conn
            .execute("DELETE FROM reminders WHERE identifier = ?1", params![identifier])?;
        Ok(affected > 0)
    }

    pub fn reminder_clear(&self) -> Result<usize, rusqlite::Error> {
        self.conn.execute("DELETE FROM reminders", [])
    }

    /// All reminders ordered by time of day.
    pub fn reminders(&self) -> Result<Vec<ReminderRecord>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT identifier, habit_id, title, body, hour, minute
             FROM reminders
             ORDER BY hour, minute, identifier",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ReminderRecord {
                identifier: row.get(0)?,
                habit_id: row.get(1)?,
                title: row.get(2)?,
                body: row.get(3)?,
                hour: row.get(4)?,
                minute: row.get(5)?,
            })
        })?;
        let reminders = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(reminders)
    }

    /// Reminders set for exactly `hour:minute`.
    pub fn reminders_at(&self, hour: u8, minute: u8) -> Result<Vec<ReminderRecord>, rusqlite::Error> {
        Ok(self
            .reminders()?
            .into_iter()
            .filter(|r| r.hour == hour && r.minute == minute)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reminder(habit_id: &str, hour: u8, minute: u8) -> ReminderRecord {
        ReminderRecord {
            identifier: format!("habit_{habit_id}"),
            habit_id: habit_id.to_string(),
            title: "📖 Read".to_string(),
            body: "Time to practice your habit!".to_string(),
            hour,
            minute,
        }
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_set("test", "again").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "again");
        assert_eq!(db.kv_clear().unwrap(), 1);
        assert!(db.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn reminder_upsert_replaces_by_identifier() {
        let db = Database::open_memory().unwrap();
        db.reminder_upsert(&reminder("h1", 9, 0)).unwrap();
        db.reminder_upsert(&reminder("h1", 7, 30)).unwrap();
        db.reminder_upsert(&reminder("h2", 6, 0)).unwrap();

        let all = db.reminders().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].habit_id, "h2");
        assert_eq!((all[1].hour, all[1].minute), (7, 30));
        assert_eq!(db.reminders_at(7, 30).unwrap().len(), 1);
    }

    #[test]
    fn reminder_delete_reports_existence() {
        let db = Database::open_memory().unwrap();
        db.reminder_upsert(&reminder("h1", 9, 0)).unwrap();
        assert!(db.reminder_delete("habit_h1").unwrap());
        assert!(!db.reminder_delete("habit_h1").unwrap());
    }

    #[test]
    fn open_at_persists_between_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.db");
        Database::open_at(&path).unwrap().kv_set("k", "v").unwrap();
        let reopened = Database::open_at(&path).unwrap();
        assert_eq!(reopened.kv_get("k").unwrap().as_deref(), Some("v"));
    }
}
