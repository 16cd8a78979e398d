//! Record types for habits, completion logs and profiles.
//!
//! Field names follow the column names of the remote `habits`, `habit_logs`
//! and `users` tables so rows decode straight from the store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum length of a habit title, in characters.
pub const MAX_TITLE_LEN: usize = 50;

/// Emoji offered when creating a habit.
pub const EMOJI_PALETTE: [&str; 30] = [
    "💪", "🏃", "📚", "💧", "🧘", "🍎", "💤", "🚶", "📝", "🎵",
    "🎨", "💻", "📱", "🧹", "🌱", "☕", "🥗", "🍵", "📖", "✍️",
    "🎯", "💡", "🔥", "⭐", "🌟", "🎉", "🚀", "💎", "🏆", "👑",
];

/// Emoji preselected for a new habit.
pub const DEFAULT_EMOJI: &str = "⭐";

/// Timezone assumed when a profile has none.
pub const DEFAULT_TIMEZONE: &str = "Europe/Paris";

/// Timezones offered when editing a profile.
pub const TIMEZONES: [(&str, &str); 6] = [
    ("Paris", "Europe/Paris"),
    ("London", "Europe/London"),
    ("New York", "America/New_York"),
    ("Los Angeles", "America/Los_Angeles"),
    ("Tokyo", "Asia/Tokyo"),
    ("Sydney", "Australia/Sydney"),
];

/// Daily reminder time, 24-hour clock.
///
/// Parses `HH:MM` as typed by a user and `HH:MM:SS` as returned by a SQL
/// `time` column. Always written back as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReminderTime {
    hour: u8,
    minute: u8,
}

impl ReminderTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ValidationError> {
        if hour > 23 || minute > 59 {
            return Err(ValidationError::InvalidTime(format!("{hour}:{minute}")));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl Default for ReminderTime {
    fn default() -> Self {
        Self { hour: 9, minute: 0 }
    }
}

impl FromStr for ReminderTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidTime(s.to_string());
        let mut parts = s.trim().split(':');
        let hour = parts.next().ok_or_else(invalid)?;
        let minute = parts.next().ok_or_else(invalid)?;
        // Seconds from a `time` column are accepted and dropped.
        if let Some(seconds) = parts.next() {
            seconds.parse::<u8>().map_err(|_| invalid())?;
        }
        if parts.next().is_some() || hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(invalid());
        }
        let hour = hour.parse::<u8>().map_err(|_| invalid())?;
        let minute = minute.parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl fmt::Display for ReminderTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl TryFrom<String> for ReminderTime {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReminderTime> for String {
    fn from(value: ReminderTime) -> Self {
        value.to_string()
    }
}

/// Trim a habit title and check it is non-empty and at most
/// [`MAX_TITLE_LEN`] characters.
pub fn validate_title(title: &str) -> Result<String, ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty("title".into()));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::TooLong {
            field: "title".into(),
            max: MAX_TITLE_LEN,
        });
    }
    Ok(trimmed.to_string())
}

/// A user-defined recurring activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub emoji: String,
    pub reminder_time: ReminderTime,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the user when creating a habit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHabit {
    pub title: String,
    pub emoji: String,
    pub reminder_time: ReminderTime,
}

impl NewHabit {
    pub fn new(title: impl Into<String>, emoji: impl Into<String>, reminder_time: ReminderTime) -> Self {
        Self {
            title: title.into(),
            emoji: emoji.into(),
            reminder_time,
        }
    }
}

/// Row sent to the store on insert; `id` and `created_at` are assigned there.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct HabitInsert<'a> {
    pub user_id: &'a str,
    pub title: &'a str,
    pub emoji: &'a str,
    pub reminder_time: ReminderTime,
}

/// Partial update of a habit. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HabitUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_time: Option<ReminderTime>,
}

impl HabitUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.emoji.is_none() && self.reminder_time.is_none()
    }

    /// Whether the update changes anything shown in or timing the reminder.
    pub fn affects_reminder(&self) -> bool {
        !self.is_empty()
    }
}

/// Whether a habit was completed on a given calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub id: String,
    pub habit_id: String,
    pub date: NaiveDate,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Row sent to the store when a day is first toggled.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CompletionInsert<'a> {
    pub habit_id: &'a str,
    pub date: NaiveDate,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Patch sent to the store when an existing day is toggled.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CompletionPatch {
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// The user's profile row; `id` is the auth identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn timezone(&self) -> &str {
        self.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE)
    }

    /// Creation date as shown on the profile screen, e.g. "16 October 2026".
    pub fn member_since(&self) -> String {
        self.created_at.format("%-d %B %Y").to_string()
    }
}

/// Partial update of a profile. There is deliberately no email field.
///
/// `full_name: Some(None)` clears the name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl ProfileUpdate {
    /// Set the full name; blank input clears it.
    pub fn with_full_name(mut self, name: &str) -> Self {
        let trimmed = name.trim();
        self.full_name = Some((!trimmed.is_empty()).then(|| trimmed.to_string()));
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }
}

/// Row inserted into `users` at registration.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ProfileInsert<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub timezone: &'a str,
}
