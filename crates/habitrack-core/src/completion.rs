//! Completion log: per-day completion records for the user's habits.
//!
//! Only a rolling window of recent days is kept in memory. Streaks and
//! weekly statistics are computed from that window.

use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{self, LocalCache};
use crate::error::Result;
use crate::model::{CompletionInsert, CompletionPatch, CompletionRecord, Habit};
use crate::remote::{self, tables, Query, RemoteStore};

/// Days of history fetched before today.
pub const LOG_WINDOW_DAYS: i64 = 30;

/// Days counted by [`WeeklyStats`], today included.
pub const WEEK_DAYS: u32 = 7;

/// Completion count over the last seven days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyStats {
    pub completed: u32,
    pub total: u32,
    pub percentage: u32,
}

impl WeeklyStats {
    pub fn from_completed(completed: u32) -> Self {
        Self {
            completed,
            total: WEEK_DAYS,
            percentage: percentage(completed, WEEK_DAYS),
        }
    }
}

/// `completed / possible` as a rounded percentage; 0 when nothing was possible.
pub fn percentage(completed: u32, possible: u32) -> u32 {
    if possible == 0 {
        return 0;
    }
    (f64::from(completed) / f64::from(possible) * 100.0).round() as u32
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Owns the recent completion records of one user's habits, newest first.
pub struct CompletionLog {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<dyn LocalCache>,
    user_id: Option<String>,
    logs: Vec<CompletionRecord>,
    loading: bool,
    error: Option<String>,
}

impl CompletionLog {
    pub fn new(remote: Arc<dyn RemoteStore>, cache: Arc<dyn LocalCache>) -> Self {
        Self {
            remote,
            cache,
            user_id: None,
            logs: Vec::new(),
            loading: false,
            error: None,
        }
    }

    pub fn logs(&self) -> &[CompletionRecord] {
        &self.logs
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Load the cached records, then revalidate against the remote store.
    pub async fn load(&mut self, user_id: &str) -> Result<()> {
        self.load_cached(user_id).await;
        self.refresh(user_id).await
    }

    pub async fn load_cached(&mut self, user_id: &str) -> bool {
        self.user_id = Some(user_id.to_string());
        match cache::read_json::<Vec<CompletionRecord>>(self.cache.as_ref(), &cache::logs_key(user_id))
            .await
        {
            Some(cached) => {
                self.logs = cached;
                true
            }
            None => false,
        }
    }

    pub async fn refresh(&mut self, user_id: &str) -> Result<()> {
        self.refresh_at(user_id, today()).await
    }

    /// Fetch records dated `today - LOG_WINDOW_DAYS` or later.
    pub async fn refresh_at(&mut self, user_id: &str, today: NaiveDate) -> Result<()> {
        self.user_id = Some(user_id.to_string());
        self.loading = true;
        let result = self.fetch(user_id, today).await;
        self.loading = false;

        match result {
            Ok(logs) => {
                self.logs = logs;
                self.persist().await;
                self.error = None;
                Ok(())
            }
            Err(e) => {
                tracing::error!(user_id, "error loading logs: {e}");
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn fetch(&self, user_id: &str, today: NaiveDate) -> Result<Vec<CompletionRecord>> {
        #[derive(Deserialize)]
        struct HabitId {
            id: String,
        }

        let owned = self
            .remote
            .select(tables::HABITS, &Query::new().eq("user_id", user_id))
            .await?;
        let habit_ids: Vec<HabitId> = remote::decode_rows(owned)?;
        if habit_ids.is_empty() {
            tracing::debug!(user_id, "no habits, skipping log query");
            return Ok(Vec::new());
        }

        let since = today - Duration::days(LOG_WINDOW_DAYS);
        let query = Query::new()
            .in_list("habit_id", habit_ids.into_iter().map(|h| h.id))
            .gte("date", since.to_string())
            .order_desc("date");
        let rows = self.remote.select(tables::HABIT_LOGS, &query).await?;
        Ok(remote::decode_rows(rows)?)
    }

    /// Flip completion of `habit_id` on `date`, creating the record on the
    /// first toggle. Returns the record as stored.
    pub async fn toggle_completion(&mut self, habit_id: &str, date: NaiveDate) -> Result<CompletionRecord> {
        let result = self.try_toggle(habit_id, date).await;
        if let Err(e) = &result {
            tracing::error!(habit_id, %date, "error toggling completion: {e}");
        }
        result
    }

    async fn try_toggle(&mut self, habit_id: &str, date: NaiveDate) -> Result<CompletionRecord> {
        let existing = self
            .logs
            .iter()
            .find(|l| l.habit_id == habit_id && l.date == date)
            .map(|l| (l.id.clone(), l.completed));

        let record = match existing {
            Some((id, completed)) => {
                let completed = !completed;
                let patch = remote::encode_row(&CompletionPatch {
                    completed,
                    completed_at: completed.then(Utc::now),
                })?;
                let stored = self.remote.update(tables::HABIT_LOGS, &id, patch).await?;
                let record: CompletionRecord = serde_json::from_value(stored)?;
                for log in self.logs.iter_mut().filter(|l| l.id == id) {
                    *log = record.clone();
                }
                record
            }
            None => {
                let row = remote::encode_row(&CompletionInsert {
                    habit_id,
                    date,
                    completed: true,
                    completed_at: Some(Utc::now()),
                })?;
                let stored = self.remote.insert(tables::HABIT_LOGS, row).await?;
                let record: CompletionRecord = serde_json::from_value(stored)?;
                self.logs.insert(0, record.clone());
                record
            }
        };
        tracing::info!(habit_id, %date, completed = record.completed, "completion toggled");

        self.persist().await;
        Ok(record)
    }

    pub fn is_completed_on(&self, habit_id: &str, date: NaiveDate) -> bool {
        self.logs
            .iter()
            .any(|l| l.habit_id == habit_id && l.date == date && l.completed)
    }

    pub fn streak_length(&self, habit_id: &str) -> u32 {
        self.streak_length_at(habit_id, today())
    }

    /// Consecutive completed days ending on `today`. A chain that stops
    /// yesterday counts as broken.
    pub fn streak_length_at(&self, habit_id: &str, today: NaiveDate) -> u32 {
        let mut dates: Vec<NaiveDate> = self
            .logs
            .iter()
            .filter(|l| l.habit_id == habit_id && l.completed)
            .map(|l| l.date)
            .collect();
        dates.sort_unstable_by(|a, b| b.cmp(a));

        let mut streak = 0;
        let mut cursor = today;
        for date in dates {
            if date != cursor {
                break;
            }
            streak += 1;
            cursor -= Duration::days(1);
        }
        streak
    }

    pub fn weekly_stats(&self, habit_id: &str) -> WeeklyStats {
        self.weekly_stats_at(habit_id, today())
    }

    pub fn weekly_stats_at(&self, habit_id: &str, today: NaiveDate) -> WeeklyStats {
        let since = today - Duration::days(i64::from(WEEK_DAYS) - 1);
        let completed = self
            .logs
            .iter()
            .filter(|l| l.habit_id == habit_id && l.completed && l.date >= since)
            .count();
        WeeklyStats::from_completed(completed as u32)
    }

    /// Number of `habits` completed today.
    pub fn completed_today_count(&self, habits: &[Habit]) -> usize {
        self.completed_count_on(habits, today())
    }

    pub fn completed_count_on(&self, habits: &[Habit], date: NaiveDate) -> usize {
        habits
            .iter()
            .filter(|h| self.is_completed_on(&h.id, date))
            .count()
    }

    async fn persist(&self) {
        let Some(user_id) = &self.user_id else {
            return;
        };
        if let Err(e) = cache::write_json(self.cache.as_ref(), &cache::logs_key(user_id), &self.logs).await {
            tracing::warn!(user_id = %user_id, "failed to cache logs: {e}");
        }
    }
}
