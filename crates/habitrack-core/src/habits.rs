//! Habit registry: the signed-in user's habit list.
//!
//! Reads are stale-while-revalidate: the cached list is exposed first, then
//! replaced by the remote result. Writes go to the remote store first and
//! only touch in-memory state, the cache and reminders once that succeeded.

use std::sync::Arc;

use crate::cache::{self, LocalCache};
use crate::error::{CoreError, Result};
use crate::model::{validate_title, Habit, HabitInsert, HabitUpdate, NewHabit};
use crate::notify::Notifier;
use crate::remote::{self, tables, Query, RemoteStore};

/// Owns the habit list of one user, most recently created first.
pub struct HabitRegistry {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<dyn LocalCache>,
    notifier: Arc<dyn Notifier>,
    user_id: Option<String>,
    habits: Vec<Habit>,
    loading: bool,
    error: Option<String>,
}

impl HabitRegistry {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        cache: Arc<dyn LocalCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            remote,
            cache,
            notifier,
            user_id: None,
            habits: Vec::new(),
            loading: false,
            error: None,
        }
    }

    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    pub fn find(&self, habit_id: &str) -> Option<&Habit> {
        self.habits.iter().find(|h| h.id == habit_id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Message of the last failed load, cleared by the next successful one.
    pub fn last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Load the cached list, then revalidate against the remote store.
    pub async fn load(&mut self, user_id: &str) -> Result<()> {
        self.load_cached(user_id).await;
        self.refresh(user_id).await
    }

    /// Expose the cached list for `user_id`, if any. Returns whether the
    /// cache had one.
    pub async fn load_cached(&mut self, user_id: &str) -> bool {
        self.user_id = Some(user_id.to_string());
        match cache::read_json::<Vec<Habit>>(self.cache.as_ref(), &cache::habits_key(user_id)).await {
            Some(cached) => {
                self.habits = cached;
                true
            }
            None => false,
        }
    }

    /// Fetch the list from the remote store and swap it in.
    ///
    /// On failure the current list is kept and the error recorded.
    pub async fn refresh(&mut self, user_id: &str) -> Result<()> {
        self.user_id = Some(user_id.to_string());
        self.loading = true;
        let result = self.fetch(user_id).await;
        self.loading = false;

        match result {
            Ok(habits) => {
                self.habits = habits;
                self.persist().await;
                self.error = None;
                Ok(())
            }
            Err(e) => {
                tracing::error!(user_id, "error loading habits: {e}");
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn fetch(&self, user_id: &str) -> Result<Vec<Habit>> {
        let query = Query::new().eq("user_id", user_id).order_desc("created_at");
        let rows = self.remote.select(tables::HABITS, &query).await?;
        Ok(remote::decode_rows(rows)?)
    }

    /// Create a habit for `user_id` and schedule its daily reminder.
    pub async fn create(&mut self, user_id: Option<&str>, habit: NewHabit) -> Result<Habit> {
        let result = self.try_create(user_id, habit).await;
        if let Err(e) = &result {
            tracing::error!("error creating habit: {e}");
        }
        result
    }

    async fn try_create(&mut self, user_id: Option<&str>, habit: NewHabit) -> Result<Habit> {
        let user_id = user_id.ok_or(CoreError::NotAuthenticated)?;
        let title = validate_title(&habit.title)?;

        let row = remote::encode_row(&HabitInsert {
            user_id,
            title: &title,
            emoji: &habit.emoji,
            reminder_time: habit.reminder_time,
        })?;
        let stored = self.remote.insert(tables::HABITS, row).await?;
        let created: Habit = serde_json::from_value(stored)?;
        tracing::info!(habit_id = %created.id, "habit created");

        self.user_id = Some(user_id.to_string());
        self.habits.insert(0, created.clone());
        self.persist().await;
        self.schedule_reminder(&created).await;

        Ok(created)
    }

    /// Apply a partial update. Reschedules the reminder when any reminder
    /// field was part of the update.
    pub async fn update(&mut self, habit_id: &str, update: HabitUpdate) -> Result<Habit> {
        let result = self.try_update(habit_id, update).await;
        if let Err(e) = &result {
            tracing::error!(habit_id, "error updating habit: {e}");
        }
        result
    }

    async fn try_update(&mut self, habit_id: &str, mut update: HabitUpdate) -> Result<Habit> {
        if let Some(title) = &update.title {
            update.title = Some(validate_title(title)?);
        }

        let patch = remote::encode_row(&update)?;
        let stored = self.remote.update(tables::HABITS, habit_id, patch).await?;
        let updated: Habit = serde_json::from_value(stored)?;
        tracing::info!(habit_id, "habit updated");

        for habit in self.habits.iter_mut().filter(|h| h.id == habit_id) {
            *habit = updated.clone();
        }
        self.persist().await;

        if update.affects_reminder() {
            self.schedule_reminder(&updated).await;
        }
        Ok(updated)
    }

    /// Delete a habit. Its reminder is cancelled only once the remote
    /// delete succeeded.
    pub async fn delete(&mut self, habit_id: &str) -> Result<()> {
        if let Err(e) = self.remote.delete(tables::HABITS, habit_id).await {
            tracing::error!(habit_id, "error deleting habit: {e}");
            return Err(e.into());
        }
        tracing::info!(habit_id, "habit deleted");

        self.habits.retain(|h| h.id != habit_id);
        self.persist().await;

        if let Err(e) = self.notifier.cancel(habit_id).await {
            tracing::warn!(habit_id, "failed to cancel reminder: {e}");
        }
        Ok(())
    }

    async fn schedule_reminder(&self, habit: &Habit) {
        if let Err(e) = self
            .notifier
            .schedule(&habit.id, &habit.title, &habit.emoji, habit.reminder_time)
            .await
        {
            tracing::warn!(habit_id = %habit.id, "failed to schedule reminder: {e}");
        }
    }

    /// Overwrite the cached list. The remote write already succeeded, so a
    /// cache failure is logged and otherwise ignored.
    async fn persist(&self) {
        let Some(user_id) = &self.user_id else {
            return;
        };
        if let Err(e) =
            cache::write_json(self.cache.as_ref(), &cache::habits_key(user_id), &self.habits).await
        {
            tracing::warn!(user_id = %user_id, "failed to cache habits: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::notify::{NotifierCall, RecordingNotifier};
    use crate::remote::MemoryStore;
    use serde_json::json;

    struct Fixture {
        remote: Arc<MemoryStore>,
        cache: Arc<MemoryCache>,
        notifier: Arc<RecordingNotifier>,
        registry: HabitRegistry,
    }

    fn fixture() -> Fixture {
        let remote = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let registry = HabitRegistry::new(remote.clone(), cache.clone(), notifier.clone());
        Fixture {
            remote,
            cache,
            notifier,
            registry,
        }
    }

    fn read() -> NewHabit {
        NewHabit::new("Read", "📖", "09:00".parse().unwrap())
    }

    #[tokio::test]
    async fn create_prepends_and_schedules() {
        let mut f = fixture();
        f.registry
            .create(Some("u1"), NewHabit::new("Run", "🏃", "07:00".parse().unwrap()))
            .await
            .unwrap();
        let created = f.registry.create(Some("u1"), read()).await.unwrap();

        assert!(!created.id.is_empty());
        assert_eq!(created.title, "Read");
        assert_eq!(created.emoji, "📖");
        assert_eq!(created.reminder_time.to_string(), "09:00");
        assert_eq!(f.registry.habits()[0], created);
        assert_eq!(f.registry.habits().len(), 2);

        let scheduled = f.notifier.scheduled();
        assert_eq!(scheduled.len(), 2);
        assert_eq!(scheduled[1].identifier, format!("habit_{}", created.id));
        assert_eq!(scheduled[1].title, "📖 Read");

        let cached: Vec<Habit> = cache::read_json(f.cache.as_ref(), "habits_u1").await.unwrap();
        assert_eq!(cached.len(), 2);
        assert_eq!(cached[0].id, created.id);
    }

    #[tokio::test]
    async fn create_without_user_is_rejected() {
        let mut f = fixture();
        let err = f.registry.create(None, read()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotAuthenticated));
        assert!(f.remote.rows(tables::HABITS).is_empty());
        assert!(f.notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_blank_title() {
        let mut f = fixture();
        let err = f
            .registry
            .create(Some("u1"), NewHabit::new("   ", "📖", "09:00".parse().unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn load_serves_cache_then_remote() {
        let mut f = fixture();
        f.cache
            .set(
                "habits_u1",
                &json!([{
                    "id": "stale", "user_id": "u1", "title": "Old", "emoji": "⭐",
                    "reminder_time": "08:00", "created_at": "2026-01-01T00:00:00Z"
                }])
                .to_string(),
            )
            .await
            .unwrap();
        f.remote.seed(
            tables::HABITS,
            vec![
                json!({"id": "a", "user_id": "u1", "title": "A", "emoji": "⭐",
                       "reminder_time": "08:00:00", "created_at": "2026-10-01T00:00:00Z"}),
                json!({"id": "b", "user_id": "u1", "title": "B", "emoji": "⭐",
                       "reminder_time": "08:00:00", "created_at": "2026-10-02T00:00:00Z"}),
                json!({"id": "c", "user_id": "u2", "title": "C", "emoji": "⭐",
                       "reminder_time": "08:00:00", "created_at": "2026-10-03T00:00:00Z"}),
            ],
        );

        assert!(f.registry.load_cached("u1").await);
        assert_eq!(f.registry.habits()[0].id, "stale");

        f.registry.refresh("u1").await.unwrap();
        let ids: Vec<_> = f.registry.habits().iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(f.registry.last_error().is_none());

        let cached: Vec<Habit> = cache::read_json(f.cache.as_ref(), "habits_u1").await.unwrap();
        assert_eq!(cached.len(), 2);
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_state() {
        let mut f = fixture();
        f.registry.create(Some("u1"), read()).await.unwrap();
        f.remote.set_failing(true);

        assert!(f.registry.load("u1").await.is_err());
        assert_eq!(f.registry.habits().len(), 1);
        assert!(f.registry.last_error().is_some());
        assert!(!f.registry.is_loading());
    }

    #[tokio::test]
    async fn update_replaces_entry_and_reschedules() {
        let mut f = fixture();
        let created = f.registry.create(Some("u1"), read()).await.unwrap();

        let updated = f
            .registry
            .update(
                &created.id,
                HabitUpdate {
                    reminder_time: Some("21:30".parse().unwrap()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.reminder_time.to_string(), "21:30");
        assert_eq!(f.registry.find(&created.id), Some(&updated));
        let scheduled = f.notifier.scheduled();
        assert_eq!(scheduled.len(), 2);
        assert_eq!((scheduled[1].hour, scheduled[1].minute), (21, 30));
    }

    #[tokio::test]
    async fn empty_update_does_not_reschedule() {
        let mut f = fixture();
        let created = f.registry.create(Some("u1"), read()).await.unwrap();
        f.registry
            .update(&created.id, HabitUpdate::default())
            .await
            .unwrap();
        assert_eq!(f.notifier.scheduled().len(), 1);
    }

    #[tokio::test]
    async fn failed_update_does_not_reschedule() {
        let mut f = fixture();
        let created = f.registry.create(Some("u1"), read()).await.unwrap();
        f.remote.set_failing(true);

        let result = f
            .registry
            .update(
                &created.id,
                HabitUpdate {
                    title: Some("Read more".into()),
                    reminder_time: Some("21:30".parse().unwrap()),
                    ..Default::default()
                },
            )
            .await;

        assert!(result.is_err());
        assert_eq!(f.registry.habits(), &[created.clone()]);
        assert_eq!(f.notifier.scheduled().len(), 1);
        let cached: Vec<Habit> = cache::read_json(f.cache.as_ref(), "habits_u1").await.unwrap();
        assert_eq!(cached, vec![created]);
    }

    #[tokio::test]
    async fn delete_cancels_after_remote_success() {
        let mut f = fixture();
        let created = f.registry.create(Some("u1"), read()).await.unwrap();

        f.registry.delete(&created.id).await.unwrap();

        assert!(f.registry.habits().is_empty());
        assert_eq!(f.notifier.cancelled(), vec![created.id.clone()]);
        let cached: Vec<Habit> = cache::read_json(f.cache.as_ref(), "habits_u1").await.unwrap();
        assert!(cached.is_empty());
    }

    #[tokio::test]
    async fn failed_delete_changes_nothing() {
        let mut f = fixture();
        let created = f.registry.create(Some("u1"), read()).await.unwrap();
        f.remote.set_failing(true);

        assert!(f.registry.delete(&created.id).await.is_err());

        assert_eq!(f.registry.habits().len(), 1);
        assert!(f
            .notifier
            .calls()
            .iter()
            .all(|c| !matches!(c, NotifierCall::Cancel(_))));
    }
}
