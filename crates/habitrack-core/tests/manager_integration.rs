//! Integration tests driving the three managers together.
//!
//! Each test wires the managers over an in-memory store, cache and a
//! recording notifier, the same way the CLI wires them over the hosted
//! backend.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use habitrack_core::cache::{self, MemoryCache};
use habitrack_core::notify::NotifierCall;
use habitrack_core::remote::tables;
use habitrack_core::{
    CompletionLog, CoreError, HabitRegistry, HabitUpdate, MemoryStore, NewHabit, Overview,
    ProfileStore, ProfileUpdate, RecordingNotifier,
};
use serde_json::json;

struct App {
    remote: Arc<MemoryStore>,
    cache: Arc<MemoryCache>,
    notifier: Arc<RecordingNotifier>,
    habits: HabitRegistry,
    log: CompletionLog,
    profile: ProfileStore,
}

fn app() -> App {
    let remote = Arc::new(MemoryStore::new());
    let cache = Arc::new(MemoryCache::new());
    let notifier = Arc::new(RecordingNotifier::new());
    App {
        habits: HabitRegistry::new(remote.clone(), cache.clone(), notifier.clone()),
        log: CompletionLog::new(remote.clone(), cache.clone()),
        profile: ProfileStore::new(remote.clone()),
        remote,
        cache,
        notifier,
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

fn new_habit(title: &str, emoji: &str, time: &str) -> NewHabit {
    NewHabit::new(title, emoji, time.parse().unwrap())
}

#[tokio::test]
async fn test_create_habit_is_visible_with_id() {
    let mut app = app();
    let habit = app
        .habits
        .create(Some("u1"), new_habit("Read", "📖", "09:00"))
        .await
        .unwrap();

    assert!(!habit.id.is_empty());
    let listed = &app.habits.habits()[0];
    assert_eq!(listed.title, "Read");
    assert_eq!(listed.emoji, "📖");
    assert_eq!(listed.reminder_time.to_string(), "09:00");

    // A fresh registry sees it on load.
    let mut other = HabitRegistry::new(app.remote.clone(), Arc::new(MemoryCache::new()), app.notifier.clone());
    other.load("u1").await.unwrap();
    assert_eq!(other.habits().len(), 1);
    assert_eq!(other.habits()[0].id, habit.id);
}

#[tokio::test]
async fn test_delete_cancels_exactly_once() {
    let mut app = app();
    let habit = app
        .habits
        .create(Some("u1"), new_habit("Read", "📖", "09:00"))
        .await
        .unwrap();

    app.habits.delete(&habit.id).await.unwrap();

    assert!(app.habits.habits().is_empty());
    assert_eq!(app.notifier.cancelled(), vec![habit.id]);
}

#[tokio::test]
async fn test_failed_delete_leaves_list_and_reminders() {
    let mut app = app();
    let habit = app
        .habits
        .create(Some("u1"), new_habit("Read", "📖", "09:00"))
        .await
        .unwrap();
    let before = app.habits.habits().to_vec();

    app.remote.set_failing(true);
    let err = app.habits.delete(&habit.id).await.unwrap_err();

    assert!(matches!(err, CoreError::Remote(_)));
    assert_eq!(app.habits.habits(), before.as_slice());
    assert!(app.notifier.cancelled().is_empty());
}

#[tokio::test]
async fn test_update_reschedules_with_new_title() {
    let mut app = app();
    let habit = app
        .habits
        .create(Some("u1"), new_habit("Read", "📖", "09:00"))
        .await
        .unwrap();

    app.habits
        .update(
            &habit.id,
            HabitUpdate {
                title: Some("Read 20 pages".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let calls = app.notifier.calls();
    assert_eq!(calls.len(), 2);
    match &calls[1] {
        NotifierCall::Schedule(r) => {
            assert_eq!(r.title, "📖 Read 20 pages");
            assert_eq!(r.identifier, format!("habit_{}", habit.id));
        }
        other => panic!("unexpected call: {other:?}"),
    }
}

#[tokio::test]
async fn test_streak_and_toggle_round_trip() {
    let mut app = app();
    let habit = app
        .habits
        .create(Some("u1"), new_habit("Run", "🏃", "07:00"))
        .await
        .unwrap();
    app.log.refresh_at("u1", today()).await.unwrap();

    for back in 0..3 {
        app.log
            .toggle_completion(&habit.id, today() - Duration::days(back))
            .await
            .unwrap();
    }
    assert_eq!(app.log.streak_length_at(&habit.id, today()), 3);
    assert_eq!(app.log.weekly_stats_at(&habit.id, today()).percentage, 43);

    // Toggling today twice restores the same state.
    app.log.toggle_completion(&habit.id, today()).await.unwrap();
    assert_eq!(app.log.streak_length_at(&habit.id, today()), 0);
    app.log.toggle_completion(&habit.id, today()).await.unwrap();
    assert_eq!(app.log.streak_length_at(&habit.id, today()), 3);
    assert_eq!(app.log.logs().len(), 3);

    // The cache mirrors the toggles.
    let cached: Vec<habitrack_core::CompletionRecord> =
        cache::read_json(app.cache.as_ref(), "logs_u1").await.unwrap();
    assert_eq!(cached.len(), 3);
}

#[tokio::test]
async fn test_logs_reload_after_restart() {
    let mut app = app();
    let habit = app
        .habits
        .create(Some("u1"), new_habit("Run", "🏃", "07:00"))
        .await
        .unwrap();
    app.log.refresh_at("u1", today()).await.unwrap();
    app.log.toggle_completion(&habit.id, today()).await.unwrap();

    let mut fresh = CompletionLog::new(app.remote.clone(), Arc::new(MemoryCache::new()));
    fresh.refresh_at("u1", today()).await.unwrap();
    assert!(fresh.is_completed_on(&habit.id, today()));
    assert_eq!(fresh.completed_count_on(app.habits.habits(), today()), 1);
}

#[tokio::test]
async fn test_cached_state_survives_offline_start() {
    let mut app = app();
    app.habits
        .create(Some("u1"), new_habit("Read", "📖", "09:00"))
        .await
        .unwrap();

    app.remote.set_failing(true);
    let mut offline = HabitRegistry::new(app.remote.clone(), app.cache.clone(), app.notifier.clone());
    assert!(offline.load("u1").await.is_err());
    assert_eq!(offline.habits().len(), 1);
    assert!(offline.last_error().is_some());
}

#[tokio::test]
async fn test_overview_over_live_managers() {
    let mut app = app();
    let read = app
        .habits
        .create(Some("u1"), new_habit("Read", "📖", "09:00"))
        .await
        .unwrap();
    app.habits
        .create(Some("u1"), new_habit("Run", "🏃", "07:00"))
        .await
        .unwrap();
    app.log.refresh_at("u1", today()).await.unwrap();
    app.log.toggle_completion(&read.id, today()).await.unwrap();

    let overview = Overview::compute_at(app.habits.habits(), &app.log, today());
    assert_eq!(overview.total_habits, 2);
    assert_eq!(overview.weekly_completed, 1);
    assert_eq!(overview.weekly_possible, 14);
    assert_eq!(overview.weekly_percentage, 7);
    assert_eq!(overview.longest_streak, 1);
    assert_eq!(overview.active_streaks, 1);
}

#[tokio::test]
async fn test_profile_initials_and_immutable_email() {
    let mut app = app();
    app.remote.seed(
        tables::USERS,
        vec![json!({
            "id": "u1", "email": "abc@x.com", "full_name": null,
            "timezone": null, "created_at": "2026-01-05T00:00:00Z", "updated_at": null
        })],
    );
    app.profile.load("u1").await.unwrap();
    assert_eq!(app.profile.initials(), "A");
    assert_eq!(app.profile.display_name(), "abc");

    let updated = app
        .profile
        .update(Some("u1"), ProfileUpdate::default().with_full_name("Jane Doe"))
        .await
        .unwrap();
    assert_eq!(updated.email, "abc@x.com");
    assert_eq!(app.profile.initials(), "JD");
}
