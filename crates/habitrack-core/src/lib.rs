//! # Habitrack Core Library
//!
//! Business logic for the Habitrack habit tracker. Persistence and
//! authentication live on a hosted backend; this crate keeps the per-user
//! state in memory, mirrors it to a local cache and drives daily reminders.
//! The `habitrack` CLI is a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Managers**: [`HabitRegistry`], [`CompletionLog`] and [`ProfileStore`]
//!   each own one slice of user state. They share nothing but the user id.
//! - **Collaborators**: [`RemoteStore`], [`LocalCache`] and [`Notifier`] are
//!   async traits injected as `Arc<dyn _>`, with hosted, SQLite and
//!   in-memory backends.
//! - **Auth**: [`AuthState`] signs users in through a [`GoTrueClient`] and
//!   keeps the session in the OS keyring.
//! - **Storage**: SQLite cache and reminder tables, TOML configuration.

pub mod auth;
pub mod cache;
pub mod completion;
pub mod error;
pub mod habits;
pub mod model;
pub mod notify;
pub mod profile;
pub mod remote;
pub mod stats;
pub mod storage;

pub use auth::{AuthProvider, AuthSession, AuthState, GoTrueClient, SessionStore, SignUp, SignUpForm};
pub use cache::{LocalCache, MemoryCache, SqliteCache};
pub use completion::{CompletionLog, WeeklyStats};
pub use error::{ConfigError, CoreError, RemoteError, ValidationError};
pub use habits::HabitRegistry;
pub use model::{CompletionRecord, Habit, HabitUpdate, NewHabit, Profile, ProfileUpdate, ReminderTime};
pub use notify::{NoopNotifier, Notifier, RecordingNotifier, ReminderBook};
pub use profile::ProfileStore;
pub use remote::{MemoryStore, PostgrestStore, Query, RemoteStore};
pub use stats::{greeting, HabitSummary, Overview};
pub use storage::{Config, Database};
