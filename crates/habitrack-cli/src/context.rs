//! Wiring of the core managers to the hosted backend and device storage.

use std::sync::Arc;

use habitrack_core::auth::KeyringSessionStore;
use habitrack_core::{
    AuthSession, AuthState, CompletionLog, Config, CoreError, Database, GoTrueClient,
    HabitRegistry, LocalCache, MemoryCache, NoopNotifier, Notifier, PostgrestStore,
    ProfileStore, RemoteStore, ReminderBook, SqliteCache,
};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Keep rendering from the cache when a refresh fails. Returns whether the
/// data shown is fresh.
pub fn keep_cached(what: &str, result: Result<(), CoreError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("{what} refresh failed, showing cached data: {e}");
            eprintln!("showing cached {what}: {}", e.user_message());
            false
        }
    }
}

pub struct AppContext {
    pub config: Config,
    pub cache: Arc<dyn LocalCache>,
    pub notifier: Arc<dyn Notifier>,
    pub auth: AuthState,
}

impl AppContext {
    pub fn new(config: Config) -> CliResult<Self> {
        let cache: Arc<dyn LocalCache> = if config.cache.enabled {
            Arc::new(SqliteCache::new(Database::open()?))
        } else {
            Arc::new(MemoryCache::new())
        };
        let notifier: Arc<dyn Notifier> = if config.notifications.enabled {
            Arc::new(ReminderBook::new(Database::open()?))
        } else {
            Arc::new(NoopNotifier)
        };
        tracing::debug!(
            cache = config.cache.enabled,
            notifications = config.notifications.enabled,
            "opening device storage"
        );
        let provider = GoTrueClient::new(&config.backend_url()?, &config.anon_key()?)?;
        let auth = AuthState::new(
            Arc::new(provider),
            Arc::new(KeyringSessionStore::default()),
            notifier.clone(),
        );
        Ok(Self {
            config,
            cache,
            notifier,
            auth,
        })
    }

    /// Store speaking as the anonymous role.
    pub fn store(&self) -> CliResult<PostgrestStore> {
        Ok(PostgrestStore::new(&self.config.backend_url()?, &self.config.anon_key()?)?)
    }

    /// Store authenticated as `session`, or as the anonymous role.
    pub fn remote(&self, session: Option<&AuthSession>) -> CliResult<Arc<dyn RemoteStore>> {
        let store = self.store()?;
        let store = match session {
            Some(session) => store.with_access_token(session.access_token.clone()),
            None => store,
        };
        Ok(Arc::new(store))
    }

    /// Restore the stored session and return its user id.
    pub async fn require_user(&mut self) -> CliResult<String> {
        match self.auth.restore().await? {
            Some(session) => Ok(session.user_id.clone()),
            None => Err(CoreError::NotAuthenticated.into()),
        }
    }

    fn user_remote(&self) -> CliResult<Arc<dyn RemoteStore>> {
        self.remote(self.auth.session())
    }

    pub fn habits(&self) -> CliResult<HabitRegistry> {
        Ok(HabitRegistry::new(
            self.user_remote()?,
            self.cache.clone(),
            self.notifier.clone(),
        ))
    }

    pub fn completion_log(&self) -> CliResult<CompletionLog> {
        Ok(CompletionLog::new(self.user_remote()?, self.cache.clone()))
    }

    pub fn profile(&self) -> CliResult<ProfileStore> {
        Ok(ProfileStore::new(self.user_remote()?))
    }
}
