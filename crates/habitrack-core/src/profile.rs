//! Profile store: the signed-in user's `users` row.

use std::sync::Arc;

use crate::error::{CoreError, RemoteError, Result};
use crate::model::{Profile, ProfileInsert, ProfileUpdate, DEFAULT_TIMEZONE};
use crate::remote::{self, tables, Query, RemoteStore};

/// Shown when a profile has neither a name nor an email.
pub const FALLBACK_NAME: &str = "User";

pub struct ProfileStore {
    remote: Arc<dyn RemoteStore>,
    profile: Option<Profile>,
    loading: bool,
    error: Option<String>,
}

impl ProfileStore {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            profile: None,
            loading: false,
            error: None,
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Fetch the profile row. A failure keeps whatever profile was loaded
    /// before (none on first load).
    pub async fn load(&mut self, user_id: &str) -> Result<()> {
        self.loading = true;
        let result = self.fetch(user_id).await;
        self.loading = false;

        match result {
            Ok(profile) => {
                self.profile = Some(profile);
                self.error = None;
                Ok(())
            }
            Err(e) => {
                tracing::error!(user_id, "error loading profile: {e}");
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn fetch(&self, user_id: &str) -> Result<Profile> {
        let rows = self
            .remote
            .select(tables::USERS, &Query::new().eq("id", user_id))
            .await?;
        let mut profiles: Vec<Profile> = remote::decode_rows(rows)?;
        if profiles.is_empty() {
            return Err(RemoteError::NotFound {
                table: tables::USERS.to_string(),
                id: user_id.to_string(),
            }
            .into());
        }
        Ok(profiles.swap_remove(0))
    }

    /// Insert the profile row for a newly registered identity.
    pub async fn create(&mut self, user_id: &str, email: &str) -> Result<Profile> {
        let row = remote::encode_row(&ProfileInsert {
            id: user_id,
            email,
            timezone: DEFAULT_TIMEZONE,
        })?;
        let stored = match self.remote.insert(tables::USERS, row).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(user_id, "error creating profile: {e}");
                return Err(e.into());
            }
        };
        let profile: Profile = serde_json::from_value(stored)?;
        tracing::info!(user_id, "profile created");
        self.profile = Some(profile.clone());
        Ok(profile)
    }

    pub async fn update(&mut self, user_id: Option<&str>, update: ProfileUpdate) -> Result<Profile> {
        let result = self.try_update(user_id, update).await;
        if let Err(e) = &result {
            tracing::error!("error updating profile: {e}");
        }
        result
    }

    async fn try_update(&mut self, user_id: Option<&str>, update: ProfileUpdate) -> Result<Profile> {
        let user_id = user_id.ok_or(CoreError::NotAuthenticated)?;
        let patch = remote::encode_row(&update)?;
        let stored = self.remote.update(tables::USERS, user_id, patch).await?;
        let profile: Profile = serde_json::from_value(stored)?;
        tracing::info!(user_id, "profile updated");
        self.profile = Some(profile.clone());
        Ok(profile)
    }

    /// Full name, else the local part of the email, else [`FALLBACK_NAME`].
    pub fn display_name(&self) -> String {
        display_name(self.profile.as_ref())
    }

    /// Up to two uppercase letters for an avatar.
    pub fn initials(&self) -> String {
        initials(self.profile.as_ref())
    }
}

pub fn display_name(profile: Option<&Profile>) -> String {
    let Some(profile) = profile else {
        return FALLBACK_NAME.to_string();
    };
    if let Some(name) = profile.full_name.as_deref().filter(|n| !n.trim().is_empty()) {
        return name.to_string();
    }
    match profile.email.split('@').next() {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => FALLBACK_NAME.to_string(),
    }
}

pub fn initials(profile: Option<&Profile>) -> String {
    let Some(profile) = profile else {
        return "?".to_string();
    };
    if let Some(name) = profile.full_name.as_deref().filter(|n| !n.trim().is_empty()) {
        return name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .flat_map(char::to_uppercase)
            .take(2)
            .collect();
    }
    match profile.email.chars().next() {
        Some(c) => c.to_uppercase().collect(),
        None => "?".to_string(),
    }
}
