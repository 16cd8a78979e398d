//! Authentication against the hosted GoTrue endpoint.
//!
//! The managers only ever see a user id; this module owns how that id is
//! obtained and kept between runs. Sessions are stored in the OS keyring.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::error::{CoreError, RemoteError, Result, ValidationError};
use crate::notify::Notifier;
use crate::profile::ProfileStore;
use crate::remote::postgrest::check;
use crate::remote::RemoteStore;

/// Minimum accepted password length at registration.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Seconds before expiry at which a session is treated as expired.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// Thin wrapper around the OS keyring for credential storage.
pub mod keyring_store {
    const SERVICE: &str = "habitrack";

    pub fn get(key: &str) -> Result<Option<String>, keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set(key: &str, value: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        entry.set_password(value)
    }

    pub fn delete(key: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp.
    pub expires_at: Option<i64>,
}

impl AuthSession {
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| Utc::now().timestamp() >= at - EXPIRY_BUFFER_SECS)
    }
}

/// Result of a registration. `session` is absent when the provider
/// requires the email address to be confirmed first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUp {
    pub user_id: String,
    pub email: String,
    pub session: Option<AuthSession>,
}

/// Registration form as filled in by the user.
#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignUpForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("email", self.email.trim()),
            ("password", self.password.as_str()),
            ("confirm_password", self.confirm_password.as_str()),
        ] {
            if value.is_empty() {
                return Err(ValidationError::Empty(field.into()));
            }
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::InvalidValue {
                field: "confirm_password".into(),
                message: "passwords do not match".into(),
            });
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::InvalidValue {
                field: "password".into(),
                message: format!("must be at least {MIN_PASSWORD_LEN} characters"),
            });
        }
        Ok(())
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp>;
    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession>;
    async fn sign_out(&self, access_token: &str) -> Result<()>;
}

/// Where the current session survives between runs.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<AuthSession>>;
    fn save(&self, session: &AuthSession) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Session kept as JSON under a single keyring entry.
#[derive(Debug, Clone)]
pub struct KeyringSessionStore {
    key: String,
}

impl KeyringSessionStore {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Default for KeyringSessionStore {
    fn default() -> Self {
        Self::new("session")
    }
}

fn keyring_error(e: keyring::Error) -> CoreError {
    CoreError::Credentials(e.to_string())
}

impl SessionStore for KeyringSessionStore {
    fn load(&self) -> Result<Option<AuthSession>> {
        let Some(raw) = keyring_store::get(&self.key).map_err(keyring_error)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!("discarding unreadable stored session: {e}");
                Ok(None)
            }
        }
    }

    fn save(&self, session: &AuthSession) -> Result<()> {
        let raw = serde_json::to_string(session)?;
        keyring_store::set(&self.key, &raw).map_err(keyring_error)
    }

    fn clear(&self) -> Result<()> {
        keyring_store::delete(&self.key).map_err(keyring_error)
    }
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<AuthSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<AuthSession>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<AuthSession>> {
        Ok(self.slot().clone())
    }

    fn save(&self, session: &AuthSession) -> Result<()> {
        *self.slot() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: GoTrueUser,
}

impl TokenResponse {
    fn into_session(self, fallback_email: &str) -> AuthSession {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| Utc::now().timestamp() + secs));
        AuthSession {
            user_id: self.user.id,
            email: self.user.email.unwrap_or_else(|| fallback_email.to_string()),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

/// Client for the `/auth/v1` endpoints of the hosted backend.
pub struct GoTrueClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl GoTrueClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url).map_err(|e| {
            RemoteError::Unavailable(format!("invalid backend url '{base_url}': {e}"))
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base_url,
            api_key: api_key.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(&format!("auth/v1/{path}"))
            .map_err(|e| RemoteError::Unavailable(e.to_string()).into())
    }

    async fn post(&self, url: Url, bearer: Option<&str>, body: Value) -> Result<Value> {
        tracing::debug!(%url, "auth request");
        let resp = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer.unwrap_or(&self.api_key))
            .json(&body)
            .send()
            .await?;
        let resp = check(resp).await?;
        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn token(&self, grant_type: &str, body: Value, email: &str) -> Result<AuthSession> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        let value = self.post(url, None, body).await?;
        let token: TokenResponse = serde_json::from_value(value)?;
        Ok(token.into_session(email))
    }
}

#[async_trait]
impl AuthProvider for GoTrueClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        self.token("password", json!({"email": email, "password": password}), email)
            .await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp> {
        let url = self.endpoint("signup")?;
        let value = self
            .post(url, None, json!({"email": email, "password": password}))
            .await?;

        // With auto-confirm the response is a full session; otherwise it is
        // the bare user object.
        if value.get("access_token").is_some() {
            let session = serde_json::from_value::<TokenResponse>(value)?.into_session(email);
            return Ok(SignUp {
                user_id: session.user_id.clone(),
                email: session.email.clone(),
                session: Some(session),
            });
        }
        let user: GoTrueUser = serde_json::from_value(value)?;
        Ok(SignUp {
            user_id: user.id,
            email: user.email.unwrap_or_else(|| email.to_string()),
            session: None,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession> {
        self.token("refresh_token", json!({"refresh_token": refresh_token}), "")
            .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let url = self.endpoint("logout")?;
        self.post(url, Some(access_token), json!({})).await?;
        Ok(())
    }
}

/// The signed-in identity, if any.
pub struct AuthState {
    provider: Arc<dyn AuthProvider>,
    sessions: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
    session: Option<AuthSession>,
    loading: bool,
}

impl AuthState {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        sessions: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            provider,
            sessions,
            notifier,
            session: None,
            loading: false,
        }
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id.as_str())
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Pick up the stored session, refreshing it when it has expired.
    /// An expired session that cannot be refreshed is dropped.
    pub async fn restore(&mut self) -> Result<Option<&AuthSession>> {
        self.loading = true;
        let stored = self.sessions.load();
        let result = match stored {
            Ok(Some(session)) if session.is_expired() => self.refreshed(session).await,
            Ok(session) => Ok(session),
            Err(e) => Err(e),
        };
        self.loading = false;
        self.session = result?;
        Ok(self.session.as_ref())
    }

    async fn refreshed(&self, expired: AuthSession) -> Result<Option<AuthSession>> {
        let Some(refresh_token) = expired.refresh_token.as_deref() else {
            self.sessions.clear()?;
            return Ok(None);
        };
        match self.provider.refresh(refresh_token).await {
            Ok(mut session) => {
                if session.email.is_empty() {
                    session.email = expired.email.clone();
                }
                self.sessions.save(&session)?;
                tracing::info!(user_id = %session.user_id, "session refreshed");
                Ok(Some(session))
            }
            Err(e) => {
                tracing::warn!("session refresh failed, signing out: {e}");
                self.sessions.clear()?;
                Ok(None)
            }
        }
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<AuthSession> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ValidationError::Empty("email".into()).into());
        }
        if password.is_empty() {
            return Err(ValidationError::Empty("password".into()).into());
        }

        self.loading = true;
        let result = self.provider.sign_in(email, password).await;
        self.loading = false;

        let session = result.inspect_err(|e| tracing::error!("sign in failed: {e}"))?;
        self.sessions.save(&session)?;
        tracing::info!(user_id = %session.user_id, "signed in");
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Register a new identity and create its profile row.
    ///
    /// `remote_for` builds the store used for the profile insert, given the
    /// new session when the provider returned one.
    pub async fn sign_up<F>(&mut self, form: &SignUpForm, remote_for: F) -> Result<SignUp>
    where
        F: FnOnce(Option<&AuthSession>) -> Arc<dyn RemoteStore>,
    {
        form.validate()?;
        let email = form.email.trim();

        self.loading = true;
        let result = self.provider.sign_up(email, &form.password).await;
        self.loading = false;

        let signed_up = result.inspect_err(|e| tracing::error!("sign up failed: {e}"))?;
        tracing::info!(user_id = %signed_up.user_id, "signed up");

        let remote = remote_for(signed_up.session.as_ref());
        ProfileStore::new(remote)
            .create(&signed_up.user_id, &signed_up.email)
            .await?;

        if let Some(session) = &signed_up.session {
            self.sessions.save(session)?;
            self.session = Some(session.clone());
        }
        Ok(signed_up)
    }

    /// Cancel every reminder, end the remote session and forget it locally.
    pub async fn sign_out(&mut self) -> Result<()> {
        if let Err(e) = self.notifier.cancel_all().await {
            tracing::warn!("failed to cancel reminders on sign out: {e}");
        }
        if let Some(session) = self.session.take() {
            if let Err(e) = self.provider.sign_out(&session.access_token).await {
                tracing::warn!("remote sign out failed: {e}");
            }
        }
        self.sessions.clear()?;
        tracing::info!("signed out");
        Ok(())
    }
}
