//! Identity and session provider.
//!
//! The sync engine only consumes [`IdentityProvider`]. [`SessionManager`]
//! backs it with a persisted Supabase session that is refreshed through
//! [`AuthClient`] once it passes its expiry; [`StaticIdentity`] serves
//! offline use and tests.

use std::fmt;
use std::future::Future;
use std::sync::RwLock;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{normalize_text_option, unix_timestamp_now};

const EXPIRY_SKEW_SECONDS: i64 = 60;

/// The authenticated owner all stored data is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: Identity,
}

impl Session {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Supabase auth is not configured for this build.")]
    NotConfigured,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Session storage error: {0}")]
    SessionStorage(String),
    #[error("No session to refresh")]
    NoSession,
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Identity/session queries consumed by the sync engine
pub trait IdentityProvider: Send + Sync {
    /// The signed-in identity, if any
    fn current_identity(&self) -> Option<Identity>;

    /// The current session, if this provider is session-backed
    fn current_session(&self) -> Option<Session>;

    /// Obtain a fresh session; called when the current one is past expiry
    fn refresh_session(&self) -> impl Future<Output = AuthResult<Session>> + Send;
}

/// A fixed identity with no session, for offline mode and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIdentity(Option<Identity>);

impl StaticIdentity {
    pub fn new(identity: Identity) -> Self {
        Self(Some(identity))
    }

    /// A provider with nobody signed in
    pub const fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_identity(&self) -> Option<Identity> {
        self.0.clone()
    }

    fn current_session(&self) -> Option<Session> {
        None
    }

    async fn refresh_session(&self) -> AuthResult<Session> {
        Err(AuthError::NoSession)
    }
}

/// Where a session survives between runs (keychain, file, memory)
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<Session>>;
    fn save_session(&self, session: &Session) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Session-backed [`IdentityProvider`]
pub struct SessionManager<S: SessionPersistence> {
    client: AuthClient,
    store: S,
    current: RwLock<Option<Session>>,
}

impl<S: SessionPersistence> SessionManager<S> {
    /// Load the persisted session (if any) without touching the network
    pub fn new(client: AuthClient, store: S) -> AuthResult<Self> {
        let current = store.load_session()?;
        Ok(Self {
            client,
            store,
            current: RwLock::new(current),
        })
    }

    /// Sign in with email/password and persist the session
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session> {
        let session = self.client.sign_in(email, password).await?;
        self.store.save_session(&session)?;
        self.replace(Some(session.clone()));
        Ok(session)
    }

    /// Revoke and forget the current session
    pub async fn sign_out(&self) -> AuthResult<()> {
        if let Some(session) = self.current_session() {
            self.client.sign_out(&session.access_token).await?;
        }
        self.store.clear_session()?;
        self.replace(None);
        Ok(())
    }

    fn replace(&self, session: Option<Session>) {
        match self.current.write() {
            Ok(mut guard) => *guard = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }
}

impl<S: SessionPersistence> IdentityProvider for SessionManager<S> {
    fn current_identity(&self) -> Option<Identity> {
        self.current_session().map(|session| session.user)
    }

    fn current_session(&self) -> Option<Session> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn refresh_session(&self) -> AuthResult<Session> {
        let refresh_token = self
            .current_session()
            .map(|session| session.refresh_token)
            .ok_or(AuthError::NoSession)?;

        match self.client.refresh_session(&refresh_token).await {
            Ok(session) => {
                self.store.save_session(&session)?;
                self.replace(Some(session.clone()));
                Ok(session)
            }
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                self.replace(None);
                Err(error)
            }
        }
    }
}

/// Minimal Supabase GoTrue client
#[derive(Clone)]
pub struct AuthClient {
    auth_url: String,
    anon_key: String,
    client: Client,
}

impl AuthClient {
    pub fn new(url: impl AsRef<str>, anon_key: impl Into<String>) -> AuthResult<Self> {
        let auth_url = normalize_auth_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Supabase anon key must not be empty",
            ));
        }

        Ok(Self {
            auth_url,
            anon_key,
            client: Client::builder().build()?,
        })
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email,
            "password": password,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "password")])
                .json(&payload),
        );

        self.send_auth_request(request).await?.into_session()?.ok_or_else(|| {
            AuthError::Api("Sign-in response did not include an active session".to_string())
        })
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<Session> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        let payload = serde_json::json!({
            "refresh_token": refresh_token,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "refresh_token")])
                .json(&payload),
        );
        self.send_auth_request(request).await?.into_session()?.ok_or_else(|| {
            AuthError::Api("Refresh response did not include an active session".to_string())
        })
    }

    pub async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let request = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);

        let response = request.send().await?;
        if !(response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED) {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(())
    }

    fn public_request(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    async fn send_auth_request(&self, request: RequestBuilder) -> AuthResult<AuthResponse> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<AuthResponse>().await?)
    }
}

pub fn normalize_auth_url(url: &str) -> AuthResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must not be empty",
        ));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    }
    if trimmed.ends_with("/auth/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/auth/v1"))
    }
}

/// Both values or neither; a half-configured pair is an error.
pub fn resolve_optional_supabase_config(
    url: Option<String>,
    anon_key: Option<String>,
) -> AuthResult<Option<(String, String)>> {
    let url = normalize_text_option(url);
    let anon_key = normalize_text_option(anon_key);

    match (url, anon_key) {
        (None, None) => Ok(None),
        (Some(url), Some(anon_key)) => Ok(Some((url, anon_key))),
        _ => Err(AuthError::NotConfigured),
    }
}

fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() {
        return Err(AuthError::Api("Email is required".to_string()));
    }
    if password.trim().is_empty() {
        return Err(AuthError::Api("Password is required".to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<AuthResponseUser>,
}

impl AuthResponse {
    fn into_session(self) -> AuthResult<Option<Session>> {
        let expires_at = self.expires_at.or_else(|| {
            self.expires_in
                .map(|expires_in| unix_timestamp_now().saturating_add(expires_in))
        });

        match (
            self.access_token,
            self.refresh_token,
            expires_at,
            self.user.map(Identity::from),
        ) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(Session {
                    access_token,
                    refresh_token,
                    expires_at,
                    user,
                }))
            }
            (None, None, None, Some(_)) => Ok(None),
            _ => Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponseUser {
    id: String,
    email: Option<String>,
}

impl From<AuthResponseUser> for Identity {
    fn from(value: AuthResponseUser) -> Self {
        Self {
            id: value.id,
            email: value.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<AuthErrorResponse>(body) {
        if let Some(message) = payload
            .message
            .or(payload.msg)
            .or(payload.error_description)
            .or(payload.error)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
