//! Keychain-backed session persistence and the CLI identity provider.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use linkstash_core::auth::{
    resolve_optional_supabase_config, AuthClient, AuthError, AuthResult, Identity,
    IdentityProvider, Session, SessionManager, SessionPersistence, StaticIdentity,
};
use linkstash_core::config::ClientConfig;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "linkstash-cli";

/// Stores the Supabase session as JSON in the OS keychain
#[derive(Clone)]
pub struct KeyringSessionStore {
    username: String,
}

impl KeyringSessionStore {
    pub fn new(auth_url: &str) -> Self {
        Self {
            username: format!("supabase_session:{auth_url}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::SessionStorage(error.to_string()))
    }
}

impl SessionPersistence for KeyringSessionStore {
    #[cfg(not(test))]
    fn load_session(&self) -> AuthResult<Option<Session>> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SessionStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load_session(&self) -> AuthResult<Option<Session>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SessionStorage(error.to_string()))?;
        match guard.get(&self.username) {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    #[cfg(not(test))]
    fn save_session(&self, session: &Session) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::SessionStorage(error.to_string()))
    }

    #[cfg(test)]
    fn save_session(&self, session: &Session) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        Self::test_store()
            .lock()
            .map_err(|error| AuthError::SessionStorage(error.to_string()))?
            .insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_session(&self) -> AuthResult<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SessionStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear_session(&self) -> AuthResult<()> {
        Self::test_store()
            .lock()
            .map_err(|error| AuthError::SessionStorage(error.to_string()))?
            .remove(&self.username);
        Ok(())
    }
}

/// Session manager for the configured Supabase project, if there is one
pub fn session_manager(
    config: &ClientConfig,
) -> AuthResult<Option<SessionManager<KeyringSessionStore>>> {
    let Some((url, anon_key)) = resolve_optional_supabase_config(
        config.supabase_url.clone(),
        config.supabase_anon_key.clone(),
    )?
    else {
        return Ok(None);
    };
    let client = AuthClient::new(&url, anon_key)?;
    Ok(Some(SessionManager::new(
        client,
        KeyringSessionStore::new(&url),
    )?))
}

/// Who the CLI acts as: a fixed offline user or a signed-in session
pub enum CliIdentity {
    Static(StaticIdentity),
    Session(SessionManager<KeyringSessionStore>),
}

impl CliIdentity {
    /// `--user` wins; otherwise the stored session, if any
    pub fn resolve(user: Option<String>, config: &ClientConfig) -> AuthResult<Self> {
        if let Some(user) = user {
            return Ok(Self::Static(StaticIdentity::new(Identity::new(user))));
        }
        match session_manager(config)? {
            Some(manager) if manager.current_session().is_some() => Ok(Self::Session(manager)),
            _ => Ok(Self::Static(StaticIdentity::anonymous())),
        }
    }
}

impl IdentityProvider for CliIdentity {
    fn current_identity(&self) -> Option<Identity> {
        match self {
            Self::Static(identity) => identity.current_identity(),
            Self::Session(manager) => manager.current_identity(),
        }
    }

    fn current_session(&self) -> Option<Session> {
        match self {
            Self::Static(identity) => identity.current_session(),
            Self::Session(manager) => manager.current_session(),
        }
    }

    async fn refresh_session(&self) -> AuthResult<Session> {
        match self {
            Self::Static(identity) => identity.refresh_session().await,
            Self::Session(manager) => manager.refresh_session().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_user_is_a_static_identity() {
        let identity = CliIdentity::resolve(Some("alice".to_string()), &ClientConfig::default())
            .unwrap();
        assert_eq!(identity.current_identity(), Some(Identity::new("alice")));
        assert!(identity.current_session().is_none());
    }

    #[test]
    fn no_user_and_no_auth_config_is_anonymous() {
        let identity = CliIdentity::resolve(None, &ClientConfig::default()).unwrap();
        assert!(identity.current_identity().is_none());
    }

    #[test]
    fn stored_session_round_trips_through_the_store() {
        let store = KeyringSessionStore::new("https://round-trip.supabase.co/auth/v1");
        let session = Session {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: 1_700_000_000,
            user: Identity::new("user"),
        };

        store.save_session(&session).unwrap();
        assert_eq!(store.load_session().unwrap(), Some(session));
        store.clear_session().unwrap();
        assert_eq!(store.load_session().unwrap(), None);
    }

    #[test]
    fn half_configured_supabase_is_rejected() {
        let config = ClientConfig {
            supabase_url: Some("https://demo.supabase.co".to_string()),
            ..ClientConfig::default()
        };
        assert!(session_manager(&config).is_err());
    }
}
