use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] linkstash_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Not a valid http(s) URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid tag '{0}'; use NAME or NAME:COLOR")]
    InvalidTag(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(#[from] linkstash_core::auth::AuthError),
    #[error("Not signed in. Run `linkstash login`, or pass --user for offline mode.")]
    NotSignedIn,
    #[error(
        "Sync is not configured. Pass --remote-db, set remote_url in the config file, or set LINKSTASH_REMOTE_URL and LINKSTASH_REMOTE_TOKEN."
    )]
    SyncNotConfigured,
}
