use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use linkstash_core::auth::{Identity, IdentityProvider};
use linkstash_core::config::ClientConfig;
use linkstash_core::db::{Database, DatabaseLocation};
use linkstash_core::models::{normalize_tags, NormalizedTag, Post, TagRef};
use linkstash_core::remote::LibSqlRemoteStore;
use linkstash_core::store::{JsonFileStore, LocalStore};
use linkstash_core::sync::{SyncManager, SyncStatus};
use linkstash_core::util::{natural_key, normalize_text_option};
use serde::Serialize;

use crate::auth::CliIdentity;
use crate::cli::GlobalArgs;
use crate::error::CliError;

pub type CliSyncManager = SyncManager<JsonFileStore, LibSqlRemoteStore, CliIdentity>;

const CONFIG_FILE_NAME: &str = "config.json";
const STATUS_FILE_NAME: &str = "sync-status.json";
const MAX_PERSISTED_ERRORS: usize = 100;

pub const ENV_REMOTE_URL: &str = "LINKSTASH_REMOTE_URL";
pub const ENV_REMOTE_TOKEN: &str = "LINKSTASH_REMOTE_TOKEN";
pub const ENV_USER: &str = "LINKSTASH_USER";
pub const ENV_CONFIG: &str = "LINKSTASH_CONFIG";

/// Everything a command needs, resolved from flags, env and the config file
pub struct Context {
    pub config: ClientConfig,
    pub cache_dir: PathBuf,
    pub remote_db: Option<PathBuf>,
    pub user: Option<String>,
}

impl Context {
    pub fn load(global: &GlobalArgs) -> Result<Self, CliError> {
        let config_path = global
            .config
            .clone()
            .or_else(|| env::var_os(ENV_CONFIG).map(PathBuf::from))
            .map_or_else(default_config_path, Ok)?;
        let config = ClientConfig::load(&config_path)?;
        let config = apply_env_overrides(config, |key| env::var(key).ok());
        Self::from_parts(global, config, |key| env::var(key).ok())
    }

    pub fn from_parts(
        global: &GlobalArgs,
        config: ClientConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CliError> {
        let cache_dir = match global.cache_dir.clone().or_else(|| config.cache_dir.clone()) {
            Some(dir) => dir,
            None => default_cache_dir()?,
        };
        let user = normalize_text_option(global.user.clone())
            .or_else(|| normalize_text_option(lookup(ENV_USER)));
        Ok(Self {
            config,
            cache_dir,
            remote_db: global.remote_db.clone(),
            user,
        })
    }

    pub fn store(&self) -> JsonFileStore {
        JsonFileStore::new(&self.cache_dir)
    }

    pub fn identity_provider(&self) -> Result<CliIdentity, CliError> {
        Ok(CliIdentity::resolve(self.user.clone(), &self.config)?)
    }

    /// The identity whose cache commands read; never touches the network
    pub fn identity(&self) -> Result<Identity, CliError> {
        self.identity_provider()?
            .current_identity()
            .ok_or(CliError::NotSignedIn)
    }

    pub fn remote_location(&self) -> Result<Option<DatabaseLocation>, CliError> {
        if let Some(path) = &self.remote_db {
            return Ok(Some(DatabaseLocation::File(path.display().to_string())));
        }
        match self.config.remote() {
            Some((url, token)) => Ok(Some(DatabaseLocation::from_url(&url, token)?)),
            None => Ok(None),
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote_db.is_some() || self.config.remote().is_some()
    }

    /// Build a sync manager over the configured remote
    pub async fn manager(&self) -> Result<Arc<CliSyncManager>, CliError> {
        let provider = self.identity_provider()?;
        let identity = provider
            .current_identity()
            .ok_or(CliError::NotSignedIn)?;
        let location = self
            .remote_location()?
            .ok_or(CliError::SyncNotConfigured)?;
        if let DatabaseLocation::File(path) = &location {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let database = Database::open_location(location).await?;
        let remote = LibSqlRemoteStore::new(Arc::new(database), identity.id);
        Ok(Arc::new(SyncManager::new(
            self.store(),
            remote,
            provider,
            self.config.sync,
        )))
    }

    pub fn status_path(&self) -> PathBuf {
        self.cache_dir.join(STATUS_FILE_NAME)
    }

    pub fn load_status(&self) -> Result<Option<SyncStatus>, CliError> {
        let path = self.status_path();
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Persist the manager's status so later invocations can report it.
    /// Earlier errors are kept, newest last.
    pub fn save_status(&self, manager: &CliSyncManager) -> Result<(), CliError> {
        let mut status = manager.status();
        if let Some(previous) = self.load_status()? {
            let mut log = previous.state.error_log;
            log.append(&mut status.state.error_log);
            let overflow = log.len().saturating_sub(MAX_PERSISTED_ERRORS);
            log.drain(..overflow);
            status.state.error_log = log;
            if status.state.last_sync_time.is_none() {
                status.state.last_sync_time = previous.state.last_sync_time;
            }
        }
        std::fs::create_dir_all(&self.cache_dir)?;
        std::fs::write(self.status_path(), serde_json::to_vec_pretty(&status)?)?;
        Ok(())
    }
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("linkstash").join(CONFIG_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve config directory".to_string()))
}

pub fn default_cache_dir() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("linkstash").join("cache"))
        .ok_or_else(|| CliError::Config("Failed to resolve data directory".to_string()))
}

/// Remote URL and token from the environment replace the file values
pub fn apply_env_overrides(
    mut config: ClientConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> ClientConfig {
    if let Some(url) = normalize_text_option(lookup(ENV_REMOTE_URL)) {
        config.remote_url = Some(url);
    }
    if let Some(token) = normalize_text_option(lookup(ENV_REMOTE_TOKEN)) {
        config.remote_auth_token = Some(token);
    }
    config
}

/// Parse `NAME` or `NAME:COLOR`
pub fn parse_tag_arg(raw: &str) -> Result<TagRef, CliError> {
    let (name, color) = match raw.split_once(':') {
        Some((name, color)) => (name.trim(), Some(color.trim())),
        None => (raw.trim(), None),
    };
    if name.is_empty() {
        return Err(CliError::InvalidTag(raw.to_string()));
    }
    match color {
        None => Ok(TagRef::Name(name.to_string())),
        Some("") => Err(CliError::InvalidTag(raw.to_string())),
        Some(color) => Ok(TagRef::Object {
            name: name.to_string(),
            color: Some(color.to_string()),
            id: None,
        }),
    }
}

pub fn validate_url(raw: &str) -> Result<String, CliError> {
    let url = raw.trim();
    let host = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match host {
        Some(host) if !host.is_empty() && !host.contains(char::is_whitespace) => {
            Ok(url.to_string())
        }
        _ => Err(CliError::InvalidUrl(raw.to_string())),
    }
}

#[derive(Debug, Serialize)]
pub struct PostListItem {
    pub id: Option<String>,
    pub url: String,
    pub platform: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub updated_at: Option<i64>,
    pub synced: bool,
}

pub fn post_to_list_item(post: &Post) -> PostListItem {
    PostListItem {
        id: post.id.map(|id| id.to_string()),
        url: post.url.clone(),
        platform: post.platform.to_string(),
        title: post.title.clone(),
        description: post.description.clone(),
        tags: post_tag_names(post),
        updated_at: post.updated_at,
        synced: post.synced,
    }
}

pub fn post_tag_names(post: &Post) -> Vec<String> {
    normalize_tags(&post.tags)
        .into_iter()
        .map(|tag| tag.name)
        .collect()
}

pub fn filter_by_tag(posts: Vec<Post>, tag: Option<&str>) -> Vec<Post> {
    let Some(tag) = tag.map(natural_key).filter(|tag| !tag.is_empty()) else {
        return posts;
    };
    posts
        .into_iter()
        .filter(|post| post_tag_names(post).contains(&tag))
        .collect()
}

/// Cached tags plus any tag only mentioned on a post, sorted by name
pub fn collect_tags(
    store: &impl LocalStore,
    identity: &Identity,
) -> Result<Vec<NormalizedTag>, CliError> {
    let cached: Vec<TagRef> = store.load_tags(identity)?.iter().map(TagRef::from).collect();
    let posts = store.load_posts(identity)?;
    let mut tags = normalize_tags(
        cached
            .iter()
            .chain(posts.iter().flat_map(|post| post.tags.iter())),
    );
    tags.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(tags)
}

pub fn format_post_lines(posts: &[Post]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    posts
        .iter()
        .map(|post| {
            let marker = if post.synced { ' ' } else { '*' };
            let label = if post.title.is_empty() {
                post.url.clone()
            } else {
                format!("{} <{}>", post.title, post.url)
            };
            let age = format_relative_time(post.freshness(), now_ms);
            let tags = post_tag_names(post);
            if tags.is_empty() {
                format!("{marker} [{}] {label} ({age})", post.platform)
            } else {
                format!(
                    "{marker} [{}] {label} ({age}) #{}",
                    post.platform,
                    tags.join(" #")
                )
            }
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map_or_else(|| timestamp_ms.to_string(), |time| time.to_rfc3339())
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let elapsed_seconds = now_ms.saturating_sub(timestamp_ms).max(0) / 1000;
    if elapsed_seconds < 60 {
        return "just now".to_string();
    }
    let minutes = elapsed_seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    format!("{}d ago", hours / 24)
}
