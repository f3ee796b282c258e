//! Database connection management

use crate::error::{Error, Result};
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;

use super::migrations;

/// Where the relational store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// Local `SQLite` file
    File(String),
    /// Process-private in-memory database
    Memory,
    /// Remote libSQL server (e.g. `libsql://your-db.turso.io`)
    Remote { url: String, auth_token: String },
}

impl DatabaseLocation {
    /// Interpret a configured URL: `file:` paths open locally, anything else
    /// is treated as a remote server.
    pub fn from_url(url: &str, auth_token: Option<String>) -> Result<Self> {
        let url = url.trim();
        if let Some(path) = url.strip_prefix("file:") {
            return Ok(if path == ":memory:" {
                Self::Memory
            } else {
                Self::File(path.to_string())
            });
        }
        let auth_token = auth_token
            .ok_or_else(|| Error::InvalidInput("Auth token is required for remote_url".into()))?;
        Ok(Self::Remote {
            url: url.to_string(),
            auth_token,
        })
    }
}

/// Database wrapper for libSQL connections
pub struct Database {
    _db: LibSqlDatabase,
    conn: Connection,
    is_remote: bool,
}

impl Database {
    /// Open a database at `location`, running migrations
    pub async fn open_location(location: DatabaseLocation) -> Result<Self> {
        match location {
            DatabaseLocation::File(path) => Self::open(path).await,
            DatabaseLocation::Memory => Self::open_in_memory().await,
            DatabaseLocation::Remote { url, auth_token } => {
                Self::open_remote(url, auth_token).await
            }
        }
    }

    /// Open a local database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        Self::finish(db, false).await
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::finish(db, false).await
    }

    /// Open a remote libSQL database; every statement is a network round trip
    pub async fn open_remote(url: impl Into<String>, auth_token: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::InvalidInput("Remote URL is required".into()));
        }
        tracing::debug!("Connecting to remote database {}", url);
        let db = Builder::new_remote(url, auth_token.into()).build().await?;
        Self::finish(db, true).await
    }

    async fn finish(db: LibSqlDatabase, is_remote: bool) -> Result<Self> {
        let conn = db.connect()?;
        let database = Self {
            _db: db,
            conn,
            is_remote,
        };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    async fn configure(&self) -> Result<()> {
        if self.is_remote {
            return Ok(());
        }
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Whether this database is reached over the network
    pub const fn is_remote(&self) -> bool {
        self.is_remote
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
