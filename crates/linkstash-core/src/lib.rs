//! linkstash-core - Core library for linkstash
//!
//! This crate contains the models, the local cache and remote store
//! adapters, authentication, and the sync engine that reconciles posts and
//! tags between them. The CLI is a thin shell over it.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Post, PostId, Tag, TagId, TagRef};
pub use sync::{SyncManager, SyncOutcome};
