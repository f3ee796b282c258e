//! Database layer backing the relational remote store

mod connection;
mod migrations;

pub use connection::{Database, DatabaseLocation};
