pub mod add;
pub mod auth_cmd;
pub mod common;
pub mod completions;
pub mod list;
pub mod status;
pub mod sync;
pub mod tags;
