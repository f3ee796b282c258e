//! linkstash CLI - save, tag and sync links from the terminal
//!
//! Every command works against the local cache; `add` and `sync` also talk
//! to the remote store when one is configured.

mod auth;
mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::{run_add, AddRequest};
use crate::commands::auth_cmd::{run_login, run_logout};
use crate::commands::common::Context;
use crate::commands::completions::run_completions;
use crate::commands::list::run_list;
use crate::commands::status::run_status;
use crate::commands::sync::{run_sync, SyncMode};
use crate::commands::tags::run_tags;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "linkstash=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let global = cli.global;
    let context = || Context::load(&global);

    match cli.command {
        Commands::Add {
            url,
            title,
            description,
            tags,
            no_sync,
        } => {
            let request = AddRequest {
                url: &url,
                title,
                description,
                tags: &tags,
                no_sync,
            };
            run_add(&context()?, request).await?;
        }
        Commands::List { tag, json } => run_list(&context()?, tag.as_deref(), json)?,
        Commands::Tags { json } => run_tags(&context()?, json)?,
        Commands::Sync {
            init,
            force,
            push_only,
            json,
        } => {
            let mode = SyncMode {
                init,
                force,
                push_only,
            };
            run_sync(&context()?, mode, json).await?;
        }
        Commands::Status { json } => run_status(&context()?, json)?,
        Commands::Login { email, password } => run_login(&context()?, &email, &password).await?,
        Commands::Logout => run_logout(&context()?).await?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}
