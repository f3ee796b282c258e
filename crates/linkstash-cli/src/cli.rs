use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "linkstash")]
#[command(about = "Save, tag and sync links from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Args, Clone, Debug, Default)]
pub struct GlobalArgs {
    /// Directory holding the local cache
    #[arg(long, global = true, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Local libSQL file to use as the remote store
    #[arg(long, global = true, value_name = "PATH")]
    pub remote_db: Option<PathBuf>,

    /// Act as this user without signing in
    #[arg(long, global = true, value_name = "ID")]
    pub user: Option<String>,

    /// Path to the config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save a link, then sync it
    #[command(alias = "save")]
    Add {
        /// Link URL
        url: String,
        /// Title
        #[arg(long)]
        title: Option<String>,
        /// Description
        #[arg(long)]
        description: Option<String>,
        /// Tag as NAME or NAME:COLOR; repeatable
        #[arg(short, long = "tag", value_name = "NAME[:COLOR]")]
        tags: Vec<String>,
        /// Only save to the local cache
        #[arg(long)]
        no_sync: bool,
    },
    /// List cached links
    List {
        /// Only links carrying this tag
        #[arg(long)]
        tag: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cached tags
    Tags {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reconcile the local cache with the remote store
    Sync {
        /// First-load sync: a populated remote always wins
        #[arg(long, conflicts_with = "force")]
        init: bool,
        /// Push everything local regardless of timestamps
        #[arg(long)]
        force: bool,
        /// With --force, skip pulling the result back
        #[arg(long, requires = "force")]
        push_only: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show sync status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sign in with Supabase email/password and store the session in the keychain
    Login {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Sign out and clear the stored session
    Logout,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
