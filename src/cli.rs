use clap::{Parser, Subcommand};

/// sessionctl: inspect and manage stored session tokens
#[derive(Parser)]
#[command(name = "sessionctl", version, about)]
pub struct Cli {
    /// Adapter override (memory, file, remote). Takes precedence over SESSION_ADAPTER.
    #[arg(long, global = true)]
    pub adapter: Option<String>,

    /// Session directory for the file adapter. Takes precedence over SESSION_FILE_ROOT.
    #[arg(long, global = true)]
    pub sessions_root: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store a new session token
    Store {
        /// Owner identity
        #[arg(long)]
        id: String,
        #[arg(long)]
        key: String,
        #[arg(long, env = "SESSION_CREDENTIAL")]
        credential: String,
        #[arg(long, value_delimiter = ',')]
        roles: Vec<String>,
        /// Lifetime in seconds
        #[arg(long, default_value = "3600")]
        ttl: u64,
    },

    /// Confirm a key, optionally checking its credential
    Confirm {
        #[arg(long)]
        key: String,
        #[arg(long, env = "SESSION_CREDENTIAL")]
        credential: Option<String>,
    },

    /// Delete one or more tokens
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Remove expired tokens the backend still retains
    Sweep,
}
