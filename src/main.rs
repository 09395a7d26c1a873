use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use session_store::config::{self, AdapterKind, FileConfig, RemoteConfig};
use session_store::{SessionError, SessionStore, Token};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "session_store=info,sessionctl=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = cli::Cli::parse();

    let mut cfg = config::read_env()?;
    if let Some(adapter) = args.adapter.as_deref() {
        cfg.adapter = adapter.parse()?;
    }
    if let Some(root) = args.sessions_root {
        cfg.file = Some(FileConfig {
            sessions_root: PathBuf::from(root),
        });
    }
    if cfg.adapter == AdapterKind::Remote && cfg.remote.is_none() {
        cfg.remote = Some(RemoteConfig::default());
    }

    let store = SessionStore::connect(&cfg)
        .await
        .with_context(|| format!("failed to open {} session store", cfg.adapter))?;

    let result = run(&store, args.command).await;

    if let Err(e) = store.quit().await {
        tracing::warn!(error = %e, "failed to close session store cleanly");
    }

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run(store: &SessionStore, cmd: cli::Commands) -> anyhow::Result<()> {
    match cmd {
        cli::Commands::Store {
            id,
            key,
            credential,
            roles,
            ttl,
        } => {
            let token = Token::issue(id, roles, key, credential, Duration::from_secs(ttl));
            store.store_token(&token).await?;
            println!(
                "Token stored:\n  Owner:   {}\n  Roles:   {}\n  Expires: {}",
                token.id,
                token.roles.join(","),
                format_millis(token.expires)
            );
        }
        cli::Commands::Confirm { key, credential } => {
            match store.confirm_token(&key, credential.as_deref()).await {
                Ok(token) => {
                    println!(
                        "Token valid:\n  Owner:   {}\n  Roles:   {}\n  Issued:  {}\n  Expires: {}",
                        token.id,
                        token.roles.join(","),
                        format_millis(token.issued),
                        format_millis(token.expires)
                    );
                }
                Err(SessionError::InvalidToken) => {
                    anyhow::bail!("invalid token");
                }
                Err(e) => return Err(e.into()),
            }
        }
        cli::Commands::Delete { keys } => {
            let removed = store.delete_tokens(&keys).await?;
            println!("{} of {} token(s) deleted.", removed, keys.len());
        }
        cli::Commands::Sweep => {
            let evicted = store.sweep_expired().await?;
            println!("{} expired token(s) removed.", evicted);
        }
    }
    Ok(())
}

fn format_millis(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}
