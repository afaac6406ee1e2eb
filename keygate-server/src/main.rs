//! Keygate Activation Server
//!
//! Issues one-time, hardware-bound activation codes and redeems them
//! exactly once within a TTL window. The plaintext code goes to the
//! operator over Telegram; the database only ever holds hashes.
//!
//! Usage:
//!   keygate-server --port 5000 --db activations.db
//!
//! Secrets come from the environment:
//!   KEYGATE_BOT_TOKEN / KEYGATE_CHAT_ID  - Telegram delivery (optional)
//!   KEYGATE_ADMIN_TOKEN                  - bearer token for /admin routes

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use keygate_activation::{ActivationStore, Notifier, TelegramSink};
use keygate_server::{AppState, ServerConfig, build_router};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "keygate-server")]
#[command(about = "Keygate activation server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5000")]
    port: u16,

    /// Path to the activation database
    #[arg(long, default_value = "activations.db")]
    db: PathBuf,

    /// Length of generated activation codes
    #[arg(long, default_value = "12")]
    code_length: usize,

    /// Pending code time-to-live in seconds
    #[arg(long, default_value = "86400")]
    ttl_secs: i64,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("Keygate activation server starting...");

    let bot_token = env_nonempty("KEYGATE_BOT_TOKEN");
    let chat_id = env_nonempty("KEYGATE_CHAT_ID");
    let notifier = match (bot_token, chat_id) {
        (Some(token), Some(chat_id)) => {
            Notifier::Telegram(TelegramSink::new(token, chat_id).context("building Telegram sink")?)
        }
        _ => {
            warn!("KEYGATE_BOT_TOKEN / KEYGATE_CHAT_ID not set; operator notifications disabled");
            Notifier::Disabled
        }
    };
    let telegram_enabled = matches!(notifier, Notifier::Telegram(_));

    let admin_token = env_nonempty("KEYGATE_ADMIN_TOKEN");
    if admin_token.is_none() {
        warn!("KEYGATE_ADMIN_TOKEN not set; /admin routes are unauthenticated");
    }
    let admin_enabled = admin_token.is_some();

    let store = ActivationStore::open(&args.db)
        .with_context(|| format!("opening activation database {}", args.db.display()))?;

    let config = ServerConfig {
        code_length: args.code_length,
        ttl: chrono::Duration::seconds(args.ttl_secs),
        admin_token,
    };
    let state = AppState::new(Arc::new(store), Arc::new(notifier), config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port))
        .await
        .with_context(|| format!("binding port {}", args.port))?;

    println!("\n========================================");
    println!("  Keygate Activation Server");
    println!("========================================");
    println!("  Listen:     http://0.0.0.0:{}", args.port);
    println!("  Database:   {}", args.db.display());
    println!("  Code TTL:   {}s", args.ttl_secs);
    println!("  Telegram:   {}", if telegram_enabled { "enabled" } else { "disabled" });
    println!("  Admin auth: {}", if admin_enabled { "enabled" } else { "disabled" });
    println!("========================================\n");

    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}
