//! # Nudge — delayed reminders and periodic webhook fan-out.
//!
//! Boots the engine: config, store, reminder restore, loop-row scan, then
//! idles until ctrl-c. The chat transport is pluggable behind the
//! `Messenger` trait; this build wires the console messenger.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use nudge_channels::ConsoleMessenger;
use nudge_core::{Messenger, NudgeConfig};
use nudge_scheduler::{
    LoopManager, NotificationDispatcher, ReminderScheduler, SchedulerDb, WebhookDispatcher,
};

#[derive(Parser)]
#[command(
    name = "nudge",
    version,
    about = "⏰ Nudge — reminder scheduling & webhook loops"
)]
struct Cli {
    /// Path to config file (default: ~/.nudge/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Database path override
    #[arg(long)]
    db: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => NudgeConfig::load_from(Path::new(path))?,
        None => NudgeConfig::load()?,
    };

    let db_path = cli.db.unwrap_or_else(|| config.database.path.clone());
    let store = Arc::new(SchedulerDb::open(Path::new(&db_path))?);
    tracing::info!("💾 Database ready at {db_path}");

    let messenger: Arc<dyn Messenger> = Arc::new(ConsoleMessenger::new());
    let dispatcher = Arc::new(NotificationDispatcher::new(messenger, Arc::clone(&store)));
    let scheduler = ReminderScheduler::new(Arc::clone(&store), dispatcher);

    if config.scheduler.restore_on_start {
        let restored = scheduler.restore_all()?;
        tracing::info!("⏰ Scheduler ready ({restored} reminders pending)");
    }

    let webhooks = Arc::new(WebhookDispatcher::new(
        &config.looper.endpoint_base,
        std::time::Duration::from_secs(config.looper.request_timeout_secs),
    )?);
    let loops = LoopManager::new(webhooks, Arc::clone(&store));
    loops.load_from_db()?;

    tracing::info!("🚀 Nudge running — press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("👋 Shutting down");
    Ok(())
}
