//! `glyphsmith run`: Start the font-builder bot.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use glyphsmith_assembler::FontAssembler;
use glyphsmith_channels::{CliChannel, TelegramChannel, TelegramConfig};
use glyphsmith_config::{AppConfig, StorageConfig};
use glyphsmith_core::channel::Channel;
use glyphsmith_core::event::EventBus;
use glyphsmith_core::outline::OutlineStore;
use glyphsmith_session::{ChannelOperator, Dispatcher, SessionEngine, SessionManager};
use glyphsmith_store::{FileOutlineStore, InMemoryOutlineStore};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChannelKind {
    /// Telegram bot (stub transport)
    Telegram,
    /// Interactive terminal session
    Cli,
}

pub async fn run(explicit: Option<&Path>, kind: ChannelKind, output: Option<PathBuf>) -> anyhow::Result<()> {
    let config = super::load_config(explicit)?;

    let events = Arc::new(EventBus::default());
    let store = build_store(&config.storage);
    let channel = build_channel(&config, kind, output);

    let notifier = Arc::new(ChannelOperator::new(channel.clone(), config.operator.chat_id.clone()));
    let engine = SessionEngine::new(
        store.clone(),
        FontAssembler::new(config.font.profile()),
        notifier,
        events.clone(),
    )
    .with_max_outline_bytes(config.storage.max_outline_bytes)
    .with_max_glyphs(config.session.max_glyphs);
    let sessions = Arc::new(SessionManager::new(store, events.clone()).with_max_glyphs(config.session.max_glyphs));

    println!("🔤 Glyphsmith — Starting font builder");
    println!("   Channel: {}", channel.name());
    println!("   Font: {} ({})", config.font.family, config.font.file_name);
    println!("   Storage: {}", config.storage.backend);
    println!("   Capacity: {} glyphs per session", config.session.max_glyphs);
    if config.operator.chat_id.is_none() {
        println!("   ⚠️  No operator chat configured; thank-you notes will be dropped");
    }
    if kind == ChannelKind::Cli {
        println!("\n   Type /start to begin, @file.svg to upload, !add / !finish / !cancel for buttons, exit to quit.\n");
    }

    spawn_event_logger(&events);
    if config.session.idle_timeout_minutes > 0 {
        spawn_idle_sweeper(sessions.clone(), config.session.idle_timeout_minutes);
    }

    let rx = channel.start().await?;
    let dispatcher = Arc::new(Dispatcher::new(channel.clone(), Arc::new(engine), sessions.clone()));

    tokio::select! {
        _ = dispatcher.run(rx) => info!("Channel closed"),
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    if let Err(e) = channel.stop().await {
        warn!(channel = %channel.name(), error = %e, "Failed to stop channel");
    }
    info!(remaining = sessions.len().await, "Glyphsmith stopped");
    Ok(())
}

/// The outline store selected by `[storage] backend`.
pub fn build_store(storage: &StorageConfig) -> Arc<dyn OutlineStore> {
    match storage.backend.as_str() {
        "memory" => Arc::new(InMemoryOutlineStore::new()),
        _ => Arc::new(FileOutlineStore::new(storage.resolved_directory())),
    }
}

fn build_channel(config: &AppConfig, kind: ChannelKind, output: Option<PathBuf>) -> Arc<dyn Channel> {
    match kind {
        ChannelKind::Telegram => {
            if !config.has_bot_token() {
                warn!("No bot token configured; set [telegram] bot_token or GLYPHSMITH_BOT_TOKEN");
            }
            Arc::new(TelegramChannel::new(TelegramConfig {
                bot_token: config.telegram.bot_token.clone().unwrap_or_default(),
                allowed_users: config.telegram.allowed_users.clone(),
            }))
        }
        ChannelKind::Cli => Arc::new(CliChannel::new(output.unwrap_or_else(|| PathBuf::from(".")))),
    }
}

fn spawn_event_logger(events: &EventBus) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => debug!(session = %event.session_id(), event = ?event, "Domain event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn spawn_idle_sweeper(sessions: Arc<SessionManager>, idle_minutes: u64) {
    let max_idle = i64::try_from(idle_minutes)
        .ok()
        .and_then(chrono::Duration::try_minutes)
        .unwrap_or_else(|| chrono::Duration::days(36_500));
    info!(idle_minutes, "Idle session sweeper enabled");
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tick.tick().await;
            let expired = sessions.expire_idle(max_idle).await;
            if expired > 0 {
                info!(expired, "Expired idle sessions");
            }
        }
    });
}
