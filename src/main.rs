use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod ui;

use crate::audio::registry::SessionRegistry;
use crate::bot::{announcer::SerenityAnnouncer, JukeboxBot};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting Guild Jukebox v{}", env!("CARGO_PKG_VERSION"));

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    let config = Config::load()?;
    info!("{}", config.summary());

    // Slash commands plus voice states for listener counts
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let announcer = Arc::new(SerenityAnnouncer::new(Arc::new(Http::new(
        &config.discord_token,
    ))));
    let registry = Arc::new(SessionRegistry::new(announcer, config.session_settings()));

    let handler = JukeboxBot::new(config.clone(), registry.clone());
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {:?}", e);
            return;
        }
        info!(
            "⚠️ Shutdown signal received, closing {} sessions...",
            registry.len()
        );
        registry.shutdown().await;
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

/// Checks that yt-dlp, which every track input depends on, is installed.
async fn health_check() -> Result<()> {
    let yt_dlp = tokio::process::Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await?;

    if yt_dlp.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("yt-dlp is not available");
    }
}
