//! # Bot Module
//!
//! Discord front end for the jukebox.
//!
//! This module contains the glue between Discord and the playback core:
//! - Slash command registration and handling
//! - Voice connection setup for new sessions
//! - Voice state tracking (listener counts, lost connections)
//! - Session announcements in the bound text channel
//!
//! ## Architecture
//!
//! [`JukeboxBot`] implements Serenity's [`EventHandler`] trait. It owns no
//! playback state of its own: everything goes through the shared
//! [`SessionRegistry`], one session per guild.

use anyhow::Result;
use reqwest::Client as HttpClient;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod announcer;
pub mod commands;
pub mod resolve;
pub mod voice;

use crate::{
    audio::{
        node::AudioNode, registry::SessionRegistry, session::SessionHandle,
        songbird_node::SongbirdNode,
    },
    config::Config,
};

pub struct JukeboxBot {
    config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    /// Shared client for yt-dlp inputs
    pub http_client: HttpClient,
}

impl JukeboxBot {
    pub fn new(config: Config, registry: Arc<SessionRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            http_client: HttpClient::new(),
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// Commands go to a single guild when `GUILD_ID` is set (instant
    /// propagation, handy while developing) and globally otherwise.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ Bot is not a member of the configured guild {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Failed to register guild commands: {:?}", e);
                        anyhow::anyhow!(
                            "Could not register guild commands. Check the 'applications.commands' scope."
                        )
                    })?;
                info!("✅ Guild commands registered for {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Failed to register global commands: {:?}", e);
                    anyhow::anyhow!("Could not register global commands")
                })?;
                info!("✅ Global commands registered");
            }
        }

        Ok(())
    }

    /// Returns the guild's session, joining `channel_id` and opening one if needed.
    pub async fn session_for(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<SessionHandle> {
        if let Some(session) = self.registry.get(guild_id) {
            return Ok(session);
        }

        // a session still closing would tear down the call we are about to reuse
        self.registry.wait_closed(guild_id).await;

        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird is not initialised"))?;

        let call = manager.join(guild_id, channel_id).await.map_err(|e| {
            error!("Failed to join voice channel {} in guild {}: {:?}", channel_id, guild_id, e);
            anyhow::anyhow!("Could not connect to the voice channel")
        })?;
        info!("🔊 Connected to voice channel {} in guild {}", channel_id, guild_id);

        let http_client = self.http_client.clone();
        Ok(self.registry.get_or_create(guild_id, move || {
            let node: Arc<dyn AudioNode> =
                Arc::new(SongbirdNode::new(manager, guild_id, call, http_client));
            node
        }))
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error registering commands: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = commands::handle_command(&ctx, command, self).await {
                error!("Error handling command: {:?}", e);
            }
        }
    }

    /// Keeps sessions informed about who is listening.
    ///
    /// - **Bot disconnected**: the session is told the connection was lost
    /// - **Anyone joins/leaves the bot's channel**: the listener count is refreshed
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let Some(session) = self.registry.get(guild_id) else {
            return;
        };

        let bot_id = ctx.cache.current_user().id;
        if new.user_id == bot_id && new.channel_id.is_none() {
            info!("🔌 Bot was disconnected in guild {}", guild_id);
            session.connection_lost();
            return;
        }

        let presence = voice::presence(&ctx, guild_id, bot_id);
        let Some(bot_channel) = presence.bot_channel else {
            return;
        };

        let old_channel = old.and_then(|state| state.channel_id);
        if new.user_id == bot_id
            || old_channel == Some(bot_channel)
            || new.channel_id == Some(bot_channel)
        {
            debug!(
                "👥 {} listeners in voice channel {} (guild {})",
                presence.listeners, bot_channel, guild_id
            );
            session.listeners_changed(presence.listeners);
        }
    }
}
