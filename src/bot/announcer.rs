use serenity::{
    builder::{CreateEmbed, CreateMessage},
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::Arc;
use tracing::warn;

use crate::{
    audio::{
        announce::{Announcer, CloseReason},
        error::NodeError,
        queue::Track,
    },
    ui::{embeds, messages},
};

/// Posts session announcements to the text channel a session is bound to.
///
/// Each message is sent from its own task so a slow Discord API never holds
/// up playback.
pub struct SerenityAnnouncer {
    http: Arc<Http>,
}

impl SerenityAnnouncer {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    fn send(&self, guild_id: GuildId, channel: ChannelId, message: CreateMessage) {
        let http = self.http.clone();
        tokio::spawn(async move {
            if let Err(e) = channel.send_message(&http, message).await {
                warn!("Failed to announce in guild {} channel {}: {:?}", guild_id, channel, e);
            }
        });
    }

    fn send_embed(&self, guild_id: GuildId, channel: ChannelId, embed: CreateEmbed) {
        self.send(guild_id, channel, CreateMessage::new().embed(embed));
    }
}

impl Announcer for SerenityAnnouncer {
    fn track_started(&self, guild_id: GuildId, channel: ChannelId, track: &Track, first: bool) {
        self.send_embed(guild_id, channel, embeds::create_track_started_embed(track, first));
    }

    fn queue_ended(&self, guild_id: GuildId, channel: ChannelId) {
        self.send(
            guild_id,
            channel,
            CreateMessage::new().content(messages::queue_ended_message()),
        );
    }

    fn track_failed(&self, guild_id: GuildId, channel: ChannelId, track: &Track, error: &NodeError) {
        self.send_embed(
            guild_id,
            channel,
            embeds::create_error_embed(
                "Playback Error",
                &messages::track_failed_message(track, error),
            ),
        );
    }

    fn session_closed(&self, guild_id: GuildId, channel: Option<ChannelId>, reason: CloseReason) {
        let (Some(channel), Some(text)) = (channel, messages::closed_message(reason)) else {
            return;
        };
        self.send_embed(guild_id, channel, embeds::create_info_embed("Session Closed", &text));
    }
}
