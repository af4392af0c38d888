use serenity::{
    model::{
        id::{ChannelId, GuildId, UserId},
        Permissions,
    },
    prelude::Context,
};

/// Voice presence of the bot and one user, read from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoicePresence {
    pub bot_channel: Option<ChannelId>,
    pub user_channel: Option<ChannelId>,
    /// Non-bot users in the bot's channel.
    pub listeners: usize,
}

impl VoicePresence {
    pub fn shares_channel(&self) -> bool {
        self.bot_channel.is_some() && self.bot_channel == self.user_channel
    }
}

pub fn presence(ctx: &Context, guild_id: GuildId, user_id: UserId) -> VoicePresence {
    let bot_id = ctx.cache.current_user().id;

    let Some(guild) = guild_id.to_guild_cached(&ctx.cache) else {
        return VoicePresence {
            bot_channel: None,
            user_channel: None,
            listeners: 0,
        };
    };

    let channel_of = |id: UserId| guild.voice_states.get(&id).and_then(|state| state.channel_id);
    let bot_channel = channel_of(bot_id);
    let user_channel = channel_of(user_id);

    let listeners = bot_channel
        .map(|channel| {
            count_listeners(
                guild.voice_states.values().map(|state| {
                    let is_bot = state
                        .member
                        .as_ref()
                        .or_else(|| guild.members.get(&state.user_id))
                        .map(|member| member.user.bot)
                        .unwrap_or(state.user_id == bot_id);
                    (state.channel_id, is_bot)
                }),
                channel,
            )
        })
        .unwrap_or(0);

    VoicePresence {
        bot_channel,
        user_channel,
        listeners,
    }
}

pub fn user_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    presence(ctx, guild_id, user_id).user_channel
}

/// Counts non-bot users whose voice state points at `channel`.
pub fn count_listeners(
    states: impl IntoIterator<Item = (Option<ChannelId>, bool)>,
    channel: ChannelId,
) -> usize {
    states
        .into_iter()
        .filter(|(state_channel, is_bot)| *state_channel == Some(channel) && !is_bot)
        .count()
}

pub fn has_skip_permissions(permissions: Option<Permissions>) -> bool {
    permissions.is_some_and(|permissions| {
        permissions.intersects(
            Permissions::MANAGE_CHANNELS | Permissions::MOVE_MEMBERS | Permissions::ADMINISTRATOR,
        )
    })
}

/// Privileged voters skip without a vote: moderators, or whoever is alone
/// with the bot.
pub fn is_privileged(permissions: Option<Permissions>, presence: &VoicePresence) -> bool {
    has_skip_permissions(permissions) || (presence.shares_channel() && presence.listeners == 1)
}
