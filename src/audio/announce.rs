use serenity::model::id::{ChannelId, GuildId};

use super::{error::NodeError, queue::Track};

/// Why a session went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Explicit leave requested by a user.
    Left,
    IdleTimeout,
    /// The last listener left the voice channel.
    ListenersLeft,
    ConnectionLost,
    Shutdown,
}

/// Receives session announcements for the bound text channel.
///
/// Calls are made from inside the session task, so implementations must
/// return immediately and do any I/O on their own task.
pub trait Announcer: Send + Sync {
    fn track_started(&self, guild_id: GuildId, channel: ChannelId, track: &Track, first: bool);

    fn queue_ended(&self, guild_id: GuildId, channel: ChannelId);

    fn track_failed(&self, guild_id: GuildId, channel: ChannelId, track: &Track, error: &NodeError);

    fn session_closed(&self, guild_id: GuildId, channel: Option<ChannelId>, reason: CloseReason);
}
