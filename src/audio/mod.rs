//! # Audio Module
//!
//! Per-guild playback coordination for the jukebox bot.
//!
//! Every guild with an active voice connection owns exactly one playback
//! session. A session is a task with a private mailbox: commands from any
//! shard, the audio node's completion callbacks and the idle timer all end
//! up as messages on that mailbox and are applied one at a time.
//!
//! ## Architecture
//!
//! ### [`registry`] - Session Registry
//! - Maps guild ids to live sessions, at most one per guild
//! - Creates sessions on demand and drops them when they close
//!
//! ### [`session`] - Playback Session
//! - State machine over `Idle`, `Playing`, `Paused` and `Destroyed`
//! - Owns the queue, skip votes, progress tracker and idle deadline
//!
//! ### [`queue`], [`vote`], [`progress`]
//! - FIFO track queue with capacity, removal, moves and shuffle
//! - Skip-vote quorum bookkeeping
//! - Periodic position sampling and progress bar rendering
//!
//! ### [`node`] - Audio Node Boundary
//! - [`node::AudioNode`] is everything a session needs from the process that
//!   actually streams audio; [`songbird_node::SongbirdNode`] implements it
//!   over a Songbird call
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use guild_jukebox::audio::{queue::Track, registry::SessionRegistry};
//! # use std::sync::Arc;
//! # use serenity::model::id::{ChannelId, GuildId, UserId};
//! # async fn example(
//! #     registry: Arc<SessionRegistry>,
//! #     node: Arc<dyn guild_jukebox::audio::node::AudioNode>,
//! # ) -> anyhow::Result<()> {
//! let guild_id = GuildId::new(123456789);
//! let session = registry.get_or_create(guild_id, move || node);
//!
//! let track = Track::new("Song", "https://example.com/song", UserId::new(1));
//! session.enqueue(track, ChannelId::new(42)).await?;
//! session.pause().await?;
//! session.resume().await?;
//! # Ok(())
//! # }
//! ```

pub mod announce;
pub mod error;
pub mod node;
pub mod progress;
pub mod queue;
pub mod registry;
pub mod session;
pub mod songbird_node;
pub mod vote;

#[cfg(test)]
pub(crate) mod testing;

pub use announce::{Announcer, CloseReason};
pub use error::{NodeError, PlaybackError, PlaybackResult};
pub use registry::SessionRegistry;
pub use session::{SessionHandle, SessionSettings, SessionState};
