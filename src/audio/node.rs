use async_trait::async_trait;
use std::{fmt, sync::Arc, time::Duration};

use super::{error::NodeError, queue::Track};

/// Completion callback handed to the node with every start request.
///
/// The node fires it once the track it was given stops for any reason
/// (end of stream, error, replaced, stopped). The play id lets the session
/// tell a live completion from one belonging to a track it already left.
#[derive(Clone)]
pub struct PlaybackFinished {
    play_id: u64,
    notify: Arc<dyn Fn(u64) + Send + Sync>,
}

impl PlaybackFinished {
    pub fn new(play_id: u64, notify: impl Fn(u64) + Send + Sync + 'static) -> Self {
        Self {
            play_id,
            notify: Arc::new(notify),
        }
    }

    pub fn play_id(&self) -> u64 {
        self.play_id
    }

    /// Safe to call from any task or thread, any number of times.
    pub fn fire(&self) {
        (self.notify)(self.play_id)
    }
}

impl fmt::Debug for PlaybackFinished {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackFinished")
            .field("play_id", &self.play_id)
            .finish()
    }
}

/// The process that actually decodes and streams audio for one guild.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioNode: Send + Sync {
    /// Starts `track`, replacing whatever was playing.
    ///
    /// On error nothing from this request is left playing.
    async fn start_playback(
        &self,
        track: &Track,
        volume: u8,
        finished: PlaybackFinished,
    ) -> Result<(), NodeError>;

    async fn stop_playback(&self) -> Result<(), NodeError>;

    async fn set_pause(&self, paused: bool) -> Result<(), NodeError>;

    async fn set_volume(&self, volume: u8) -> Result<(), NodeError>;

    /// Elapsed position of the current track, `None` while unknown.
    async fn position(&self) -> Option<Duration>;

    /// Releases the voice connection.
    async fn disconnect(&self);
}
