use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client as HttpClient;
use serenity::model::id::GuildId;
use songbird::{
    input::{Input, YoutubeDl},
    tracks::{PlayMode, Track as SongbirdTrack, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use super::{
    error::NodeError,
    node::{AudioNode, PlaybackFinished},
    queue::Track,
};

/// Plays tracks through a Songbird voice call.
pub struct SongbirdNode {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: Arc<AsyncMutex<Call>>,
    http: HttpClient,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdNode {
    pub fn new(
        manager: Arc<Songbird>,
        guild_id: GuildId,
        call: Arc<AsyncMutex<Call>>,
        http: HttpClient,
    ) -> Self {
        Self {
            manager,
            guild_id,
            call,
            http,
            current: Mutex::new(None),
        }
    }

    fn current(&self) -> Result<TrackHandle, NodeError> {
        self.current
            .lock()
            .clone()
            .ok_or_else(|| NodeError::Rejected("no track loaded".to_string()))
    }
}

fn volume_scale(volume: u8) -> f32 {
    f32::from(volume) / 100.0
}

fn control_error(error: songbird::error::ControlError) -> NodeError {
    NodeError::Rejected(error.to_string())
}

fn notify_when_finished(handle: &TrackHandle, notifier: TrackFinishedNotifier) -> Result<(), NodeError> {
    handle
        .add_event(Event::Track(TrackEvent::End), notifier.clone())
        .map_err(control_error)?;
    handle
        .add_event(Event::Track(TrackEvent::Error), notifier)
        .map_err(control_error)
}

#[async_trait]
impl AudioNode for SongbirdNode {
    async fn start_playback(
        &self,
        track: &Track,
        volume: u8,
        finished: PlaybackFinished,
    ) -> Result<(), NodeError> {
        let input: Input = YoutubeDl::new(self.http.clone(), track.uri.clone()).into();
        let playable = SongbirdTrack::from(input).volume(volume_scale(volume));

        let handle = {
            let mut call = self.call.lock().await;
            if call.current_channel().is_none() {
                return Err(NodeError::Disconnected);
            }
            call.play_only(playable)
        };

        let notifier = TrackFinishedNotifier {
            guild_id: self.guild_id,
            finished,
        };
        // an unwatched track must not keep playing
        if let Err(error) = notify_when_finished(&handle, notifier) {
            warn!(
                "Stopping unwatched track in guild {}: {}",
                self.guild_id, error
            );
            let _ = handle.stop();
            self.current.lock().take();
            return Err(error);
        }

        *self.current.lock() = Some(handle);
        Ok(())
    }

    async fn stop_playback(&self) -> Result<(), NodeError> {
        self.current.lock().take();
        self.call.lock().await.stop();
        Ok(())
    }

    async fn set_pause(&self, paused: bool) -> Result<(), NodeError> {
        let handle = self.current()?;
        if paused {
            handle.pause().map_err(control_error)
        } else {
            handle.play().map_err(control_error)
        }
    }

    async fn set_volume(&self, volume: u8) -> Result<(), NodeError> {
        self.current()?
            .set_volume(volume_scale(volume))
            .map_err(control_error)
    }

    async fn position(&self) -> Option<Duration> {
        let handle = self.current.lock().clone()?;
        handle.get_info().await.ok().map(|state| state.position)
    }

    async fn disconnect(&self) {
        self.current.lock().take();
        if let Err(e) = self.manager.remove(self.guild_id).await {
            debug!("Voice call in guild {} already gone: {:?}", self.guild_id, e);
        }
    }
}

/// Fires the session's completion callback when Songbird ends or drops a track.
#[derive(Clone)]
struct TrackFinishedNotifier {
    guild_id: GuildId,
    finished: PlaybackFinished,
}

#[async_trait]
impl VoiceEventHandler for TrackFinishedNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _) in tracks.iter() {
                if let PlayMode::Errored(error) = &state.playing {
                    warn!("Track errored in guild {}: {:?}", self.guild_id, error);
                }
            }
        }

        debug!(
            "Track {} finished in guild {}",
            self.finished.play_id(),
            self.guild_id
        );
        self.finished.fire();
        None
    }
}
