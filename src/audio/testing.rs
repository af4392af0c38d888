//! In-memory stand-ins for the audio node and the announcer, shared by the
//! session, registry and progress tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Notify;

use super::{
    announce::{Announcer, CloseReason},
    error::NodeError,
    node::{AudioNode, PlaybackFinished},
    queue::Track,
    session::SessionSettings,
};

pub(crate) fn track(title: &str) -> Track {
    Track::new(title, format!("https://example.com/{title}"), UserId::new(42))
        .with_duration(Duration::from_secs(180))
}

pub(crate) fn settings() -> SessionSettings {
    SessionSettings::default()
}

pub(crate) fn text_channel() -> ChannelId {
    ChannelId::new(99)
}

#[derive(Default)]
pub(crate) struct FakeNode {
    started: Mutex<Vec<(String, u8)>>,
    callbacks: Mutex<Vec<PlaybackFinished>>,
    position: Mutex<Option<Duration>>,
    failing: Mutex<HashSet<String>>,
    fail_all: AtomicBool,
    paused: AtomicBool,
    volume: AtomicU8,
    stops: AtomicUsize,
    disconnects: AtomicUsize,
    fail_next: AtomicBool,
    disconnect_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeNode {
    pub fn set_position(&self, position: Option<Duration>) {
        *self.position.lock() = position;
    }

    /// Makes every start request fail while `fail` is set.
    pub fn fail_starts(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Makes only the next start request fail.
    pub fn fail_next_start(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Parks `disconnect` until the returned gate is notified.
    pub fn hold_disconnect(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.disconnect_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn fail_title(&self, title: &str) {
        self.failing.lock().insert(title.to_string());
    }

    pub fn started_titles(&self) -> Vec<String> {
        self.started.lock().iter().map(|(title, _)| title.clone()).collect()
    }

    /// Volume passed with the most recent start or volume change.
    pub fn last_volume(&self) -> u8 {
        self.volume.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Completes the most recently started track.
    pub fn finish_current(&self) {
        let callback = self.callbacks.lock().last().cloned();
        if let Some(callback) = callback {
            callback.fire();
        }
    }

    /// Fires the completion of the `nth` successful start, even a stale one.
    pub fn finish_nth(&self, nth: usize) {
        let callback = self.callbacks.lock().get(nth).cloned();
        if let Some(callback) = callback {
            callback.fire();
        }
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioNode for FakeNode {
    async fn start_playback(
        &self,
        track: &Track,
        volume: u8,
        finished: PlaybackFinished,
    ) -> Result<(), NodeError> {
        if self.fail_next.swap(false, Ordering::SeqCst)
            || self.fail_all.load(Ordering::SeqCst)
            || self.failing.lock().contains(&track.title)
        {
            return Err(NodeError::Rejected(format!("cannot load {}", track.title)));
        }

        self.started.lock().push((track.title.clone(), volume));
        self.callbacks.lock().push(finished);
        self.volume.store(volume, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_playback(&self) -> Result<(), NodeError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_pause(&self, paused: bool) -> Result<(), NodeError> {
        self.paused.store(paused, Ordering::SeqCst);
        Ok(())
    }

    async fn set_volume(&self, volume: u8) -> Result<(), NodeError> {
        self.volume.store(volume, Ordering::SeqCst);
        Ok(())
    }

    async fn position(&self) -> Option<Duration> {
        *self.position.lock()
    }

    async fn disconnect(&self) {
        let gate = self.disconnect_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Announcement {
    Started { title: String, first: bool },
    QueueEnded,
    Failed { title: String },
    Closed(CloseReason),
}

#[derive(Default)]
pub(crate) struct RecordingAnnouncer {
    events: Mutex<Vec<Announcement>>,
}

impl RecordingAnnouncer {
    pub fn events(&self) -> Vec<Announcement> {
        self.events.lock().clone()
    }
}

impl Announcer for RecordingAnnouncer {
    fn track_started(&self, _guild_id: GuildId, _channel: ChannelId, track: &Track, first: bool) {
        self.events.lock().push(Announcement::Started {
            title: track.title.clone(),
            first,
        });
    }

    fn queue_ended(&self, _guild_id: GuildId, _channel: ChannelId) {
        self.events.lock().push(Announcement::QueueEnded);
    }

    fn track_failed(&self, _guild_id: GuildId, _channel: ChannelId, track: &Track, _error: &NodeError) {
        self.events.lock().push(Announcement::Failed {
            title: track.title.clone(),
        });
    }

    fn session_closed(&self, _guild_id: GuildId, _channel: Option<ChannelId>, reason: CloseReason) {
        self.events.lock().push(Announcement::Closed(reason));
    }
}
