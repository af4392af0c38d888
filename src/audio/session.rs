use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    announce::{Announcer, CloseReason},
    error::{NodeError, PlaybackError, PlaybackResult},
    node::{AudioNode, PlaybackFinished},
    progress::{ProgressSnapshot, ProgressTracker},
    queue::{Track, TrackQueue},
    vote::{SkipVoteTracker, VoteResolution},
};

pub const MIN_VOLUME: u8 = 1;
pub const MAX_VOLUME: u8 = 100;

/// Tunables shared by every session of the process.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub default_volume: u8,
    pub max_queue_size: usize,
    pub idle_timeout: Duration,
    pub progress_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_volume: 50,
            max_queue_size: 1000,
            idle_timeout: Duration::from_secs(300),
            progress_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Playing,
    Paused,
    Destroyed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    /// The session was idle and the track started right away.
    Started(Track),
    /// Appended behind the current track; `position` is 1-based.
    Queued { position: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipOutcome {
    Queued { votes: usize, required: usize },
    /// `next` is `None` when the queue was empty and the session went idle.
    Skipped { next: Option<Track> },
}

#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub current: Option<Track>,
    pub upcoming: Vec<Track>,
    pub total_duration: Duration,
    pub loop_current: bool,
}

impl QueueSnapshot {
    /// 1-based page of upcoming tracks. Page 0 is treated as page 1.
    pub fn page(&self, page: usize, per_page: usize) -> QueuePage {
        let per_page = per_page.max(1);
        let current_page = page.max(1);
        let total_items = self.upcoming.len();
        let total_pages = if total_items == 0 {
            1
        } else {
            total_items.div_ceil(per_page)
        };

        let start = (current_page - 1) * per_page;
        let items = self
            .upcoming
            .iter()
            .enumerate()
            .skip(start)
            .take(per_page)
            .map(|(index, track)| (index + 1, track.clone()))
            .collect();

        QueuePage {
            items,
            current_page,
            total_pages,
            total_items,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    /// `(1-based position, track)`
    pub items: Vec<(usize, Track)>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

#[derive(Debug, Clone)]
pub struct NowPlaying {
    pub track: Track,
    pub first: bool,
    pub paused: bool,
    pub volume: u8,
    pub loop_current: bool,
    pub progress: ProgressSnapshot,
}

type Reply<T> = oneshot::Sender<PlaybackResult<T>>;

enum Command {
    Enqueue {
        track: Track,
        channel: ChannelId,
        reply: Reply<EnqueueOutcome>,
    },
    SkipVote {
        voter: UserId,
        listeners: usize,
        privileged: bool,
        reply: Reply<SkipOutcome>,
    },
    SetPause {
        paused: bool,
        reply: Reply<bool>,
    },
    SetVolume {
        volume: i64,
        reply: Reply<u8>,
    },
    SetLoop {
        enabled: bool,
        reply: Reply<bool>,
    },
    Stop {
        reply: Reply<usize>,
    },
    Shuffle {
        reply: Reply<usize>,
    },
    Remove {
        index: usize,
        reply: Reply<Track>,
    },
    Move {
        from: usize,
        to: usize,
        reply: Reply<()>,
    },
    QueueSnapshot {
        reply: Reply<QueueSnapshot>,
    },
    NowPlaying {
        reply: Reply<NowPlaying>,
    },
    State {
        reply: oneshot::Sender<SessionState>,
    },
    ListenersChanged {
        count: usize,
    },
    ConnectionLost,
    PlaybackFinished {
        play_id: u64,
    },
    Destroy {
        reason: CloseReason,
    },
}

/// Cheap, cloneable entry point into one guild's session task.
///
/// Every call is a message on the session mailbox, so operations on one
/// session apply strictly in the order they were sent.
#[derive(Clone)]
pub struct SessionHandle {
    id: u64,
    guild_id: GuildId,
    mailbox: mpsc::UnboundedSender<Command>,
    /// Cancelled once teardown has fully finished.
    closed: CancellationToken,
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True as soon as the session stops taking commands, which may be
    /// before its voice connection is released.
    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    /// Resolves once teardown is complete and the voice connection is gone.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> PlaybackResult<T> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(command(reply))
            .map_err(|_| PlaybackError::NoActiveSession)?;
        response.await.map_err(|_| PlaybackError::NoActiveSession)?
    }

    pub async fn enqueue(&self, track: Track, channel: ChannelId) -> PlaybackResult<EnqueueOutcome> {
        self.request(|reply| Command::Enqueue {
            track,
            channel,
            reply,
        })
        .await
    }

    pub async fn skip_vote(
        &self,
        voter: UserId,
        listeners: usize,
        privileged: bool,
    ) -> PlaybackResult<SkipOutcome> {
        self.request(|reply| Command::SkipVote {
            voter,
            listeners,
            privileged,
            reply,
        })
        .await
    }

    pub async fn pause(&self) -> PlaybackResult<()> {
        self.request(|reply| Command::SetPause { paused: true, reply })
            .await
            .map(|_| ())
    }

    pub async fn resume(&self) -> PlaybackResult<()> {
        self.request(|reply| Command::SetPause {
            paused: false,
            reply,
        })
        .await
        .map(|_| ())
    }

    /// Accepts 1 to 100. Anything else is rejected, never clamped.
    pub async fn set_volume(&self, volume: i64) -> PlaybackResult<u8> {
        self.request(|reply| Command::SetVolume { volume, reply })
            .await
    }

    pub async fn set_loop(&self, enabled: bool) -> PlaybackResult<bool> {
        self.request(|reply| Command::SetLoop { enabled, reply })
            .await
    }

    /// Clears the queue and stops playback. Returns the number of dropped tracks.
    pub async fn stop(&self) -> PlaybackResult<usize> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn shuffle(&self) -> PlaybackResult<usize> {
        self.request(|reply| Command::Shuffle { reply }).await
    }

    /// Removes the queued track at 0-based `index`.
    pub async fn remove(&self, index: usize) -> PlaybackResult<Track> {
        self.request(|reply| Command::Remove { index, reply })
            .await
    }

    pub async fn move_track(&self, from: usize, to: usize) -> PlaybackResult<()> {
        self.request(|reply| Command::Move { from, to, reply })
            .await
    }

    pub async fn queue_snapshot(&self) -> PlaybackResult<QueueSnapshot> {
        self.request(|reply| Command::QueueSnapshot { reply })
            .await
    }

    pub async fn now_playing(&self) -> PlaybackResult<NowPlaying> {
        self.request(|reply| Command::NowPlaying { reply })
            .await
    }

    pub async fn state(&self) -> SessionState {
        let (reply, response) = oneshot::channel();
        if self.mailbox.send(Command::State { reply }).is_err() {
            return SessionState::Destroyed;
        }
        response.await.unwrap_or(SessionState::Destroyed)
    }

    /// Reports the number of non-bot users in the voice channel.
    pub fn listeners_changed(&self, count: usize) {
        let _ = self.mailbox.send(Command::ListenersChanged { count });
    }

    pub fn connection_lost(&self) {
        let _ = self.mailbox.send(Command::ConnectionLost);
    }

    /// Tears the session down and waits until it is gone. No-op if it already is.
    pub(crate) async fn destroy(&self, reason: CloseReason) {
        debug!(
            "Closing session {} in guild {} ({:?})",
            self.id, self.guild_id, reason
        );
        let _ = self.mailbox.send(Command::Destroy { reason });
        self.closed().await;
    }
}

/// Spawns the task that owns one guild's playback state.
///
/// `on_close` runs once, after the voice connection has been released,
/// whatever the reason.
pub(crate) fn spawn_session(
    id: u64,
    guild_id: GuildId,
    node: Arc<dyn AudioNode>,
    announcer: Arc<dyn Announcer>,
    settings: SessionSettings,
    on_close: Box<dyn FnOnce() + Send>,
) -> SessionHandle {
    let (tx, rx) = mpsc::unbounded_channel();

    let actor = SessionActor {
        id,
        guild_id,
        node,
        announcer,
        queue: TrackQueue::new(settings.max_queue_size),
        current: None,
        is_first: false,
        started_any: false,
        paused: false,
        volume: settings.default_volume,
        loop_current: false,
        bound_channel: None,
        votes: SkipVoteTracker::new(),
        progress: None,
        next_play_id: 0,
        live_play: None,
        idle_deadline: Some(Instant::now() + settings.idle_timeout),
        mailbox: tx.downgrade(),
        token: CancellationToken::new(),
        on_close: Some(on_close),
        settings,
    };

    let closed = CancellationToken::new();
    let done = closed.clone().drop_guard();
    tokio::spawn(async move {
        actor.run(rx).await;
        drop(done);
    });

    SessionHandle {
        id,
        guild_id,
        mailbox: tx,
        closed,
    }
}

struct SessionActor {
    id: u64,
    guild_id: GuildId,
    node: Arc<dyn AudioNode>,
    announcer: Arc<dyn Announcer>,
    settings: SessionSettings,

    queue: TrackQueue,
    current: Option<Track>,
    is_first: bool,
    started_any: bool,
    paused: bool,
    volume: u8,
    loop_current: bool,
    bound_channel: Option<ChannelId>,

    votes: SkipVoteTracker,
    progress: Option<ProgressTracker>,
    next_play_id: u64,
    /// Play id of the start request the node is currently playing.
    live_play: Option<u64>,
    idle_deadline: Option<Instant>,

    mailbox: mpsc::WeakUnboundedSender<Command>,
    token: CancellationToken,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl SessionActor {
    async fn run(mut self, mut mailbox: mpsc::UnboundedReceiver<Command>) {
        info!("🎛️ Session {} opened in guild {}", self.id, self.guild_id);

        let reason = loop {
            let idle_deadline = self.idle_deadline;

            tokio::select! {
                biased;
                command = mailbox.recv() => match command {
                    Some(command) => {
                        if let Some(reason) = self.handle(command).await {
                            break reason;
                        }
                    }
                    None => break CloseReason::Shutdown,
                },
                _ = wait_until(idle_deadline) => {
                    info!("⏱️ Idle timeout expired in guild {}", self.guild_id);
                    break CloseReason::IdleTimeout;
                }
            }
        };

        // pending requests fail fast instead of waiting out the teardown
        drop(mailbox);
        self.teardown(reason).await;
    }

    async fn handle(&mut self, command: Command) -> Option<CloseReason> {
        match command {
            Command::Enqueue {
                track,
                channel,
                reply,
            } => {
                let _ = reply.send(self.enqueue(track, channel).await);
            }
            Command::SkipVote {
                voter,
                listeners,
                privileged,
                reply,
            } => {
                let _ = reply.send(self.skip_vote(voter, listeners, privileged).await);
            }
            Command::SetPause { paused, reply } => {
                let _ = reply.send(self.set_pause(paused).await);
            }
            Command::SetVolume { volume, reply } => {
                let _ = reply.send(self.set_volume(volume).await);
            }
            Command::SetLoop { enabled, reply } => {
                self.loop_current = enabled;
                debug!("🔂 Loop {} in guild {}", enabled, self.guild_id);
                let _ = reply.send(Ok(enabled));
            }
            Command::Stop { reply } => {
                let _ = reply.send(self.stop().await);
            }
            Command::Shuffle { reply } => {
                let _ = reply.send(Ok(self.queue.shuffle()));
            }
            Command::Remove { index, reply } => {
                let _ = reply.send(self.queue.remove(index));
            }
            Command::Move { from, to, reply } => {
                let _ = reply.send(self.queue.move_track(from, to));
            }
            Command::QueueSnapshot { reply } => {
                let _ = reply.send(Ok(self.queue_snapshot()));
            }
            Command::NowPlaying { reply } => {
                let _ = reply.send(self.now_playing());
            }
            Command::State { reply } => {
                let _ = reply.send(self.state());
            }
            Command::ListenersChanged { count } => {
                if count == 0 {
                    info!("🚪 Last listener left in guild {}", self.guild_id);
                    return Some(CloseReason::ListenersLeft);
                }
                debug!("{} listeners in guild {}", count, self.guild_id);
            }
            Command::ConnectionLost => {
                warn!("🔌 Voice connection lost in guild {}", self.guild_id);
                return Some(CloseReason::ConnectionLost);
            }
            Command::PlaybackFinished { play_id } => {
                self.on_playback_finished(play_id).await;
            }
            Command::Destroy { reason } => return Some(reason),
        }

        None
    }

    fn state(&self) -> SessionState {
        match (&self.current, self.paused) {
            (None, _) => SessionState::Idle,
            (Some(_), true) => SessionState::Paused,
            (Some(_), false) => SessionState::Playing,
        }
    }

    async fn enqueue(&mut self, track: Track, channel: ChannelId) -> PlaybackResult<EnqueueOutcome> {
        self.bound_channel = Some(channel);

        if self.current.is_some() {
            let index = self.queue.push(track)?;
            info!("➕ Queued in guild {} at position {}", self.guild_id, index + 1);
            return Ok(EnqueueOutcome::Queued { position: index + 1 });
        }

        debug_assert!(self.queue.is_empty(), "idle session with pending tracks");
        self.start(track.clone()).await?;
        Ok(EnqueueOutcome::Started(track))
    }

    /// Hands `track` to the node. State is only touched once the node accepts it.
    async fn start(&mut self, track: Track) -> Result<(), NodeError> {
        self.next_play_id += 1;
        let play_id = self.next_play_id;

        self.node
            .start_playback(&track, self.volume, self.finished_callback(play_id))
            .await?;

        self.live_play = Some(play_id);
        self.is_first = !self.started_any;
        self.started_any = true;
        self.paused = false;
        self.idle_deadline = None;
        self.progress = Some(ProgressTracker::spawn(
            self.guild_id,
            self.node.clone(),
            track.duration,
            self.settings.progress_interval,
            &self.token,
        ));

        info!("🎵 Now playing in guild {}: {}", self.guild_id, track.title);
        if let Some(channel) = self.bound_channel {
            self.announcer
                .track_started(self.guild_id, channel, &track, self.is_first);
        }
        self.current = Some(track);

        Ok(())
    }

    fn finished_callback(&self, play_id: u64) -> PlaybackFinished {
        let mailbox = self.mailbox.clone();
        PlaybackFinished::new(play_id, move |play_id| {
            if let Some(mailbox) = mailbox.upgrade() {
                let _ = mailbox.send(Command::PlaybackFinished { play_id });
            }
        })
    }

    async fn on_playback_finished(&mut self, play_id: u64) {
        if self.live_play != Some(play_id) {
            debug!(
                "Ignoring stale completion {} in guild {} (live: {:?})",
                play_id, self.guild_id, self.live_play
            );
            return;
        }

        if self.loop_current {
            if let Some(track) = self.current.clone() {
                match self.start(track.clone()).await {
                    Ok(()) => return,
                    Err(error) => self.report_failure(&track, &error),
                }
            }
        }

        self.advance().await;
    }

    /// Moves on to the next startable track, or goes idle.
    async fn advance(&mut self) {
        self.votes.clear();
        self.progress = None;
        self.current = None;
        self.live_play = None;

        while let Some(next) = self.queue.pop_next() {
            match self.start(next.clone()).await {
                Ok(()) => return,
                Err(error) => self.report_failure(&next, &error),
            }
        }

        self.enter_idle(true);
    }

    fn report_failure(&self, track: &Track, error: &NodeError) {
        warn!(
            "❌ Could not start '{}' in guild {}: {}",
            track.title, self.guild_id, error
        );
        if let Some(channel) = self.bound_channel {
            self.announcer
                .track_failed(self.guild_id, channel, track, error);
        }
    }

    fn enter_idle(&mut self, announce: bool) {
        self.current = None;
        self.live_play = None;
        self.paused = false;
        self.progress = None;
        self.votes.clear();
        self.idle_deadline = Some(Instant::now() + self.settings.idle_timeout);

        info!(
            "📭 Guild {} is idle, closing in {:?} unless something is queued",
            self.guild_id, self.settings.idle_timeout
        );
        if announce {
            if let Some(channel) = self.bound_channel {
                self.announcer.queue_ended(self.guild_id, channel);
            }
        }
    }

    async fn skip_vote(
        &mut self,
        voter: UserId,
        listeners: usize,
        privileged: bool,
    ) -> PlaybackResult<SkipOutcome> {
        if self.current.is_none() {
            return Err(PlaybackError::NothingPlaying);
        }

        match self.votes.vote(voter, listeners, privileged)? {
            VoteResolution::Queued { votes, required } => {
                Ok(SkipOutcome::Queued { votes, required })
            }
            VoteResolution::Resolved => self.skip().await,
        }
    }

    async fn skip(&mut self) -> PlaybackResult<SkipOutcome> {
        match self.queue.pop_next() {
            Some(next) => {
                if let Err(error) = self.start(next.clone()).await {
                    self.queue.push_front(next);
                    return Err(error.into());
                }
                self.votes.clear();
                info!("⏭️ Skipped in guild {}", self.guild_id);
                Ok(SkipOutcome::Skipped { next: Some(next) })
            }
            None => {
                self.node.stop_playback().await?;
                info!("⏭️ Skipped the last track in guild {}", self.guild_id);
                self.enter_idle(true);
                Ok(SkipOutcome::Skipped { next: None })
            }
        }
    }

    async fn set_pause(&mut self, paused: bool) -> PlaybackResult<bool> {
        if self.current.is_none() {
            return Err(PlaybackError::NothingPlaying);
        }

        if self.paused != paused {
            self.node.set_pause(paused).await?;
            self.paused = paused;
            if let Some(progress) = &self.progress {
                progress.set_paused(paused);
            }
            info!(
                "{} Guild {}",
                if paused { "⏸️ Paused" } else { "▶️ Resumed" },
                self.guild_id
            );
        }

        Ok(paused)
    }

    async fn set_volume(&mut self, volume: i64) -> PlaybackResult<u8> {
        let volume = u8::try_from(volume)
            .ok()
            .filter(|v| (MIN_VOLUME..=MAX_VOLUME).contains(v))
            .ok_or_else(|| {
                PlaybackError::InvalidArgument(format!(
                    "volume must be between {} and {}, got {}",
                    MIN_VOLUME, MAX_VOLUME, volume
                ))
            })?;

        if self.current.is_some() {
            self.node.set_volume(volume).await?;
        }
        self.volume = volume;
        info!("🔊 Volume set to {}% in guild {}", volume, self.guild_id);

        Ok(volume)
    }

    async fn stop(&mut self) -> PlaybackResult<usize> {
        // already idle: the running countdown stays as it is
        if self.current.is_none() {
            return Ok(self.queue.clear());
        }

        self.node.stop_playback().await?;

        let cleared = self.queue.clear();
        info!(
            "⏹️ Stopped in guild {} ({} queued tracks cleared)",
            self.guild_id, cleared
        );
        self.enter_idle(false);

        Ok(cleared)
    }

    fn queue_snapshot(&self) -> QueueSnapshot {
        let current_duration = self
            .current
            .as_ref()
            .and_then(|track| track.duration)
            .unwrap_or_default();

        QueueSnapshot {
            current: self.current.clone(),
            upcoming: self.queue.iter().cloned().collect(),
            total_duration: self.queue.total_duration() + current_duration,
            loop_current: self.loop_current,
        }
    }

    fn now_playing(&self) -> PlaybackResult<NowPlaying> {
        let track = self.current.clone().ok_or(PlaybackError::NothingPlaying)?;
        let progress = self
            .progress
            .as_ref()
            .map(|progress| progress.snapshot())
            .unwrap_or_else(|| ProgressSnapshot::new(Duration::ZERO, track.duration));

        Ok(NowPlaying {
            track,
            first: self.is_first,
            paused: self.paused,
            volume: self.volume,
            loop_current: self.loop_current,
            progress,
        })
    }

    async fn teardown(&mut self, reason: CloseReason) {
        self.token.cancel();
        self.progress = None;
        self.votes.clear();
        let dropped = self.queue.clear();

        if self.current.take().is_some() {
            if let Err(error) = self.node.stop_playback().await {
                warn!("Failed to stop playback in guild {}: {}", self.guild_id, error);
            }
        }
        self.live_play = None;
        self.node.disconnect().await;

        // the guild slot is only released once the call is gone
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }

        self.announcer
            .session_closed(self.guild_id, self.bound_channel, reason);
        info!(
            "👋 Session {} closed in guild {} ({:?}, {} queued tracks dropped)",
            self.id, self.guild_id, reason, dropped
        );
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
