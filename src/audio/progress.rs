use parking_lot::RwLock;
use serenity::model::id::GuildId;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::node::AudioNode;

pub const BAR_SEGMENTS: usize = 20;
pub const LIVE_INDICATOR: &str = "🔴 LIVE";

const FILLED: &str = "█";
const EMPTY: &str = "▒";

/// Last sampled playback position of the current track.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub position: Duration,
    /// `None` for live streams.
    pub duration: Option<Duration>,
    pub bar: String,
}

impl ProgressSnapshot {
    pub fn new(position: Duration, duration: Option<Duration>) -> Self {
        Self {
            position,
            duration,
            bar: render_bar(position, duration),
        }
    }

    pub fn is_live(&self) -> bool {
        self.duration.is_none()
    }

    /// Fraction played in `0.0..=1.0`, `None` for live streams.
    pub fn percentage(&self) -> Option<f64> {
        self.duration.map(|total| ratio(self.position, total))
    }

    pub fn watched(&self) -> Duration {
        self.position
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.duration
            .map(|total| total.saturating_sub(self.position))
    }
}

fn ratio(position: Duration, total: Duration) -> f64 {
    if total.is_zero() {
        return 0.0;
    }
    (position.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0)
}

/// Renders a fixed-width bar, or the live indicator for unbounded tracks.
pub fn render_bar(position: Duration, duration: Option<Duration>) -> String {
    match duration {
        None => LIVE_INDICATOR.to_string(),
        Some(total) => {
            let filled = ((ratio(position, total) * BAR_SEGMENTS as f64).round() as usize)
                .min(BAR_SEGMENTS);
            FILLED.repeat(filled) + &EMPTY.repeat(BAR_SEGMENTS - filled)
        }
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Background sampler bound to one playing track.
///
/// Dropping or cancelling the tracker stops the task. Pausing keeps the task
/// alive but stops sampling, so the snapshot freezes where playback stopped.
pub struct ProgressTracker {
    snapshot: Arc<RwLock<ProgressSnapshot>>,
    paused: Arc<AtomicBool>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ProgressTracker {
    pub fn spawn(
        guild_id: GuildId,
        node: Arc<dyn AudioNode>,
        duration: Option<Duration>,
        interval: Duration,
        parent: &CancellationToken,
    ) -> Self {
        let snapshot = Arc::new(RwLock::new(ProgressSnapshot::new(Duration::ZERO, duration)));
        let paused = Arc::new(AtomicBool::new(false));
        let token = parent.child_token();

        let task = tokio::spawn(sample_loop(
            guild_id,
            node,
            duration,
            interval,
            snapshot.clone(),
            paused.clone(),
            token.clone(),
        ));

        Self {
            snapshot,
            paused,
            token,
            task,
        }
    }

    /// Most recent sample. Never triggers a fresh read from the node.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot.read().clone()
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn sample_loop(
    guild_id: GuildId,
    node: Arc<dyn AudioNode>,
    duration: Option<Duration>,
    interval: Duration,
    snapshot: Arc<RwLock<ProgressSnapshot>>,
    paused: Arc<AtomicBool>,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if paused.load(Ordering::Acquire) {
            continue;
        }

        let position = tokio::select! {
            _ = token.cancelled() => break,
            position = node.position() => position,
        };

        match position {
            Some(position) => *snapshot.write() = ProgressSnapshot::new(position, duration),
            None => trace!("Position not available yet in guild {}", guild_id),
        }
    }

    debug!("Progress tracker stopped in guild {}", guild_id);
}
