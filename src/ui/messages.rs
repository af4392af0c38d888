use std::time::Duration;

use crate::audio::{
    announce::CloseReason,
    error::{NodeError, PlaybackError},
    progress::{format_duration, ProgressSnapshot},
    queue::Track,
    session::{QueuePage, QueueSnapshot, SkipOutcome},
};

/// User-facing text for a failed command.
pub fn error_message(error: &PlaybackError) -> String {
    match error {
        PlaybackError::NoActiveSession => {
            "❌ I'm not playing in this server. Use `/play` first.".to_string()
        }
        PlaybackError::InvalidArgument(reason) => format!("❌ Invalid value: {}", reason),
        PlaybackError::AlreadyVoted => "⚠️ You already voted to skip this track.".to_string(),
        PlaybackError::NothingPlaying => "❌ Nothing is playing right now.".to_string(),
        PlaybackError::QueueFull(max) => format!("❌ The queue is full ({} tracks max).", max),
        PlaybackError::ExternalNodeFailure(e) => {
            format!("❌ The audio player failed: {}", e)
        }
    }
}

pub fn skip_message(outcome: &SkipOutcome) -> String {
    match outcome {
        SkipOutcome::Queued { votes, required } => {
            format!("🗳️ Skip vote recorded ({}/{})", votes, required)
        }
        SkipOutcome::Skipped { next: Some(next) } => format!("⏭️ Skipped. Up next: **{}**", next.title),
        SkipOutcome::Skipped { next: None } => "⏭️ Skipped. The queue is now empty.".to_string(),
    }
}

/// One numbered line per upcoming track.
pub fn queue_lines(page: &QueuePage) -> String {
    page.items
        .iter()
        .map(|(position, track)| match track.duration {
            Some(duration) => format!(
                "**{}**. {} `[{}]`",
                position,
                track.title,
                format_duration(duration)
            ),
            None => format!("**{}**. {} `[live]`", position, track.title),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn queue_summary(snapshot: &QueueSnapshot) -> String {
    let mut info = format!("**Total:** {} upcoming", snapshot.upcoming.len());

    if snapshot.total_duration > Duration::ZERO {
        info.push_str(&format!(
            " • **Duration:** {}",
            format_duration(snapshot.total_duration)
        ));
    }

    if snapshot.loop_current {
        info.push_str(" • 🔂 **Loop**");
    }

    info
}

/// Progress bar with played and remaining time.
pub fn progress_line(progress: &ProgressSnapshot) -> String {
    let watched = format_duration(progress.watched());
    if progress.is_live() {
        return format!("{}\n`{}` played", progress.bar, watched);
    }

    let percent = progress.percentage().unwrap_or_default() * 100.0;
    let remaining = progress
        .remaining()
        .map(format_duration)
        .unwrap_or_default();
    format!(
        "{} {:.0}%\n`{}` played • `{}` left",
        progress.bar, percent, watched, remaining
    )
}

/// Relative Discord timestamp of when the track was queued.
pub fn added_ago(track: &Track) -> String {
    format!("<t:{}:R>", track.added_at.timestamp())
}

pub fn queue_ended_message() -> String {
    "📭 The queue has ended. Add more with `/play`.".to_string()
}

pub fn track_failed_message(track: &Track, error: &NodeError) -> String {
    format!("⚠️ Could not play **{}** ({}). Skipping.", track.title, error)
}

/// Goodbye text for the bound channel. Explicit leaves are already
/// confirmed by the command reply, so they get none.
pub fn closed_message(reason: CloseReason) -> Option<String> {
    match reason {
        CloseReason::Left => None,
        CloseReason::IdleTimeout => Some("💤 Left the voice channel after being idle.".to_string()),
        CloseReason::ListenersLeft => Some("🚪 Everyone left, so I left too.".to_string()),
        CloseReason::ConnectionLost => Some("🔌 Lost the voice connection.".to_string()),
        CloseReason::Shutdown => Some("👋 Shutting down, see you later!".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::track;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    #[test]
    fn queue_lines_number_and_mark_live_tracks() {
        let snapshot = QueueSnapshot {
            current: None,
            upcoming: vec![
                track("A"),
                Track::new("Radio", "https://example.com/radio", UserId::new(1)),
            ],
            total_duration: Duration::from_secs(180),
            loop_current: false,
        };

        assert_eq!(
            queue_lines(&snapshot.page(1, 10)),
            "**1**. A `[3:00]`\n**2**. Radio `[live]`"
        );
    }

    #[test]
    fn queue_summary_lists_duration_and_loop() {
        let snapshot = QueueSnapshot {
            current: Some(track("A")),
            upcoming: vec![track("B")],
            total_duration: Duration::from_secs(360),
            loop_current: true,
        };

        assert_eq!(
            queue_summary(&snapshot),
            "**Total:** 1 upcoming • **Duration:** 6:00 • 🔂 **Loop**"
        );
    }

    #[test]
    fn skip_messages() {
        assert_eq!(
            skip_message(&SkipOutcome::Queued {
                votes: 1,
                required: 3
            }),
            "🗳️ Skip vote recorded (1/3)"
        );
        assert_eq!(
            skip_message(&SkipOutcome::Skipped {
                next: Some(track("B"))
            }),
            "⏭️ Skipped. Up next: **B**"
        );
    }

    #[test]
    fn node_failures_are_explained() {
        let message = error_message(&PlaybackError::ExternalNodeFailure(NodeError::Disconnected));
        assert!(message.contains("voice connection is not available"));
        assert_eq!(
            error_message(&PlaybackError::QueueFull(1000)),
            "❌ The queue is full (1000 tracks max)."
        );
    }

    #[test]
    fn progress_line_shows_played_and_left() {
        let snapshot = ProgressSnapshot::new(Duration::from_secs(60), Some(Duration::from_secs(240)));
        assert_eq!(
            progress_line(&snapshot),
            format!("{} 25%\n`1:00` played • `3:00` left", snapshot.bar)
        );

        let live = ProgressSnapshot::new(Duration::from_secs(75), None);
        assert_eq!(progress_line(&live), "🔴 LIVE\n`1:15` played");
    }

    #[test]
    fn added_time_is_a_relative_timestamp() {
        let mut queued = track("A");
        queued.added_at = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(added_ago(&queued), "<t:1700000000:R>");
    }

    #[test]
    fn explicit_leave_is_silent() {
        assert_eq!(closed_message(CloseReason::Left), None);
        assert!(closed_message(CloseReason::IdleTimeout).is_some());
    }
}
