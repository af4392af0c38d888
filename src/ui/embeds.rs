use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::{
    audio::{
        progress::{format_duration, LIVE_INDICATOR},
        queue::Track,
        session::{NowPlaying, QueueSnapshot},
    },
    ui::messages,
};

pub const QUEUE_PAGE_SIZE: usize = 10;

/// Standard colour palette.
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "🎵 Guild Jukebox";

fn duration_field(track: &Track) -> String {
    track
        .duration
        .map(format_duration)
        .unwrap_or_else(|| LIVE_INDICATOR.to_string())
}

fn with_track_details(mut embed: CreateEmbed, track: &Track) -> CreateEmbed {
    embed = embed
        .field("⏱️ Duration", duration_field(track), true)
        .field("👤 Requested by", format!("<@{}>", track.requester), true);

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    if track.uri.starts_with("http") {
        embed = embed.url(&track.uri);
    }

    embed
}

/// Announcement posted when a track starts playing.
pub fn create_track_started_embed(track: &Track, first: bool) -> CreateEmbed {
    let title = if first {
        "🎶 Starting the Music"
    } else {
        "🎵 Now Playing"
    };

    let embed = CreateEmbed::default()
        .title(title)
        .description(format!("**{}**", track.title))
        .color(colors::MUSIC_PURPLE);

    with_track_details(embed, track)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Reply to `/nowplaying`, including the progress bar.
pub fn create_now_playing_embed(now: &NowPlaying) -> CreateEmbed {
    let timeline = messages::progress_line(&now.progress);

    let mut status = vec![if now.paused { "⏸️ Paused" } else { "▶️ Playing" }.to_string()];
    status.push(format!("🔊 {}%", now.volume));
    if now.loop_current {
        status.push("🔂 Loop".to_string());
    }

    let embed = CreateEmbed::default()
        .title("🎵 Now Playing")
        .description(format!("**{}**\n\n{}", now.track.title, timeline))
        .color(colors::SUCCESS_GREEN);

    with_track_details(embed, &now.track)
        .field("Status", status.join(" • "), false)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Reply to `/play` when the track was queued behind others.
pub fn create_track_added_embed(track: &Track, position: usize) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("✅ Added to Queue")
        .description(format!("**{}** is number **{}** in the queue", track.title, position))
        .color(colors::SUCCESS_GREEN);

    with_track_details(embed, track)
        .field("🕒 Added", messages::added_ago(track), true)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_queue_embed(snapshot: &QueueSnapshot, page: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Queue")
        .color(colors::INFO_BLUE);

    if snapshot.current.is_none() && snapshot.upcoming.is_empty() {
        return embed
            .description("😴 **The queue is empty**\n\n💡 Use `/play <song>` to add music")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    if let Some(current) = &snapshot.current {
        let status = if snapshot.loop_current { "🔂" } else { "▶️" };
        embed = embed.field(
            format!("{} Playing", status),
            format!("**{}** `[{}]`", current.title, duration_field(current)),
            false,
        );
    }

    let queue_page = snapshot.page(page, QUEUE_PAGE_SIZE);
    if !queue_page.items.is_empty() {
        embed = embed.field("Up next", messages::queue_lines(&queue_page), false);
    }

    embed = embed.field("Info", messages::queue_summary(snapshot), false);

    let footer = if queue_page.total_pages > 1 {
        format!(
            "Page {} of {} • Guild Jukebox",
            queue_page.current_page, queue_page.total_pages
        )
    } else {
        STANDARD_FOOTER.to_string()
    };

    embed
        .footer(CreateEmbedFooter::new(footer))
        .timestamp(Timestamp::now())
}

pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("ℹ️ {}", title))
        .description(description)
        .color(colors::WARNING_ORANGE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}
