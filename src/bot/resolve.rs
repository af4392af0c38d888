use anyhow::{anyhow, Result};
use reqwest::Client as HttpClient;
use serenity::model::id::UserId;
use songbird::input::{AuxMetadata, Compose, YoutubeDl};
use tracing::{debug, info};

use crate::audio::queue::Track;

pub fn is_url(query: &str) -> bool {
    query.starts_with("https://") || query.starts_with("http://")
}

/// Resolves a URL or free-text search into a playable track via yt-dlp.
pub async fn resolve_track(http: &HttpClient, query: &str, requester: UserId) -> Result<Track> {
    let query = query.trim();
    if query.is_empty() {
        anyhow::bail!("Empty search query");
    }

    let mut source = if is_url(query) {
        YoutubeDl::new(http.clone(), query.to_string())
    } else {
        debug!("🔍 Searching: {}", query);
        YoutubeDl::new_search(http.clone(), query.to_string())
    };

    let metadata = source
        .aux_metadata()
        .await
        .map_err(|e| anyhow!("No results for '{}': {}", query, e))?;

    let track = track_from_metadata(metadata, query, requester);
    info!("🎵 Resolved '{}' to {}", query, track.title);
    Ok(track)
}

/// Builds a [`Track`] from yt-dlp metadata. A missing duration means a live stream.
pub fn track_from_metadata(metadata: AuxMetadata, query: &str, requester: UserId) -> Track {
    let uri = metadata.source_url.unwrap_or_else(|| {
        if is_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{}", query)
        }
    });
    let title = metadata
        .title
        .or(metadata.track)
        .unwrap_or_else(|| query.to_string());

    let mut track = Track::new(title, uri, requester);
    track.duration = metadata.duration;
    track.thumbnail = metadata.thumbnail;
    track
}
