use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serenity::model::id::UserId;
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use super::error::{PlaybackError, PlaybackResult};

/// A resolved track, ready to hand to the audio node.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub title: String,
    pub uri: String,
    /// `None` for live streams.
    pub duration: Option<Duration>,
    pub thumbnail: Option<String>,
    pub requester: UserId,
    pub added_at: DateTime<Utc>,
}

impl Track {
    pub fn new(title: impl Into<String>, uri: impl Into<String>, requester: UserId) -> Self {
        Self {
            title: title.into(),
            uri: uri.into(),
            duration: None,
            thumbnail: None,
            requester,
            added_at: Utc::now(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn is_live(&self) -> bool {
        self.duration.is_none()
    }
}

/// Pending tracks of one session, consumed front to back.
#[derive(Debug)]
pub struct TrackQueue {
    items: VecDeque<Track>,
    max_size: usize,
}

impl TrackQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Appends a track and returns its 0-based position.
    pub fn push(&mut self, track: Track) -> PlaybackResult<usize> {
        if self.items.len() >= self.max_size {
            return Err(PlaybackError::QueueFull(self.max_size));
        }

        debug!("➕ Queued: {}", track.title);
        self.items.push_back(track);
        Ok(self.items.len() - 1)
    }

    /// Puts a track back at the head, ignoring the capacity bound.
    pub fn push_front(&mut self, track: Track) {
        self.items.push_front(track);
    }

    pub fn pop_next(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    pub fn remove(&mut self, index: usize) -> PlaybackResult<Track> {
        if index >= self.items.len() {
            return Err(out_of_range(index, self.items.len()));
        }

        let removed = self
            .items
            .remove(index)
            .ok_or_else(|| out_of_range(index, self.items.len()))?;
        debug!("❌ Removed track at position {}", index);
        Ok(removed)
    }

    pub fn move_track(&mut self, from: usize, to: usize) -> PlaybackResult<()> {
        let len = self.items.len();
        if from >= len {
            return Err(out_of_range(from, len));
        }
        if to >= len {
            return Err(out_of_range(to, len));
        }

        if from != to {
            if let Some(item) = self.items.remove(from) {
                self.items.insert(to, item);
                debug!("📍 Moved track from position {} to {}", from, to);
            }
        }

        Ok(())
    }

    /// Shuffles every pending track and returns how many were shuffled.
    pub fn shuffle(&mut self) -> usize {
        let mut items: Vec<_> = self.items.drain(..).collect();
        items.shuffle(&mut rand::thread_rng());
        let count = items.len();
        self.items.extend(items);
        info!("🔀 Shuffled {} queued tracks", count);
        count
    }

    pub fn clear(&mut self) -> usize {
        let cleared = self.items.len();
        self.items.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }

    /// Sum of bounded track lengths; live tracks count as zero.
    pub fn total_duration(&self) -> Duration {
        self.items.iter().filter_map(|item| item.duration).sum()
    }
}

fn out_of_range(index: usize, len: usize) -> PlaybackError {
    PlaybackError::InvalidArgument(format!(
        "position {} is out of range (queue has {} tracks)",
        index + 1,
        len
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> Track {
        Track::new(title, format!("https://example.com/{title}"), UserId::new(1))
    }

    fn titles(queue: &TrackQueue) -> Vec<String> {
        queue.iter().map(|t| t.title.clone()).collect()
    }

    #[test]
    fn consumes_in_insertion_order() {
        let mut queue = TrackQueue::new(10);
        assert_eq!(queue.push(track("a")).unwrap(), 0);
        assert_eq!(queue.push(track("b")).unwrap(), 1);
        assert_eq!(queue.push(track("c")).unwrap(), 2);

        assert_eq!(queue.pop_next().unwrap().title, "a");
        assert_eq!(queue.pop_next().unwrap().title, "b");
        assert_eq!(queue.pop_next().unwrap().title, "c");
        assert!(queue.pop_next().is_none());
    }

    #[test]
    fn rejects_push_when_full() {
        let mut queue = TrackQueue::new(2);
        queue.push(track("a")).unwrap();
        queue.push(track("b")).unwrap();

        let err = queue.push(track("c")).unwrap_err();
        assert!(matches!(err, PlaybackError::QueueFull(2)));
        assert_eq!(titles(&queue), vec!["a", "b"]);
    }

    #[test]
    fn remove_validates_index() {
        let mut queue = TrackQueue::new(10);
        queue.push(track("a")).unwrap();
        queue.push(track("b")).unwrap();

        assert!(matches!(
            queue.remove(2),
            Err(PlaybackError::InvalidArgument(_))
        ));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.remove(0).unwrap().title, "a");
        assert_eq!(titles(&queue), vec!["b"]);
    }

    #[test]
    fn remove_on_empty_queue_fails() {
        let mut queue = TrackQueue::new(10);
        assert!(matches!(
            queue.remove(0),
            Err(PlaybackError::InvalidArgument(_))
        ));
    }

    #[test]
    fn move_track_reorders() {
        let mut queue = TrackQueue::new(10);
        for name in ["a", "b", "c", "d"] {
            queue.push(track(name)).unwrap();
        }

        queue.move_track(3, 0).unwrap();
        assert_eq!(titles(&queue), vec!["d", "a", "b", "c"]);

        assert!(queue.move_track(0, 4).is_err());
        assert_eq!(titles(&queue), vec!["d", "a", "b", "c"]);
    }

    #[test]
    fn shuffle_keeps_every_track() {
        let mut queue = TrackQueue::new(100);
        for i in 0..50 {
            queue.push(track(&i.to_string())).unwrap();
        }

        assert_eq!(queue.shuffle(), 50);

        let mut shuffled = titles(&queue);
        shuffled.sort();
        let mut expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        expected.sort();
        assert_eq!(shuffled, expected);
    }

    #[test]
    fn push_front_ignores_capacity() {
        let mut queue = TrackQueue::new(1);
        queue.push(track("a")).unwrap();
        queue.push_front(track("b"));
        assert_eq!(titles(&queue), vec!["b", "a"]);
    }

    #[test]
    fn total_duration_skips_live_tracks() {
        let mut queue = TrackQueue::new(10);
        queue
            .push(track("a").with_duration(Duration::from_secs(90)))
            .unwrap();
        queue.push(track("live")).unwrap();
        queue
            .push(track("b").with_duration(Duration::from_secs(30)))
            .unwrap();

        assert_eq!(queue.total_duration(), Duration::from_secs(120));
        assert_eq!(queue.clear(), 3);
        assert!(queue.is_empty());
    }
}
