use dashmap::{mapref::entry::Entry, DashMap};
use futures::future::join_all;
use serenity::model::id::GuildId;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::{debug, info};

use super::{
    announce::{Announcer, CloseReason},
    node::AudioNode,
    session::{spawn_session, SessionHandle, SessionSettings},
};

/// Process-wide map of live sessions, at most one per guild.
///
/// Sessions remove themselves when they close, once their voice connection
/// is released. Until then the slot stays taken and [`get`](Self::get)
/// reports nothing; callers that are about to join voice should
/// [`wait_closed`](Self::wait_closed) first.
pub struct SessionRegistry {
    sessions: Arc<DashMap<GuildId, SessionHandle>>,
    announcer: Arc<dyn Announcer>,
    settings: SessionSettings,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new(announcer: Arc<dyn Announcer>, settings: SessionSettings) -> Self {
        info!(
            "🎛️ Session registry ready (idle timeout {:?}, queue limit {})",
            settings.idle_timeout, settings.max_queue_size
        );

        Self {
            sessions: Arc::new(DashMap::new()),
            announcer,
            settings,
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the guild's live session, creating one if there is none.
    ///
    /// `connect` only runs when a new session is created. Concurrent callers
    /// for the same guild all get the same session.
    pub fn get_or_create<F>(&self, guild_id: GuildId, connect: F) -> SessionHandle
    where
        F: FnOnce() -> Arc<dyn AudioNode>,
    {
        match self.sessions.entry(guild_id) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_closed() {
                    return entry.get().clone();
                }
                let handle = self.spawn(guild_id, connect());
                entry.insert(handle.clone());
                handle
            }
            Entry::Vacant(entry) => {
                let handle = self.spawn(guild_id, connect());
                entry.insert(handle.clone());
                handle
            }
        }
    }

    fn spawn(&self, guild_id: GuildId, node: Arc<dyn AudioNode>) -> SessionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let sessions = Arc::downgrade(&self.sessions);

        let on_close = Box::new(move || {
            if let Some(sessions) = sessions.upgrade() {
                // a replacement session may already own the slot
                sessions.remove_if(&guild_id, |_, handle| handle.id() == id);
            }
        });

        spawn_session(
            id,
            guild_id,
            node,
            self.announcer.clone(),
            self.settings.clone(),
            on_close,
        )
    }

    pub fn get(&self, guild_id: GuildId) -> Option<SessionHandle> {
        self.sessions
            .get(&guild_id)
            .map(|handle| handle.clone())
            .filter(|handle| !handle.is_closed())
    }

    /// Waits until a session of the guild that is still tearing down has
    /// released its voice connection. Returns at once otherwise.
    pub async fn wait_closed(&self, guild_id: GuildId) {
        let closing = self
            .sessions
            .get(&guild_id)
            .map(|handle| handle.clone())
            .filter(|handle| handle.is_closed());

        if let Some(handle) = closing {
            debug!(
                "Waiting for session {} in guild {} to close",
                handle.id(),
                guild_id
            );
            handle.closed().await;
        }
    }

    /// Tears down the guild's session. Returns `false` if there was none.
    pub async fn destroy(&self, guild_id: GuildId, reason: CloseReason) -> bool {
        let Some(handle) = self.get(guild_id) else {
            return false;
        };

        handle.destroy(reason).await;
        true
    }

    /// Closes every session and waits for all of them to finish teardown.
    pub async fn shutdown(&self) {
        let handles: Vec<SessionHandle> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        info!("🛑 Closing {} active sessions", handles.len());
        join_all(
            handles
                .iter()
                .map(|handle| handle.destroy(CloseReason::Shutdown)),
        )
        .await;
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn guilds(&self) -> Vec<GuildId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        session::SessionState,
        testing::{settings, text_channel, track, Announcement, FakeNode, RecordingAnnouncer},
    };
    use pretty_assertions::assert_eq;
    use std::{sync::atomic::AtomicUsize, time::Duration};

    fn registry() -> (Arc<SessionRegistry>, Arc<RecordingAnnouncer>) {
        let announcer = Arc::new(RecordingAnnouncer::default());
        let registry = Arc::new(SessionRegistry::new(announcer.clone(), settings()));
        (registry, announcer)
    }

    fn fake_node() -> Arc<dyn AudioNode> {
        Arc::new(FakeNode::default())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creation_yields_one_session() {
        let (registry, _) = registry();
        let connects = Arc::new(AtomicUsize::new(0));

        let tasks = (0..16).map(|_| {
            let registry = registry.clone();
            let connects = connects.clone();
            tokio::spawn(async move {
                registry
                    .get_or_create(GuildId::new(1), || {
                        connects.fetch_add(1, Ordering::SeqCst);
                        fake_node()
                    })
                    .id()
            })
        });

        let ids: Vec<u64> = join_all(tasks)
            .await
            .into_iter()
            .map(|result| result.unwrap())
            .collect();

        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn guilds_are_isolated() {
        let (registry, _) = registry();
        let a = registry.get_or_create(GuildId::new(1), fake_node);
        let b = registry.get_or_create(GuildId::new(2), fake_node);

        a.enqueue(track("A"), text_channel()).await.unwrap();
        assert_eq!(a.state().await, SessionState::Playing);
        assert_eq!(b.state().await, SessionState::Idle);

        let mut guilds = registry.guilds();
        guilds.sort();
        assert_eq!(guilds, vec![GuildId::new(1), GuildId::new(2)]);
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let (registry, announcer) = registry();
        registry.get_or_create(GuildId::new(1), fake_node);

        assert!(registry.destroy(GuildId::new(1), CloseReason::Left).await);
        assert!(!registry.destroy(GuildId::new(1), CloseReason::Left).await);
        assert!(!registry.destroy(GuildId::new(2), CloseReason::Left).await);

        assert!(registry.is_empty());
        assert!(registry.get(GuildId::new(1)).is_none());
        assert_eq!(
            announcer.events(),
            vec![Announcement::Closed(CloseReason::Left)]
        );
    }

    #[tokio::test]
    async fn closed_session_is_replaced() {
        let (registry, _) = registry();
        let first = registry.get_or_create(GuildId::new(1), fake_node);

        first.listeners_changed(0);
        assert_eq!(first.state().await, SessionState::Destroyed);
        assert!(registry.get(GuildId::new(1)).is_none());
        registry.wait_closed(GuildId::new(1)).await;
        assert!(registry.is_empty());

        let second = registry.get_or_create(GuildId::new(1), fake_node);
        assert_ne!(first.id(), second.id());
        assert_eq!(second.state().await, SessionState::Idle);
    }

    #[tokio::test]
    async fn slot_is_held_until_voice_is_released() {
        let (registry, _) = registry();
        let node = Arc::new(FakeNode::default());
        let release = node.hold_disconnect();
        let first = registry.get_or_create(GuildId::new(1), {
            let node = node.clone();
            move || node as Arc<dyn AudioNode>
        });

        first.listeners_changed(0);
        assert_eq!(first.state().await, SessionState::Destroyed);

        // teardown is parked in disconnect
        assert!(registry.get(GuildId::new(1)).is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(node.disconnect_count(), 0);

        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.wait_closed(GuildId::new(1)).await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        release.notify_one();
        waiter.await.unwrap();
        assert_eq!(node.disconnect_count(), 1);
        assert!(registry.is_empty());

        let second = registry.get_or_create(GuildId::new(1), fake_node);
        assert_ne!(first.id(), second.id());
        assert_eq!(second.state().await, SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_removes_session() {
        let (registry, announcer) = registry();
        let handle = registry.get_or_create(GuildId::new(1), fake_node);

        tokio::time::sleep(settings().idle_timeout + Duration::from_secs(1)).await;
        handle.closed().await;
        assert_eq!(handle.state().await, SessionState::Destroyed);
        assert!(registry.is_empty());
        assert_eq!(
            announcer.events(),
            vec![Announcement::Closed(CloseReason::IdleTimeout)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_before_expiry_keeps_session() {
        let (registry, _) = registry();
        let handle = registry.get_or_create(GuildId::new(1), fake_node);

        tokio::time::sleep(settings().idle_timeout - Duration::from_secs(1)).await;
        handle.enqueue(track("A"), text_channel()).await.unwrap();
        tokio::time::sleep(settings().idle_timeout * 2).await;

        assert_eq!(handle.state().await, SessionState::Playing);
        assert_eq!(registry.get(GuildId::new(1)).map(|h| h.id()), Some(handle.id()));
    }

    #[tokio::test]
    async fn shutdown_closes_everything() {
        let (registry, announcer) = registry();
        for guild in 1..=3 {
            registry.get_or_create(GuildId::new(guild), fake_node);
        }

        registry.shutdown().await;
        assert!(registry.is_empty());
        assert_eq!(
            announcer.events(),
            vec![Announcement::Closed(CloseReason::Shutdown); 3]
        );
    }
}
