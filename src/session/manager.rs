use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, RwLock as StdRwLock},
};

use tokio::sync::Mutex;
use tracing::info;

use crate::{
    cache::SegmentCache,
    config::ChannelConfig,
    dash::client::MpdClient,
    session::StreamSession,
    DashlsError, DashlsResult,
};

type SessionMap = Arc<StdRwLock<HashMap<String, Arc<StreamSession>>>>;

/// Owns every live session plus the shared byte cache.
///
/// Sessions are created on first request for a channel and live until the
/// manager shuts down. The cache's liveness callback captures only the
/// session map, keeping the cache unaware of the manager itself.
pub struct SessionManager {
    sessions: SessionMap,
    config: ChannelConfig,
    mpd_client: Arc<MpdClient>,
    cache: Arc<SegmentCache>,
    /// Serializes session creation so concurrent first requests for a
    /// channel perform a single MPD fetch.
    create_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(config: ChannelConfig, mpd_client: MpdClient) -> Self {
        let sessions: SessionMap = Arc::new(StdRwLock::new(HashMap::new()));
        let cache = Arc::new(SegmentCache::new(Box::new({
            let sessions = sessions.clone();
            move || live_segment_keys(&sessions)
        })));

        Self {
            sessions,
            config,
            mpd_client: Arc::new(mpd_client),
            cache,
            create_lock: Mutex::new(()),
        }
    }

    /// Start the manager's background workers.
    pub fn start(&self) {
        self.cache.start();
    }

    /// Stop every session and the cache sweeper.
    pub async fn stop(&self) {
        info!("stopping session manager and all active sessions");
        let sessions: Vec<_> = self.sessions.read().unwrap().values().cloned().collect();
        for session in sessions {
            session.stop().await;
        }
        self.cache.stop().await;
        info!("session manager stopped");
    }

    pub fn cache(&self) -> &Arc<SegmentCache> {
        &self.cache
    }

    /// The session for a channel, created on demand.
    pub async fn session(&self, channel_id: &str) -> DashlsResult<Arc<StreamSession>> {
        if let Some(session) = self.sessions.read().unwrap().get(channel_id) {
            return Ok(session.clone());
        }

        let _guard = self.create_lock.lock().await;
        // Double check: another request may have won the race while we
        // waited for the creation lock.
        if let Some(session) = self.sessions.read().unwrap().get(channel_id) {
            return Ok(session.clone());
        }

        let channel = self
            .config
            .channels
            .iter()
            .find(|channel| channel.id == channel_id)
            .ok_or_else(|| DashlsError::UnknownChannel(channel_id.to_string()))?;

        info!(channel = %channel_id, "no session found, creating a new one");
        let user_agent =
            (!self.config.user_agent.is_empty()).then(|| self.config.user_agent.clone());
        let session = StreamSession::connect(
            channel,
            user_agent,
            self.mpd_client.clone(),
            self.cache.clone(),
        )
        .await?;

        // Register before the loops start so the sweeper's liveness snapshot
        // covers the session from its very first download.
        self.sessions
            .write()
            .unwrap()
            .insert(channel_id.to_string(), session.clone());
        session.start().await;
        info!(channel = %channel.name, id = %channel_id, "session created and started");

        Ok(session)
    }
}

/// Liveness provider for the cache sweeper: the union of every session's
/// reachable keys, collected under brief per-session read locks.
fn live_segment_keys(sessions: &StdRwLock<HashMap<String, Arc<StreamSession>>>) -> HashSet<String> {
    let mut keys = HashSet::new();
    let sessions = sessions.read().unwrap();
    for session in sessions.values() {
        session.collect_live_keys(&mut keys);
    }
    keys
}
