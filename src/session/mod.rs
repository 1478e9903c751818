//! Per-channel streaming sessions.
//!
//! A [`StreamSession`] follows one live DASH channel: it keeps a merged MPD
//! snapshot, tracks a virtual playhead in the primary video timescale,
//! schedules segment downloads through its worker pool, and publishes HLS
//! media playlists over the window of segments that actually made it into
//! the byte cache.

pub mod manager;

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock},
    time::Duration,
};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    cache::SegmentCache,
    config::Channel,
    dash::{
        client::MpdClient,
        downloader::{DownloadResult, DownloadTask, Downloader},
        mpd::{AdaptationSet, ContentType, Mpd, Representation},
        segment::{AvailableSegment, Segment},
        timeline,
        url::{init_segment_url, media_segment_url},
    },
    hls::{self, RenditionSelection},
    DashlsError, DashlsResult,
};

pub use manager::SessionManager;

/// Number of segments advertised by a live media playlist.
const PLAYLIST_LIVE_SEGMENTS: usize = 5;
/// Segments retained per representation beyond the published window, so a
/// client finishing the oldest advertised segment still finds its bytes.
const AVAILABLE_WINDOW: usize = PLAYLIST_LIVE_SEGMENTS + 2;
/// How far behind the live edge a fresh session starts, in segments.
const LIVE_DELAY_SEGMENTS: u64 = 4;

const DOWNLOAD_TICK: Duration = Duration::from_secs(2);
const PUBLISH_TICK: Duration = Duration::from_secs(1);
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(2);

const SESSION_WORKERS: usize = 10;
const RESULTS_CAPACITY: usize = 100;

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("channel_id", &self.channel_id)
            .finish_non_exhaustive()
    }
}

pub struct StreamSession {
    channel_id: String,
    manifest_url: Url,
    user_agent: Option<String>,
    mpd_client: Arc<MpdClient>,
    downloader: Downloader,
    cache: Arc<SegmentCache>,

    state: StdRwLock<SessionState>,
    /// Cache keys currently queued or in flight, so a slow download is not
    /// re-enqueued by the next tick.
    pending: StdMutex<HashSet<String>>,

    results_tx: StdMutex<Option<mpsc::Sender<DownloadResult>>>,
    results_rx: StdMutex<Option<mpsc::Receiver<DownloadResult>>>,
    shutdown: CancellationToken,
}

/// Mutable session state behind the per-session readers-writer lock. Locks
/// are held only for short critical sections, never across I/O.
struct SessionState {
    mpd: Mpd,
    /// Manifest URL after redirects; base for all segment resolution.
    base_url: Url,
    /// Sliding window of completed media segments per representation,
    /// ascending by start tick.
    available: HashMap<String, Vec<AvailableSegment>>,
    /// Published media playlist per representation.
    playlists: HashMap<String, String>,
    media_sequence: HashMap<String, u64>,
    /// Ticks per second of the anchoring video set.
    session_timescale: u64,
    /// Virtual playhead in `session_timescale` units. Never decreases.
    target_time: u64,
}

impl StreamSession {
    /// Fetch the channel's MPD and build a session around it. The session is
    /// inert until [`StreamSession::start`] is called.
    pub(crate) async fn connect(
        channel: &Channel,
        user_agent: Option<String>,
        mpd_client: Arc<MpdClient>,
        cache: Arc<SegmentCache>,
    ) -> DashlsResult<Arc<Self>> {
        let manifest_url = Url::parse(&channel.manifest_url)?;
        let (mpd, base_url) = mpd_client
            .fetch(&manifest_url, user_agent.as_deref())
            .await?;

        let (session_timescale, target_time) = initial_playhead(&mpd)?;
        info!(
            channel = %channel.id,
            session_timescale,
            playhead = target_time,
            "initialized session state"
        );

        let downloader = Downloader::new(reqwest::Client::new(), user_agent.clone(), SESSION_WORKERS);
        let (results_tx, results_rx) = mpsc::channel(RESULTS_CAPACITY);

        Ok(Arc::new(Self {
            channel_id: channel.id.clone(),
            manifest_url,
            user_agent,
            mpd_client,
            downloader,
            cache,
            state: StdRwLock::new(SessionState {
                mpd,
                base_url,
                available: HashMap::new(),
                playlists: HashMap::new(),
                media_sequence: HashMap::new(),
                session_timescale,
                target_time,
            }),
            pending: StdMutex::new(HashSet::new()),
            results_tx: StdMutex::new(Some(results_tx)),
            results_rx: StdMutex::new(Some(results_rx)),
            shutdown: CancellationToken::new(),
        }))
    }

    /// Queue init segments and launch the four background loops.
    pub(crate) async fn start(self: &Arc<Self>) {
        info!(channel = %self.channel_id, "starting session loops");
        self.queue_init_segments().await;

        tokio::spawn(self.clone().download_loop());
        tokio::spawn(self.clone().refresh_loop());
        tokio::spawn(self.clone().publish_loop());
        if let Some(results_rx) = self.results_rx.lock().unwrap().take() {
            tokio::spawn(self.clone().result_loop(results_rx));
        }
    }

    /// Cancel the loops and drain the downloader.
    pub(crate) async fn stop(&self) {
        info!(channel = %self.channel_id, "stopping session loops");
        self.shutdown.cancel();
        self.downloader.stop().await;
        // Dropping the session's sender lets the result loop drain the tail
        // of completed downloads and exit on channel closure.
        drop(self.results_tx.lock().unwrap().take());
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// The HLS master playlist over the currently selected representations.
    pub fn master_playlist(&self) -> String {
        let state = self.state.read().unwrap();
        let mut selection = RenditionSelection::default();

        for period in &state.mpd.periods {
            for set in &period.sets {
                let reps = select_representations(set).into_iter().cloned();
                match set.content_type {
                    ContentType::Video => selection.video.extend(reps),
                    ContentType::Audio => selection.audio.extend(reps),
                    ContentType::Text => selection.text.extend(reps),
                    ContentType::Other(_) => {}
                }
            }
        }

        hls::master_playlist(&selection)
    }

    /// The published media playlist for a representation, or an error while
    /// the publisher has not yet produced one.
    pub fn media_playlist(&self, rep_id: &str) -> DashlsResult<String> {
        self.state
            .read()
            .unwrap()
            .playlists
            .get(rep_id)
            .cloned()
            .ok_or_else(|| DashlsError::PlaylistNotReady(rep_id.to_string()))
    }

    /// Add every cache key this session keeps alive: the available media
    /// segments plus the init segment of every representation in the
    /// current MPD snapshot.
    pub(crate) fn collect_live_keys(&self, keys: &mut HashSet<String>) {
        let state = self.state.read().unwrap();

        for (rep_id, segments) in &state.available {
            for segment in segments {
                keys.insert(format!("{}/{}/{}", self.channel_id, rep_id, segment.time));
            }
        }
        for period in &state.mpd.periods {
            for set in &period.sets {
                for rep in &set.representations {
                    keys.insert(format!("{}/{}/init", self.channel_id, rep.id));
                }
            }
        }
    }

    async fn queue_init_segments(&self) {
        info!(channel = %self.channel_id, "queueing initialization segments");
        let (mpd, base_url) = {
            let state = self.state.read().unwrap();
            (state.mpd.clone(), state.base_url.clone())
        };

        for period in &mpd.periods {
            for set in &period.sets {
                for rep in select_representations(set) {
                    let key = format!("{}/{}/init", self.channel_id, rep.id);
                    if self.cache.get(&key).is_some() {
                        debug!(rep = %rep.id, "init segment already cached");
                        continue;
                    }
                    let url = match init_segment_url(&base_url, period, set, rep) {
                        Ok(url) => url,
                        Err(error) => {
                            warn!(rep = %rep.id, %error, "failed to build init segment URL");
                            continue;
                        }
                    };
                    self.enqueue(Segment {
                        url,
                        id: key,
                        time: 0,
                        duration: 0,
                        rep_id: rep.id.clone(),
                        is_init: true,
                    })
                    .await;
                }
            }
        }
    }

    async fn enqueue(&self, segment: Segment) {
        let Some(results) = self.results_tx.lock().unwrap().clone() else {
            return;
        };
        let key = segment.id.clone();
        self.pending.lock().unwrap().insert(key.clone());

        debug!(segment = %key, url = %segment.url, "queueing segment download");
        if let Err(error) = self
            .downloader
            .enqueue(DownloadTask { segment, results })
            .await
        {
            warn!(segment = %key, %error, "failed to queue segment download");
            self.pending.lock().unwrap().remove(&key);
        }
    }

    async fn download_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(DOWNLOAD_TICK);
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!(channel = %self.channel_id, "download loop stopped");
                    return;
                }
                _ = ticker.tick() => self.download_next_segments().await,
            }
        }
    }

    /// One scheduling tick: resolve the segment each adaptation set needs at
    /// the current playhead and enqueue whatever is not already cached or in
    /// flight. State is snapshotted up front; nothing blocks under the lock.
    async fn download_next_segments(&self) {
        let (mpd, base_url, target_time, session_timescale) = {
            let state = self.state.read().unwrap();
            (
                state.mpd.clone(),
                state.base_url.clone(),
                state.target_time,
                state.session_timescale,
            )
        };

        if session_timescale == 0 {
            error!(channel = %self.channel_id, "session timescale is 0, cannot schedule downloads");
            return;
        }

        let mut video_segment_duration = 0u64;
        let mut to_enqueue = Vec::new();

        for period in &mpd.periods {
            let period_start = period.start.as_secs_f64();

            for set in &period.sets {
                let reps = select_representations(set);
                if reps.is_empty() {
                    continue;
                }

                let rep_timescale = set.template.timescale;
                if rep_timescale == 0 {
                    warn!(set = %set.id, "skipping adaptation set with zero timescale");
                    continue;
                }

                // All representations in a set are time-aligned; the first
                // selected one supplies the presentation time offset.
                let offset_secs =
                    reps[0].presentation_time_offset as f64 / rep_timescale as f64;
                let media_secs = target_time as f64 / session_timescale as f64;
                let target_for_rep =
                    ((media_secs - period_start + offset_secs) * rep_timescale as f64).max(0.0)
                        as u64;

                let segment = timeline::segment_at(&set.template.timeline, target_for_rep);
                if segment.duration == 0 {
                    debug!(set = %set.id, target = target_for_rep, "no segment at playhead");
                    continue;
                }

                if set.content_type == ContentType::Video {
                    video_segment_duration = segment.duration;
                }

                for rep in reps {
                    let key = format!("{}/{}/{}", self.channel_id, rep.id, segment.start);
                    if self.cache.get(&key).is_some() {
                        continue;
                    }
                    if self.pending.lock().unwrap().contains(&key) {
                        continue;
                    }

                    let url = match media_segment_url(&base_url, period, set, rep, segment.start)
                    {
                        Ok(url) => url,
                        Err(error) => {
                            warn!(rep = %rep.id, time = segment.start, %error, "failed to build segment URL");
                            continue;
                        }
                    };
                    to_enqueue.push(Segment {
                        url,
                        id: key,
                        time: segment.start,
                        duration: segment.duration,
                        rep_id: rep.id.clone(),
                        is_init: false,
                    });
                }
            }
        }

        for segment in to_enqueue {
            self.enqueue(segment).await;
        }

        // The playhead only moves when the anchoring video set has a segment
        // for the current instant; other sets catch up on their own ticks.
        if video_segment_duration > 0 {
            let mut state = self.state.write().unwrap();
            state.target_time += video_segment_duration;
            debug!(
                channel = %self.channel_id,
                advanced_by = video_segment_duration,
                playhead = state.target_time,
                "advanced session playhead"
            );
        }
    }

    async fn refresh_loop(self: Arc<Self>) {
        let refresh_interval = {
            let state = self.state.read().unwrap();
            state
                .mpd
                .minimum_update_period
                // Per DASH guidance, never hammer the origin faster than 2s.
                .map(|period| period.max(MIN_REFRESH_INTERVAL))
                .unwrap_or(DEFAULT_REFRESH_INTERVAL)
        };
        info!(
            channel = %self.channel_id,
            interval = ?refresh_interval,
            "starting MPD refresh loop"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!(channel = %self.channel_id, "MPD refresh loop stopped");
                    return;
                }
                _ = tokio::time::sleep(refresh_interval) => self.refresh_mpd().await,
            }
        }
    }

    /// Re-fetch the MPD and merge its timelines into the snapshot. Structure
    /// (periods, sets, representations) is never reshuffled mid-stream; only
    /// timelines, the update period and the base URL move.
    async fn refresh_mpd(&self) {
        debug!(channel = %self.channel_id, url = %self.manifest_url, "refreshing MPD");
        let (new_mpd, new_base_url) = match self
            .mpd_client
            .fetch(&self.manifest_url, self.user_agent.as_deref())
            .await
        {
            Ok(fetched) => fetched,
            Err(error) => {
                warn!(channel = %self.channel_id, %error, "failed to refresh MPD");
                return;
            }
        };

        let mut state = self.state.write().unwrap();
        for new_period in &new_mpd.periods {
            for new_set in &new_period.sets {
                let old_set = state
                    .mpd
                    .periods
                    .iter_mut()
                    .filter(|period| period.id == new_period.id)
                    .flat_map(|period| period.sets.iter_mut())
                    .find(|set| set.id == new_set.id);

                match old_set {
                    Some(old_set) => {
                        old_set.template.timeline = timeline::merge(
                            &old_set.template.timeline,
                            &new_set.template.timeline,
                        );
                    }
                    None => {
                        info!(set = %new_set.id, "ignoring new adaptation set in refreshed MPD")
                    }
                }
            }
        }
        state.mpd.minimum_update_period = new_mpd.minimum_update_period;
        state.base_url = new_base_url;
        debug!(channel = %self.channel_id, "merged refreshed MPD");
    }

    /// Drains download results until every sender is gone; `stop` drops the
    /// session's own sender after the worker pool has drained.
    async fn result_loop(self: Arc<Self>, mut results: mpsc::Receiver<DownloadResult>) {
        info!(channel = %self.channel_id, "starting result processing loop");
        while let Some(result) = results.recv().await {
            self.ingest_result(result);
        }
        info!(channel = %self.channel_id, "result processing loop stopped");
    }

    fn ingest_result(&self, result: DownloadResult) {
        let segment = result.segment;
        self.pending.lock().unwrap().remove(&segment.id);

        let data = match result.payload {
            Ok(data) => data,
            Err(error) => {
                warn!(segment = %segment.id, %error, "failed to download segment");
                return;
            }
        };

        self.cache.set(segment.id.clone(), data);

        if segment.is_init {
            info!(rep = %segment.rep_id, "downloaded and cached init segment");
            return;
        }

        let mut state = self.state.write().unwrap();
        let state = &mut *state;
        let available = state.available.entry(segment.rep_id.clone()).or_default();

        // Completions may arrive out of order; insert sorted by start tick
        // and drop exact duplicates so the window stays strictly ascending.
        match available.binary_search_by_key(&segment.time, |s| s.time) {
            Ok(_) => {}
            Err(position) => {
                available.insert(
                    position,
                    AvailableSegment {
                        time: segment.time,
                        duration: segment.duration,
                    },
                );
                if available.len() > AVAILABLE_WINDOW {
                    available.remove(0);
                    *state
                        .media_sequence
                        .entry(segment.rep_id.clone())
                        .or_default() += 1;
                }
                debug!(segment = %segment.id, rep = %segment.rep_id, "cached media segment");
            }
        }
    }

    async fn publish_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(PUBLISH_TICK);
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!(channel = %self.channel_id, "publish loop stopped");
                    return;
                }
                _ = ticker.tick() => self.update_playlists(),
            }
        }
    }

    /// Regenerate the media playlist of every representation that has
    /// downloaded segments.
    fn update_playlists(&self) {
        let mut state = self.state.write().unwrap();
        let SessionState {
            mpd,
            available,
            playlists,
            media_sequence,
            ..
        } = &mut *state;

        for period in &mpd.periods {
            for set in &period.sets {
                for rep in &set.representations {
                    let Some(segments) = available.get(&rep.id) else {
                        continue;
                    };
                    if segments.is_empty() {
                        continue;
                    }

                    let window =
                        &segments[segments.len().saturating_sub(PLAYLIST_LIVE_SEGMENTS)..];
                    let sequence = media_sequence.get(&rep.id).copied().unwrap_or(0);

                    match hls::media_playlist(
                        mpd,
                        &self.channel_id,
                        set.content_type.as_str(),
                        &rep.id,
                        sequence,
                        window,
                    ) {
                        Ok(playlist) => {
                            playlists.insert(rep.id.clone(), playlist);
                        }
                        Err(error) => {
                            warn!(rep = %rep.id, %error, "failed to generate media playlist")
                        }
                    }
                }
            }
        }
    }
}

/// Pick the representations this service re-exposes from an adaptation set:
/// the best video rendition, every audio and text rendition, nothing else.
pub fn select_representations(set: &AdaptationSet) -> Vec<&Representation> {
    match set.content_type {
        ContentType::Video => set
            .representations
            .iter()
            // Trick mode tracks are thumbnails/fast-forward variants, not
            // something an HLS client should ever tune into.
            .filter(|rep| !rep.id.contains("TrickMode"))
            .max_by_key(|rep| rep.bandwidth)
            .into_iter()
            .collect(),
        ContentType::Audio | ContentType::Text => set.representations.iter().collect(),
        ContentType::Other(_) => Vec::new(),
    }
}

/// Locate the anchoring video set and derive the session timescale plus the
/// initial playhead, placed a conservative live delay behind the edge.
fn initial_playhead(mpd: &Mpd) -> DashlsResult<(u64, u64)> {
    let first_period = mpd
        .periods
        .first()
        .ok_or_else(|| DashlsError::InvalidMpd("no adaptation sets found in MPD".to_string()))?;

    let anchor = first_period
        .sets
        .iter()
        .find(|set| {
            set.content_type == ContentType::Video
                && !set
                    .representations
                    .iter()
                    .any(|rep| rep.id.contains("TrickMode"))
        })
        .or_else(|| {
            let fallback = first_period.sets.first();
            if let Some(set) = fallback {
                warn!(set = %set.id, "no primary video adaptation set found, using first set for timing");
            }
            fallback
        })
        .ok_or_else(|| DashlsError::InvalidMpd("no adaptation sets found in MPD".to_string()))?;

    let timescale = anchor.template.timescale;
    if timescale == 0 {
        return Err(DashlsError::InvalidMpd(
            "primary adaptation set has a timescale of 0".to_string(),
        ));
    }

    let expanded = timeline::expand(&anchor.template.timeline);
    let Some(last) = expanded.last() else {
        return Err(DashlsError::InvalidMpd(
            "primary adaptation set has no timeline information".to_string(),
        ));
    };

    // Starting a few segments behind the edge absorbs origin jitter and
    // leaves room for download retries.
    let live_edge = last.start + last.duration;
    let live_delay = last.duration * LIVE_DELAY_SEGMENTS;
    Ok((timescale, live_edge.saturating_sub(live_delay)))
}
