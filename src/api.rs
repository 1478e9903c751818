use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::warn;

use crate::{key::KeyService, session::SessionManager, DashlsError};

const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const SEGMENT_CONTENT_TYPE: &str = "video/mp4";

/// A media playlist is published by a background loop shortly after session
/// creation; poll for it instead of bouncing the very first client.
const PLAYLIST_RETRY_INTERVAL: Duration = Duration::from_millis(500);
const PLAYLIST_RETRY_ATTEMPTS: u32 = 65;

pub struct AppState {
    pub sessions: SessionManager,
    pub keys: KeyService,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/live/{channel}/master.m3u8", get(master_playlist))
        .route(
            "/live/{channel}/{media_type}/{rep_id}/playlist.m3u8",
            get(media_playlist),
        )
        .route("/live/{channel}/{media_type}/{rep_id}/{name}", get(segment))
        .route("/key/{channel}", get(key))
        .with_state(state)
}

async fn master_playlist(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
) -> Response {
    let session = match state.sessions.session(&channel).await {
        Ok(session) => session,
        Err(error) => return session_error(&channel, error),
    };

    (
        [(CONTENT_TYPE, PLAYLIST_CONTENT_TYPE)],
        session.master_playlist(),
    )
        .into_response()
}

async fn media_playlist(
    State(state): State<Arc<AppState>>,
    Path((channel, _media_type, rep_id)): Path<(String, String, String)>,
) -> Response {
    let session = match state.sessions.session(&channel).await {
        Ok(session) => session,
        Err(error) => return session_error(&channel, error),
    };

    for attempt in 1..=PLAYLIST_RETRY_ATTEMPTS {
        match session.media_playlist(&rep_id) {
            Ok(playlist) => {
                return ([(CONTENT_TYPE, PLAYLIST_CONTENT_TYPE)], playlist).into_response()
            }
            Err(_) if attempt < PLAYLIST_RETRY_ATTEMPTS => {
                tokio::time::sleep(PLAYLIST_RETRY_INTERVAL).await;
            }
            Err(error) => {
                warn!(%channel, rep = %rep_id, %error, "media playlist never became ready");
            }
        }
    }

    (
        StatusCode::NOT_FOUND,
        format!("playlist for representation {rep_id} not found"),
    )
        .into_response()
}

/// Segment bytes come straight from the shared cache; sessions are not
/// involved in the hot path.
async fn segment(
    State(state): State<Arc<AppState>>,
    Path((channel, _media_type, rep_id, name)): Path<(String, String, String, String)>,
) -> Response {
    let id = name.strip_suffix(".m4s").unwrap_or(&name);
    let cache_key = format!("{channel}/{rep_id}/{id}");

    match state.sessions.cache().get(&cache_key) {
        Some(data) => ([(CONTENT_TYPE, SEGMENT_CONTENT_TYPE)], data).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            format!("segment {name} not found in cache"),
        )
            .into_response(),
    }
}

async fn key(State(state): State<Arc<AppState>>, Path(channel): Path<String>) -> Response {
    match state.keys.key_for_channel(&channel) {
        Some(key) => (
            [(CONTENT_TYPE, "application/octet-stream")],
            key.to_vec(),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            "key not found for the given channel",
        )
            .into_response(),
    }
}

fn session_error(channel: &str, error: DashlsError) -> Response {
    warn!(%channel, %error, "failed to get session");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("failed to get session: {error}"),
    )
        .into_response()
}
