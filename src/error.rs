use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashlsError {
    #[error("HTTP error: {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error("failed to download segment {id} after {attempts} attempts: {source}")]
    DownloadFailed {
        id: String,
        attempts: u32,
        source: Box<DashlsError>,
    },

    #[error("request deadline exceeded")]
    Deadline(#[from] tokio::time::error::Elapsed),

    #[error("downloader is stopped")]
    PoolClosed,

    #[error("invalid MPD: {0}")]
    InvalidMpd(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("duplicate channel ID found in config: {0}")]
    DuplicateChannel(String),

    #[error("configuration for channel ID '{0}' not found")]
    UnknownChannel(String),

    #[error("playlist for representation {0} not found in cache")]
    PlaylistNotReady(String),

    #[error("representation '{rep_id}' of type '{media_type}' not found")]
    RepresentationNotFound { media_type: String, rep_id: String },

    #[error(transparent)]
    MpdParseError(#[from] dash_mpd::DashMpdError),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    HexDecodeError(#[from] hex::FromHexError),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

pub type DashlsResult<T> = Result<T, DashlsError>;
