use url::Url;

/// A segment scheduled for download.
///
/// `id` doubles as the byte-cache key: `<channel>/<rep>/<start-tick>` for
/// media segments and `<channel>/<rep>/init` for initialization segments.
#[derive(Debug, Clone)]
pub struct Segment {
    pub url: Url,
    pub id: String,
    pub time: u64,
    pub duration: u64,
    pub rep_id: String,
    pub is_init: bool,
}

/// A downloaded media segment inside a representation's sliding window,
/// addressed by its start tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailableSegment {
    pub time: u64,
    pub duration: u64,
}
