//! Live MPEG-DASH to HLS protocol translation.
//!
//! The service tunes into a dynamic DASH origin and re-exposes each channel
//! as an HLS hierarchy: a master playlist, one media playlist per selected
//! representation, and the fMP4 segments themselves, prefetched from the
//! origin and held briefly in an in-memory cache.
//!
//! ```text
//! origin MPD ──refresh/merge──► StreamSession ──schedule──► Downloader pool
//!                                    │                            │
//!                                    └─publish playlists    SegmentCache ◄─┘
//!                                            │                    │
//!                               HTTP surface (axum): m3u8 + .m4s + keys
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod dash;
pub mod error;
pub mod hls;
pub mod key;
pub mod session;

pub use error::{DashlsError, DashlsResult};
