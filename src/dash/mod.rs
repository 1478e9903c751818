//! # MPEG-DASH ingest
//!
//! Everything needed to follow a live DASH origin: fetching and re-fetching
//! the MPD ([`client::MpdClient`]), the crate's own manifest model
//! ([`mpd::Mpd`] and friends, converted from the raw `dash_mpd` parse),
//! timeline algebra over `SegmentTimeline` tuples ([`timeline`]), URL
//! template substitution ([`template`]) and reference resolution ([`url`]),
//! and the bounded worker pool that pulls segment bytes off the origin
//! ([`downloader::Downloader`]).
//!
//! The model here deliberately carries only what a live translation needs:
//! one `SegmentTemplate` per adaptation set, explicit `$Time$` addressing,
//! and mutable timelines that are merged in place on every MPD refresh.

pub mod client;
pub mod downloader;
pub mod mpd;
pub mod segment;
pub mod template;
pub mod timeline;
pub mod url;
