//! HLS playlist generation.
//!
//! Pure serializers from session state to playlist text. The formats are
//! fixed by the HLS specification and asserted byte-for-byte in tests, so
//! the lines are written out by hand rather than through a playlist writer
//! with its own attribute ordering.

pub mod playlist;

pub use playlist::{master_playlist, media_playlist, RenditionSelection};
