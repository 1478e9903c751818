use std::collections::{HashMap, HashSet};

use crate::{
    config::ChannelConfig,
    error::{DashlsError, DashlsResult},
};

/// Serves per-channel decryption keys to downstream HLS clients.
///
/// Built once at startup from the processed configuration; the map is
/// read-only afterwards, so lookups need no locking.
#[derive(Debug)]
pub struct KeyService {
    keys: HashMap<String, Vec<u8>>,
}

impl KeyService {
    pub fn new(config: &ChannelConfig) -> DashlsResult<Self> {
        let mut keys = HashMap::new();
        let mut seen = HashSet::new();

        for channel in &config.channels {
            if !seen.insert(channel.id.as_str()) {
                return Err(DashlsError::DuplicateChannel(channel.id.clone()));
            }
            // SAMPLE-AES playback only ever needs one key per channel.
            if let Some(key) = channel.keys.first() {
                keys.insert(channel.id.clone(), key.clone());
            }
        }

        Ok(Self { keys })
    }

    /// The raw key for a channel, or `None` for unknown or unencrypted
    /// channels.
    pub fn key_for_channel(&self, channel_id: &str) -> Option<&[u8]> {
        self.keys.get(channel_id).map(Vec::as_slice)
    }
}
