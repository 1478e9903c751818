use std::path::Path;

use serde::Deserialize;

use crate::{DashlsError, DashlsResult};

/// A channel after processing: manifest location plus decryption keys
/// decoded from their `kid:hex` form.
#[derive(Debug, Clone)]
pub struct Channel {
    pub name: String,
    pub id: String,
    pub manifest_url: String,
    /// Raw decryption keys. Empty for unencrypted channels.
    pub keys: Vec<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub name: String,
    pub id: String,
    pub user_agent: String,
    pub channels: Vec<Channel>,
}

// Intermediate shape matching the JSON file; keys stay as raw strings until
// validated below.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawConfig {
    #[serde(default)]
    name: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    user_agent: String,
    #[serde(default)]
    channels: Vec<RawChannel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawChannel {
    #[serde(default)]
    name: String,
    id: String,
    #[serde(rename = "Manifest")]
    manifest_url: String,
    #[serde(default)]
    keys: Vec<String>,
}

/// Load and validate the channel configuration. Any malformed key entry is
/// fatal: a half-configured channel would otherwise fail at first tune-in.
pub fn load_config(path: impl AsRef<Path>) -> DashlsResult<ChannelConfig> {
    let data = std::fs::read(path.as_ref())?;
    let raw: RawConfig = serde_json::from_slice(&data)?;

    let mut channels = Vec::with_capacity(raw.channels.len());
    for channel in raw.channels {
        let mut keys = Vec::with_capacity(channel.keys.len());
        for entry in &channel.keys {
            if entry.is_empty() {
                continue;
            }
            keys.push(decode_key(&channel.id, entry)?);
        }
        channels.push(Channel {
            name: channel.name,
            id: channel.id,
            manifest_url: channel.manifest_url,
            keys,
        });
    }

    Ok(ChannelConfig {
        name: raw.name,
        id: raw.id,
        user_agent: raw.user_agent,
        channels,
    })
}

fn decode_key(channel_id: &str, entry: &str) -> DashlsResult<Vec<u8>> {
    let (_kid, key_hex) = entry.split_once(':').ok_or_else(|| {
        DashlsError::InvalidConfig(format!(
            "invalid key format for channel '{channel_id}': expected 'kid:key', got '{entry}'"
        ))
    })?;
    if key_hex.contains(':') {
        return Err(DashlsError::InvalidConfig(format!(
            "invalid key format for channel '{channel_id}': expected 'kid:key', got '{entry}'"
        )));
    }
    hex::decode(key_hex).map_err(|error| {
        DashlsError::InvalidConfig(format!(
            "failed to decode hex key for channel '{channel_id}': {error}"
        ))
    })
}
