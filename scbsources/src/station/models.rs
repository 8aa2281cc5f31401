//! Wire models for station now-playing APIs.
//!
//! The station endpoint reports the current song plus a short history
//! list. Entries carry no usable timestamps; ordering is newest-first and
//! occasionally reshuffles when a song is replayed.

use serde::{Deserialize, Serialize};

/// Response of the now-playing endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationStatus {
    #[serde(default)]
    pub station: StationInfo,
    pub now_playing: Option<StationEntry>,
    #[serde(default)]
    pub song_history: Vec<StationEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub shortcode: String,
}

/// One slot of the station log: the current song or a history entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationEntry {
    /// Station-scoped identifier of this broadcast slot
    pub sh_id: Option<u64>,
    pub song: StationSong,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationSong {
    pub id: Option<String>,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub title: String,
    pub album: Option<String>,
}
