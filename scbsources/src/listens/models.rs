//! Wire models for listens-style history APIs.
//!
//! The upstream returns listens newest-first with epoch-second timestamps;
//! a separate endpoint exposes the track currently playing, which carries
//! no timestamp at all.

use serde::{Deserialize, Serialize};

/// Envelope of both the history and the playing-now endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListensResponse {
    pub payload: ListensPayload,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListensPayload {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub listens: Vec<Listen>,
}

/// One listen: a completed play, or the currently playing track when
/// `playing_now` is set (in which case `listened_at` is absent).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Listen {
    /// Epoch seconds the play started; absent for playing-now items
    pub listened_at: Option<i64>,
    #[serde(default)]
    pub playing_now: bool,
    pub track_metadata: TrackMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackMetadata {
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub track_name: String,
    pub release_name: Option<String>,
    #[serde(default)]
    pub additional_info: AdditionalInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdditionalInfo {
    /// Track length in milliseconds, when the submitting player knew it
    pub duration_ms: Option<u64>,
    /// Upstream-scoped identifier for the recording
    pub recording_msid: Option<String>,
    /// Album artists, when distinct from the track artist
    #[serde(default)]
    pub release_artist_names: Vec<String>,
}
