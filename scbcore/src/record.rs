//! Canonical in-memory representation of one play event.
//!
//! A [`PlayRecord`] is produced by a per-source adapter, flows through the
//! reconciler and the poller by value, and is handed to the dispatcher.
//! Nothing downstream mutates it once `new_from_source` has been decided.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Track-level data of a play, as normalized by a source adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayData {
    /// Ordered artist names (may be empty when the upstream omits them)
    #[serde(default)]
    pub artists: Vec<String>,
    /// Ordered album artist names (may be empty)
    #[serde(default)]
    pub album_artists: Vec<String>,
    /// Album title, when known
    pub album: Option<String>,
    /// Track title
    pub track: String,
    /// Track duration in seconds, when known (positive)
    pub duration: Option<f64>,
    /// Instant the play started, when the upstream provides one
    pub play_date: Option<DateTime<Utc>>,
    /// Seconds the user actually listened, when known
    pub listened_for: Option<f64>,
}

/// Source-scoped metadata attached to a play.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayMeta {
    /// Tag identifying the upstream source this play came from
    pub source: String,
    /// Upstream-scoped track identifier, when the API exposes one
    pub track_id: Option<String>,
    /// True only once a poller cycle has decided this play is newly observed
    #[serde(default)]
    pub new_from_source: bool,
    /// True iff the upstream marked the track as currently playing
    #[serde(default)]
    pub now_playing: bool,
    /// True iff the record came from a backfill path outside the hot loop
    #[serde(default)]
    pub historical: bool,
}

/// One play event: track data plus source metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayRecord {
    pub data: PlayData,
    pub meta: PlayMeta,
}

impl PlayRecord {
    /// A record is droppable when it carries neither a play date nor the
    /// now-playing flag; such records cannot be ordered or deduplicated.
    pub fn is_well_formed(&self) -> bool {
        self.data.play_date.is_some() || self.meta.now_playing
    }

    /// Same-play test: `(source, track_id)` match when both sides carry an
    /// upstream id, or an exact `(track, album, artist-set)` match.
    pub fn same_play(&self, other: &PlayRecord) -> bool {
        if let (Some(a), Some(b)) = (&self.meta.track_id, &other.meta.track_id) {
            if self.meta.source == other.meta.source {
                return a == b;
            }
        }
        self.descriptor_key() == other.descriptor_key()
    }

    /// Stable key for window comparison within one source: the upstream
    /// track id when present, the track descriptor otherwise.
    pub fn window_key(&self) -> PlayKey {
        match &self.meta.track_id {
            Some(id) => PlayKey::TrackId(id.clone()),
            None => self.descriptor_key(),
        }
    }

    /// Stable key built from track data only, comparable across sources.
    pub fn descriptor_key(&self) -> PlayKey {
        let mut artists = self.data.artists.clone();
        artists.sort();
        PlayKey::Descriptor {
            track: self.data.track.clone(),
            album: self.data.album.clone(),
            artists,
        }
    }
}

impl fmt::Display for PlayRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.data.artists.is_empty() {
            write!(f, "{}", self.data.track)?;
        } else {
            write!(f, "{} - {}", self.data.artists.join(", "), self.data.track)?;
        }
        if let Some(album) = &self.data.album {
            write!(f, " ({album})")?;
        }
        Ok(())
    }
}

/// Identity key for a play, used by windows and dedup ledgers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlayKey {
    /// Upstream-scoped track identifier
    TrackId(String),
    /// Track descriptor with artists in sorted order
    Descriptor {
        track: String,
        album: Option<String>,
        artists: Vec<String>,
    },
}

impl fmt::Display for PlayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayKey::TrackId(id) => write!(f, "id:{id}"),
            PlayKey::Descriptor {
                track,
                album,
                artists,
            } => {
                write!(f, "{} - {}", artists.join(","), track)?;
                if let Some(album) = album {
                    write!(f, " [{album}]")?;
                }
                Ok(())
            }
        }
    }
}
