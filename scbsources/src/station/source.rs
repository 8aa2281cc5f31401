//! Poller adapter for station now-playing APIs.

use super::client::StationClient;
use super::models::StationEntry;
use async_trait::async_trait;
use scbcore::{PlayData, PlayMeta, PlayRecord, PlaySource, SourceMode};
use tracing::warn;

/// Window-driven source backed by a [`StationClient`].
///
/// The station log carries no usable timestamps, so the recent-window
/// reconciler decides newness. The current song is folded into the window
/// as its newest entry: the station has already committed it to the log,
/// and the reconciler will surface it exactly once.
pub struct StationSource {
    client: StationClient,
    label: String,
}

impl StationSource {
    pub fn new(client: StationClient, label: impl Into<String>) -> Self {
        Self {
            client,
            label: label.into(),
        }
    }

    fn record_from_entry(&self, entry: &StationEntry) -> Option<PlayRecord> {
        let song = &entry.song;
        if song.title.is_empty() {
            warn!(source = self.label.as_str(), "Dropping station entry without title");
            return None;
        }

        let artists = if song.artist.is_empty() {
            Vec::new()
        } else {
            vec![song.artist.clone()]
        };

        // Prefer the per-broadcast slot id over the song id: the same song
        // replayed later is a distinct slot, which is exactly the identity
        // the window needs.
        let track_id = entry
            .sh_id
            .map(|id| id.to_string())
            .or_else(|| song.id.clone());

        Some(PlayRecord {
            data: PlayData {
                artists,
                album_artists: Vec::new(),
                album: song.album.clone(),
                track: song.title.clone(),
                duration: None,
                play_date: None,
                listened_for: None,
            },
            meta: PlayMeta {
                source: self.label.clone(),
                track_id,
                new_from_source: false,
                now_playing: false,
                historical: false,
            },
        })
    }
}

#[async_trait]
impl PlaySource for StationSource {
    fn kind(&self) -> &str {
        "station"
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn mode(&self) -> SourceMode {
        SourceMode::RecentWindow
    }

    async fn recently_played(&self) -> scbcore::Result<Vec<PlayRecord>> {
        let status = self
            .client
            .now_playing()
            .await
            .map_err(|err| scbcore::Error::fetch(&self.label, err))?;

        // Newest-first: the current song, then the history list as the
        // station reports it.
        let mut records = Vec::new();
        if let Some(current) = &status.now_playing {
            records.extend(self.record_from_entry(current));
        }
        records.extend(
            status
                .song_history
                .iter()
                .filter_map(|entry| self.record_from_entry(entry)),
        );
        Ok(records)
    }
}
