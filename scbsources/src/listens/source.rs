//! Poller adapter for listens-style history services.

use super::client::{ListensClient, DEFAULT_FETCH_COUNT};
use super::models::Listen;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scbcore::{PlayData, PlayMeta, PlayRecord, PlaySource, SourceMode};
use tracing::warn;

/// Timestamped source backed by a [`ListensClient`].
///
/// History items arrive with epoch-second play dates, so the poller's
/// high-water mark decides newness; the playing-now item is returned
/// without a timestamp and is never scrobbled from the hot loop.
pub struct ListensSource {
    client: ListensClient,
    label: String,
    fetch_count: usize,
}

impl ListensSource {
    pub fn new(client: ListensClient, label: impl Into<String>) -> Self {
        Self {
            client,
            label: label.into(),
            fetch_count: DEFAULT_FETCH_COUNT,
        }
    }

    pub fn fetch_count(mut self, count: usize) -> Self {
        self.fetch_count = count.max(1);
        self
    }

    fn record_from_listen(&self, listen: &Listen) -> Option<PlayRecord> {
        let metadata = &listen.track_metadata;
        if metadata.track_name.is_empty() {
            warn!(source = self.label.as_str(), "Dropping listen without track name");
            return None;
        }

        let play_date = if listen.playing_now {
            None
        } else {
            match listen.listened_at.and_then(|at| DateTime::<Utc>::from_timestamp(at, 0)) {
                Some(at) => Some(at),
                None => {
                    warn!(
                        source = self.label.as_str(),
                        track = metadata.track_name.as_str(),
                        "Dropping listen with unusable timestamp"
                    );
                    return None;
                }
            }
        };

        let artists = if metadata.artist_name.is_empty() {
            Vec::new()
        } else {
            vec![metadata.artist_name.clone()]
        };

        Some(PlayRecord {
            data: PlayData {
                artists,
                album_artists: metadata.additional_info.release_artist_names.clone(),
                album: metadata.release_name.clone(),
                track: metadata.track_name.clone(),
                duration: metadata
                    .additional_info
                    .duration_ms
                    .map(|ms| ms as f64 / 1000.0),
                play_date,
                listened_for: None,
            },
            meta: PlayMeta {
                source: self.label.clone(),
                track_id: metadata.additional_info.recording_msid.clone(),
                new_from_source: false,
                now_playing: listen.playing_now,
                historical: false,
            },
        })
    }
}

#[async_trait]
impl PlaySource for ListensSource {
    fn kind(&self) -> &str {
        "listens"
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn mode(&self) -> SourceMode {
        SourceMode::Timestamped
    }

    async fn recently_played(&self) -> scbcore::Result<Vec<PlayRecord>> {
        let history = self
            .client
            .recent_listens(self.fetch_count)
            .await
            .map_err(|err| scbcore::Error::fetch(&self.label, err))?;

        let mut records: Vec<PlayRecord> = history
            .payload
            .listens
            .iter()
            .filter(|listen| !listen.playing_now)
            .filter_map(|listen| self.record_from_listen(listen))
            .collect();
        records.sort_by_key(|record| record.data.play_date);

        let playing = self
            .client
            .playing_now()
            .await
            .map_err(|err| scbcore::Error::fetch(&self.label, err))?;
        records.extend(
            playing
                .payload
                .listens
                .iter()
                .filter(|listen| listen.playing_now)
                .filter_map(|listen| self.record_from_listen(listen)),
        );

        Ok(records)
    }
}
