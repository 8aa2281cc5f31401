//! Downstream scrobble client contract and the in-memory test client.

use crate::error::Result;
use async_trait::async_trait;
use scbcore::PlayRecord;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// One downstream service that records listening history.
///
/// Clients own their transport, credentials, and retry policy. The
/// dispatcher treats every call as fallible and isolates failures per
/// client.
#[async_trait]
pub trait ScrobbleClient: Send + Sync {
    /// Stable identifier used for targeting and logs
    fn id(&self) -> &str;

    /// Re-read recent scrobbles from the service so duplicate checks see
    /// what cooperating clients submitted moments ago
    async fn refresh(&self) -> Result<()>;

    /// True when the service already has a scrobble for this play
    async fn already_scrobbled(&self, play: &PlayRecord) -> Result<bool>;

    /// Submit plays, in the given order
    async fn scrobble(&self, plays: &[PlayRecord]) -> Result<()>;
}

/// In-memory client for tests and local dry runs.
pub struct MemoryClient {
    id: String,
    scrobbled: Mutex<Vec<PlayRecord>>,
    refreshes: AtomicU64,
}

impl MemoryClient {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scrobbled: Mutex::new(Vec::new()),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Plays submitted so far, in submission order.
    pub async fn scrobbled(&self) -> Vec<PlayRecord> {
        self.scrobbled.lock().await.clone()
    }

    /// Number of refresh calls observed.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Seed the client with an existing scrobble, as if a cooperating
    /// client had submitted it.
    pub async fn seed(&self, play: PlayRecord) {
        self.scrobbled.lock().await.push(play);
    }
}

#[async_trait]
impl ScrobbleClient for MemoryClient {
    fn id(&self) -> &str {
        &self.id
    }

    async fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn already_scrobbled(&self, play: &PlayRecord) -> Result<bool> {
        let scrobbled = self.scrobbled.lock().await;
        Ok(scrobbled.iter().any(|existing| existing.same_play(play)))
    }

    async fn scrobble(&self, plays: &[PlayRecord]) -> Result<()> {
        let mut scrobbled = self.scrobbled.lock().await;
        scrobbled.extend_from_slice(plays);
        Ok(())
    }
}
