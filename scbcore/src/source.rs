//! Upstream source contract consumed by the poller.

use crate::error::Result;
use crate::record::PlayRecord;
use async_trait::async_trait;

/// How a source's recent plays can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// The upstream timestamps history items; newness is decided by
    /// comparing play dates against the poller's high-water mark
    Timestamped,
    /// The upstream returns an untimestamped recent list; newness is
    /// decided by the recent-window reconciler
    RecentWindow,
}

/// One upstream music service, already normalized to [`PlayRecord`]s.
///
/// Implementations own their HTTP client, credentials, and per-request
/// timeouts. Malformed upstream entries are dropped (with a warning) rather
/// than surfaced; a failed fetch is returned as an error and faults the
/// poller. When timestamps exist the returned history must be sorted
/// oldest-first.
#[async_trait]
pub trait PlaySource: Send + Sync {
    /// Short type tag, e.g. `"listens"`
    fn kind(&self) -> &str;

    /// Identifier for this configured instance, used in logs and dispatch
    fn label(&self) -> &str;

    /// Trust mode for this source's recent plays
    fn mode(&self) -> SourceMode;

    /// Fetch recently played (and possibly now-playing) records
    async fn recently_played(&self) -> Result<Vec<PlayRecord>>;

    /// Hook invoked at the top of every poll cycle
    async fn on_cycle(&self) -> Result<()> {
        Ok(())
    }
}
