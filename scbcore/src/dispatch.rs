//! Dispatcher contract: how pollers hand new plays downstream.

use crate::error::Result;
use crate::record::PlayRecord;
use async_trait::async_trait;

/// Per-dispatch options supplied by the poller.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Ask the dispatcher to reconcile with peer clients before accepting,
    /// set when a discovery was close enough to now that a cooperating
    /// client may be scrobbling the same play
    pub force_refresh: bool,
    /// Label of the source the plays were discovered on
    pub scrobble_from: String,
    /// Downstream client ids to target; empty means every registered client
    pub scrobble_to: Vec<String>,
}

/// Fan-out point shared by all pollers.
///
/// Implementations must be idempotent with respect to repeated plays (same
/// `(source, track_id)` or same track descriptor), must preserve the order
/// of `plays` towards each client, and must absorb individual client
/// failures instead of raising them to the poller.
#[async_trait]
pub trait Dispatch: Send + Sync {
    /// Hand plays to downstream clients; returns the subset actually
    /// accepted for scrobbling.
    async fn dispatch(
        &self,
        plays: Vec<PlayRecord>,
        options: DispatchOptions,
    ) -> Result<Vec<PlayRecord>>;
}
