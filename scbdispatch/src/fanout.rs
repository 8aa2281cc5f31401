//! Fan-out dispatcher: the single shared collaborator of all pollers.
//!
//! Accepts freshly discovered plays from any number of pollers, filters
//! process-wide duplicates through a bounded acceptance ledger, and relays
//! the remainder to every targeted downstream client. Client failures are
//! absorbed here; a poller never faults because one scrobble service is
//! down.

use crate::client::ScrobbleClient;
use async_trait::async_trait;
use scbcore::{Dispatch, DispatchOptions, PlayKey, PlayRecord};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Default number of accepted plays remembered for duplicate suppression.
pub const DEFAULT_LEDGER_CAPACITY: usize = 500;

/// Shared fan-out point for all pollers.
pub struct FanoutDispatcher {
    clients: Vec<Arc<dyn ScrobbleClient>>,
    ledger: Mutex<AcceptLedger>,
}

impl FanoutDispatcher {
    pub fn new(clients: Vec<Arc<dyn ScrobbleClient>>) -> Self {
        Self::with_capacity(clients, DEFAULT_LEDGER_CAPACITY)
    }

    pub fn with_capacity(clients: Vec<Arc<dyn ScrobbleClient>>, capacity: usize) -> Self {
        Self {
            clients,
            ledger: Mutex::new(AcceptLedger::new(capacity)),
        }
    }

    fn targeted(&self, scrobble_to: &[String]) -> Vec<Arc<dyn ScrobbleClient>> {
        if scrobble_to.is_empty() {
            return self.clients.clone();
        }
        self.clients
            .iter()
            .filter(|client| scrobble_to.iter().any(|id| id == client.id()))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Dispatch for FanoutDispatcher {
    async fn dispatch(
        &self,
        plays: Vec<PlayRecord>,
        options: DispatchOptions,
    ) -> scbcore::Result<Vec<PlayRecord>> {
        let targeted = self.targeted(&options.scrobble_to);
        if targeted.is_empty() {
            warn!(
                from = options.scrobble_from.as_str(),
                "No scrobble clients targeted, dropping plays"
            );
            return Ok(Vec::new());
        }

        // Process-wide duplicate suppression across pollers.
        let mut fresh = Vec::new();
        {
            let mut ledger = self.ledger.lock().await;
            for play in plays {
                if ledger.contains(&play) {
                    debug!(from = options.scrobble_from.as_str(), play = %play, "Duplicate play, skipping");
                    continue;
                }
                ledger.insert(&play);
                fresh.push(play);
            }
        }
        if fresh.is_empty() {
            return Ok(Vec::new());
        }

        if options.force_refresh {
            // A racy discovery: make every client re-read its recent
            // scrobbles so peer submissions are visible to the duplicate
            // checks below.
            for client in &targeted {
                if let Err(err) = client.refresh().await {
                    warn!(client = client.id(), "Refresh failed: {err}");
                }
            }
        }

        let mut accepted_indices: HashSet<usize> = HashSet::new();
        for client in &targeted {
            let mut batch = Vec::new();
            let mut batch_indices = Vec::new();
            for (index, play) in fresh.iter().enumerate() {
                match client.already_scrobbled(play).await {
                    Ok(true) => {
                        debug!(client = client.id(), play = %play, "Already scrobbled, skipping");
                    }
                    Ok(false) => {
                        batch.push(play.clone());
                        batch_indices.push(index);
                    }
                    Err(err) => {
                        // Better to risk the client's own dedup than to
                        // lose the play.
                        warn!(client = client.id(), "Duplicate check failed: {err}");
                        batch.push(play.clone());
                        batch_indices.push(index);
                    }
                }
            }
            if batch.is_empty() {
                continue;
            }
            match client.scrobble(&batch).await {
                Ok(()) => {
                    info!(
                        client = client.id(),
                        from = options.scrobble_from.as_str(),
                        count = batch.len(),
                        "Scrobbled plays"
                    );
                    accepted_indices.extend(batch_indices);
                }
                Err(err) => {
                    warn!(client = client.id(), "Scrobble failed: {err}");
                }
            }
        }

        Ok(fresh
            .into_iter()
            .enumerate()
            .filter(|(index, _)| accepted_indices.contains(index))
            .map(|(_, play)| play)
            .collect())
    }
}

/// Bounded memory of accepted plays, keyed both by track descriptor and by
/// `(source, track_id)` so either identity rule suppresses a repeat.
struct AcceptLedger {
    capacity: usize,
    order: VecDeque<LedgerEntry>,
    descriptors: HashSet<PlayKey>,
    source_ids: HashSet<(String, String)>,
}

struct LedgerEntry {
    descriptor: PlayKey,
    source_id: Option<(String, String)>,
}

impl AcceptLedger {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            descriptors: HashSet::new(),
            source_ids: HashSet::new(),
        }
    }

    fn contains(&self, play: &PlayRecord) -> bool {
        if self.descriptors.contains(&play.descriptor_key()) {
            return true;
        }
        if let Some(id) = &play.meta.track_id {
            return self
                .source_ids
                .contains(&(play.meta.source.clone(), id.clone()));
        }
        false
    }

    fn insert(&mut self, play: &PlayRecord) {
        let entry = LedgerEntry {
            descriptor: play.descriptor_key(),
            source_id: play
                .meta
                .track_id
                .as_ref()
                .map(|id| (play.meta.source.clone(), id.clone())),
        };
        self.descriptors.insert(entry.descriptor.clone());
        if let Some(source_id) = &entry.source_id {
            self.source_ids.insert(source_id.clone());
        }
        self.order.push_back(entry);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.descriptors.remove(&evicted.descriptor);
                if let Some(source_id) = &evicted.source_id {
                    self.source_ids.remove(source_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryClient;
    use crate::error::Error;
    use scbcore::{PlayData, PlayMeta};

    fn play(track: &str, source: &str, track_id: Option<&str>) -> PlayRecord {
        PlayRecord {
            data: PlayData {
                artists: vec!["Artist".to_string()],
                track: track.to_string(),
                ..Default::default()
            },
            meta: PlayMeta {
                source: source.to_string(),
                track_id: track_id.map(|s| s.to_string()),
                new_from_source: true,
                ..Default::default()
            },
        }
    }

    fn options(from: &str, force_refresh: bool) -> DispatchOptions {
        DispatchOptions {
            force_refresh,
            scrobble_from: from.to_string(),
            scrobble_to: Vec::new(),
        }
    }

    struct FailingClient;

    #[async_trait]
    impl ScrobbleClient for FailingClient {
        fn id(&self) -> &str {
            "broken"
        }

        async fn refresh(&self) -> crate::error::Result<()> {
            Err(Error::client("broken", "connection refused"))
        }

        async fn already_scrobbled(&self, _play: &PlayRecord) -> crate::error::Result<bool> {
            Ok(false)
        }

        async fn scrobble(&self, _plays: &[PlayRecord]) -> crate::error::Result<()> {
            Err(Error::client("broken", "connection refused"))
        }
    }

    #[tokio::test]
    async fn test_repeat_dispatch_is_idempotent() {
        let client = Arc::new(MemoryClient::new("memory"));
        let dispatcher = FanoutDispatcher::new(vec![client.clone()]);

        let first = dispatcher
            .dispatch(vec![play("A", "listens", Some("t1"))], options("listens", false))
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        let second = dispatcher
            .dispatch(vec![play("A", "listens", Some("t1"))], options("listens", false))
            .await
            .unwrap();
        assert!(second.is_empty());
        assert_eq!(client.scrobbled().await.len(), 1);
    }

    #[tokio::test]
    async fn test_cross_source_duplicate_is_suppressed() {
        let client = Arc::new(MemoryClient::new("memory"));
        let dispatcher = FanoutDispatcher::new(vec![client.clone()]);

        dispatcher
            .dispatch(vec![play("A", "listens", Some("x"))], options("listens", false))
            .await
            .unwrap();
        // Same track, different source and id: descriptor identity matches.
        let accepted = dispatcher
            .dispatch(vec![play("A", "station", Some("y"))], options("station", true))
            .await
            .unwrap();
        assert!(accepted.is_empty());
        assert_eq!(client.scrobbled().await.len(), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_reaches_clients() {
        let client = Arc::new(MemoryClient::new("memory"));
        let dispatcher = FanoutDispatcher::new(vec![client.clone()]);

        dispatcher
            .dispatch(vec![play("A", "listens", None)], options("listens", true))
            .await
            .unwrap();
        assert_eq!(client.refresh_count(), 1);

        dispatcher
            .dispatch(vec![play("B", "listens", None)], options("listens", false))
            .await
            .unwrap();
        assert_eq!(client.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_client_failure_does_not_block_others() {
        let healthy = Arc::new(MemoryClient::new("healthy"));
        let dispatcher =
            FanoutDispatcher::new(vec![Arc::new(FailingClient), healthy.clone()]);

        let accepted = dispatcher
            .dispatch(vec![play("A", "listens", None)], options("listens", true))
            .await
            .unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(healthy.scrobbled().await.len(), 1);
    }

    #[tokio::test]
    async fn test_scrobble_to_targets_specific_clients() {
        let first = Arc::new(MemoryClient::new("first"));
        let second = Arc::new(MemoryClient::new("second"));
        let dispatcher = FanoutDispatcher::new(vec![first.clone(), second.clone()]);

        let mut opts = options("listens", false);
        opts.scrobble_to = vec!["second".to_string()];
        dispatcher
            .dispatch(vec![play("A", "listens", None)], opts)
            .await
            .unwrap();

        assert!(first.scrobbled().await.is_empty());
        assert_eq!(second.scrobbled().await.len(), 1);
    }

    #[tokio::test]
    async fn test_order_is_preserved_per_client() {
        let client = Arc::new(MemoryClient::new("memory"));
        let dispatcher = FanoutDispatcher::new(vec![client.clone()]);

        dispatcher
            .dispatch(
                vec![
                    play("A", "listens", None),
                    play("B", "listens", None),
                    play("C", "listens", None),
                ],
                options("listens", false),
            )
            .await
            .unwrap();

        let titles: Vec<String> = client
            .scrobbled()
            .await
            .iter()
            .map(|p| p.data.track.clone())
            .collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_peer_known_play_is_not_resubmitted() {
        let client = Arc::new(MemoryClient::new("memory"));
        client.seed(play("A", "station", None)).await;
        let dispatcher = FanoutDispatcher::new(vec![client.clone()]);

        let accepted = dispatcher
            .dispatch(vec![play("A", "listens", None)], options("listens", true))
            .await
            .unwrap();
        assert!(accepted.is_empty());
        assert_eq!(client.scrobbled().await.len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_eviction_is_bounded() {
        let mut ledger = AcceptLedger::new(2);
        let a = play("A", "s", None);
        let b = play("B", "s", None);
        let c = play("C", "s", None);
        ledger.insert(&a);
        ledger.insert(&b);
        ledger.insert(&c);
        assert!(!ledger.contains(&a));
        assert!(ledger.contains(&b));
        assert!(ledger.contains(&c));
    }
}
