//! Per-source polling state machine.
//!
//! One [`SourcePoller`] owns the long-lived loop for one upstream source:
//! fetch recent plays, decide which are genuinely new, hedge against racing
//! peer clients when a discovery is fresh, hand the new plays to the
//! dispatcher, and throttle itself during quiet periods. Pollers share
//! nothing but the dispatcher; all cycle state is task-local.

use crate::clock::{sleep_or_cancelled, Clock, SystemClock};
use crate::config::PollerConfig;
use crate::dispatch::{Dispatch, DispatchOptions};
use crate::error::{Error, Result};
use crate::record::{PlayKey, PlayRecord};
use crate::reconcile::reconcile_window;
use crate::source::{PlaySource, SourceMode};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle of a poller as visible from outside the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerLifecycle {
    /// Not running; `start()` moves to `Polling`
    Idle,
    /// The loop is live
    Polling,
    /// The loop died on an unrecoverable cycle error and awaits an external
    /// restart
    Faulted,
}

/// Read-only status snapshot for observability surfaces.
#[derive(Debug, Clone, PartialEq)]
pub struct PollerStatus {
    /// Source type tag, e.g. `"listens"`
    pub kind: String,
    /// Configured source label
    pub name: String,
    pub polling: bool,
    pub tracks_discovered: u64,
    pub last_activity_at: DateTime<Utc>,
}

/// Builder for a [`SourcePoller`].
pub struct PollerBuilder {
    source: Arc<dyn PlaySource>,
    dispatcher: Arc<dyn Dispatch>,
    config: PollerConfig,
    clients: Vec<String>,
    clock: Arc<dyn Clock>,
}

impl PollerBuilder {
    pub fn config(mut self, config: PollerConfig) -> Self {
        self.config = config;
        self
    }

    /// Downstream client ids this poller scrobbles to; empty targets all
    pub fn clients(mut self, clients: Vec<String>) -> Self {
        self.clients = clients;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Arc<SourcePoller> {
        let now = self.clock.now();
        Arc::new(SourcePoller {
            source: self.source,
            dispatcher: self.dispatcher,
            config: self.config,
            clients: self.clients,
            clock: self.clock,
            lifecycle: RwLock::new(PollerLifecycle::Idle),
            cancel: RwLock::new(CancellationToken::new()),
            tracks_discovered: AtomicU64::new(0),
            last_activity_at: RwLock::new(now),
        })
    }
}

/// Polling loop for one upstream source.
pub struct SourcePoller {
    source: Arc<dyn PlaySource>,
    dispatcher: Arc<dyn Dispatch>,
    config: PollerConfig,
    clients: Vec<String>,
    clock: Arc<dyn Clock>,
    lifecycle: RwLock<PollerLifecycle>,
    cancel: RwLock<CancellationToken>,
    tracks_discovered: AtomicU64,
    last_activity_at: RwLock<DateTime<Utc>>,
}

/// Task-local cycle state; never shared across tasks.
struct CycleState {
    last_track_played_at: DateTime<Utc>,
    check_count: u64,
    recently_played: Vec<PlayRecord>,
    now_playing_seen: Option<(PlayKey, DateTime<Utc>)>,
}

struct CycleOutcome {
    found_new: bool,
}

impl SourcePoller {
    pub fn builder(source: Arc<dyn PlaySource>, dispatcher: Arc<dyn Dispatch>) -> PollerBuilder {
        PollerBuilder {
            source,
            dispatcher,
            config: PollerConfig::default(),
            clients: Vec::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Spawn the polling loop. A no-op while a loop is already live; legal
    /// again from `Idle` or `Faulted`. Errors never surface here, they end
    /// in the `Faulted` state.
    pub fn start(self: &Arc<Self>) {
        {
            let mut lifecycle = self.lifecycle.write().unwrap();
            if *lifecycle == PollerLifecycle::Polling {
                warn!(source = self.source.label(), "Polling already started");
                return;
            }
            *lifecycle = PollerLifecycle::Polling;
        }

        let cancel = CancellationToken::new();
        *self.cancel.write().unwrap() = cancel.clone();

        let poller = Arc::clone(self);
        tokio::spawn(async move {
            poller.run(cancel).await;
        });
    }

    /// Request a prompt, clean shutdown of the loop.
    pub fn stop(&self) {
        self.cancel.read().unwrap().cancel();
    }

    pub fn lifecycle(&self) -> PollerLifecycle {
        *self.lifecycle.read().unwrap()
    }

    pub fn status(&self) -> PollerStatus {
        PollerStatus {
            kind: self.source.kind().to_string(),
            name: self.source.label().to_string(),
            polling: self.lifecycle() == PollerLifecycle::Polling,
            tracks_discovered: self.tracks_discovered.load(Ordering::Relaxed),
            last_activity_at: *self.last_activity_at.read().unwrap(),
        }
    }

    async fn run(&self, cancel: CancellationToken) {
        info!(source = self.source.label(), "Polling started");

        let mut state = CycleState {
            last_track_played_at: self.clock.now(),
            check_count: 0,
            recently_played: Vec::new(),
            now_playing_seen: None,
        };

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.cycle(&mut state, &cancel).await {
                Ok(outcome) => {
                    let sleep_secs = self.sleep_seconds(&state);
                    if !outcome.found_new {
                        state.check_count += 1;
                    }
                    debug!(
                        source = self.source.label(),
                        seconds = sleep_secs,
                        check_count = state.check_count,
                        "Cycle complete, sleeping"
                    );
                    if !sleep_or_cancelled(Duration::from_secs(sleep_secs), &cancel).await {
                        break;
                    }
                }
                Err(Error::Cancelled) => break,
                Err(err) => {
                    error!(source = self.source.label(), "Polling failed: {err}");
                    *self.lifecycle.write().unwrap() = PollerLifecycle::Faulted;
                    return;
                }
            }
        }

        *self.lifecycle.write().unwrap() = PollerLifecycle::Idle;
        info!(source = self.source.label(), "Polling stopped");
    }

    /// One poll cycle: fetch, classify, close-to-interval hedge, dispatch.
    async fn cycle(&self, state: &mut CycleState, cancel: &CancellationToken) -> Result<CycleOutcome> {
        self.source.on_cycle().await?;

        let fetched = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = self.source.recently_played() => result?,
        };

        let now = self.clock.now();
        let candidates = match self.source.mode() {
            SourceMode::Timestamped => self.classify_timestamped(fetched, state, now),
            SourceMode::RecentWindow => self.classify_window(fetched, state, now),
        };

        // Newness by timestamp: only plays past the high-water mark count,
        // and the mark never regresses within a session.
        let mut new_plays = Vec::new();
        for mut play in candidates {
            match play.data.play_date {
                Some(play_date) if play_date > state.last_track_played_at => {
                    play.meta.new_from_source = true;
                    state.last_track_played_at = play_date;
                    new_plays.push(play);
                }
                _ => {}
            }
        }
        let found_new = !new_plays.is_empty();

        let close_to_interval = new_plays.iter().any(|play| {
            play.data
                .play_date
                .map(|pd| (now - pd).num_seconds().abs() < self.config.close_threshold_secs as i64)
                .unwrap_or(false)
        });
        if close_to_interval {
            debug!(
                source = self.source.label(),
                delay = self.config.close_delay_secs,
                "Discovery close to now, delaying dispatch to let peers settle"
            );
            if !sleep_or_cancelled(self.config.close_delay(), cancel).await {
                return Err(Error::Cancelled);
            }
        }

        if found_new {
            info!(
                source = self.source.label(),
                count = new_plays.len(),
                "Discovered new plays"
            );
            let options = DispatchOptions {
                force_refresh: close_to_interval,
                scrobble_from: self.source.label().to_string(),
                scrobble_to: self.clients.clone(),
            };
            let accepted = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                result = self.dispatcher.dispatch(new_plays, options) => result?,
            };
            self.tracks_discovered
                .fetch_add(accepted.len() as u64, Ordering::Relaxed);
            if !accepted.is_empty() {
                state.check_count = 0;
            }
        }

        *self.last_activity_at.write().unwrap() = self.clock.now();
        Ok(CycleOutcome { found_new })
    }

    /// Default classification: trust upstream timestamps. Now-playing items
    /// are stamped at first observation but never scrobbled from the hot
    /// loop; records with neither a date nor the now-playing flag are
    /// dropped.
    fn classify_timestamped(
        &self,
        fetched: Vec<PlayRecord>,
        state: &mut CycleState,
        now: DateTime<Utc>,
    ) -> Vec<PlayRecord> {
        let mut candidates = Vec::new();
        for mut play in fetched {
            if play.meta.now_playing {
                if play.data.play_date.is_none() {
                    play.data.play_date = Some(self.first_observed(&play, state, now));
                }
                continue;
            }
            if !play.is_well_formed() {
                warn!(
                    source = self.source.label(),
                    track = %play,
                    "Dropping record without play date"
                );
                continue;
            }
            candidates.push(play);
        }
        candidates.sort_by_key(|p| p.data.play_date);
        candidates
    }

    /// Window-driven classification: the reconciler decides newness; the
    /// poller owns the bounded window between cycles.
    fn classify_window(
        &self,
        fetched: Vec<PlayRecord>,
        state: &mut CycleState,
        now: DateTime<Utc>,
    ) -> Vec<PlayRecord> {
        if fetched.is_empty() {
            // A transiently empty upstream response must not wipe the
            // window, or every entry would look new next cycle.
            debug!(source = self.source.label(), "Empty recent list, keeping window");
            return Vec::new();
        }

        let reconciled = reconcile_window(&state.recently_played, &fetched, now);

        let mut window = fetched;
        window.truncate(self.config.window_size);
        state.recently_played = window;

        reconciled.new_plays
    }

    /// Instant a now-playing record was first seen in that state; stable
    /// across cycles while the same track stays current.
    fn first_observed(
        &self,
        play: &PlayRecord,
        state: &mut CycleState,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let key = play.window_key();
        match &state.now_playing_seen {
            Some((seen_key, seen_at)) if *seen_key == key => *seen_at,
            _ => {
                state.now_playing_seen = Some((key, now));
                now
            }
        }
    }

    /// Base interval, or the backed-off sleep once the source has been
    /// quiet long enough.
    fn sleep_seconds(&self, state: &CycleState) -> u64 {
        let sleep = self.config.interval;
        let quiet_secs = (self.clock.now() - state.last_track_played_at)
            .num_seconds()
            .unsigned_abs();
        if state.check_count > self.config.quiet_cycle_threshold
            && sleep < self.config.max_interval
            && quiet_secs >= self.config.backoff_trigger_secs()
        {
            let backed_off = self.config.backed_off_sleep_secs();
            debug!(
                source = self.source.label(),
                quiet_secs,
                sleep = backed_off,
                "Quiet source, backing off"
            );
            return backed_off;
        }
        sleep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::record::{PlayData, PlayMeta};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn play_at(track: &str, play_date: Option<DateTime<Utc>>) -> PlayRecord {
        PlayRecord {
            data: PlayData {
                artists: vec!["Artist".to_string()],
                track: track.to_string(),
                play_date,
                ..Default::default()
            },
            meta: PlayMeta {
                source: "scripted".to_string(),
                ..Default::default()
            },
        }
    }

    struct ScriptedSource {
        mode: SourceMode,
        batches: Mutex<VecDeque<Result<Vec<PlayRecord>>>>,
    }

    impl ScriptedSource {
        fn new(mode: SourceMode, batches: Vec<Result<Vec<PlayRecord>>>) -> Arc<Self> {
            Arc::new(Self {
                mode,
                batches: Mutex::new(batches.into()),
            })
        }
    }

    #[async_trait]
    impl PlaySource for ScriptedSource {
        fn kind(&self) -> &str {
            "scripted"
        }

        fn label(&self) -> &str {
            "scripted"
        }

        fn mode(&self) -> SourceMode {
            self.mode
        }

        async fn recently_played(&self) -> Result<Vec<PlayRecord>> {
            self.batches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        calls: Mutex<Vec<(Vec<PlayRecord>, DispatchOptions)>>,
    }

    #[async_trait]
    impl Dispatch for RecordingDispatcher {
        async fn dispatch(
            &self,
            plays: Vec<PlayRecord>,
            options: DispatchOptions,
        ) -> Result<Vec<PlayRecord>> {
            self.calls.lock().unwrap().push((plays.clone(), options));
            Ok(plays)
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn test_poller(
        source: Arc<ScriptedSource>,
        dispatcher: Arc<RecordingDispatcher>,
        clock: ManualClock,
    ) -> Arc<SourcePoller> {
        SourcePoller::builder(source, dispatcher)
            .clients(vec!["maloja".to_string()])
            .clock(Arc::new(clock))
            .build()
    }

    fn fresh_state(poller: &SourcePoller) -> CycleState {
        CycleState {
            last_track_played_at: poller.clock.now(),
            check_count: 0,
            recently_played: Vec::new(),
            now_playing_seen: None,
        }
    }

    #[tokio::test]
    async fn test_fresh_play_is_dispatched_and_advances_mark() {
        let clock = ManualClock::new(t0());
        let source = ScriptedSource::new(
            SourceMode::Timestamped,
            vec![Ok(vec![play_at(
                "A",
                Some(t0() + chrono::Duration::seconds(60)),
            )])],
        );
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let poller = test_poller(source, Arc::clone(&dispatcher), clock.clone());

        let mut state = fresh_state(&poller);
        state.check_count = 3;
        clock.advance(Duration::from_secs(120));

        let cancel = CancellationToken::new();
        let outcome = poller.cycle(&mut state, &cancel).await.unwrap();

        assert!(outcome.found_new);
        assert_eq!(
            state.last_track_played_at,
            t0() + chrono::Duration::seconds(60)
        );
        assert_eq!(state.check_count, 0);

        let calls = dispatcher.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (plays, options) = &calls[0];
        assert_eq!(plays.len(), 1);
        assert!(plays[0].meta.new_from_source);
        assert!(!options.force_refresh);
        assert_eq!(options.scrobble_from, "scripted");
        assert_eq!(options.scrobble_to, vec!["maloja".to_string()]);
    }

    #[tokio::test]
    async fn test_stale_play_is_not_redispatched() {
        let clock = ManualClock::new(t0());
        let batch = vec![play_at("A", Some(t0() + chrono::Duration::seconds(60)))];
        let source = ScriptedSource::new(
            SourceMode::Timestamped,
            vec![Ok(batch.clone()), Ok(batch)],
        );
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let poller = test_poller(source, Arc::clone(&dispatcher), clock.clone());

        let mut state = fresh_state(&poller);
        clock.advance(Duration::from_secs(300));
        let cancel = CancellationToken::new();

        let first = poller.cycle(&mut state, &cancel).await.unwrap();
        assert!(first.found_new);
        let mark = state.last_track_played_at;

        let second = poller.cycle(&mut state, &cancel).await.unwrap();
        assert!(!second.found_new);
        assert_eq!(state.last_track_played_at, mark);
        assert_eq!(dispatcher.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_to_interval_delays_and_forces_refresh() {
        let clock = ManualClock::new(t0());
        clock.advance(Duration::from_secs(600));
        let now = clock.now();
        let source = ScriptedSource::new(
            SourceMode::Timestamped,
            vec![Ok(vec![play_at("A", Some(now - chrono::Duration::seconds(2)))])],
        );
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let poller = test_poller(source, Arc::clone(&dispatcher), clock.clone());

        let mut state = fresh_state(&poller);
        state.last_track_played_at = t0();
        let cancel = CancellationToken::new();

        let started = tokio::time::Instant::now();
        poller.cycle(&mut state, &cancel).await.unwrap();
        // The 10 second hedge ran before dispatch.
        assert!(started.elapsed() >= Duration::from_secs(10));

        let calls = dispatcher.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.force_refresh);
    }

    #[tokio::test]
    async fn test_quiet_backoff_after_six_empty_cycles() {
        let clock = ManualClock::new(t0());
        let source = ScriptedSource::new(SourceMode::Timestamped, vec![]);
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let poller = test_poller(source, dispatcher, clock.clone());

        let mut state = fresh_state(&poller);
        // An hour of silence, six empty cycles counted.
        clock.advance(Duration::from_secs(3600));
        state.check_count = 6;
        assert_eq!(poller.sleep_seconds(&state), 150);

        // Not quiet long enough: base interval.
        state.last_track_played_at = clock.now() - chrono::Duration::seconds(60);
        assert_eq!(poller.sleep_seconds(&state), 30);

        // Quiet but not enough empty cycles: base interval.
        state.last_track_played_at = t0();
        state.check_count = 5;
        assert_eq!(poller.sleep_seconds(&state), 30);
    }

    #[tokio::test]
    async fn test_backoff_never_undercuts_base_interval() {
        let clock = ManualClock::new(t0());
        let source = ScriptedSource::new(SourceMode::Timestamped, vec![]);
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let config = PollerConfig {
            interval: 600,
            ..Default::default()
        };
        let poller = SourcePoller::builder(source, dispatcher)
            .config(config)
            .clock(Arc::new(clock.clone()))
            .build();

        let mut state = fresh_state(&poller);
        clock.advance(Duration::from_secs(7200));
        state.check_count = 100;
        // interval ≥ max_interval: backoff disabled entirely.
        assert_eq!(poller.sleep_seconds(&state), 600);
    }

    // Paused time: the bumped play's synthesized date lands 1 second from
    // "now", so the close-to-interval hedge fires and its 10 second delay
    // must auto-advance instead of stalling the suite.
    #[tokio::test(start_paused = true)]
    async fn test_window_source_bump_flows_through_reconciler() {
        let clock = ManualClock::new(t0());
        let first = vec![
            play_at("B", None),
            play_at("A", None),
            play_at("C", None),
        ];
        let second = vec![
            play_at("A", None),
            play_at("B", None),
            play_at("C", None),
        ];
        let source = ScriptedSource::new(SourceMode::RecentWindow, vec![Ok(first), Ok(second)]);
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let poller = test_poller(source, Arc::clone(&dispatcher), clock.clone());

        let mut state = fresh_state(&poller);
        let cancel = CancellationToken::new();

        // Bootstrap cycle adopts the window without scrobbling history.
        let outcome = poller.cycle(&mut state, &cancel).await.unwrap();
        assert!(!outcome.found_new);
        assert_eq!(state.recently_played.len(), 3);

        // Move past the synthesized-timestamp minute so the gate passes.
        clock.advance(Duration::from_secs(120));
        let outcome = poller.cycle(&mut state, &cancel).await.unwrap();
        assert!(outcome.found_new);

        let calls = dispatcher.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.len(), 1);
        assert_eq!(calls[0].0[0].data.track, "A");
        assert!(calls[0].0[0].meta.new_from_source);
    }

    #[tokio::test]
    async fn test_now_playing_is_stamped_but_not_scrobbled() {
        let clock = ManualClock::new(t0());
        let mut now_playing = play_at("Live", None);
        now_playing.meta.now_playing = true;
        let source =
            ScriptedSource::new(SourceMode::Timestamped, vec![Ok(vec![now_playing])]);
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let poller = test_poller(source, Arc::clone(&dispatcher), clock.clone());

        let mut state = fresh_state(&poller);
        let cancel = CancellationToken::new();
        let outcome = poller.cycle(&mut state, &cancel).await.unwrap();

        assert!(!outcome.found_new);
        assert!(dispatcher.calls.lock().unwrap().is_empty());
        // First observation instant was recorded for the invariant.
        assert!(state.now_playing_seen.is_some());
    }

    #[tokio::test]
    async fn test_fetch_error_faults_the_poller() {
        let clock = ManualClock::new(t0());
        let source = ScriptedSource::new(
            SourceMode::Timestamped,
            vec![Err(Error::fetch("scripted", "upstream 503"))],
        );
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let poller = test_poller(source, dispatcher, clock);

        poller.start();
        for _ in 0..50 {
            if poller.lifecycle() == PollerLifecycle::Faulted {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(poller.lifecycle(), PollerLifecycle::Faulted);
        assert!(!poller.status().polling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_prompt_and_restart_works() {
        let clock = ManualClock::new(t0());
        let source = ScriptedSource::new(SourceMode::Timestamped, vec![]);
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let poller = test_poller(source, dispatcher, clock);

        poller.start();
        tokio::task::yield_now().await;
        assert!(poller.status().polling);

        poller.stop();
        for _ in 0..50 {
            if poller.lifecycle() == PollerLifecycle::Idle {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(poller.lifecycle(), PollerLifecycle::Idle);

        // A stopped poller can be started again with a fresh token.
        poller.start();
        tokio::task::yield_now().await;
        assert!(poller.status().polling);
        poller.stop();
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let clock = ManualClock::new(t0());
        let source = ScriptedSource::new(SourceMode::Timestamped, vec![]);
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let poller = test_poller(source, dispatcher, clock);

        let status = poller.status();
        assert_eq!(status.kind, "scripted");
        assert_eq!(status.name, "scripted");
        assert!(!status.polling);
        assert_eq!(status.tracks_discovered, 0);
        assert_eq!(status.last_activity_at, t0());
    }
}
