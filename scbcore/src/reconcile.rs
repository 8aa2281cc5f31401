//! Recent-window reconciliation for sources without reliable timestamps.
//!
//! Some upstreams return a "recent items" list with no usable play dates,
//! and the list can reshuffle arbitrarily when a track is replayed. This
//! module decides which items of the freshly fetched window are genuinely
//! new plays since the previous cycle, without ever trusting upstream
//! ordering more than strictly necessary.

use crate::clock::minute_floor;
use crate::diff::ListDiff;
use crate::record::{PlayKey, PlayRecord};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, warn};

/// How the current window related to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowVerdict {
    /// First observation of this source; the window is adopted silently so
    /// pre-start history is never scrobbled
    Bootstrap,
    /// Current is an order-preserving subsequence of previous; nothing new
    SortConsistent,
    /// One or more previously seen tracks were promoted toward the newest
    /// end, indicating replays
    Bumped,
    /// Strictly new items were prepended in front of the previous window
    Added,
    /// The upstream ordering is unusable this cycle; nothing is emitted
    Inconsistent,
}

/// Result of reconciling one cycle's fetch against the previous window.
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// Genuinely new plays, oldest-first, stamped with synthesized play
    /// dates and `new_from_source = true`
    pub new_plays: Vec<PlayRecord>,
    pub verdict: WindowVerdict,
    pub diff: ListDiff,
}

/// Reconcile `current` (newest-first) against `previous` (newest-first).
///
/// Emitted plays carry synthesized play dates of `minute_floor(now) + k + 1`
/// seconds for the k-th emitted play, strictly increasing within the batch
/// while staying oldest-first.
pub fn reconcile_window(
    previous: &[PlayRecord],
    current: &[PlayRecord],
    now: DateTime<Utc>,
) -> Reconciled {
    let diff = ListDiff::between(previous, current);

    if previous.is_empty() {
        debug!(entries = current.len(), "Adopting initial recent window");
        return Reconciled {
            new_plays: Vec::new(),
            verdict: WindowVerdict::Bootstrap,
            diff,
        };
    }

    let prev_keys: Vec<PlayKey> = previous.iter().map(|p| p.window_key()).collect();
    let curr_keys: Vec<PlayKey> = current.iter().map(|p| p.window_key()).collect();

    if is_ordered_subsequence(&curr_keys, &prev_keys) {
        return Reconciled {
            new_plays: Vec::new(),
            verdict: WindowVerdict::SortConsistent,
            diff,
        };
    }

    if let Some(bumped) = bumped_only(&prev_keys, &curr_keys) {
        // Oldest bump first: deeper in the current window means replayed
        // earlier.
        let mut indices = bumped;
        indices.sort_unstable_by(|a, b| b.cmp(a));
        let plays = stamp_new(indices.iter().map(|&i| current[i].clone()), now);
        debug!(count = plays.len(), "Window reconciled as bump-only");
        return Reconciled {
            new_plays: plays,
            verdict: WindowVerdict::Bumped,
            diff,
        };
    }

    if let Some(prepended) = added_only(&prev_keys, &curr_keys) {
        // Emit in the order the tracks actually played: the item nearest the
        // previous window head is the oldest addition.
        let plays = stamp_new((0..prepended).rev().map(|i| current[i].clone()), now);
        debug!(count = plays.len(), "Window reconciled as added-only");
        return Reconciled {
            new_plays: plays,
            verdict: WindowVerdict::Added,
            diff,
        };
    }

    warn!(%diff, "Inconsistent recent-window reordering, emitting nothing");
    Reconciled {
        new_plays: Vec::new(),
        verdict: WindowVerdict::Inconsistent,
        diff,
    }
}

/// True when `needle` appears in `hay` in the same relative order.
fn is_ordered_subsequence(needle: &[PlayKey], hay: &[PlayKey]) -> bool {
    let mut hay_iter = hay.iter();
    needle
        .iter()
        .all(|key| hay_iter.by_ref().any(|candidate| candidate == key))
}

/// Detect windows that differ solely by items promoted toward the newest
/// end. Returns the current indices of the bumped items.
///
/// A bump is only credible when removing the bumped items from both windows
/// leaves identical sequences, and no bumped item came from the oldest slot
/// of the previous window: a promotion out of the bottom slot cannot be told
/// apart from an arbitrary reshuffle, so it is left to the inconsistent
/// path.
fn bumped_only(prev_keys: &[PlayKey], curr_keys: &[PlayKey]) -> Option<Vec<usize>> {
    if prev_keys.len() != curr_keys.len() {
        return None;
    }
    let prev_set: HashSet<&PlayKey> = prev_keys.iter().collect();
    let curr_set: HashSet<&PlayKey> = curr_keys.iter().collect();
    if prev_set != curr_set || curr_set.len() != curr_keys.len() {
        return None;
    }

    let mut bumped = Vec::new();
    for (curr_index, key) in curr_keys.iter().enumerate() {
        let prev_index = prev_keys.iter().position(|k| k == key)?;
        if curr_index < prev_index {
            if prev_index == prev_keys.len() - 1 {
                return None;
            }
            bumped.push(curr_index);
        }
    }
    if bumped.is_empty() {
        return None;
    }

    let bumped_set: HashSet<&PlayKey> = bumped.iter().map(|&i| &curr_keys[i]).collect();
    let prev_rest: Vec<&PlayKey> = prev_keys.iter().filter(|k| !bumped_set.contains(k)).collect();
    let curr_rest: Vec<&PlayKey> = curr_keys.iter().filter(|k| !bumped_set.contains(k)).collect();
    if prev_rest == curr_rest {
        Some(bumped)
    } else {
        None
    }
}

/// Detect windows equal to the previous one with strictly new items
/// prepended (the previous tail may have slid out of a bounded window).
/// Returns the number of prepended items.
fn added_only(prev_keys: &[PlayKey], curr_keys: &[PlayKey]) -> Option<usize> {
    let prev_set: HashSet<&PlayKey> = prev_keys.iter().collect();
    let prepended = curr_keys
        .iter()
        .take_while(|k| !prev_set.contains(*k))
        .count();
    if prepended == 0 || prepended == curr_keys.len() {
        return None;
    }
    let rest = &curr_keys[prepended..];
    if rest.len() > prev_keys.len() {
        return None;
    }
    if rest == &prev_keys[..rest.len()] {
        Some(prepended)
    } else {
        None
    }
}

fn stamp_new(plays: impl Iterator<Item = PlayRecord>, now: DateTime<Utc>) -> Vec<PlayRecord> {
    let base = minute_floor(now);
    plays
        .enumerate()
        .map(|(k, mut play)| {
            play.data.play_date = Some(base + chrono::Duration::seconds(k as i64 + 1));
            play.meta.new_from_source = true;
            play
        })
        .collect()
}
