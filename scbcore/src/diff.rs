//! Structural diff between two recent-play windows.
//!
//! The diff is diagnostic only: the reconciler logs it when an upstream
//! window changed shape, but classification never depends on it.

use crate::record::{PlayKey, PlayRecord};
use std::collections::HashMap;
use std::fmt;

/// Difference between two windows, by stable play key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListDiff {
    /// Keys present in `current` only, in current order
    pub added: Vec<PlayKey>,
    /// Keys present in `previous` only, in previous order
    pub removed: Vec<PlayKey>,
    /// Keys present in both but at a different index: `(key, from, to)`
    pub moved: Vec<(PlayKey, usize, usize)>,
    /// Number of keys at the same index in both windows
    pub unchanged: usize,
}

impl ListDiff {
    /// Compute the diff between two newest-first windows.
    pub fn between(previous: &[PlayRecord], current: &[PlayRecord]) -> Self {
        let prev_index: HashMap<PlayKey, usize> = previous
            .iter()
            .enumerate()
            .map(|(i, play)| (play.window_key(), i))
            .collect();
        let curr_index: HashMap<PlayKey, usize> = current
            .iter()
            .enumerate()
            .map(|(i, play)| (play.window_key(), i))
            .collect();

        let mut diff = ListDiff::default();
        for (i, play) in current.iter().enumerate() {
            let key = play.window_key();
            match prev_index.get(&key) {
                None => diff.added.push(key),
                Some(&from) if from != i => diff.moved.push((key, from, i)),
                Some(_) => diff.unchanged += 1,
            }
        }
        for play in previous {
            let key = play.window_key();
            if !curr_index.contains_key(&key) {
                diff.removed.push(key);
            }
        }
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.moved.is_empty()
    }
}

impl fmt::Display for ListDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "windows identical ({} entries)", self.unchanged);
        }
        let mut parts = Vec::new();
        if !self.added.is_empty() {
            let names: Vec<String> = self.added.iter().map(|k| k.to_string()).collect();
            parts.push(format!("added [{}]", names.join(" | ")));
        }
        if !self.removed.is_empty() {
            let names: Vec<String> = self.removed.iter().map(|k| k.to_string()).collect();
            parts.push(format!("removed [{}]", names.join(" | ")));
        }
        if !self.moved.is_empty() {
            let names: Vec<String> = self
                .moved
                .iter()
                .map(|(k, from, to)| format!("{k}: {from}->{to}"))
                .collect();
            parts.push(format!("moved [{}]", names.join(" | ")));
        }
        parts.push(format!("{} unchanged", self.unchanged));
        write!(f, "{}", parts.join(", "))
    }
}
