//! Waiting set of players queued for a match
//!
//! Entries are keyed by connection id and remember their arrival order, so
//! a pairing pass always takes the oldest players first. One mutex guards
//! both the map and the order; every operation completes its whole mutation
//! inside a single critical section.

use crate::types::{ConnectionId, PairedEntry, Player};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct WaitingInner {
    /// Connection id -> (arrival sequence, player)
    entries: HashMap<ConnectionId, (u64, Player)>,
    /// Arrival sequence -> connection id
    arrivals: BTreeMap<u64, ConnectionId>,
    next_seq: u64,
}

impl WaitingInner {
    fn pop_oldest(&mut self) -> Option<PairedEntry> {
        let (_, id) = self.arrivals.pop_first()?;
        let (_, player) = self.entries.remove(&id)?;
        Some((id, player))
    }
}

/// Concurrency-safe set of waiting players
#[derive(Debug, Default)]
pub struct WaitingSet {
    inner: Mutex<WaitingInner>,
}

impl WaitingSet {
    pub fn new() -> Self {
        Self::default()
    }

    // No operation can leave partial state behind, so a poisoned lock still
    // guards consistent data.
    fn lock(&self) -> MutexGuard<'_, WaitingInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a player unless the connection is already waiting
    ///
    /// Returns the waiting count right after the insert, read under the same
    /// lock, or `None` if the connection was already waiting.
    pub fn insert_if_absent(&self, id: &str, player: Player) -> Option<usize> {
        let mut inner = self.lock();
        if inner.entries.contains_key(id) {
            return None;
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.arrivals.insert(seq, id.to_string());
        inner.entries.insert(id.to_string(), (seq, player));
        Some(inner.entries.len())
    }

    /// Remove a waiting connection, returning whether it was present
    pub fn remove(&self, id: &str) -> bool {
        let mut inner = self.lock();
        match inner.entries.remove(id) {
            Some((seq, _)) => {
                inner.arrivals.remove(&seq);
                true
            }
            None => false,
        }
    }

    /// Whether a connection is currently waiting
    pub fn contains(&self, id: &str) -> bool {
        self.lock().entries.contains_key(id)
    }

    /// Number of waiting players; may be stale as soon as it returns
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically remove and return up to `n` entries, oldest first
    pub fn take_up_to(&self, n: usize) -> Vec<PairedEntry> {
        let mut inner = self.lock();
        let mut taken = Vec::with_capacity(n.min(inner.entries.len()));
        while taken.len() < n {
            match inner.pop_oldest() {
                Some(entry) => taken.push(entry),
                None => break,
            }
        }
        taken
    }

    /// Atomically remove the two oldest entries, or nothing if fewer than two wait
    pub fn take_pair(&self) -> Option<[PairedEntry; 2]> {
        let mut inner = self.lock();
        if inner.entries.len() < 2 {
            return None;
        }

        let first = inner.pop_oldest()?;
        let second = inner.pop_oldest()?;
        Some([first, second])
    }

    /// Copy of the waiting players in arrival order
    pub fn snapshot(&self) -> Vec<Player> {
        let inner = self.lock();
        inner
            .arrivals
            .values()
            .filter_map(|id| inner.entries.get(id).map(|(_, player)| player.clone()))
            .collect()
    }
}
