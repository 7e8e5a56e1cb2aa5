//! Bounded frequency counter.
//!
//! [`TopNTracker`] keeps at most `capacity` distinct keys. When a new key
//! would exceed it, the entry ranking last is evicted: lowest count first,
//! and among equal counts the greatest key. Ranking is a total order over
//! `(count, key)`, so survivors never depend on arrival order among ties.
//!
//! This is an approximation. A key evicted early loses its history and
//! restarts at one if it shows up again, so under heavy churn the retained
//! set can miss keys that are globally frequent. Memory stays O(capacity)
//! regardless of input cardinality.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct TopNTracker<K> {
    counts: HashMap<K, u64>,
    // Ascending by count, then descending by key: the first element is the
    // next eviction candidate, the last is the top entry.
    order: BTreeSet<(u64, Reverse<K>)>,
    capacity: Option<usize>,
    evictions: u64,
}

impl<K> TopNTracker<K>
where
    K: Ord + Hash + Clone,
{
    /// A tracker holding at most `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            counts: HashMap::new(),
            order: BTreeSet::new(),
            capacity: Some(capacity),
            evictions: 0,
        }
    }

    /// A tracker that never evicts.
    pub fn unbounded() -> Self {
        Self {
            counts: HashMap::new(),
            order: BTreeSet::new(),
            capacity: None,
            evictions: 0,
        }
    }

    /// Count one occurrence of `key`.
    pub fn record(&mut self, key: K) {
        if let Some(count) = self.counts.get_mut(&key) {
            self.order.remove(&(*count, Reverse(key.clone())));
            *count += 1;
            self.order.insert((*count, Reverse(key)));
            return;
        }

        self.counts.insert(key.clone(), 1);
        self.order.insert((1, Reverse(key)));

        if let Some(cap) = self.capacity
            && self.counts.len() > cap
            && let Some((_, Reverse(evicted))) = self.order.pop_first()
        {
            self.counts.remove(&evicted);
            self.evictions += 1;
        }
    }

    /// Up to `k` entries, highest count first, ties by ascending key.
    pub fn top_k(&self, k: usize) -> Vec<(K, u64)> {
        self.order
            .iter()
            .rev()
            .take(k)
            .map(|(count, Reverse(key))| (key.clone(), *count))
            .collect()
    }

    /// Every retained entry in ranking order.
    pub fn ranked(&self) -> Vec<(K, u64)> {
        self.top_k(self.order.len())
    }

    pub fn get(&self, key: &K) -> Option<u64> {
        self.counts.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Keys dropped so far to stay within capacity.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Sum of retained counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}
