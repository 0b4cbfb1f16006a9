// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gap detection and in-order reassembly for Reliable QoS
//!
//! Reader-side component that buffers out-of-order samples, reports missing
//! sequences for ACKNACKs and releases samples strictly in sequence order.
//!
//! # Algorithm
//!
//! - `next_expected`: every sequence below it was delivered or declared lost
//! - `pending`: received (or GAP-ed) sequences at or above `next_expected`
//!
//! ```ignore
//! let mut tracker = GapTracker::new();
//! tracker.on_heartbeat(1, 3);              // base = 1, missing [1..=3]
//! tracker.on_receive(2, "b");              // buffered
//! let out = tracker.on_receive(1, "a");    // delivers "a", "b"
//! assert_eq!(tracker.missing(3), vec![3]);
//! ```

use std::collections::BTreeMap;
use std::ops::Range;

use crate::config::MAX_GAP_RANGES;

/// Samples released in order plus the number of sequences declared lost.
#[derive(Debug)]
pub struct Progress<T> {
    pub delivered: Vec<T>,
    pub lost: u32,
}

impl<T> Progress<T> {
    fn empty() -> Self {
        Self {
            delivered: Vec::new(),
            lost: 0,
        }
    }
}

#[derive(Debug)]
pub struct GapTracker<T> {
    next_expected: Option<u64>,
    /// `None` marks a sequence the writer declared irrelevant.
    pending: BTreeMap<u64, Option<T>>,
}

impl<T> GapTracker<T> {
    pub fn new() -> Self {
        Self {
            next_expected: None,
            pending: BTreeMap::new(),
        }
    }

    /// Lowest sequence not yet delivered, `None` before any traffic.
    pub fn next_expected(&self) -> Option<u64> {
        self.next_expected
    }

    /// Store a received sample and release whatever became contiguous.
    ///
    /// The first sample seen before any heartbeat fixes the base sequence.
    pub fn on_receive(&mut self, seq: u64, item: T) -> Progress<T> {
        if seq == 0 {
            return Progress::empty();
        }
        let next = *self.next_expected.get_or_insert(seq);
        if seq < next || self.pending.contains_key(&seq) {
            log::trace!("[reliability] duplicate seq={} dropped", seq);
            return Progress::empty();
        }
        self.pending.insert(seq, Some(item));
        self.drain()
    }

    /// Apply a heartbeat announcing `[first, last]`.
    ///
    /// Sequences below `first` that never arrived can no longer be repaired
    /// and count as lost.
    pub fn on_heartbeat(&mut self, first: u64, _last: u64) -> Progress<T> {
        let first = first.max(1);
        let next = *self.next_expected.get_or_insert(first);
        if first <= next {
            return Progress::empty();
        }

        let mut progress = Progress::empty();
        for seq in next..first {
            match self.pending.remove(&seq) {
                Some(Some(item)) => progress.delivered.push(item),
                Some(None) => {}
                None => progress.lost = progress.lost.saturating_add(1),
            }
        }
        self.next_expected = Some(first);
        let mut rest = self.drain();
        progress.delivered.append(&mut rest.delivered);
        progress
    }

    /// Mark sequences the writer will never send.
    pub fn on_gap(&mut self, sequences: &[u64]) -> Progress<T> {
        let mut lost = 0u32;
        for &seq in sequences {
            let Some(next) = self.next_expected else {
                self.next_expected = Some(seq);
                self.pending.insert(seq, None);
                lost = lost.saturating_add(1);
                continue;
            };
            if seq >= next && !self.pending.contains_key(&seq) {
                self.pending.insert(seq, None);
                lost = lost.saturating_add(1);
            }
        }
        let mut progress = self.drain();
        progress.lost = progress.lost.saturating_add(lost);
        progress
    }

    /// Missing ranges in `[next_expected, last]`, at most `MAX_GAP_RANGES`.
    pub fn missing_ranges(&self, last: u64) -> Vec<Range<u64>> {
        let Some(next) = self.next_expected else {
            return Vec::new();
        };
        let mut ranges = Vec::new();
        let mut cursor = next;
        for &seq in self.pending.keys() {
            if seq > last {
                break;
            }
            if seq > cursor {
                ranges.push(cursor..seq);
                if ranges.len() >= MAX_GAP_RANGES {
                    return ranges;
                }
            }
            cursor = seq + 1;
        }
        if cursor <= last {
            ranges.push(cursor..last + 1);
        }
        ranges.truncate(MAX_GAP_RANGES);
        ranges
    }

    /// Missing sequences in `[next_expected, last]`, ascending.
    pub fn missing(&self, last: u64) -> Vec<u64> {
        self.missing_ranges(last).into_iter().flatten().collect()
    }

    fn drain(&mut self) -> Progress<T> {
        let mut progress = Progress::empty();
        let Some(mut next) = self.next_expected else {
            return progress;
        };
        while let Some(entry) = self.pending.remove(&next) {
            if let Some(item) = entry {
                progress.delivered.push(item);
            }
            next += 1;
        }
        self.next_expected = Some(next);
        progress
    }
}

impl<T> Default for GapTracker<T> {
    fn default() -> Self {
        Self::new()
    }
}
