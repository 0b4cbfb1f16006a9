// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! History cache for writer-side retransmission and late-joiner replay
//!
//! Stores written changes in sequence order and enforces the writer's
//! History and ResourceLimits QoS:
//!
//! - KEEP_LAST(depth): the oldest change of the instance is evicted once the
//!   instance holds `min(depth, max_samples_per_instance)` changes; the oldest
//!   change overall is evicted once `max_samples` is reached
//! - KEEP_ALL: changes acknowledged by every reliable reader are purged to make
//!   room; if the cache is still full the insert is rejected
//! - `max_instances` is never evicted: a new instance beyond it is rejected

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use super::messages::ChangeKind;
use crate::dds::{Error, Result, Time};
use crate::qos::{History, ResourceLimits};

/// Cache entry for a single written change.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub seq: u64,
    pub key: [u8; 16],
    pub kind: ChangeKind,
    pub payload: Arc<[u8]>,
    pub source_timestamp: Time,
}

/// Writer-side bookkeeping for one instance.
#[derive(Debug, Clone)]
pub struct InstanceRecord {
    /// Serialized sample that first registered the instance (key value).
    pub key_payload: Arc<[u8]>,
    pub registered: bool,
    pub disposed: bool,
    samples: usize,
}

/// Outcome of an insert; lists the sequences evicted to make room.
#[derive(Debug, Default)]
pub struct InsertOutcome {
    pub seq: u64,
    pub evicted: Vec<u64>,
}

#[derive(Debug)]
pub struct WriterHistory {
    entries: VecDeque<CacheEntry>,
    instances: HashMap<[u8; 16], InstanceRecord>,
    history: History,
    limits: ResourceLimits,
    next_seq: u64,
}

impl WriterHistory {
    pub fn new(history: History, limits: ResourceLimits) -> Self {
        Self {
            entries: VecDeque::new(),
            instances: HashMap::new(),
            history,
            limits,
            next_seq: 1,
        }
    }

    /// Last sequence number assigned (0 before the first write).
    pub fn last_seq(&self) -> u64 {
        self.next_seq - 1
    }

    /// Oldest retained sequence number.
    pub fn first_seq(&self) -> Option<u64> {
        self.entries.front().map(|e| e.seq)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn instance(&self, key: &[u8; 16]) -> Option<&InstanceRecord> {
        self.instances.get(key)
    }

    pub fn instance_keys(&self) -> impl Iterator<Item = &[u8; 16]> {
        self.instances.keys()
    }

    /// Register an instance without writing a sample.
    ///
    /// # Errors
    ///
    /// `OutOfResources` when the instance is new and `max_instances` is reached.
    pub fn register(&mut self, key: [u8; 16], key_payload: Arc<[u8]>) -> Result<()> {
        self.ensure_instance(key, key_payload)?;
        if let Some(record) = self.instances.get_mut(&key) {
            record.registered = true;
        }
        Ok(())
    }

    /// Forget an instance once nothing of it remains in the cache.
    pub fn unregister(&mut self, key: &[u8; 16]) {
        let remove = match self.instances.get_mut(key) {
            Some(record) => {
                record.registered = false;
                record.samples == 0
            }
            None => false,
        };
        if remove {
            self.instances.remove(key);
        }
    }

    /// Append a change. `purgeable_up_to` is the highest sequence acknowledged
    /// by every reliable reader (used by KEEP_ALL only).
    ///
    /// # Errors
    ///
    /// `OutOfResources` when the instance limit is reached, or when a KEEP_ALL
    /// cache is full of unacknowledged changes.
    pub fn insert(
        &mut self,
        key: [u8; 16],
        kind: ChangeKind,
        payload: Arc<[u8]>,
        source_timestamp: Time,
        purgeable_up_to: u64,
    ) -> Result<InsertOutcome> {
        self.ensure_instance(key, Arc::clone(&payload))?;

        let mut outcome = InsertOutcome::default();
        let per_instance = self.instances.get(&key).map_or(0, |r| r.samples);

        match self.history {
            History::KeepLast(depth) => {
                let limit = (depth as usize).min(self.limits.max_samples_per_instance);
                if per_instance >= limit {
                    if let Some(seq) = self.evict_oldest_of(&key) {
                        outcome.evicted.push(seq);
                    }
                }
                if self.entries.len() >= self.limits.max_samples {
                    if let Some(seq) = self.evict_front() {
                        outcome.evicted.push(seq);
                    }
                }
            }
            History::KeepAll => {
                if self.is_full_for(&key) {
                    outcome.evicted = self.purge_acked(purgeable_up_to);
                }
                if self.is_full_for(&key) {
                    log::debug!(
                        "[writer] KEEP_ALL history full ({} samples), rejecting write",
                        self.entries.len()
                    );
                    return Err(Error::OutOfResources);
                }
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(CacheEntry {
            seq,
            key,
            kind,
            payload,
            source_timestamp,
        });
        if let Some(record) = self.instances.get_mut(&key) {
            record.samples += 1;
            record.registered = !kind.is_unregister();
            record.disposed = kind.is_dispose();
        }
        outcome.seq = seq;
        Ok(outcome)
    }

    /// Whether a KEEP_ALL insert would currently exceed a limit.
    pub fn is_full_for(&self, key: &[u8; 16]) -> bool {
        let per_instance = self.instances.get(key).map_or(0, |r| r.samples);
        self.entries.len() >= self.limits.max_samples
            || per_instance >= self.limits.max_samples_per_instance
    }

    /// Drop changes with `seq <= up_to`; returns the purged sequences.
    pub fn purge_acked(&mut self, up_to: u64) -> Vec<u64> {
        let mut purged = Vec::new();
        while let Some(front) = self.entries.front() {
            if front.seq > up_to {
                break;
            }
            if let Some(seq) = self.evict_front() {
                purged.push(seq);
            }
        }
        purged
    }

    pub fn get(&self, seq: u64) -> Option<&CacheEntry> {
        // Entries are sorted by seq; binary search on the deque.
        let idx = self.entries.binary_search_by_key(&seq, |e| e.seq).ok()?;
        self.entries.get(idx)
    }

    /// Retained changes with `seq >= from`, in order.
    pub fn entries_from(&self, from: u64) -> impl Iterator<Item = &CacheEntry> {
        self.entries.iter().filter(move |e| e.seq >= from)
    }

    fn ensure_instance(&mut self, key: [u8; 16], key_payload: Arc<[u8]>) -> Result<()> {
        if self.instances.contains_key(&key) {
            return Ok(());
        }
        if self.instances.len() >= self.limits.max_instances {
            log::debug!(
                "[writer] max_instances={} reached, rejecting new instance",
                self.limits.max_instances
            );
            return Err(Error::OutOfResources);
        }
        self.instances.insert(
            key,
            InstanceRecord {
                key_payload,
                registered: true,
                disposed: false,
                samples: 0,
            },
        );
        Ok(())
    }

    fn evict_front(&mut self) -> Option<u64> {
        let entry = self.entries.pop_front()?;
        self.release_sample(&entry.key);
        Some(entry.seq)
    }

    fn evict_oldest_of(&mut self, key: &[u8; 16]) -> Option<u64> {
        let idx = self.entries.iter().position(|e| &e.key == key)?;
        let entry = self.entries.remove(idx)?;
        self.release_sample(&entry.key);
        Some(entry.seq)
    }

    fn release_sample(&mut self, key: &[u8; 16]) {
        let remove = match self.instances.get_mut(key) {
            Some(record) => {
                record.samples = record.samples.saturating_sub(1);
                record.samples == 0 && !record.registered
            }
            None => false,
        };
        if remove {
            self.instances.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qos::LENGTH_UNLIMITED;

    fn payload(byte: u8) -> Arc<[u8]> {
        Arc::from(vec![byte])
    }

    fn write(history: &mut WriterHistory, key: u8, purge: u64) -> Result<InsertOutcome> {
        history.insert(
            [key; 16],
            ChangeKind::Alive,
            payload(key),
            Time::ZERO,
            purge,
        )
    }

    #[test]
    fn test_sequences_start_at_one() {
        let mut history = WriterHistory::new(History::KeepLast(10), ResourceLimits::default());
        assert_eq!(history.last_seq(), 0);
        assert_eq!(write(&mut history, 1, 0).unwrap().seq, 1);
        assert_eq!(write(&mut history, 1, 0).unwrap().seq, 2);
        assert_eq!(history.first_seq(), Some(1));
        assert_eq!(history.get(2).map(|e| e.seq), Some(2));
    }

    #[test]
    fn test_keep_last_evicts_per_instance() {
        let mut history = WriterHistory::new(History::KeepLast(2), ResourceLimits::default());
        write(&mut history, 1, 0).unwrap();
        write(&mut history, 2, 0).unwrap();
        write(&mut history, 1, 0).unwrap();
        let outcome = write(&mut history, 1, 0).unwrap();

        assert_eq!(outcome.evicted, vec![1]);
        assert_eq!(history.len(), 3);
        assert!(history.get(1).is_none());
        assert!(history.get(2).is_some());
    }

    #[test]
    fn test_keep_all_purges_acked_then_rejects() {
        let limits = ResourceLimits::new(2, LENGTH_UNLIMITED, LENGTH_UNLIMITED);
        let mut history = WriterHistory::new(History::KeepAll, limits);
        write(&mut history, 1, 0).unwrap();
        write(&mut history, 1, 0).unwrap();

        assert!(matches!(write(&mut history, 1, 0), Err(Error::OutOfResources)));

        let outcome = write(&mut history, 1, 1).unwrap();
        assert_eq!(outcome.evicted, vec![1]);
        assert_eq!(outcome.seq, 3);
    }

    #[test]
    fn test_max_instances_rejects_new_instance() {
        let limits = ResourceLimits::new(LENGTH_UNLIMITED, 1, LENGTH_UNLIMITED);
        let mut history = WriterHistory::new(History::KeepLast(1), limits);
        write(&mut history, 1, 0).unwrap();
        assert!(matches!(write(&mut history, 2, 0), Err(Error::OutOfResources)));
        assert!(write(&mut history, 1, 0).is_ok());
    }

    #[test]
    fn test_unregister_forgets_instance_after_eviction() {
        let mut history = WriterHistory::new(History::KeepLast(1), ResourceLimits::default());
        history.register([5; 16], payload(5)).unwrap();
        assert!(history.instance(&[5; 16]).is_some());
        history.unregister(&[5; 16]);
        assert!(history.instance(&[5; 16]).is_none());
    }
}
