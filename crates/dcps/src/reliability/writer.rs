// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer-side reliability protocol
//!
//! `WriterEngine` owns the writer's history cache and one `ReaderProxy` per
//! matched reader. Every operation returns the envelopes to put on the bus;
//! callers send them after releasing the engine lock.
//!
//! ```text
//! write()      -> DATA to every matched reader (+ HEARTBEAT to reliable ones)
//! add_reader() -> history replay for durable readers, then HEARTBEAT
//! on_acknack() -> retransmit retained sequences, GAP the evicted ones
//! heartbeat_due() -> periodic HEARTBEAT to readers with unacked changes
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::history_cache::{CacheEntry, InsertOutcome, WriterHistory};
use super::messages::{AckNackMsg, ChangeKind, DataMsg, GapMsg, HeartbeatMsg};
use crate::core::domain::{Envelope, Message};
use crate::core::guid::GUID;
use crate::dds::{Result, Time};
use crate::qos::QoS;

/// Writer-side state of one matched reader.
#[derive(Debug, Clone)]
pub struct ReaderProxy {
    pub reader: GUID,
    /// Reader asked for Reliable and the writer offers it.
    pub reliable: bool,
    /// First sequence this reader is owed.
    pub start_seq: u64,
    /// Highest sequence acknowledged (every sequence up to it).
    pub acked: u64,
}

#[derive(Debug)]
pub struct WriterEngine {
    guid: GUID,
    reliable: bool,
    durable: bool,
    history: WriterHistory,
    proxies: BTreeMap<GUID, ReaderProxy>,
    heartbeat_count: u32,
    last_heartbeat: Instant,
}

impl WriterEngine {
    pub fn new(guid: GUID, qos: &QoS) -> Self {
        Self {
            guid,
            reliable: qos.reliability.is_reliable(),
            durable: qos.durability.keeps_history(),
            history: WriterHistory::new(qos.history, qos.resource_limits),
            proxies: BTreeMap::new(),
            heartbeat_count: 0,
            last_heartbeat: Instant::now(),
        }
    }

    pub fn guid(&self) -> GUID {
        self.guid
    }

    pub fn history(&self) -> &WriterHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut WriterHistory {
        &mut self.history
    }

    pub fn last_seq(&self) -> u64 {
        self.history.last_seq()
    }

    pub fn matched_readers(&self) -> Vec<GUID> {
        self.proxies.keys().copied().collect()
    }

    pub fn has_reader(&self, reader: &GUID) -> bool {
        self.proxies.contains_key(reader)
    }

    pub fn proxy(&self, reader: &GUID) -> Option<&ReaderProxy> {
        self.proxies.get(reader)
    }

    /// Highest sequence every reliable reader acknowledged.
    pub fn acked_by_all(&self) -> u64 {
        self.proxies
            .values()
            .filter(|p| p.reliable)
            .map(|p| p.acked)
            .min()
            .unwrap_or_else(|| self.history.last_seq())
    }

    /// Every reliable reader acknowledged everything written so far.
    pub fn all_acked(&self) -> bool {
        let last = self.history.last_seq();
        self.proxies
            .values()
            .filter(|p| p.reliable)
            .all(|p| p.acked >= last)
    }

    /// Append a change and build the DATA (and HEARTBEAT) traffic for it.
    pub(crate) fn write(
        &mut self,
        key: [u8; 16],
        kind: ChangeKind,
        payload: Arc<[u8]>,
        source_timestamp: Time,
    ) -> Result<(InsertOutcome, Vec<Envelope>)> {
        let purgeable = self.acked_by_all();
        let outcome = self
            .history
            .insert(key, kind, payload, source_timestamp, purgeable)?;

        let mut out = Vec::with_capacity(self.proxies.len() * 2);
        if let Some(entry) = self.history.get(outcome.seq) {
            for proxy in self.proxies.values() {
                out.push(self.data_envelope(entry, proxy.reader, false));
            }
        }
        let reliable_readers: Vec<GUID> = self
            .proxies
            .values()
            .filter(|p| p.reliable)
            .map(|p| p.reader)
            .collect();
        for reader in reliable_readers {
            if let Some(hb) = self.heartbeat_for(&reader) {
                out.push(hb);
            }
        }
        Ok((outcome, out))
    }

    /// Add a matched reader; durable readers of a durable writer get the
    /// retained history replayed.
    pub(crate) fn add_reader(&mut self, reader: GUID, reader_reliable: bool, wants_history: bool) -> Vec<Envelope> {
        if self.proxies.contains_key(&reader) {
            return Vec::new();
        }
        let next = self.history.last_seq() + 1;
        let start_seq = if wants_history && self.durable {
            self.history.first_seq().unwrap_or(next)
        } else {
            next
        };
        let proxy = ReaderProxy {
            reader,
            reliable: self.reliable && reader_reliable,
            start_seq,
            acked: start_seq - 1,
        };
        log::debug!(
            "[writer] {} matched reader {} (reliable={}, start_seq={})",
            self.guid,
            reader,
            proxy.reliable,
            start_seq
        );
        let reliable = proxy.reliable;
        self.proxies.insert(reader, proxy);

        let mut out: Vec<Envelope> = self
            .history
            .entries_from(start_seq)
            .map(|entry| self.data_envelope(entry, reader, false))
            .collect();
        if reliable {
            if let Some(hb) = self.heartbeat_for(&reader) {
                out.push(hb);
            }
        }
        out
    }

    pub fn remove_reader(&mut self, reader: &GUID) -> bool {
        self.proxies.remove(reader).is_some()
    }

    /// Process an ACKNACK: record the acknowledgment, retransmit what is
    /// still retained and GAP what was evicted.
    pub(crate) fn on_acknack(&mut self, ack: &AckNackMsg) -> Vec<Envelope> {
        let last = self.history.last_seq();
        let Some(proxy) = self.proxies.get_mut(&ack.reader) else {
            return Vec::new();
        };
        let acked = ack.acked_up_to().min(last);
        if acked > proxy.acked {
            proxy.acked = acked;
        }
        let start = proxy.start_seq;

        let mut out = Vec::new();
        let mut gaps = Vec::new();
        for &seq in &ack.missing {
            if seq < start || seq > last {
                continue;
            }
            match self.history.get(seq) {
                Some(entry) => out.push(self.data_envelope(entry, ack.reader, true)),
                None => gaps.push(seq),
            }
        }
        if !gaps.is_empty() {
            log::debug!(
                "[writer] {} GAP {} evicted sequence(s) for {}",
                self.guid,
                gaps.len(),
                ack.reader
            );
            out.push(Envelope::to(
                self.guid.prefix,
                ack.reader.prefix,
                Message::Gap(GapMsg {
                    writer: self.guid,
                    reader: ack.reader,
                    sequences: gaps,
                }),
            ));
        }
        out
    }

    /// Periodic heartbeats for readers that still miss acknowledgments.
    pub(crate) fn heartbeat_due(&mut self, now: Instant, period: Duration) -> Vec<Envelope> {
        if !self.reliable || now.saturating_duration_since(self.last_heartbeat) < period {
            return Vec::new();
        }
        self.last_heartbeat = now;
        let last = self.history.last_seq();
        let pending: Vec<GUID> = self
            .proxies
            .values()
            .filter(|p| p.reliable && p.acked < last)
            .map(|p| p.reader)
            .collect();
        pending
            .iter()
            .filter_map(|reader| self.heartbeat_for(reader))
            .collect()
    }

    fn heartbeat_for(&mut self, reader: &GUID) -> Option<Envelope> {
        let proxy = self.proxies.get(reader)?;
        let last = self.history.last_seq();
        let first = self
            .history
            .first_seq()
            .unwrap_or(last + 1)
            .max(proxy.start_seq);
        self.heartbeat_count = self.heartbeat_count.wrapping_add(1);
        Some(Envelope::to(
            self.guid.prefix,
            reader.prefix,
            Message::Heartbeat(HeartbeatMsg {
                writer: self.guid,
                reader: *reader,
                first_seq: first,
                last_seq: last,
                count: self.heartbeat_count,
            }),
        ))
    }

    fn data_envelope(&self, entry: &CacheEntry, reader: GUID, retransmit: bool) -> Envelope {
        Envelope::to(
            self.guid.prefix,
            reader.prefix,
            Message::Data(DataMsg {
                writer: self.guid,
                reader,
                seq: entry.seq,
                kind: entry.kind,
                key: entry.key,
                payload: Arc::clone(&entry.payload),
                source_timestamp: entry.source_timestamp,
                retransmit,
            }),
        )
    }
}
