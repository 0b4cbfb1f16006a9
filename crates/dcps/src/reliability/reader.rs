// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reader-side reliability protocol
//!
//! A `WriterProxy` tracks one matched writer. Reliable proxies reassemble the
//! stream with a [`GapTracker`] and answer heartbeats with ACKNACKs; best
//! effort proxies only drop stale or duplicate sequences.
//!
//! A reliable proxy learns its base sequence from the first heartbeat. DATA
//! that arrives earlier is parked until then, so a lost first sample is still
//! requested instead of silently becoming the base.

use super::gap_tracker::{GapTracker, Progress};
use super::messages::{AckNackMsg, DataMsg, HeartbeatMsg};
use crate::core::guid::GUID;

#[derive(Debug)]
pub struct WriterProxy {
    writer: GUID,
    reliable: bool,
    tracker: GapTracker<DataMsg>,
    synced: bool,
    early: Vec<DataMsg>,
    /// Highest sequence delivered on a best-effort stream.
    last_delivered: u64,
    /// Last sequence announced by a heartbeat.
    announced: u64,
    acknack_count: u32,
}

impl WriterProxy {
    pub fn new(writer: GUID, reliable: bool) -> Self {
        Self {
            writer,
            reliable,
            tracker: GapTracker::new(),
            synced: false,
            early: Vec::new(),
            last_delivered: 0,
            announced: 0,
            acknack_count: 0,
        }
    }

    pub fn writer(&self) -> GUID {
        self.writer
    }

    pub fn is_reliable(&self) -> bool {
        self.reliable
    }

    /// Everything the writer announced so far was delivered or declared lost.
    pub fn is_caught_up(&self) -> bool {
        if !self.reliable {
            return true;
        }
        self.synced
            && self
                .tracker
                .next_expected()
                .map_or(self.announced == 0, |next| next > self.announced)
    }

    /// Accept a DATA submessage and return what is now deliverable in order.
    pub fn on_data(&mut self, msg: DataMsg) -> Progress<DataMsg> {
        if !self.reliable {
            if msg.seq <= self.last_delivered {
                log::trace!(
                    "[reader] stale seq={} from {} dropped",
                    msg.seq,
                    self.writer
                );
                return Progress {
                    delivered: Vec::new(),
                    lost: 0,
                };
            }
            self.last_delivered = msg.seq;
            return Progress {
                delivered: vec![msg],
                lost: 0,
            };
        }
        if !self.synced {
            if !self.early.iter().any(|m| m.seq == msg.seq) {
                self.early.push(msg);
            }
            return Progress {
                delivered: Vec::new(),
                lost: 0,
            };
        }
        self.tracker.on_receive(msg.seq, msg)
    }

    /// Apply a heartbeat; returns newly deliverable samples and the ACKNACK
    /// to send back.
    pub fn on_heartbeat(&mut self, reader: GUID, hb: &HeartbeatMsg) -> (Progress<DataMsg>, AckNackMsg) {
        let mut progress = self.tracker.on_heartbeat(hb.first_seq, hb.last_seq);
        self.announced = self.announced.max(hb.last_seq);
        if !self.synced {
            self.synced = true;
            let mut early = std::mem::take(&mut self.early);
            early.sort_by_key(|m| m.seq);
            for msg in early {
                let mut step = self.tracker.on_receive(msg.seq, msg);
                progress.delivered.append(&mut step.delivered);
                progress.lost = progress.lost.saturating_add(step.lost);
            }
        }
        let ack = self.acknack(reader, hb.last_seq);
        (progress, ack)
    }

    pub fn on_gap(&mut self, sequences: &[u64]) -> Progress<DataMsg> {
        if !self.reliable || !self.synced {
            return Progress {
                delivered: Vec::new(),
                lost: 0,
            };
        }
        self.tracker.on_gap(sequences)
    }

    fn acknack(&mut self, reader: GUID, last: u64) -> AckNackMsg {
        self.acknack_count = self.acknack_count.wrapping_add(1);
        let base = self.tracker.next_expected().unwrap_or(1);
        AckNackMsg {
            reader,
            writer: self.writer,
            base,
            missing: self.tracker.missing(last),
            count: self.acknack_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::guid::{generate_prefix, EntityKind};
    use crate::dds::Time;
    use crate::reliability::ChangeKind;
    use std::sync::Arc;

    fn guids() -> (GUID, GUID) {
        let prefix = generate_prefix(0);
        (
            GUID::entity(prefix, 1, EntityKind::Writer),
            GUID::entity(prefix, 1, EntityKind::Reader),
        )
    }

    fn data(writer: GUID, reader: GUID, seq: u64) -> DataMsg {
        DataMsg {
            writer,
            reader,
            seq,
            kind: ChangeKind::Alive,
            key: [0; 16],
            payload: Arc::from(vec![seq as u8]),
            source_timestamp: Time::ZERO,
            retransmit: false,
        }
    }

    fn hb(writer: GUID, reader: GUID, first: u64, last: u64) -> HeartbeatMsg {
        HeartbeatMsg {
            writer,
            reader,
            first_seq: first,
            last_seq: last,
            count: 1,
        }
    }

    fn seqs(progress: &Progress<DataMsg>) -> Vec<u64> {
        progress.delivered.iter().map(|m| m.seq).collect()
    }

    #[test]
    fn test_best_effort_drops_stale() {
        let (w, r) = guids();
        let mut proxy = WriterProxy::new(w, false);
        assert_eq!(seqs(&proxy.on_data(data(w, r, 3))), vec![3]);
        assert!(proxy.on_data(data(w, r, 2)).delivered.is_empty());
        assert_eq!(seqs(&proxy.on_data(data(w, r, 5))), vec![5]);
    }

    #[test]
    fn test_reliable_waits_for_first_heartbeat() {
        let (w, r) = guids();
        let mut proxy = WriterProxy::new(w, true);
        assert!(proxy.on_data(data(w, r, 2)).delivered.is_empty());

        let (progress, ack) = proxy.on_heartbeat(r, &hb(w, r, 1, 2));
        assert!(progress.delivered.is_empty());
        assert_eq!(ack.base, 1);
        assert_eq!(ack.missing, vec![1]);
        assert!(!proxy.is_caught_up());

        let progress = proxy.on_data(data(w, r, 1));
        assert_eq!(seqs(&progress), vec![1, 2]);
        assert!(proxy.is_caught_up());
    }

    #[test]
    fn test_gap_releases_following_samples() {
        let (w, r) = guids();
        let mut proxy = WriterProxy::new(w, true);
        proxy.on_heartbeat(r, &hb(w, r, 1, 0));
        proxy.on_data(data(w, r, 3));

        let progress = proxy.on_gap(&[1, 2]);
        assert_eq!(seqs(&progress), vec![3]);
        assert_eq!(progress.lost, 2);

        let (_, ack) = proxy.on_heartbeat(r, &hb(w, r, 1, 3));
        assert_eq!(ack.base, 4);
        assert!(ack.missing.is_empty());
    }
}
