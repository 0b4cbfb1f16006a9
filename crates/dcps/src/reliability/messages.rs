// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reliability protocol messages exchanged on the domain bus
//!
//! - DATA: a sample (or an instance lifecycle change) with its sequence number
//! - HEARTBEAT: writer announces the sequence range it still holds
//! - ACKNACK: reader acknowledges a prefix and requests missing sequences
//! - GAP: writer declares sequences that will never be sent
//! - LIVELINESS: writer asserts that it is alive

use std::sync::Arc;

use crate::core::guid::GUID;
use crate::dds::Time;

/// Lifecycle change carried by a DATA message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Alive,
    Disposed,
    Unregistered,
    DisposedUnregistered,
}

impl ChangeKind {
    pub fn is_dispose(self) -> bool {
        matches!(self, ChangeKind::Disposed | ChangeKind::DisposedUnregistered)
    }

    pub fn is_unregister(self) -> bool {
        matches!(self, ChangeKind::Unregistered | ChangeKind::DisposedUnregistered)
    }
}

/// DATA submessage, always addressed to one reader.
#[derive(Debug, Clone)]
pub struct DataMsg {
    pub writer: GUID,
    pub reader: GUID,
    pub seq: u64,
    pub kind: ChangeKind,
    /// Instance key hash.
    pub key: [u8; 16],
    /// Serialized sample; empty for lifecycle-only changes.
    pub payload: Arc<[u8]>,
    pub source_timestamp: Time,
    /// Set on retransmissions answering an ACKNACK.
    pub retransmit: bool,
}

/// HEARTBEAT submessage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatMsg {
    pub writer: GUID,
    pub reader: GUID,
    /// First sequence number the reader may still obtain.
    pub first_seq: u64,
    /// Last sequence number written.
    pub last_seq: u64,
    /// Monotonic heartbeat counter.
    pub count: u32,
}

/// ACKNACK submessage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckNackMsg {
    pub reader: GUID,
    pub writer: GUID,
    /// Every sequence below `base` was received (or declared lost).
    pub base: u64,
    /// Sequences at or above `base` the reader asks for, ascending.
    pub missing: Vec<u64>,
    pub count: u32,
}

impl AckNackMsg {
    /// Highest sequence acknowledged by this message.
    pub fn acked_up_to(&self) -> u64 {
        self.base.saturating_sub(1)
    }
}

/// GAP submessage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapMsg {
    pub writer: GUID,
    pub reader: GUID,
    /// Irrelevant sequences, ascending.
    pub sequences: Vec<u64>,
}

/// Liveliness assertion of one writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivelinessMsg {
    pub writer: GUID,
}
