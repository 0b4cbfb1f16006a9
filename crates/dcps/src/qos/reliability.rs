// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RELIABILITY and DURABILITY QoS policies.
//!
//! Both are request/offered (RxO): the writer's offer must be at least as
//! strong as the reader's request.
//!
//! - Writer RELIABLE, reader BEST_EFFORT -> Compatible \[OK\]
//! - Writer BEST_EFFORT, reader RELIABLE -> Incompatible \[X\]

/// RELIABILITY kind. Ordered: `BestEffort < Reliable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Reliability {
    /// Fire-and-forget, no retransmission
    #[default]
    BestEffort,
    /// Heartbeat/ACKNACK driven retransmission
    Reliable,
}

impl Reliability {
    /// Offered (self) vs requested compatibility.
    pub fn is_compatible_with(&self, requested: &Reliability) -> bool {
        self >= requested
    }

    pub fn is_reliable(&self) -> bool {
        matches!(self, Reliability::Reliable)
    }
}

/// DURABILITY kind. Ordered: `Volatile < TransientLocal < Transient < Persistent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Durability {
    /// Late joiners receive nothing written before they matched
    #[default]
    Volatile,
    /// Writer keeps its history for late joiners
    TransientLocal,
    /// Accepted and served like TransientLocal (no durability service)
    Transient,
    /// Accepted and served like TransientLocal (no durability service)
    Persistent,
}

impl Durability {
    /// Offered (self) vs requested compatibility.
    pub fn is_compatible_with(&self, requested: &Durability) -> bool {
        self >= requested
    }

    /// Whether a writer with this durability replays history to late joiners.
    pub fn keeps_history(&self) -> bool {
        *self >= Durability::TransientLocal
    }
}
