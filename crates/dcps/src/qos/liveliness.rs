// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! LIVELINESS QoS policy (DDS v1.4 Sec.2.2.3.11)
//!
//! # QoS Compatibility (Request vs Offered)
//!
//! - writer kind >= reader kind (`Automatic < ManualByParticipant < ManualByTopic`)
//! - writer lease <= reader lease

use super::deadline::INFINITE;
use std::time::Duration;

/// How liveliness is asserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LivelinessKind {
    /// The participant's event thread asserts on behalf of the writer
    #[default]
    Automatic,
    /// `participant.assert_liveliness()` or any write from the participant
    ManualByParticipant,
    /// `writer.assert_liveliness()` or a write from that writer
    ManualByTopic,
}

/// LIVELINESS QoS policy. Default: Automatic with an infinite lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Liveliness {
    pub kind: LivelinessKind,
    pub lease_duration: Duration,
}

impl Default for Liveliness {
    fn default() -> Self {
        Self {
            kind: LivelinessKind::Automatic,
            lease_duration: INFINITE,
        }
    }
}

impl Liveliness {
    pub fn new(kind: LivelinessKind, lease_duration: Duration) -> Self {
        Self {
            kind,
            lease_duration,
        }
    }

    pub fn automatic(lease_duration: Duration) -> Self {
        Self::new(LivelinessKind::Automatic, lease_duration)
    }

    pub fn manual_by_participant(lease_duration: Duration) -> Self {
        Self::new(LivelinessKind::ManualByParticipant, lease_duration)
    }

    pub fn manual_by_topic(lease_duration: Duration) -> Self {
        Self::new(LivelinessKind::ManualByTopic, lease_duration)
    }

    pub fn is_infinite(&self) -> bool {
        self.lease_duration == INFINITE
    }

    /// Offered (self) vs requested compatibility.
    pub fn is_compatible_with(&self, requested: &Liveliness) -> bool {
        self.kind >= requested.kind && self.lease_duration <= requested.lease_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_ordering() {
        let offered = Liveliness::manual_by_topic(Duration::from_millis(100));
        let requested = Liveliness::automatic(Duration::from_millis(100));
        assert!(offered.is_compatible_with(&requested));
        assert!(!requested.is_compatible_with(&offered));
    }

    #[test]
    fn test_lease_rxo() {
        let offered = Liveliness::automatic(Duration::from_millis(500));
        assert!(offered.is_compatible_with(&Liveliness::default()));
        assert!(!offered.is_compatible_with(&Liveliness::automatic(Duration::from_millis(100))));
    }
}
