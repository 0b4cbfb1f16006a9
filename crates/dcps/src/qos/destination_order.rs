// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DESTINATION_ORDER QoS policy (DDS v1.4 Sec.2.2.3.17)
//!
//! **Rule:** writer kind >= reader kind (`ByReceptionTimestamp < BySourceTimestamp`).

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DestinationOrderKind {
    /// Samples are stored in arrival order
    #[default]
    ByReceptionTimestamp,
    /// Samples older than the latest accepted one of the instance are dropped
    BySourceTimestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DestinationOrder {
    pub kind: DestinationOrderKind,
}

impl DestinationOrder {
    pub fn by_reception_timestamp() -> Self {
        Self {
            kind: DestinationOrderKind::ByReceptionTimestamp,
        }
    }

    pub fn by_source_timestamp() -> Self {
        Self {
            kind: DestinationOrderKind::BySourceTimestamp,
        }
    }

    pub fn uses_source_timestamp(&self) -> bool {
        self.kind == DestinationOrderKind::BySourceTimestamp
    }

    pub fn is_compatible_with(&self, requested: &DestinationOrder) -> bool {
        self.kind >= requested.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_rxo() {
        let source = DestinationOrder::by_source_timestamp();
        let reception = DestinationOrder::by_reception_timestamp();
        assert!(source.is_compatible_with(&reception));
        assert!(!reception.is_compatible_with(&source));
    }
}
