// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The `QoS` value record and its builder methods.
//!
//! One record serves every entity kind; each entity reads the policies that
//! apply to it. `QoS` is plain data (`Clone + PartialEq`), so the matcher
//! compares snapshots rather than live objects.
//!
//! ```ignore
//! let qos = QoS::reliable()
//!     .keep_last(10)
//!     .transient_local()
//!     .deadline_millis(100)
//!     .liveliness_manual_topic(Duration::from_millis(500));
//! ```

use super::{
    Deadline, DestinationOrder, Durability, EntityFactory, GroupData, History, Liveliness,
    Ownership, OwnershipStrength, Partition, Presentation, PresentationAccessScope, Reliability,
    ResourceLimits, TopicData, UserData, WriterDataLifecycle,
};
use std::time::Duration;

/// Default blocking time of a reliable writer whose history is full.
pub const DEFAULT_MAX_BLOCKING_TIME: Duration = Duration::from_millis(100);

/// Quality of Service policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QoS {
    pub reliability: Reliability,
    pub max_blocking_time: Duration,
    pub durability: Durability,
    pub history: History,
    pub resource_limits: ResourceLimits,
    pub deadline: Deadline,
    pub liveliness: Liveliness,
    pub ownership: Ownership,
    pub ownership_strength: OwnershipStrength,
    pub destination_order: DestinationOrder,
    pub presentation: Presentation,
    pub partition: Partition,
    pub entity_factory: EntityFactory,
    pub writer_data_lifecycle: WriterDataLifecycle,
    pub user_data: UserData,
    pub topic_data: TopicData,
    pub group_data: GroupData,
}

impl Default for QoS {
    fn default() -> Self {
        Self::best_effort()
    }
}

impl QoS {
    /// Best-effort QoS: no retransmission, KeepLast(100).
    pub fn best_effort() -> Self {
        Self {
            reliability: Reliability::BestEffort,
            max_blocking_time: DEFAULT_MAX_BLOCKING_TIME,
            durability: Durability::Volatile,
            history: History::default(),
            resource_limits: ResourceLimits::default(),
            deadline: Deadline::default(),
            liveliness: Liveliness::default(),
            ownership: Ownership::default(),
            ownership_strength: OwnershipStrength::default(),
            destination_order: DestinationOrder::default(),
            presentation: Presentation::default(),
            partition: Partition::default(),
            entity_factory: EntityFactory::default(),
            writer_data_lifecycle: WriterDataLifecycle::default(),
            user_data: UserData::default(),
            topic_data: TopicData::default(),
            group_data: GroupData::default(),
        }
    }

    /// Reliable QoS: heartbeat/ACKNACK retransmission, KeepLast(100).
    pub fn reliable() -> Self {
        Self {
            reliability: Reliability::Reliable,
            ..Self::best_effort()
        }
    }

    // Reliability / durability

    pub fn reliability(mut self, reliability: Reliability) -> Self {
        self.reliability = reliability;
        self
    }

    pub fn max_blocking_time(mut self, time: Duration) -> Self {
        self.max_blocking_time = time;
        self
    }

    pub fn durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    pub fn volatile(self) -> Self {
        self.durability(Durability::Volatile)
    }

    pub fn transient_local(self) -> Self {
        self.durability(Durability::TransientLocal)
    }

    // History / limits

    pub fn keep_last(mut self, depth: u32) -> Self {
        self.history = History::KeepLast(depth);
        self
    }

    pub fn keep_all(mut self) -> Self {
        self.history = History::KeepAll;
        self
    }

    pub fn resource_limits(mut self, limits: ResourceLimits) -> Self {
        self.resource_limits = limits;
        self
    }

    pub fn max_samples(mut self, max_samples: usize) -> Self {
        self.resource_limits.max_samples = max_samples;
        self
    }

    pub fn max_instances(mut self, max_instances: usize) -> Self {
        self.resource_limits.max_instances = max_instances;
        self
    }

    pub fn max_samples_per_instance(mut self, max: usize) -> Self {
        self.resource_limits.max_samples_per_instance = max;
        self
    }

    // Timing

    pub fn deadline(mut self, period: Duration) -> Self {
        self.deadline = Deadline::new(period);
        self
    }

    pub fn deadline_millis(self, ms: u64) -> Self {
        self.deadline(Duration::from_millis(ms))
    }

    pub fn liveliness(mut self, liveliness: Liveliness) -> Self {
        self.liveliness = liveliness;
        self
    }

    pub fn liveliness_automatic(self, lease: Duration) -> Self {
        self.liveliness(Liveliness::automatic(lease))
    }

    pub fn liveliness_manual_participant(self, lease: Duration) -> Self {
        self.liveliness(Liveliness::manual_by_participant(lease))
    }

    pub fn liveliness_manual_topic(self, lease: Duration) -> Self {
        self.liveliness(Liveliness::manual_by_topic(lease))
    }

    // Ownership / ordering

    pub fn shared_ownership(mut self) -> Self {
        self.ownership = Ownership::shared();
        self
    }

    pub fn exclusive_ownership(mut self, strength: i32) -> Self {
        self.ownership = Ownership::exclusive();
        self.ownership_strength = OwnershipStrength::new(strength);
        self
    }

    pub fn ownership_strength(mut self, strength: i32) -> Self {
        self.ownership_strength = OwnershipStrength::new(strength);
        self
    }

    pub fn by_source_timestamp(mut self) -> Self {
        self.destination_order = DestinationOrder::by_source_timestamp();
        self
    }

    pub fn by_reception_timestamp(mut self) -> Self {
        self.destination_order = DestinationOrder::by_reception_timestamp();
        self
    }

    // Group policies

    pub fn presentation(
        mut self,
        access_scope: PresentationAccessScope,
        coherent_access: bool,
        ordered_access: bool,
    ) -> Self {
        self.presentation = Presentation::new(access_scope, coherent_access, ordered_access);
        self
    }

    pub fn partition(mut self, names: &[&str]) -> Self {
        self.partition = Partition::new(names.iter().map(|n| (*n).to_string()).collect());
        self
    }

    pub fn partition_single(mut self, name: &str) -> Self {
        self.partition = Partition::single(name);
        self
    }

    pub fn autoenable(mut self, autoenable: bool) -> Self {
        self.entity_factory.autoenable_created_entities = autoenable;
        self
    }

    pub fn autodispose_unregistered_instances(mut self, autodispose: bool) -> Self {
        self.writer_data_lifecycle.autodispose_unregistered_instances = autodispose;
        self
    }

    // Opaque data

    pub fn user_data(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.user_data = UserData::new(value);
        self
    }

    pub fn topic_data(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.topic_data = TopicData::new(value);
        self
    }

    pub fn group_data(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.group_data = GroupData::new(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qos::{LivelinessKind, OwnershipKind};

    #[test]
    fn test_default_is_best_effort() {
        let qos = QoS::default();
        assert_eq!(qos.reliability, Reliability::BestEffort);
        assert_eq!(qos.history, History::KeepLast(100));
        assert!(qos.entity_factory.autoenable_created_entities);
        assert!(qos.deadline.is_infinite());
    }

    #[test]
    fn test_builder_chain() {
        let qos = QoS::reliable()
            .keep_all()
            .transient_local()
            .deadline_millis(250)
            .liveliness_manual_topic(Duration::from_millis(500))
            .exclusive_ownership(7)
            .by_source_timestamp()
            .partition(&["a", "b"])
            .user_data(b"hello".to_vec());

        assert_eq!(qos.reliability, Reliability::Reliable);
        assert_eq!(qos.history, History::KeepAll);
        assert_eq!(qos.durability, Durability::TransientLocal);
        assert_eq!(qos.deadline.period, Duration::from_millis(250));
        assert_eq!(qos.liveliness.kind, LivelinessKind::ManualByTopic);
        assert_eq!(qos.ownership.kind, OwnershipKind::Exclusive);
        assert_eq!(qos.ownership_strength.value, 7);
        assert!(qos.destination_order.uses_source_timestamp());
        assert_eq!(qos.partition.names.len(), 2);
        assert_eq!(qos.user_data.value, b"hello");
    }

    #[test]
    fn test_copy_with_leaves_original() {
        let base = QoS::reliable();
        let derived = base.clone().keep_last(1);
        assert_eq!(base.history, History::KeepLast(100));
        assert_eq!(derived.history, History::KeepLast(1));
        assert_ne!(base, derived);
    }
}
