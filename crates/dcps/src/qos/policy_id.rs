// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS policy identifiers (DDS v1.4 Sec.2.3.3).
//!
//! Carried by incompatible-QoS statuses to name the failing policy.

/// Standard DDS QoS policy IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u32)]
pub enum QosPolicyId {
    #[default]
    Invalid = 0,
    UserData = 1,
    Durability = 2,
    Presentation = 3,
    Deadline = 4,
    LatencyBudget = 5,
    Ownership = 6,
    OwnershipStrength = 7,
    Liveliness = 8,
    TimeBasedFilter = 9,
    Partition = 10,
    Reliability = 11,
    DestinationOrder = 12,
    History = 13,
    ResourceLimits = 14,
    EntityFactory = 15,
    WriterDataLifecycle = 16,
    ReaderDataLifecycle = 17,
    TopicData = 18,
    GroupData = 19,
    TransportPriority = 20,
    Lifespan = 21,
    DurabilityService = 22,
}

impl QosPolicyId {
    pub fn id(self) -> u32 {
        self as u32
    }

    /// Canonical upper-case policy name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Invalid => "INVALID",
            Self::UserData => "USER_DATA",
            Self::Durability => "DURABILITY",
            Self::Presentation => "PRESENTATION",
            Self::Deadline => "DEADLINE",
            Self::LatencyBudget => "LATENCY_BUDGET",
            Self::Ownership => "OWNERSHIP",
            Self::OwnershipStrength => "OWNERSHIP_STRENGTH",
            Self::Liveliness => "LIVELINESS",
            Self::TimeBasedFilter => "TIME_BASED_FILTER",
            Self::Partition => "PARTITION",
            Self::Reliability => "RELIABILITY",
            Self::DestinationOrder => "DESTINATION_ORDER",
            Self::History => "HISTORY",
            Self::ResourceLimits => "RESOURCE_LIMITS",
            Self::EntityFactory => "ENTITY_FACTORY",
            Self::WriterDataLifecycle => "WRITER_DATA_LIFECYCLE",
            Self::ReaderDataLifecycle => "READER_DATA_LIFECYCLE",
            Self::TopicData => "TOPIC_DATA",
            Self::GroupData => "GROUP_DATA",
            Self::TransportPriority => "TRANSPORT_PRIORITY",
            Self::Lifespan => "LIFESPAN",
            Self::DurabilityService => "DURABILITY_SERVICE",
        }
    }
}

impl std::fmt::Display for QosPolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
