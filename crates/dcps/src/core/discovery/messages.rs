// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery announcements (participant, endpoints, topics).

use std::time::Duration;

use crate::core::guid::{GuidPrefix, GUID};
use crate::qos::QoS;

/// Periodic participant announcement carrying its lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantAnnouncement {
    pub guid_prefix: GuidPrefix,
    pub domain_id: u32,
    pub lease_duration: Duration,
    pub user_data: Vec<u8>,
}

/// A writer (publication) or reader (subscription) as seen by remote peers.
///
/// `qos` merges the endpoint QoS with the group policies of its
/// Publisher/Subscriber (partition, presentation, group data) and the topic
/// data of its topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointAnnouncement {
    pub guid: GUID,
    pub topic_name: String,
    pub type_name: String,
    pub qos: QoS,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicAnnouncement {
    pub guid: GUID,
    pub name: String,
    pub type_name: String,
    pub qos: QoS,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryMessage {
    Participant(ParticipantAnnouncement),
    /// The participant was deleted.
    ParticipantGone(GuidPrefix),
    Publication(EndpointAnnouncement),
    Subscription(EndpointAnnouncement),
    PublicationRemoved(GUID),
    SubscriptionRemoved(GUID),
    Topic(TopicAnnouncement),
    TopicRemoved(GUID),
    /// Ends the endpoint replay sent to a newly discovered participant.
    SyncComplete,
}

impl DiscoveryMessage {
    pub fn label(&self) -> &'static str {
        match self {
            DiscoveryMessage::Participant(_) => "participant",
            DiscoveryMessage::ParticipantGone(_) => "participant-gone",
            DiscoveryMessage::Publication(_) => "publication",
            DiscoveryMessage::Subscription(_) => "subscription",
            DiscoveryMessage::PublicationRemoved(_) => "publication-removed",
            DiscoveryMessage::SubscriptionRemoved(_) => "subscription-removed",
            DiscoveryMessage::Topic(_) => "topic",
            DiscoveryMessage::TopicRemoved(_) => "topic-removed",
            DiscoveryMessage::SyncComplete => "sync-complete",
        }
    }
}
