// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Communication statuses.
//!
//! Each status carries cumulative counters plus `*_change` counters that
//! reset whenever the application reads the status (or a listener handles
//! it).

use super::condition::StatusMask;
use super::instance::InstanceHandle;
use crate::qos::QosPolicyId;

/// Identifies one communication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    DataAvailable,
    SampleLost,
    SampleRejected,
    LivelinessChanged,
    RequestedDeadlineMissed,
    RequestedIncompatibleQos,
    SubscriptionMatched,
    LivelinessLost,
    OfferedDeadlineMissed,
    OfferedIncompatibleQos,
    PublicationMatched,
    DataOnReaders,
    InconsistentTopic,
}

impl StatusKind {
    pub fn mask(self) -> StatusMask {
        match self {
            StatusKind::DataAvailable => StatusMask::DATA_AVAILABLE,
            StatusKind::SampleLost => StatusMask::SAMPLE_LOST,
            StatusKind::SampleRejected => StatusMask::SAMPLE_REJECTED,
            StatusKind::LivelinessChanged => StatusMask::LIVELINESS_CHANGED,
            StatusKind::RequestedDeadlineMissed => StatusMask::REQUESTED_DEADLINE_MISSED,
            StatusKind::RequestedIncompatibleQos => StatusMask::REQUESTED_INCOMPATIBLE_QOS,
            StatusKind::SubscriptionMatched => StatusMask::SUBSCRIPTION_MATCHED,
            StatusKind::LivelinessLost => StatusMask::LIVELINESS_LOST,
            StatusKind::OfferedDeadlineMissed => StatusMask::OFFERED_DEADLINE_MISSED,
            StatusKind::OfferedIncompatibleQos => StatusMask::OFFERED_INCOMPATIBLE_QOS,
            StatusKind::PublicationMatched => StatusMask::PUBLICATION_MATCHED,
            StatusKind::DataOnReaders => StatusMask::DATA_ON_READERS,
            StatusKind::InconsistentTopic => StatusMask::INCONSISTENT_TOPIC,
        }
    }
}

/// Why a sample was not stored by a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleRejectedReason {
    #[default]
    NotRejected,
    RejectedByInstancesLimit,
    RejectedBySamplesLimit,
    RejectedBySamplesPerInstanceLimit,
}

/// Per-policy incompatibility counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QosPolicyCount {
    pub policy_id: QosPolicyId,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InconsistentTopicStatus {
    pub total_count: u32,
    pub total_count_change: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleLostStatus {
    pub total_count: u32,
    pub total_count_change: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleRejectedStatus {
    pub total_count: u32,
    pub total_count_change: i32,
    pub last_reason: SampleRejectedReason,
    pub last_instance_handle: InstanceHandle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LivelinessLostStatus {
    pub total_count: u32,
    pub total_count_change: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LivelinessChangedStatus {
    /// Matched writers currently alive.
    pub alive_count: u32,
    /// Matched writers currently not alive.
    pub not_alive_count: u32,
    pub alive_count_change: i32,
    pub not_alive_count_change: i32,
    pub last_publication_handle: InstanceHandle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferedDeadlineMissedStatus {
    pub total_count: u32,
    pub total_count_change: i32,
    pub last_instance_handle: InstanceHandle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestedDeadlineMissedStatus {
    pub total_count: u32,
    pub total_count_change: i32,
    pub last_instance_handle: InstanceHandle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferedIncompatibleQosStatus {
    pub total_count: u32,
    pub total_count_change: i32,
    pub last_policy_id: QosPolicyId,
    pub policies: Vec<QosPolicyCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestedIncompatibleQosStatus {
    pub total_count: u32,
    pub total_count_change: i32,
    pub last_policy_id: QosPolicyId,
    pub policies: Vec<QosPolicyCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicationMatchedStatus {
    pub total_count: u32,
    pub total_count_change: i32,
    pub current_count: u32,
    pub current_count_change: i32,
    pub last_subscription_handle: InstanceHandle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionMatchedStatus {
    pub total_count: u32,
    pub total_count_change: i32,
    pub current_count: u32,
    pub current_count_change: i32,
    pub last_publication_handle: InstanceHandle,
}

/// Zero the `*_change` counters after the status was consumed.
pub(crate) trait ResetChanges {
    fn reset_changes(&mut self);
}

macro_rules! total_count_status {
    ($($name:ident),* $(,)?) => {
        $(
            impl ResetChanges for $name {
                fn reset_changes(&mut self) {
                    self.total_count_change = 0;
                }
            }

            impl $name {
                pub(crate) fn increment(&mut self) {
                    self.increment_by(1);
                }

                pub(crate) fn increment_by(&mut self, n: u32) {
                    self.total_count = self.total_count.saturating_add(n);
                    self.total_count_change = self
                        .total_count_change
                        .saturating_add(i32::try_from(n).unwrap_or(i32::MAX));
                }
            }
        )*
    };
}

total_count_status!(
    InconsistentTopicStatus,
    SampleLostStatus,
    SampleRejectedStatus,
    LivelinessLostStatus,
    OfferedDeadlineMissedStatus,
    RequestedDeadlineMissedStatus,
);

macro_rules! incompatible_status {
    ($($name:ident),* $(,)?) => {
        $(
            impl ResetChanges for $name {
                fn reset_changes(&mut self) {
                    self.total_count_change = 0;
                }
            }

            impl $name {
                /// Count one incompatible pair; `failed` is the ordered list of
                /// failing policies and the last entry becomes `last_policy_id`.
                pub(crate) fn record(&mut self, failed: &[QosPolicyId]) {
                    let Some(&last) = failed.last() else {
                        return;
                    };
                    self.total_count = self.total_count.saturating_add(1);
                    self.total_count_change = self.total_count_change.saturating_add(1);
                    self.last_policy_id = last;
                    for &policy_id in failed {
                        match self.policies.iter_mut().find(|p| p.policy_id == policy_id) {
                            Some(entry) => entry.count = entry.count.saturating_add(1),
                            None => self.policies.push(QosPolicyCount { policy_id, count: 1 }),
                        }
                    }
                }
            }
        )*
    };
}

incompatible_status!(OfferedIncompatibleQosStatus, RequestedIncompatibleQosStatus);

macro_rules! matched_status {
    ($($name:ident => $handle:ident),* $(,)?) => {
        $(
            impl ResetChanges for $name {
                fn reset_changes(&mut self) {
                    self.total_count_change = 0;
                    self.current_count_change = 0;
                }
            }

            impl $name {
                pub(crate) fn matched(&mut self, peer: InstanceHandle) {
                    self.total_count = self.total_count.saturating_add(1);
                    self.total_count_change = self.total_count_change.saturating_add(1);
                    self.current_count = self.current_count.saturating_add(1);
                    self.current_count_change = self.current_count_change.saturating_add(1);
                    self.$handle = peer;
                }

                pub(crate) fn unmatched(&mut self, peer: InstanceHandle) {
                    self.current_count = self.current_count.saturating_sub(1);
                    self.current_count_change = self.current_count_change.saturating_sub(1);
                    self.$handle = peer;
                }
            }
        )*
    };
}

matched_status!(
    PublicationMatchedStatus => last_subscription_handle,
    SubscriptionMatchedStatus => last_publication_handle,
);

impl ResetChanges for LivelinessChangedStatus {
    fn reset_changes(&mut self) {
        self.alive_count_change = 0;
        self.not_alive_count_change = 0;
    }
}

impl LivelinessChangedStatus {
    /// A matched writer became alive (`was_not_alive`: it had been counted not alive).
    pub(crate) fn writer_alive(&mut self, writer: InstanceHandle, was_not_alive: bool) {
        self.alive_count = self.alive_count.saturating_add(1);
        self.alive_count_change = self.alive_count_change.saturating_add(1);
        if was_not_alive {
            self.not_alive_count = self.not_alive_count.saturating_sub(1);
            self.not_alive_count_change = self.not_alive_count_change.saturating_sub(1);
        }
        self.last_publication_handle = writer;
    }

    /// `count` alive writers lost liveliness together.
    pub(crate) fn writers_not_alive(&mut self, last_writer: InstanceHandle, count: u32) {
        let delta = i32::try_from(count).unwrap_or(i32::MAX);
        self.alive_count = self.alive_count.saturating_sub(count);
        self.alive_count_change = self.alive_count_change.saturating_sub(delta);
        self.not_alive_count = self.not_alive_count.saturating_add(count);
        self.not_alive_count_change = self.not_alive_count_change.saturating_add(delta);
        self.last_publication_handle = last_writer;
    }

    /// A matched writer went away entirely.
    pub(crate) fn writer_removed(&mut self, writer: InstanceHandle, was_alive: bool) {
        if was_alive {
            self.alive_count = self.alive_count.saturating_sub(1);
            self.alive_count_change = self.alive_count_change.saturating_sub(1);
        } else {
            self.not_alive_count = self.not_alive_count.saturating_sub(1);
            self.not_alive_count_change = self.not_alive_count_change.saturating_sub(1);
        }
        self.last_publication_handle = writer;
    }
}

/// Reader-side statuses, guarded together by the reader's status lock.
#[derive(Debug, Default)]
pub(crate) struct ReaderStatuses {
    pub subscription_matched: SubscriptionMatchedStatus,
    pub liveliness_changed: LivelinessChangedStatus,
    pub sample_lost: SampleLostStatus,
    pub sample_rejected: SampleRejectedStatus,
    pub requested_deadline_missed: RequestedDeadlineMissedStatus,
    pub requested_incompatible_qos: RequestedIncompatibleQosStatus,
}

impl ReaderStatuses {
    pub(crate) fn reset(&mut self, kind: StatusKind) {
        match kind {
            StatusKind::SubscriptionMatched => self.subscription_matched.reset_changes(),
            StatusKind::LivelinessChanged => self.liveliness_changed.reset_changes(),
            StatusKind::SampleLost => self.sample_lost.reset_changes(),
            StatusKind::SampleRejected => self.sample_rejected.reset_changes(),
            StatusKind::RequestedDeadlineMissed => self.requested_deadline_missed.reset_changes(),
            StatusKind::RequestedIncompatibleQos => {
                self.requested_incompatible_qos.reset_changes();
            }
            _ => {}
        }
    }
}

/// Writer-side statuses, guarded together by the writer's status lock.
#[derive(Debug, Default)]
pub(crate) struct WriterStatuses {
    pub publication_matched: PublicationMatchedStatus,
    pub liveliness_lost: LivelinessLostStatus,
    pub offered_deadline_missed: OfferedDeadlineMissedStatus,
    pub offered_incompatible_qos: OfferedIncompatibleQosStatus,
}

impl WriterStatuses {
    pub(crate) fn reset(&mut self, kind: StatusKind) {
        match kind {
            StatusKind::PublicationMatched => self.publication_matched.reset_changes(),
            StatusKind::LivelinessLost => self.liveliness_lost.reset_changes(),
            StatusKind::OfferedDeadlineMissed => self.offered_deadline_missed.reset_changes(),
            StatusKind::OfferedIncompatibleQos => self.offered_incompatible_qos.reset_changes(),
            _ => {}
        }
    }
}
