// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer/reader matching: topic, type, partition and QoS (RxO) checks.
//!
//! # Compatibility Rules
//!
//! | Policy           | Rule                                                     |
//! |------------------|----------------------------------------------------------|
//! | Durability       | Writer >= Reader (Volatile < TransientLocal < Transient < Persistent) |
//! | Presentation     | Writer scope >= Reader scope, coherent/ordered offered if requested |
//! | Deadline         | Writer period <= Reader period                           |
//! | Ownership        | Kinds must be equal                                      |
//! | Liveliness       | Writer kind >= Reader kind, writer lease <= reader lease |
//! | Reliability      | Writer >= Reader (BestEffort < Reliable)                 |
//! | DestinationOrder | Writer >= Reader (ByReception < BySource)                |
//!
//! Topic name, type name and partition are preconditions: when they differ
//! the pair is simply not a candidate, and no incompatibility is reported.

use crate::core::discovery::messages::EndpointAnnouncement;
use crate::qos::{QoS, QosPolicyId};

/// Result of evaluating one writer/reader pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Different topic, type or partition.
    NoMatch,
    /// Same topic but the listed policies fail, in evaluation order.
    Incompatible(Vec<QosPolicyId>),
    Compatible,
}

impl MatchOutcome {
    pub fn is_compatible(&self) -> bool {
        matches!(self, MatchOutcome::Compatible)
    }
}

/// Evaluate a writer announcement against a reader announcement.
pub fn evaluate(writer: &EndpointAnnouncement, reader: &EndpointAnnouncement) -> MatchOutcome {
    crate::trace_fn!("matcher::evaluate");
    if writer.topic_name != reader.topic_name || writer.type_name != reader.type_name {
        return MatchOutcome::NoMatch;
    }
    if !writer.qos.partition.intersects(&reader.qos.partition) {
        log::debug!(
            "[match-qos] partition mismatch on '{}' ({} vs {})",
            writer.topic_name,
            writer.guid,
            reader.guid
        );
        return MatchOutcome::NoMatch;
    }
    let failed = incompatible_policies(&writer.qos, &reader.qos);
    if failed.is_empty() {
        MatchOutcome::Compatible
    } else {
        log::debug!(
            "[match-qos] {} vs {} on '{}' incompatible: {:?}",
            writer.guid,
            reader.guid,
            writer.topic_name,
            failed
        );
        MatchOutcome::Incompatible(failed)
    }
}

/// Ordered list of policies the offered QoS fails to satisfy.
pub fn incompatible_policies(offered: &QoS, requested: &QoS) -> Vec<QosPolicyId> {
    let mut failed = Vec::new();
    if !offered.durability.is_compatible_with(&requested.durability) {
        failed.push(QosPolicyId::Durability);
    }
    if !offered.presentation.is_compatible_with(&requested.presentation) {
        failed.push(QosPolicyId::Presentation);
    }
    if !offered.deadline.is_compatible_with(&requested.deadline) {
        failed.push(QosPolicyId::Deadline);
    }
    if !offered.ownership.is_compatible_with(&requested.ownership) {
        failed.push(QosPolicyId::Ownership);
    }
    if !offered.liveliness.is_compatible_with(&requested.liveliness) {
        failed.push(QosPolicyId::Liveliness);
    }
    if !offered.reliability.is_compatible_with(&requested.reliability) {
        failed.push(QosPolicyId::Reliability);
    }
    if !offered
        .destination_order
        .is_compatible_with(&requested.destination_order)
    {
        failed.push(QosPolicyId::DestinationOrder);
    }
    failed
}

#[cfg(test)]
mod tests;
