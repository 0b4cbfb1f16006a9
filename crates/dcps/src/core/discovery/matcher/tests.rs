// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::*;
use crate::core::guid::{generate_prefix, EntityKind, GUID};
use std::time::Duration;

fn endpoint(kind: EntityKind, topic: &str, type_name: &str, qos: QoS) -> EndpointAnnouncement {
    EndpointAnnouncement {
        guid: GUID::entity(generate_prefix(0), 1, kind),
        topic_name: topic.to_string(),
        type_name: type_name.to_string(),
        qos,
    }
}

fn pair(writer_qos: QoS, reader_qos: QoS) -> MatchOutcome {
    let w = endpoint(EntityKind::Writer, "Square", "ShapeType", writer_qos);
    let r = endpoint(EntityKind::Reader, "Square", "ShapeType", reader_qos);
    evaluate(&w, &r)
}

#[test]
fn test_defaults_match() {
    assert_eq!(pair(QoS::default(), QoS::default()), MatchOutcome::Compatible);
}

#[test]
fn test_reliable_writer_serves_best_effort_reader() {
    assert!(pair(QoS::reliable(), QoS::best_effort()).is_compatible());
    assert_eq!(
        pair(QoS::best_effort(), QoS::reliable()),
        MatchOutcome::Incompatible(vec![QosPolicyId::Reliability])
    );
}

#[test]
fn test_topic_and_type_mismatch_is_not_incompatible() {
    let w = endpoint(EntityKind::Writer, "Square", "ShapeType", QoS::best_effort());
    let r = endpoint(EntityKind::Reader, "Circle", "ShapeType", QoS::reliable());
    assert_eq!(evaluate(&w, &r), MatchOutcome::NoMatch);

    let r = endpoint(EntityKind::Reader, "Square", "Other", QoS::reliable());
    assert_eq!(evaluate(&w, &r), MatchOutcome::NoMatch);
}

#[test]
fn test_partition_mismatch_is_not_incompatible() {
    assert_eq!(
        pair(QoS::best_effort().partition_single("a"), QoS::reliable().partition_single("b")),
        MatchOutcome::NoMatch
    );
    assert!(pair(QoS::default().partition_single("sensors*"), QoS::default().partition_single("sensors/1"))
        .is_compatible());
}

#[test]
fn test_failures_are_listed_in_evaluation_order() {
    let writer = QoS::best_effort()
        .deadline_millis(200)
        .liveliness_automatic(Duration::from_secs(2));
    let reader = QoS::reliable()
        .transient_local()
        .deadline_millis(100)
        .exclusive_ownership(0)
        .liveliness_manual_topic(Duration::from_secs(1))
        .by_source_timestamp();

    assert_eq!(
        pair(writer, reader),
        MatchOutcome::Incompatible(vec![
            QosPolicyId::Durability,
            QosPolicyId::Deadline,
            QosPolicyId::Ownership,
            QosPolicyId::Liveliness,
            QosPolicyId::Reliability,
            QosPolicyId::DestinationOrder,
        ])
    );
}

#[test]
fn test_presentation_requested_but_not_offered() {
    use crate::qos::PresentationAccessScope;
    let writer = QoS::default();
    let reader = QoS::default().presentation(PresentationAccessScope::Topic, true, false);
    assert_eq!(
        pair(writer, reader),
        MatchOutcome::Incompatible(vec![QosPolicyId::Presentation])
    );
}

#[test]
fn test_faster_deadline_writer_matches() {
    assert!(pair(QoS::default().deadline_millis(50), QoS::default().deadline_millis(100)).is_compatible());
}
