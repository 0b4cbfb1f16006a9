// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic

//! DEADLINE and LIVELINESS enforcement.

mod common;

use common::{eventually, Reading};
use dcps::dds::StatusEvent;
use dcps::qos::QosPolicyId;
use dcps::{DomainParticipantFactory, QoS, StatusKind};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(3);

#[test]
fn test_deadline_missed_on_both_sides() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(40, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Reading>("live/readings", QoS::default())
        .unwrap();
    let writer = participant
        .create_publisher(QoS::default())
        .unwrap()
        .create_datawriter(&topic, QoS::reliable().deadline(Duration::from_millis(40)))
        .unwrap();
    let reader = participant
        .create_subscriber(QoS::default())
        .unwrap()
        .create_datareader(&topic, QoS::reliable().deadline(Duration::from_millis(80)))
        .unwrap();
    writer.wait_for_subscriptions(1, WAIT).unwrap();

    let sample = Reading::new(3, 1, 0.0);
    let handle = writer.register_instance(&sample).unwrap();
    writer.write(&sample).unwrap();

    assert!(eventually(WAIT, || {
        writer.get_offered_deadline_missed_status().total_count >= 2
    }));
    assert_eq!(
        writer.get_offered_deadline_missed_status().last_instance_handle,
        handle
    );
    assert!(eventually(WAIT, || {
        reader.get_requested_deadline_missed_status().total_count >= 1
    }));
    assert_eq!(
        reader.get_requested_deadline_missed_status().last_instance_handle,
        handle
    );
}

#[test]
fn test_deadline_misses_once_per_period() {
    let period = Duration::from_millis(400);
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(47, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Reading>("live/period", QoS::default())
        .unwrap();
    let writer = participant
        .create_publisher(QoS::default())
        .unwrap()
        .create_datawriter(&topic, QoS::reliable().deadline(period))
        .unwrap();
    let reader = participant
        .create_subscriber(QoS::default())
        .unwrap()
        .create_datareader(&topic, QoS::reliable().deadline(period))
        .unwrap();
    writer.wait_for_subscriptions(1, WAIT).unwrap();

    let written = Instant::now();
    writer.write(&Reading::new(5, 1, 0.0)).unwrap();
    writer.wait_for_acknowledgments(WAIT).unwrap();

    std::thread::sleep((period / 2).saturating_sub(written.elapsed()));
    assert_eq!(writer.get_offered_deadline_missed_status().total_count, 0);
    assert_eq!(reader.get_requested_deadline_missed_status().total_count, 0);

    // Past one period, short of the second.
    std::thread::sleep((period * 3 / 2 - period / 8).saturating_sub(written.elapsed()));
    assert_eq!(writer.get_offered_deadline_missed_status().total_count, 1);
    assert_eq!(reader.get_requested_deadline_missed_status().total_count, 1);
}

#[test]
fn test_regular_writes_meet_deadline() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(41, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Reading>("live/readings", QoS::default())
        .unwrap();
    let writer = participant
        .create_publisher(QoS::default())
        .unwrap()
        .create_datawriter(&topic, QoS::reliable().deadline(Duration::from_millis(200)))
        .unwrap();

    for seq in 0..10 {
        writer.write(&Reading::new(1, seq, 0.0)).unwrap();
        std::thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(writer.get_offered_deadline_missed_status().total_count, 0);
}

#[test]
fn test_deadline_mismatch_is_incompatible() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(42, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Reading>("live/readings", QoS::default())
        .unwrap();
    let writer = participant
        .create_publisher(QoS::default())
        .unwrap()
        .create_datawriter(&topic, QoS::reliable().deadline(Duration::from_millis(500)))
        .unwrap();
    let reader = participant
        .create_subscriber(QoS::default())
        .unwrap()
        .create_datareader(&topic, QoS::reliable().deadline(Duration::from_millis(100)))
        .unwrap();

    assert!(eventually(WAIT, || {
        reader.get_requested_incompatible_qos_status().total_count == 1
    }));
    let status = reader.get_requested_incompatible_qos_status();
    assert_eq!(status.last_policy_id, QosPolicyId::Deadline);
    assert!(status
        .policies
        .iter()
        .any(|p| p.policy_id == QosPolicyId::Deadline && p.count == 1));

    // Relaxing the reader deadline makes the pair compatible.
    reader
        .set_qos(QoS::reliable().deadline(Duration::from_secs(1)))
        .unwrap();
    writer.wait_for_subscriptions(1, WAIT).unwrap();
}

#[test]
fn test_manual_by_topic_liveliness_lost_and_regained() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(43, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Reading>("live/readings", QoS::default())
        .unwrap();
    let lease = Duration::from_millis(80);
    let writer = participant
        .create_publisher(QoS::default())
        .unwrap()
        .create_datawriter(&topic, QoS::reliable().liveliness_manual_topic(lease))
        .unwrap();
    let reader = participant
        .create_subscriber(QoS::default())
        .unwrap()
        .create_datareader(&topic, QoS::reliable().liveliness_manual_topic(lease))
        .unwrap();

    let lost_events = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&lost_events);
    writer.on_status(StatusKind::LivelinessLost, move |event| {
        if let StatusEvent::LivelinessLost(_) = event {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    writer.wait_for_subscriptions(1, WAIT).unwrap();
    writer.write(&Reading::new(1, 1, 0.0)).unwrap();
    assert!(eventually(WAIT, || {
        reader.get_liveliness_changed_status().alive_count == 1
    }));

    // Silence: the lease runs out once.
    assert!(eventually(WAIT, || {
        writer.get_liveliness_lost_status().total_count == 1
    }));
    assert!(eventually(WAIT, || {
        reader.get_liveliness_changed_status().not_alive_count == 1
    }));
    let changed = reader.get_liveliness_changed_status();
    assert_eq!(changed.alive_count, 0);
    assert_eq!(changed.last_publication_handle, writer.get_instance_handle());
    std::thread::sleep(lease * 3);
    assert_eq!(writer.get_liveliness_lost_status().total_count, 1);
    assert_eq!(lost_events.load(Ordering::SeqCst), 1);

    writer.assert_liveliness().unwrap();
    assert!(eventually(WAIT, || {
        let status = reader.get_liveliness_changed_status();
        status.alive_count == 1 && status.not_alive_count == 0
    }));
}

#[test]
fn test_manual_by_participant_asserted_by_participant() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(44, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Reading>("live/readings", QoS::default())
        .unwrap();
    let lease = Duration::from_millis(100);
    let writer = participant
        .create_publisher(QoS::default())
        .unwrap()
        .create_datawriter(&topic, QoS::reliable().liveliness_manual_participant(lease))
        .unwrap();
    writer.write(&Reading::new(1, 1, 0.0)).unwrap();

    for _ in 0..8 {
        std::thread::sleep(Duration::from_millis(30));
        participant.assert_liveliness().unwrap();
    }
    assert_eq!(writer.get_liveliness_lost_status().total_count, 0);
}

#[test]
fn test_automatic_liveliness_stays_alive() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(45, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Reading>("live/readings", QoS::default())
        .unwrap();
    let lease = Duration::from_millis(60);
    let writer = participant
        .create_publisher(QoS::default())
        .unwrap()
        .create_datawriter(&topic, QoS::reliable().liveliness_automatic(lease))
        .unwrap();
    let reader = participant
        .create_subscriber(QoS::default())
        .unwrap()
        .create_datareader(&topic, QoS::reliable().liveliness_automatic(lease))
        .unwrap();
    writer.wait_for_subscriptions(1, WAIT).unwrap();
    writer.write(&Reading::new(1, 1, 0.0)).unwrap();

    std::thread::sleep(lease * 5);
    assert_eq!(writer.get_liveliness_lost_status().total_count, 0);
    let status = reader.get_liveliness_changed_status();
    assert_eq!(status.alive_count, 1);
    assert_eq!(status.not_alive_count, 0);
}

#[test]
fn test_liveliness_kind_mismatch_is_incompatible() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(46, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Reading>("live/readings", QoS::default())
        .unwrap();
    let lease = Duration::from_secs(1);
    let writer = participant
        .create_publisher(QoS::default())
        .unwrap()
        .create_datawriter(&topic, QoS::reliable().liveliness_automatic(lease))
        .unwrap();
    let _reader = participant
        .create_subscriber(QoS::default())
        .unwrap()
        .create_datareader(&topic, QoS::reliable().liveliness_manual_topic(lease))
        .unwrap();

    assert!(eventually(WAIT, || {
        writer.get_offered_incompatible_qos_status().total_count == 1
    }));
    assert_eq!(
        writer.get_offered_incompatible_qos_status().last_policy_id,
        QosPolicyId::Liveliness
    );
}
