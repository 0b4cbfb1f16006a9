// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic

//! RESOURCE_LIMITS and HISTORY on both sides of a match.

mod common;

use common::{eventually, Reading};
use dcps::core::{Submessage, SubmessageKind};
use dcps::dds::SampleRejectedReason;
use dcps::{DomainParticipantFactory, Error, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(3);

#[test]
fn test_inconsistent_limits_rejected() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(70, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Reading>("limits/readings", QoS::default())
        .unwrap();
    let publisher = participant.create_publisher(QoS::default()).unwrap();

    let too_small = QoS::reliable().max_samples(2).max_samples_per_instance(4);
    assert!(matches!(
        publisher.create_datawriter(&topic, too_small),
        Err(Error::InconsistentPolicy(_))
    ));
    let too_deep = QoS::reliable().keep_last(8).max_samples_per_instance(4);
    assert!(matches!(
        publisher.create_datawriter(&topic, too_deep),
        Err(Error::InconsistentPolicy(_))
    ));
}

#[test]
fn test_writer_instance_limit() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(71, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Reading>("limits/readings", QoS::default())
        .unwrap();
    let writer = participant
        .create_publisher(QoS::default())
        .unwrap()
        .create_datawriter(&topic, QoS::reliable().keep_last(1).max_instances(2))
        .unwrap();

    writer.write(&Reading::new(1, 1, 0.0)).unwrap();
    writer.write(&Reading::new(2, 2, 0.0)).unwrap();
    // Existing instances keep accepting samples.
    writer.write(&Reading::new(1, 3, 0.0)).unwrap();
    assert!(matches!(
        writer.write(&Reading::new(3, 4, 0.0)),
        Err(Error::OutOfResources)
    ));
    assert!(matches!(
        writer.register_instance(&Reading::new(3, 0, 0.0)),
        Err(Error::OutOfResources)
    ));
}

#[test]
fn test_keep_all_blocks_until_acknowledged() {
    let factory = DomainParticipantFactory::new();
    let stalled = Arc::new(AtomicBool::new(true));
    let gate = Arc::clone(&stalled);
    factory.set_drop_filter(Some(Arc::new(move |msg: &Submessage| {
        msg.kind == SubmessageKind::AckNack && gate.load(Ordering::Acquire)
    })));

    let participant = factory.create_participant(72, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Reading>("limits/readings", QoS::default())
        .unwrap();
    let writer = participant
        .create_publisher(QoS::default())
        .unwrap()
        .create_datawriter(
            &topic,
            QoS::reliable()
                .keep_all()
                .max_samples(3)
                .max_samples_per_instance(3)
                .max_blocking_time(Duration::from_millis(60)),
        )
        .unwrap();
    let _reader = participant
        .create_subscriber(QoS::default())
        .unwrap()
        .create_datareader(&topic, QoS::reliable().keep_all())
        .unwrap();
    writer.wait_for_subscriptions(1, WAIT).unwrap();

    for seq in 1..=3u64 {
        writer.write(&Reading::new(1, seq, 0.0)).unwrap();
    }
    let started = Instant::now();
    assert!(matches!(
        writer.write(&Reading::new(1, 4, 0.0)),
        Err(Error::OutOfResources)
    ));
    assert!(started.elapsed() >= Duration::from_millis(50));

    // Once the reader acknowledges, the history drains and writes resume.
    stalled.store(false, Ordering::Release);
    writer.wait_for_acknowledgments(WAIT).unwrap();
    writer.write(&Reading::new(1, 4, 0.0)).unwrap();
}

#[test]
fn test_reader_samples_limit_rejects() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(73, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Reading>("limits/readings", QoS::default())
        .unwrap();
    let writer = participant
        .create_publisher(QoS::default())
        .unwrap()
        .create_datawriter(&topic, QoS::reliable().keep_all())
        .unwrap();
    let reader = participant
        .create_subscriber(QoS::default())
        .unwrap()
        .create_datareader(
            &topic,
            QoS::reliable()
                .keep_all()
                .max_samples(3)
                .max_samples_per_instance(2),
        )
        .unwrap();
    writer.wait_for_subscriptions(1, WAIT).unwrap();

    writer.write(&Reading::new(1, 1, 0.0)).unwrap();
    writer.write(&Reading::new(1, 2, 0.0)).unwrap();
    writer.write(&Reading::new(1, 3, 0.0)).unwrap();
    assert!(eventually(WAIT, || {
        reader.get_sample_rejected_status().total_count == 1
    }));
    let status = reader.get_sample_rejected_status();
    assert_eq!(
        status.last_reason,
        SampleRejectedReason::RejectedBySamplesPerInstanceLimit
    );
    let first = writer.lookup_instance(&Reading::new(1, 0, 0.0));
    assert_eq!(status.last_instance_handle, first);

    writer.write(&Reading::new(2, 4, 0.0)).unwrap();
    writer.write(&Reading::new(2, 5, 0.0)).unwrap();
    assert!(eventually(WAIT, || {
        reader.get_sample_rejected_status().total_count == 2
    }));
    assert_eq!(
        reader.get_sample_rejected_status().last_reason,
        SampleRejectedReason::RejectedBySamplesLimit
    );
    assert_eq!(reader.read(10).unwrap().len(), 3);
}

#[test]
fn test_keep_last_depth_on_reader() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(74, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Reading>("limits/readings", QoS::default())
        .unwrap();
    let writer = participant
        .create_publisher(QoS::default())
        .unwrap()
        .create_datawriter(&topic, QoS::reliable().keep_all())
        .unwrap();
    let reader = participant
        .create_subscriber(QoS::default())
        .unwrap()
        .create_datareader(&topic, QoS::reliable().keep_last(3))
        .unwrap();
    writer.wait_for_subscriptions(1, WAIT).unwrap();

    for seq in 1..=10u64 {
        writer.write(&Reading::new(4, seq, 0.0)).unwrap();
    }
    writer.wait_for_acknowledgments(WAIT).unwrap();
    let seqs: Vec<u64> = reader
        .take(usize::MAX)
        .unwrap()
        .into_iter()
        .filter_map(|s| s.data.map(|d| d.seq))
        .collect();
    assert_eq!(seqs, vec![8, 9, 10]);
    assert_eq!(reader.get_sample_rejected_status().total_count, 0);
}
