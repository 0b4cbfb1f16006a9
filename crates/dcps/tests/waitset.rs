// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic

//! WaitSet scheduling across entities and threads.

mod common;

use common::Reading;
use dcps::dds::{InstanceStateMask, SampleStateMask, ViewStateMask};
use dcps::{
    Condition, DomainParticipantFactory, GuardCondition, HasStatusCondition, QoS, StatusMask,
    WaitSet,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(3);

fn ids(conditions: &[Arc<dyn Condition>]) -> Vec<u64> {
    conditions.iter().map(|c| c.condition_id()).collect()
}

#[test]
fn test_data_available_wakes_waiter() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(50, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Reading>("ws/readings", QoS::default())
        .unwrap();
    let writer = participant
        .create_publisher(QoS::default())
        .unwrap()
        .create_datawriter(&topic, QoS::reliable())
        .unwrap();
    let reader = participant
        .create_subscriber(QoS::default())
        .unwrap()
        .create_datareader(&topic, QoS::reliable())
        .unwrap();
    writer.wait_for_subscriptions(1, WAIT).unwrap();

    let status = reader.get_status_condition();
    status.set_enabled_statuses(StatusMask::DATA_AVAILABLE);
    let waitset = WaitSet::new();
    waitset.attach(&reader).unwrap();

    let publisher = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        writer.write(&Reading::new(1, 1, 1.0)).unwrap();
        writer
    });

    let started = Instant::now();
    let triggered = waitset.wait(Some(WAIT)).unwrap();
    assert!(started.elapsed() < WAIT);
    assert_eq!(ids(&triggered), vec![status.condition_id()]);
    assert!(status.get_active_statuses().contains(StatusMask::DATA_AVAILABLE));
    let _writer = publisher.join().unwrap();

    reader.take(10).unwrap();
    assert!(matches!(
        waitset.wait(Some(Duration::from_millis(30))),
        Err(dcps::Error::Timeout)
    ));
}

#[test]
fn test_deleting_reader_wakes_waiter() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(53, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Reading>("ws/deleted", QoS::default())
        .unwrap();
    let subscriber = participant.create_subscriber(QoS::default()).unwrap();
    let reader = subscriber
        .create_datareader(&topic, QoS::reliable())
        .unwrap();
    let status = reader.get_status_condition();
    status.set_enabled_statuses(StatusMask::DATA_AVAILABLE);
    assert!(!status.get_trigger_value());

    let waitset = WaitSet::new();
    waitset.attach(&reader).unwrap();
    let waiter = thread::spawn(move || {
        let started = Instant::now();
        let triggered = waitset.wait(Some(WAIT));
        (triggered.map(|t| ids(&t)), started.elapsed())
    });

    thread::sleep(Duration::from_millis(50));
    subscriber.delete_datareader(&reader).unwrap();

    let (triggered, elapsed) = waiter.join().unwrap();
    assert_eq!(triggered.unwrap(), vec![status.condition_id()]);
    assert!(elapsed < WAIT);
    assert!(status.get_trigger_value());
}

#[test]
fn test_read_condition_in_waitset() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(51, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Reading>("ws/readings", QoS::default())
        .unwrap();
    let writer = participant
        .create_publisher(QoS::default())
        .unwrap()
        .create_datawriter(&topic, QoS::reliable())
        .unwrap();
    let reader = participant
        .create_subscriber(QoS::default())
        .unwrap()
        .create_datareader(&topic, QoS::reliable().keep_all())
        .unwrap();
    writer.wait_for_subscriptions(1, WAIT).unwrap();

    let unread = reader
        .create_readcondition(
            SampleStateMask::NOT_READ,
            ViewStateMask::ANY,
            InstanceStateMask::ANY,
        )
        .unwrap();
    let waitset = WaitSet::new();
    waitset.attach_condition(unread.clone()).unwrap();
    // Attaching twice is a no-op.
    waitset.attach_condition(unread.clone()).unwrap();
    assert_eq!(waitset.get_conditions().len(), 1);

    writer.write(&Reading::new(2, 1, 0.0)).unwrap();
    let triggered = waitset.wait(Some(WAIT)).unwrap();
    assert_eq!(ids(&triggered), vec![unread.condition_id()]);

    let samples = reader.read_w_condition(10, unread.as_ref()).unwrap();
    assert_eq!(samples.len(), 1);
    assert!(!unread.get_trigger_value());

    waitset.detach_condition(unread.clone()).unwrap();
    assert!(matches!(
        waitset.detach_condition(unread.clone()),
        Err(dcps::Error::PreconditionNotMet(_))
    ));
    reader.delete_readcondition(unread.as_ref()).unwrap();
}

#[test]
fn test_guard_condition_and_out_parameters() {
    let waitset = WaitSet::new();
    let guard = Arc::new(GuardCondition::new());
    waitset.attach_condition(guard.clone()).unwrap();

    let mut out: Vec<Arc<dyn Condition>> = vec![guard.clone()];
    assert!(matches!(
        waitset.wait_into(Some(&mut out), Some(Duration::from_millis(20))),
        Err(dcps::Error::Timeout)
    ));
    assert!(out.is_empty());
    assert!(matches!(
        waitset.wait_into(None, Some(Duration::from_millis(20))),
        Err(dcps::Error::BadParameter(_))
    ));
    assert!(matches!(
        waitset.get_conditions_into(None),
        Err(dcps::Error::BadParameter(_))
    ));

    let remote = Arc::clone(&guard);
    let trigger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        remote.set_trigger_value(true);
    });
    waitset.wait_into(Some(&mut out), Some(WAIT)).unwrap();
    trigger.join().unwrap();
    assert_eq!(ids(&out), vec![guard.condition_id()]);

    let mut attached = Vec::new();
    waitset.get_conditions_into(Some(&mut attached)).unwrap();
    assert_eq!(attached.len(), 1);
}

#[test]
fn test_concurrent_waitsets() {
    let guards: Vec<Arc<GuardCondition>> = (0..4).map(|_| Arc::new(GuardCondition::new())).collect();
    let waiters: Vec<_> = guards
        .iter()
        .map(|guard| {
            let guard = Arc::clone(guard);
            thread::spawn(move || {
                let waitset = WaitSet::new();
                waitset.attach_condition(guard.clone()).unwrap();
                let triggered = waitset.wait(Some(WAIT)).unwrap();
                ids(&triggered) == vec![guard.condition_id()]
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(30));
    for guard in &guards {
        guard.set_trigger_value(true);
    }
    for waiter in waiters {
        assert!(waiter.join().unwrap());
    }
}

#[test]
fn test_matched_status_condition() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(52, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Reading>("ws/readings", QoS::default())
        .unwrap();
    let writer = participant
        .create_publisher(QoS::default())
        .unwrap()
        .create_datawriter(&topic, QoS::reliable())
        .unwrap();
    let condition = writer.get_status_condition();
    condition.set_enabled_statuses(StatusMask::PUBLICATION_MATCHED);
    let waitset = WaitSet::new();
    waitset.attach(&writer).unwrap();

    let _reader = participant
        .create_subscriber(QoS::default())
        .unwrap()
        .create_datareader(&topic, QoS::reliable())
        .unwrap();
    waitset.wait(Some(WAIT)).unwrap();

    let status = writer.get_publication_matched_status();
    assert_eq!(status.current_count, 1);
    assert_eq!(status.current_count_change, 1);
    // Reading the status resets the change flag.
    assert!(!condition.get_trigger_value());
}
