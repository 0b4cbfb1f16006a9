// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic

//! Discovery integration tests: leases, removal and built-in topics.

mod common;

use common::{eventually, Reading};
use dcps::dds::{
    InstanceState, PublicationBuiltinTopicData, SubscriptionBuiltinTopicData,
    BUILTIN_PUBLICATION_TOPIC, BUILTIN_SUBSCRIPTION_TOPIC,
};
use dcps::{DomainParticipantFactory, QoS, RuntimeConfig, TimingConfig};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(3);

fn short_lease_factory() -> DomainParticipantFactory {
    let config = RuntimeConfig::new();
    config.set_timing(TimingConfig {
        participant_lease: Duration::from_millis(250),
        announcement_period: Duration::from_millis(50),
        ..TimingConfig::default()
    });
    DomainParticipantFactory::with_config(config).unwrap()
}

#[test]
fn test_lease_expiry_and_revival() {
    let factory = short_lease_factory();
    let local = factory.create_participant(30, QoS::default()).unwrap();
    let remote = factory.create_participant(30, QoS::default()).unwrap();

    let local_topic = local.create_topic::<Reading>("disc/readings", QoS::default()).unwrap();
    let remote_topic = remote.create_topic::<Reading>("disc/readings", QoS::default()).unwrap();
    let writer = remote
        .create_publisher(QoS::default())
        .unwrap()
        .create_datawriter(&remote_topic, QoS::reliable())
        .unwrap();
    let reader = local
        .create_subscriber(QoS::default())
        .unwrap()
        .create_datareader(&local_topic, QoS::reliable())
        .unwrap();
    reader.wait_for_publications(1, WAIT).unwrap();
    writer.write(&Reading::new(1, 1, 1.0)).unwrap();
    writer.wait_for_acknowledgments(WAIT).unwrap();
    assert_eq!(reader.get_liveliness_changed_status().alive_count, 1);

    remote.set_announcements_enabled(false);
    assert!(eventually(WAIT, || local
        .get_discovered_participants()
        .unwrap()
        .is_empty()));

    let status = reader.get_liveliness_changed_status();
    assert_eq!(status.alive_count, 0);
    assert_eq!(status.not_alive_count, 1);
    assert_eq!(status.last_publication_handle, writer.get_instance_handle());
    // The match survives in the not-alive state.
    assert_eq!(reader.get_matched_publications(), vec![writer.get_instance_handle()]);

    remote.set_announcements_enabled(true);
    assert!(eventually(WAIT, || {
        local.get_discovered_participants().unwrap() == vec![remote.get_instance_handle()]
    }));
    assert!(eventually(WAIT, || {
        reader.get_liveliness_changed_status().alive_count == 1
    }));
    assert_eq!(reader.get_liveliness_changed_status().not_alive_count, 0);
}

#[test]
fn test_participant_deletion_removes_matches() {
    let factory = DomainParticipantFactory::new();
    let local = factory.create_participant(31, QoS::default()).unwrap();
    let remote = factory.create_participant(31, QoS::default()).unwrap();

    let local_topic = local.create_topic::<Reading>("disc/readings", QoS::default()).unwrap();
    let remote_topic = remote.create_topic::<Reading>("disc/readings", QoS::default()).unwrap();
    let reader = local
        .create_subscriber(QoS::default())
        .unwrap()
        .create_datareader(&local_topic, QoS::reliable())
        .unwrap();
    let writer = remote
        .create_publisher(QoS::default())
        .unwrap()
        .create_datawriter(&remote_topic, QoS::reliable())
        .unwrap();
    reader.wait_for_publications(1, WAIT).unwrap();
    let writer_handle = writer.get_instance_handle();

    remote.delete_contained_entities().unwrap();
    factory.delete_participant(&remote).unwrap();

    assert!(eventually(WAIT, || reader.get_matched_publications().is_empty()));
    let matched = reader.get_subscription_matched_status();
    assert_eq!(matched.current_count, 0);
    assert_eq!(matched.total_count, 1);
    assert_eq!(matched.last_publication_handle, writer_handle);
    assert!(eventually(WAIT, || local
        .get_discovered_participants()
        .unwrap()
        .is_empty()));
}

#[test]
fn test_builtin_endpoint_topics() {
    let factory = DomainParticipantFactory::new();
    let observer = factory.create_participant(32, QoS::default()).unwrap();
    let remote = factory.create_participant(32, QoS::default()).unwrap();

    let topic = remote
        .create_topic::<Reading>("disc/readings", QoS::default().topic_data(b"t".to_vec()))
        .unwrap();
    let publisher = remote
        .create_publisher(QoS::default().group_data(b"g".to_vec()))
        .unwrap();
    let writer = publisher
        .create_datawriter(&topic, QoS::reliable().user_data(b"w".to_vec()))
        .unwrap();
    let reader = remote
        .create_subscriber(QoS::default())
        .unwrap()
        .create_datareader(&topic, QoS::best_effort())
        .unwrap();

    let builtin = observer.get_builtin_subscriber();
    let publications = builtin
        .lookup_datareader::<PublicationBuiltinTopicData>(BUILTIN_PUBLICATION_TOPIC)
        .unwrap();
    let subscriptions = builtin
        .lookup_datareader::<SubscriptionBuiltinTopicData>(BUILTIN_SUBSCRIPTION_TOPIC)
        .unwrap();

    assert!(eventually(WAIT, || publications.read(16).is_ok()));
    let publication = publications
        .read(16)
        .unwrap()
        .into_iter()
        .filter_map(|s| s.data)
        .find(|d| d.key == writer.get_instance_handle())
        .expect("writer announced");
    assert_eq!(publication.topic_name, "disc/readings");
    assert_eq!(publication.type_name, "Reading");
    assert_eq!(publication.user_data.value, b"w".to_vec());
    assert_eq!(publication.topic_data.value, b"t".to_vec());
    assert_eq!(publication.group_data.value, b"g".to_vec());

    assert!(eventually(WAIT, || subscriptions.read(16).is_ok()));
    let subscription = subscriptions
        .read(16)
        .unwrap()
        .into_iter()
        .filter_map(|s| s.data)
        .find(|d| d.key == reader.get_instance_handle())
        .expect("reader announced");
    assert!(!subscription.reliability.is_reliable());

    // Deleting the writer disposes its publication instance.
    publisher.delete_datawriter(&writer).unwrap();
    let handle = writer_instance(&publications, &writer.get_instance_handle());
    assert!(eventually(WAIT, || {
        publications
            .read_instance(16, handle)
            .map(|s| s.iter().all(|s| s.info.instance_state == InstanceState::NotAliveDisposed))
            .unwrap_or(false)
    }));
}

fn writer_instance(
    reader: &dcps::DataReader<PublicationBuiltinTopicData>,
    key: &dcps::InstanceHandle,
) -> dcps::InstanceHandle {
    reader
        .read(16)
        .unwrap()
        .into_iter()
        .find(|s| s.data.as_ref().map(|d| &d.key) == Some(key))
        .map(|s| s.info.instance_handle)
        .expect("publication instance")
}

#[test]
fn test_wait_for_publications_times_out() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(33, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Reading>("disc/readings", QoS::default())
        .unwrap();
    let reader = participant
        .create_subscriber(QoS::default())
        .unwrap()
        .create_datareader(&topic, QoS::default())
        .unwrap();
    assert!(matches!(
        reader.wait_for_publications(1, Duration::from_millis(50)),
        Err(dcps::Error::Timeout)
    ));
}

#[test]
fn test_domains_are_isolated() {
    let factory = DomainParticipantFactory::new();
    let a = factory.create_participant(34, QoS::default()).unwrap();
    let b = factory.create_participant(35, QoS::default()).unwrap();
    let topic_a = a.create_topic::<Reading>("disc/readings", QoS::default()).unwrap();
    let topic_b = b.create_topic::<Reading>("disc/readings", QoS::default()).unwrap();
    let writer = a
        .create_publisher(QoS::default())
        .unwrap()
        .create_datawriter(&topic_a, QoS::default())
        .unwrap();
    let _reader = b
        .create_subscriber(QoS::default())
        .unwrap()
        .create_datareader(&topic_b, QoS::default())
        .unwrap();

    assert!(writer
        .wait_for_subscriptions(1, Duration::from_millis(150))
        .is_err());
    assert!(a.get_discovered_participants().unwrap().is_empty());
}
