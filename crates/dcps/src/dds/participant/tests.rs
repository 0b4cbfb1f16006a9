// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use crate::dds::builtin::{ParticipantBuiltinTopicData, BUILTIN_PARTICIPANT_TOPIC};
use crate::dds::factory::DomainParticipantFactory;
use crate::dds::topic::TopicDescriptionKind;
use crate::dds::{Error, InstanceHandle, Result, DDS};
use crate::qos::QoS;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
struct Pose(u32);

impl DDS for Pose {
    fn type_name() -> &'static str {
        "Pose"
    }

    fn encode_cdr2(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(&self.0.to_le_bytes());
        Ok(())
    }

    fn decode_cdr2(buf: &[u8]) -> Result<Self> {
        let bytes: [u8; 4] = buf
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| Error::Serialization("short buffer".into()))?;
        Ok(Pose(u32::from_le_bytes(bytes)))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Twist(u32);

impl DDS for Twist {
    fn type_name() -> &'static str {
        "Twist"
    }

    fn encode_cdr2(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(&self.0.to_le_bytes());
        Ok(())
    }

    fn decode_cdr2(_buf: &[u8]) -> Result<Self> {
        Ok(Twist(0))
    }
}

fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + timeout;
    while Instant::now() < end {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    check()
}

#[test]
fn test_topic_names() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(0, QoS::default()).unwrap();

    assert!(matches!(
        participant.create_topic::<Pose>("", QoS::default()),
        Err(Error::BadParameter(_))
    ));
    assert!(matches!(
        participant.create_topic::<Pose>("   ", QoS::default()),
        Err(Error::BadParameter(_))
    ));

    let topic = participant
        .create_topic::<Pose>("robot/pose", QoS::default())
        .unwrap();
    assert!(matches!(
        participant.create_topic::<Pose>("robot/pose", QoS::default()),
        Err(Error::PreconditionNotMet(_))
    ));

    let description = participant.lookup_topicdescription("robot/pose").unwrap();
    assert_eq!(description.type_name, "Pose");
    assert_eq!(description.kind, TopicDescriptionKind::Topic);
    assert!(participant.lookup_topicdescription("robot/twist").is_none());

    participant.delete_topic(&topic).unwrap();
    assert!(participant.lookup_topicdescription("robot/pose").is_none());
}

#[test]
fn test_topic_referenced_by_filter() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(0, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Pose>("robot/pose", QoS::default())
        .unwrap();

    assert!(matches!(
        participant.create_contentfilteredtopic("near", &topic, "x > %0 AND y < %1", vec!["1".into()]),
        Err(Error::Error(_))
    ));
    let filtered = participant
        .create_contentfilteredtopic("near", &topic, "x > %0", vec!["1".into()])
        .unwrap();
    assert_eq!(
        participant.lookup_topicdescription("near").unwrap().kind,
        TopicDescriptionKind::ContentFilteredTopic
    );

    assert!(matches!(
        participant.delete_topic(&topic),
        Err(Error::PreconditionNotMet(_))
    ));
    participant.delete_contentfilteredtopic(&filtered).unwrap();
    participant.delete_topic(&topic).unwrap();
}

#[test]
fn test_multitopic_requires_known_topics() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(0, QoS::default()).unwrap();
    let _pose = participant
        .create_topic::<Pose>("Pose", QoS::default())
        .unwrap();

    assert!(matches!(
        participant.create_multitopic("Both", "Joined", "SELECT * FROM Pose NATURAL JOIN Twist", vec![]),
        Err(Error::BadParameter(_))
    ));
    let _twist = participant
        .create_topic::<Twist>("Twist", QoS::default())
        .unwrap();
    let multi = participant
        .create_multitopic("Both", "Joined", "SELECT * FROM Pose NATURAL JOIN Twist", vec![])
        .unwrap();
    assert_eq!(multi.get_related_topic_names(), vec!["Pose", "Twist"]);
    participant.delete_multitopic(&multi).unwrap();
}

#[test]
fn test_find_topic() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(0, QoS::default()).unwrap();

    assert!(matches!(
        participant.find_topic::<Pose>("missing", Duration::from_millis(20)),
        Err(Error::Timeout)
    ));

    let topic = participant
        .create_topic::<Pose>("robot/pose", QoS::default())
        .unwrap();
    let found = participant
        .find_topic::<Pose>("robot/pose", Duration::ZERO)
        .unwrap();
    assert_eq!(found.get_instance_handle(), topic.get_instance_handle());
    assert!(matches!(
        participant.find_topic::<Twist>("robot/pose", Duration::ZERO),
        Err(Error::PreconditionNotMet(_))
    ));
}

#[test]
fn test_find_topic_discovered_remotely() {
    let factory = DomainParticipantFactory::new();
    let local = factory.create_participant(3, QoS::default()).unwrap();
    let remote = factory.create_participant(3, QoS::default()).unwrap();
    let _topic = remote
        .create_topic::<Pose>("arm/pose", QoS::reliable())
        .unwrap();

    let found = local
        .find_topic::<Pose>("arm/pose", Duration::from_secs(2))
        .unwrap();
    assert_eq!(found.get_type_name(), "Pose");
    assert!(found.get_qos().reliability.is_reliable());
    assert!(!local.get_discovered_topics().unwrap().is_empty());
}

#[test]
fn test_discovered_participants() {
    let factory = DomainParticipantFactory::new();
    let a = factory
        .create_participant(1, QoS::default().user_data(b"alpha".to_vec()))
        .unwrap();
    let b = factory.create_participant(1, QoS::default()).unwrap();
    let elsewhere = factory.create_participant(2, QoS::default()).unwrap();

    assert!(eventually(Duration::from_secs(2), || {
        b.get_discovered_participants().unwrap() == vec![a.get_instance_handle()]
    }));
    assert!(elsewhere.get_discovered_participants().unwrap().is_empty());

    let data = b
        .get_discovered_participant_data(a.get_instance_handle())
        .unwrap();
    assert_eq!(data.user_data.value, b"alpha".to_vec());
    assert!(matches!(
        b.get_discovered_participant_data(InstanceHandle::new([1; 16])),
        Err(Error::BadParameter(_))
    ));

    let builtin = b
        .get_builtin_subscriber()
        .lookup_datareader::<ParticipantBuiltinTopicData>(BUILTIN_PARTICIPANT_TOPIC)
        .expect("builtin participant reader");
    let samples = builtin.read(10).unwrap();
    assert!(samples
        .iter()
        .any(|s| s.data.as_ref().map(|d| d.key) == Some(a.get_instance_handle())));
}

#[test]
fn test_user_data_change_is_reannounced() {
    let factory = DomainParticipantFactory::new();
    let a = factory.create_participant(0, QoS::default()).unwrap();
    let b = factory.create_participant(0, QoS::default()).unwrap();
    assert!(eventually(Duration::from_secs(2), || {
        b.get_discovered_participants().unwrap().len() == 1
    }));

    a.set_qos(QoS::default().user_data(b"v2".to_vec())).unwrap();
    assert!(eventually(Duration::from_secs(2), || {
        b.get_discovered_participant_data(a.get_instance_handle())
            .map(|d| d.user_data.value == b"v2".to_vec())
            .unwrap_or(false)
    }));
}

#[test]
fn test_ignore_participant() {
    let factory = DomainParticipantFactory::new();
    let a = factory.create_participant(0, QoS::default()).unwrap();
    let b = factory.create_participant(0, QoS::default()).unwrap();
    assert!(matches!(
        a.ignore_participant(a.get_instance_handle()),
        Err(Error::BadParameter(_))
    ));
    assert!(eventually(Duration::from_secs(2), || {
        a.get_discovered_participants().unwrap().len() == 1
    }));

    a.ignore_participant(b.get_instance_handle()).unwrap();
    assert!(a.get_discovered_participants().unwrap().is_empty());
}

#[test]
fn test_contains_entity() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(0, QoS::default()).unwrap();
    let other = factory.create_participant(0, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Pose>("robot/pose", QoS::default())
        .unwrap();
    let publisher = participant.create_publisher(QoS::default()).unwrap();
    let writer = publisher
        .create_datawriter(&topic, QoS::default())
        .unwrap();

    assert!(participant.contains_entity(topic.get_instance_handle()));
    assert!(participant.contains_entity(publisher.get_instance_handle()));
    assert!(participant.contains_entity(writer.get_instance_handle()));
    assert!(!other.contains_entity(writer.get_instance_handle()));
}

#[test]
fn test_delete_contained_entities() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(0, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Pose>("robot/pose", QoS::default())
        .unwrap();
    let publisher = participant.create_publisher(QoS::default()).unwrap();
    let subscriber = participant.create_subscriber(QoS::default()).unwrap();
    let writer = publisher
        .create_datawriter(&topic, QoS::default())
        .unwrap();
    let _reader = subscriber
        .create_datareader(&topic, QoS::default())
        .unwrap();

    assert!(matches!(
        participant.delete_publisher(&publisher),
        Err(Error::PreconditionNotMet(_))
    ));
    participant.delete_contained_entities().unwrap();
    assert!(participant.lookup_topicdescription("robot/pose").is_none());
    assert!(matches!(writer.write(&Pose(1)), Err(Error::AlreadyDeleted)));
    factory.delete_participant(&participant).unwrap();
}

#[test]
fn test_default_qos_accessors() {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(0, QoS::default()).unwrap();

    participant
        .set_default_publisher_qos(QoS::default().partition_single("A"))
        .unwrap();
    let publisher = participant.create_publisher_with_default_qos().unwrap();
    assert_eq!(publisher.get_qos().partition.names, vec!["A".to_string()]);

    participant
        .set_default_topic_qos(QoS::reliable())
        .unwrap();
    let topic = participant
        .create_topic_with_default_qos::<Pose>("robot/pose")
        .unwrap();
    assert!(topic.get_qos().reliability.is_reliable());

    assert!(matches!(
        participant.set_default_subscriber_qos(QoS::default().keep_last(0)),
        Err(Error::InconsistentPolicy(_))
    ));
}

#[test]
fn test_disabled_participant() {
    let factory = DomainParticipantFactory::new();
    factory.set_qos(QoS::default().autoenable(false)).unwrap();
    let participant = factory.create_participant(0, QoS::default()).unwrap();

    assert!(matches!(
        participant.assert_liveliness(),
        Err(Error::NotEnabled)
    ));
    let publisher = participant.create_publisher(QoS::default()).unwrap();
    assert!(!publisher.is_enabled());

    participant.enable().unwrap();
    assert!(publisher.is_enabled());
    participant.assert_liveliness().unwrap();
}
