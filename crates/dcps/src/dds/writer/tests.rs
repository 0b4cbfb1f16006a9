// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::*;
use crate::dds::factory::DomainParticipantFactory;
use crate::dds::participant::DomainParticipant;
use crate::dds::publisher::Publisher;
use crate::dds::topic::Topic;
use crate::dds::{Error, InstanceHandle, Result};
use crate::qos::QoS;
use crate::ser::{key_hash, CdrReader, CdrWriter};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
struct Gauge {
    id: u32,
    level: f64,
}

impl DDS for Gauge {
    fn type_name() -> &'static str {
        "Gauge"
    }

    fn encode_cdr2(&self, buf: &mut Vec<u8>) -> Result<()> {
        let mut w = CdrWriter::new(buf);
        w.write_u32_le(self.id)?;
        w.write_f64_le(self.level)?;
        Ok(())
    }

    fn decode_cdr2(buf: &[u8]) -> Result<Self> {
        let mut r = CdrReader::new(buf);
        Ok(Gauge {
            id: r.read_u32_le()?,
            level: r.read_f64_le()?,
        })
    }

    fn has_key() -> bool {
        true
    }

    fn compute_key(&self) -> [u8; 16] {
        key_hash(&self.id.to_le_bytes())
    }
}

struct Fixture {
    _factory: DomainParticipantFactory,
    participant: DomainParticipant,
    topic: Topic<Gauge>,
    publisher: Publisher,
}

fn fixture() -> Fixture {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(0, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Gauge>("tank/level", QoS::default())
        .unwrap();
    let publisher = participant.create_publisher(QoS::default()).unwrap();
    Fixture {
        _factory: factory,
        participant,
        topic,
        publisher,
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
fn test_register_then_lookup() {
    let fx = fixture();
    let writer = fx
        .publisher
        .create_datawriter(&fx.topic, QoS::reliable())
        .unwrap();
    let sample = Gauge { id: 4, level: 0.5 };

    assert!(writer.lookup_instance(&sample).is_nil());
    let handle = writer.register_instance(&sample).unwrap();
    assert_eq!(handle, InstanceHandle::from_key(&sample.compute_key()));
    assert_eq!(writer.lookup_instance(&sample), handle);
    assert_eq!(writer.get_key_value(handle).unwrap(), sample);
}

#[test]
fn test_get_key_value_errors() {
    let fx = fixture();
    let writer = fx
        .publisher
        .create_datawriter(&fx.topic, QoS::default())
        .unwrap();
    assert!(matches!(
        writer.get_key_value(InstanceHandle::NIL),
        Err(Error::BadParameter(_))
    ));
    assert!(matches!(
        writer.get_key_value(InstanceHandle::new([7; 16])),
        Err(Error::BadParameter(_))
    ));
}

#[test]
fn test_dispose_with_wrong_handle() {
    let fx = fixture();
    let writer = fx
        .publisher
        .create_datawriter(&fx.topic, QoS::default())
        .unwrap();
    let sample = Gauge { id: 1, level: 1.0 };
    writer.write(&sample).unwrap();

    let other = InstanceHandle::from_key(&Gauge { id: 2, level: 0.0 }.compute_key());
    assert!(matches!(
        writer.dispose(&sample, other),
        Err(Error::BadParameter(_))
    ));
    writer.dispose(&sample, InstanceHandle::NIL).unwrap();
}

#[test]
fn test_unregister_unknown_instance_is_noop() {
    let fx = fixture();
    let writer = fx
        .publisher
        .create_datawriter(&fx.topic, QoS::default())
        .unwrap();
    writer
        .unregister_instance(&Gauge { id: 99, level: 0.0 }, InstanceHandle::NIL)
        .unwrap();
}

#[test]
fn test_disabled_writer_rejects_writes() {
    let fx = fixture();
    fx.publisher
        .set_qos(QoS::default().autoenable(false))
        .unwrap();
    let writer = fx
        .publisher
        .create_datawriter(&fx.topic, QoS::default())
        .unwrap();
    assert!(!writer.is_enabled());
    assert!(matches!(
        writer.write(&Gauge { id: 1, level: 1.0 }),
        Err(Error::NotEnabled)
    ));
    writer.enable().unwrap();
    writer.write(&Gauge { id: 1, level: 1.0 }).unwrap();
}

#[test]
fn test_immutable_policy_after_enable() {
    let fx = fixture();
    let writer = fx
        .publisher
        .create_datawriter(&fx.topic, QoS::reliable())
        .unwrap();
    assert!(matches!(
        writer.set_qos(QoS::best_effort()),
        Err(Error::ImmutablePolicy)
    ));
    // Deadline is changeable.
    writer
        .set_qos(QoS::reliable().deadline(Duration::from_secs(1)))
        .unwrap();
    assert_eq!(writer.get_qos().deadline.period, Duration::from_secs(1));
}

#[test]
fn test_keep_all_purges_when_unmatched() {
    let fx = fixture();
    let qos = QoS::reliable()
        .keep_all()
        .max_samples(2)
        .max_instances(2)
        .max_samples_per_instance(2)
        .max_blocking_time(Duration::from_millis(20));
    let writer = fx.publisher.create_datawriter(&fx.topic, qos).unwrap();
    // No reliable reader holds samples back, so a full history is purged.
    for level in 0..5 {
        writer
            .write(&Gauge {
                id: 1,
                level: f64::from(level),
            })
            .unwrap();
    }
}

#[test]
fn test_wait_for_subscriptions_timeout() {
    let fx = fixture();
    let writer = fx
        .publisher
        .create_datawriter(&fx.topic, QoS::reliable())
        .unwrap();
    assert!(matches!(
        writer.wait_for_subscriptions(1, Duration::from_millis(30)),
        Err(Error::Timeout)
    ));
}

#[test]
fn test_local_match_and_acknowledgment() {
    let fx = fixture();
    let writer = fx
        .publisher
        .create_datawriter(&fx.topic, QoS::reliable())
        .unwrap();
    let subscriber = fx.participant.create_subscriber(QoS::default()).unwrap();
    let reader = subscriber
        .create_datareader(&fx.topic, QoS::reliable())
        .unwrap();

    writer
        .wait_for_subscriptions(1, Duration::from_secs(2))
        .unwrap();
    assert_eq!(writer.get_matched_subscriptions(), vec![reader.get_instance_handle()]);
    let status = writer.get_publication_matched_status();
    assert_eq!(status.current_count, 1);
    assert_eq!(status.total_count, 1);

    for level in 0..5 {
        writer
            .write(&Gauge {
                id: 1,
                level: f64::from(level),
            })
            .unwrap();
    }
    writer
        .wait_for_acknowledgments(Duration::from_secs(2))
        .unwrap();
    let data = writer
        .get_matched_subscription_data(reader.get_instance_handle())
        .unwrap();
    assert_eq!(data.topic_name, "tank/level");
}

#[test]
fn test_incompatible_reader_reported() {
    let fx = fixture();
    let writer = fx
        .publisher
        .create_datawriter(&fx.topic, QoS::best_effort())
        .unwrap();
    let subscriber = fx.participant.create_subscriber(QoS::default()).unwrap();
    let reader = subscriber
        .create_datareader(&fx.topic, QoS::reliable())
        .unwrap();

    assert!(eventually(Duration::from_secs(2), || {
        writer.get_offered_incompatible_qos_status().total_count == 1
    }));
    let status = writer.get_offered_incompatible_qos_status();
    assert_eq!(status.last_policy_id, crate::qos::QosPolicyId::Reliability);
    assert!(writer.get_matched_subscriptions().is_empty());
    assert_eq!(reader.get_requested_incompatible_qos_status().total_count, 1);
}

#[test]
fn test_delete_writer_releases_topic() {
    let fx = fixture();
    let writer = fx
        .publisher
        .create_datawriter(&fx.topic, QoS::default())
        .unwrap();
    assert!(matches!(
        fx.participant.delete_topic(&fx.topic),
        Err(Error::PreconditionNotMet(_))
    ));
    fx.publisher.delete_datawriter(&writer).unwrap();
    assert!(matches!(
        writer.write(&Gauge { id: 1, level: 0.0 }),
        Err(Error::AlreadyDeleted)
    ));
    fx.participant.delete_topic(&fx.topic).unwrap();
}
