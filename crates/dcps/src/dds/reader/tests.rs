// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::*;
use crate::dds::condition::Condition;
use crate::dds::factory::DomainParticipantFactory;
use crate::dds::participant::DomainParticipant;
use crate::dds::read_condition::{InstanceStateMask, SampleStateMask, ViewStateMask};
use crate::dds::status::SampleRejectedReason;
use crate::dds::topic::Topic;
use crate::dds::writer::DataWriter;
use crate::dds::{Error, FieldValue, InstanceHandle, Result, Time};
use crate::qos::QoS;
use crate::ser::{key_hash, CdrReader, CdrWriter};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
struct Beacon {
    id: u32,
    rssi: i32,
}

impl DDS for Beacon {
    fn type_name() -> &'static str {
        "Beacon"
    }

    fn encode_cdr2(&self, buf: &mut Vec<u8>) -> Result<()> {
        let mut w = CdrWriter::new(buf);
        w.write_u32_le(self.id)?;
        w.write_i32_le(self.rssi)?;
        Ok(())
    }

    fn decode_cdr2(buf: &[u8]) -> Result<Self> {
        let mut r = CdrReader::new(buf);
        Ok(Beacon {
            id: r.read_u32_le()?,
            rssi: r.read_i32_le()?,
        })
    }

    fn has_key() -> bool {
        true
    }

    fn compute_key(&self) -> [u8; 16] {
        key_hash(&self.id.to_le_bytes())
    }

    fn get_fields(&self) -> HashMap<String, FieldValue> {
        let mut fields = HashMap::new();
        fields.insert("id".to_string(), FieldValue::from_u32(self.id));
        fields.insert("rssi".to_string(), FieldValue::from_i32(self.rssi));
        fields
    }
}

struct Fixture {
    _factory: DomainParticipantFactory,
    participant: DomainParticipant,
    topic: Topic<Beacon>,
}

fn fixture() -> Fixture {
    let factory = DomainParticipantFactory::new();
    let participant = factory.create_participant(0, QoS::default()).unwrap();
    let topic = participant
        .create_topic::<Beacon>("beacons", QoS::default())
        .unwrap();
    Fixture {
        _factory: factory,
        participant,
        topic,
    }
}

impl Fixture {
    fn writer(&self, qos: QoS) -> DataWriter<Beacon> {
        self.participant
            .create_publisher(QoS::default())
            .unwrap()
            .create_datawriter(&self.topic, qos)
            .unwrap()
    }

    fn reader(&self, qos: QoS) -> DataReader<Beacon> {
        self.participant
            .create_subscriber(QoS::default())
            .unwrap()
            .create_datareader(&self.topic, qos)
            .unwrap()
    }
}

/// Poll `read` until `count` samples are visible (read does not consume).
fn wait_for_samples(reader: &DataReader<Beacon>, count: usize) {
    let end = Instant::now() + Duration::from_secs(2);
    while Instant::now() < end {
        if reader.read(usize::MAX).map_or(0, |s| s.len()) >= count {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("reader did not receive {} samples", count);
}

fn wait_for_state(reader: &DataReader<Beacon>, handle: InstanceHandle, state: InstanceState) {
    let end = Instant::now() + Duration::from_secs(2);
    while Instant::now() < end {
        if let Ok(samples) = reader.read_instance(usize::MAX, handle) {
            if samples.iter().any(|s| s.info.instance_state == state) {
                return;
            }
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("instance never reached {:?}", state);
}

#[test]
fn test_empty_reader_has_no_data() {
    let fx = fixture();
    let reader = fx.reader(QoS::reliable());
    assert!(matches!(reader.read(10), Err(Error::NoData)));
    assert!(matches!(reader.take_next_sample(), Err(Error::NoData)));
    assert!(matches!(reader.read(0), Err(Error::BadParameter(_))));
    assert!(matches!(
        reader.read_instance(1, InstanceHandle::NIL),
        Err(Error::BadParameter(_))
    ));
}

#[test]
fn test_sample_and_view_states() {
    let fx = fixture();
    let writer = fx.writer(QoS::reliable());
    let reader = fx.reader(QoS::reliable());
    writer.wait_for_subscriptions(1, Duration::from_secs(2)).unwrap();

    writer.write(&Beacon { id: 1, rssi: -40 }).unwrap();
    writer
        .wait_for_acknowledgments(Duration::from_secs(2))
        .unwrap();

    let first = reader.read(10).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].info.sample_state, SampleState::NotRead);
    assert_eq!(first[0].info.view_state, ViewState::New);
    assert_eq!(first[0].info.instance_state, InstanceState::Alive);
    assert!(first[0].info.valid_data);
    assert_eq!(first[0].info.publication_handle, writer.get_instance_handle());

    let again = reader.read(10).unwrap();
    assert_eq!(again[0].info.sample_state, SampleState::Read);
    assert_eq!(again[0].info.view_state, ViewState::NotNew);

    let taken = reader.take(10).unwrap();
    assert_eq!(taken[0].data, Some(Beacon { id: 1, rssi: -40 }));
    assert!(matches!(reader.read(10), Err(Error::NoData)));
}

#[test]
fn test_reception_order_across_instances() {
    let fx = fixture();
    let writer = fx.writer(QoS::reliable());
    let reader = fx.reader(QoS::reliable());
    writer.wait_for_subscriptions(1, Duration::from_secs(2)).unwrap();

    for (id, rssi) in [(3, -1), (1, -2), (3, -3), (2, -4)] {
        writer.write(&Beacon { id, rssi }).unwrap();
    }
    wait_for_samples(&reader, 4);
    let rssi: Vec<i32> = reader
        .take(10)
        .unwrap()
        .into_iter()
        .filter_map(|s| s.data.map(|b| b.rssi))
        .collect();
    assert_eq!(rssi, vec![-1, -2, -3, -4]);
}

#[test]
fn test_keep_last_evicts_oldest() {
    let fx = fixture();
    let writer = fx.writer(QoS::reliable());
    let reader = fx.reader(QoS::reliable().keep_last(2));
    writer.wait_for_subscriptions(1, Duration::from_secs(2)).unwrap();

    for rssi in 0..5 {
        writer.write(&Beacon { id: 7, rssi }).unwrap();
    }
    writer
        .wait_for_acknowledgments(Duration::from_secs(2))
        .unwrap();
    let kept: Vec<i32> = reader
        .take(10)
        .unwrap()
        .into_iter()
        .filter_map(|s| s.data.map(|b| b.rssi))
        .collect();
    assert_eq!(kept, vec![3, 4]);
}

#[test]
fn test_instance_limit_rejects() {
    let fx = fixture();
    let writer = fx.writer(QoS::reliable());
    let qos = QoS::reliable()
        .keep_last(1)
        .max_instances(2)
        .max_samples(2)
        .max_samples_per_instance(1);
    let reader = fx.reader(qos);
    writer.wait_for_subscriptions(1, Duration::from_secs(2)).unwrap();

    for id in 0..3 {
        writer.write(&Beacon { id, rssi: 0 }).unwrap();
    }
    writer
        .wait_for_acknowledgments(Duration::from_secs(2))
        .unwrap();
    let status = reader.get_sample_rejected_status();
    assert_eq!(status.total_count, 1);
    assert_eq!(
        status.last_reason,
        SampleRejectedReason::RejectedByInstancesLimit
    );
    assert_eq!(reader.get_instance_handles().len(), 2);
}

#[test]
fn test_dispose_and_writer_loss() {
    let fx = fixture();
    let writer = fx.writer(QoS::reliable().autodispose_unregistered_instances(false));
    let reader = fx.reader(QoS::reliable());
    writer.wait_for_subscriptions(1, Duration::from_secs(2)).unwrap();

    let a = Beacon { id: 1, rssi: 0 };
    let b = Beacon { id: 2, rssi: 0 };
    writer.write(&a).unwrap();
    writer.write(&b).unwrap();
    wait_for_samples(&reader, 2);
    let ha = reader.lookup_instance(&a);
    let hb = reader.lookup_instance(&b);
    assert!(!ha.is_nil());

    writer.dispose(&a, InstanceHandle::NIL).unwrap();
    wait_for_state(&reader, ha, InstanceState::NotAliveDisposed);
    let marker = reader
        .read_instance(10, ha)
        .unwrap()
        .into_iter()
        .find(|s| !s.info.valid_data)
        .expect("dispose marker");
    assert!(marker.data.is_none());

    let publisher = writer.get_publisher().unwrap();
    publisher.delete_datawriter(&writer).unwrap();
    wait_for_state(&reader, hb, InstanceState::NotAliveNoWriters);
}

#[test]
fn test_read_condition_selects_not_read() {
    let fx = fixture();
    let writer = fx.writer(QoS::reliable());
    let reader = fx.reader(QoS::reliable());
    writer.wait_for_subscriptions(1, Duration::from_secs(2)).unwrap();
    let condition = reader
        .create_readcondition(
            SampleStateMask::NOT_READ,
            ViewStateMask::ANY,
            InstanceStateMask::ANY,
        )
        .unwrap();

    writer.write(&Beacon { id: 1, rssi: 1 }).unwrap();
    wait_for_samples(&reader, 1);
    // wait_for_samples read everything once.
    assert!(matches!(
        reader.read_w_condition(10, condition.as_ref()),
        Err(Error::NoData)
    ));

    writer.write(&Beacon { id: 1, rssi: 2 }).unwrap();
    wait_for_samples(&reader, 2);
    writer.write(&Beacon { id: 1, rssi: 3 }).unwrap();
    let end = Instant::now() + Duration::from_secs(2);
    while !condition.get_trigger_value() && Instant::now() < end {
        std::thread::sleep(Duration::from_millis(5));
    }
    let fresh = reader.take_w_condition(10, condition.as_ref()).unwrap();
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].data.as_ref().map(|b| b.rssi), Some(3));

    let subscriber = reader.get_subscriber().unwrap();
    assert!(matches!(
        subscriber.delete_datareader(&reader),
        Err(Error::PreconditionNotMet(_))
    ));
    reader.delete_readcondition(condition.as_ref()).unwrap();
    subscriber.delete_datareader(&reader).unwrap();
}

#[test]
fn test_query_condition_filters_samples() {
    let fx = fixture();
    let writer = fx.writer(QoS::reliable());
    let reader = fx.reader(QoS::reliable());
    writer.wait_for_subscriptions(1, Duration::from_secs(2)).unwrap();
    let query = reader
        .create_querycondition(
            SampleStateMask::ANY,
            ViewStateMask::ANY,
            InstanceStateMask::ANY,
            "rssi > %0",
            vec!["-50".into()],
        )
        .unwrap();

    for rssi in [-80, -30, -60, -10] {
        writer.write(&Beacon { id: 5, rssi }).unwrap();
    }
    wait_for_samples(&reader, 4);
    let strong: Vec<i32> = reader
        .read_w_condition(10, query.as_ref())
        .unwrap()
        .into_iter()
        .filter_map(|s| s.data.map(|b| b.rssi))
        .collect();
    assert_eq!(strong, vec![-30, -10]);

    assert!(matches!(
        query.set_query_parameters(vec![]),
        Err(Error::Error(_))
    ));
}

#[test]
fn test_next_instance_iteration() {
    let fx = fixture();
    let writer = fx.writer(QoS::reliable());
    let reader = fx.reader(QoS::reliable());
    writer.wait_for_subscriptions(1, Duration::from_secs(2)).unwrap();
    for id in 0..3 {
        writer.write(&Beacon { id, rssi: 0 }).unwrap();
    }
    wait_for_samples(&reader, 3);

    let mut seen = Vec::new();
    let mut previous = InstanceHandle::NIL;
    while let Ok(samples) = reader.take_next_instance(10, previous) {
        previous = samples[0].info.instance_handle;
        seen.push(previous);
    }
    assert_eq!(seen.len(), 3);
    let mut sorted = seen.clone();
    sorted.sort();
    assert_eq!(seen, sorted);
}

#[test]
fn test_exclusive_ownership_strongest_wins() {
    let fx = fixture();
    let weak = fx.writer(QoS::reliable().exclusive_ownership(1));
    let strong = fx.writer(QoS::reliable().exclusive_ownership(10));
    let reader = fx.reader(QoS::reliable().exclusive_ownership(0));
    weak.wait_for_subscriptions(1, Duration::from_secs(2)).unwrap();
    strong.wait_for_subscriptions(1, Duration::from_secs(2)).unwrap();

    strong.write(&Beacon { id: 1, rssi: 100 }).unwrap();
    strong
        .wait_for_acknowledgments(Duration::from_secs(2))
        .unwrap();
    weak.write(&Beacon { id: 1, rssi: 1 }).unwrap();
    weak.wait_for_acknowledgments(Duration::from_secs(2)).unwrap();

    let values: Vec<i32> = reader
        .take(10)
        .unwrap()
        .into_iter()
        .filter_map(|s| s.data.map(|b| b.rssi))
        .collect();
    assert_eq!(values, vec![100]);
}

#[test]
fn test_by_source_timestamp_drops_stale() {
    let fx = fixture();
    let writer = fx.writer(QoS::reliable().by_source_timestamp());
    let reader = fx.reader(QoS::reliable().by_source_timestamp());
    writer.wait_for_subscriptions(1, Duration::from_secs(2)).unwrap();

    writer
        .write_w_timestamp(&Beacon { id: 1, rssi: 2 }, Time::new(200, 0))
        .unwrap();
    writer
        .write_w_timestamp(&Beacon { id: 1, rssi: 1 }, Time::new(100, 0))
        .unwrap();
    writer
        .wait_for_acknowledgments(Duration::from_secs(2))
        .unwrap();

    let values: Vec<i32> = reader
        .take(10)
        .unwrap()
        .into_iter()
        .filter_map(|s| s.data.map(|b| b.rssi))
        .collect();
    assert_eq!(values, vec![2]);
    assert_eq!(reader.get_sample_lost_status().total_count, 1);
}

#[test]
fn test_transient_local_late_joiner() {
    let fx = fixture();
    let writer = fx.writer(QoS::reliable().transient_local().keep_last(2));
    for rssi in 0..4 {
        writer.write(&Beacon { id: 9, rssi }).unwrap();
    }
    let reader = fx.reader(QoS::reliable().transient_local());
    reader
        .wait_for_historical_data(Duration::from_secs(2))
        .unwrap();
    wait_for_samples(&reader, 2);
    let replayed: Vec<i32> = reader
        .take(10)
        .unwrap()
        .into_iter()
        .filter_map(|s| s.data.map(|b| b.rssi))
        .collect();
    assert_eq!(replayed, vec![2, 3]);
}

#[test]
fn test_get_key_value_after_write() {
    let fx = fixture();
    let writer = fx.writer(QoS::reliable());
    let reader = fx.reader(QoS::reliable());
    writer.wait_for_subscriptions(1, Duration::from_secs(2)).unwrap();
    let sample = Beacon { id: 12, rssi: -1 };
    writer.write(&sample).unwrap();
    wait_for_samples(&reader, 1);

    let handle = reader.lookup_instance(&sample);
    assert_eq!(reader.get_key_value(handle).unwrap().id, 12);
    assert!(reader.lookup_instance(&Beacon { id: 13, rssi: 0 }).is_nil());
}
