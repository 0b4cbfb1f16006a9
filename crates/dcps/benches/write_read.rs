// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//!
//! Benchmark: write -> take round trip through the in-process domain bus
//!
//! Measures the full data path (encode, history, DATA/HEARTBEAT/ACKNACK on the
//! participant event thread, decode, reader history) for best-effort and
//! reliable endpoints, plus the content filter evaluator on its own.

#![allow(clippy::uninlined_format_args)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dcps::filter::ContentFilter;
use dcps::ser::{key_hash, CdrReader, CdrWriter};
use dcps::{DataReader, DataWriter, DomainParticipantFactory, FieldValue, QoS, Result, DDS};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Telemetry {
    id: u32,
    seq: u64,
    payload: Vec<u8>,
}

impl DDS for Telemetry {
    fn type_name() -> &'static str {
        "Telemetry"
    }

    fn encode_cdr2(&self, buf: &mut Vec<u8>) -> Result<()> {
        let mut w = CdrWriter::new(buf);
        w.write_u32_le(self.id)?;
        w.write_u64_le(self.seq)?;
        w.write_octets(&self.payload)?;
        Ok(())
    }

    fn decode_cdr2(buf: &[u8]) -> Result<Self> {
        let mut r = CdrReader::new(buf);
        Ok(Self {
            id: r.read_u32_le()?,
            seq: r.read_u64_le()?,
            payload: r.read_octets()?,
        })
    }

    fn has_key() -> bool {
        true
    }

    fn compute_key(&self) -> [u8; 16] {
        key_hash(&self.id.to_le_bytes())
    }
}

struct Pair {
    _factory: DomainParticipantFactory,
    writer: DataWriter<Telemetry>,
    reader: DataReader<Telemetry>,
}

fn pair(domain_id: u32, qos: QoS) -> Pair {
    let factory = DomainParticipantFactory::new();
    let participant = factory
        .create_participant(domain_id, QoS::default())
        .expect("participant");
    let topic = participant
        .create_topic::<Telemetry>("bench/telemetry", QoS::default())
        .expect("topic");
    let writer = participant
        .create_publisher(QoS::default())
        .expect("publisher")
        .create_datawriter(&topic, qos.clone())
        .expect("writer");
    let reader = participant
        .create_subscriber(QoS::default())
        .expect("subscriber")
        .create_datareader(&topic, qos)
        .expect("reader");
    writer
        .wait_for_subscriptions(1, Duration::from_secs(5))
        .expect("match");
    Pair {
        _factory: factory,
        writer,
        reader,
    }
}

/// Spin on `take` until one sample arrives.
fn take_one(reader: &DataReader<Telemetry>) -> Telemetry {
    loop {
        if let Ok(mut samples) = reader.take(1) {
            if let Some(data) = samples.pop().and_then(|s| s.data) {
                return data;
            }
        }
        std::hint::spin_loop();
    }
}

fn bench_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_take");

    for size in [64usize, 1024, 16 * 1024] {
        let best_effort = pair(200, QoS::best_effort().keep_last(16));
        let mut seq = 0u64;
        group.bench_with_input(BenchmarkId::new("best_effort", size), &size, |b, &size| {
            let payload = vec![0xA5; size];
            b.iter(|| {
                seq += 1;
                best_effort
                    .writer
                    .write(&Telemetry {
                        id: 1,
                        seq,
                        payload: payload.clone(),
                    })
                    .expect("write");
                black_box(take_one(&best_effort.reader))
            })
        });

        let reliable = pair(201, QoS::reliable().keep_last(16));
        let mut seq = 0u64;
        group.bench_with_input(BenchmarkId::new("reliable", size), &size, |b, &size| {
            let payload = vec![0x5A; size];
            b.iter(|| {
                seq += 1;
                reliable
                    .writer
                    .write(&Telemetry {
                        id: 1,
                        seq,
                        payload: payload.clone(),
                    })
                    .expect("write");
                black_box(take_one(&reliable.reader))
            })
        });
    }

    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let filter = ContentFilter::with_parameters(
        "speed > %0 AND (zone = 'north' OR zone LIKE 'sou%')",
        vec!["40".into()],
    )
    .expect("filter");
    let mut fields = HashMap::new();
    fields.insert("speed".to_string(), FieldValue::from_f64(57.5));
    fields.insert("zone".to_string(), FieldValue::from_string("south"));

    c.bench_function("content_filter_match", |b| {
        b.iter(|| black_box(filter.matches(black_box(&fields))))
    });
}

criterion_group!(benches, bench_round_trip, bench_filter);
criterion_main!(benches);
