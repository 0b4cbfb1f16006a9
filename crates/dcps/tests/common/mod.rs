// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use dcps::ser::{key_hash, CdrReader, CdrWriter};
use dcps::{DataReader, FieldValue, Result, DDS};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Keyed sensor reading used across the integration suite.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub sensor: u32,
    pub seq: u64,
    pub value: f64,
    pub label: String,
}

impl Reading {
    pub fn new(sensor: u32, seq: u64, value: f64) -> Self {
        Self {
            sensor,
            seq,
            value,
            label: format!("sensor-{}", sensor),
        }
    }
}

impl DDS for Reading {
    fn type_name() -> &'static str {
        "Reading"
    }

    fn encode_cdr2(&self, buf: &mut Vec<u8>) -> Result<()> {
        let mut w = CdrWriter::new(buf);
        w.write_u32_le(self.sensor)?;
        w.write_u64_le(self.seq)?;
        w.write_f64_le(self.value)?;
        w.write_string(&self.label)?;
        Ok(())
    }

    fn decode_cdr2(buf: &[u8]) -> Result<Self> {
        let mut r = CdrReader::new(buf);
        Ok(Self {
            sensor: r.read_u32_le()?,
            seq: r.read_u64_le()?,
            value: r.read_f64_le()?,
            label: r.read_string()?,
        })
    }

    fn has_key() -> bool {
        true
    }

    fn compute_key(&self) -> [u8; 16] {
        key_hash(&self.sensor.to_le_bytes())
    }

    fn get_fields(&self) -> HashMap<String, FieldValue> {
        let mut fields = HashMap::new();
        fields.insert("sensor".to_string(), FieldValue::from_u32(self.sensor));
        fields.insert("seq".to_string(), FieldValue::from_u64(self.seq));
        fields.insert("value".to_string(), FieldValue::from_f64(self.value));
        fields.insert("label".to_string(), FieldValue::from_string(self.label.clone()));
        fields
    }
}

/// Unkeyed counterpart on a second topic (MultiTopic tests).
#[derive(Debug, Clone, PartialEq)]
pub struct Alarm {
    pub sensor: u32,
    pub level: i32,
}

impl DDS for Alarm {
    fn type_name() -> &'static str {
        "Alarm"
    }

    fn encode_cdr2(&self, buf: &mut Vec<u8>) -> Result<()> {
        let mut w = CdrWriter::new(buf);
        w.write_u32_le(self.sensor)?;
        w.write_i32_le(self.level)?;
        Ok(())
    }

    fn decode_cdr2(buf: &[u8]) -> Result<Self> {
        let mut r = CdrReader::new(buf);
        Ok(Self {
            sensor: r.read_u32_le()?,
            level: r.read_i32_le()?,
        })
    }

    fn get_fields(&self) -> HashMap<String, FieldValue> {
        let mut fields = HashMap::new();
        fields.insert("sensor".to_string(), FieldValue::from_u32(self.sensor));
        fields.insert("level".to_string(), FieldValue::from_i32(self.level));
        fields
    }
}

/// Poll `check` every few milliseconds until it holds or `timeout` expires.
pub fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    check()
}

/// Take from `reader` until `count` samples with valid data were collected.
pub fn take_values<T: DDS>(reader: &DataReader<T>, count: usize, timeout: Duration) -> Vec<T> {
    let mut out = Vec::with_capacity(count);
    eventually(timeout, || {
        if let Ok(samples) = reader.take(usize::MAX) {
            out.extend(samples.into_iter().filter_map(|s| s.data));
        }
        out.len() >= count
    });
    out
}
