// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS-style GUID (Globally Unique Identifier).
//!
//! Every participant gets a 12-byte prefix; every entity inside it a 4-byte
//! entity id whose last byte encodes the entity kind.

use crate::dds::InstanceHandle;
use md5::{Digest, Md5};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Participant-unique part of a GUID.
pub type GuidPrefix = [u8; 12];

/// Entity id of a participant itself.
pub const ENTITYID_PARTICIPANT: [u8; 4] = [0x00, 0x00, 0x01, 0xC1];

/// Kind byte of a user entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntityKind {
    Topic = 0x05,
    Writer = 0x02,
    Reader = 0x07,
    Publisher = 0x08,
    Subscriber = 0x09,
    BuiltinReader = 0xC7,
}

static PREFIX_COUNTER: AtomicU32 = AtomicU32::new(1);

/// Build a fresh participant prefix.
///
/// Bytes 0-1 carry a vendor marker; the rest is a digest of the process id,
/// the wall clock, the domain and a process-wide counter.
pub fn generate_prefix(domain_id: u32) -> GuidPrefix {
    let counter = PREFIX_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut hasher = Md5::new();
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(domain_id.to_le_bytes());
    hasher.update(counter.to_le_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 12];
    prefix[0] = 0x01;
    prefix[1] = 0xDC;
    prefix[2..8].copy_from_slice(&digest[0..6]);
    prefix[8..12].copy_from_slice(&counter.to_be_bytes());
    prefix
}

/// Participant prefix plus entity id, 16 bytes in all.
///
/// Displays as dotted lowercase hex, e.g.
/// `01.dc.ac.10.00.00.00.00.00.00.00.01.00.00.01.c1`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct GUID {
    pub prefix: GuidPrefix,
    pub entity_id: [u8; 4],
}

impl GUID {
    /// Placeholder for "no entity".
    pub const ZERO: GUID = GUID {
        prefix: [0; 12],
        entity_id: [0; 4],
    };

    pub fn new(prefix: GuidPrefix, entity_id: [u8; 4]) -> Self {
        Self { prefix, entity_id }
    }

    /// GUID of the participant owning `prefix`.
    pub fn participant(prefix: GuidPrefix) -> Self {
        Self::new(prefix, ENTITYID_PARTICIPANT)
    }

    /// GUID of the `key`-th entity of `kind` in the participant.
    pub fn entity(prefix: GuidPrefix, key: u32, kind: EntityKind) -> Self {
        let [_, hi, mid, lo] = key.to_be_bytes();
        Self::new(prefix, [hi, mid, lo, kind as u8])
    }

    pub fn zero() -> Self {
        Self::ZERO
    }

    /// Entity handle exposed through the public API.
    pub fn to_handle(&self) -> InstanceHandle {
        let mut raw = [0u8; 16];
        let (prefix, entity) = raw.split_at_mut(12);
        prefix.copy_from_slice(&self.prefix);
        entity.copy_from_slice(&self.entity_id);
        InstanceHandle::new(raw)
    }

    pub fn from_handle(handle: InstanceHandle) -> Self {
        let mut guid = Self::ZERO;
        let (prefix, entity) = handle.0.split_at(12);
        guid.prefix.copy_from_slice(prefix);
        guid.entity_id.copy_from_slice(entity);
        guid
    }
}

impl fmt::Display for GUID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut octets = self.prefix.iter().chain(&self.entity_id);
        if let Some(first) = octets.next() {
            write!(f, "{:02x}", first)?;
        }
        octets.try_for_each(|octet| write!(f, ".{:02x}", octet))
    }
}

impl fmt::Debug for GUID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GUID").field(&format_args!("{}", self)).finish()
    }
}
