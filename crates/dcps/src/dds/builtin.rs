// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Built-in topic data types (DDS v1.4 Sec.2.2.5).
//!
//! Every participant has a built-in subscriber with one read-only reader per
//! built-in topic. Discovery publishes into those readers whenever a remote
//! participant, publication, subscription or topic appears, changes or goes
//! away; a departure disposes the instance.
//!
//! ```ignore
//! let builtin = participant.get_builtin_subscriber();
//! let readers = builtin.lookup_datareader::<PublicationBuiltinTopicData>(BUILTIN_PUBLICATION_TOPIC);
//! for sample in readers.unwrap().read(32)? {
//!     if let Some(data) = sample.data {
//!         println!("{} publishes {}", data.participant_key.0[0], data.topic_name);
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use super::filter::FieldValue;
use super::{InstanceHandle, Result, DDS};
use crate::core::discovery::{EndpointAnnouncement, ParticipantAnnouncement, TopicAnnouncement};
use crate::core::guid::GUID;
use crate::qos::{
    Deadline, DestinationOrder, Durability, GroupData, History, Liveliness, LivelinessKind,
    Ownership, OwnershipStrength, Partition, Reliability, ResourceLimits, TopicData, UserData,
};
use crate::ser::{CdrReader, CdrWriter, SerError, SerResult};

pub const BUILTIN_PARTICIPANT_TOPIC: &str = "DCPSParticipant";
pub const BUILTIN_PUBLICATION_TOPIC: &str = "DCPSPublication";
pub const BUILTIN_SUBSCRIPTION_TOPIC: &str = "DCPSSubscription";
pub const BUILTIN_TOPIC_TOPIC: &str = "DCPSTopic";

// ============================================================================
// Policy codec
// ============================================================================

fn write_duration(w: &mut CdrWriter<'_>, d: Duration) -> SerResult<()> {
    w.write_u64_le(d.as_secs())?;
    w.write_u32_le(d.subsec_nanos())
}

fn read_duration(r: &mut CdrReader<'_>) -> SerResult<Duration> {
    let secs = r.read_u64_le()?;
    let nanos = r.read_u32_le()?;
    if nanos >= 1_000_000_000 {
        return Err(SerError::InvalidData {
            reason: format!("duration nanoseconds out of range: {}", nanos),
        });
    }
    Ok(Duration::new(secs, nanos))
}

fn write_handle(w: &mut CdrWriter<'_>, h: InstanceHandle) -> SerResult<()> {
    w.write_bytes(h.as_bytes())
}

fn read_handle(r: &mut CdrReader<'_>) -> SerResult<InstanceHandle> {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(r.read_bytes(16)?);
    Ok(InstanceHandle::new(bytes))
}

fn invalid(what: &str, value: u8) -> SerError {
    SerError::InvalidData {
        reason: format!("unknown {} discriminant {}", what, value),
    }
}

fn durability_from(v: u8) -> SerResult<Durability> {
    match v {
        0 => Ok(Durability::Volatile),
        1 => Ok(Durability::TransientLocal),
        2 => Ok(Durability::Transient),
        3 => Ok(Durability::Persistent),
        _ => Err(invalid("durability", v)),
    }
}

fn reliability_from(v: u8) -> SerResult<Reliability> {
    match v {
        0 => Ok(Reliability::BestEffort),
        1 => Ok(Reliability::Reliable),
        _ => Err(invalid("reliability", v)),
    }
}

fn liveliness_kind_from(v: u8) -> SerResult<LivelinessKind> {
    match v {
        0 => Ok(LivelinessKind::Automatic),
        1 => Ok(LivelinessKind::ManualByParticipant),
        2 => Ok(LivelinessKind::ManualByTopic),
        _ => Err(invalid("liveliness", v)),
    }
}

fn ownership_from(v: u8) -> SerResult<Ownership> {
    match v {
        0 => Ok(Ownership::shared()),
        1 => Ok(Ownership::exclusive()),
        _ => Err(invalid("ownership", v)),
    }
}

fn destination_order_from(v: u8) -> SerResult<DestinationOrder> {
    match v {
        0 => Ok(DestinationOrder::by_reception_timestamp()),
        1 => Ok(DestinationOrder::by_source_timestamp()),
        _ => Err(invalid("destination order", v)),
    }
}

fn write_partition(w: &mut CdrWriter<'_>, p: &Partition) -> SerResult<()> {
    w.write_u32_le(p.names.len() as u32)?;
    for name in &p.names {
        w.write_string(name)?;
    }
    Ok(())
}

fn read_partition(r: &mut CdrReader<'_>) -> SerResult<Partition> {
    let count = r.read_u32_le()? as usize;
    if count > r.remaining() {
        return Err(SerError::InvalidData {
            reason: format!("partition count {} exceeds payload", count),
        });
    }
    let mut names = Vec::with_capacity(count);
    for _ in 0..count {
        names.push(r.read_string()?);
    }
    Ok(Partition::new(names))
}

/// Policies shared by the publication and subscription built-in topics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct EndpointPolicies {
    durability: Durability,
    deadline: Deadline,
    liveliness: Liveliness,
    reliability: Reliability,
    ownership: Ownership,
    destination_order: DestinationOrder,
    partition: Partition,
}

impl EndpointPolicies {
    fn write(&self, w: &mut CdrWriter<'_>) -> SerResult<()> {
        w.write_u8(self.durability as u8)?;
        write_duration(w, self.deadline.period)?;
        w.write_u8(self.liveliness.kind as u8)?;
        write_duration(w, self.liveliness.lease_duration)?;
        w.write_u8(self.reliability as u8)?;
        w.write_u8(self.ownership.kind as u8)?;
        w.write_u8(self.destination_order.kind as u8)?;
        write_partition(w, &self.partition)
    }

    fn read(r: &mut CdrReader<'_>) -> SerResult<Self> {
        Ok(Self {
            durability: durability_from(r.read_u8()?)?,
            deadline: Deadline::new(read_duration(r)?),
            liveliness: Liveliness::new(liveliness_kind_from(r.read_u8()?)?, read_duration(r)?),
            reliability: reliability_from(r.read_u8()?)?,
            ownership: ownership_from(r.read_u8()?)?,
            destination_order: destination_order_from(r.read_u8()?)?,
            partition: read_partition(r)?,
        })
    }
}

fn string_field(fields: &mut HashMap<String, FieldValue>, name: &str, value: &str) {
    fields.insert(name.to_string(), FieldValue::from_string(value));
}

// ============================================================================
// DCPSParticipant
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParticipantBuiltinTopicData {
    /// Entity handle of the participant.
    pub key: InstanceHandle,
    pub domain_id: u32,
    pub lease_duration: Duration,
    pub user_data: UserData,
}

impl ParticipantBuiltinTopicData {
    pub(crate) fn from_announcement(ann: &ParticipantAnnouncement) -> Self {
        Self {
            key: GUID::participant(ann.guid_prefix).to_handle(),
            domain_id: ann.domain_id,
            lease_duration: ann.lease_duration,
            user_data: UserData::new(ann.user_data.clone()),
        }
    }
}

impl DDS for ParticipantBuiltinTopicData {
    fn type_name() -> &'static str {
        "ParticipantBuiltinTopicData"
    }

    fn encode_cdr2(&self, buf: &mut Vec<u8>) -> Result<()> {
        let mut w = CdrWriter::new(buf);
        write_handle(&mut w, self.key)?;
        w.write_u32_le(self.domain_id)?;
        write_duration(&mut w, self.lease_duration)?;
        w.write_octets(&self.user_data.value)?;
        Ok(())
    }

    fn decode_cdr2(buf: &[u8]) -> Result<Self> {
        let mut r = CdrReader::new(buf);
        Ok(Self {
            key: read_handle(&mut r)?,
            domain_id: r.read_u32_le()?,
            lease_duration: read_duration(&mut r)?,
            user_data: UserData::new(r.read_octets()?),
        })
    }

    fn has_key() -> bool {
        true
    }

    fn compute_key(&self) -> [u8; 16] {
        self.key.0
    }
}

// ============================================================================
// DCPSPublication / DCPSSubscription
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PublicationBuiltinTopicData {
    /// Entity handle of the writer.
    pub key: InstanceHandle,
    pub participant_key: InstanceHandle,
    pub topic_name: String,
    pub type_name: String,
    pub durability: Durability,
    pub deadline: Deadline,
    pub liveliness: Liveliness,
    pub reliability: Reliability,
    pub ownership: Ownership,
    pub ownership_strength: OwnershipStrength,
    pub destination_order: DestinationOrder,
    pub user_data: UserData,
    pub topic_data: TopicData,
    pub group_data: GroupData,
    pub partition: Partition,
}

impl PublicationBuiltinTopicData {
    pub(crate) fn from_announcement(ann: &EndpointAnnouncement) -> Self {
        let q = &ann.qos;
        Self {
            key: ann.guid.to_handle(),
            participant_key: GUID::participant(ann.guid.prefix).to_handle(),
            topic_name: ann.topic_name.clone(),
            type_name: ann.type_name.clone(),
            durability: q.durability,
            deadline: q.deadline,
            liveliness: q.liveliness,
            reliability: q.reliability,
            ownership: q.ownership,
            ownership_strength: q.ownership_strength,
            destination_order: q.destination_order,
            user_data: q.user_data.clone(),
            topic_data: q.topic_data.clone(),
            group_data: q.group_data.clone(),
            partition: q.partition.clone(),
        }
    }

    fn policies(&self) -> EndpointPolicies {
        EndpointPolicies {
            durability: self.durability,
            deadline: self.deadline,
            liveliness: self.liveliness,
            reliability: self.reliability,
            ownership: self.ownership,
            destination_order: self.destination_order,
            partition: self.partition.clone(),
        }
    }
}

impl DDS for PublicationBuiltinTopicData {
    fn type_name() -> &'static str {
        "PublicationBuiltinTopicData"
    }

    fn encode_cdr2(&self, buf: &mut Vec<u8>) -> Result<()> {
        let mut w = CdrWriter::new(buf);
        write_handle(&mut w, self.key)?;
        write_handle(&mut w, self.participant_key)?;
        w.write_string(&self.topic_name)?;
        w.write_string(&self.type_name)?;
        self.policies().write(&mut w)?;
        w.write_i32_le(self.ownership_strength.value)?;
        w.write_octets(&self.user_data.value)?;
        w.write_octets(&self.topic_data.value)?;
        w.write_octets(&self.group_data.value)?;
        Ok(())
    }

    fn decode_cdr2(buf: &[u8]) -> Result<Self> {
        let mut r = CdrReader::new(buf);
        let key = read_handle(&mut r)?;
        let participant_key = read_handle(&mut r)?;
        let topic_name = r.read_string()?;
        let type_name = r.read_string()?;
        let p = EndpointPolicies::read(&mut r)?;
        Ok(Self {
            key,
            participant_key,
            topic_name,
            type_name,
            durability: p.durability,
            deadline: p.deadline,
            liveliness: p.liveliness,
            reliability: p.reliability,
            ownership: p.ownership,
            ownership_strength: OwnershipStrength::new(r.read_i32_le()?),
            destination_order: p.destination_order,
            user_data: UserData::new(r.read_octets()?),
            topic_data: TopicData::new(r.read_octets()?),
            group_data: GroupData::new(r.read_octets()?),
            partition: p.partition,
        })
    }

    fn has_key() -> bool {
        true
    }

    fn compute_key(&self) -> [u8; 16] {
        self.key.0
    }

    fn get_fields(&self) -> HashMap<String, FieldValue> {
        let mut fields = HashMap::new();
        string_field(&mut fields, "topic_name", &self.topic_name);
        string_field(&mut fields, "type_name", &self.type_name);
        fields.insert(
            "ownership_strength".to_string(),
            FieldValue::from_i32(self.ownership_strength.value),
        );
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubscriptionBuiltinTopicData {
    /// Entity handle of the reader.
    pub key: InstanceHandle,
    pub participant_key: InstanceHandle,
    pub topic_name: String,
    pub type_name: String,
    pub durability: Durability,
    pub deadline: Deadline,
    pub liveliness: Liveliness,
    pub reliability: Reliability,
    pub ownership: Ownership,
    pub destination_order: DestinationOrder,
    pub user_data: UserData,
    pub topic_data: TopicData,
    pub group_data: GroupData,
    pub partition: Partition,
}

impl SubscriptionBuiltinTopicData {
    pub(crate) fn from_announcement(ann: &EndpointAnnouncement) -> Self {
        let q = &ann.qos;
        Self {
            key: ann.guid.to_handle(),
            participant_key: GUID::participant(ann.guid.prefix).to_handle(),
            topic_name: ann.topic_name.clone(),
            type_name: ann.type_name.clone(),
            durability: q.durability,
            deadline: q.deadline,
            liveliness: q.liveliness,
            reliability: q.reliability,
            ownership: q.ownership,
            destination_order: q.destination_order,
            user_data: q.user_data.clone(),
            topic_data: q.topic_data.clone(),
            group_data: q.group_data.clone(),
            partition: q.partition.clone(),
        }
    }
}

impl DDS for SubscriptionBuiltinTopicData {
    fn type_name() -> &'static str {
        "SubscriptionBuiltinTopicData"
    }

    fn encode_cdr2(&self, buf: &mut Vec<u8>) -> Result<()> {
        let mut w = CdrWriter::new(buf);
        write_handle(&mut w, self.key)?;
        write_handle(&mut w, self.participant_key)?;
        w.write_string(&self.topic_name)?;
        w.write_string(&self.type_name)?;
        EndpointPolicies {
            durability: self.durability,
            deadline: self.deadline,
            liveliness: self.liveliness,
            reliability: self.reliability,
            ownership: self.ownership,
            destination_order: self.destination_order,
            partition: self.partition.clone(),
        }
        .write(&mut w)?;
        w.write_octets(&self.user_data.value)?;
        w.write_octets(&self.topic_data.value)?;
        w.write_octets(&self.group_data.value)?;
        Ok(())
    }

    fn decode_cdr2(buf: &[u8]) -> Result<Self> {
        let mut r = CdrReader::new(buf);
        let key = read_handle(&mut r)?;
        let participant_key = read_handle(&mut r)?;
        let topic_name = r.read_string()?;
        let type_name = r.read_string()?;
        let p = EndpointPolicies::read(&mut r)?;
        Ok(Self {
            key,
            participant_key,
            topic_name,
            type_name,
            durability: p.durability,
            deadline: p.deadline,
            liveliness: p.liveliness,
            reliability: p.reliability,
            ownership: p.ownership,
            destination_order: p.destination_order,
            user_data: UserData::new(r.read_octets()?),
            topic_data: TopicData::new(r.read_octets()?),
            group_data: GroupData::new(r.read_octets()?),
            partition: p.partition,
        })
    }

    fn has_key() -> bool {
        true
    }

    fn compute_key(&self) -> [u8; 16] {
        self.key.0
    }

    fn get_fields(&self) -> HashMap<String, FieldValue> {
        let mut fields = HashMap::new();
        string_field(&mut fields, "topic_name", &self.topic_name);
        string_field(&mut fields, "type_name", &self.type_name);
        fields
    }
}

// ============================================================================
// DCPSTopic
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopicBuiltinTopicData {
    pub key: InstanceHandle,
    pub name: String,
    pub type_name: String,
    pub durability: Durability,
    pub deadline: Deadline,
    pub liveliness: Liveliness,
    pub reliability: Reliability,
    pub ownership: Ownership,
    pub destination_order: DestinationOrder,
    pub history: History,
    pub resource_limits: ResourceLimits,
    pub topic_data: TopicData,
}

impl TopicBuiltinTopicData {
    pub(crate) fn from_announcement(ann: &TopicAnnouncement) -> Self {
        let q = &ann.qos;
        Self {
            key: ann.guid.to_handle(),
            name: ann.name.clone(),
            type_name: ann.type_name.clone(),
            durability: q.durability,
            deadline: q.deadline,
            liveliness: q.liveliness,
            reliability: q.reliability,
            ownership: q.ownership,
            destination_order: q.destination_order,
            history: q.history,
            resource_limits: q.resource_limits,
            topic_data: q.topic_data.clone(),
        }
    }
}

fn limit_to_wire(v: usize) -> u64 {
    v as u64
}

fn limit_from_wire(v: u64) -> usize {
    usize::try_from(v).unwrap_or(usize::MAX)
}

impl DDS for TopicBuiltinTopicData {
    fn type_name() -> &'static str {
        "TopicBuiltinTopicData"
    }

    fn encode_cdr2(&self, buf: &mut Vec<u8>) -> Result<()> {
        let mut w = CdrWriter::new(buf);
        write_handle(&mut w, self.key)?;
        w.write_string(&self.name)?;
        w.write_string(&self.type_name)?;
        EndpointPolicies {
            durability: self.durability,
            deadline: self.deadline,
            liveliness: self.liveliness,
            reliability: self.reliability,
            ownership: self.ownership,
            destination_order: self.destination_order,
            partition: Partition::default(),
        }
        .write(&mut w)?;
        match self.history {
            History::KeepLast(depth) => {
                w.write_u8(0)?;
                w.write_u32_le(depth)?;
            }
            History::KeepAll => {
                w.write_u8(1)?;
                w.write_u32_le(0)?;
            }
        }
        w.write_u64_le(limit_to_wire(self.resource_limits.max_samples))?;
        w.write_u64_le(limit_to_wire(self.resource_limits.max_instances))?;
        w.write_u64_le(limit_to_wire(self.resource_limits.max_samples_per_instance))?;
        w.write_octets(&self.topic_data.value)?;
        Ok(())
    }

    fn decode_cdr2(buf: &[u8]) -> Result<Self> {
        let mut r = CdrReader::new(buf);
        let key = read_handle(&mut r)?;
        let name = r.read_string()?;
        let type_name = r.read_string()?;
        let p = EndpointPolicies::read(&mut r)?;
        let history = match (r.read_u8()?, r.read_u32_le()?) {
            (0, depth) => History::KeepLast(depth),
            (1, _) => History::KeepAll,
            (other, _) => return Err(invalid("history", other).into()),
        };
        let resource_limits = ResourceLimits::new(
            limit_from_wire(r.read_u64_le()?),
            limit_from_wire(r.read_u64_le()?),
            limit_from_wire(r.read_u64_le()?),
        );
        Ok(Self {
            key,
            name,
            type_name,
            durability: p.durability,
            deadline: p.deadline,
            liveliness: p.liveliness,
            reliability: p.reliability,
            ownership: p.ownership,
            destination_order: p.destination_order,
            history,
            resource_limits,
            topic_data: TopicData::new(r.read_octets()?),
        })
    }

    fn has_key() -> bool {
        true
    }

    fn compute_key(&self) -> [u8; 16] {
        self.key.0
    }

    fn get_fields(&self) -> HashMap<String, FieldValue> {
        let mut fields = HashMap::new();
        string_field(&mut fields, "name", &self.name);
        string_field(&mut fields, "type_name", &self.type_name);
        fields
    }
}
