// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # DDS Topic
//!
//! A [`Topic`] is a named data channel with an associated type. Topics are
//! the connection point between DataWriters and DataReaders.
//!
//! ## Overview
//!
//! In DDS, a Topic defines:
//! - A **name**, unique within its participant
//! - A **type** (the Rust type implementing [`DDS`])
//! - A **QoS**, used as the default for writers and readers created on it
//!
//! ContentFilteredTopics and MultiTopics share the participant's topic
//! namespace; [`TopicDescription`] describes any of the three.
//!
//! ## Example
//!
//! ```ignore
//! let topic = participant.create_topic::<SensorData>("sensors/temperature", QoS::default())?;
//! let writer = publisher.create_datawriter(&topic, QoS::reliable())?;
//! let reader = subscriber.create_datareader(&topic, QoS::reliable())?;
//! ```
//!
//! ## See Also
//!
//! - [`DataWriter`](crate::DataWriter) - Publish samples to a topic
//! - [`DataReader`](crate::DataReader) - Subscribe to samples from a topic
//! - [`ContentFilteredTopic`](crate::ContentFilteredTopic) - Filtered view of a topic

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::condition::{HasStatusCondition, StatusCondition, StatusMask};
use super::content_filtered_topic::ContentFilteredTopicInner;
use super::filter::FieldValue;
use super::listener::{CallbackId, CallbackRegistry, ListenerSlot, StatusEvent, TopicListener};
use super::multi_topic::MultiTopicInner;
use super::participant::ParticipantInner;
use super::status::{InconsistentTopicStatus, StatusKind};
use super::{Error, InstanceHandle, Result, DDS};
use crate::core::discovery::TopicAnnouncement;
use crate::core::guid::GUID;
use crate::qos::QoS;

/// Extracts the filterable fields of a serialized sample of the topic type.
pub(crate) type FieldExtractor =
    Arc<dyn Fn(&[u8]) -> Result<HashMap<String, FieldValue>> + Send + Sync>;

/// What a name in the topic namespace refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicDescriptionKind {
    Topic,
    ContentFilteredTopic,
    MultiTopic,
}

/// Name, type and kind of a topic, content-filtered topic or multitopic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDescription {
    pub name: String,
    pub type_name: String,
    pub kind: TopicDescriptionKind,
}

/// Reject empty or blank entity names.
pub(crate) fn check_name(what: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::BadParameter(format!("{} name must not be empty", what)));
    }
    Ok(())
}

pub(crate) struct TopicInner {
    pub(crate) guid: GUID,
    pub(crate) name: String,
    pub(crate) type_name: String,
    pub(crate) qos: RwLock<QoS>,
    pub(crate) participant: Weak<ParticipantInner>,
    /// Readers, writers and derived topics referring to this topic.
    refs: AtomicUsize,
    inconsistent: Mutex<InconsistentTopicStatus>,
    pub(crate) listener: ListenerSlot<dyn TopicListener>,
    pub(crate) callbacks: CallbackRegistry,
    pub(crate) status_condition: Arc<StatusCondition>,
    pub(crate) fields_of: FieldExtractor,
}

impl TopicInner {
    pub(crate) fn new<T: DDS>(
        guid: GUID,
        name: &str,
        qos: QoS,
        participant: Weak<ParticipantInner>,
    ) -> Self {
        let fields_of: FieldExtractor = Arc::new(|payload: &[u8]| Ok(T::decode_cdr2(payload)?.get_fields()));
        Self {
            guid,
            name: name.to_string(),
            type_name: T::type_name().to_string(),
            qos: RwLock::new(qos),
            participant,
            refs: AtomicUsize::new(0),
            inconsistent: Mutex::new(InconsistentTopicStatus::default()),
            listener: ListenerSlot::new(),
            callbacks: CallbackRegistry::new(),
            status_condition: Arc::new(StatusCondition::new()),
            fields_of,
        }
    }

    pub(crate) fn acquire(&self) {
        self.refs.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn release(&self) {
        let _ = self
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub(crate) fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    pub(crate) fn handle(&self) -> InstanceHandle {
        self.guid.to_handle()
    }

    pub(crate) fn announcement(&self) -> TopicAnnouncement {
        TopicAnnouncement {
            guid: self.guid,
            name: self.name.clone(),
            type_name: self.type_name.clone(),
            qos: self.qos.read().clone(),
        }
    }

    pub(crate) fn description(&self) -> TopicDescription {
        TopicDescription {
            name: self.name.clone(),
            type_name: self.type_name.clone(),
            kind: TopicDescriptionKind::Topic,
        }
    }

    /// A remote topic with this name but another type was discovered.
    pub(crate) fn on_inconsistent(&self) {
        let status = {
            let mut status = self.inconsistent.lock();
            status.increment();
            status.clone()
        };
        log::warn!(
            "[discovery] inconsistent topic '{}' (local type '{}')",
            self.name,
            self.type_name
        );

        let kind = StatusKind::InconsistentTopic;
        let mut handled = false;
        if let Some(listener) = self.listener.for_kind(kind) {
            listener.on_inconsistent_topic(&self.name, status.clone());
            handled = true;
        } else if let Some(participant) = self.participant.upgrade() {
            if let Some(listener) = participant.listener.for_kind(kind) {
                listener.on_inconsistent_topic(&self.name, status.clone());
                handled = true;
            }
        }
        if handled {
            self.inconsistent.lock().total_count_change = 0;
            self.status_condition.deactivate(kind.mask());
        } else {
            self.status_condition.activate(kind.mask());
        }
        self.callbacks.dispatch(&StatusEvent::InconsistentTopic(status));
    }

    fn take_inconsistent_status(&self) -> InconsistentTopicStatus {
        let mut status = self.inconsistent.lock();
        let snapshot = status.clone();
        status.total_count_change = 0;
        self.status_condition
            .deactivate(StatusMask::INCONSISTENT_TOPIC);
        snapshot
    }
}

/// Any entry of a participant's topic namespace.
#[derive(Clone)]
pub(crate) enum TopicEntry {
    Topic(Arc<TopicInner>),
    Filtered(Arc<ContentFilteredTopicInner>),
    Multi(Arc<MultiTopicInner>),
}

impl TopicEntry {
    pub(crate) fn description(&self) -> TopicDescription {
        match self {
            TopicEntry::Topic(topic) => topic.description(),
            TopicEntry::Filtered(cft) => TopicDescription {
                name: cft.name.clone(),
                type_name: cft.related.type_name.clone(),
                kind: TopicDescriptionKind::ContentFilteredTopic,
            },
            TopicEntry::Multi(multi) => TopicDescription {
                name: multi.name.clone(),
                type_name: multi.type_name.clone(),
                kind: TopicDescriptionKind::MultiTopic,
            },
        }
    }
}

/// A typed DDS Topic - represents a named data channel.
///
/// `Topic<T>` is a cheap handle; clones refer to the same topic. The topic
/// lives until `DomainParticipant::delete_topic` removes it.
pub struct Topic<T: DDS> {
    pub(crate) inner: Arc<TopicInner>,
    _phantom: core::marker::PhantomData<fn() -> T>,
}

impl<T: DDS> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self::from_inner(Arc::clone(&self.inner))
    }
}

impl<T: DDS> std::fmt::Debug for Topic<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.inner.name)
            .field("type_name", &self.inner.type_name)
            .finish()
    }
}

impl<T: DDS> Topic<T> {
    pub(crate) fn from_inner(inner: Arc<TopicInner>) -> Self {
        Self {
            inner,
            _phantom: core::marker::PhantomData,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.inner.name
    }

    pub fn get_type_name(&self) -> &str {
        &self.inner.type_name
    }

    pub fn get_instance_handle(&self) -> InstanceHandle {
        self.inner.handle()
    }

    pub fn get_qos(&self) -> QoS {
        self.inner.qos.read().clone()
    }

    /// Replace the topic QoS.
    ///
    /// Topics are always enabled, so immutable policies cannot change.
    pub fn set_qos(&self, qos: QoS) -> Result<()> {
        {
            let mut current = self.inner.qos.write();
            current.check_update(&qos, true)?;
            *current = qos;
        }
        if let Some(participant) = self.inner.participant.upgrade() {
            participant.announce_topic(&self.inner);
        }
        Ok(())
    }

    pub fn get_inconsistent_topic_status(&self) -> InconsistentTopicStatus {
        self.inner.take_inconsistent_status()
    }

    /// Install (or clear) the topic listener.
    pub fn set_listener(&self, listener: Option<Arc<dyn TopicListener>>, mask: StatusMask) {
        self.inner.listener.set(listener, mask);
    }

    /// Register a closure invoked on every InconsistentTopic change.
    pub fn on_status<F>(&self, kind: StatusKind, callback: F) -> CallbackId
    where
        F: Fn(&StatusEvent) + Send + Sync + 'static,
    {
        self.inner.callbacks.register(kind, callback)
    }

    pub fn remove_callback(&self, id: CallbackId) -> bool {
        self.inner.callbacks.remove(id)
    }

    pub fn description(&self) -> TopicDescription {
        self.inner.description()
    }
}

impl<T: DDS> HasStatusCondition for Topic<T> {
    fn get_status_condition(&self) -> Arc<StatusCondition> {
        Arc::clone(&self.inner.status_condition)
    }
}
