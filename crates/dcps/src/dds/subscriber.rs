// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DDS Subscriber entity - creates and manages DataReader instances
//!
//! Readers can be created on a plain [`Topic`], a [`ContentFilteredTopic`]
//! or a [`MultiTopic`]. The subscriber owns the group policies of its readers
//! and the `on_data_on_readers` notification that precedes `on_data_available`.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::condition::{HasStatusCondition, StatusCondition, StatusMask};
use super::content_filtered_topic::ContentFilteredTopic;
use super::listener::{CallbackId, CallbackRegistry, ListenerSlot, StatusEvent, SubscriberListener};
use super::multi_topic::{MultiTopic, MultiTopicSample};
use super::participant::{DomainParticipant, ParticipantInner};
use super::read_condition::{InstanceStateMask, SampleStateMask, StateMasks, ViewStateMask};
use super::reader::{
    Component, DataReader, FilteredDecoder, MultiDecoder, PlainDecoder, ReaderConfig,
    ReaderEndpoint, ReaderInner, ReaderSource, SampleDecoder,
};
use super::status::StatusKind;
use super::topic::{Topic, TopicInner};
use super::{Error, InstanceHandle, Result, DDS};
use crate::core::guid::{EntityKind, GUID};
use crate::qos::QoS;

pub(crate) struct SubscriberInner {
    me: Weak<SubscriberInner>,
    pub(crate) guid: GUID,
    pub(crate) participant: Weak<ParticipantInner>,
    pub(crate) qos: RwLock<QoS>,
    default_reader_qos: RwLock<QoS>,
    readers: Mutex<Vec<Arc<dyn ReaderEndpoint>>>,
    /// Nesting depth of `begin_access`.
    access_depth: AtomicU32,
    pub(crate) listener: ListenerSlot<dyn SubscriberListener>,
    pub(crate) callbacks: CallbackRegistry,
    pub(crate) status_condition: Arc<StatusCondition>,
    enabled: AtomicBool,
    deleted: AtomicBool,
}

impl SubscriberInner {
    pub(crate) fn new(
        guid: GUID,
        qos: QoS,
        participant: Weak<ParticipantInner>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            guid,
            participant,
            qos: RwLock::new(qos),
            default_reader_qos: RwLock::new(QoS::default()),
            readers: Mutex::new(Vec::new()),
            access_depth: AtomicU32::new(0),
            listener: ListenerSlot::new(),
            callbacks: CallbackRegistry::new(),
            status_condition: Arc::new(StatusCondition::new()),
            enabled: AtomicBool::new(false),
            deleted: AtomicBool::new(false),
        })
    }

    pub(crate) fn weak(&self) -> Weak<SubscriberInner> {
        self.me.clone()
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire) && !self.is_deleted()
    }

    pub(crate) fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub(crate) fn handle(&self) -> InstanceHandle {
        self.guid.to_handle()
    }

    pub(crate) fn reader_count(&self) -> usize {
        self.readers.lock().len()
    }

    /// Whether `handle` names this subscriber or one of its readers.
    pub(crate) fn contains(&self, handle: &InstanceHandle) -> bool {
        self.handle() == *handle || self.readers.lock().iter().any(|r| r.handle() == *handle)
    }

    /// Attach an already built reader (built-in readers).
    pub(crate) fn adopt(&self, reader: Arc<dyn ReaderEndpoint>) {
        self.readers.lock().push(reader);
    }

    pub(crate) fn enable(&self) -> Result<()> {
        if self.is_deleted() {
            return Err(Error::AlreadyDeleted);
        }
        if let Some(participant) = self.participant.upgrade() {
            if !participant.is_enabled() {
                return Err(Error::PreconditionNotMet(
                    "the participant is not enabled".into(),
                ));
            }
        }
        if self.enabled.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if self.qos.read().entity_factory.autoenable_created_entities {
            let readers = self.readers.lock().clone();
            for reader in readers.iter().filter(|r| !r.is_enabled()) {
                reader.enable_endpoint()?;
            }
        }
        Ok(())
    }

    fn retire_reader(&self, reader: &Arc<dyn ReaderEndpoint>) {
        if let Some(participant) = self.participant.upgrade() {
            participant.unregister_reader(reader);
        }
        reader.mark_deleted();
    }

    pub(crate) fn mark_deleted(&self) {
        let readers = std::mem::take(&mut *self.readers.lock());
        for reader in &readers {
            self.retire_reader(reader);
        }
        if self.deleted.swap(true, Ordering::AcqRel) {
            return;
        }
        self.enabled.store(false, Ordering::Release);
        self.listener.set(None, StatusMask::NONE);
        self.callbacks.clear();
        self.status_condition.mark_deleted();
        log::debug!("[subscriber] {} deleted", self.guid);
    }
}

/// DDS Subscriber - intermediate entity between DomainParticipant and
/// DataReader.
///
/// # Example
///
/// ```ignore
/// let subscriber = participant.create_subscriber(QoS::default())?;
/// let reader = subscriber.create_datareader(&topic, QoS::reliable())?;
/// ```
#[derive(Clone)]
pub struct Subscriber {
    pub(crate) inner: Arc<SubscriberInner>,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("guid", &self.inner.guid)
            .finish()
    }
}

impl Subscriber {
    pub(crate) fn from_inner(inner: Arc<SubscriberInner>) -> Self {
        Self { inner }
    }

    fn check_alive(&self) -> Result<()> {
        if self.inner.is_deleted() {
            return Err(Error::AlreadyDeleted);
        }
        Ok(())
    }

    fn check_topic(&self, topic: &TopicInner) -> Result<Arc<ParticipantInner>> {
        if !Weak::ptr_eq(&topic.participant, &self.inner.participant) {
            return Err(Error::PreconditionNotMet(
                "topic belongs to another participant".into(),
            ));
        }
        self.inner
            .participant
            .upgrade()
            .ok_or(Error::AlreadyDeleted)
    }

    fn install<T: DDS>(
        &self,
        participant: &Arc<ParticipantInner>,
        guid: GUID,
        components: Vec<Component>,
        source: ReaderSource,
        decoder: Box<dyn SampleDecoder<T>>,
        qos: QoS,
    ) -> Result<DataReader<T>> {
        let reader = ReaderInner::new(ReaderConfig {
            guid,
            components,
            source,
            decoder,
            qos,
            subscriber: self.inner.weak(),
            participant: Arc::downgrade(participant),
            domain: participant.domain(),
            enabled: false,
        });
        if let Some(endpoint) = reader.as_endpoint() {
            self.inner.readers.lock().push(endpoint);
        }
        log::debug!(
            "[subscriber] {} created reader {} on '{}'",
            self.inner.guid,
            guid,
            reader.source.description().name
        );
        let autoenable = self.inner.qos.read().entity_factory.autoenable_created_entities;
        if self.inner.is_enabled() && autoenable {
            reader.enable()?;
        }
        Ok(DataReader::from_inner(reader))
    }

    /// Create a DataReader on `topic`.
    ///
    /// # Errors
    ///
    /// - `PreconditionNotMet` if the topic belongs to another participant
    /// - `InconsistentPolicy` for contradicting QoS
    pub fn create_datareader<T: DDS>(&self, topic: &Topic<T>, qos: QoS) -> Result<DataReader<T>> {
        self.check_alive()?;
        let participant = self.check_topic(&topic.inner)?;
        qos.validate()?;
        let guid = participant.allocate_guid(EntityKind::Reader);
        self.install(
            &participant,
            guid,
            vec![Component {
                guid,
                topic: Arc::clone(&topic.inner),
            }],
            ReaderSource::Topic(Arc::clone(&topic.inner)),
            Box::new(PlainDecoder),
            qos,
        )
    }

    /// Create a reader with the subscriber's default reader QoS.
    pub fn create_datareader_with_default_qos<T: DDS>(
        &self,
        topic: &Topic<T>,
    ) -> Result<DataReader<T>> {
        self.create_datareader(topic, self.get_default_datareader_qos())
    }

    /// Create a DataReader that only stores samples passing the filter of
    /// `topic`.
    pub fn create_datareader_filtered<T: DDS>(
        &self,
        topic: &ContentFilteredTopic<T>,
        qos: QoS,
    ) -> Result<DataReader<T>> {
        self.check_alive()?;
        let participant = self.check_topic(&topic.inner.related)?;
        qos.validate()?;
        let guid = participant.allocate_guid(EntityKind::Reader);
        self.install(
            &participant,
            guid,
            vec![Component {
                guid,
                topic: Arc::clone(&topic.inner.related),
            }],
            ReaderSource::Filtered(Arc::clone(&topic.inner)),
            Box::new(FilteredDecoder {
                topic: Arc::clone(&topic.inner),
            }),
            qos,
        )
    }

    /// Create a DataReader over every related topic of `topic`. One
    /// subscription is announced per related topic.
    pub fn create_datareader_multi(
        &self,
        topic: &MultiTopic,
        qos: QoS,
    ) -> Result<DataReader<MultiTopicSample>> {
        self.check_alive()?;
        let mut participant = None;
        for related in &topic.inner.topics {
            participant = Some(self.check_topic(related)?);
        }
        let participant = participant.ok_or_else(|| {
            Error::BadParameter("multitopic has no related topic".into())
        })?;
        qos.validate()?;
        let guid = participant.allocate_guid(EntityKind::Reader);
        let components = topic
            .inner
            .topics
            .iter()
            .enumerate()
            .map(|(i, related)| Component {
                guid: if i == 0 {
                    guid
                } else {
                    participant.allocate_guid(EntityKind::Reader)
                },
                topic: Arc::clone(related),
            })
            .collect();
        self.install(
            &participant,
            guid,
            components,
            ReaderSource::Multi(Arc::clone(&topic.inner)),
            Box::new(MultiDecoder::new(Arc::clone(&topic.inner))),
            qos,
        )
    }

    /// Delete a reader created by this subscriber.
    ///
    /// # Errors
    ///
    /// `PreconditionNotMet` if the reader belongs to another subscriber or
    /// still has read conditions.
    pub fn delete_datareader<T: DDS>(&self, reader: &DataReader<T>) -> Result<()> {
        self.check_alive()?;
        if reader.inner.condition_count() > 0 {
            return Err(Error::PreconditionNotMet(
                "reader still has read conditions".into(),
            ));
        }
        let guid = reader.get_instance_handle();
        let removed = {
            let mut readers = self.inner.readers.lock();
            let index = readers.iter().position(|r| r.handle() == guid);
            index.map(|i| readers.remove(i))
        };
        match removed {
            Some(endpoint) => {
                self.inner.retire_reader(&endpoint);
                Ok(())
            }
            None => Err(Error::PreconditionNotMet(
                "reader was not created by this subscriber".into(),
            )),
        }
    }

    /// First reader of this subscriber on topic `topic_name` with type `T`.
    pub fn lookup_datareader<T: DDS>(&self, topic_name: &str) -> Option<DataReader<T>> {
        self.inner
            .readers
            .lock()
            .iter()
            .filter(|r| r.topic_name() == topic_name)
            .find_map(|r| {
                r.as_any()
                    .downcast_ref::<ReaderInner<T>>()
                    .and_then(ReaderInner::arc)
            })
            .map(DataReader::from_inner)
    }

    /// Handles of the readers holding samples in the given states.
    pub fn get_datareaders(
        &self,
        sample_states: SampleStateMask,
        view_states: ViewStateMask,
        instance_states: InstanceStateMask,
    ) -> Result<Vec<InstanceHandle>> {
        self.check_alive()?;
        let masks = StateMasks {
            sample: sample_states,
            view: view_states,
            instance: instance_states,
        };
        Ok(self
            .inner
            .readers
            .lock()
            .iter()
            .filter(|r| r.is_enabled() && r.has_matching(&masks))
            .map(|r| r.handle())
            .collect())
    }

    /// Invoke `on_data_available` on every reader holding unread samples.
    pub fn notify_datareaders(&self) -> Result<()> {
        self.check_alive()?;
        let readers = self.inner.readers.lock().clone();
        for reader in readers {
            reader.notify_data_available();
        }
        Ok(())
    }

    /// Open an access scope; scopes nest.
    pub fn begin_access(&self) -> Result<()> {
        self.check_alive()?;
        self.inner.access_depth.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// # Errors
    ///
    /// `PreconditionNotMet` without a matching `begin_access`.
    pub fn end_access(&self) -> Result<()> {
        self.check_alive()?;
        self.inner
            .access_depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| Error::PreconditionNotMet("no access scope is open".into()))
    }

    /// Delete every reader of this subscriber, with their conditions.
    pub fn delete_contained_entities(&self) -> Result<()> {
        self.check_alive()?;
        let readers = std::mem::take(&mut *self.inner.readers.lock());
        for reader in &readers {
            self.inner.retire_reader(reader);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // QoS
    // ------------------------------------------------------------------

    pub fn get_qos(&self) -> QoS {
        self.inner.qos.read().clone()
    }

    /// Replace the subscriber QoS; contained readers are re-matched with the
    /// new group policies.
    pub fn set_qos(&self, qos: QoS) -> Result<()> {
        self.check_alive()?;
        let enabled = self.inner.is_enabled();
        {
            let mut current = self.inner.qos.write();
            current.check_update(&qos, enabled)?;
            *current = qos;
        }
        if enabled {
            if let Some(participant) = self.inner.participant.upgrade() {
                let readers = self.inner.readers.lock().clone();
                for reader in readers.iter().filter(|r| r.is_enabled()) {
                    participant.reevaluate_reader(reader);
                }
            }
        }
        Ok(())
    }

    pub fn get_default_datareader_qos(&self) -> QoS {
        self.inner.default_reader_qos.read().clone()
    }

    pub fn set_default_datareader_qos(&self, qos: QoS) -> Result<()> {
        qos.validate()?;
        *self.inner.default_reader_qos.write() = qos;
        Ok(())
    }

    /// Start from the default reader QoS and apply the topic's QoS.
    pub fn copy_from_topic_qos<T: DDS>(&self, topic: &Topic<T>) -> QoS {
        let mut qos = self.get_default_datareader_qos();
        let topic_qos = topic.get_qos();
        qos.reliability = topic_qos.reliability;
        qos.durability = topic_qos.durability;
        qos.history = topic_qos.history;
        qos.resource_limits = topic_qos.resource_limits;
        qos.deadline = topic_qos.deadline;
        qos.liveliness = topic_qos.liveliness;
        qos.ownership = topic_qos.ownership;
        qos.destination_order = topic_qos.destination_order;
        qos
    }

    // ------------------------------------------------------------------
    // Entity
    // ------------------------------------------------------------------

    pub fn enable(&self) -> Result<()> {
        self.inner.enable()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }

    pub fn get_instance_handle(&self) -> InstanceHandle {
        self.inner.handle()
    }

    pub fn get_participant(&self) -> Result<DomainParticipant> {
        self.inner
            .participant
            .upgrade()
            .map(DomainParticipant::from_inner)
            .ok_or(Error::AlreadyDeleted)
    }

    /// Install (or clear) the subscriber listener. It receives
    /// `on_data_on_readers` and the reader statuses their own listener does
    /// not handle.
    pub fn set_listener(
        &self,
        listener: Option<Arc<dyn SubscriberListener>>,
        mask: StatusMask,
    ) -> Result<()> {
        self.check_alive()?;
        self.inner.listener.set(listener, mask);
        Ok(())
    }

    pub fn on_status<F>(&self, kind: StatusKind, callback: F) -> CallbackId
    where
        F: Fn(&StatusEvent) + Send + Sync + 'static,
    {
        self.inner.callbacks.register(kind, callback)
    }

    pub fn remove_callback(&self, id: CallbackId) -> bool {
        self.inner.callbacks.remove(id)
    }
}

impl HasStatusCondition for Subscriber {
    fn get_status_condition(&self) -> Arc<StatusCondition> {
        Arc::clone(&self.inner.status_condition)
    }
}
