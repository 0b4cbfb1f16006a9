// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DDS Publisher entity - creates and manages DataWriter instances
//!
//! The publisher owns the group policies of its writers (Partition,
//! Presentation, GroupData, EntityFactory) and the gate every write goes
//! through: inside a coherent set, or while publications are suspended,
//! changes are held back and released together, in write order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use super::condition::{HasStatusCondition, StatusCondition, StatusMask};
use super::listener::{CallbackId, CallbackRegistry, ListenerSlot, PublisherListener, StatusEvent};
use super::participant::{DomainParticipant, ParticipantInner};
use super::status::StatusKind;
use super::topic::Topic;
use super::writer::{Change, DataWriter, WriterConfig, WriterInner};
use super::{Error, InstanceHandle, Result, Time, DDS};
use crate::core::guid::{EntityKind, GUID};
use crate::qos::QoS;
use crate::reliability::ChangeKind;

#[derive(Default)]
struct Gate {
    /// Nesting depth of `begin_coherent_changes`.
    coherent: u32,
    suspended: bool,
    held: Vec<(Arc<WriterInner>, Change)>,
}

impl Gate {
    fn is_open(&self) -> bool {
        self.coherent == 0 && !self.suspended
    }
}

pub(crate) struct PublisherInner {
    me: Weak<PublisherInner>,
    pub(crate) guid: GUID,
    pub(crate) participant: Weak<ParticipantInner>,
    pub(crate) qos: RwLock<QoS>,
    default_writer_qos: RwLock<QoS>,
    writers: Mutex<Vec<Arc<WriterInner>>>,
    gate: Mutex<Gate>,
    pub(crate) listener: ListenerSlot<dyn PublisherListener>,
    pub(crate) callbacks: CallbackRegistry,
    pub(crate) status_condition: Arc<StatusCondition>,
    enabled: AtomicBool,
    deleted: AtomicBool,
}

impl PublisherInner {
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
            default_writer_qos: RwLock::new(QoS::default()),
            writers: Mutex::new(Vec::new()),
            gate: Mutex::new(Gate::default()),
            listener: ListenerSlot::new(),
            callbacks: CallbackRegistry::new(),
            status_condition: Arc::new(StatusCondition::new()),
            enabled: AtomicBool::new(false),
            deleted: AtomicBool::new(false),
        })
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire) && !self.is_deleted()
    }

    pub(crate) fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub(crate) fn writer_count(&self) -> usize {
        self.writers.lock().len()
    }

    /// Whether `handle` names this publisher or one of its writers.
    pub(crate) fn contains(&self, handle: &InstanceHandle) -> bool {
        self.handle() == *handle || self.writers.lock().iter().any(|w| w.handle() == *handle)
    }

    pub(crate) fn handle(&self) -> InstanceHandle {
        self.guid.to_handle()
    }

    /// Emit `change` now, or hold it while a coherent set is open or
    /// publications are suspended.
    pub(crate) fn submit(&self, writer: &Arc<WriterInner>, change: Change) -> Result<()> {
        let mut gate = self.gate.lock();
        if gate.is_open() {
            writer.emit(change)
        } else {
            gate.held.push((Arc::clone(writer), change));
            Ok(())
        }
    }

    fn release_held(&self) {
        let mut gate = self.gate.lock();
        if !gate.is_open() {
            return;
        }
        let held = std::mem::take(&mut gate.held);
        if !held.is_empty() {
            log::debug!("[publisher] {} releasing {} held changes", self.guid, held.len());
        }
        for (writer, change) in held {
            if writer.is_deleted() {
                continue;
            }
            if let Err(e) = writer.emit(change) {
                log::warn!(
                    "[publisher] {} held change of {} dropped: {}",
                    self.guid,
                    writer.guid(),
                    e
                );
            }
        }
    }

    pub(crate) fn enable(&self) -> Result<()> {
        if self.is_deleted() {
            return Err(Error::AlreadyDeleted);
        }
        let participant = self.participant.upgrade().ok_or(Error::AlreadyDeleted)?;
        if !participant.is_enabled() {
            return Err(Error::PreconditionNotMet(
                "the participant is not enabled".into(),
            ));
        }
        if self.enabled.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if self.qos.read().entity_factory.autoenable_created_entities {
            let writers = self.writers.lock().clone();
            for writer in writers {
                writer.enable()?;
            }
        }
        Ok(())
    }

    /// Unregister the writer's live instances, then withdraw it.
    fn retire_writer(&self, writer: &Arc<WriterInner>) {
        self.gate
            .lock()
            .held
            .retain(|(held, _)| !Arc::ptr_eq(held, writer));

        if writer.is_enabled() {
            let kind = if writer
                .qos
                .read()
                .writer_data_lifecycle
                .autodispose_unregistered_instances
            {
                ChangeKind::DisposedUnregistered
            } else {
                ChangeKind::Unregistered
            };
            let now = Time::now();
            for (key, payload) in writer.registered_instances() {
                let change = Change {
                    key,
                    kind,
                    payload,
                    timestamp: now,
                };
                if let Err(e) = writer.emit(change) {
                    log::debug!(
                        "[writer] {} unregister on delete failed: {}",
                        writer.guid(),
                        e
                    );
                }
            }
        }
        if let Some(participant) = self.participant.upgrade() {
            participant.unregister_writer(writer);
        }
        writer.mark_deleted();
    }

    /// Delete every writer, then the publisher itself.
    pub(crate) fn mark_deleted(&self) {
        let writers = std::mem::take(&mut *self.writers.lock());
        for writer in &writers {
            self.retire_writer(writer);
        }
        if self.deleted.swap(true, Ordering::AcqRel) {
            return;
        }
        self.enabled.store(false, Ordering::Release);
        self.gate.lock().held.clear();
        self.listener.set(None, StatusMask::NONE);
        self.callbacks.clear();
        self.status_condition.mark_deleted();
        log::debug!("[publisher] {} deleted", self.guid);
    }
}

/// DDS Publisher - intermediate entity between DomainParticipant and
/// DataWriter.
///
/// # Example
///
/// ```ignore
/// let publisher = participant.create_publisher(QoS::default())?;
/// let writer = publisher.create_datawriter(&topic, QoS::reliable())?;
///
/// publisher.begin_coherent_changes()?;
/// writer.write(&first)?;
/// writer.write(&second)?;
/// publisher.end_coherent_changes()?; // both released together
/// ```
#[derive(Clone)]
pub struct Publisher {
    pub(crate) inner: Arc<PublisherInner>,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("guid", &self.inner.guid)
            .finish()
    }
}

impl Publisher {
    pub(crate) fn from_inner(inner: Arc<PublisherInner>) -> Self {
        Self { inner }
    }

    fn check_alive(&self) -> Result<()> {
        if self.inner.is_deleted() {
            return Err(Error::AlreadyDeleted);
        }
        Ok(())
    }

    /// Create a DataWriter on `topic`.
    ///
    /// The writer starts enabled when this publisher is enabled and its
    /// EntityFactory policy autoenables created entities.
    ///
    /// # Errors
    ///
    /// - `PreconditionNotMet` if the topic belongs to another participant
    /// - `InconsistentPolicy` for contradicting QoS
    pub fn create_datawriter<T: DDS>(&self, topic: &Topic<T>, qos: QoS) -> Result<DataWriter<T>> {
        self.check_alive()?;
        if !Weak::ptr_eq(&topic.inner.participant, &self.inner.participant) {
            return Err(Error::PreconditionNotMet(
                "topic belongs to another participant".into(),
            ));
        }
        qos.validate()?;
        let participant = self
            .inner
            .participant
            .upgrade()
            .ok_or(Error::AlreadyDeleted)?;

        let writer = WriterInner::new(WriterConfig {
            guid: participant.allocate_guid(EntityKind::Writer),
            topic: Arc::clone(&topic.inner),
            qos,
            publisher: self.inner.me.clone(),
            participant: Arc::downgrade(&participant),
            domain: participant.domain(),
        });
        self.inner.writers.lock().push(Arc::clone(&writer));
        log::debug!(
            "[publisher] {} created writer {} on '{}'",
            self.inner.guid,
            writer.guid(),
            topic.get_name()
        );

        let autoenable = self.inner.qos.read().entity_factory.autoenable_created_entities;
        if self.inner.is_enabled() && autoenable {
            writer.enable()?;
        }
        Ok(DataWriter::from_inner(writer))
    }

    /// Create a writer with the publisher's default writer QoS.
    pub fn create_datawriter_with_default_qos<T: DDS>(
        &self,
        topic: &Topic<T>,
    ) -> Result<DataWriter<T>> {
        self.create_datawriter(topic, self.get_default_datawriter_qos())
    }

    /// Delete a writer created by this publisher. Its registered instances
    /// are unregistered first.
    ///
    /// # Errors
    ///
    /// `PreconditionNotMet` if the writer belongs to another publisher.
    pub fn delete_datawriter<T: DDS>(&self, writer: &DataWriter<T>) -> Result<()> {
        self.check_alive()?;
        let removed = {
            let mut writers = self.inner.writers.lock();
            let before = writers.len();
            writers.retain(|w| !Arc::ptr_eq(w, &writer.inner));
            writers.len() != before
        };
        if !removed {
            return Err(Error::PreconditionNotMet(
                "writer was not created by this publisher".into(),
            ));
        }
        self.inner.retire_writer(&writer.inner);
        Ok(())
    }

    /// First writer of this publisher on topic `topic_name` with type `T`.
    pub fn lookup_datawriter<T: DDS>(&self, topic_name: &str) -> Option<DataWriter<T>> {
        self.inner
            .writers
            .lock()
            .iter()
            .find(|w| w.topic.name == topic_name && w.topic.type_name == T::type_name())
            .map(|w| DataWriter::from_inner(Arc::clone(w)))
    }

    /// Delete every writer of this publisher.
    pub fn delete_contained_entities(&self) -> Result<()> {
        self.check_alive()?;
        let writers = std::mem::take(&mut *self.inner.writers.lock());
        for writer in &writers {
            self.inner.retire_writer(writer);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Coherent sets / suspension
    // ------------------------------------------------------------------

    /// Open a coherent set; sets nest.
    pub fn begin_coherent_changes(&self) -> Result<()> {
        self.check_alive()?;
        self.inner.gate.lock().coherent += 1;
        Ok(())
    }

    /// Close the innermost coherent set; the outermost releases the held
    /// changes.
    ///
    /// # Errors
    ///
    /// `PreconditionNotMet` without a matching `begin_coherent_changes`.
    pub fn end_coherent_changes(&self) -> Result<()> {
        self.check_alive()?;
        {
            let mut gate = self.inner.gate.lock();
            if gate.coherent == 0 {
                return Err(Error::PreconditionNotMet(
                    "no coherent set is open".into(),
                ));
            }
            gate.coherent -= 1;
        }
        self.inner.release_held();
        Ok(())
    }

    pub fn suspend_publications(&self) -> Result<()> {
        self.check_alive()?;
        self.inner.gate.lock().suspended = true;
        Ok(())
    }

    /// # Errors
    ///
    /// `PreconditionNotMet` when publications are not suspended.
    pub fn resume_publications(&self) -> Result<()> {
        self.check_alive()?;
        {
            let mut gate = self.inner.gate.lock();
            if !gate.suspended {
                return Err(Error::PreconditionNotMet(
                    "publications are not suspended".into(),
                ));
            }
            gate.suspended = false;
        }
        self.inner.release_held();
        Ok(())
    }

    /// Wait until every writer of this publisher is fully acknowledged.
    pub fn wait_for_acknowledgments(&self, timeout: Duration) -> Result<()> {
        self.check_alive()?;
        let deadline = std::time::Instant::now().checked_add(timeout);
        let writers = self.inner.writers.lock().clone();
        for writer in writers.iter().filter(|w| w.is_enabled()) {
            let left = deadline.map_or(timeout, |d| {
                d.saturating_duration_since(std::time::Instant::now())
            });
            writer.wait_for_acknowledgments(left)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // QoS
    // ------------------------------------------------------------------

    pub fn get_qos(&self) -> QoS {
        self.inner.qos.read().clone()
    }

    /// Replace the publisher QoS; contained writers are re-matched with the
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
                let writers = self.inner.writers.lock().clone();
                for writer in writers.iter().filter(|w| w.is_enabled()) {
                    participant.reevaluate_writer(writer);
                }
            }
        }
        Ok(())
    }

    pub fn get_default_datawriter_qos(&self) -> QoS {
        self.inner.default_writer_qos.read().clone()
    }

    /// # Errors
    ///
    /// `InconsistentPolicy` for contradicting QoS.
    pub fn set_default_datawriter_qos(&self, qos: QoS) -> Result<()> {
        qos.validate()?;
        *self.inner.default_writer_qos.write() = qos;
        Ok(())
    }

    /// Start from the default writer QoS and apply the topic's QoS.
    pub fn copy_from_topic_qos<T: DDS>(&self, topic: &Topic<T>) -> QoS {
        let mut qos = self.get_default_datawriter_qos();
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

    /// Install (or clear) the publisher listener. It receives the writer
    /// statuses their own listener does not handle.
    pub fn set_listener(
        &self,
        listener: Option<Arc<dyn PublisherListener>>,
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

impl HasStatusCondition for Publisher {
    fn get_status_condition(&self) -> Arc<StatusCondition> {
        Arc::clone(&self.inner.status_condition)
    }
}
