// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer runtime shared by every `DataWriter<T>` handle.
//!
//! ```text
//! write() -> Publisher gate (coherent set / suspended) -> WriterEngine
//!         -> DATA + HEARTBEAT envelopes -> domain bus
//! ```
//!
//! The runtime is type-erased: samples arrive already serialized together
//! with their key hash, so the participant can hold every writer in one map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::core::discovery::EndpointAnnouncement;
use crate::core::domain::{Domain, Envelope, Message};
use crate::core::guid::GUID;
use crate::dds::condition::{StatusCondition, StatusMask};
use crate::dds::listener::{
    deliver_to_participant, deliver_writer_event_to_publisher, CallbackRegistry, ListenerSlot,
    StatusEvent,
};
use crate::dds::participant::ParticipantInner;
use crate::dds::publisher::PublisherInner;
use crate::dds::status::{StatusKind, WriterStatuses};
use crate::dds::topic::TopicInner;
use crate::dds::{Error, InstanceHandle, Result, Time};
use crate::qos::{LivelinessKind, QoS, QosPolicyId};
use crate::reliability::{AckNackMsg, ChangeKind, LivelinessMsg, WriterEngine};

/// Type-erased writer listener: the typed `DataWriterListener<T>` wrapped by
/// `DataWriter::set_listener`.
pub(crate) type WriterListenerFn = dyn Fn(&StatusEvent) + Send + Sync;

/// One serialized change waiting to enter the writer history.
#[derive(Clone)]
pub(crate) struct Change {
    pub(crate) key: [u8; 16],
    pub(crate) kind: ChangeKind,
    pub(crate) payload: Arc<[u8]>,
    pub(crate) timestamp: Time,
}

struct WriterState {
    engine: WriterEngine,
    /// Last write per alive instance, for the offered deadline.
    deadlines: HashMap<[u8; 16], Instant>,
    last_asserted: Instant,
    liveliness_lost: bool,
}

pub(crate) struct WriterInner {
    me: Weak<WriterInner>,
    guid: GUID,
    pub(crate) topic: Arc<TopicInner>,
    pub(crate) qos: RwLock<QoS>,
    pub(crate) publisher: Weak<PublisherInner>,
    pub(crate) participant: Weak<ParticipantInner>,
    domain: Arc<Domain>,
    state: Mutex<WriterState>,
    acked: Condvar,
    statuses: Mutex<WriterStatuses>,
    matched: Condvar,
    pending: Mutex<Vec<StatusEvent>>,
    pub(crate) listener: ListenerSlot<WriterListenerFn>,
    pub(crate) callbacks: CallbackRegistry,
    pub(crate) status_condition: Arc<StatusCondition>,
    enabled: AtomicBool,
    deleted: AtomicBool,
}

pub(crate) struct WriterConfig {
    pub(crate) guid: GUID,
    pub(crate) topic: Arc<TopicInner>,
    pub(crate) qos: QoS,
    pub(crate) publisher: Weak<PublisherInner>,
    pub(crate) participant: Weak<ParticipantInner>,
    pub(crate) domain: Arc<Domain>,
}

impl WriterInner {
    pub(crate) fn new(config: WriterConfig) -> Arc<Self> {
        config.topic.acquire();
        let engine = WriterEngine::new(config.guid, &config.qos);
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            guid: config.guid,
            topic: config.topic,
            qos: RwLock::new(config.qos),
            publisher: config.publisher,
            participant: config.participant,
            domain: config.domain,
            state: Mutex::new(WriterState {
                engine,
                deadlines: HashMap::new(),
                last_asserted: Instant::now(),
                liveliness_lost: false,
            }),
            acked: Condvar::new(),
            statuses: Mutex::new(WriterStatuses::default()),
            matched: Condvar::new(),
            pending: Mutex::new(Vec::new()),
            listener: ListenerSlot::new(),
            callbacks: CallbackRegistry::new(),
            status_condition: Arc::new(StatusCondition::new()),
            enabled: AtomicBool::new(false),
            deleted: AtomicBool::new(false),
        })
    }

    pub(crate) fn guid(&self) -> GUID {
        self.guid
    }

    pub(crate) fn handle(&self) -> InstanceHandle {
        self.guid.to_handle()
    }

    pub(crate) fn me(&self) -> Option<Arc<WriterInner>> {
        self.me.upgrade()
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire) && !self.is_deleted()
    }

    pub(crate) fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub(crate) fn check_usable(&self) -> Result<()> {
        if self.is_deleted() {
            return Err(Error::AlreadyDeleted);
        }
        if !self.enabled.load(Ordering::Acquire) {
            return Err(Error::NotEnabled);
        }
        Ok(())
    }

    /// Publication as announced: writer QoS merged with the publisher's group
    /// policies and the topic data.
    pub(crate) fn announcement(&self) -> EndpointAnnouncement {
        let mut qos = self.qos.read().clone();
        if let Some(publisher) = self.publisher.upgrade() {
            let group = publisher.qos.read();
            qos.partition = group.partition.clone();
            qos.presentation = group.presentation;
            qos.group_data = group.group_data.clone();
        }
        qos.topic_data = self.topic.qos.read().topic_data.clone();
        EndpointAnnouncement {
            guid: self.guid,
            topic_name: self.topic.name.clone(),
            type_name: self.topic.type_name.clone(),
            qos,
        }
    }

    pub(crate) fn enable(&self) -> Result<()> {
        if self.is_deleted() {
            return Err(Error::AlreadyDeleted);
        }
        if self.enabled.load(Ordering::Acquire) {
            return Ok(());
        }
        let publisher = self.publisher.upgrade().ok_or(Error::AlreadyDeleted)?;
        if !publisher.is_enabled() {
            return Err(Error::PreconditionNotMet(
                "the publisher is not enabled".into(),
            ));
        }
        let participant = self.participant.upgrade().ok_or(Error::AlreadyDeleted)?;
        let me = self.me().ok_or(Error::AlreadyDeleted)?;
        {
            let mut state = self.state.lock();
            state.last_asserted = Instant::now();
        }
        self.enabled.store(true, Ordering::Release);
        participant.register_writer(me);
        Ok(())
    }

    pub(crate) fn set_qos(&self, qos: QoS) -> Result<()> {
        if self.is_deleted() {
            return Err(Error::AlreadyDeleted);
        }
        let enabled = self.enabled.load(Ordering::Acquire);
        let rebuild = {
            let mut current = self.qos.write();
            current.check_update(&qos, enabled)?;
            *current = qos;
            (!enabled).then(|| current.clone())
        };
        if let Some(qos) = rebuild {
            self.state.lock().engine = WriterEngine::new(self.guid, &qos);
        } else if let (Some(participant), Some(me)) = (self.participant.upgrade(), self.me()) {
            participant.reevaluate_writer(&me);
        }
        Ok(())
    }

    fn liveliness(&self) -> (LivelinessKind, Option<Duration>) {
        let liveliness = self.qos.read().liveliness;
        let lease = (!liveliness.is_infinite()).then_some(liveliness.lease_duration);
        (liveliness.kind, lease)
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Block while a reliable KEEP_ALL history has no room for `key`.
    ///
    /// # Errors
    ///
    /// `OutOfResources` once `max_blocking_time` elapsed.
    pub(crate) fn wait_for_room(&self, key: &[u8; 16]) -> Result<()> {
        let (keep_all, reliable, max_blocking) = {
            let qos = self.qos.read();
            (
                qos.history.depth().is_none(),
                qos.reliability.is_reliable(),
                qos.max_blocking_time,
            )
        };
        if !keep_all || !reliable {
            return Ok(());
        }
        let deadline = Instant::now().checked_add(max_blocking);
        let mut state = self.state.lock();
        loop {
            let purgeable = state.engine.acked_by_all();
            let history = state.engine.history_mut();
            if history.is_full_for(key) {
                history.purge_acked(purgeable);
            }
            if !state.engine.history().is_full_for(key) {
                return Ok(());
            }
            if self.is_deleted() {
                return Err(Error::AlreadyDeleted);
            }
            let timed_out = match deadline {
                Some(deadline) => self.acked.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.acked.wait(&mut state);
                    false
                }
            };
            if timed_out && state.engine.history().is_full_for(key) {
                log::debug!(
                    "[writer] {} history full after {:?}, write rejected",
                    self.guid,
                    max_blocking
                );
                return Err(Error::OutOfResources);
            }
        }
    }

    /// Route a change through the publisher gate.
    pub(crate) fn submit(&self, change: Change) -> Result<()> {
        self.check_usable()?;
        self.wait_for_room(&change.key)?;
        match (self.publisher.upgrade(), self.me()) {
            (Some(publisher), Some(me)) => publisher.submit(&me, change),
            _ => Err(Error::AlreadyDeleted),
        }
    }

    /// Put a change into the history and on the bus.
    pub(crate) fn emit(&self, change: Change) -> Result<()> {
        let now = Instant::now();
        let envelopes = {
            let mut state = self.state.lock();
            let (outcome, envelopes) = state.engine.write(
                change.key,
                change.kind,
                change.payload,
                change.timestamp,
            )?;
            if change.kind == ChangeKind::Alive {
                state.deadlines.insert(change.key, now);
            } else {
                state.deadlines.remove(&change.key);
            }
            if change.kind.is_unregister() {
                state.engine.history_mut().unregister(&change.key);
            }
            state.last_asserted = now;
            state.liveliness_lost = false;
            log::trace!(
                "[writer] {} seq={} {:?} ({} evicted)",
                self.guid,
                outcome.seq,
                change.kind,
                outcome.evicted.len()
            );
            envelopes
        };
        self.domain.send_all(envelopes);

        if self.liveliness().0 == LivelinessKind::ManualByParticipant {
            if let Some(participant) = self.participant.upgrade() {
                participant.assert_liveliness_except(self.guid);
            }
        }
        Ok(())
    }

    pub(crate) fn register(&self, key: [u8; 16], payload: Arc<[u8]>) -> Result<()> {
        self.check_usable()?;
        let mut state = self.state.lock();
        state.engine.history_mut().register(key, payload)?;
        state.deadlines.entry(key).or_insert_with(Instant::now);
        Ok(())
    }

    pub(crate) fn is_registered(&self, key: &[u8; 16]) -> bool {
        self.state
            .lock()
            .engine
            .history()
            .instance(key)
            .is_some_and(|record| record.registered)
    }

    pub(crate) fn lookup_instance(&self, key: &[u8; 16]) -> InstanceHandle {
        if self.state.lock().engine.history().instance(key).is_some() {
            InstanceHandle::from_key(key)
        } else {
            InstanceHandle::NIL
        }
    }

    /// Serialized sample an instance was registered (or first written) with.
    pub(crate) fn key_payload(&self, handle: &InstanceHandle) -> Option<Arc<[u8]>> {
        let state = self.state.lock();
        let history = state.engine.history();
        let payload = history
            .instance_keys()
            .find(|key| InstanceHandle::from_key(key) == *handle)
            .and_then(|key| history.instance(key))
            .map(|record| Arc::clone(&record.key_payload));
        payload
    }

    /// Keys of every registered instance, with their key payload.
    pub(crate) fn registered_instances(&self) -> Vec<([u8; 16], Arc<[u8]>)> {
        let state = self.state.lock();
        let history = state.engine.history();
        history
            .instance_keys()
            .filter_map(|key| {
                history
                    .instance(key)
                    .filter(|record| record.registered)
                    .map(|record| (*key, Arc::clone(&record.key_payload)))
            })
            .collect()
    }

    pub(crate) fn wait_for_acknowledgments(&self, timeout: Duration) -> Result<()> {
        self.check_usable()?;
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        while !state.engine.all_acked() {
            if self.is_deleted() {
                return Err(Error::AlreadyDeleted);
            }
            match deadline {
                Some(deadline) => {
                    if self.acked.wait_until(&mut state, deadline).timed_out()
                        && !state.engine.all_acked()
                    {
                        return Err(Error::Timeout);
                    }
                }
                None => self.acked.wait(&mut state),
            }
        }
        Ok(())
    }

    pub(crate) fn wait_for_subscriptions(&self, count: u32, timeout: Duration) -> Result<()> {
        self.check_usable()?;
        let deadline = Instant::now().checked_add(timeout);
        let mut statuses = self.statuses.lock();
        while statuses.publication_matched.current_count < count {
            if self.is_deleted() {
                return Err(Error::AlreadyDeleted);
            }
            match deadline {
                Some(deadline) => {
                    if self.matched.wait_until(&mut statuses, deadline).timed_out()
                        && statuses.publication_matched.current_count < count
                    {
                        return Err(Error::Timeout);
                    }
                }
                None => self.matched.wait(&mut statuses),
            }
        }
        Ok(())
    }

    pub(crate) fn matched_readers(&self) -> Vec<GUID> {
        self.state.lock().engine.matched_readers()
    }

    pub(crate) fn is_matched_with(&self, reader: &GUID) -> bool {
        self.state.lock().engine.has_reader(reader)
    }

    // ------------------------------------------------------------------
    // Liveliness
    // ------------------------------------------------------------------

    /// Assert liveliness: readers are told through a LIVELINESS message.
    pub(crate) fn assert_liveliness(&self) -> Result<()> {
        self.check_usable()?;
        self.mark_asserted();
        Ok(())
    }

    fn mark_asserted(&self) {
        {
            let mut state = self.state.lock();
            state.last_asserted = Instant::now();
            state.liveliness_lost = false;
        }
        self.domain.send(Envelope::broadcast(
            self.guid.prefix,
            Message::Liveliness(LivelinessMsg { writer: self.guid }),
        ));
    }

    /// Participant-level assertion; reaches Automatic and
    /// ManualByParticipant writers.
    pub(crate) fn assert_from_participant(&self) {
        if !self.is_enabled() {
            return;
        }
        if self.liveliness().0 != LivelinessKind::ManualByTopic {
            self.mark_asserted();
        }
    }

    // ------------------------------------------------------------------
    // Discovery hooks (queue only; the participant flushes)
    // ------------------------------------------------------------------

    pub(crate) fn on_reader_matched(&self, reader: &EndpointAnnouncement) -> Vec<Envelope> {
        let envelopes = {
            let mut state = self.state.lock();
            state.engine.add_reader(
                reader.guid,
                reader.qos.reliability.is_reliable(),
                reader.qos.durability.keeps_history(),
            )
        };
        let status = {
            let mut statuses = self.statuses.lock();
            statuses
                .publication_matched
                .matched(reader.guid.to_handle());
            self.matched.notify_all();
            statuses.publication_matched.clone()
        };
        log::debug!(
            "[writer] {} matched reader {} on '{}'",
            self.guid,
            reader.guid,
            reader.topic_name
        );
        self.pending.lock().push(StatusEvent::PublicationMatched(status));
        envelopes
    }

    pub(crate) fn on_reader_unmatched(&self, reader: GUID) {
        let removed = {
            let mut state = self.state.lock();
            let removed = state.engine.remove_reader(&reader);
            self.acked.notify_all();
            removed
        };
        if !removed {
            return;
        }
        let status = {
            let mut statuses = self.statuses.lock();
            statuses.publication_matched.unmatched(reader.to_handle());
            self.matched.notify_all();
            statuses.publication_matched.clone()
        };
        log::debug!("[writer] {} unmatched reader {}", self.guid, reader);
        self.pending.lock().push(StatusEvent::PublicationMatched(status));
    }

    pub(crate) fn on_offered_incompatible(&self, policies: &[QosPolicyId]) {
        let status = {
            let mut statuses = self.statuses.lock();
            statuses.offered_incompatible_qos.record(policies);
            statuses.offered_incompatible_qos.clone()
        };
        log::info!(
            "[match-qos] writer {} incompatible: {:?}",
            self.guid,
            policies
        );
        self.pending
            .lock()
            .push(StatusEvent::OfferedIncompatibleQos(status));
    }

    pub(crate) fn flush(&self) {
        let events = std::mem::take(&mut *self.pending.lock());
        for event in events {
            self.dispatch(event);
        }
    }

    // ------------------------------------------------------------------
    // Event thread
    // ------------------------------------------------------------------

    pub(crate) fn on_acknack(&self, ack: &AckNackMsg) {
        let envelopes = {
            let mut state = self.state.lock();
            let envelopes = state.engine.on_acknack(ack);
            self.acked.notify_all();
            envelopes
        };
        self.domain.send_all(envelopes);
    }

    pub(crate) fn tick(&self, now: Instant, heartbeat_period: Duration) {
        if !self.is_enabled() {
            return;
        }
        let (kind, lease) = self.liveliness();
        let deadline = {
            let qos = self.qos.read();
            (!qos.deadline.is_infinite()).then_some(qos.deadline.period)
        };

        let mut events = Vec::new();
        let mut assert_automatic = false;
        let envelopes = {
            let mut state = self.state.lock();
            let envelopes = state.engine.heartbeat_due(now, heartbeat_period);

            let mut missed = Vec::new();
            if let Some(period) = deadline {
                for (key, last) in state.deadlines.iter_mut() {
                    if now.saturating_duration_since(*last) >= period {
                        *last = now;
                        missed.push(InstanceHandle::from_key(key));
                    }
                }
            }

            let mut lost = false;
            if let Some(lease) = lease {
                let since = now.saturating_duration_since(state.last_asserted);
                match kind {
                    LivelinessKind::Automatic => assert_automatic = since >= lease / 3,
                    _ => {
                        if since > lease && !state.liveliness_lost {
                            state.liveliness_lost = true;
                            lost = true;
                        }
                    }
                }
            }

            let mut statuses = self.statuses.lock();
            for handle in missed {
                let status = &mut statuses.offered_deadline_missed;
                status.increment();
                status.last_instance_handle = handle;
                events.push(StatusEvent::OfferedDeadlineMissed(status.clone()));
                log::debug!("[writer] {} deadline missed on {:?}", self.guid, handle);
            }
            if lost {
                statuses.liveliness_lost.increment();
                events.push(StatusEvent::LivelinessLost(
                    statuses.liveliness_lost.clone(),
                ));
                log::debug!("[writer] {} lost liveliness", self.guid);
            }
            envelopes
        };
        self.domain.send_all(envelopes);
        if assert_automatic {
            self.mark_asserted();
        }
        for event in events {
            self.dispatch(event);
        }
    }

    // ------------------------------------------------------------------
    // Status dispatch
    // ------------------------------------------------------------------

    pub(crate) fn take_status<S>(
        &self,
        kind: StatusKind,
        get: impl FnOnce(&WriterStatuses) -> S,
    ) -> S {
        let mut statuses = self.statuses.lock();
        let snapshot = get(&statuses);
        statuses.reset(kind);
        self.status_condition.deactivate(kind.mask());
        snapshot
    }

    fn dispatch(&self, event: StatusEvent) {
        let kind = event.kind();
        let publisher = self.publisher.upgrade();
        let participant = self.participant.upgrade();

        let mut handled = false;
        if let Some(listener) = self.listener.for_kind(kind) {
            listener(&event);
            handled = true;
        } else if let Some(listener) = publisher.as_ref().and_then(|p| p.listener.for_kind(kind)) {
            deliver_writer_event_to_publisher(listener.as_ref(), self.handle(), &event);
            handled = true;
        } else if let Some(listener) = participant
            .as_ref()
            .and_then(|p| p.listener.for_kind(kind))
        {
            deliver_to_participant(listener.as_ref(), self.handle(), &event);
            handled = true;
        }
        if handled {
            self.statuses.lock().reset(kind);
            self.status_condition.deactivate(kind.mask());
        } else {
            self.status_condition.activate(kind.mask());
        }
        self.callbacks.dispatch(&event);
        if let Some(participant) = participant {
            participant.callbacks.dispatch(&event);
        }
    }

    pub(crate) fn mark_deleted(&self) {
        if self.deleted.swap(true, Ordering::AcqRel) {
            return;
        }
        self.enabled.store(false, Ordering::Release);
        self.topic.release();
        self.listener.set(None, StatusMask::NONE);
        self.callbacks.clear();
        {
            let _state = self.state.lock();
            self.acked.notify_all();
        }
        {
            let _statuses = self.statuses.lock();
            self.matched.notify_all();
        }
        self.status_condition.mark_deleted();
        log::debug!("[writer] {} deleted", self.guid);
    }
}
