// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reader runtime: matched-writer proxies, the receive pipeline and status
//! dispatch.
//!
//! ```text
//! DATA -> WriterProxy (order/gaps) -> decode -> filter -> ownership
//!      -> destination order -> ReaderHistory (limits) -> DataAvailable
//! ```
//!
//! Handlers invoked by discovery only queue their status events; the
//! participant calls [`ReaderEndpoint::flush`] once its discovery lock is
//! released. Data-path handlers flush on their own.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

use super::decoder::SampleDecoder;
use super::history::{InstanceSelector, ReaderHistory, Sample, StoreOutcome};
use super::DataReader;
use crate::core::discovery::EndpointAnnouncement;
use crate::core::domain::{Domain, Envelope, Message};
use crate::core::guid::{GuidPrefix, GUID};
use crate::dds::condition::{StatusCondition, StatusMask};
use crate::dds::content_filtered_topic::ContentFilteredTopicInner;
use crate::dds::listener::{
    deliver_reader_event_to_subscriber, deliver_to_participant, deliver_to_reader,
    CallbackRegistry, DataReaderListener, ListenerSlot, StatusEvent,
};
use crate::dds::multi_topic::MultiTopicInner;
use crate::dds::participant::ParticipantInner;
use crate::dds::read_condition::{ReadConditionState, SampleQuery, SampleSource, StateMasks};
use crate::dds::status::{ReaderStatuses, StatusKind};
use crate::dds::subscriber::{Subscriber, SubscriberInner};
use crate::dds::topic::{TopicDescription, TopicDescriptionKind, TopicInner};
use crate::dds::{Error, InstanceHandle, Result, Time, DDS};
use crate::qos::{QoS, QosPolicyId};
use crate::reliability::{ChangeKind, DataMsg, GapMsg, HeartbeatMsg, WriterProxy};

/// Object-safe view of a reader used by the participant and subscriber.
pub(crate) trait ReaderEndpoint: Send + Sync {
    fn guid(&self) -> GUID;

    fn handle(&self) -> InstanceHandle {
        self.guid().to_handle()
    }

    fn topic_name(&self) -> String;

    fn is_enabled(&self) -> bool;

    /// Enable a reader created disabled.
    fn enable_endpoint(&self) -> Result<()>;

    /// Announcement of every component (one per subscribed topic).
    fn announcements(&self) -> Vec<EndpointAnnouncement>;

    fn has_matching(&self, masks: &StateMasks) -> bool;

    /// Invoke `on_data_available` if the reader holds unread samples.
    fn notify_data_available(&self);

    fn on_writer_matched(&self, local: GUID, writer: &EndpointAnnouncement);

    fn on_writer_updated(&self, writer: &EndpointAnnouncement);

    fn on_writer_unmatched(&self, local: GUID, writer: GUID);

    fn on_requested_incompatible(&self, policies: &[QosPolicyId]);

    fn on_participant_lost(&self, prefix: &GuidPrefix);

    fn on_participant_revived(&self, prefix: &GuidPrefix);

    /// Deliver queued status events.
    fn flush(&self);

    fn on_data(&self, msg: DataMsg);

    fn on_heartbeat(&self, hb: &HeartbeatMsg);

    fn on_gap(&self, gap: &GapMsg);

    fn on_liveliness(&self, writer: GUID);

    fn tick(&self, now: Instant);

    fn mark_deleted(&self);

    fn as_any(&self) -> &dyn Any;
}

/// Topic description a reader was created on.
pub(crate) enum ReaderSource {
    Topic(Arc<TopicInner>),
    Filtered(Arc<ContentFilteredTopicInner>),
    Multi(Arc<MultiTopicInner>),
    Builtin {
        name: &'static str,
        type_name: &'static str,
    },
}

impl ReaderSource {
    fn acquire(&self) {
        match self {
            ReaderSource::Topic(topic) => topic.acquire(),
            ReaderSource::Filtered(cft) => cft.acquire(),
            ReaderSource::Multi(multi) => multi.acquire(),
            ReaderSource::Builtin { .. } => {}
        }
    }

    fn release(&self) {
        match self {
            ReaderSource::Topic(topic) => topic.release(),
            ReaderSource::Filtered(cft) => cft.release(),
            ReaderSource::Multi(multi) => multi.release(),
            ReaderSource::Builtin { .. } => {}
        }
    }

    pub(crate) fn description(&self) -> TopicDescription {
        match self {
            ReaderSource::Topic(topic) => topic.description(),
            ReaderSource::Filtered(cft) => TopicDescription {
                name: cft.name.clone(),
                type_name: cft.related.type_name.clone(),
                kind: TopicDescriptionKind::ContentFilteredTopic,
            },
            ReaderSource::Multi(multi) => TopicDescription {
                name: multi.name.clone(),
                type_name: multi.type_name.clone(),
                kind: TopicDescriptionKind::MultiTopic,
            },
            ReaderSource::Builtin { name, type_name } => TopicDescription {
                name: (*name).to_string(),
                type_name: (*type_name).to_string(),
                kind: TopicDescriptionKind::Topic,
            },
        }
    }
}

/// One subscription announced on the bus: the reader itself, or one leg of
/// a MultiTopic reader.
pub(crate) struct Component {
    pub(crate) guid: GUID,
    pub(crate) topic: Arc<TopicInner>,
}

struct MatchedWriter {
    proxy: WriterProxy,
    component: usize,
    strength: i32,
    /// `None` for an infinite lease.
    lease: Option<Duration>,
    last_seen: Instant,
    alive: bool,
    /// The writer's participant missed its lease.
    participant_lost: bool,
}

impl MatchedWriter {
    fn lease_of(ann: &EndpointAnnouncement) -> Option<Duration> {
        let liveliness = &ann.qos.liveliness;
        if liveliness.is_infinite() {
            None
        } else {
            Some(liveliness.lease_duration)
        }
    }
}

struct ReaderState<T> {
    history: ReaderHistory<T>,
    writers: BTreeMap<GUID, MatchedWriter>,
}

#[derive(Default)]
struct Pending {
    events: Vec<StatusEvent>,
    data_available: bool,
}

impl Pending {
    fn merge(&mut self, other: Pending) {
        self.events.extend(other.events);
        self.data_available |= other.data_available;
    }

    fn is_empty(&self) -> bool {
        self.events.is_empty() && !self.data_available
    }
}

pub(crate) struct ReaderInner<T: DDS> {
    me: Weak<ReaderInner<T>>,
    guid: GUID,
    components: Vec<Component>,
    pub(crate) source: ReaderSource,
    decoder: Box<dyn SampleDecoder<T>>,
    pub(crate) qos: RwLock<QoS>,
    pub(crate) subscriber: Weak<SubscriberInner>,
    pub(crate) participant: Weak<ParticipantInner>,
    domain: Arc<Domain>,
    state: Mutex<ReaderState<T>>,
    caught_up: Condvar,
    statuses: Mutex<ReaderStatuses>,
    matched: Condvar,
    pending: Mutex<Pending>,
    pub(crate) listener: ListenerSlot<dyn DataReaderListener<T>>,
    pub(crate) callbacks: CallbackRegistry,
    pub(crate) status_condition: Arc<StatusCondition>,
    conditions: Mutex<Vec<Arc<ReadConditionState>>>,
    enabled: AtomicBool,
    deleted: AtomicBool,
}

pub(crate) struct ReaderConfig<T: DDS> {
    pub(crate) guid: GUID,
    pub(crate) components: Vec<Component>,
    pub(crate) source: ReaderSource,
    pub(crate) decoder: Box<dyn SampleDecoder<T>>,
    pub(crate) qos: QoS,
    pub(crate) subscriber: Weak<SubscriberInner>,
    pub(crate) participant: Weak<ParticipantInner>,
    pub(crate) domain: Arc<Domain>,
    pub(crate) enabled: bool,
}

impl<T: DDS> ReaderInner<T> {
    pub(crate) fn new(config: ReaderConfig<T>) -> Arc<Self> {
        config.source.acquire();
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            guid: config.guid,
            components: config.components,
            source: config.source,
            decoder: config.decoder,
            state: Mutex::new(ReaderState {
                history: ReaderHistory::new(config.qos.history, config.qos.resource_limits),
                writers: BTreeMap::new(),
            }),
            qos: RwLock::new(config.qos),
            subscriber: config.subscriber,
            participant: config.participant,
            domain: config.domain,
            caught_up: Condvar::new(),
            statuses: Mutex::new(ReaderStatuses::default()),
            matched: Condvar::new(),
            pending: Mutex::new(Pending::default()),
            listener: ListenerSlot::new(),
            callbacks: CallbackRegistry::new(),
            status_condition: Arc::new(StatusCondition::new()),
            conditions: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(config.enabled),
            deleted: AtomicBool::new(false),
        })
    }

    pub(crate) fn handle(&self) -> InstanceHandle {
        self.guid.to_handle()
    }

    pub(crate) fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// Deleted -> AlreadyDeleted, disabled -> NotEnabled.
    pub(crate) fn check_usable(&self) -> Result<()> {
        if self.is_deleted() {
            return Err(Error::AlreadyDeleted);
        }
        if !self.enabled.load(Ordering::Acquire) {
            return Err(Error::NotEnabled);
        }
        Ok(())
    }

    pub(crate) fn arc(&self) -> Option<Arc<Self>> {
        self.me.upgrade()
    }

    pub(crate) fn as_endpoint(&self) -> Option<Arc<dyn ReaderEndpoint>> {
        self.me
            .upgrade()
            .map(|me| me as Arc<dyn ReaderEndpoint>)
    }

    pub(crate) fn source_weak(&self) -> Weak<dyn SampleSource> {
        let weak: Weak<dyn SampleSource> = self.me.clone();
        weak
    }

    pub(crate) fn enable(&self) -> Result<()> {
        if self.is_deleted() {
            return Err(Error::AlreadyDeleted);
        }
        if self.enabled.load(Ordering::Acquire) {
            return Ok(());
        }
        let subscriber = self.subscriber.upgrade().ok_or(Error::AlreadyDeleted)?;
        if !subscriber.is_enabled() {
            return Err(Error::PreconditionNotMet(
                "the subscriber is not enabled".into(),
            ));
        }
        let participant = self.participant.upgrade().ok_or(Error::AlreadyDeleted)?;
        let endpoint = self.as_endpoint().ok_or(Error::AlreadyDeleted)?;
        self.enabled.store(true, Ordering::Release);
        participant.register_reader(endpoint);
        Ok(())
    }

    pub(crate) fn set_qos(&self, qos: QoS) -> Result<()> {
        if self.is_deleted() {
            return Err(Error::AlreadyDeleted);
        }
        let enabled = self.enabled.load(Ordering::Acquire);
        let (history, limits) = (qos.history, qos.resource_limits);
        {
            let mut current = self.qos.write();
            current.check_update(&qos, enabled)?;
            *current = qos;
        }
        if !enabled {
            self.state.lock().history = ReaderHistory::new(history, limits);
        }
        if enabled {
            if let (Some(participant), Some(endpoint)) =
                (self.participant.upgrade(), self.as_endpoint())
            {
                participant.reevaluate_reader(&endpoint);
            }
        }
        Ok(())
    }

    fn deadline_period(&self) -> Option<Duration> {
        let qos = self.qos.read();
        if qos.deadline.is_infinite() {
            None
        } else {
            Some(qos.deadline.period)
        }
    }

    fn prefix(&self) -> GuidPrefix {
        self.guid.prefix
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    pub(crate) fn collect(
        &self,
        max: usize,
        masks: &StateMasks,
        selector: InstanceSelector,
        query: Option<&SampleQuery>,
        take: bool,
    ) -> Result<Vec<Sample<T>>> {
        self.check_usable()?;
        if max == 0 {
            return Err(Error::BadParameter("max_samples must be positive".into()));
        }
        let samples = {
            let mut state = self.state.lock();
            if let InstanceSelector::Instance(handle) = selector {
                if !state.history.contains(&handle) {
                    return Err(Error::NoData);
                }
            }
            state.history.collect(max, masks, selector, query, take)
        };
        if samples.is_empty() {
            return Err(Error::NoData);
        }
        self.status_condition.deactivate(StatusMask::DATA_AVAILABLE);
        if let Some(subscriber) = self.subscriber.upgrade() {
            subscriber
                .status_condition
                .deactivate(StatusMask::DATA_ON_READERS);
        }
        log::trace!(
            "[reader] {} {} {} samples",
            self.guid,
            if take { "took" } else { "read" },
            samples.len()
        );
        Ok(samples)
    }

    pub(crate) fn lookup_instance(&self, key: [u8; 16]) -> InstanceHandle {
        let handle = InstanceHandle::from_key(&key);
        if self.state.lock().history.contains(&handle) {
            handle
        } else {
            InstanceHandle::NIL
        }
    }

    pub(crate) fn key_value(&self, handle: &InstanceHandle) -> Option<T> {
        self.state.lock().history.key_value(handle)
    }

    pub(crate) fn instance_handles(&self) -> Vec<InstanceHandle> {
        self.state.lock().history.handles()
    }

    pub(crate) fn add_condition(&self, state: Arc<ReadConditionState>) {
        self.conditions.lock().push(state);
    }

    /// Returns `false` when the condition does not belong to this reader.
    pub(crate) fn remove_condition(&self, id: u64) -> bool {
        let mut conditions = self.conditions.lock();
        let before = conditions.len();
        conditions.retain(|c| c.id() != id);
        conditions.len() != before
    }

    pub(crate) fn condition_count(&self) -> usize {
        self.conditions.lock().len()
    }

    pub(crate) fn clear_conditions(&self) {
        self.conditions.lock().clear();
    }

    fn notify_conditions(&self) {
        let conditions: Vec<Arc<ReadConditionState>> = self.conditions.lock().clone();
        for condition in conditions {
            condition.notify();
        }
    }

    // ------------------------------------------------------------------
    // Statuses
    // ------------------------------------------------------------------

    /// Snapshot a status, reset its change counters and clear its bit.
    pub(crate) fn take_status<S>(&self, kind: StatusKind, get: impl FnOnce(&ReaderStatuses) -> S) -> S {
        let mut statuses = self.statuses.lock();
        let snapshot = get(&statuses);
        statuses.reset(kind);
        self.status_condition.deactivate(kind.mask());
        snapshot
    }

    pub(crate) fn matched_writers(&self) -> Vec<InstanceHandle> {
        self.state
            .lock()
            .writers
            .keys()
            .map(GUID::to_handle)
            .collect()
    }

    pub(crate) fn is_matched_with(&self, writer: &GUID) -> bool {
        self.state.lock().writers.contains_key(writer)
    }

    pub(crate) fn wait_for_publications(&self, count: u32, timeout: Duration) -> Result<()> {
        self.check_usable()?;
        let deadline = Instant::now().checked_add(timeout);
        let mut statuses = self.statuses.lock();
        while statuses.subscription_matched.current_count < count {
            if self.is_deleted() {
                return Err(Error::AlreadyDeleted);
            }
            match deadline {
                Some(deadline) => {
                    if self.matched.wait_until(&mut statuses, deadline).timed_out()
                        && statuses.subscription_matched.current_count < count
                    {
                        return Err(Error::Timeout);
                    }
                }
                None => self.matched.wait(&mut statuses),
            }
        }
        Ok(())
    }

    pub(crate) fn wait_for_historical_data(&self, timeout: Duration) -> Result<()> {
        self.check_usable()?;
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        while !state.writers.values().all(|w| w.proxy.is_caught_up()) {
            if self.is_deleted() {
                return Err(Error::AlreadyDeleted);
            }
            match deadline {
                Some(deadline) => {
                    if self.caught_up.wait_until(&mut state, deadline).timed_out()
                        && !state.writers.values().all(|w| w.proxy.is_caught_up())
                    {
                        return Err(Error::Timeout);
                    }
                }
                None => self.caught_up.wait(&mut state),
            }
        }
        Ok(())
    }

    fn queue(&self, batch: Pending) {
        if !batch.is_empty() {
            self.pending.lock().merge(batch);
        }
    }

    fn dispatch(&self, event: StatusEvent) {
        let kind = event.kind();
        let subscriber = self.subscriber.upgrade();
        let participant = self.participant.upgrade();
        let handled = self.offer(&event, subscriber.as_ref(), participant.as_ref());
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

    fn offer(
        &self,
        event: &StatusEvent,
        subscriber: Option<&Arc<SubscriberInner>>,
        participant: Option<&Arc<ParticipantInner>>,
    ) -> bool {
        let kind = event.kind();
        if let Some(listener) = self.listener.for_kind(kind) {
            if let Some(me) = self.me.upgrade() {
                deliver_to_reader(listener.as_ref(), &DataReader::from_inner(me), event);
                return true;
            }
        }
        if let Some(listener) = subscriber.and_then(|s| s.listener.for_kind(kind)) {
            deliver_reader_event_to_subscriber(listener.as_ref(), self.handle(), event);
            return true;
        }
        if let Some(listener) = participant.and_then(|p| p.listener.for_kind(kind)) {
            deliver_to_participant(listener.as_ref(), self.handle(), event);
            return true;
        }
        false
    }

    fn dispatch_data_available(&self) {
        let subscriber = self.subscriber.upgrade();
        let participant = self.participant.upgrade();

        let mut handled = false;
        if let Some(subscriber) = &subscriber {
            let on_readers = StatusKind::DataOnReaders;
            let handle = Subscriber::from_inner(Arc::clone(subscriber));
            if let Some(listener) = subscriber.listener.for_kind(on_readers) {
                listener.on_data_on_readers(&handle);
                handled = true;
            } else if let Some(listener) = participant
                .as_ref()
                .and_then(|p| p.listener.for_kind(on_readers))
            {
                listener.on_data_on_readers(&handle);
                handled = true;
            }
            if handled {
                subscriber
                    .status_condition
                    .deactivate(StatusMask::DATA_ON_READERS);
            } else {
                subscriber
                    .status_condition
                    .activate(StatusMask::DATA_ON_READERS);
            }
            subscriber.callbacks.dispatch(&StatusEvent::DataOnReaders);
        }

        if !handled {
            handled = self.offer(
                &StatusEvent::DataAvailable,
                subscriber.as_ref(),
                participant.as_ref(),
            );
        }
        if handled {
            self.status_condition.deactivate(StatusMask::DATA_AVAILABLE);
        } else {
            self.status_condition.activate(StatusMask::DATA_AVAILABLE);
        }
        self.callbacks.dispatch(&StatusEvent::DataAvailable);
        if let Some(participant) = participant {
            participant.callbacks.dispatch(&StatusEvent::DataAvailable);
        }
        self.notify_conditions();
    }

    fn flush_pending(&self) {
        let pending = std::mem::take(&mut *self.pending.lock());
        for event in pending.events {
            self.dispatch(event);
        }
        if pending.data_available {
            self.dispatch_data_available();
        }
    }

    // ------------------------------------------------------------------
    // Receive pipeline
    // ------------------------------------------------------------------

    fn component_of(&self, guid: &GUID) -> Option<usize> {
        self.components.iter().position(|c| c.guid == *guid)
    }

    /// Any message from a writer refreshes its liveliness.
    fn touch_writer(
        writer: &mut MatchedWriter,
        guid: GUID,
        now: Instant,
        statuses: &mut ReaderStatuses,
        batch: &mut Pending,
    ) {
        writer.last_seen = now;
        if !writer.alive && !writer.participant_lost {
            writer.alive = true;
            statuses
                .liveliness_changed
                .writer_alive(guid.to_handle(), true);
            batch.events.push(StatusEvent::LivelinessChanged(
                statuses.liveliness_changed.clone(),
            ));
            log::debug!("[reader] writer {} alive again", guid);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn accept(
        &self,
        state: &mut ReaderState<T>,
        statuses: &mut ReaderStatuses,
        batch: &mut Pending,
        qos: &QoS,
        component: usize,
        strength: i32,
        msg: DataMsg,
    ) {
        let exclusive = qos.ownership.is_exclusive();
        let by_source = qos.destination_order.uses_source_timestamp();
        let reception = Time::now();

        if msg.kind != ChangeKind::Alive {
            for key in self.decoder.lifecycle_keys(component, msg.key) {
                if exclusive && !state.history.claim_ownership(&key, msg.writer, strength) {
                    continue;
                }
                if by_source && state.history.is_superseded(&key, msg.source_timestamp) {
                    statuses.sample_lost.increment();
                    batch
                        .events
                        .push(StatusEvent::SampleLost(statuses.sample_lost.clone()));
                    continue;
                }
                if state.history.apply_lifecycle(
                    key,
                    msg.kind,
                    msg.writer,
                    msg.source_timestamp,
                    reception,
                ) {
                    batch.data_available = true;
                }
            }
            return;
        }

        let samples = match self.decoder.decode(component, msg.key, &msg.payload) {
            Ok(samples) if samples.is_empty() => {
                log::trace!("[reader] {} filtered seq={}", self.guid, msg.seq);
                return;
            }
            Ok(samples) => samples,
            Err(err) => {
                log::warn!(
                    "[reader] {} dropped undecodable seq={} from {}: {}",
                    self.guid,
                    msg.seq,
                    msg.writer,
                    err
                );
                return;
            }
        };

        let deadline = if qos.deadline.is_infinite() {
            None
        } else {
            Some(qos.deadline.period)
        };
        let claimed = exclusive.then_some(strength);
        for (key, sample) in samples {
            if exclusive && !state.history.claim_ownership(&key, msg.writer, strength) {
                log::trace!(
                    "[reader] {} dropped seq={} from non-owner {}",
                    self.guid,
                    msg.seq,
                    msg.writer
                );
                continue;
            }
            if by_source && state.history.is_superseded(&key, msg.source_timestamp) {
                statuses.sample_lost.increment();
                batch
                    .events
                    .push(StatusEvent::SampleLost(statuses.sample_lost.clone()));
                continue;
            }

            match state.history.store(
                key,
                sample,
                msg.writer,
                claimed,
                msg.source_timestamp,
                reception,
                deadline,
            ) {
                StoreOutcome::Stored(_) => batch.data_available = true,
                StoreOutcome::Rejected(reason, handle) => {
                    let status = &mut statuses.sample_rejected;
                    status.increment();
                    status.last_reason = reason;
                    status.last_instance_handle = handle;
                    log::debug!(
                        "[reader] {} rejected seq={} ({:?})",
                        self.guid,
                        msg.seq,
                        reason
                    );
                    batch
                        .events
                        .push(StatusEvent::SampleRejected(status.clone()));
                }
            }
        }
    }

    fn deliver_progress(
        &self,
        state: &mut ReaderState<T>,
        statuses: &mut ReaderStatuses,
        batch: &mut Pending,
        writer: GUID,
        delivered: Vec<DataMsg>,
        lost: u32,
    ) {
        let Some((component, strength)) = state
            .writers
            .get(&writer)
            .map(|w| (w.component, w.strength))
        else {
            return;
        };
        if lost > 0 {
            statuses.sample_lost.increment_by(lost);
            batch
                .events
                .push(StatusEvent::SampleLost(statuses.sample_lost.clone()));
            log::debug!("[reader] {} lost {} samples from {}", self.guid, lost, writer);
        }
        if delivered.is_empty() {
            return;
        }
        let qos = self.qos.read().clone();
        for msg in delivered {
            self.accept(state, statuses, batch, &qos, component, strength, msg);
        }
    }

    /// Insert a locally generated change (built-in topics).
    pub(crate) fn store_local(&self, key: [u8; 16], data: Option<T>, writer: GUID) {
        if self.is_deleted() {
            return;
        }
        let now = Time::now();
        let changed = {
            let mut state = self.state.lock();
            match data {
                Some(sample) => {
                    let outcome =
                        state
                            .history
                            .store(key, sample, writer, None, now, now, None);
                    matches!(outcome, StoreOutcome::Stored(_))
                }
                None => state
                    .history
                    .apply_lifecycle(key, ChangeKind::Disposed, writer, now, now),
            }
        };
        if changed {
            self.dispatch_data_available();
        }
    }

    fn mark_writers_not_alive(
        state: &mut ReaderState<T>,
        statuses: &mut ReaderStatuses,
        batch: &mut Pending,
        writers: &[GUID],
    ) {
        let Some(last) = writers.last() else {
            return;
        };
        for guid in writers {
            state.history.release_ownership(guid);
        }
        statuses
            .liveliness_changed
            .writers_not_alive(last.to_handle(), writers.len() as u32);
        batch.events.push(StatusEvent::LivelinessChanged(
            statuses.liveliness_changed.clone(),
        ));
    }
}

impl<T: DDS> SampleSource for ReaderInner<T> {
    fn has_matching(&self, masks: &StateMasks, query: Option<&SampleQuery>) -> bool {
        self.state.lock().history.has_matching(masks, query)
    }
}

impl<T: DDS> ReaderEndpoint for ReaderInner<T> {
    fn guid(&self) -> GUID {
        self.guid
    }

    fn topic_name(&self) -> String {
        self.source.description().name
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire) && !self.is_deleted()
    }

    fn enable_endpoint(&self) -> Result<()> {
        self.enable()
    }

    fn announcements(&self) -> Vec<EndpointAnnouncement> {
        let mut qos = self.qos.read().clone();
        if let Some(subscriber) = self.subscriber.upgrade() {
            let group = subscriber.qos.read();
            qos.partition = group.partition.clone();
            qos.presentation = group.presentation;
            qos.group_data = group.group_data.clone();
        }
        self.components
            .iter()
            .map(|component| {
                let mut qos = qos.clone();
                qos.topic_data = component.topic.qos.read().topic_data.clone();
                EndpointAnnouncement {
                    guid: component.guid,
                    topic_name: component.topic.name.clone(),
                    type_name: component.topic.type_name.clone(),
                    qos,
                }
            })
            .collect()
    }

    fn has_matching(&self, masks: &StateMasks) -> bool {
        SampleSource::has_matching(self, masks, None)
    }

    fn notify_data_available(&self) {
        if !SampleSource::has_matching(self, &StateMasks::NOT_READ, None) {
            return;
        }
        let participant = self.participant.upgrade();
        let subscriber = self.subscriber.upgrade();
        self.offer(
            &StatusEvent::DataAvailable,
            subscriber.as_ref(),
            participant.as_ref(),
        );
    }

    fn on_writer_matched(&self, local: GUID, writer: &EndpointAnnouncement) {
        let Some(component) = self.component_of(&local) else {
            return;
        };
        let reliable = self.qos.read().reliability.is_reliable()
            && writer.qos.reliability.is_reliable();
        let mut batch = Pending::default();
        {
            let mut state = self.state.lock();
            let mut statuses = self.statuses.lock();
            state.writers.insert(
                writer.guid,
                MatchedWriter {
                    proxy: WriterProxy::new(writer.guid, reliable),
                    component,
                    strength: writer.qos.ownership_strength.value,
                    lease: MatchedWriter::lease_of(writer),
                    last_seen: Instant::now(),
                    alive: true,
                    participant_lost: false,
                },
            );
            let handle = writer.guid.to_handle();
            statuses.subscription_matched.matched(handle);
            statuses.liveliness_changed.writer_alive(handle, false);
            batch.events.push(StatusEvent::SubscriptionMatched(
                statuses.subscription_matched.clone(),
            ));
            batch.events.push(StatusEvent::LivelinessChanged(
                statuses.liveliness_changed.clone(),
            ));
            self.matched.notify_all();
        }
        log::debug!(
            "[reader] {} matched writer {} on '{}' (reliable={})",
            self.guid,
            writer.guid,
            writer.topic_name,
            reliable
        );
        self.queue(batch);
    }

    fn on_writer_updated(&self, writer: &EndpointAnnouncement) {
        let mut state = self.state.lock();
        if let Some(matched) = state.writers.get_mut(&writer.guid) {
            matched.strength = writer.qos.ownership_strength.value;
            matched.lease = MatchedWriter::lease_of(writer);
        }
    }

    fn on_writer_unmatched(&self, local: GUID, writer: GUID) {
        if self.component_of(&local).is_none() {
            return;
        }
        let mut batch = Pending::default();
        {
            let mut state = self.state.lock();
            let Some(removed) = state.writers.remove(&writer) else {
                return;
            };
            state.history.release_ownership(&writer);
            if state.history.remove_writer(&writer) {
                batch.data_available = true;
            }
            let mut statuses = self.statuses.lock();
            let handle = writer.to_handle();
            statuses.subscription_matched.unmatched(handle);
            statuses
                .liveliness_changed
                .writer_removed(handle, removed.alive);
            batch.events.push(StatusEvent::SubscriptionMatched(
                statuses.subscription_matched.clone(),
            ));
            batch.events.push(StatusEvent::LivelinessChanged(
                statuses.liveliness_changed.clone(),
            ));
            self.matched.notify_all();
            self.caught_up.notify_all();
        }
        log::debug!("[reader] {} unmatched writer {}", self.guid, writer);
        self.queue(batch);
    }

    fn on_requested_incompatible(&self, policies: &[QosPolicyId]) {
        let status = {
            let mut statuses = self.statuses.lock();
            statuses.requested_incompatible_qos.record(policies);
            statuses.requested_incompatible_qos.clone()
        };
        log::info!(
            "[match-qos] reader {} incompatible: {:?}",
            self.guid,
            policies
        );
        self.queue(Pending {
            events: vec![StatusEvent::RequestedIncompatibleQos(status)],
            data_available: false,
        });
    }

    fn on_participant_lost(&self, prefix: &GuidPrefix) {
        let mut batch = Pending::default();
        {
            let mut state = self.state.lock();
            let mut lost = Vec::new();
            for (guid, writer) in state.writers.iter_mut() {
                if guid.prefix != *prefix {
                    continue;
                }
                writer.participant_lost = true;
                if writer.alive {
                    writer.alive = false;
                    lost.push(*guid);
                }
            }
            let mut statuses = self.statuses.lock();
            Self::mark_writers_not_alive(&mut state, &mut statuses, &mut batch, &lost);
        }
        self.queue(batch);
    }

    fn on_participant_revived(&self, prefix: &GuidPrefix) {
        let mut batch = Pending::default();
        {
            let now = Instant::now();
            let mut state = self.state.lock();
            let mut statuses = self.statuses.lock();
            let mut revived = false;
            for (guid, writer) in state.writers.iter_mut() {
                if guid.prefix != *prefix {
                    continue;
                }
                writer.participant_lost = false;
                writer.last_seen = now;
                if !writer.alive {
                    writer.alive = true;
                    statuses
                        .liveliness_changed
                        .writer_alive(guid.to_handle(), true);
                    revived = true;
                }
            }
            if revived {
                batch.events.push(StatusEvent::LivelinessChanged(
                    statuses.liveliness_changed.clone(),
                ));
            }
        }
        self.queue(batch);
    }

    fn flush(&self) {
        self.flush_pending();
    }

    fn on_data(&self, msg: DataMsg) {
        if !self.is_enabled() || self.component_of(&msg.reader).is_none() {
            return;
        }
        let mut batch = Pending::default();
        {
            let mut state = self.state.lock();
            let mut statuses = self.statuses.lock();
            let writer = msg.writer;
            let Some(matched) = state.writers.get_mut(&writer) else {
                log::trace!("[reader] {} ignored DATA from unmatched {}", self.guid, writer);
                return;
            };
            Self::touch_writer(matched, writer, Instant::now(), &mut statuses, &mut batch);
            let progress = matched.proxy.on_data(msg);
            self.deliver_progress(
                &mut state,
                &mut statuses,
                &mut batch,
                writer,
                progress.delivered,
                progress.lost,
            );
            self.caught_up.notify_all();
        }
        self.queue(batch);
        self.flush_pending();
    }

    fn on_heartbeat(&self, hb: &HeartbeatMsg) {
        if !self.is_enabled() || self.component_of(&hb.reader).is_none() {
            return;
        }
        let mut batch = Pending::default();
        let ack = {
            let mut state = self.state.lock();
            let mut statuses = self.statuses.lock();
            let Some(matched) = state.writers.get_mut(&hb.writer) else {
                return;
            };
            if !matched.proxy.is_reliable() {
                return;
            }
            let (progress, ack) = matched.proxy.on_heartbeat(hb.reader, hb);
            self.deliver_progress(
                &mut state,
                &mut statuses,
                &mut batch,
                hb.writer,
                progress.delivered,
                progress.lost,
            );
            self.caught_up.notify_all();
            ack
        };
        self.domain.send(Envelope::to(
            self.prefix(),
            hb.writer.prefix,
            Message::AckNack(ack),
        ));
        self.queue(batch);
        self.flush_pending();
    }

    fn on_gap(&self, gap: &GapMsg) {
        if !self.is_enabled() || self.component_of(&gap.reader).is_none() {
            return;
        }
        let mut batch = Pending::default();
        {
            let mut state = self.state.lock();
            let mut statuses = self.statuses.lock();
            let Some(matched) = state.writers.get_mut(&gap.writer) else {
                return;
            };
            let progress = matched.proxy.on_gap(&gap.sequences);
            self.deliver_progress(
                &mut state,
                &mut statuses,
                &mut batch,
                gap.writer,
                progress.delivered,
                progress.lost,
            );
            self.caught_up.notify_all();
        }
        self.queue(batch);
        self.flush_pending();
    }

    fn on_liveliness(&self, writer: GUID) {
        if !self.is_enabled() {
            return;
        }
        let mut batch = Pending::default();
        {
            let mut state = self.state.lock();
            let Some(matched) = state.writers.get_mut(&writer) else {
                return;
            };
            let mut statuses = self.statuses.lock();
            Self::touch_writer(matched, writer, Instant::now(), &mut statuses, &mut batch);
        }
        self.queue(batch);
        self.flush_pending();
    }

    fn tick(&self, now: Instant) {
        if !self.is_enabled() {
            return;
        }
        let period = self.deadline_period();
        let mut batch = Pending::default();
        {
            let mut state = self.state.lock();
            let missed = match period {
                Some(period) => state.history.missed_deadlines(now, period),
                None => Vec::new(),
            };
            let expired: Vec<GUID> = state
                .writers
                .iter_mut()
                .filter_map(|(guid, writer)| {
                    let lease = writer.lease?;
                    if writer.alive && now.saturating_duration_since(writer.last_seen) > lease {
                        writer.alive = false;
                        Some(*guid)
                    } else {
                        None
                    }
                })
                .collect();

            let mut statuses = self.statuses.lock();
            for handle in missed {
                let status = &mut statuses.requested_deadline_missed;
                status.increment();
                status.last_instance_handle = handle;
                batch
                    .events
                    .push(StatusEvent::RequestedDeadlineMissed(status.clone()));
                log::debug!("[reader] {} deadline missed on {:?}", self.guid, handle);
            }
            for guid in expired {
                log::debug!("[reader] {} writer {} missed its lease", self.guid, guid);
                Self::mark_writers_not_alive(&mut state, &mut statuses, &mut batch, &[guid]);
            }
        }
        self.queue(batch);
        self.flush_pending();
    }

    fn mark_deleted(&self) {
        if self.deleted.swap(true, Ordering::AcqRel) {
            return;
        }
        self.enabled.store(false, Ordering::Release);
        self.source.release();
        self.listener.set(None, StatusMask::NONE);
        self.callbacks.clear();
        {
            let mut state = self.state.lock();
            state.writers.clear();
            self.caught_up.notify_all();
        }
        {
            let _statuses = self.statuses.lock();
            self.matched.notify_all();
        }
        let conditions = std::mem::take(&mut *self.conditions.lock());
        for condition in conditions {
            condition.mark_deleted();
        }
        self.status_condition.mark_deleted();
        log::debug!("[reader] {} deleted", self.guid);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
