// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DDS Listener Traits
//!
//! Listeners provide callback-based notification for DDS entity events.
//! This is an alternative to the polling-based StatusCondition/WaitSet pattern.
//!
//! # Usage
//!
//! ```ignore
//! use dcps::{DataReader, DataReaderListener, StatusMask};
//! use std::sync::Arc;
//!
//! struct MyListener;
//!
//! impl DataReaderListener<Temperature> for MyListener {
//!     fn on_data_available(&self, reader: &DataReader<Temperature>) {
//!         while let Ok(samples) = reader.take(16) {
//!             println!("got {} samples", samples.len());
//!         }
//!     }
//! }
//!
//! reader.set_listener(Some(Arc::new(MyListener)), StatusMask::ALL)?;
//! ```
//!
//! # Dispatch
//!
//! A status change is offered to the entity's own listener first, then to the
//! parent (Publisher/Subscriber), then to the DomainParticipant; the first
//! listener whose mask covers the status handles it and the status' change
//! counters reset. If no listener handles it, the entity's StatusCondition
//! becomes active instead. On data arrival, a Subscriber or participant
//! listener interested in `DATA_ON_READERS` takes precedence over
//! `on_data_available`.
//!
//! Closures registered with `on_status` are independent of this chain and run
//! for every event of their kind.
//!
//! # Thread Safety
//!
//! Listeners are called from the participant event thread with no entity lock
//! held. They must be `Send + Sync` and should not block.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::condition::StatusMask;
use super::instance::InstanceHandle;
use super::reader::DataReader;
use super::status::{
    InconsistentTopicStatus, LivelinessChangedStatus, LivelinessLostStatus,
    OfferedDeadlineMissedStatus, OfferedIncompatibleQosStatus, PublicationMatchedStatus,
    RequestedDeadlineMissedStatus, RequestedIncompatibleQosStatus, SampleLostStatus,
    SampleRejectedStatus, StatusKind, SubscriptionMatchedStatus,
};
use super::subscriber::Subscriber;
use super::writer::DataWriter;
use super::DDS;

/// One status change, as delivered to `on_status` closures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    DataAvailable,
    DataOnReaders,
    SampleLost(SampleLostStatus),
    SampleRejected(SampleRejectedStatus),
    LivelinessChanged(LivelinessChangedStatus),
    RequestedDeadlineMissed(RequestedDeadlineMissedStatus),
    RequestedIncompatibleQos(RequestedIncompatibleQosStatus),
    SubscriptionMatched(SubscriptionMatchedStatus),
    LivelinessLost(LivelinessLostStatus),
    OfferedDeadlineMissed(OfferedDeadlineMissedStatus),
    OfferedIncompatibleQos(OfferedIncompatibleQosStatus),
    PublicationMatched(PublicationMatchedStatus),
    InconsistentTopic(InconsistentTopicStatus),
}

impl StatusEvent {
    pub fn kind(&self) -> StatusKind {
        match self {
            StatusEvent::DataAvailable => StatusKind::DataAvailable,
            StatusEvent::DataOnReaders => StatusKind::DataOnReaders,
            StatusEvent::SampleLost(_) => StatusKind::SampleLost,
            StatusEvent::SampleRejected(_) => StatusKind::SampleRejected,
            StatusEvent::LivelinessChanged(_) => StatusKind::LivelinessChanged,
            StatusEvent::RequestedDeadlineMissed(_) => StatusKind::RequestedDeadlineMissed,
            StatusEvent::RequestedIncompatibleQos(_) => StatusKind::RequestedIncompatibleQos,
            StatusEvent::SubscriptionMatched(_) => StatusKind::SubscriptionMatched,
            StatusEvent::LivelinessLost(_) => StatusKind::LivelinessLost,
            StatusEvent::OfferedDeadlineMissed(_) => StatusKind::OfferedDeadlineMissed,
            StatusEvent::OfferedIncompatibleQos(_) => StatusKind::OfferedIncompatibleQos,
            StatusEvent::PublicationMatched(_) => StatusKind::PublicationMatched,
            StatusEvent::InconsistentTopic(_) => StatusKind::InconsistentTopic,
        }
    }
}

/// Listener for DataReader events.
///
/// All methods have default no-op implementations, so you only need to override
/// the events you care about.
pub trait DataReaderListener<T: DDS>: Send + Sync {
    /// Called when new data is available to read.
    ///
    /// Not called when a Subscriber or participant listener handles
    /// `DATA_ON_READERS` for the same arrival.
    fn on_data_available(&self, reader: &DataReader<T>) {
        let _ = reader;
    }

    /// Called when the reader matches or unmatches with a writer.
    fn on_subscription_matched(&self, reader: &DataReader<T>, status: SubscriptionMatchedStatus) {
        let _ = (reader, status);
    }

    /// Called when liveliness of a matched writer changes.
    fn on_liveliness_changed(&self, reader: &DataReader<T>, status: LivelinessChangedStatus) {
        let _ = (reader, status);
    }

    /// Called when samples are lost (GAP, superseded source timestamp).
    fn on_sample_lost(&self, reader: &DataReader<T>, status: SampleLostStatus) {
        let _ = (reader, status);
    }

    /// Called when samples are rejected due to resource limits.
    fn on_sample_rejected(&self, reader: &DataReader<T>, status: SampleRejectedStatus) {
        let _ = (reader, status);
    }

    /// Called when the requested deadline is missed.
    fn on_requested_deadline_missed(
        &self,
        reader: &DataReader<T>,
        status: RequestedDeadlineMissedStatus,
    ) {
        let _ = (reader, status);
    }

    /// Called when a discovered writer offers incompatible QoS.
    fn on_requested_incompatible_qos(
        &self,
        reader: &DataReader<T>,
        status: RequestedIncompatibleQosStatus,
    ) {
        let _ = (reader, status);
    }
}

/// Listener for DataWriter events.
///
/// All methods have default no-op implementations.
pub trait DataWriterListener<T: DDS>: Send + Sync {
    /// Called when the writer matches or unmatches with a reader.
    fn on_publication_matched(&self, writer: &DataWriter<T>, status: PublicationMatchedStatus) {
        let _ = (writer, status);
    }

    /// Called when an offered deadline is missed.
    fn on_offered_deadline_missed(
        &self,
        writer: &DataWriter<T>,
        status: OfferedDeadlineMissedStatus,
    ) {
        let _ = (writer, status);
    }

    /// Called when a discovered reader requests incompatible QoS.
    fn on_offered_incompatible_qos(
        &self,
        writer: &DataWriter<T>,
        status: OfferedIncompatibleQosStatus,
    ) {
        let _ = (writer, status);
    }

    /// Called once each time the writer misses its liveliness lease.
    fn on_liveliness_lost(&self, writer: &DataWriter<T>, status: LivelinessLostStatus) {
        let _ = (writer, status);
    }
}

/// Listener for Publisher events; receives the statuses of contained writers
/// that their own listener did not handle.
pub trait PublisherListener: Send + Sync {
    fn on_publication_matched(&self, writer: InstanceHandle, status: PublicationMatchedStatus) {
        let _ = (writer, status);
    }

    fn on_offered_deadline_missed(
        &self,
        writer: InstanceHandle,
        status: OfferedDeadlineMissedStatus,
    ) {
        let _ = (writer, status);
    }

    fn on_offered_incompatible_qos(
        &self,
        writer: InstanceHandle,
        status: OfferedIncompatibleQosStatus,
    ) {
        let _ = (writer, status);
    }

    fn on_liveliness_lost(&self, writer: InstanceHandle, status: LivelinessLostStatus) {
        let _ = (writer, status);
    }
}

/// Listener for Subscriber events.
pub trait SubscriberListener: Send + Sync {
    /// Called when any reader of the subscriber received data.
    fn on_data_on_readers(&self, subscriber: &Subscriber) {
        let _ = subscriber;
    }

    fn on_data_available(&self, reader: InstanceHandle) {
        let _ = reader;
    }

    fn on_subscription_matched(&self, reader: InstanceHandle, status: SubscriptionMatchedStatus) {
        let _ = (reader, status);
    }

    fn on_liveliness_changed(&self, reader: InstanceHandle, status: LivelinessChangedStatus) {
        let _ = (reader, status);
    }

    fn on_sample_lost(&self, reader: InstanceHandle, status: SampleLostStatus) {
        let _ = (reader, status);
    }

    fn on_sample_rejected(&self, reader: InstanceHandle, status: SampleRejectedStatus) {
        let _ = (reader, status);
    }

    fn on_requested_deadline_missed(
        &self,
        reader: InstanceHandle,
        status: RequestedDeadlineMissedStatus,
    ) {
        let _ = (reader, status);
    }

    fn on_requested_incompatible_qos(
        &self,
        reader: InstanceHandle,
        status: RequestedIncompatibleQosStatus,
    ) {
        let _ = (reader, status);
    }
}

/// Listener for Topic events.
pub trait TopicListener: Send + Sync {
    /// A remote topic with the same name but another type was discovered.
    fn on_inconsistent_topic(&self, topic_name: &str, status: InconsistentTopicStatus) {
        let _ = (topic_name, status);
    }
}

/// Listener for DomainParticipant events; last stop of the dispatch chain.
pub trait DomainParticipantListener: Send + Sync {
    fn on_inconsistent_topic(&self, topic_name: &str, status: InconsistentTopicStatus) {
        let _ = (topic_name, status);
    }

    fn on_data_on_readers(&self, subscriber: &Subscriber) {
        let _ = subscriber;
    }

    fn on_data_available(&self, reader: InstanceHandle) {
        let _ = reader;
    }

    fn on_subscription_matched(&self, reader: InstanceHandle, status: SubscriptionMatchedStatus) {
        let _ = (reader, status);
    }

    fn on_liveliness_changed(&self, reader: InstanceHandle, status: LivelinessChangedStatus) {
        let _ = (reader, status);
    }

    fn on_sample_lost(&self, reader: InstanceHandle, status: SampleLostStatus) {
        let _ = (reader, status);
    }

    fn on_sample_rejected(&self, reader: InstanceHandle, status: SampleRejectedStatus) {
        let _ = (reader, status);
    }

    fn on_requested_deadline_missed(
        &self,
        reader: InstanceHandle,
        status: RequestedDeadlineMissedStatus,
    ) {
        let _ = (reader, status);
    }

    fn on_requested_incompatible_qos(
        &self,
        reader: InstanceHandle,
        status: RequestedIncompatibleQosStatus,
    ) {
        let _ = (reader, status);
    }

    fn on_publication_matched(&self, writer: InstanceHandle, status: PublicationMatchedStatus) {
        let _ = (writer, status);
    }

    fn on_offered_deadline_missed(
        &self,
        writer: InstanceHandle,
        status: OfferedDeadlineMissedStatus,
    ) {
        let _ = (writer, status);
    }

    fn on_offered_incompatible_qos(
        &self,
        writer: InstanceHandle,
        status: OfferedIncompatibleQosStatus,
    ) {
        let _ = (writer, status);
    }

    fn on_liveliness_lost(&self, writer: InstanceHandle, status: LivelinessLostStatus) {
        let _ = (writer, status);
    }
}

/// Closure-based listener for simple data callbacks.
///
/// ```ignore
/// let listener = ClosureListener::new(|reader: &DataReader<Temperature>| {
///     let _ = reader.take(8);
/// });
/// reader.set_listener(Some(Arc::new(listener)), StatusMask::DATA_AVAILABLE)?;
/// ```
pub struct ClosureListener<T: DDS, F: Fn(&DataReader<T>) + Send + Sync> {
    callback: F,
    _phantom: core::marker::PhantomData<fn() -> T>,
}

impl<T: DDS, F: Fn(&DataReader<T>) + Send + Sync> ClosureListener<T, F> {
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            _phantom: core::marker::PhantomData,
        }
    }
}

impl<T: DDS, F: Fn(&DataReader<T>) + Send + Sync> DataReaderListener<T> for ClosureListener<T, F> {
    fn on_data_available(&self, reader: &DataReader<T>) {
        (self.callback)(reader);
    }
}

// ============================================================================
// Listener slot
// ============================================================================

/// The single listener of an entity plus the mask it was installed with.
pub(crate) struct ListenerSlot<L: ?Sized> {
    slot: Mutex<Option<(Arc<L>, StatusMask)>>,
}

impl<L: ?Sized> ListenerSlot<L> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Replace the listener; `None` clears the registration.
    pub(crate) fn set(&self, listener: Option<Arc<L>>, mask: StatusMask) {
        *self.slot.lock() = listener.map(|l| (l, mask));
    }

    /// Listener interested in `kind`, if any.
    pub(crate) fn for_kind(&self, kind: StatusKind) -> Option<Arc<L>> {
        let guard = self.slot.lock();
        match guard.as_ref() {
            Some((listener, mask)) if mask.contains(kind.mask()) => Some(Arc::clone(listener)),
            _ => None,
        }
    }
}

// ============================================================================
// Closure registry
// ============================================================================

/// Identifier returned by `on_status`, used to remove the closure.
pub type CallbackId = u64;

type StatusCallback = Arc<dyn Fn(&StatusEvent) + Send + Sync>;

static NEXT_CALLBACK_ID: AtomicU64 = AtomicU64::new(1);

/// Per-entity registry of status closures.
pub(crate) struct CallbackRegistry {
    callbacks: Mutex<Vec<(CallbackId, StatusKind, StatusCallback)>>,
}

impl CallbackRegistry {
    pub(crate) fn new() -> Self {
        Self {
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn register<F>(&self, kind: StatusKind, callback: F) -> CallbackId
    where
        F: Fn(&StatusEvent) + Send + Sync + 'static,
    {
        let id = NEXT_CALLBACK_ID.fetch_add(1, Ordering::Relaxed);
        self.callbacks.lock().push((id, kind, Arc::new(callback)));
        id
    }

    /// Returns `false` when the id is unknown.
    pub(crate) fn remove(&self, id: CallbackId) -> bool {
        let mut callbacks = self.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(cb_id, _, _)| *cb_id != id);
        callbacks.len() != before
    }

    /// Invoke every closure registered for the event's kind.
    pub(crate) fn dispatch(&self, event: &StatusEvent) {
        let kind = event.kind();
        let matching: Vec<StatusCallback> = self
            .callbacks
            .lock()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, cb)| Arc::clone(cb))
            .collect();
        for callback in matching {
            callback(event);
        }
    }

    pub(crate) fn clear(&self) {
        self.callbacks.lock().clear();
    }
}

// ============================================================================
// Event routing helpers
// ============================================================================

/// Deliver a reader-side event to a typed reader listener.
pub(crate) fn deliver_to_reader<T: DDS>(
    listener: &dyn DataReaderListener<T>,
    reader: &DataReader<T>,
    event: &StatusEvent,
) {
    match event {
        StatusEvent::DataAvailable => listener.on_data_available(reader),
        StatusEvent::SubscriptionMatched(s) => listener.on_subscription_matched(reader, s.clone()),
        StatusEvent::LivelinessChanged(s) => listener.on_liveliness_changed(reader, s.clone()),
        StatusEvent::SampleLost(s) => listener.on_sample_lost(reader, s.clone()),
        StatusEvent::SampleRejected(s) => listener.on_sample_rejected(reader, s.clone()),
        StatusEvent::RequestedDeadlineMissed(s) => {
            listener.on_requested_deadline_missed(reader, s.clone());
        }
        StatusEvent::RequestedIncompatibleQos(s) => {
            listener.on_requested_incompatible_qos(reader, s.clone());
        }
        _ => {}
    }
}

/// Deliver a writer-side event to a typed writer listener.
pub(crate) fn deliver_to_writer<T: DDS>(
    listener: &dyn DataWriterListener<T>,
    writer: &DataWriter<T>,
    event: &StatusEvent,
) {
    match event {
        StatusEvent::PublicationMatched(s) => listener.on_publication_matched(writer, s.clone()),
        StatusEvent::OfferedDeadlineMissed(s) => {
            listener.on_offered_deadline_missed(writer, s.clone());
        }
        StatusEvent::OfferedIncompatibleQos(s) => {
            listener.on_offered_incompatible_qos(writer, s.clone());
        }
        StatusEvent::LivelinessLost(s) => listener.on_liveliness_lost(writer, s.clone()),
        _ => {}
    }
}

pub(crate) fn deliver_reader_event_to_subscriber(
    listener: &dyn SubscriberListener,
    reader: InstanceHandle,
    event: &StatusEvent,
) {
    match event {
        StatusEvent::DataAvailable => listener.on_data_available(reader),
        StatusEvent::SubscriptionMatched(s) => listener.on_subscription_matched(reader, s.clone()),
        StatusEvent::LivelinessChanged(s) => listener.on_liveliness_changed(reader, s.clone()),
        StatusEvent::SampleLost(s) => listener.on_sample_lost(reader, s.clone()),
        StatusEvent::SampleRejected(s) => listener.on_sample_rejected(reader, s.clone()),
        StatusEvent::RequestedDeadlineMissed(s) => {
            listener.on_requested_deadline_missed(reader, s.clone());
        }
        StatusEvent::RequestedIncompatibleQos(s) => {
            listener.on_requested_incompatible_qos(reader, s.clone());
        }
        _ => {}
    }
}

pub(crate) fn deliver_writer_event_to_publisher(
    listener: &dyn PublisherListener,
    writer: InstanceHandle,
    event: &StatusEvent,
) {
    match event {
        StatusEvent::PublicationMatched(s) => listener.on_publication_matched(writer, s.clone()),
        StatusEvent::OfferedDeadlineMissed(s) => {
            listener.on_offered_deadline_missed(writer, s.clone());
        }
        StatusEvent::OfferedIncompatibleQos(s) => {
            listener.on_offered_incompatible_qos(writer, s.clone());
        }
        StatusEvent::LivelinessLost(s) => listener.on_liveliness_lost(writer, s.clone()),
        _ => {}
    }
}

/// Deliver any reader or writer event to a participant listener.
pub(crate) fn deliver_to_participant(
    listener: &dyn DomainParticipantListener,
    entity: InstanceHandle,
    event: &StatusEvent,
) {
    match event {
        StatusEvent::DataAvailable => listener.on_data_available(entity),
        StatusEvent::SubscriptionMatched(s) => listener.on_subscription_matched(entity, s.clone()),
        StatusEvent::LivelinessChanged(s) => listener.on_liveliness_changed(entity, s.clone()),
        StatusEvent::SampleLost(s) => listener.on_sample_lost(entity, s.clone()),
        StatusEvent::SampleRejected(s) => listener.on_sample_rejected(entity, s.clone()),
        StatusEvent::RequestedDeadlineMissed(s) => {
            listener.on_requested_deadline_missed(entity, s.clone());
        }
        StatusEvent::RequestedIncompatibleQos(s) => {
            listener.on_requested_incompatible_qos(entity, s.clone());
        }
        StatusEvent::PublicationMatched(s) => listener.on_publication_matched(entity, s.clone()),
        StatusEvent::OfferedDeadlineMissed(s) => {
            listener.on_offered_deadline_missed(entity, s.clone());
        }
        StatusEvent::OfferedIncompatibleQos(s) => {
            listener.on_offered_incompatible_qos(entity, s.clone());
        }
        StatusEvent::LivelinessLost(s) => listener.on_liveliness_lost(entity, s.clone()),
        StatusEvent::DataOnReaders | StatusEvent::InconsistentTopic(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct Recorder {
        matched: AtomicU32,
    }

    impl SubscriberListener for Recorder {
        fn on_subscription_matched(&self, _reader: InstanceHandle, status: SubscriptionMatchedStatus) {
            self.matched.fetch_add(status.current_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_slot_mask_filtering() {
        let slot: ListenerSlot<dyn SubscriberListener> = ListenerSlot::new();
        assert!(slot.for_kind(StatusKind::SubscriptionMatched).is_none());

        let recorder = Arc::new(Recorder {
            matched: AtomicU32::new(0),
        });
        slot.set(Some(recorder.clone()), StatusMask::SUBSCRIPTION_MATCHED);
        assert!(slot.for_kind(StatusKind::SubscriptionMatched).is_some());
        assert!(slot.for_kind(StatusKind::SampleLost).is_none());

        let status = SubscriptionMatchedStatus {
            current_count: 2,
            ..SubscriptionMatchedStatus::default()
        };
        if let Some(listener) = slot.for_kind(StatusKind::SubscriptionMatched) {
            deliver_reader_event_to_subscriber(
                listener.as_ref(),
                InstanceHandle::NIL,
                &StatusEvent::SubscriptionMatched(status),
            );
        }
        assert_eq!(recorder.matched.load(Ordering::SeqCst), 2);

        slot.set(None, StatusMask::ALL);
        assert!(slot.for_kind(StatusKind::SubscriptionMatched).is_none());
    }

    #[test]
    fn test_callback_registry_by_kind() {
        let registry = CallbackRegistry::new();
        let lost = Arc::new(AtomicU32::new(0));
        let lost_a = Arc::clone(&lost);
        let lost_b = Arc::clone(&lost);

        let a = registry.register(StatusKind::SampleLost, move |_| {
            lost_a.fetch_add(1, Ordering::SeqCst);
        });
        let _b = registry.register(StatusKind::SampleLost, move |_| {
            lost_b.fetch_add(10, Ordering::SeqCst);
        });

        registry.dispatch(&StatusEvent::SampleLost(SampleLostStatus::default()));
        registry.dispatch(&StatusEvent::DataAvailable);
        assert_eq!(lost.load(Ordering::SeqCst), 11);

        assert!(registry.remove(a));
        assert!(!registry.remove(a));
        registry.dispatch(&StatusEvent::SampleLost(SampleLostStatus::default()));
        assert_eq!(lost.load(Ordering::SeqCst), 21);
    }

    #[test]
    fn test_event_kinds() {
        assert_eq!(StatusEvent::DataAvailable.kind(), StatusKind::DataAvailable);
        assert_eq!(
            StatusEvent::PublicationMatched(PublicationMatchedStatus::default()).kind(),
            StatusKind::PublicationMatched
        );
    }
}
