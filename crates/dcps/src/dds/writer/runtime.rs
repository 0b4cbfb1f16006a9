// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use super::inner::{Change, WriterInner};
use crate::core::guid::GUID;
use crate::dds::builtin::SubscriptionBuiltinTopicData;
use crate::dds::condition::StatusMask;
use crate::dds::listener::{deliver_to_writer, CallbackId, DataWriterListener, StatusEvent};
use crate::dds::publisher::Publisher;
use crate::dds::status::{
    LivelinessLostStatus, OfferedDeadlineMissedStatus, OfferedIncompatibleQosStatus,
    PublicationMatchedStatus, StatusKind,
};
use crate::dds::topic::Topic;
use crate::dds::{Error, InstanceHandle, Result, Time, DDS};
use crate::qos::QoS;
use crate::reliability::ChangeKind;

/// A typed DDS DataWriter.
///
/// `DataWriter<T>` is a cheap handle; clones share the same writer.
///
/// # Thread Safety
///
/// `DataWriter<T>` is `Send + Sync`. A reliable KEEP_ALL writer blocks in
/// `write` for at most `max_blocking_time` while its history is full.
pub struct DataWriter<T: DDS> {
    pub(crate) inner: Arc<WriterInner>,
    _marker: PhantomData<fn(T)>,
}

impl<T: DDS> Clone for DataWriter<T> {
    fn clone(&self) -> Self {
        Self::from_inner(Arc::clone(&self.inner))
    }
}

impl<T: DDS> std::fmt::Debug for DataWriter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataWriter")
            .field("guid", &self.inner.guid())
            .field("topic", &self.inner.topic.name)
            .finish()
    }
}

impl<T: DDS> DataWriter<T> {
    pub(crate) fn from_inner(inner: Arc<WriterInner>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    fn encode(sample: &T) -> Result<Arc<[u8]>> {
        let mut buf = Vec::with_capacity(64);
        sample.encode_cdr2(&mut buf)?;
        Ok(Arc::from(buf))
    }

    /// Check that `handle` (unless nil) names the instance of `key`.
    fn check_handle(key: &[u8; 16], handle: InstanceHandle) -> Result<()> {
        if !handle.is_nil() && handle != InstanceHandle::from_key(key) {
            return Err(Error::BadParameter(
                "instance handle does not match the sample key".into(),
            ));
        }
        Ok(())
    }

    fn submit(&self, sample: &T, kind: ChangeKind, timestamp: Time) -> Result<()> {
        let change = Change {
            key: sample.compute_key(),
            kind,
            payload: Self::encode(sample)?,
            timestamp,
        };
        self.inner.submit(change)
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Publish a sample stamped with the current time.
    ///
    /// # Errors
    ///
    /// - `OutOfResources` when the history is full (KEEP_ALL) or the
    ///   instance limit is reached
    /// - `NotEnabled` / `AlreadyDeleted` for unusable writers
    pub fn write(&self, sample: &T) -> Result<()> {
        self.write_w_timestamp(sample, Time::now())
    }

    pub fn write_w_timestamp(&self, sample: &T, timestamp: Time) -> Result<()> {
        self.submit(sample, ChangeKind::Alive, timestamp)
    }

    /// Register the instance of `sample` without publishing it.
    pub fn register_instance(&self, sample: &T) -> Result<InstanceHandle> {
        self.register_instance_w_timestamp(sample, Time::now())
    }

    pub fn register_instance_w_timestamp(
        &self,
        sample: &T,
        _timestamp: Time,
    ) -> Result<InstanceHandle> {
        let key = sample.compute_key();
        self.inner.register(key, Self::encode(sample)?)?;
        Ok(InstanceHandle::from_key(&key))
    }

    /// Stop updating an instance. With `autodispose_unregistered_instances`
    /// the instance is disposed as well. Unregistering an unknown instance is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// `BadParameter` when `handle` is not nil and names another instance.
    pub fn unregister_instance(&self, sample: &T, handle: InstanceHandle) -> Result<()> {
        self.unregister_instance_w_timestamp(sample, handle, Time::now())
    }

    pub fn unregister_instance_w_timestamp(
        &self,
        sample: &T,
        handle: InstanceHandle,
        timestamp: Time,
    ) -> Result<()> {
        self.inner.check_usable()?;
        let key = sample.compute_key();
        Self::check_handle(&key, handle)?;
        if !self.inner.is_registered(&key) {
            log::debug!(
                "[writer] {} unregister of unknown instance ignored",
                self.inner.guid()
            );
            return Ok(());
        }
        let kind = if self
            .inner
            .qos
            .read()
            .writer_data_lifecycle
            .autodispose_unregistered_instances
        {
            ChangeKind::DisposedUnregistered
        } else {
            ChangeKind::Unregistered
        };
        self.submit(sample, kind, timestamp)
    }

    /// Dispose an instance; readers see it NotAliveDisposed.
    pub fn dispose(&self, sample: &T, handle: InstanceHandle) -> Result<()> {
        self.dispose_w_timestamp(sample, handle, Time::now())
    }

    pub fn dispose_w_timestamp(
        &self,
        sample: &T,
        handle: InstanceHandle,
        timestamp: Time,
    ) -> Result<()> {
        Self::check_handle(&sample.compute_key(), handle)?;
        self.submit(sample, ChangeKind::Disposed, timestamp)
    }

    /// Handle of the instance `sample` belongs to, or nil if never seen.
    pub fn lookup_instance(&self, sample: &T) -> InstanceHandle {
        self.inner.lookup_instance(&sample.compute_key())
    }

    /// The sample an instance was registered (or first written) with.
    pub fn get_key_value(&self, handle: InstanceHandle) -> Result<T> {
        if handle.is_nil() {
            return Err(Error::BadParameter("nil instance handle".into()));
        }
        let payload = self
            .inner
            .key_payload(&handle)
            .ok_or_else(|| Error::BadParameter("unknown instance handle".into()))?;
        T::decode_cdr2(&payload)
    }

    /// Block until every matched reliable reader acknowledged every sample
    /// written so far.
    ///
    /// # Errors
    ///
    /// `Timeout` when some reader is still behind after `timeout`.
    pub fn wait_for_acknowledgments(&self, timeout: Duration) -> Result<()> {
        self.inner.wait_for_acknowledgments(timeout)
    }

    /// Block until at least `count` readers are matched.
    pub fn wait_for_subscriptions(&self, count: u32, timeout: Duration) -> Result<()> {
        self.inner.wait_for_subscriptions(count, timeout)
    }

    /// Manually assert liveliness (MANUAL_BY_TOPIC writers).
    pub fn assert_liveliness(&self) -> Result<()> {
        self.inner.assert_liveliness()
    }

    // ------------------------------------------------------------------
    // Entity
    // ------------------------------------------------------------------

    pub fn get_instance_handle(&self) -> InstanceHandle {
        self.inner.handle()
    }

    pub fn get_topic(&self) -> Topic<T> {
        Topic::from_inner(Arc::clone(&self.inner.topic))
    }

    pub fn get_publisher(&self) -> Result<Publisher> {
        self.inner
            .publisher
            .upgrade()
            .map(Publisher::from_inner)
            .ok_or(Error::AlreadyDeleted)
    }

    pub fn get_qos(&self) -> QoS {
        self.inner.qos.read().clone()
    }

    /// # Errors
    ///
    /// `ImmutablePolicy` when an immutable policy changes after enable.
    pub fn set_qos(&self, qos: QoS) -> Result<()> {
        self.inner.set_qos(qos)
    }

    pub fn enable(&self) -> Result<()> {
        self.inner.enable()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }

    // ------------------------------------------------------------------
    // Statuses
    // ------------------------------------------------------------------

    pub fn get_publication_matched_status(&self) -> PublicationMatchedStatus {
        self.inner
            .take_status(StatusKind::PublicationMatched, |s| {
                s.publication_matched.clone()
            })
    }

    pub fn get_offered_deadline_missed_status(&self) -> OfferedDeadlineMissedStatus {
        self.inner.take_status(StatusKind::OfferedDeadlineMissed, |s| {
            s.offered_deadline_missed.clone()
        })
    }

    pub fn get_offered_incompatible_qos_status(&self) -> OfferedIncompatibleQosStatus {
        self.inner.take_status(StatusKind::OfferedIncompatibleQos, |s| {
            s.offered_incompatible_qos.clone()
        })
    }

    pub fn get_liveliness_lost_status(&self) -> LivelinessLostStatus {
        self.inner
            .take_status(StatusKind::LivelinessLost, |s| s.liveliness_lost.clone())
    }

    pub fn get_status_changes(&self) -> StatusMask {
        self.inner.status_condition.get_active_statuses()
    }

    /// Handles of the readers currently matched.
    pub fn get_matched_subscriptions(&self) -> Vec<InstanceHandle> {
        self.inner
            .matched_readers()
            .into_iter()
            .map(|guid| guid.to_handle())
            .collect()
    }

    pub fn get_matched_subscription_data(
        &self,
        handle: InstanceHandle,
    ) -> Result<SubscriptionBuiltinTopicData> {
        let reader = GUID::from_handle(handle);
        if !self.inner.is_matched_with(&reader) {
            return Err(Error::BadParameter("reader is not matched".into()));
        }
        self.inner
            .participant
            .upgrade()
            .and_then(|p| p.subscription_data(&reader))
            .ok_or_else(|| Error::BadParameter("reader is not matched".into()))
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Install (or clear) the writer listener; replaces any previous one.
    pub fn set_listener(
        &self,
        listener: Option<Arc<dyn DataWriterListener<T>>>,
        mask: StatusMask,
    ) -> Result<()> {
        if self.inner.is_deleted() {
            return Err(Error::AlreadyDeleted);
        }
        let erased = listener.map(|listener| {
            let weak = Arc::downgrade(&self.inner);
            Arc::new(move |event: &StatusEvent| {
                if let Some(inner) = weak.upgrade() {
                    let writer = DataWriter::<T>::from_inner(inner);
                    deliver_to_writer(listener.as_ref(), &writer, event);
                }
            }) as Arc<super::inner::WriterListenerFn>
        });
        self.inner.listener.set(erased, mask);
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
