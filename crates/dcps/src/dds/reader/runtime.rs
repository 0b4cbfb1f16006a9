// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::sync::Arc;
use std::time::Duration;

use super::history::{InstanceSelector, Sample};
use super::inner::{ReaderEndpoint, ReaderInner};
use crate::core::guid::GUID;
use crate::dds::builtin::PublicationBuiltinTopicData;
use crate::dds::condition::{Condition, StatusMask};
use crate::dds::listener::{CallbackId, DataReaderListener, StatusEvent};
use crate::dds::read_condition::{
    read_condition_state, InstanceStateMask, QueryCondition, ReadCondition, SampleStateMask,
    StateMasks, ViewStateMask,
};
use crate::dds::status::{
    LivelinessChangedStatus, RequestedDeadlineMissedStatus, RequestedIncompatibleQosStatus,
    SampleLostStatus, SampleRejectedStatus, StatusKind, SubscriptionMatchedStatus,
};
use crate::dds::subscriber::Subscriber;
use crate::dds::topic::TopicDescription;
use crate::dds::{Error, InstanceHandle, Result, DDS};
use crate::qos::QoS;

/// A typed DDS DataReader.
///
/// `DataReader<T>` is a cheap handle; clones share the same reader. Every
/// `read`/`take` variant returns [`Error::NoData`] when nothing matches.
///
/// # Thread Safety
///
/// `DataReader<T>` is `Send + Sync`. Listeners run on the participant event
/// thread and may call back into the reader.
pub struct DataReader<T: DDS> {
    pub(crate) inner: Arc<ReaderInner<T>>,
}

impl<T: DDS> Clone for DataReader<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: DDS> std::fmt::Debug for DataReader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataReader")
            .field("guid", &self.inner.guid())
            .field("topic", &self.inner.topic_name())
            .finish()
    }
}

impl<T: DDS> DataReader<T> {
    pub(crate) fn from_inner(inner: Arc<ReaderInner<T>>) -> Self {
        Self { inner }
    }

    pub fn get_instance_handle(&self) -> InstanceHandle {
        self.inner.handle()
    }

    pub fn get_topicdescription(&self) -> TopicDescription {
        self.inner.source.description()
    }

    /// The subscriber that created this reader.
    pub fn get_subscriber(&self) -> Result<Subscriber> {
        self.inner
            .subscriber
            .upgrade()
            .map(Subscriber::from_inner)
            .ok_or(Error::AlreadyDeleted)
    }

    pub fn get_qos(&self) -> QoS {
        self.inner.qos.read().clone()
    }

    /// Replace the reader QoS; matching is re-evaluated when enabled.
    ///
    /// # Errors
    ///
    /// `ImmutablePolicy` when an immutable policy changes after enable,
    /// `InconsistentPolicy` for contradicting policies.
    pub fn set_qos(&self, qos: QoS) -> Result<()> {
        self.inner.set_qos(qos)
    }

    /// Enable a reader created with `autoenable_created_entities = false`.
    pub fn enable(&self) -> Result<()> {
        self.inner.enable()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }

    // ------------------------------------------------------------------
    // read / take
    // ------------------------------------------------------------------

    /// Read up to `max_samples` samples in any state; they become Read.
    pub fn read(&self, max_samples: usize) -> Result<Vec<Sample<T>>> {
        self.inner
            .collect(max_samples, &StateMasks::ANY, InstanceSelector::All, None, false)
    }

    /// Take up to `max_samples` samples in any state, removing them.
    pub fn take(&self, max_samples: usize) -> Result<Vec<Sample<T>>> {
        self.inner
            .collect(max_samples, &StateMasks::ANY, InstanceSelector::All, None, true)
    }

    /// Read the samples selected by a ReadCondition or QueryCondition of this
    /// reader.
    pub fn read_w_condition(
        &self,
        max_samples: usize,
        condition: &dyn Condition,
    ) -> Result<Vec<Sample<T>>> {
        self.with_condition(max_samples, condition, false)
    }

    pub fn take_w_condition(
        &self,
        max_samples: usize,
        condition: &dyn Condition,
    ) -> Result<Vec<Sample<T>>> {
        self.with_condition(max_samples, condition, true)
    }

    fn with_condition(
        &self,
        max_samples: usize,
        condition: &dyn Condition,
        take: bool,
    ) -> Result<Vec<Sample<T>>> {
        let state = read_condition_state(condition)
            .ok_or_else(|| Error::BadParameter("not a read or query condition".into()))?;
        if state.reader() != self.inner.handle() || state.is_deleted() {
            return Err(Error::PreconditionNotMet(
                "condition does not belong to this reader".into(),
            ));
        }
        let masks = state.masks();
        self.inner.collect(
            max_samples,
            &masks,
            InstanceSelector::All,
            state.query(),
            take,
        )
    }

    /// Read the samples of one instance.
    ///
    /// # Errors
    ///
    /// `BadParameter` for the nil handle, `NoData` for an unknown instance
    /// or one without samples.
    pub fn read_instance(
        &self,
        max_samples: usize,
        handle: InstanceHandle,
    ) -> Result<Vec<Sample<T>>> {
        self.instance_op(max_samples, handle, false)
    }

    pub fn take_instance(
        &self,
        max_samples: usize,
        handle: InstanceHandle,
    ) -> Result<Vec<Sample<T>>> {
        self.instance_op(max_samples, handle, true)
    }

    fn instance_op(
        &self,
        max_samples: usize,
        handle: InstanceHandle,
        take: bool,
    ) -> Result<Vec<Sample<T>>> {
        if handle.is_nil() {
            return Err(Error::BadParameter("nil instance handle".into()));
        }
        self.inner.collect(
            max_samples,
            &StateMasks::ANY,
            InstanceSelector::Instance(handle),
            None,
            take,
        )
    }

    /// Read the samples of the first instance after `previous` (in handle
    /// order) that holds any; pass `InstanceHandle::NIL` to start.
    pub fn read_next_instance(
        &self,
        max_samples: usize,
        previous: InstanceHandle,
    ) -> Result<Vec<Sample<T>>> {
        self.inner.collect(
            max_samples,
            &StateMasks::ANY,
            InstanceSelector::After(previous),
            None,
            false,
        )
    }

    pub fn take_next_instance(
        &self,
        max_samples: usize,
        previous: InstanceHandle,
    ) -> Result<Vec<Sample<T>>> {
        self.inner.collect(
            max_samples,
            &StateMasks::ANY,
            InstanceSelector::After(previous),
            None,
            true,
        )
    }

    /// Read the oldest unread sample.
    pub fn read_next_sample(&self) -> Result<Sample<T>> {
        self.next_sample(false)
    }

    /// Take the oldest unread sample.
    pub fn take_next_sample(&self) -> Result<Sample<T>> {
        self.next_sample(true)
    }

    fn next_sample(&self, take: bool) -> Result<Sample<T>> {
        self.inner
            .collect(1, &StateMasks::NOT_READ, InstanceSelector::All, None, take)?
            .pop()
            .ok_or(Error::NoData)
    }

    // ------------------------------------------------------------------
    // Instances
    // ------------------------------------------------------------------

    /// Handle of the instance `sample` belongs to, or nil if unknown.
    pub fn lookup_instance(&self, sample: &T) -> InstanceHandle {
        self.inner.lookup_instance(sample.compute_key())
    }

    /// The key-holding sample of an instance.
    pub fn get_key_value(&self, handle: InstanceHandle) -> Result<T> {
        if handle.is_nil() {
            return Err(Error::BadParameter("nil instance handle".into()));
        }
        self.inner
            .key_value(&handle)
            .ok_or_else(|| Error::BadParameter("unknown instance handle".into()))
    }

    /// Handles of every instance currently held.
    pub fn get_instance_handles(&self) -> Vec<InstanceHandle> {
        self.inner.instance_handles()
    }

    // ------------------------------------------------------------------
    // Conditions
    // ------------------------------------------------------------------

    pub fn create_readcondition(
        &self,
        sample_states: SampleStateMask,
        view_states: ViewStateMask,
        instance_states: InstanceStateMask,
    ) -> Result<Arc<ReadCondition>> {
        if self.inner.is_deleted() {
            return Err(Error::AlreadyDeleted);
        }
        let condition = ReadCondition::new(
            self.inner.handle(),
            self.inner.source_weak(),
            sample_states,
            view_states,
            instance_states,
        );
        self.inner.add_condition(Arc::clone(condition.state()));
        Ok(Arc::new(condition))
    }

    /// # Errors
    ///
    /// `Error::Error` when the expression does not parse or the parameter
    /// count differs from its `%N` placeholders.
    pub fn create_querycondition(
        &self,
        sample_states: SampleStateMask,
        view_states: ViewStateMask,
        instance_states: InstanceStateMask,
        query_expression: &str,
        query_parameters: Vec<String>,
    ) -> Result<Arc<QueryCondition>> {
        if self.inner.is_deleted() {
            return Err(Error::AlreadyDeleted);
        }
        let masks = StateMasks {
            sample: sample_states,
            view: view_states,
            instance: instance_states,
        };
        let condition = QueryCondition::new(
            self.inner.handle(),
            self.inner.source_weak(),
            masks,
            query_expression,
            query_parameters,
        )?;
        self.inner.add_condition(Arc::clone(condition.state()));
        Ok(Arc::new(condition))
    }

    /// # Errors
    ///
    /// `PreconditionNotMet` when the condition was not created by this reader.
    pub fn delete_readcondition(&self, condition: &dyn Condition) -> Result<()> {
        let state = read_condition_state(condition)
            .ok_or_else(|| Error::BadParameter("not a read or query condition".into()))?;
        if state.reader() != self.inner.handle() || !self.inner.remove_condition(state.id()) {
            return Err(Error::PreconditionNotMet(
                "condition does not belong to this reader".into(),
            ));
        }
        Ok(())
    }

    /// Delete every read and query condition of this reader.
    pub fn delete_contained_entities(&self) -> Result<()> {
        self.inner.clear_conditions();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statuses
    // ------------------------------------------------------------------

    pub fn get_subscription_matched_status(&self) -> SubscriptionMatchedStatus {
        self.inner
            .take_status(StatusKind::SubscriptionMatched, |s| {
                s.subscription_matched.clone()
            })
    }

    pub fn get_liveliness_changed_status(&self) -> LivelinessChangedStatus {
        self.inner
            .take_status(StatusKind::LivelinessChanged, |s| s.liveliness_changed.clone())
    }

    pub fn get_sample_lost_status(&self) -> SampleLostStatus {
        self.inner
            .take_status(StatusKind::SampleLost, |s| s.sample_lost.clone())
    }

    pub fn get_sample_rejected_status(&self) -> SampleRejectedStatus {
        self.inner
            .take_status(StatusKind::SampleRejected, |s| s.sample_rejected.clone())
    }

    pub fn get_requested_deadline_missed_status(&self) -> RequestedDeadlineMissedStatus {
        self.inner.take_status(StatusKind::RequestedDeadlineMissed, |s| {
            s.requested_deadline_missed.clone()
        })
    }

    pub fn get_requested_incompatible_qos_status(&self) -> RequestedIncompatibleQosStatus {
        self.inner.take_status(StatusKind::RequestedIncompatibleQos, |s| {
            s.requested_incompatible_qos.clone()
        })
    }

    /// Statuses changed since they were last read.
    pub fn get_status_changes(&self) -> StatusMask {
        self.inner.status_condition.get_active_statuses()
    }

    /// Handles of the writers currently matched.
    pub fn get_matched_publications(&self) -> Vec<InstanceHandle> {
        self.inner.matched_writers()
    }

    pub fn get_matched_publication_data(
        &self,
        handle: InstanceHandle,
    ) -> Result<PublicationBuiltinTopicData> {
        let writer = GUID::from_handle(handle);
        if !self.inner.is_matched_with(&writer) {
            return Err(Error::BadParameter("writer is not matched".into()));
        }
        self.inner
            .participant
            .upgrade()
            .and_then(|p| p.publication_data(&writer))
            .ok_or_else(|| Error::BadParameter("writer is not matched".into()))
    }

    /// Block until at least `count` writers are matched.
    ///
    /// # Errors
    ///
    /// `Timeout` when the count is not reached in time.
    pub fn wait_for_publications(&self, count: u32, timeout: Duration) -> Result<()> {
        self.inner.wait_for_publications(count, timeout)
    }

    /// Block until every announced sample of every reliable matched writer
    /// was received or declared lost.
    pub fn wait_for_historical_data(&self, timeout: Duration) -> Result<()> {
        self.inner.wait_for_historical_data(timeout)
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Install (or clear) the reader listener; replaces any previous one.
    pub fn set_listener(
        &self,
        listener: Option<Arc<dyn DataReaderListener<T>>>,
        mask: StatusMask,
    ) -> Result<()> {
        if self.inner.is_deleted() {
            return Err(Error::AlreadyDeleted);
        }
        self.inner.listener.set(listener, mask);
        Ok(())
    }

    /// Register a closure invoked on every status change of `kind`.
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
