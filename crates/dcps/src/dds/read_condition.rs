// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reader-owned conditions over sample, view and instance states.
//!
//! Both conditions are created by a DataReader and trigger while the reader
//! holds at least one sample matching their state masks (and, for a
//! QueryCondition, the query predicate). Deleting the reader makes them
//! trigger permanently.

use super::condition::{next_condition_id, Condition, SignalHooks};
use super::filter::{ContentFilter, FieldValue};
use super::instance::InstanceHandle;
use super::waitset::WaitsetSignal;
use super::{Error, Result};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

macro_rules! state_mask {
    (
        $(#[$meta:meta])*
        $mask:ident { $($(#[$doc:meta])* $name:ident = $bit:literal,)* }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $mask(u32);

        impl $mask {
            $($(#[$doc])* pub const $name: $mask = $mask(1 << $bit);)*

            /// Every state of this kind.
            pub const ANY: $mask = $mask(0 $(| 1 << $bit)*);

            pub const fn bits(&self) -> u32 {
                self.0
            }

            /// Every state in `other` is also in `self`.
            pub const fn contains(&self, other: $mask) -> bool {
                self.0 & other.0 == other.0
            }
        }

        impl std::ops::BitOr for $mask {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }
    };
}

state_mask! {
    /// Whether a sample was already returned by a read.
    SampleStateMask {
        READ = 0,
        NOT_READ = 1,
    }
}

state_mask! {
    /// Whether the instance is new to this reader.
    ViewStateMask {
        /// Not accessed since the instance was (re)born.
        NEW = 0,
        NOT_NEW = 1,
    }
}

state_mask! {
    /// Lifecycle state of the sample's instance.
    InstanceStateMask {
        /// At least one live writer.
        ALIVE = 0,
        NOT_ALIVE_DISPOSED = 1,
        /// Every writer unregistered or went away.
        NOT_ALIVE_NO_WRITERS = 2,
    }
}

impl InstanceStateMask {
    /// Disposed or without writers.
    pub const NOT_ALIVE: InstanceStateMask =
        InstanceStateMask(Self::NOT_ALIVE_DISPOSED.0 | Self::NOT_ALIVE_NO_WRITERS.0);
}

/// The three state masks a read operation selects on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StateMasks {
    pub sample: SampleStateMask,
    pub view: ViewStateMask,
    pub instance: InstanceStateMask,
}

impl StateMasks {
    pub(crate) const ANY: StateMasks = StateMasks {
        sample: SampleStateMask::ANY,
        view: ViewStateMask::ANY,
        instance: InstanceStateMask::ANY,
    };

    pub(crate) const NOT_READ: StateMasks = StateMasks {
        sample: SampleStateMask::NOT_READ,
        view: ViewStateMask::ANY,
        instance: InstanceStateMask::ANY,
    };
}

/// Sample store a read condition evaluates against (the owning reader).
pub(crate) trait SampleSource: Send + Sync {
    /// Whether any stored sample matches the masks and, when given, the
    /// predicate over its fields.
    fn has_matching(&self, masks: &StateMasks, query: Option<&SampleQuery>) -> bool;
}

/// Predicate part of a QueryCondition.
#[derive(Debug, Clone)]
pub(crate) struct SampleQuery {
    filter: ContentFilter,
}

impl SampleQuery {
    pub(crate) fn new(filter: ContentFilter) -> Self {
        Self { filter }
    }

    pub(crate) fn accepts(&self, fields: &HashMap<String, FieldValue>) -> bool {
        self.filter.accepts(fields)
    }
}

/// State shared between a read/query condition and its reader.
pub(crate) struct ReadConditionState {
    id: u64,
    reader: InstanceHandle,
    masks: StateMasks,
    query: Option<SampleQuery>,
    source: Weak<dyn SampleSource>,
    deleted: AtomicBool,
    hooks: SignalHooks,
}

impl ReadConditionState {
    fn new(
        reader: InstanceHandle,
        source: Weak<dyn SampleSource>,
        masks: StateMasks,
        query: Option<SampleQuery>,
    ) -> Self {
        Self {
            id: next_condition_id(),
            reader,
            masks,
            query,
            source,
            deleted: AtomicBool::new(false),
            hooks: SignalHooks::default(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn reader(&self) -> InstanceHandle {
        self.reader
    }

    pub(crate) fn masks(&self) -> StateMasks {
        self.masks
    }

    pub(crate) fn query(&self) -> Option<&SampleQuery> {
        self.query.as_ref()
    }

    fn trigger(&self) -> bool {
        if self.deleted.load(Ordering::Acquire) {
            return true;
        }
        match self.source.upgrade() {
            Some(source) => source.has_matching(&self.masks, self.query.as_ref()),
            None => true,
        }
    }

    /// Wake attached waitsets; they re-evaluate the trigger themselves.
    pub(crate) fn notify(&self) {
        self.hooks.notify();
    }

    pub(crate) fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
        self.hooks.notify();
    }

    pub(crate) fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    fn add_signal(&self, signal: Arc<dyn WaitsetSignal>) {
        self.hooks.attach(signal, self.trigger());
    }
}

/// ReadCondition - triggers while the reader holds samples in the given states.
pub struct ReadCondition {
    state: Arc<ReadConditionState>,
}

impl ReadCondition {
    pub(crate) fn new(
        reader: InstanceHandle,
        source: Weak<dyn SampleSource>,
        sample_states: SampleStateMask,
        view_states: ViewStateMask,
        instance_states: InstanceStateMask,
    ) -> Self {
        let masks = StateMasks {
            sample: sample_states,
            view: view_states,
            instance: instance_states,
        };
        Self {
            state: Arc::new(ReadConditionState::new(reader, source, masks, None)),
        }
    }

    pub fn get_sample_state_mask(&self) -> SampleStateMask {
        self.state.masks.sample
    }

    pub fn get_view_state_mask(&self) -> ViewStateMask {
        self.state.masks.view
    }

    pub fn get_instance_state_mask(&self) -> InstanceStateMask {
        self.state.masks.instance
    }

    /// Handle of the reader that created this condition.
    pub fn get_datareader_handle(&self) -> InstanceHandle {
        self.state.reader
    }

    pub(crate) fn state(&self) -> &Arc<ReadConditionState> {
        &self.state
    }
}

/// QueryCondition - a ReadCondition with an additional predicate over sample
/// fields, using the content filter grammar and `%N` parameters.
pub struct QueryCondition {
    state: Arc<ReadConditionState>,
    expression: String,
}

impl QueryCondition {
    /// Parse `query_expression` and bind `parameters`.
    ///
    /// # Errors
    ///
    /// `Error::Error` when the expression is malformed or the number of
    /// parameters differs from the placeholders it references.
    pub(crate) fn new(
        reader: InstanceHandle,
        source: Weak<dyn SampleSource>,
        masks: StateMasks,
        query_expression: &str,
        parameters: Vec<String>,
    ) -> Result<Self> {
        let filter = ContentFilter::with_parameters(query_expression, parameters)?;
        let query = SampleQuery::new(filter);
        Ok(Self {
            state: Arc::new(ReadConditionState::new(reader, source, masks, Some(query))),
            expression: query_expression.to_string(),
        })
    }

    pub fn get_query_expression(&self) -> &str {
        &self.expression
    }

    pub fn get_query_parameters(&self) -> Vec<String> {
        match &self.state.query {
            Some(query) => query.filter.parameters(),
            None => Vec::new(),
        }
    }

    /// Replace the query parameters; the count must match the expression.
    pub fn set_query_parameters(&self, parameters: Vec<String>) -> Result<()> {
        let query = self
            .state
            .query
            .as_ref()
            .ok_or_else(|| Error::PreconditionNotMet("condition has no query".into()))?;
        query.filter.set_parameters(parameters)?;
        self.state.notify();
        Ok(())
    }

    pub fn get_sample_state_mask(&self) -> SampleStateMask {
        self.state.masks.sample
    }

    pub fn get_view_state_mask(&self) -> ViewStateMask {
        self.state.masks.view
    }

    pub fn get_instance_state_mask(&self) -> InstanceStateMask {
        self.state.masks.instance
    }

    pub fn get_datareader_handle(&self) -> InstanceHandle {
        self.state.reader
    }

    pub(crate) fn state(&self) -> &Arc<ReadConditionState> {
        &self.state
    }
}

macro_rules! state_condition {
    ($($ty:ty),*) => {$(
        impl Condition for $ty {
            fn get_trigger_value(&self) -> bool {
                self.state.trigger()
            }

            fn condition_id(&self) -> u64 {
                self.state.id
            }

            fn add_waitset_signal(&self, signal: Arc<dyn WaitsetSignal>) {
                self.state.add_signal(signal);
            }

            fn remove_waitset_signal(&self, signal_id: u64) {
                self.state.hooks.remove(signal_id);
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    )*};
}

state_condition!(ReadCondition, QueryCondition);

/// Resolve the shared state of a read or query condition passed as a
/// generic condition.
pub(crate) fn read_condition_state(condition: &dyn Condition) -> Option<Arc<ReadConditionState>> {
    let any = condition.as_any();
    if let Some(rc) = any.downcast_ref::<ReadCondition>() {
        return Some(Arc::clone(&rc.state));
    }
    any.downcast_ref::<QueryCondition>()
        .map(|qc| Arc::clone(&qc.state))
}
