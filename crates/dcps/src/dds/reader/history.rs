// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-instance sample store of a DataReader.
//!
//! # Layout
//!
//! ```text
//! instances: BTreeMap<InstanceHandle, ReaderInstance>
//!   ReaderInstance { state, view, writers, owner, samples: [S(order=3), S(order=7)] }
//! ```
//!
//! Every stored sample gets a reader-wide `order`; `read`/`take` return
//! samples in that (reception) order across instances. Instance state
//! changes (dispose, loss of every writer) append a marker sample without
//! data, which does not count toward resource limits.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::time::{Duration, Instant};

use crate::core::guid::GUID;
use crate::dds::instance::InstanceHandle;
use crate::dds::read_condition::{
    InstanceStateMask, SampleQuery, SampleStateMask, StateMasks, ViewStateMask,
};
use crate::dds::status::SampleRejectedReason;
use crate::dds::{Time, DDS};
use crate::qos::{History, ResourceLimits};
use crate::reliability::ChangeKind;

/// Whether the application already accessed a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleState {
    Read,
    NotRead,
}

/// Whether the instance was accessed since it was (re)born.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    New,
    NotNew,
}

/// Lifecycle state of an instance as seen by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Alive,
    NotAliveDisposed,
    NotAliveNoWriters,
}

impl SampleState {
    fn mask(self) -> SampleStateMask {
        match self {
            SampleState::Read => SampleStateMask::READ,
            SampleState::NotRead => SampleStateMask::NOT_READ,
        }
    }
}

impl ViewState {
    fn mask(self) -> ViewStateMask {
        match self {
            ViewState::New => ViewStateMask::NEW,
            ViewState::NotNew => ViewStateMask::NOT_NEW,
        }
    }
}

impl InstanceState {
    fn mask(self) -> InstanceStateMask {
        match self {
            InstanceState::Alive => InstanceStateMask::ALIVE,
            InstanceState::NotAliveDisposed => InstanceStateMask::NOT_ALIVE_DISPOSED,
            InstanceState::NotAliveNoWriters => InstanceStateMask::NOT_ALIVE_NO_WRITERS,
        }
    }

    pub fn is_alive(self) -> bool {
        self == InstanceState::Alive
    }
}

/// Metadata delivered with every sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleInfo {
    pub sample_state: SampleState,
    pub view_state: ViewState,
    pub instance_state: InstanceState,
    pub source_timestamp: Time,
    pub reception_timestamp: Time,
    pub instance_handle: InstanceHandle,
    /// Handle of the writer that produced the sample.
    pub publication_handle: InstanceHandle,
    /// `false` for samples that only report an instance state change.
    pub valid_data: bool,
}

/// A sample returned by `read`/`take`; `data` is `None` when
/// `info.valid_data` is `false`.
#[derive(Debug, Clone)]
pub struct Sample<T> {
    pub data: Option<T>,
    pub info: SampleInfo,
}

#[derive(Debug)]
struct StoredSample<T> {
    order: u64,
    data: Option<T>,
    sample_state: SampleState,
    source_timestamp: Time,
    reception_timestamp: Time,
    publication_handle: InstanceHandle,
}

#[derive(Debug)]
struct ReaderInstance<T> {
    state: InstanceState,
    view: ViewState,
    samples: VecDeque<StoredSample<T>>,
    /// Writers that wrote or registered the instance and did not unregister.
    writers: BTreeSet<GUID>,
    /// Exclusive ownership: current owner and its strength.
    owner: Option<(GUID, i32)>,
    last_source_timestamp: Option<Time>,
    deadline_due: Option<Instant>,
    /// Last valid sample, used by `get_key_value`.
    key_holder: Option<T>,
}

impl<T> ReaderInstance<T> {
    fn new() -> Self {
        Self {
            state: InstanceState::Alive,
            view: ViewState::New,
            samples: VecDeque::new(),
            writers: BTreeSet::new(),
            owner: None,
            last_source_timestamp: None,
            deadline_due: None,
            key_holder: None,
        }
    }

    fn valid_count(&self) -> usize {
        self.samples.iter().filter(|s| s.data.is_some()).count()
    }
}

/// Which instances a read operation looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InstanceSelector {
    All,
    Instance(InstanceHandle),
    /// The first instance after the handle (nil = from the start) that holds
    /// a matching sample.
    After(InstanceHandle),
}

/// Result of offering a valid sample to the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StoreOutcome {
    Stored(InstanceHandle),
    Rejected(SampleRejectedReason, InstanceHandle),
}

pub(crate) struct ReaderHistory<T> {
    instances: BTreeMap<InstanceHandle, ReaderInstance<T>>,
    history: History,
    limits: ResourceLimits,
    total_valid: usize,
    next_order: u64,
}

impl<T: DDS> ReaderHistory<T> {
    pub(crate) fn new(history: History, limits: ResourceLimits) -> Self {
        Self {
            instances: BTreeMap::new(),
            history,
            limits,
            total_valid: 0,
            next_order: 1,
        }
    }

    fn next_order(&mut self) -> u64 {
        let order = self.next_order;
        self.next_order += 1;
        order
    }

    /// Number of valid samples held.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.total_valid
    }

    pub(crate) fn contains(&self, handle: &InstanceHandle) -> bool {
        self.instances.contains_key(handle)
    }

    #[cfg(test)]
    fn instance_state(&self, handle: &InstanceHandle) -> Option<InstanceState> {
        self.instances.get(handle).map(|i| i.state)
    }

    pub(crate) fn key_value(&self, handle: &InstanceHandle) -> Option<T> {
        self.instances.get(handle).and_then(|i| i.key_holder.clone())
    }

    /// Exclusive ownership arbitration for a sample of `key` from `writer`.
    ///
    /// The owner keeps the instance unless a stronger writer (or an equally
    /// strong one with a lower GUID) writes; the winner becomes the owner.
    pub(crate) fn claim_ownership(&mut self, key: &[u8; 16], writer: GUID, strength: i32) -> bool {
        let handle = InstanceHandle::from_key(key);
        let Some(instance) = self.instances.get_mut(&handle) else {
            return true;
        };
        let wins = match instance.owner {
            None => true,
            Some((owner, _)) if owner == writer => true,
            Some((owner, owner_strength)) => {
                strength > owner_strength || (strength == owner_strength && writer < owner)
            }
        };
        if wins {
            instance.owner = Some((writer, strength));
        }
        wins
    }

    /// Forget `writer` as owner of every instance (liveliness lost, unmatched).
    pub(crate) fn release_ownership(&mut self, writer: &GUID) {
        for instance in self.instances.values_mut() {
            if matches!(instance.owner, Some((owner, _)) if owner == *writer) {
                instance.owner = None;
            }
        }
    }

    /// BySourceTimestamp: whether `source_timestamp` is older than the last
    /// accepted change of the instance.
    pub(crate) fn is_superseded(&self, key: &[u8; 16], source_timestamp: Time) -> bool {
        self.instances
            .get(&InstanceHandle::from_key(key))
            .and_then(|i| i.last_source_timestamp)
            .is_some_and(|last| source_timestamp < last)
    }

    /// Store a valid sample, enforcing History and ResourceLimits.
    ///
    /// Checks run in the order max_instances, max_samples_per_instance
    /// (KeepAll; KeepLast evicts the oldest sample of the instance),
    /// max_samples. `strength` is set for exclusive-ownership readers; the
    /// writer then owns a new instance.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn store(
        &mut self,
        key: [u8; 16],
        data: T,
        writer: GUID,
        strength: Option<i32>,
        source_timestamp: Time,
        reception_timestamp: Time,
        deadline: Option<Duration>,
    ) -> StoreOutcome {
        let handle = InstanceHandle::from_key(&key);
        let exists = self.instances.contains_key(&handle);
        if !exists && self.instances.len() >= self.limits.max_instances {
            return StoreOutcome::Rejected(SampleRejectedReason::RejectedByInstancesLimit, handle);
        }

        let per_instance = self.instances.get(&handle).map_or(0, |i| i.valid_count());
        let mut evict = false;
        match self.history {
            History::KeepAll => {
                if per_instance >= self.limits.max_samples_per_instance {
                    return StoreOutcome::Rejected(
                        SampleRejectedReason::RejectedBySamplesPerInstanceLimit,
                        handle,
                    );
                }
            }
            History::KeepLast(depth) => {
                let depth = (depth as usize).min(self.limits.max_samples_per_instance);
                evict = per_instance >= depth;
            }
        }
        if !evict && self.total_valid >= self.limits.max_samples {
            return StoreOutcome::Rejected(SampleRejectedReason::RejectedBySamplesLimit, handle);
        }

        let order = self.next_order();
        let instance = self
            .instances
            .entry(handle)
            .or_insert_with(ReaderInstance::new);
        if evict {
            if let Some(pos) = instance.samples.iter().position(|s| s.data.is_some()) {
                instance.samples.remove(pos);
                self.total_valid -= 1;
            }
        }
        if !instance.state.is_alive() {
            instance.state = InstanceState::Alive;
            instance.view = ViewState::New;
        }
        instance.writers.insert(writer);
        if let (Some(strength), None) = (strength, instance.owner) {
            instance.owner = Some((writer, strength));
        }
        instance.last_source_timestamp = Some(
            instance
                .last_source_timestamp
                .map_or(source_timestamp, |last| last.max(source_timestamp)),
        );
        if let Some(period) = deadline {
            instance.deadline_due = Instant::now().checked_add(period);
        }
        instance.key_holder = Some(data.clone());
        instance.samples.push_back(StoredSample {
            order,
            data: Some(data),
            sample_state: SampleState::NotRead,
            source_timestamp,
            reception_timestamp,
            publication_handle: writer.to_handle(),
        });
        self.total_valid += 1;
        StoreOutcome::Stored(handle)
    }

    /// Apply a dispose and/or unregister; returns `true` when the instance
    /// state changed (a marker sample was added).
    pub(crate) fn apply_lifecycle(
        &mut self,
        key: [u8; 16],
        kind: ChangeKind,
        writer: GUID,
        source_timestamp: Time,
        reception_timestamp: Time,
    ) -> bool {
        let handle = InstanceHandle::from_key(&key);
        if !self.instances.contains_key(&handle) {
            if !kind.is_dispose() || self.instances.len() >= self.limits.max_instances {
                return false;
            }
            self.instances.insert(handle, ReaderInstance::new());
        }
        let order = self.next_order();
        let Some(instance) = self.instances.get_mut(&handle) else {
            return false;
        };
        instance.last_source_timestamp = Some(
            instance
                .last_source_timestamp
                .map_or(source_timestamp, |last| last.max(source_timestamp)),
        );
        if kind.is_unregister() {
            instance.writers.remove(&writer);
            if matches!(instance.owner, Some((owner, _)) if owner == writer) {
                instance.owner = None;
            }
        }
        let next = if kind.is_dispose() {
            InstanceState::NotAliveDisposed
        } else if instance.writers.is_empty() && instance.state.is_alive() {
            InstanceState::NotAliveNoWriters
        } else {
            instance.state
        };
        if next == instance.state {
            return false;
        }
        instance.state = next;
        instance.deadline_due = None;
        instance.samples.push_back(StoredSample {
            order,
            data: None,
            sample_state: SampleState::NotRead,
            source_timestamp,
            reception_timestamp,
            publication_handle: writer.to_handle(),
        });
        true
    }

    /// A matched writer went away: instances it alone kept alive become
    /// NotAliveNoWriters. Returns `true` when any instance changed.
    pub(crate) fn remove_writer(&mut self, writer: &GUID) -> bool {
        let now = Time::now();
        let mut changed = Vec::new();
        for (handle, instance) in &mut self.instances {
            if matches!(instance.owner, Some((owner, _)) if owner == *writer) {
                instance.owner = None;
            }
            if instance.writers.remove(writer)
                && instance.writers.is_empty()
                && instance.state.is_alive()
            {
                changed.push(*handle);
            }
        }
        for handle in &changed {
            let order = self.next_order();
            if let Some(instance) = self.instances.get_mut(handle) {
                instance.state = InstanceState::NotAliveNoWriters;
                instance.deadline_due = None;
                instance.samples.push_back(StoredSample {
                    order,
                    data: None,
                    sample_state: SampleState::NotRead,
                    source_timestamp: now,
                    reception_timestamp: now,
                    publication_handle: writer.to_handle(),
                });
            }
        }
        !changed.is_empty()
    }

    /// Alive instances whose deadline elapsed; their timer restarts.
    pub(crate) fn missed_deadlines(&mut self, now: Instant, period: Duration) -> Vec<InstanceHandle> {
        let mut missed = Vec::new();
        for (handle, instance) in &mut self.instances {
            if !instance.state.is_alive() {
                continue;
            }
            if let Some(due) = instance.deadline_due {
                if now >= due {
                    instance.deadline_due = now.checked_add(period);
                    missed.push(*handle);
                }
            }
        }
        missed
    }

    fn sample_matches(
        instance: &ReaderInstance<T>,
        sample: &StoredSample<T>,
        masks: &StateMasks,
        query: Option<&SampleQuery>,
    ) -> bool {
        if !masks.sample.contains(sample.sample_state.mask())
            || !masks.view.contains(instance.view.mask())
            || !masks.instance.contains(instance.state.mask())
        {
            return false;
        }
        match query {
            None => true,
            Some(query) => sample
                .data
                .as_ref()
                .is_some_and(|data| query.accepts(&data.get_fields())),
        }
    }

    /// Whether any sample matches the masks and query.
    pub(crate) fn has_matching(&self, masks: &StateMasks, query: Option<&SampleQuery>) -> bool {
        self.instances.values().any(|instance| {
            instance
                .samples
                .iter()
                .any(|s| Self::sample_matches(instance, s, masks, query))
        })
    }

    fn resolve_selector(
        &self,
        selector: InstanceSelector,
        masks: &StateMasks,
        query: Option<&SampleQuery>,
    ) -> Vec<InstanceHandle> {
        match selector {
            InstanceSelector::All => self.instances.keys().copied().collect(),
            InstanceSelector::Instance(handle) => {
                if self.instances.contains_key(&handle) {
                    vec![handle]
                } else {
                    Vec::new()
                }
            }
            InstanceSelector::After(handle) => {
                use std::ops::Bound::{Excluded, Unbounded};
                let lower = if handle.is_nil() {
                    Unbounded
                } else {
                    Excluded(handle)
                };
                self.instances
                    .range((lower, Unbounded))
                    .find(|(_, instance)| {
                        instance
                            .samples
                            .iter()
                            .any(|s| Self::sample_matches(instance, s, masks, query))
                    })
                    .map(|(handle, _)| vec![*handle])
                    .unwrap_or_default()
            }
        }
    }

    /// Collect up to `max` matching samples in reception order; `take`
    /// removes them. Instances touched become NotNew.
    pub(crate) fn collect(
        &mut self,
        max: usize,
        masks: &StateMasks,
        selector: InstanceSelector,
        query: Option<&SampleQuery>,
        take: bool,
    ) -> Vec<Sample<T>> {
        let handles = self.resolve_selector(selector, masks, query);

        let mut picked: Vec<(u64, InstanceHandle)> = Vec::new();
        for handle in &handles {
            if let Some(instance) = self.instances.get(handle) {
                picked.extend(
                    instance
                        .samples
                        .iter()
                        .filter(|s| Self::sample_matches(instance, s, masks, query))
                        .map(|s| (s.order, *handle)),
                );
            }
        }
        picked.sort_unstable_by_key(|(order, _)| *order);
        picked.truncate(max);
        if picked.is_empty() {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(picked.len());
        for (order, handle) in &picked {
            let Some(instance) = self.instances.get(handle) else {
                continue;
            };
            if let Some(sample) = instance.samples.iter().find(|s| s.order == *order) {
                out.push(Sample {
                    data: sample.data.clone(),
                    info: SampleInfo {
                        sample_state: sample.sample_state,
                        view_state: instance.view,
                        instance_state: instance.state,
                        source_timestamp: sample.source_timestamp,
                        reception_timestamp: sample.reception_timestamp,
                        instance_handle: *handle,
                        publication_handle: sample.publication_handle,
                        valid_data: sample.data.is_some(),
                    },
                });
            }
        }

        let orders: HashSet<u64> = picked.iter().map(|(order, _)| *order).collect();
        let touched: BTreeSet<InstanceHandle> = picked.iter().map(|(_, h)| *h).collect();
        for handle in touched {
            let Some(instance) = self.instances.get_mut(&handle) else {
                continue;
            };
            instance.view = ViewState::NotNew;
            if take {
                let before = instance.valid_count();
                instance.samples.retain(|s| !orders.contains(&s.order));
                self.total_valid -= before - instance.valid_count();
                if instance.samples.is_empty() && !instance.state.is_alive() {
                    self.instances.remove(&handle);
                }
            } else {
                for sample in instance.samples.iter_mut() {
                    if orders.contains(&sample.order) {
                        sample.sample_state = SampleState::Read;
                    }
                }
            }
        }
        out
    }

    /// Handles of every instance currently held.
    pub(crate) fn handles(&self) -> Vec<InstanceHandle> {
        self.instances.keys().copied().collect()
    }
}
