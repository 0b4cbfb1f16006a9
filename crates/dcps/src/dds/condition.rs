// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Conditions: boolean triggers that WaitSets block on.
//!
//! A condition registers a [`WaitsetSignal`] for every WaitSet it is attached
//! to and signals it whenever its trigger value may have become true.

use super::waitset::WaitsetSignal;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Base interface for all conditions.
pub trait Condition: Send + Sync {
    /// Current trigger value.
    fn get_trigger_value(&self) -> bool;

    /// Unique identifier (for comparison).
    fn condition_id(&self) -> u64;

    /// Called by a WaitSet on attach; the condition signals it from now on.
    fn add_waitset_signal(&self, signal: Arc<dyn WaitsetSignal>);

    /// Called by a WaitSet on detach.
    fn remove_waitset_signal(&self, signal_id: u64);

    /// Lets a WaitSet recover the concrete condition type.
    fn as_any(&self) -> &dyn Any;
}

/// Entities that own a [`StatusCondition`].
pub trait HasStatusCondition {
    fn get_status_condition(&self) -> Arc<StatusCondition>;
}

static NEXT_CONDITION_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_condition_id() -> u64 {
    NEXT_CONDITION_ID.fetch_add(1, Ordering::Relaxed)
}

struct WaitsetHook {
    id: u64,
    signal: Weak<dyn WaitsetSignal>,
}

/// Registered waitset signals of one condition.
#[derive(Default)]
pub(crate) struct SignalHooks {
    hooks: Mutex<Vec<WaitsetHook>>,
}

impl SignalHooks {
    fn add(&self, signal: &Arc<dyn WaitsetSignal>) {
        let mut hooks = self.hooks.lock();
        hooks.retain(|hook| hook.signal.strong_count() > 0);
        if hooks.iter().any(|hook| hook.id == signal.id()) {
            return;
        }
        hooks.push(WaitsetHook {
            id: signal.id(),
            signal: Arc::downgrade(signal),
        });
    }

    /// Register `signal`, waking it at once if the condition already holds.
    pub(crate) fn attach(&self, signal: Arc<dyn WaitsetSignal>, triggered: bool) {
        self.add(&signal);
        if triggered {
            signal.signal();
        }
    }

    pub(crate) fn remove(&self, signal_id: u64) {
        self.hooks.lock().retain(|hook| hook.id != signal_id);
    }

    /// Signal every live waitset. The hook list is copied out first so that
    /// waitsets are never signalled with the list locked.
    pub(crate) fn notify(&self) {
        let live: Vec<Arc<dyn WaitsetSignal>> = {
            let mut hooks = self.hooks.lock();
            hooks.retain(|hook| hook.signal.strong_count() > 0);
            hooks.iter().filter_map(|hook| hook.signal.upgrade()).collect()
        };
        for signal in live {
            signal.signal();
        }
    }
}

/// Set of communication statuses, one bit per status kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusMask(u32);

macro_rules! status_bits {
    ($($(#[$doc:meta])* $name:ident = $bit:literal;)*) => {
        impl StatusMask {
            $($(#[$doc])* pub const $name: StatusMask = StatusMask(1 << $bit);)*
        }
    };
}

status_bits! {
    /// Reader: unread samples arrived.
    DATA_AVAILABLE = 0;
    /// Reader: a sample never reached the history.
    SAMPLE_LOST = 1;
    /// Reader: a sample was refused for resource limits.
    SAMPLE_REJECTED = 2;
    /// Reader: a matched writer became alive or not alive.
    LIVELINESS_CHANGED = 3;
    /// Reader: an instance missed its deadline.
    REQUESTED_DEADLINE_MISSED = 4;
    /// Reader: a writer offered incompatible QoS.
    REQUESTED_INCOMPATIBLE_QOS = 5;
    /// Reader: the set of matched writers changed.
    SUBSCRIPTION_MATCHED = 6;
    /// Writer: failed to assert its own liveliness in time.
    LIVELINESS_LOST = 7;
    /// Writer: an instance was not written within its deadline.
    OFFERED_DEADLINE_MISSED = 8;
    /// Writer: a reader requested incompatible QoS.
    OFFERED_INCOMPATIBLE_QOS = 9;
    /// Writer: the set of matched readers changed.
    PUBLICATION_MATCHED = 10;
    /// Subscriber: some reader has data.
    DATA_ON_READERS = 11;
    /// Topic: a remote topic has the same name but another type.
    INCONSISTENT_TOPIC = 12;
}

impl StatusMask {
    pub const NONE: StatusMask = StatusMask(0);
    pub const ALL: StatusMask = StatusMask(u32::MAX);

    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Every status in `other` is also in `self`.
    #[must_use]
    pub const fn contains(&self, other: StatusMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// At least one status is in both.
    #[must_use]
    pub const fn intersects(&self, other: StatusMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for StatusMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for StatusMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Condition triggered by an entity's changed communication statuses.
///
/// Trigger value: any enabled status is active, or the owning entity was
/// deleted.
pub struct StatusCondition {
    id: u64,
    enabled_statuses: AtomicU32,
    active_statuses: AtomicU32,
    deleted: AtomicBool,
    hooks: SignalHooks,
}

impl StatusCondition {
    /// New condition with every status enabled.
    pub fn new() -> Self {
        Self {
            id: next_condition_id(),
            enabled_statuses: AtomicU32::new(StatusMask::ALL.bits()),
            active_statuses: AtomicU32::new(0),
            deleted: AtomicBool::new(false),
            hooks: SignalHooks::default(),
        }
    }

    /// Select which statuses this condition monitors.
    pub fn set_enabled_statuses(&self, mask: StatusMask) {
        self.enabled_statuses.store(mask.bits(), Ordering::Release);
        if self.get_trigger_value() {
            self.hooks.notify();
        }
    }

    pub fn get_enabled_statuses(&self) -> StatusMask {
        StatusMask(self.enabled_statuses.load(Ordering::Acquire))
    }

    /// Statuses changed since the application last read them.
    pub fn get_active_statuses(&self) -> StatusMask {
        StatusMask(self.active_statuses.load(Ordering::Acquire))
    }

    pub(crate) fn activate(&self, mask: StatusMask) {
        self.active_statuses.fetch_or(mask.bits(), Ordering::AcqRel);
        if self.get_enabled_statuses().intersects(mask) {
            self.hooks.notify();
        }
    }

    pub(crate) fn deactivate(&self, mask: StatusMask) {
        self.active_statuses
            .fetch_and(!mask.bits(), Ordering::AcqRel);
    }

    /// Trigger permanently and wake waiters; called when the entity is deleted.
    pub(crate) fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
        self.hooks.notify();
    }
}

impl Condition for StatusCondition {
    fn get_trigger_value(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
            || self.get_enabled_statuses().intersects(self.get_active_statuses())
    }

    fn condition_id(&self) -> u64 {
        self.id
    }

    fn add_waitset_signal(&self, signal: Arc<dyn WaitsetSignal>) {
        log::debug!(
            "[waitset] attach signal id={} to status condition {}",
            signal.id(),
            self.id
        );
        self.hooks.attach(signal, self.get_trigger_value());
    }

    fn remove_waitset_signal(&self, signal_id: u64) {
        self.hooks.remove(signal_id);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Default for StatusCondition {
    fn default() -> Self {
        Self::new()
    }
}

/// Manually toggled condition.
pub struct GuardCondition {
    id: u64,
    trigger_value: AtomicBool,
    hooks: SignalHooks,
}

impl GuardCondition {
    /// New guard condition with trigger value `false`.
    pub fn new() -> Self {
        Self {
            id: next_condition_id(),
            trigger_value: AtomicBool::new(false),
            hooks: SignalHooks::default(),
        }
    }

    /// Set the trigger value; `true` wakes every waiting WaitSet.
    pub fn set_trigger_value(&self, value: bool) {
        self.trigger_value.store(value, Ordering::Release);
        if value {
            self.hooks.notify();
        }
    }
}

impl Condition for GuardCondition {
    fn get_trigger_value(&self) -> bool {
        self.trigger_value.load(Ordering::Acquire)
    }

    fn condition_id(&self) -> u64 {
        self.id
    }

    fn add_waitset_signal(&self, signal: Arc<dyn WaitsetSignal>) {
        self.hooks.attach(signal, self.get_trigger_value());
    }

    fn remove_waitset_signal(&self, signal_id: u64) {
        self.hooks.remove(signal_id);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Default for GuardCondition {
    fn default() -> Self {
        Self::new()
    }
}
