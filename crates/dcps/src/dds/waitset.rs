// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WaitSet - blocking wait for Condition triggers.
//!
//! Attached conditions hold a [`WaitsetSignal`] pointing back at the waitset.
//! Every signal bumps a generation counter under the waitset lock; a waiter
//! only sleeps if the generation it observed before evaluating the conditions
//! is still current, so a trigger that lands between evaluation and sleep is
//! never lost.

use super::condition::{Condition, HasStatusCondition};
use super::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wake-up handle a condition holds for each waitset it is attached to.
pub trait WaitsetSignal: Send + Sync {
    /// Notify the waitset that a condition may have become true.
    fn signal(&self);

    /// Stable identifier of the waitset.
    fn id(&self) -> u64;
}

static NEXT_WAITSET_ID: AtomicU64 = AtomicU64::new(1);

struct WaitState {
    conditions: Vec<Arc<dyn Condition>>,
    generation: u64,
}

struct WaitSetInner {
    id: u64,
    state: Mutex<WaitState>,
    wakeup: Condvar,
}

impl WaitsetSignal for WaitSetInner {
    fn signal(&self) {
        let mut state = self.state.lock();
        state.generation = state.generation.wrapping_add(1);
        self.wakeup.notify_all();
    }

    fn id(&self) -> u64 {
        self.id
    }
}

/// Blocks until at least one attached condition is triggered.
pub struct WaitSet {
    inner: Arc<WaitSetInner>,
}

impl WaitSet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(WaitSetInner {
                id: NEXT_WAITSET_ID.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(WaitState {
                    conditions: Vec::new(),
                    generation: 0,
                }),
                wakeup: Condvar::new(),
            }),
        }
    }

    fn signal_handle(&self) -> Arc<dyn WaitsetSignal> {
        Arc::clone(&self.inner) as Arc<dyn WaitsetSignal>
    }

    /// Attach a condition. Attaching an already attached condition is a no-op.
    pub fn attach_condition(&self, condition: Arc<dyn Condition>) -> Result<()> {
        let condition_id = condition.condition_id();
        {
            let mut state = self.inner.state.lock();
            if state
                .conditions
                .iter()
                .any(|c| c.condition_id() == condition_id)
            {
                return Ok(());
            }
            state.conditions.push(Arc::clone(&condition));
        }

        // Registered with the waitset lock released: an already triggered
        // condition signals immediately.
        condition.add_waitset_signal(self.signal_handle());
        log::debug!(
            "[waitset] {} attached condition {}",
            self.inner.id,
            condition_id
        );
        Ok(())
    }

    /// Attach an entity's StatusCondition.
    pub fn attach<E: HasStatusCondition>(&self, entity: &E) -> Result<()> {
        self.attach_condition(entity.get_status_condition())
    }

    /// Detach a condition.
    ///
    /// # Errors
    ///
    /// `PreconditionNotMet` if the condition is not attached.
    pub fn detach_condition(&self, condition: Arc<dyn Condition>) -> Result<()> {
        let condition_id = condition.condition_id();
        {
            let mut state = self.inner.state.lock();
            let pos = state
                .conditions
                .iter()
                .position(|c| c.condition_id() == condition_id)
                .ok_or_else(|| {
                    Error::PreconditionNotMet(format!(
                        "condition {} is not attached",
                        condition_id
                    ))
                })?;
            state.conditions.remove(pos);
        }
        condition.remove_waitset_signal(self.inner.id);
        Ok(())
    }

    #[must_use]
    pub fn get_conditions(&self) -> Vec<Arc<dyn Condition>> {
        self.inner.state.lock().conditions.clone()
    }

    /// Fill `out` with the attached conditions.
    ///
    /// # Errors
    ///
    /// `BadParameter` if `out` is `None`.
    pub fn get_conditions_into(&self, out: Option<&mut Vec<Arc<dyn Condition>>>) -> Result<()> {
        let out = out.ok_or_else(|| Error::BadParameter("conditions sequence is null".into()))?;
        out.clear();
        out.extend(self.get_conditions());
        Ok(())
    }

    /// Wait until at least one condition triggers; returns the triggered ones.
    ///
    /// `None` waits forever.
    ///
    /// # Errors
    ///
    /// `Timeout` if nothing triggered within `timeout`.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<Vec<Arc<dyn Condition>>> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let forever = timeout.is_none() || deadline.is_none();

        loop {
            let (conditions, generation) = {
                let state = self.inner.state.lock();
                (state.conditions.clone(), state.generation)
            };

            let triggered: Vec<_> = conditions
                .into_iter()
                .filter(|c| c.get_trigger_value())
                .collect();
            if !triggered.is_empty() {
                log::debug!(
                    "[waitset] {} wait returning {} condition(s)",
                    self.inner.id,
                    triggered.len()
                );
                return Ok(triggered);
            }

            let mut state = self.inner.state.lock();
            if state.generation != generation {
                continue;
            }
            if forever {
                self.inner.wakeup.wait(&mut state);
            } else if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(Error::Timeout);
                }
                // Spurious or timed-out wakeups re-evaluate; expiry is checked above.
                let _ = self.inner.wakeup.wait_until(&mut state, deadline);
            }
        }
    }

    /// Like [`wait`](Self::wait), filling `out` with the triggered conditions.
    ///
    /// # Errors
    ///
    /// `BadParameter` if `out` is `None`; `Timeout` (with `out` emptied) on expiry.
    pub fn wait_into(
        &self,
        out: Option<&mut Vec<Arc<dyn Condition>>>,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let out = out.ok_or_else(|| Error::BadParameter("conditions sequence is null".into()))?;
        out.clear();
        let triggered = self.wait(timeout)?;
        out.extend(triggered);
        Ok(())
    }
}

impl Default for WaitSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WaitSet {
    fn drop(&mut self) {
        let conditions = std::mem::take(&mut self.inner.state.lock().conditions);
        for condition in conditions {
            condition.remove_waitset_signal(self.inner.id);
        }
    }
}

#[cfg(test)]
mod tests;
