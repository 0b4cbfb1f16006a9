// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Participant event thread.
//!
//! One thread per enabled participant drains the participant inbox and runs
//! the periodic work (heartbeats, deadline and liveliness checks, lease
//! expiry, announcements) on every tick.
//!
//! ```text
//!   domain bus ──▶ inbox ──┐
//!                          ├─ select! ─▶ ParticipantInner::dispatch / on_tick
//!   tick(EVENT_TICK) ──────┤
//!   stop ──────────────────┘
//! ```

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};

use super::inner::ParticipantInner;
use crate::core::domain::{Envelope, Message};
use crate::dds::{Error, Result};

/// Handle to a running event thread; `stop` joins it.
pub(crate) struct Worker {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn(
        participant: Weak<ParticipantInner>,
        inbox: Receiver<Envelope>,
        tick: Duration,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let thread = thread::Builder::new()
            .name("dcps-events".into())
            .spawn(move || event_loop(participant, inbox, stop_rx, tick))
            .map_err(|e| {
                log::error!("[discovery] failed to spawn event thread: {}", e);
                Error::OutOfResources
            })?;
        Ok(Self {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Signal the thread and wait for it, unless called from the thread
    /// itself (a listener deleting its own participant).
    pub(crate) fn stop(mut self) {
        self.stop.take();
        if let Some(handle) = self.thread.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                log::warn!("[discovery] event thread panicked");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop.take();
    }
}

fn event_loop(
    participant: Weak<ParticipantInner>,
    inbox: Receiver<Envelope>,
    stop: Receiver<()>,
    tick: Duration,
) {
    let ticker = channel::tick(tick);
    log::debug!("[discovery] event thread started (tick={:?})", tick);
    loop {
        crossbeam::select! {
            recv(inbox) -> envelope => {
                let Ok(envelope) = envelope else { break };
                let Some(participant) = participant.upgrade() else { break };
                participant.dispatch(envelope);
            }
            recv(ticker) -> _ => {
                let Some(participant) = participant.upgrade() else { break };
                participant.on_tick(Instant::now());
            }
            recv(stop) -> _ => break,
        }
    }
    log::debug!("[discovery] event thread stopped");
}

impl ParticipantInner {
    /// Dispatch one submessage received from the bus.
    pub(crate) fn dispatch(self: &Arc<Self>, envelope: Envelope) {
        if !self.is_enabled() {
            return;
        }
        let src = envelope.src;
        match envelope.msg {
            Message::Discovery(msg) => self.on_discovery(src, msg),
            Message::Data(msg) => {
                let reader = self.routes.read().get(&msg.reader).cloned();
                if let Some(reader) = reader {
                    reader.on_data(msg);
                }
            }
            Message::Heartbeat(hb) => {
                let reader = self.routes.read().get(&hb.reader).cloned();
                if let Some(reader) = reader {
                    reader.on_heartbeat(&hb);
                }
            }
            Message::Gap(gap) => {
                let reader = self.routes.read().get(&gap.reader).cloned();
                if let Some(reader) = reader {
                    reader.on_gap(&gap);
                }
            }
            Message::AckNack(ack) => {
                let writer = self.writers.read().get(&ack.writer).cloned();
                if let Some(writer) = writer {
                    writer.on_acknack(&ack);
                }
            }
            Message::Liveliness(msg) => {
                {
                    let disc = self.discovery.lock();
                    if disc.is_ignored(&src) || disc.participants.is_lost(&src) {
                        return;
                    }
                }
                let readers = self.readers.read().clone();
                for reader in readers {
                    reader.on_liveliness(msg.writer);
                }
            }
        }
    }

    /// Periodic work of the event thread.
    pub(crate) fn on_tick(&self, now: Instant) {
        if !self.is_enabled() {
            return;
        }
        let writers: Vec<_> = self.writers.read().values().cloned().collect();
        for writer in writers {
            writer.tick(now, self.timing.heartbeat_period);
        }
        let readers = self.readers.read().clone();
        for reader in readers {
            reader.tick(now);
        }
        self.check_leases(now);
    }
}
