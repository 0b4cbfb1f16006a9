// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # DDS Domain Participant
//!
//! The [`DomainParticipant`] represents one application's membership in a
//! domain. It is the factory for publishers, subscribers and topics, and it
//! runs the discovery and reliability machinery of everything it contains.
//!
//! ## Overview
//!
//! A participant:
//! - Joins the in-process bus of its domain when enabled
//! - Announces itself and its endpoints, and learns about its peers
//! - Matches local and remote writers/readers by topic, type, QoS and partition
//! - Drives heartbeats, deadline/liveliness checks and lease expiry from one
//!   event thread
//!
//! ## Layout
//!
//! - `inner` - shared state and lifecycle (enable / shutdown)
//! - `discovery` - endpoint registration, announcement handling, matching
//! - `worker` - the event thread and submessage dispatch
//! - `runtime` - the public [`DomainParticipant`] handle
//!
//! ## Locking
//!
//! The discovery lock is taken before the topic table lock and is never held
//! while readers, writers or listeners are called: every match decision is
//! collected and applied once the lock is released.

mod discovery;
mod inner;
mod runtime;
mod worker;

#[cfg(test)]
mod tests;

pub(crate) use inner::{ParticipantConfig, ParticipantInner};
pub use runtime::DomainParticipant;
