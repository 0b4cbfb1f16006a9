// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # DDS DataWriter
//!
//! The [`DataWriter`] publishes typed data samples to a DDS topic.
//!
//! ## Overview
//!
//! A DataWriter:
//! - Serializes samples and keeps them in a history shaped by History and
//!   ResourceLimits
//! - Manages the register / unregister / dispose lifecycle of instances
//! - Replays its retained history to TransientLocal readers on match
//! - Offers deadline and liveliness guarantees, reported through its statuses
//!
//! ## Example
//!
//! ```ignore
//! let writer = publisher.create_datawriter(&topic, QoS::reliable())?;
//! writer.wait_for_subscriptions(1, Duration::from_secs(1))?;
//!
//! writer.write(&SensorData { id: 1, value: 23.5 })?;
//! writer.wait_for_acknowledgments(Duration::from_secs(1))?;
//! ```
//!
//! ## Reliability
//!
//! With Reliable QoS, the writer:
//! - Follows every DATA with a HEARTBEAT and heartbeats periodically
//! - Retransmits the sequences an ACKNACK reports missing
//! - Answers with GAP for sequences no longer in its history
//!
//! ## See Also
//!
//! - [`DataReader`](crate::DataReader) - The receiving counterpart
//! - [`Publisher`](crate::Publisher) - Coherent sets and suspended publication

mod inner;
mod runtime;
#[cfg(test)]
mod tests;

pub(crate) use inner::{Change, WriterConfig, WriterInner};

pub use runtime::DataWriter;

use super::condition::{HasStatusCondition, StatusCondition};
use super::DDS;
use std::sync::Arc;

impl<T: DDS> HasStatusCondition for DataWriter<T> {
    fn get_status_condition(&self) -> Arc<StatusCondition> {
        Arc::clone(&self.inner.status_condition)
    }
}
