// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # DDS DataReader
//!
//! The [`DataReader`] receives the samples published on a topic, a
//! content-filtered topic or a multitopic.
//!
//! ## Overview
//!
//! A DataReader:
//! - Keeps one history per instance, shaped by History and ResourceLimits
//! - Tracks sample, view and instance states for every sample
//! - Arbitrates Exclusive ownership and BySourceTimestamp ordering
//! - Supervises the deadline of its instances and the liveliness of its writers
//!
//! ## Example
//!
//! ```ignore
//! let reader = subscriber.create_datareader(&topic, QoS::reliable())?;
//! reader.wait_for_publications(1, Duration::from_secs(1))?;
//!
//! match reader.take(16) {
//!     Ok(samples) => {
//!         for sample in samples.iter().filter(|s| s.info.valid_data) {
//!             println!("{:?}", sample.data);
//!         }
//!     }
//!     Err(Error::NoData) => {}
//!     Err(e) => return Err(e),
//! }
//! ```
//!
//! ## Reliability
//!
//! With Reliable QoS, the reader:
//! - Waits for the first HEARTBEAT to learn the writer's sequence range
//! - Answers every HEARTBEAT with an ACKNACK listing the missing sequences
//! - Counts sequences the writer declares lost (GAP) in SampleLost
//!
//! ## See Also
//!
//! - [`DataWriter`](crate::DataWriter) - The publishing counterpart
//! - [`ReadCondition`](crate::ReadCondition) - Wait for samples in given states

mod decoder;
mod history;
mod inner;
mod runtime;
#[cfg(test)]
mod tests;

pub(crate) use decoder::{FilteredDecoder, MultiDecoder, PlainDecoder, SampleDecoder};
pub(crate) use inner::{Component, ReaderConfig, ReaderEndpoint, ReaderInner, ReaderSource};

pub use history::{InstanceState, Sample, SampleInfo, SampleState, ViewState};
pub use runtime::DataReader;

use super::condition::{HasStatusCondition, StatusCondition};
use super::DDS;
use std::sync::Arc;

impl<T: DDS> HasStatusCondition for DataReader<T> {
    fn get_status_condition(&self) -> Arc<StatusCondition> {
        Arc::clone(&self.inner.status_condition)
    }
}
