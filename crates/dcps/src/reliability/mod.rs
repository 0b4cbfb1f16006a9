// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reliable delivery protocol.
//!
//! Heartbeat/ACKNACK/GAP exchange between a writer and each matched reader:
//!
//! ```text
//!   WriterEngine                         WriterProxy (reader side)
//!   ------------                         -------------------------
//!   DATA(seq) ------------------------->  GapTracker::on_receive
//!   HEARTBEAT(first,last) ------------->  on_heartbeat
//!            <--------------------------  ACKNACK(base, missing)
//!   DATA(retransmit) / GAP ------------>  on_data / on_gap
//! ```
//!
//! The writer's [`WriterHistory`] bounds retransmission and replay for
//! durable late joiners.

mod gap_tracker;
mod history_cache;
mod messages;
mod reader;
mod writer;

pub use gap_tracker::{GapTracker, Progress};
pub use history_cache::{CacheEntry, InsertOutcome, InstanceRecord, WriterHistory};
pub use messages::{AckNackMsg, ChangeKind, DataMsg, GapMsg, HeartbeatMsg, LivelinessMsg};
pub use reader::WriterProxy;
pub use writer::{ReaderProxy, WriterEngine};
