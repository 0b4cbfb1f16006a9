// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global configuration - protocol defaults and runtime overrides.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: compile-time defaults (timers, limits)
//! - **Level 2 (Dynamic)**: `RuntimeConfig`, shared by a factory and every
//!   participant it creates
//!
//! ```ignore
//! use dcps::config::{RuntimeConfig, TimingConfig};
//!
//! let config = RuntimeConfig::new();
//! config.set_timing(TimingConfig {
//!     participant_lease: Duration::from_millis(300),
//!     ..TimingConfig::default()
//! });
//! config.set("app.profile", "sensors");
//! ```

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Maximum domain ID accepted by the factory.
pub const MAX_DOMAIN_ID: u32 = 232;

/// Default period of writer heartbeats (Reliable QoS).
pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_millis(100);

/// Delay before a reader answers a heartbeat with an ACKNACK.
pub const DEFAULT_NACK_RESPONSE_DELAY: Duration = Duration::from_millis(0);

/// Default participant lease announced in discovery.
pub const DEFAULT_PARTICIPANT_LEASE: Duration = Duration::from_secs(10);

/// Default period between participant announcements.
pub const DEFAULT_ANNOUNCEMENT_PERIOD: Duration = Duration::from_secs(1);

/// Resolution of the participant event thread (deadline, liveliness, leases).
pub const EVENT_TICK: Duration = Duration::from_millis(5);

/// Maximum number of gap ranges a reader tracks per matched writer.
pub const MAX_GAP_RANGES: usize = 100;

/// Well-known property keys stored in `RuntimeConfig`.
pub mod keys {
    pub const DEFAULT_TRANSPORT_CONFIG: &str = "transport.default_config";
    pub const QOS_PROFILE_FILE: &str = "qos.profile_file";
    pub const QOS_PROFILE_NAME: &str = "qos.profile_name";
}

/// Protocol timers, swapped atomically as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// Period of writer heartbeats
    pub heartbeat_period: Duration,
    /// Delay before ACKNACK responses
    pub nack_response_delay: Duration,
    /// Lease duration announced by participants
    pub participant_lease: Duration,
    /// Period between participant announcements
    pub announcement_period: Duration,
    /// Event thread resolution
    pub tick: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            heartbeat_period: DEFAULT_HEARTBEAT_PERIOD,
            nack_response_delay: DEFAULT_NACK_RESPONSE_DELAY,
            participant_lease: DEFAULT_PARTICIPANT_LEASE,
            announcement_period: DEFAULT_ANNOUNCEMENT_PERIOD,
            tick: EVENT_TICK,
        }
    }
}

/// Runtime configuration shared between a factory and its participants.
///
/// Cloning is cheap (Arc counters only).
///
/// - Properties: `DashMap` (no global lock)
/// - Timing: `ArcSwap` (atomic replace, lock-free reads)
#[derive(Clone)]
pub struct RuntimeConfig {
    timing: Arc<ArcSwap<TimingConfig>>,
    properties: Arc<DashMap<Arc<str>, Arc<str>>>,
}

impl RuntimeConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            timing: Arc::new(ArcSwap::new(Arc::new(TimingConfig::default()))),
            properties: Arc::new(DashMap::new()),
        }
    }

    /// Replace the protocol timers.
    ///
    /// Participants snapshot timing at creation; already running participants
    /// keep their values.
    pub fn set_timing(&self, timing: TimingConfig) {
        log::debug!("[config] timing updated: {:?}", timing);
        self.timing.store(Arc::new(timing));
    }

    #[must_use]
    pub fn timing(&self) -> TimingConfig {
        **self.timing.load()
    }

    /// Set a property. Empty keys are ignored.
    pub fn set(&self, key: &str, value: &str) {
        if key.trim().is_empty() {
            log::warn!("[config] ignoring property with empty key");
            return;
        }
        self.properties.insert(Arc::from(key), Arc::from(value));
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<str>> {
        self.properties.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, key: &str) -> Option<Arc<str>> {
        self.properties.remove(key).map(|(_, value)| value)
    }

    /// All properties whose key starts with `prefix`, sorted by key.
    #[must_use]
    pub fn search_prefix(&self, prefix: &str) -> Vec<(Arc<str>, Arc<str>)> {
        let mut found: Vec<_> = self
            .properties
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| (Arc::clone(entry.key()), Arc::clone(entry.value())))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        found
    }

    pub fn clear(&self) {
        self.properties.clear();
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}
