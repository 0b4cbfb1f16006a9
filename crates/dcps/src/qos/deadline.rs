// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DEADLINE QoS policy (DDS v1.4 Sec.2.2.3.7)
//!
//! Specifies the expected sample publication/reception rate. If no sample is
//! written/received for an instance within the period, a deadline missed
//! status fires for that instance.
//!
//! # QoS Compatibility (Request vs Offered)
//!
//! **Rule:** writer period <= reader period
//!
//! - Writer offers 100ms, reader requests 200ms -> Compatible \[OK\]
//! - Writer offers 200ms, reader requests 100ms -> Incompatible \[X\]

use std::time::Duration;

/// Marker for "no deadline" / "no lease".
pub const INFINITE: Duration = Duration::MAX;

/// DEADLINE QoS policy. Default: infinite (no enforcement).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Deadline {
    /// Maximum time between samples of one instance
    pub period: Duration,
}

impl Default for Deadline {
    fn default() -> Self {
        Self { period: INFINITE }
    }
}

impl Deadline {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn infinite() -> Self {
        Self::default()
    }

    pub fn is_infinite(&self) -> bool {
        self.period == INFINITE
    }

    /// Offered (self) vs requested compatibility.
    pub fn is_compatible_with(&self, requested: &Deadline) -> bool {
        self.period <= requested.period
    }
}
