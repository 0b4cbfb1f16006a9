// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DDS wall-clock timestamps.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time {
    pub sec: i64,
    pub nanosec: u32,
}

impl Time {
    pub const ZERO: Time = Time { sec: 0, nanosec: 0 };

    pub const fn new(sec: i64, nanosec: u32) -> Self {
        Self { sec, nanosec }
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => Self::from_duration(elapsed),
            Err(before_epoch) => {
                let d = before_epoch.duration();
                Self {
                    sec: -(d.as_secs() as i64),
                    nanosec: 0,
                }
            }
        }
    }

    pub fn from_duration(d: Duration) -> Self {
        Self {
            sec: d.as_secs() as i64,
            nanosec: d.subsec_nanos(),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::from_duration(Duration::from_millis(ms))
    }

    pub fn as_nanos(&self) -> i128 {
        i128::from(self.sec) * 1_000_000_000 + i128::from(self.nanosec)
    }
}
