// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HISTORY and RESOURCE_LIMITS QoS policies.
//!
//! Neither participates in matching; both shape writer and reader caches.

/// Marker for an unbounded resource limit.
pub const LENGTH_UNLIMITED: usize = usize::MAX;

/// HISTORY kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum History {
    /// Keep the most recent `depth` samples per instance
    KeepLast(u32),
    /// Keep everything, bounded only by `ResourceLimits`
    KeepAll,
}

impl Default for History {
    fn default() -> Self {
        History::KeepLast(100)
    }
}

impl History {
    /// Per-instance depth, `None` for KeepAll.
    pub fn depth(&self) -> Option<usize> {
        match self {
            History::KeepLast(depth) => Some(*depth as usize),
            History::KeepAll => None,
        }
    }
}

/// RESOURCE_LIMITS QoS policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceLimits {
    /// Maximum total samples across all instances
    pub max_samples: usize,
    /// Maximum number of instances
    pub max_instances: usize,
    /// Maximum samples per instance
    pub max_samples_per_instance: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl ResourceLimits {
    pub const fn unlimited() -> Self {
        Self {
            max_samples: LENGTH_UNLIMITED,
            max_instances: LENGTH_UNLIMITED,
            max_samples_per_instance: LENGTH_UNLIMITED,
        }
    }

    pub const fn new(max_samples: usize, max_instances: usize, max_samples_per_instance: usize) -> Self {
        Self {
            max_samples,
            max_instances,
            max_samples_per_instance,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        *self == Self::unlimited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_depth() {
        assert_eq!(History::KeepLast(5).depth(), Some(5));
        assert_eq!(History::KeepAll.depth(), None);
        assert_eq!(History::default(), History::KeepLast(100));
    }

    #[test]
    fn test_resource_limits_default_unlimited() {
        let limits = ResourceLimits::default();
        assert!(limits.is_unlimited());
        assert!(!ResourceLimits::new(1, 1, 1).is_unlimited());
    }
}
