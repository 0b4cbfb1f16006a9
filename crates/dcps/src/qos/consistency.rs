// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS self-consistency and immutability checks used by `set_qos`.

use super::{History, QoS, LENGTH_UNLIMITED};
use crate::dds::{Error, Result};
use std::time::Duration;

impl QoS {
    /// Check that the policies do not contradict each other.
    ///
    /// # Errors
    ///
    /// `InconsistentPolicy` naming the conflict.
    pub fn validate(&self) -> Result<()> {
        let limits = &self.resource_limits;

        if let History::KeepLast(0) = self.history {
            return Err(Error::InconsistentPolicy(
                "history depth must be at least 1".into(),
            ));
        }

        if limits.max_samples == 0 || limits.max_instances == 0 || limits.max_samples_per_instance == 0 {
            return Err(Error::InconsistentPolicy(
                "resource limits must be positive".into(),
            ));
        }

        if limits.max_samples != LENGTH_UNLIMITED
            && limits.max_samples_per_instance != LENGTH_UNLIMITED
            && limits.max_samples < limits.max_samples_per_instance
        {
            return Err(Error::InconsistentPolicy(format!(
                "max_samples ({}) < max_samples_per_instance ({})",
                limits.max_samples, limits.max_samples_per_instance
            )));
        }

        if let History::KeepLast(depth) = self.history {
            if limits.max_samples_per_instance != LENGTH_UNLIMITED
                && depth as usize > limits.max_samples_per_instance
            {
                return Err(Error::InconsistentPolicy(format!(
                    "history depth ({}) > max_samples_per_instance ({})",
                    depth, limits.max_samples_per_instance
                )));
            }
        }

        if self.liveliness.lease_duration == Duration::ZERO {
            return Err(Error::InconsistentPolicy(
                "liveliness lease must be positive".into(),
            ));
        }

        if self.deadline.period == Duration::ZERO {
            return Err(Error::InconsistentPolicy(
                "deadline period must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Check a change from `self` (current) to `new` on an enabled entity.
    ///
    /// # Errors
    ///
    /// `ImmutablePolicy` if any policy that is fixed once enabled differs.
    pub fn check_mutable_change(&self, new: &QoS) -> Result<()> {
        let immutable_changed = self.durability != new.durability
            || self.reliability != new.reliability
            || self.liveliness != new.liveliness
            || self.history != new.history
            || self.resource_limits != new.resource_limits
            || self.ownership != new.ownership
            || self.destination_order != new.destination_order
            || self.presentation != new.presentation;

        if immutable_changed {
            return Err(Error::ImmutablePolicy);
        }
        Ok(())
    }

    /// Validate and, when `enabled`, check immutability: the full `set_qos` rule.
    pub(crate) fn check_update(&self, new: &QoS, enabled: bool) -> Result<()> {
        new.validate()?;
        if enabled {
            self.check_mutable_change(new)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qos::ResourceLimits;

    #[test]
    fn test_defaults_are_consistent() {
        assert!(QoS::default().validate().is_ok());
        assert!(QoS::reliable().keep_all().validate().is_ok());
    }

    #[test]
    fn test_depth_exceeds_per_instance_limit() {
        let qos = QoS::reliable()
            .keep_last(10)
            .resource_limits(ResourceLimits::new(100, 10, 5));
        assert!(matches!(qos.validate(), Err(Error::InconsistentPolicy(_))));
    }

    #[test]
    fn test_max_samples_below_per_instance() {
        let qos = QoS::default()
            .keep_last(1)
            .resource_limits(ResourceLimits::new(2, 1, 5));
        assert!(matches!(qos.validate(), Err(Error::InconsistentPolicy(_))));
    }

    #[test]
    fn test_zero_depth() {
        assert!(matches!(
            QoS::default().keep_last(0).validate(),
            Err(Error::InconsistentPolicy(_))
        ));
    }

    #[test]
    fn test_single_sample_limits_are_consistent() {
        let qos = QoS::reliable()
            .keep_all()
            .resource_limits(ResourceLimits::new(1, 1, 1));
        assert!(qos.validate().is_ok());
    }

    #[test]
    fn test_immutable_policies() {
        let current = QoS::reliable();
        assert_eq!(
            current.check_mutable_change(&QoS::best_effort()),
            Err(Error::ImmutablePolicy)
        );
        assert_eq!(
            current.check_mutable_change(&current.clone().keep_last(3)),
            Err(Error::ImmutablePolicy)
        );
        assert!(current
            .check_mutable_change(&current.clone().deadline_millis(50).user_data(vec![1]))
            .is_ok());
    }

    #[test]
    fn test_check_update_before_enable_allows_anything_consistent() {
        let current = QoS::reliable();
        assert!(current.check_update(&QoS::best_effort(), false).is_ok());
        assert!(current.check_update(&QoS::best_effort(), true).is_err());
    }
}
