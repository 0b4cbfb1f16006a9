// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! OWNERSHIP and OWNERSHIP_STRENGTH QoS policies (DDS v1.4 Sec.2.2.3.9-10)
//!
//! **Rule:** writer kind must match reader kind exactly.
//!
//! With EXCLUSIVE ownership a reader accepts samples of an instance only from
//! the alive writer with the highest strength.

/// OWNERSHIP kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OwnershipKind {
    /// Every writer may update every instance
    #[default]
    Shared,
    /// Highest-strength writer owns each instance
    Exclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ownership {
    pub kind: OwnershipKind,
}

impl Ownership {
    pub fn shared() -> Self {
        Self {
            kind: OwnershipKind::Shared,
        }
    }

    pub fn exclusive() -> Self {
        Self {
            kind: OwnershipKind::Exclusive,
        }
    }

    pub fn is_exclusive(&self) -> bool {
        self.kind == OwnershipKind::Exclusive
    }

    pub fn is_compatible_with(&self, requested: &Ownership) -> bool {
        self.kind == requested.kind
    }
}

/// OWNERSHIP_STRENGTH: higher wins in EXCLUSIVE mode. Default 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OwnershipStrength {
    pub value: i32,
}

impl OwnershipStrength {
    pub fn new(value: i32) -> Self {
        Self { value }
    }
}
