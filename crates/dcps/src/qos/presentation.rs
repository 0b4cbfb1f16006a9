// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! PRESENTATION QoS policy (DDS v1.4 Sec.2.2.3.6)
//!
//! Owned by Publishers and Subscribers. **Rule:** the offered access scope
//! must be at least the requested one, and coherent/ordered access must be
//! offered whenever requested.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum PresentationAccessScope {
    #[default]
    Instance,
    Topic,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Presentation {
    pub access_scope: PresentationAccessScope,
    pub coherent_access: bool,
    pub ordered_access: bool,
}

impl Presentation {
    pub fn new(access_scope: PresentationAccessScope, coherent_access: bool, ordered_access: bool) -> Self {
        Self {
            access_scope,
            coherent_access,
            ordered_access,
        }
    }

    pub fn is_compatible_with(&self, requested: &Presentation) -> bool {
        self.access_scope >= requested.access_scope
            && (self.coherent_access || !requested.coherent_access)
            && (self.ordered_access || !requested.ordered_access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_and_flags() {
        let group = Presentation::new(PresentationAccessScope::Group, true, true);
        let topic = Presentation::new(PresentationAccessScope::Topic, true, false);
        assert!(group.is_compatible_with(&topic));
        assert!(!topic.is_compatible_with(&group));
        assert!(!Presentation::default()
            .is_compatible_with(&Presentation::new(PresentationAccessScope::Instance, true, false)));
    }
}
