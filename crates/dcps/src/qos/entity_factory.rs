// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ENTITY_FACTORY and WRITER_DATA_LIFECYCLE QoS policies.

/// Whether entities created by a factory entity are enabled on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityFactory {
    pub autoenable_created_entities: bool,
}

impl Default for EntityFactory {
    fn default() -> Self {
        Self {
            autoenable_created_entities: true,
        }
    }
}

/// Whether unregistering an instance (or deleting the writer) also disposes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriterDataLifecycle {
    pub autodispose_unregistered_instances: bool,
}

impl Default for WriterDataLifecycle {
    fn default() -> Self {
        Self {
            autodispose_unregistered_instances: true,
        }
    }
}
