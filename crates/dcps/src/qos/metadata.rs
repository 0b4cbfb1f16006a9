// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! USER_DATA, TOPIC_DATA and GROUP_DATA: opaque blobs propagated by discovery.

macro_rules! opaque_policy {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
        pub struct $name {
            pub value: Vec<u8>,
        }

        impl $name {
            pub fn new(value: impl Into<Vec<u8>>) -> Self {
                Self { value: value.into() }
            }

            pub fn is_empty(&self) -> bool {
                self.value.is_empty()
            }
        }
    };
}

opaque_policy!(
    /// Attached to participants, writers and readers.
    UserData
);
opaque_policy!(
    /// Attached to topics.
    TopicData
);
opaque_policy!(
    /// Attached to publishers and subscribers.
    GroupData
);
