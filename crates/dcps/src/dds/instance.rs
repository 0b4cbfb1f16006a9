// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Instance and entity handles.

use md5::{Digest, Md5};
use std::fmt;

/// Opaque 16-byte identity of an instance (key hash) or an entity (GUID).
///
/// Equality is by value. [`InstanceHandle::NIL`] means "no instance".
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct InstanceHandle(pub [u8; 16]);

/// The nil handle.
pub const HANDLE_NIL: InstanceHandle = InstanceHandle::NIL;

impl InstanceHandle {
    pub const NIL: InstanceHandle = InstanceHandle([0u8; 16]);

    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn is_nil(&self) -> bool {
        self.0 == [0u8; 16]
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Handle of the instance identified by a key hash.
    ///
    /// The key hash is digested again so that an all-zero key (keyless
    /// topics, zero-valued keys) never maps to the nil handle.
    pub fn from_key(key: &[u8; 16]) -> Self {
        let digest = Md5::digest(key);
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            return write!(f, "InstanceHandle(nil)");
        }
        write!(f, "InstanceHandle(")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}
