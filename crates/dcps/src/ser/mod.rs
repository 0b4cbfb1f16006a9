// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CDR2 serialization helpers for type support and built-in topic payloads.

pub mod cursor;

pub use cursor::{CdrReader, CdrWriter, Primitive};

use md5::{Digest, Md5};
use std::fmt;

/// Serialization error used within `ser`.
#[derive(Debug, Clone)]
pub enum SerError {
    WriteFailed { offset: usize, reason: String },
    ReadFailed { offset: usize, reason: String },
    InvalidData { reason: String },
}

impl fmt::Display for SerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerError::WriteFailed { offset, reason } => {
                write!(f, "write failed at offset {}: {}", offset, reason)
            }
            SerError::ReadFailed { offset, reason } => {
                write!(f, "read failed at offset {}: {}", offset, reason)
            }
            SerError::InvalidData { reason } => write!(f, "invalid data: {}", reason),
        }
    }
}

impl std::error::Error for SerError {}

pub type SerResult<T> = core::result::Result<T, SerError>;

/// Compute an RTPS key hash from the serialized key fields.
///
/// Keys that fit in 16 bytes are zero-padded; longer keys are MD5-hashed.
pub fn key_hash(serialized_key: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    if serialized_key.len() <= 16 {
        out[..serialized_key.len()].copy_from_slice(serialized_key);
    } else {
        let digest = Md5::digest(serialized_key);
        out.copy_from_slice(&digest);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ser_error_display_variants() {
        let err = SerError::WriteFailed {
            offset: 12,
            reason: "buffer too small".into(),
        };
        assert_eq!(err.to_string(), "write failed at offset 12: buffer too small");

        let err = SerError::ReadFailed {
            offset: 4,
            reason: "unexpected end of buffer".into(),
        };
        assert_eq!(err.to_string(), "read failed at offset 4: unexpected end of buffer");
    }

    #[test]
    fn test_ser_error_into_api_error() {
        let api_err: crate::dds::Error = SerError::InvalidData {
            reason: "bad payload".into(),
        }
        .into();
        assert!(matches!(api_err, crate::dds::Error::Serialization(_)));
    }

    #[test]
    fn test_short_key_is_padded() {
        let hash = key_hash(&7u32.to_be_bytes());
        assert_eq!(&hash[..4], &[0, 0, 0, 7]);
        assert!(hash[4..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_long_key_is_hashed() {
        let long = [0xAAu8; 40];
        let a = key_hash(&long);
        let b = key_hash(&long);
        assert_eq!(a, b);
        assert_ne!(a, [0xAA; 16]);
    }
}
