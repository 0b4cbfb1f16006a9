// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Core protocol plumbing: GUIDs, the in-process domain bus and discovery.

pub mod discovery;
pub(crate) mod domain;
pub mod guid;

pub use domain::{DropFilter, Submessage, SubmessageKind};
pub use guid::{GuidPrefix, GUID};
