// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Quality of Service policies.
//!
//! Each policy lives in its own module with its request/offered (RxO)
//! compatibility rule. [`QoS`] aggregates them into one value record with a
//! builder API; [`loaders`] reads named profiles from YAML.

mod consistency;
pub mod deadline;
pub mod destination_order;
pub mod entity_factory;
pub mod history;
pub mod liveliness;
#[cfg(feature = "qos-loaders")]
pub mod loaders;
pub mod metadata;
pub mod ownership;
pub mod partition;
pub mod policy_id;
pub mod presentation;
pub mod profile;
pub mod reliability;

pub use deadline::{Deadline, INFINITE};
pub use destination_order::{DestinationOrder, DestinationOrderKind};
pub use entity_factory::{EntityFactory, WriterDataLifecycle};
pub use history::{History, ResourceLimits, LENGTH_UNLIMITED};
pub use liveliness::{Liveliness, LivelinessKind};
pub use metadata::{GroupData, TopicData, UserData};
pub use ownership::{Ownership, OwnershipKind, OwnershipStrength};
pub use partition::Partition;
pub use policy_id::QosPolicyId;
pub use presentation::{Presentation, PresentationAccessScope};
pub use profile::QoS;
pub use reliability::{Durability, Reliability};
