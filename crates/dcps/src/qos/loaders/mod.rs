// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS profile loaders.
//!
//! ```rust,ignore
//! use dcps::qos::loaders::YamlLoader;
//!
//! let qos = YamlLoader::load_qos("qos_profiles.yaml", Some("reliable_sensor"))?;
//! ```

pub mod yaml;

pub use yaml::{YamlLoader, YamlQosDocument, YamlQosProfile};
