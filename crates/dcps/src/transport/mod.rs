// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport configuration registry.
//!
//! Transport instances and configurations are named configuration records
//! owned by a [`TransportRegistry`]. Configurations are bound to a domain id
//! or to a single entity; entities resolve their configuration when enabled.
//! The data plane itself is the in-process domain bus.
//!
//! # Example
//!
//! ```ignore
//! let registry = factory.transport_registry();
//! let udp = registry.create_inst("udp0", TransportKind::Udp)?;
//! udp.set_options(TransportOptions::Udp(UdpOptions { send_buffer_size: 1 << 20, ..Default::default() }))?;
//!
//! let config = registry.create_config("low_latency")?;
//! config.add_instance("udp0");
//! registry.bind_config_to_domain("low_latency", 7)?;
//! ```

/// Typed per-kind transport options.
pub mod options;
/// Named instance and configuration registry.
pub mod registry;

pub use options::{
    MulticastOptions, RtpsUdpOptions, ShmemOptions, TcpOptions, TransportKind, TransportOptions,
    UdpOptions,
};
pub use registry::{TransportConfig, TransportInst, TransportRegistry};
