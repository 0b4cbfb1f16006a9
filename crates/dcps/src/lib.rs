// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # dcps - an in-process DDS publish/subscribe core
//!
//! The data-centric publish/subscribe layer of the OMG DDS specification:
//! entities, QoS matching, discovery with built-in topics, reliable delivery,
//! deadline/liveliness/ownership enforcement, listeners and WaitSets.
//!
//! Participants created from the same [`DomainParticipantFactory`] on the same
//! domain id exchange RTPS-shaped submessages (DATA, HEARTBEAT, ACKNACK, GAP,
//! liveliness) over an in-process bus and run the real protocol state
//! machines on top of it.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dcps::{DomainParticipantFactory, QoS, Result};
//!
//! fn main() -> Result<()> {
//!     let factory = DomainParticipantFactory::new();
//!     let participant = factory.create_participant(0, QoS::default())?;
//!
//!     let topic = participant.create_topic::<Temperature>("sensors/temperature", QoS::default())?;
//!     let writer = participant
//!         .create_publisher(QoS::default())?
//!         .create_datawriter(&topic, QoS::reliable())?;
//!     let reader = participant
//!         .create_subscriber(QoS::default())?
//!         .create_datareader(&topic, QoS::reliable())?;
//!
//!     writer.write(&Temperature { celsius: 21.5 })?;
//!     for sample in reader.take(10)? {
//!         println!("{:?}", sample.data);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                         Entity facade                               |
//! |  Factory -> Participant -> Publisher/Subscriber -> Writer/Reader    |
//! +---------------------------------------------------------------------+
//! |   Listeners & callbacks | Conditions & WaitSets | Content filters   |
//! +---------------------------------------------------------------------+
//! |   Discovery & matching (leases, built-in topics, QoS compatibility) |
//! +---------------------------------------------------------------------+
//! |   Reliability (history caches, HEARTBEAT / ACKNACK / GAP)           |
//! +---------------------------------------------------------------------+
//! |   Domain bus (crossbeam channels) | Transport registry (config)     |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`dds`] - entity API (start here)
//! - [`qos`] - QoS policies, consistency rules, YAML profiles
//! - [`core`] - GUIDs, discovery messages and the matching engine
//! - [`reliability`] - writer/reader protocol state machines
//! - [`transport`] - transport instance registry
//! - [`config`] - protocol defaults and runtime configuration
//! - [`ser`] - CDR helpers for type support

/// Protocol defaults and runtime configuration.
pub mod config;
/// GUIDs, domain bus and discovery.
pub mod core;
/// DDS entity API.
pub mod dds;
/// Compile-time configurable logging.
pub mod logging;
/// QoS policies.
pub mod qos;
/// Reliable delivery engine.
pub mod reliability;
/// CDR serialization helpers.
pub mod ser;
/// Transport instance registry.
pub mod transport;

pub use config::{RuntimeConfig, TimingConfig};
pub use dds::{
    Condition, ContentFilteredTopic, DataReader, DataReaderListener, DataWriter,
    DataWriterListener, DomainParticipant, DomainParticipantFactory, DomainParticipantListener,
    Error, FieldValue, FilterError, GuardCondition, HasStatusCondition, InstanceHandle,
    MultiTopic, Publisher, PublisherListener, QueryCondition, ReadCondition, Result,
    ReturnCode, Sample, SampleInfo, StatusCondition, StatusKind, StatusMask, Subscriber,
    SubscriberListener, Time, Topic, TopicListener, WaitSet, DDS,
};
pub use qos::QoS;
pub use transport::{TransportConfig, TransportInst, TransportRegistry};

/// Content filter expression parser and evaluator.
pub use dds::filter;

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
