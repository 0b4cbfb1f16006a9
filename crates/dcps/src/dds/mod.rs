// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DDS public API - entities, conditions, listeners and return codes.
//!
//! Every entity operation returns [`Result`]. Protocol-level conditions (lost
//! samples, missed deadlines, incompatible QoS discovered after the fact) are
//! never returned as errors; they are surfaced through entity statuses,
//! listeners and `StatusCondition`s.

pub mod builtin;
pub mod condition;
pub mod content_filtered_topic;
pub mod factory;
pub mod filter;
pub mod instance;
pub mod listener;
pub mod multi_topic;
pub mod participant;
pub mod publisher;
pub mod read_condition;
pub mod reader;
pub mod status;
pub mod subscriber;
pub mod time;
pub mod topic;
pub mod waitset;
pub mod writer;

pub use builtin::{
    ParticipantBuiltinTopicData, PublicationBuiltinTopicData, SubscriptionBuiltinTopicData,
    TopicBuiltinTopicData, BUILTIN_PARTICIPANT_TOPIC, BUILTIN_PUBLICATION_TOPIC,
    BUILTIN_SUBSCRIPTION_TOPIC, BUILTIN_TOPIC_TOPIC,
};
pub use condition::{Condition, GuardCondition, HasStatusCondition, StatusCondition, StatusMask};
pub use content_filtered_topic::ContentFilteredTopic;
pub use factory::DomainParticipantFactory;
pub use filter::{ContentFilter, FieldValue, FilterError};
pub use instance::InstanceHandle;
pub use listener::{
    CallbackId, DataReaderListener, DataWriterListener, DomainParticipantListener,
    PublisherListener, StatusEvent, SubscriberListener, TopicListener,
};
pub use multi_topic::{MultiTopic, MultiTopicSample};
pub use participant::DomainParticipant;
pub use publisher::Publisher;
pub use read_condition::{
    InstanceStateMask, QueryCondition, ReadCondition, SampleStateMask, ViewStateMask,
};
pub use reader::{DataReader, InstanceState, Sample, SampleInfo, SampleState, ViewState};
pub use status::{
    InconsistentTopicStatus, LivelinessChangedStatus, LivelinessLostStatus,
    OfferedDeadlineMissedStatus, OfferedIncompatibleQosStatus, PublicationMatchedStatus,
    QosPolicyCount, RequestedDeadlineMissedStatus, RequestedIncompatibleQosStatus,
    SampleLostStatus, SampleRejectedReason, SampleRejectedStatus, StatusKind,
    SubscriptionMatchedStatus,
};
pub use subscriber::Subscriber;
pub use time::Time;
pub use topic::{Topic, TopicDescription, TopicDescriptionKind};
pub use waitset::WaitSet;
pub use writer::DataWriter;

/// DDS return codes.
///
/// `Ok` is represented by `Result::Ok`; every other code maps to an [`Error`]
/// variant through [`Error::return_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ReturnCode {
    Ok = 0,
    Error = 1,
    Unsupported = 2,
    BadParameter = 3,
    PreconditionNotMet = 4,
    OutOfResources = 5,
    NotEnabled = 6,
    ImmutablePolicy = 7,
    InconsistentPolicy = 8,
    AlreadyDeleted = 9,
    Timeout = 10,
    NoData = 11,
    IllegalOperation = 12,
}

/// Public error type returned by every fallible DDS operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Generic
    /// Malformed input (mismatched parameter counts, unparsable expressions).
    Error(String),
    /// Operation not supported by this implementation.
    Unsupported,

    // Caller mistakes
    /// Invalid argument (empty names, missing out-parameters, unknown handles).
    BadParameter(String),
    /// Operation requires state that is not present.
    PreconditionNotMet(String),
    /// Operation not allowed in the current calling context.
    IllegalOperation(String),

    // QoS
    /// Attempt to change a policy that is immutable once the entity is enabled.
    ImmutablePolicy,
    /// QoS policies contradict each other.
    InconsistentPolicy(String),

    // Lifecycle
    /// Entity has not been enabled yet.
    NotEnabled,
    /// Entity was deleted.
    AlreadyDeleted,

    // Resource
    /// History or instance limits exhausted.
    OutOfResources,
    /// A bounded wait expired.
    Timeout,
    /// Nothing to read or take.
    NoData,

    // Ambient
    /// Type support failed to encode or decode a sample.
    Serialization(String),
    /// Configuration could not be loaded or applied.
    Config(String),
}

impl Error {
    /// Numeric DDS return code for this error.
    pub fn return_code(&self) -> ReturnCode {
        match self {
            Error::Error(_) | Error::Serialization(_) | Error::Config(_) => ReturnCode::Error,
            Error::Unsupported => ReturnCode::Unsupported,
            Error::BadParameter(_) => ReturnCode::BadParameter,
            Error::PreconditionNotMet(_) => ReturnCode::PreconditionNotMet,
            Error::IllegalOperation(_) => ReturnCode::IllegalOperation,
            Error::ImmutablePolicy => ReturnCode::ImmutablePolicy,
            Error::InconsistentPolicy(_) => ReturnCode::InconsistentPolicy,
            Error::NotEnabled => ReturnCode::NotEnabled,
            Error::AlreadyDeleted => ReturnCode::AlreadyDeleted,
            Error::OutOfResources => ReturnCode::OutOfResources,
            Error::Timeout => ReturnCode::Timeout,
            Error::NoData => ReturnCode::NoData,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Error(msg) => write!(f, "Error: {}", msg),
            Error::Unsupported => write!(f, "Unsupported operation"),
            Error::BadParameter(msg) => write!(f, "Bad parameter: {}", msg),
            Error::PreconditionNotMet(msg) => write!(f, "Precondition not met: {}", msg),
            Error::IllegalOperation(msg) => write!(f, "Illegal operation: {}", msg),
            Error::ImmutablePolicy => write!(f, "Immutable QoS policy cannot change once enabled"),
            Error::InconsistentPolicy(msg) => write!(f, "Inconsistent QoS policy: {}", msg),
            Error::NotEnabled => write!(f, "Entity not enabled"),
            Error::AlreadyDeleted => write!(f, "Entity already deleted"),
            Error::OutOfResources => write!(f, "Out of resources"),
            Error::Timeout => write!(f, "Timeout"),
            Error::NoData => write!(f, "No data"),
            Error::Serialization(msg) => write!(f, "Serialization failed: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<FilterError> for Error {
    fn from(err: FilterError) -> Self {
        Error::Error(err.to_string())
    }
}

impl From<crate::ser::SerError> for Error {
    fn from(err: crate::ser::SerError) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Convenient alias for API results using the public `Error` type.
pub type Result<T> = core::result::Result<T, Error>;

/// DDS trait: type support contract (encode, decode, key extraction).
///
/// The core treats implementors as opaque: it never looks inside a sample
/// except through these methods.
pub trait DDS: Sized + Clone + Send + Sync + 'static {
    /// Registered type name, compared during matching.
    fn type_name() -> &'static str;

    /// Encode to a CDR2 LE buffer.
    ///
    /// # Errors
    ///
    /// Returns `Err` if encoding fails.
    fn encode_cdr2(&self, buf: &mut Vec<u8>) -> Result<()>;

    /// Decode from a CDR2 LE buffer.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the buffer is truncated or contains invalid data.
    fn decode_cdr2(buf: &[u8]) -> Result<Self>;

    /// Whether the type declares key fields.
    ///
    /// Unkeyed types have a single instance per topic.
    fn has_key() -> bool {
        false
    }

    /// Compute the 16-byte key hash of this sample.
    ///
    /// Keyed types override this, usually by serializing their key fields
    /// and passing the bytes through [`crate::ser::key_hash`].
    fn compute_key(&self) -> [u8; 16] {
        [0u8; 16]
    }

    /// Extract field values for content filtering.
    ///
    /// Returns an empty map by default. Types opt in to ContentFilteredTopic,
    /// QueryCondition and MultiTopic predicates by listing their fields here;
    /// nested members use dotted names (`position.x`).
    ///
    /// ```ignore
    /// fn get_fields(&self) -> HashMap<String, FieldValue> {
    ///     let mut fields = HashMap::new();
    ///     fields.insert("temperature".to_string(), FieldValue::from_f64(self.temperature));
    ///     fields
    /// }
    /// ```
    fn get_fields(&self) -> std::collections::HashMap<String, FieldValue> {
        std::collections::HashMap::new()
    }
}
