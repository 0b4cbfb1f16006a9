// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML QoS profile loader.
//!
//! Every profile field is optional and overlays [`QoS::default()`]. Profiles
//! are decoded on demand, so one malformed profile does not prevent loading
//! its siblings.
//!
//! # Example YAML
//!
//! ```yaml
//! default_profile: reliable_sensor
//! profiles:
//!   reliable_sensor:
//!     reliability: RELIABLE
//!     durability: TRANSIENT_LOCAL
//!     history:
//!       kind: KEEP_LAST
//!       depth: 100
//!     deadline:
//!       period_ms: 1000
//!
//!   best_effort_telemetry:
//!     reliability: BEST_EFFORT
//!     liveliness:
//!       kind: AUTOMATIC
//!       lease_duration_ms: 5000
//! ```

use crate::dds::{Error, Result};
use crate::qos::{
    Deadline, DestinationOrder, Durability, GroupData, History, Liveliness, LivelinessKind,
    Ownership, OwnershipStrength, Partition, Presentation, PresentationAccessScope, QoS,
    Reliability, ResourceLimits, TopicData, UserData, LENGTH_UNLIMITED,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// YAML QoS profile loader.
pub struct YamlLoader;

/// Root YAML document: named profiles kept undecoded until requested.
#[derive(Debug, Deserialize)]
pub struct YamlQosDocument {
    #[serde(default)]
    profiles: BTreeMap<String, serde_yaml::Value>,

    /// Profile used when no name is given.
    #[serde(default)]
    pub default_profile: Option<String>,
}

impl YamlQosDocument {
    /// Profile names in lexical order.
    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Decode one profile without converting it.
    pub fn profile(&self, name: &str) -> Result<YamlQosProfile> {
        let raw = self
            .profiles
            .get(name)
            .ok_or_else(|| Error::Config(format!("profile '{}' not found", name)))?;
        serde_yaml::from_value(raw.clone())
            .map_err(|e| Error::Config(format!("profile '{}': {}", name, e)))
    }
}

/// A single QoS profile as written in YAML.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct YamlQosProfile {
    pub reliability: Option<ReliabilityKind>,
    pub max_blocking_time_ms: Option<u64>,
    pub durability: Option<DurabilityKind>,
    pub history: Option<YamlHistory>,
    pub resource_limits: Option<YamlResourceLimits>,
    pub deadline: Option<YamlPeriod>,
    pub liveliness: Option<YamlLiveliness>,
    pub ownership: Option<OwnershipKindYaml>,
    pub ownership_strength: Option<i32>,
    pub destination_order: Option<DestinationOrderYaml>,
    pub presentation: Option<YamlPresentation>,
    pub partition: Option<Vec<String>>,
    pub autoenable_created_entities: Option<bool>,
    pub autodispose_unregistered_instances: Option<bool>,
    pub user_data: Option<String>,
    pub topic_data: Option<String>,
    pub group_data: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReliabilityKind {
    Reliable,
    BestEffort,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DurabilityKind {
    Volatile,
    TransientLocal,
    Transient,
    Persistent,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnershipKindYaml {
    Shared,
    Exclusive,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DestinationOrderYaml {
    ByReceptionTimestamp,
    BySourceTimestamp,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryKind {
    KeepLast,
    KeepAll,
}

#[derive(Debug, Deserialize)]
pub struct YamlHistory {
    pub kind: HistoryKind,
    #[serde(default = "default_history_depth")]
    pub depth: u32,
}

fn default_history_depth() -> u32 {
    1
}

/// Period in milliseconds or seconds; infinite when both are absent.
#[derive(Debug, Deserialize)]
pub struct YamlPeriod {
    #[serde(default)]
    pub period_ms: Option<u64>,
    #[serde(default)]
    pub period_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LivelinessKindYaml {
    Automatic,
    ManualByParticipant,
    ManualByTopic,
}

#[derive(Debug, Deserialize)]
pub struct YamlLiveliness {
    pub kind: LivelinessKindYaml,
    #[serde(default)]
    pub lease_duration_ms: Option<u64>,
    #[serde(default)]
    pub lease_duration_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessScopeYaml {
    #[default]
    Instance,
    Topic,
    Group,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct YamlPresentation {
    pub access_scope: AccessScopeYaml,
    pub coherent_access: bool,
    pub ordered_access: bool,
}

/// Resource limits; a missing or negative value means unlimited.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct YamlResourceLimits {
    pub max_samples: Option<i64>,
    pub max_instances: Option<i64>,
    pub max_samples_per_instance: Option<i64>,
}

fn millis_or_secs(ms: Option<u64>, secs: Option<u64>) -> Duration {
    ms.map(Duration::from_millis)
        .or_else(|| secs.map(Duration::from_secs))
        .unwrap_or(Duration::MAX)
}

fn limit(value: Option<i64>) -> usize {
    match value {
        Some(v) if v >= 0 => v as usize,
        _ => LENGTH_UNLIMITED,
    }
}

impl From<ReliabilityKind> for Reliability {
    fn from(kind: ReliabilityKind) -> Self {
        match kind {
            ReliabilityKind::Reliable => Reliability::Reliable,
            ReliabilityKind::BestEffort => Reliability::BestEffort,
        }
    }
}

impl From<DurabilityKind> for Durability {
    fn from(kind: DurabilityKind) -> Self {
        match kind {
            DurabilityKind::Volatile => Durability::Volatile,
            DurabilityKind::TransientLocal => Durability::TransientLocal,
            DurabilityKind::Transient => Durability::Transient,
            DurabilityKind::Persistent => Durability::Persistent,
        }
    }
}

impl From<&YamlHistory> for History {
    fn from(history: &YamlHistory) -> Self {
        match history.kind {
            HistoryKind::KeepLast => History::KeepLast(history.depth),
            HistoryKind::KeepAll => History::KeepAll,
        }
    }
}

impl From<&YamlLiveliness> for Liveliness {
    fn from(liveliness: &YamlLiveliness) -> Self {
        let kind = match liveliness.kind {
            LivelinessKindYaml::Automatic => LivelinessKind::Automatic,
            LivelinessKindYaml::ManualByParticipant => LivelinessKind::ManualByParticipant,
            LivelinessKindYaml::ManualByTopic => LivelinessKind::ManualByTopic,
        };
        Liveliness::new(
            kind,
            millis_or_secs(liveliness.lease_duration_ms, liveliness.lease_duration_secs),
        )
    }
}

impl From<&YamlPresentation> for Presentation {
    fn from(p: &YamlPresentation) -> Self {
        let scope = match p.access_scope {
            AccessScopeYaml::Instance => PresentationAccessScope::Instance,
            AccessScopeYaml::Topic => PresentationAccessScope::Topic,
            AccessScopeYaml::Group => PresentationAccessScope::Group,
        };
        Presentation::new(scope, p.coherent_access, p.ordered_access)
    }
}

impl YamlQosProfile {
    /// Overlay this profile on `QoS::default()` and validate the result.
    pub fn to_qos(&self) -> Result<QoS> {
        let mut qos = QoS::default();

        if let Some(kind) = self.reliability {
            qos.reliability = kind.into();
        }
        if let Some(ms) = self.max_blocking_time_ms {
            qos.max_blocking_time = Duration::from_millis(ms);
        }
        if let Some(kind) = self.durability {
            qos.durability = kind.into();
        }
        if let Some(history) = &self.history {
            qos.history = history.into();
        }
        if let Some(limits) = &self.resource_limits {
            qos.resource_limits = ResourceLimits::new(
                limit(limits.max_samples),
                limit(limits.max_instances),
                limit(limits.max_samples_per_instance),
            );
        }
        if let Some(deadline) = &self.deadline {
            qos.deadline = Deadline::new(millis_or_secs(deadline.period_ms, deadline.period_secs));
        }
        if let Some(liveliness) = &self.liveliness {
            qos.liveliness = liveliness.into();
        }
        match self.ownership {
            Some(OwnershipKindYaml::Shared) => qos.ownership = Ownership::shared(),
            Some(OwnershipKindYaml::Exclusive) => qos.ownership = Ownership::exclusive(),
            None => {}
        }
        if let Some(strength) = self.ownership_strength {
            qos.ownership_strength = OwnershipStrength::new(strength);
        }
        match self.destination_order {
            Some(DestinationOrderYaml::ByReceptionTimestamp) => {
                qos.destination_order = DestinationOrder::by_reception_timestamp();
            }
            Some(DestinationOrderYaml::BySourceTimestamp) => {
                qos.destination_order = DestinationOrder::by_source_timestamp();
            }
            None => {}
        }
        if let Some(presentation) = &self.presentation {
            qos.presentation = presentation.into();
        }
        if let Some(names) = self.partition.as_ref().filter(|n| !n.is_empty()) {
            qos.partition = Partition::new(names.clone());
        }
        if let Some(autoenable) = self.autoenable_created_entities {
            qos.entity_factory.autoenable_created_entities = autoenable;
        }
        if let Some(autodispose) = self.autodispose_unregistered_instances {
            qos.writer_data_lifecycle.autodispose_unregistered_instances = autodispose;
        }
        if let Some(data) = &self.user_data {
            qos.user_data = UserData::new(data.as_bytes());
        }
        if let Some(data) = &self.topic_data {
            qos.topic_data = TopicData::new(data.as_bytes());
        }
        if let Some(data) = &self.group_data {
            qos.group_data = GroupData::new(data.as_bytes());
        }

        qos.validate()?;
        Ok(qos)
    }
}

impl YamlLoader {
    /// Load `profile` (or the document's default) from a YAML file.
    pub fn load_qos<P: AsRef<Path>>(path: P, profile: Option<&str>) -> Result<QoS> {
        crate::trace_fn!("YamlLoader::load_qos");
        let doc = Self::load_from_file(path)?;
        match profile {
            Some(name) => Self::get_profile(&doc, name),
            None => Self::get_default_profile(&doc),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<YamlQosDocument> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Parse a YAML document; profile bodies are checked when requested.
    pub fn parse(content: &str) -> Result<YamlQosDocument> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse YAML: {}", e)))
    }

    pub fn get_profile(doc: &YamlQosDocument, name: &str) -> Result<QoS> {
        doc.profile(name)?.to_qos()
    }

    /// The named default profile, the only profile, or `QoS::default()`.
    pub fn get_default_profile(doc: &YamlQosDocument) -> Result<QoS> {
        if let Some(name) = &doc.default_profile {
            return Self::get_profile(doc, name);
        }
        let mut names = doc.profile_names();
        match (names.next(), names.next()) {
            (None, _) => Ok(QoS::default()),
            (Some(only), None) => Self::get_profile(doc, only),
            (Some(_), Some(_)) => Err(Error::Config(
                "several profiles and no default_profile".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
default_profile: sensor
profiles:
  sensor:
    reliability: RELIABLE
    durability: TRANSIENT_LOCAL
    history:
      kind: KEEP_LAST
      depth: 5
    deadline:
      period_ms: 250
    liveliness:
      kind: MANUAL_BY_TOPIC
      lease_duration_ms: 500
    partition: ["plant_a"]
    user_data: "line-3"
  bulk:
    history:
      kind: KEEP_ALL
    resource_limits:
      max_samples: 10
      max_samples_per_instance: 10
  typo:
    reliabilty: RELIABLE
"#;

    #[test]
    fn test_default_profile() {
        let doc = YamlLoader::parse(DOC).unwrap();
        let qos = YamlLoader::get_default_profile(&doc).unwrap();
        assert_eq!(qos.reliability, Reliability::Reliable);
        assert_eq!(qos.durability, Durability::TransientLocal);
        assert_eq!(qos.history, History::KeepLast(5));
        assert_eq!(qos.deadline.period, Duration::from_millis(250));
        assert_eq!(qos.liveliness.kind, LivelinessKind::ManualByTopic);
        assert_eq!(qos.liveliness.lease_duration, Duration::from_millis(500));
        assert!(qos.partition.intersects(&Partition::single("plant_a")));
        assert_eq!(qos.user_data.value, b"line-3");
    }

    #[test]
    fn test_unset_fields_keep_defaults() {
        let doc = YamlLoader::parse(DOC).unwrap();
        let qos = YamlLoader::get_profile(&doc, "bulk").unwrap();
        assert_eq!(qos.reliability, QoS::default().reliability);
        assert_eq!(qos.history, History::KeepAll);
        assert_eq!(qos.resource_limits.max_samples, 10);
        assert_eq!(qos.resource_limits.max_instances, LENGTH_UNLIMITED);
    }

    #[test]
    fn test_errors() {
        let doc = YamlLoader::parse(DOC).unwrap();
        assert_eq!(
            doc.profile_names().collect::<Vec<_>>(),
            vec!["bulk", "sensor", "typo"]
        );
        assert!(matches!(
            YamlLoader::get_profile(&doc, "missing"),
            Err(Error::Config(_))
        ));
        // Unknown keys are rejected rather than silently ignored.
        assert!(matches!(
            YamlLoader::get_profile(&doc, "typo"),
            Err(Error::Config(_))
        ));

        let bad = YamlLoader::parse("profiles:\n  p:\n    reliability: SOMETIMES\n").unwrap();
        assert!(matches!(
            YamlLoader::get_profile(&bad, "p"),
            Err(Error::Config(_))
        ));

        assert!(matches!(
            YamlLoader::parse("profiles: [unterminated"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_default_profile_selection() {
        let single = YamlLoader::parse("profiles:\n  only:\n    reliability: BEST_EFFORT\n").unwrap();
        assert_eq!(
            YamlLoader::get_default_profile(&single).unwrap().reliability,
            Reliability::BestEffort
        );

        let empty = YamlLoader::parse("{}").unwrap();
        assert_eq!(YamlLoader::get_default_profile(&empty).unwrap(), QoS::default());

        let ambiguous = YamlLoader::parse(
            "profiles:\n  a:\n    reliability: RELIABLE\n  b:\n    reliability: RELIABLE\n",
        )
        .unwrap();
        assert!(matches!(
            YamlLoader::get_default_profile(&ambiguous),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_inconsistent_profile_rejected() {
        let doc = YamlLoader::parse(
            "profiles:\n  p:\n    history:\n      kind: KEEP_LAST\n      depth: 10\n    resource_limits:\n      max_samples_per_instance: 2\n",
        )
        .unwrap();
        assert!(matches!(
            YamlLoader::get_profile(&doc, "p"),
            Err(Error::InconsistentPolicy(_))
        ));
    }
}
