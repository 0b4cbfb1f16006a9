// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Domain participant factory.
//!
//! The factory is an explicit context object: it owns one in-process bus per
//! domain id, the transport registry and the runtime configuration. Two
//! participants talk to each other only when they come from the same factory
//! and share a domain id. Dropping the last factory handle shuts it down.
//!
//! ```ignore
//! let factory = DomainParticipantFactory::new();
//! let a = factory.create_participant(0, QoS::default())?;
//! let b = factory.create_participant(0, QoS::default())?;
//! // ... a and b discover each other ...
//! factory.shutdown();
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, RwLock};

use crate::config::{keys, RuntimeConfig, MAX_DOMAIN_ID};
use crate::core::domain::{set_drop_rule, Domain, DropFilter, SharedDropRule};
use crate::core::guid::generate_prefix;
use crate::dds::participant::{DomainParticipant, ParticipantConfig, ParticipantInner};
use crate::dds::{Error, Result};
use crate::qos::QoS;
use crate::transport::TransportRegistry;

pub(crate) struct FactoryInner {
    qos: RwLock<QoS>,
    default_participant_qos: RwLock<QoS>,
    participants: Mutex<Vec<Arc<ParticipantInner>>>,
    domains: Mutex<HashMap<u32, Arc<Domain>>>,
    pub(crate) transports: TransportRegistry,
    config: RuntimeConfig,
    drop_rule: SharedDropRule,
    shut_down: AtomicBool,
}

impl FactoryInner {
    fn domain(&self, domain_id: u32) -> Arc<Domain> {
        let mut domains = self.domains.lock();
        Arc::clone(domains.entry(domain_id).or_insert_with(|| {
            log::debug!("[domain] bus {} created", domain_id);
            Arc::new(Domain::new(domain_id, Arc::clone(&self.drop_rule)))
        }))
    }

    /// Apply `transport.default_config` once the named config exists.
    fn apply_default_transport(&self) {
        if self.transports.global_config().is_some() {
            return;
        }
        if let Some(name) = self.config.get(keys::DEFAULT_TRANSPORT_CONFIG) {
            if let Err(e) = self.transports.set_global_config(&name) {
                log::warn!("[transport] default config '{}' not applied: {}", name, e);
            }
        }
    }

    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let participants = std::mem::take(&mut *self.participants.lock());
        for participant in &participants {
            participant.delete_children();
            participant.shutdown();
        }
        self.domains.lock().clear();
        log::info!(
            "[factory] shut down ({} participants deleted)",
            participants.len()
        );
    }
}

impl Drop for FactoryInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Creates and tracks [`DomainParticipant`]s.
///
/// Cloning is cheap; clones share the same buses and registries.
#[derive(Clone)]
pub struct DomainParticipantFactory {
    inner: Arc<FactoryInner>,
}

impl std::fmt::Debug for DomainParticipantFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainParticipantFactory")
            .field("participants", &self.inner.participants.lock().len())
            .field("shut_down", &self.inner.shut_down.load(Ordering::Acquire))
            .finish()
    }
}

impl Default for DomainParticipantFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainParticipantFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(RuntimeConfig::new(), QoS::default())
    }

    /// Build a factory around an existing configuration.
    ///
    /// With the `qos-loaders` feature, `qos.profile_file` (and optionally
    /// `qos.profile_name`) select the default participant QoS.
    ///
    /// # Errors
    ///
    /// `Config` when the configured profile cannot be loaded.
    pub fn with_config(config: RuntimeConfig) -> Result<Self> {
        let default_qos = Self::configured_qos(&config)?;
        Ok(Self::from_config(config, default_qos))
    }

    #[cfg(feature = "qos-loaders")]
    fn configured_qos(config: &RuntimeConfig) -> Result<QoS> {
        match config.get(keys::QOS_PROFILE_FILE) {
            Some(path) => {
                let profile = config.get(keys::QOS_PROFILE_NAME);
                let qos = crate::qos::loaders::YamlLoader::load_qos(&*path, profile.as_deref())?;
                log::info!("[config] default participant QoS loaded from {}", path);
                Ok(qos)
            }
            None => Ok(QoS::default()),
        }
    }

    #[cfg(not(feature = "qos-loaders"))]
    fn configured_qos(config: &RuntimeConfig) -> Result<QoS> {
        if config.get(keys::QOS_PROFILE_FILE).is_some() {
            log::warn!("[config] qos.profile_file ignored (qos-loaders feature disabled)");
        }
        Ok(QoS::default())
    }

    fn from_config(config: RuntimeConfig, default_participant_qos: QoS) -> Self {
        Self {
            inner: Arc::new(FactoryInner {
                qos: RwLock::new(QoS::default()),
                default_participant_qos: RwLock::new(default_participant_qos),
                participants: Mutex::new(Vec::new()),
                domains: Mutex::new(HashMap::new()),
                transports: TransportRegistry::new(),
                config,
                drop_rule: Arc::new(ArcSwapOption::empty()),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Create a participant on `domain_id`.
    ///
    /// The participant is enabled right away when the factory's
    /// EntityFactory QoS says so; otherwise call
    /// [`DomainParticipant::enable`].
    ///
    /// # Errors
    ///
    /// - `BadParameter` when `domain_id` exceeds [`MAX_DOMAIN_ID`]
    /// - `InconsistentPolicy` for contradicting QoS
    /// - `PreconditionNotMet` after [`shutdown`](Self::shutdown)
    pub fn create_participant(&self, domain_id: u32, qos: QoS) -> Result<DomainParticipant> {
        crate::trace_fn!("DomainParticipantFactory::create_participant");
        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(Error::PreconditionNotMet("factory is shut down".into()));
        }
        if domain_id > MAX_DOMAIN_ID {
            return Err(Error::BadParameter(format!(
                "domain id {} exceeds {}",
                domain_id, MAX_DOMAIN_ID
            )));
        }
        qos.validate()?;
        self.inner.apply_default_transport();

        let participant = ParticipantInner::new(ParticipantConfig {
            prefix: generate_prefix(domain_id),
            qos,
            factory: Arc::downgrade(&self.inner),
            domain: self.inner.domain(domain_id),
            timing: self.inner.config.timing(),
        });
        self.inner.participants.lock().push(Arc::clone(&participant));

        if self.inner.qos.read().entity_factory.autoenable_created_entities {
            if let Err(e) = participant.enable() {
                self.inner
                    .participants
                    .lock()
                    .retain(|p| !Arc::ptr_eq(p, &participant));
                participant.shutdown();
                return Err(e);
            }
        }
        log::info!(
            "[factory] participant {} created on domain {}",
            participant.guid,
            domain_id
        );
        Ok(DomainParticipant::from_inner(participant))
    }

    pub fn create_participant_with_default_qos(&self, domain_id: u32) -> Result<DomainParticipant> {
        self.create_participant(domain_id, self.get_default_participant_qos())
    }

    /// Delete `participant`, stopping its event thread.
    ///
    /// # Errors
    ///
    /// - `PreconditionNotMet` while it still owns publishers, subscribers or
    ///   topics, or when it belongs to another factory
    pub fn delete_participant(&self, participant: &DomainParticipant) -> Result<()> {
        let removed = {
            let mut participants = self.inner.participants.lock();
            let index = participants
                .iter()
                .position(|p| Arc::ptr_eq(p, &participant.inner))
                .ok_or_else(|| {
                    Error::PreconditionNotMet("participant belongs to another factory".into())
                })?;
            if participants[index].has_children() {
                return Err(Error::PreconditionNotMet(
                    "participant still has contained entities".into(),
                ));
            }
            participants.remove(index)
        };
        removed.shutdown();
        Ok(())
    }

    /// Any live participant on `domain_id`.
    pub fn lookup_participant(&self, domain_id: u32) -> Option<DomainParticipant> {
        self.inner
            .participants
            .lock()
            .iter()
            .find(|p| p.domain_id() == domain_id)
            .map(|p| DomainParticipant::from_inner(Arc::clone(p)))
    }

    pub fn get_default_participant_qos(&self) -> QoS {
        self.inner.default_participant_qos.read().clone()
    }

    pub fn set_default_participant_qos(&self, qos: QoS) -> Result<()> {
        qos.validate()?;
        *self.inner.default_participant_qos.write() = qos;
        Ok(())
    }

    /// Factory QoS; only EntityFactory is meaningful.
    pub fn get_qos(&self) -> QoS {
        self.inner.qos.read().clone()
    }

    pub fn set_qos(&self, qos: QoS) -> Result<()> {
        qos.validate()?;
        *self.inner.qos.write() = qos;
        Ok(())
    }

    /// Delete every participant with its contents and join every event
    /// thread. Later `create_participant` calls fail.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    pub fn transport_registry(&self) -> &TransportRegistry {
        &self.inner.transports
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Drop every bus submessage for which `filter` returns true. `None`
    /// removes the filter. Meant for fault-injection tests.
    pub fn set_drop_filter(&self, filter: Option<DropFilter>) {
        set_drop_rule(&self.inner.drop_rule, filter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_id_out_of_range() {
        let factory = DomainParticipantFactory::new();
        assert!(matches!(
            factory.create_participant(MAX_DOMAIN_ID + 1, QoS::default()),
            Err(Error::BadParameter(_))
        ));
    }

    #[test]
    fn test_lookup_and_delete() {
        let factory = DomainParticipantFactory::new();
        let participant = factory
            .create_participant(7, QoS::default())
            .expect("participant");
        let found = factory.lookup_participant(7).expect("lookup");
        assert_eq!(found.get_instance_handle(), participant.get_instance_handle());
        assert!(factory.lookup_participant(8).is_none());

        factory.delete_participant(&participant).expect("delete");
        assert!(factory.lookup_participant(7).is_none());
        assert!(matches!(
            factory.delete_participant(&participant),
            Err(Error::PreconditionNotMet(_))
        ));
    }

    #[test]
    fn test_delete_with_children_fails() {
        let factory = DomainParticipantFactory::new();
        let participant = factory
            .create_participant(0, QoS::default())
            .expect("participant");
        let _publisher = participant
            .create_publisher(QoS::default())
            .expect("publisher");
        assert!(matches!(
            factory.delete_participant(&participant),
            Err(Error::PreconditionNotMet(_))
        ));
        participant.delete_contained_entities().expect("clear");
        factory.delete_participant(&participant).expect("delete");
    }

    #[test]
    fn test_autoenable_off() {
        let factory = DomainParticipantFactory::new();
        factory
            .set_qos(QoS::default().autoenable(false))
            .expect("factory qos");
        let participant = factory
            .create_participant(0, QoS::default())
            .expect("participant");
        assert!(!participant.is_enabled());
        participant.enable().expect("enable");
        assert!(participant.is_enabled());
    }

    #[test]
    fn test_shutdown_rejects_new_participants() {
        let factory = DomainParticipantFactory::new();
        let participant = factory
            .create_participant(0, QoS::default())
            .expect("participant");
        factory.shutdown();
        assert!(matches!(
            participant.create_publisher(QoS::default()),
            Err(Error::AlreadyDeleted)
        ));
        assert!(matches!(
            factory.create_participant(0, QoS::default()),
            Err(Error::PreconditionNotMet(_))
        ));
    }

    #[test]
    fn test_default_transport_from_config() {
        let config = RuntimeConfig::new();
        config.set(keys::DEFAULT_TRANSPORT_CONFIG, "shared");
        let factory = DomainParticipantFactory::with_config(config).expect("factory");
        factory
            .transport_registry()
            .create_config("shared")
            .expect("config");
        let _participant = factory
            .create_participant(0, QoS::default())
            .expect("participant");
        let global = factory.transport_registry().global_config().expect("global");
        assert_eq!(global.name(), "shared");
    }
}
