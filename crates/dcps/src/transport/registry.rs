// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use parking_lot::RwLock;

use super::options::{TransportKind, TransportOptions};
use crate::dds::{Error, InstanceHandle, Result};

/// Time a passive side waits for a connection by default.
const DEFAULT_PASSIVE_CONNECT_DURATION: Duration = Duration::from_secs(60);

fn check_name(what: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::BadParameter(format!("{} name must not be empty", what)));
    }
    Ok(())
}

/// A named transport instance and its typed options.
#[derive(Debug)]
pub struct TransportInst {
    name: String,
    kind: TransportKind,
    options: RwLock<TransportOptions>,
}

impl TransportInst {
    fn new(name: &str, kind: TransportKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            options: RwLock::new(TransportOptions::defaults_for(kind)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn options(&self) -> TransportOptions {
        self.options.read().clone()
    }

    /// Replace the options; their variant must match the instance kind.
    pub fn set_options(&self, options: TransportOptions) -> Result<()> {
        if options.kind() != self.kind {
            return Err(Error::BadParameter(format!(
                "{} options given to {} instance '{}'",
                options.kind(),
                self.kind,
                self.name
            )));
        }
        *self.options.write() = options;
        Ok(())
    }
}

/// An ordered list of transport instance names plus connection settings.
#[derive(Debug)]
pub struct TransportConfig {
    name: String,
    instances: RwLock<Vec<String>>,
    swap_bytes: RwLock<bool>,
    passive_connect_duration: RwLock<Duration>,
}

impl TransportConfig {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            instances: RwLock::new(Vec::new()),
            swap_bytes: RwLock::new(false),
            passive_connect_duration: RwLock::new(DEFAULT_PASSIVE_CONNECT_DURATION),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append an instance name; duplicates are ignored.
    pub fn add_instance(&self, inst: &str) {
        let mut instances = self.instances.write();
        if !instances.iter().any(|name| name == inst) {
            instances.push(inst.to_string());
        }
    }

    pub fn remove_instance(&self, inst: &str) -> bool {
        let mut instances = self.instances.write();
        let before = instances.len();
        instances.retain(|name| name != inst);
        instances.len() != before
    }

    pub fn instances(&self) -> Vec<String> {
        self.instances.read().clone()
    }

    pub fn swap_bytes(&self) -> bool {
        *self.swap_bytes.read()
    }

    pub fn set_swap_bytes(&self, swap: bool) {
        *self.swap_bytes.write() = swap;
    }

    pub fn passive_connect_duration(&self) -> Duration {
        *self.passive_connect_duration.read()
    }

    pub fn set_passive_connect_duration(&self, duration: Duration) {
        *self.passive_connect_duration.write() = duration;
    }
}

/// Registry of transport instances, configurations and their bindings.
#[derive(Default)]
pub struct TransportRegistry {
    insts: DashMap<String, Arc<TransportInst>>,
    configs: DashMap<String, Arc<TransportConfig>>,
    domain_bindings: DashMap<u32, String>,
    entity_bindings: DashMap<InstanceHandle, String>,
    global: ArcSwapOption<String>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Instances
    // ------------------------------------------------------------------

    pub fn create_inst(&self, name: &str, kind: TransportKind) -> Result<Arc<TransportInst>> {
        check_name("transport instance", name)?;
        match self.insts.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Error::PreconditionNotMet(format!(
                "transport instance '{}' already exists",
                name
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let inst = Arc::new(TransportInst::new(name, kind));
                slot.insert(Arc::clone(&inst));
                log::debug!("[transport] created instance '{}' ({})", name, kind);
                Ok(inst)
            }
        }
    }

    pub fn get_inst(&self, name: &str) -> Option<Arc<TransportInst>> {
        self.insts.get(name).map(|inst| Arc::clone(inst.value()))
    }

    /// Remove an instance and drop it from every configuration.
    pub fn remove_inst(&self, name: &str) -> Result<()> {
        if self.insts.remove(name).is_none() {
            return Err(Error::BadParameter(format!("unknown transport instance '{}'", name)));
        }
        for config in self.configs.iter() {
            config.remove_instance(name);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Configurations
    // ------------------------------------------------------------------

    pub fn create_config(&self, name: &str) -> Result<Arc<TransportConfig>> {
        check_name("transport config", name)?;
        match self.configs.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Error::PreconditionNotMet(format!(
                "transport config '{}' already exists",
                name
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let config = Arc::new(TransportConfig::new(name));
                slot.insert(Arc::clone(&config));
                Ok(config)
            }
        }
    }

    pub fn get_config(&self, name: &str) -> Option<Arc<TransportConfig>> {
        self.configs.get(name).map(|config| Arc::clone(config.value()))
    }

    /// Remove a configuration together with its bindings.
    pub fn remove_config(&self, name: &str) -> Result<()> {
        if self.configs.remove(name).is_none() {
            return Err(Error::BadParameter(format!("unknown transport config '{}'", name)));
        }
        self.domain_bindings.retain(|_, bound| bound != name);
        self.entity_bindings.retain(|_, bound| bound != name);
        if self.global.load().as_deref().map(String::as_str) == Some(name) {
            self.global.store(None);
        }
        Ok(())
    }

    pub fn global_config(&self) -> Option<Arc<TransportConfig>> {
        let name = self.global.load_full()?;
        self.get_config(&name)
    }

    pub fn set_global_config(&self, name: &str) -> Result<()> {
        self.require_config(name)?;
        self.global.store(Some(Arc::new(name.to_string())));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Bindings
    // ------------------------------------------------------------------

    pub fn bind_config_to_domain(&self, config: &str, domain_id: u32) -> Result<()> {
        self.require_config(config)?;
        self.domain_bindings.insert(domain_id, config.to_string());
        log::debug!("[transport] config '{}' bound to domain {}", config, domain_id);
        Ok(())
    }

    pub fn bind_config_to_entity(&self, config: &str, entity: InstanceHandle) -> Result<()> {
        if entity.is_nil() {
            return Err(Error::BadParameter("cannot bind a transport config to HANDLE_NIL".into()));
        }
        self.require_config(config)?;
        self.entity_bindings.insert(entity, config.to_string());
        Ok(())
    }

    /// Configuration bound to the domain, falling back to the global one.
    pub fn config_for_domain(&self, domain_id: u32) -> Option<Arc<TransportConfig>> {
        self.domain_bindings
            .get(&domain_id)
            .and_then(|name| self.get_config(name.value()))
            .or_else(|| self.global_config())
    }

    /// Configuration bound directly to the entity.
    pub fn config_for_entity(&self, entity: InstanceHandle) -> Option<Arc<TransportConfig>> {
        self.entity_bindings
            .get(&entity)
            .and_then(|name| self.get_config(name.value()))
    }

    /// Configuration an entity of `domain_id` runs with.
    pub(crate) fn resolve(&self, entity: InstanceHandle, domain_id: u32) -> Option<Arc<TransportConfig>> {
        self.config_for_entity(entity)
            .or_else(|| self.config_for_domain(domain_id))
    }

    /// Log the configuration an entity was enabled with.
    pub(crate) fn log_binding(&self, what: &str, entity: InstanceHandle, domain_id: u32) {
        match self.resolve(entity, domain_id) {
            Some(config) => log::debug!(
                "[transport] {} {:?} uses config '{}' {:?}",
                what,
                entity,
                config.name(),
                config.instances()
            ),
            None => log::trace!("[transport] {} {:?} uses the default domain bus", what, entity),
        }
    }

    fn require_config(&self, name: &str) -> Result<()> {
        if self.configs.contains_key(name) {
            Ok(())
        } else {
            Err(Error::BadParameter(format!("unknown transport config '{}'", name)))
        }
    }
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("insts", &self.insts.len())
            .field("configs", &self.configs.len())
            .finish()
    }
}
