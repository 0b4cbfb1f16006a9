// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::inner::ParticipantInner;
use crate::core::discovery::DiscoveryMessage;
use crate::core::guid::{EntityKind, GUID};
use crate::dds::builtin::{ParticipantBuiltinTopicData, TopicBuiltinTopicData};
use crate::dds::condition::{HasStatusCondition, StatusCondition, StatusMask};
use crate::dds::content_filtered_topic::{ContentFilteredTopic, ContentFilteredTopicInner};
use crate::dds::filter::ContentFilter;
use crate::dds::listener::{CallbackId, DomainParticipantListener, StatusEvent};
use crate::dds::multi_topic::{parse_subscription_expression, MultiTopic, MultiTopicInner};
use crate::dds::publisher::{Publisher, PublisherInner};
use crate::dds::status::StatusKind;
use crate::dds::subscriber::{Subscriber, SubscriberInner};
use crate::dds::topic::{check_name, Topic, TopicDescription, TopicEntry, TopicInner};
use crate::dds::{Error, InstanceHandle, Result, Time, DDS};
use crate::qos::QoS;

/// DDS Domain Participant - the root entity of one domain.
///
/// A `DomainParticipant` is created by a
/// [`DomainParticipantFactory`](crate::DomainParticipantFactory) and owns the
/// publishers, subscribers and topics created through it. It is a cheap
/// handle; clones refer to the same participant.
///
/// # Example
///
/// ```ignore
/// let factory = DomainParticipantFactory::new();
/// let participant = factory.create_participant(0, QoS::default())?;
///
/// let topic = participant.create_topic::<SensorData>("sensors", QoS::default())?;
/// let publisher = participant.create_publisher(QoS::default())?;
/// let writer = publisher.create_datawriter(&topic, QoS::reliable())?;
/// ```
///
/// # Lifecycle
///
/// `factory.delete_participant` fails while the participant still owns
/// entities; `delete_contained_entities` removes them all first.
#[derive(Clone)]
pub struct DomainParticipant {
    pub(crate) inner: Arc<ParticipantInner>,
}

impl std::fmt::Debug for DomainParticipant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainParticipant")
            .field("guid", &self.inner.guid)
            .field("domain_id", &self.inner.domain_id())
            .finish()
    }
}

impl DomainParticipant {
    pub(crate) fn from_inner(inner: Arc<ParticipantInner>) -> Self {
        Self { inner }
    }

    fn weak(&self) -> std::sync::Weak<ParticipantInner> {
        Arc::downgrade(&self.inner)
    }

    fn autoenable(&self) -> bool {
        self.inner.is_enabled() && self.inner.qos.read().entity_factory.autoenable_created_entities
    }

    // ------------------------------------------------------------------
    // Publishers / Subscribers
    // ------------------------------------------------------------------

    pub fn create_publisher(&self, qos: QoS) -> Result<Publisher> {
        self.inner.check_alive()?;
        qos.validate()?;
        let guid = self.inner.allocate_guid(EntityKind::Publisher);
        let publisher = PublisherInner::new(guid, qos, self.weak());
        self.inner.publishers.lock().push(Arc::clone(&publisher));
        if self.autoenable() {
            publisher.enable()?;
        }
        log::debug!("[participant] {} created publisher {}", self.inner.guid, guid);
        Ok(Publisher::from_inner(publisher))
    }

    pub fn create_publisher_with_default_qos(&self) -> Result<Publisher> {
        self.create_publisher(self.get_default_publisher_qos())
    }

    /// # Errors
    ///
    /// `PreconditionNotMet` while the publisher still has writers or when it
    /// belongs to another participant.
    pub fn delete_publisher(&self, publisher: &Publisher) -> Result<()> {
        self.inner.check_alive()?;
        let removed = {
            let mut publishers = self.inner.publishers.lock();
            let index = publishers
                .iter()
                .position(|p| Arc::ptr_eq(p, &publisher.inner))
                .ok_or_else(|| {
                    Error::PreconditionNotMet("publisher belongs to another participant".into())
                })?;
            if publishers[index].writer_count() > 0 {
                return Err(Error::PreconditionNotMet(
                    "publisher still has data writers".into(),
                ));
            }
            publishers.remove(index)
        };
        removed.mark_deleted();
        Ok(())
    }

    pub fn create_subscriber(&self, qos: QoS) -> Result<Subscriber> {
        self.inner.check_alive()?;
        qos.validate()?;
        let guid = self.inner.allocate_guid(EntityKind::Subscriber);
        let subscriber = SubscriberInner::new(guid, qos, self.weak());
        self.inner.subscribers.lock().push(Arc::clone(&subscriber));
        if self.autoenable() {
            subscriber.enable()?;
        }
        log::debug!("[participant] {} created subscriber {}", self.inner.guid, guid);
        Ok(Subscriber::from_inner(subscriber))
    }

    pub fn create_subscriber_with_default_qos(&self) -> Result<Subscriber> {
        self.create_subscriber(self.get_default_subscriber_qos())
    }

    /// # Errors
    ///
    /// `PreconditionNotMet` while the subscriber still has readers or when
    /// it belongs to another participant.
    pub fn delete_subscriber(&self, subscriber: &Subscriber) -> Result<()> {
        self.inner.check_alive()?;
        let removed = {
            let mut subscribers = self.inner.subscribers.lock();
            let index = subscribers
                .iter()
                .position(|s| Arc::ptr_eq(s, &subscriber.inner))
                .ok_or_else(|| {
                    Error::PreconditionNotMet("subscriber belongs to another participant".into())
                })?;
            if subscribers[index].reader_count() > 0 {
                return Err(Error::PreconditionNotMet(
                    "subscriber still has data readers".into(),
                ));
            }
            subscribers.remove(index)
        };
        removed.mark_deleted();
        Ok(())
    }

    /// The subscriber holding the DCPSParticipant, DCPSPublication,
    /// DCPSSubscription and DCPSTopic readers.
    pub fn get_builtin_subscriber(&self) -> Subscriber {
        Subscriber::from_inner(Arc::clone(&self.inner.builtin.subscriber))
    }

    // ------------------------------------------------------------------
    // Topics
    // ------------------------------------------------------------------

    fn insert_topic(&self, name: &str, entry: TopicEntry) -> Result<()> {
        let mut topics = self.inner.topics.lock();
        if topics.contains_key(name) {
            return Err(Error::PreconditionNotMet(format!(
                "topic name '{}' is already in use",
                name
            )));
        }
        topics.insert(name.to_string(), entry);
        Ok(())
    }

    /// Create a topic of type `T`.
    ///
    /// # Errors
    ///
    /// - `BadParameter` for an empty or blank name
    /// - `PreconditionNotMet` when the name is already used in this participant
    /// - `InconsistentPolicy` for contradicting QoS
    pub fn create_topic<T: DDS>(&self, name: &str, qos: QoS) -> Result<Topic<T>> {
        self.inner.check_alive()?;
        check_name("topic", name)?;
        qos.validate()?;
        let guid = self.inner.allocate_guid(EntityKind::Topic);
        let topic = Arc::new(TopicInner::new::<T>(guid, name, qos, self.weak()));
        self.insert_topic(name, TopicEntry::Topic(Arc::clone(&topic)))?;
        self.inner.announce_topic(&topic);
        log::debug!(
            "[participant] {} created topic '{}' ({})",
            self.inner.guid,
            name,
            T::type_name()
        );
        Ok(Topic::from_inner(topic))
    }

    pub fn create_topic_with_default_qos<T: DDS>(&self, name: &str) -> Result<Topic<T>> {
        self.create_topic(name, self.get_default_topic_qos())
    }

    /// # Errors
    ///
    /// `PreconditionNotMet` while readers, writers or derived topics still
    /// refer to the topic.
    pub fn delete_topic<T: DDS>(&self, topic: &Topic<T>) -> Result<()> {
        self.inner.check_alive()?;
        {
            let mut topics = self.inner.topics.lock();
            match topics.get(&topic.inner.name) {
                Some(TopicEntry::Topic(inner)) if Arc::ptr_eq(inner, &topic.inner) => {}
                _ => {
                    return Err(Error::PreconditionNotMet(
                        "topic belongs to another participant".into(),
                    ))
                }
            }
            if topic.inner.ref_count() > 0 {
                return Err(Error::PreconditionNotMet(format!(
                    "topic '{}' is still referenced",
                    topic.inner.name
                )));
            }
            topics.remove(&topic.inner.name);
        }
        self.inner.withdraw_topic(topic.inner.guid);
        Ok(())
    }

    /// Create a filtered view of `related`.
    ///
    /// # Errors
    ///
    /// - `BadParameter` for an empty name
    /// - `Error` for an unparsable expression or a wrong parameter count
    /// - `PreconditionNotMet` when the name is already in use
    pub fn create_contentfilteredtopic<T: DDS>(
        &self,
        name: &str,
        related: &Topic<T>,
        filter_expression: &str,
        parameters: Vec<String>,
    ) -> Result<ContentFilteredTopic<T>> {
        self.inner.check_alive()?;
        check_name("content-filtered topic", name)?;
        if !Arc::ptr_eq(&self.inner, &related.inner.participant.upgrade().ok_or(Error::AlreadyDeleted)?) {
            return Err(Error::PreconditionNotMet(
                "related topic belongs to another participant".into(),
            ));
        }
        let filter = ContentFilter::with_parameters(filter_expression, parameters)?;
        let cft = Arc::new(ContentFilteredTopicInner::new(
            name,
            Arc::clone(&related.inner),
            filter,
        ));
        self.insert_topic(name, TopicEntry::Filtered(Arc::clone(&cft)))?;
        log::debug!(
            "[participant] {} created content-filtered topic '{}' on '{}'",
            self.inner.guid,
            name,
            related.inner.name
        );
        Ok(ContentFilteredTopic::from_inner(cft))
    }

    /// # Errors
    ///
    /// `PreconditionNotMet` while readers still use the filtered topic.
    pub fn delete_contentfilteredtopic<T: DDS>(&self, topic: &ContentFilteredTopic<T>) -> Result<()> {
        self.inner.check_alive()?;
        let mut topics = self.inner.topics.lock();
        match topics.get(&topic.inner.name) {
            Some(TopicEntry::Filtered(inner)) if Arc::ptr_eq(inner, &topic.inner) => {}
            _ => {
                return Err(Error::PreconditionNotMet(
                    "content-filtered topic belongs to another participant".into(),
                ))
            }
        }
        if topic.inner.ref_count() > 0 {
            return Err(Error::PreconditionNotMet(format!(
                "content-filtered topic '{}' is still referenced",
                topic.inner.name
            )));
        }
        topics.remove(&topic.inner.name);
        topic.inner.detach();
        Ok(())
    }

    /// Create a multitopic from a `SELECT … FROM … [WHERE …]` expression.
    ///
    /// # Errors
    ///
    /// - `Error` for an unparsable expression or a wrong parameter count
    /// - `BadParameter` when a FROM topic is not a topic of this participant
    /// - `PreconditionNotMet` when the name is already in use
    pub fn create_multitopic(
        &self,
        name: &str,
        type_name: &str,
        subscription_expression: &str,
        parameters: Vec<String>,
    ) -> Result<MultiTopic> {
        self.inner.check_alive()?;
        check_name("multitopic", name)?;
        let parsed = parse_subscription_expression(subscription_expression)?;
        let related = {
            let topics = self.inner.topics.lock();
            parsed
                .topics
                .iter()
                .map(|topic_name| match topics.get(topic_name) {
                    Some(TopicEntry::Topic(topic)) => Ok(Arc::clone(topic)),
                    _ => Err(Error::BadParameter(format!(
                        "'{}' is not a topic of this participant",
                        topic_name
                    ))),
                })
                .collect::<Result<Vec<_>>>()?
        };
        let multi = Arc::new(MultiTopicInner::new(
            name,
            type_name,
            subscription_expression,
            parsed,
            related,
            parameters,
        )?);
        self.insert_topic(name, TopicEntry::Multi(Arc::clone(&multi)))?;
        log::debug!("[participant] {} created multitopic '{}'", self.inner.guid, name);
        Ok(MultiTopic { inner: multi })
    }

    /// # Errors
    ///
    /// `PreconditionNotMet` while readers still use the multitopic.
    pub fn delete_multitopic(&self, topic: &MultiTopic) -> Result<()> {
        self.inner.check_alive()?;
        let mut topics = self.inner.topics.lock();
        match topics.get(&topic.inner.name) {
            Some(TopicEntry::Multi(inner)) if Arc::ptr_eq(inner, &topic.inner) => {}
            _ => {
                return Err(Error::PreconditionNotMet(
                    "multitopic belongs to another participant".into(),
                ))
            }
        }
        if topic.inner.ref_count() > 0 {
            return Err(Error::PreconditionNotMet(format!(
                "multitopic '{}' is still referenced",
                topic.inner.name
            )));
        }
        topics.remove(&topic.inner.name);
        topic.inner.detach();
        Ok(())
    }

    /// Find a topic by name, waiting up to `timeout` for it to be created
    /// locally or discovered. A discovered topic is created locally with the
    /// announced QoS.
    ///
    /// # Errors
    ///
    /// - `Timeout` when no topic of that name shows up in time
    /// - `PreconditionNotMet` when the name exists with another type
    pub fn find_topic<T: DDS>(&self, name: &str, timeout: Duration) -> Result<Topic<T>> {
        self.inner.check_alive()?;
        check_name("topic", name)?;
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if let Some(entry) = self.inner.topics.lock().get(name).cloned() {
                return match entry {
                    TopicEntry::Topic(topic) if topic.type_name == T::type_name() => {
                        Ok(Topic::from_inner(topic))
                    }
                    _ => Err(Error::PreconditionNotMet(format!(
                        "'{}' exists with another type",
                        name
                    ))),
                };
            }
            let discovered = self
                .inner
                .discovery
                .lock()
                .topics
                .values()
                .find(|t| t.name == name && t.type_name == T::type_name())
                .map(|t| t.qos.clone());
            if let Some(qos) = discovered {
                match self.create_topic::<T>(name, qos) {
                    Err(Error::PreconditionNotMet(_)) => continue,
                    other => return other,
                }
            }
            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                return Err(Error::Timeout);
            }
            let step = deadline.map_or(self.inner.timing.tick, |d| {
                d.saturating_duration_since(now).min(self.inner.timing.tick)
            });
            thread::sleep(step);
        }
    }

    /// Description of the topic, content-filtered topic or multitopic named
    /// `name`.
    pub fn lookup_topicdescription(&self, name: &str) -> Option<TopicDescription> {
        self.inner
            .topics
            .lock()
            .get(name)
            .map(TopicEntry::description)
    }

    // ------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------

    /// Stop all matching with the participant owning `handle`.
    pub fn ignore_participant(&self, handle: InstanceHandle) -> Result<()> {
        self.inner.check_alive()?;
        if !self.inner.is_enabled() {
            return Err(Error::NotEnabled);
        }
        let prefix = GUID::from_handle(handle).prefix;
        if prefix == self.inner.prefix {
            return Err(Error::BadParameter("cannot ignore the local participant".into()));
        }
        self.inner.ignore(prefix);
        Ok(())
    }

    /// Assert liveliness of every Automatic and ManualByParticipant writer.
    pub fn assert_liveliness(&self) -> Result<()> {
        self.inner.check_alive()?;
        if !self.inner.is_enabled() {
            return Err(Error::NotEnabled);
        }
        self.inner.assert_liveliness_except(GUID::zero());
        Ok(())
    }

    /// Handles of the remote participants currently discovered.
    pub fn get_discovered_participants(&self) -> Result<Vec<InstanceHandle>> {
        self.inner.check_alive()?;
        Ok(self
            .inner
            .discovery
            .lock()
            .participants
            .active()
            .map(|p| GUID::participant(p.announcement.guid_prefix).to_handle())
            .collect())
    }

    /// # Errors
    ///
    /// `BadParameter` when `handle` is not a discovered participant.
    pub fn get_discovered_participant_data(
        &self,
        handle: InstanceHandle,
    ) -> Result<ParticipantBuiltinTopicData> {
        self.inner.check_alive()?;
        let prefix = GUID::from_handle(handle).prefix;
        self.inner
            .discovery
            .lock()
            .participants
            .active()
            .find(|p| p.announcement.guid_prefix == prefix)
            .map(|p| ParticipantBuiltinTopicData::from_announcement(&p.announcement))
            .ok_or_else(|| Error::BadParameter("unknown participant handle".into()))
    }

    /// Handles of the remote topics currently discovered.
    pub fn get_discovered_topics(&self) -> Result<Vec<InstanceHandle>> {
        self.inner.check_alive()?;
        Ok(self
            .inner
            .discovery
            .lock()
            .topics
            .keys()
            .filter(|guid| guid.prefix != self.inner.prefix)
            .map(GUID::to_handle)
            .collect())
    }

    pub fn get_discovered_topic_data(&self, handle: InstanceHandle) -> Result<TopicBuiltinTopicData> {
        self.inner.check_alive()?;
        let guid = GUID::from_handle(handle);
        self.inner
            .discovery
            .lock()
            .topics
            .get(&guid)
            .filter(|t| t.guid.prefix != self.inner.prefix)
            .map(TopicBuiltinTopicData::from_announcement)
            .ok_or_else(|| Error::BadParameter("unknown topic handle".into()))
    }

    /// Whether `handle` names an entity created (directly or not) by this
    /// participant.
    pub fn contains_entity(&self, handle: InstanceHandle) -> bool {
        if self
            .inner
            .topics
            .lock()
            .values()
            .any(|entry| matches!(entry, TopicEntry::Topic(t) if t.handle() == handle))
        {
            return true;
        }
        self.inner.publishers.lock().iter().any(|p| p.contains(&handle))
            || self.inner.subscribers.lock().iter().any(|s| s.contains(&handle))
    }

    pub fn get_current_time(&self) -> Time {
        Time::now()
    }

    /// Stop (or resume) every discovery announcement of this participant.
    /// Remote peers see a silent participant and eventually expire it.
    /// Resuming re-announces the participant with all its endpoints.
    pub fn set_announcements_enabled(&self, enabled: bool) {
        let previous = self.inner.announcements.swap(enabled, Ordering::AcqRel);
        if enabled && !previous && self.inner.is_enabled() {
            self.inner.announce_all();
        }
        log::debug!(
            "[discovery] {} announcements {}",
            self.inner.guid,
            if enabled { "enabled" } else { "disabled" }
        );
    }

    // ------------------------------------------------------------------
    // QoS
    // ------------------------------------------------------------------

    pub fn get_qos(&self) -> QoS {
        self.inner.qos.read().clone()
    }

    /// Replace the participant QoS (EntityFactory, UserData). A changed
    /// UserData is re-announced.
    pub fn set_qos(&self, qos: QoS) -> Result<()> {
        self.inner.check_alive()?;
        let changed = {
            let mut current = self.inner.qos.write();
            current.check_update(&qos, self.inner.is_enabled())?;
            let changed = current.user_data != qos.user_data;
            *current = qos;
            changed
        };
        if changed && self.inner.announcing() {
            self.inner
                .broadcast(DiscoveryMessage::Participant(self.inner.announcement()));
        }
        Ok(())
    }

    pub fn get_default_publisher_qos(&self) -> QoS {
        self.inner.default_publisher_qos.read().clone()
    }

    pub fn set_default_publisher_qos(&self, qos: QoS) -> Result<()> {
        qos.validate()?;
        *self.inner.default_publisher_qos.write() = qos;
        Ok(())
    }

    pub fn get_default_subscriber_qos(&self) -> QoS {
        self.inner.default_subscriber_qos.read().clone()
    }

    pub fn set_default_subscriber_qos(&self, qos: QoS) -> Result<()> {
        qos.validate()?;
        *self.inner.default_subscriber_qos.write() = qos;
        Ok(())
    }

    pub fn get_default_topic_qos(&self) -> QoS {
        self.inner.default_topic_qos.read().clone()
    }

    pub fn set_default_topic_qos(&self, qos: QoS) -> Result<()> {
        qos.validate()?;
        *self.inner.default_topic_qos.write() = qos;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Entity
    // ------------------------------------------------------------------

    /// Join the domain and start discovery. Children created while the
    /// participant was disabled are enabled when EntityFactory allows it.
    pub fn enable(&self) -> Result<()> {
        self.inner.enable()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }

    pub fn get_instance_handle(&self) -> InstanceHandle {
        self.inner.handle()
    }

    pub fn get_domain_id(&self) -> u32 {
        self.inner.domain_id()
    }

    /// Delete every publisher, subscriber and topic, with their writers,
    /// readers and conditions.
    pub fn delete_contained_entities(&self) -> Result<()> {
        self.inner.check_alive()?;
        self.inner.delete_children();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Install (or clear) the participant listener. It receives the events
    /// of every contained entity without a listener of its own.
    pub fn set_listener(
        &self,
        listener: Option<Arc<dyn DomainParticipantListener>>,
        mask: StatusMask,
    ) -> Result<()> {
        self.inner.check_alive()?;
        self.inner.listener.set(listener, mask);
        Ok(())
    }

    /// Register a closure for `kind`, fired for every contained entity.
    pub fn on_status<F>(&self, kind: StatusKind, callback: F) -> CallbackId
    where
        F: Fn(&StatusEvent) + Send + Sync + 'static,
    {
        self.inner.callbacks.register(kind, callback)
    }

    pub fn remove_callback(&self, id: CallbackId) -> bool {
        self.inner.callbacks.remove(id)
    }
}

impl HasStatusCondition for DomainParticipant {
    fn get_status_condition(&self) -> Arc<StatusCondition> {
        Arc::clone(&self.inner.status_condition)
    }
}
