// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use super::worker::Worker;
use crate::config::TimingConfig;
use crate::core::discovery::{DiscoveryMessage, DiscoveryState, ParticipantAnnouncement};
use crate::core::domain::{Domain, Envelope, Message};
use crate::core::guid::{EntityKind, GuidPrefix, GUID};
use crate::dds::builtin::{
    ParticipantBuiltinTopicData, PublicationBuiltinTopicData, SubscriptionBuiltinTopicData,
    TopicBuiltinTopicData, BUILTIN_PARTICIPANT_TOPIC, BUILTIN_PUBLICATION_TOPIC,
    BUILTIN_SUBSCRIPTION_TOPIC, BUILTIN_TOPIC_TOPIC,
};
use crate::dds::condition::{StatusCondition, StatusMask};
use crate::dds::factory::FactoryInner;
use crate::dds::listener::{CallbackRegistry, DomainParticipantListener, ListenerSlot};
use crate::dds::publisher::PublisherInner;
use crate::dds::reader::{PlainDecoder, ReaderConfig, ReaderEndpoint, ReaderInner, ReaderSource};
use crate::dds::subscriber::SubscriberInner;
use crate::dds::topic::TopicEntry;
use crate::dds::writer::WriterInner;
use crate::dds::{Error, InstanceHandle, Result, DDS};
use crate::qos::QoS;

/// Read-only readers of the four built-in topics.
pub(crate) struct BuiltinReaders {
    pub(crate) subscriber: Arc<SubscriberInner>,
    pub(crate) participants: Arc<ReaderInner<ParticipantBuiltinTopicData>>,
    pub(crate) publications: Arc<ReaderInner<PublicationBuiltinTopicData>>,
    pub(crate) subscriptions: Arc<ReaderInner<SubscriptionBuiltinTopicData>>,
    pub(crate) topics: Arc<ReaderInner<TopicBuiltinTopicData>>,
}

/// Everything needed to build a participant.
pub(crate) struct ParticipantConfig {
    pub(crate) prefix: GuidPrefix,
    pub(crate) qos: QoS,
    pub(crate) factory: Weak<FactoryInner>,
    pub(crate) domain: Arc<Domain>,
    pub(crate) timing: TimingConfig,
}

pub(crate) struct ParticipantInner {
    pub(super) me: Weak<ParticipantInner>,
    pub(crate) guid: GUID,
    pub(crate) prefix: GuidPrefix,
    pub(crate) qos: RwLock<QoS>,
    pub(crate) factory: Weak<FactoryInner>,
    pub(super) domain: Arc<Domain>,
    pub(crate) timing: TimingConfig,

    /// Local and remote endpoints, topics and pair decisions.
    pub(super) discovery: Mutex<DiscoveryState>,
    pub(super) topics: Mutex<HashMap<String, TopicEntry>>,
    pub(super) publishers: Mutex<Vec<Arc<PublisherInner>>>,
    pub(super) subscribers: Mutex<Vec<Arc<SubscriberInner>>>,
    /// Enabled user readers.
    pub(super) readers: RwLock<Vec<Arc<dyn ReaderEndpoint>>>,
    /// Reader of each announced subscription GUID (MultiTopic readers
    /// announce one per component).
    pub(super) routes: RwLock<HashMap<GUID, Arc<dyn ReaderEndpoint>>>,
    /// Enabled writers.
    pub(super) writers: RwLock<HashMap<GUID, Arc<WriterInner>>>,
    pub(super) builtin: BuiltinReaders,

    next_entity: AtomicU32,
    pub(super) default_publisher_qos: RwLock<QoS>,
    pub(super) default_subscriber_qos: RwLock<QoS>,
    pub(super) default_topic_qos: RwLock<QoS>,

    pub(crate) listener: ListenerSlot<dyn DomainParticipantListener>,
    pub(crate) callbacks: CallbackRegistry,
    pub(crate) status_condition: Arc<StatusCondition>,

    pub(super) announcements: AtomicBool,
    pub(super) last_announce: Mutex<Instant>,
    enabled: AtomicBool,
    deleted: AtomicBool,
    pub(super) worker: Mutex<Option<Worker>>,
}

impl ParticipantInner {
    pub(crate) fn new(config: ParticipantConfig) -> Arc<Self> {
        let prefix = config.prefix;
        let domain = config.domain;
        Arc::new_cyclic(|me: &Weak<ParticipantInner>| {
            let next_entity = AtomicU32::new(1);
            let allocate = |kind| {
                GUID::entity(prefix, next_entity.fetch_add(1, Ordering::Relaxed), kind)
            };
            let subscriber = SubscriberInner::new(
                allocate(EntityKind::Subscriber),
                QoS::default(),
                me.clone(),
            );
            let builtin = BuiltinReaders {
                participants: Self::builtin_reader(
                    allocate(EntityKind::BuiltinReader),
                    BUILTIN_PARTICIPANT_TOPIC,
                    &subscriber,
                    me,
                    &domain,
                ),
                publications: Self::builtin_reader(
                    allocate(EntityKind::BuiltinReader),
                    BUILTIN_PUBLICATION_TOPIC,
                    &subscriber,
                    me,
                    &domain,
                ),
                subscriptions: Self::builtin_reader(
                    allocate(EntityKind::BuiltinReader),
                    BUILTIN_SUBSCRIPTION_TOPIC,
                    &subscriber,
                    me,
                    &domain,
                ),
                topics: Self::builtin_reader(
                    allocate(EntityKind::BuiltinReader),
                    BUILTIN_TOPIC_TOPIC,
                    &subscriber,
                    me,
                    &domain,
                ),
                subscriber,
            };

            Self {
                me: me.clone(),
                guid: GUID::participant(prefix),
                prefix,
                qos: RwLock::new(config.qos),
                factory: config.factory,
                domain,
                timing: config.timing,
                discovery: Mutex::new(DiscoveryState::new()),
                topics: Mutex::new(HashMap::new()),
                publishers: Mutex::new(Vec::new()),
                subscribers: Mutex::new(Vec::new()),
                readers: RwLock::new(Vec::new()),
                routes: RwLock::new(HashMap::new()),
                writers: RwLock::new(HashMap::new()),
                builtin,
                next_entity,
                default_publisher_qos: RwLock::new(QoS::default()),
                default_subscriber_qos: RwLock::new(QoS::default()),
                default_topic_qos: RwLock::new(QoS::default()),
                listener: ListenerSlot::new(),
                callbacks: CallbackRegistry::new(),
                status_condition: Arc::new(StatusCondition::new()),
                announcements: AtomicBool::new(true),
                last_announce: Mutex::new(Instant::now()),
                enabled: AtomicBool::new(false),
                deleted: AtomicBool::new(false),
                worker: Mutex::new(None),
            }
        })
    }

    fn builtin_reader<T: DDS>(
        guid: GUID,
        name: &'static str,
        subscriber: &Arc<SubscriberInner>,
        participant: &Weak<ParticipantInner>,
        domain: &Arc<Domain>,
    ) -> Arc<ReaderInner<T>> {
        let reader = ReaderInner::new(ReaderConfig {
            guid,
            components: Vec::new(),
            source: ReaderSource::Builtin {
                name,
                type_name: T::type_name(),
            },
            decoder: Box::new(PlainDecoder),
            qos: QoS::reliable().keep_all(),
            subscriber: subscriber.weak(),
            participant: participant.clone(),
            domain: Arc::clone(domain),
            enabled: true,
        });
        subscriber.adopt(Arc::clone(&reader) as Arc<dyn ReaderEndpoint>);
        reader
    }

    pub(crate) fn me(&self) -> Option<Arc<ParticipantInner>> {
        self.me.upgrade()
    }

    pub(crate) fn handle(&self) -> InstanceHandle {
        self.guid.to_handle()
    }

    pub(crate) fn domain_id(&self) -> u32 {
        self.domain.id()
    }

    pub(crate) fn domain(&self) -> Arc<Domain> {
        Arc::clone(&self.domain)
    }

    pub(crate) fn allocate_guid(&self, kind: EntityKind) -> GUID {
        GUID::entity(
            self.prefix,
            self.next_entity.fetch_add(1, Ordering::Relaxed),
            kind,
        )
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire) && !self.is_deleted()
    }

    pub(crate) fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub(crate) fn check_alive(&self) -> Result<()> {
        if self.is_deleted() {
            Err(Error::AlreadyDeleted)
        } else {
            Ok(())
        }
    }

    pub(crate) fn announcements_enabled(&self) -> bool {
        self.announcements.load(Ordering::Acquire)
    }

    pub(crate) fn announcement(&self) -> ParticipantAnnouncement {
        ParticipantAnnouncement {
            guid_prefix: self.prefix,
            domain_id: self.domain.id(),
            lease_duration: self.timing.participant_lease,
            user_data: self.qos.read().user_data.value.clone(),
        }
    }

    pub(super) fn broadcast(&self, msg: DiscoveryMessage) {
        self.domain
            .send(Envelope::broadcast(self.prefix, Message::Discovery(msg)));
    }

    /// Join the domain bus, start the event thread and announce.
    pub(crate) fn enable(&self) -> Result<()> {
        self.check_alive()?;
        if self.enabled.load(Ordering::Acquire) {
            return Ok(());
        }
        let me = self.me().ok_or(Error::AlreadyDeleted)?;
        let (tx, rx) = crossbeam::channel::unbounded();
        let worker = Worker::spawn(Arc::downgrade(&me), rx, self.timing.tick)?;
        *self.worker.lock() = Some(worker);
        self.enabled.store(true, Ordering::Release);
        self.domain.join(self.prefix, tx);

        if let Some(factory) = self.factory.upgrade() {
            factory
                .transports
                .log_binding("participant", self.handle(), self.domain.id());
        }

        *self.last_announce.lock() = Instant::now();
        if self.announcements_enabled() {
            self.broadcast(DiscoveryMessage::Participant(self.announcement()));
        }
        log::info!(
            "[discovery] participant {} enabled on domain {}",
            self.guid,
            self.domain.id()
        );

        self.builtin.subscriber.enable()?;
        if self.qos.read().entity_factory.autoenable_created_entities {
            let publishers = self.publishers.lock().clone();
            for publisher in publishers {
                publisher.enable()?;
            }
            let subscribers = self.subscribers.lock().clone();
            for subscriber in subscribers {
                subscriber.enable()?;
            }
        }
        Ok(())
    }

    pub(crate) fn has_children(&self) -> bool {
        !self.publishers.lock().is_empty()
            || !self.subscribers.lock().is_empty()
            || !self.topics.lock().is_empty()
    }

    /// Delete every publisher, subscriber and topic.
    pub(crate) fn delete_children(&self) {
        let publishers = std::mem::take(&mut *self.publishers.lock());
        for publisher in &publishers {
            publisher.mark_deleted();
        }
        let subscribers = std::mem::take(&mut *self.subscribers.lock());
        for subscriber in &subscribers {
            subscriber.mark_deleted();
        }
        let topics = std::mem::take(&mut *self.topics.lock());
        for entry in topics.values() {
            if let TopicEntry::Topic(topic) = entry {
                self.withdraw_topic(topic.guid);
            }
        }
    }

    /// Leave the domain and stop the event thread.
    pub(crate) fn shutdown(&self) {
        if self.deleted.swap(true, Ordering::AcqRel) {
            return;
        }
        let was_enabled = self.enabled.swap(false, Ordering::AcqRel);
        if was_enabled && self.announcements_enabled() {
            self.broadcast(DiscoveryMessage::ParticipantGone(self.prefix));
        }
        self.domain.leave(&self.prefix);
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.stop();
        }
        self.builtin.subscriber.mark_deleted();
        self.listener.set(None, StatusMask::NONE);
        self.callbacks.clear();
        self.status_condition.mark_deleted();
        log::info!("[discovery] participant {} deleted", self.guid);
    }
}

impl Drop for ParticipantInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}
