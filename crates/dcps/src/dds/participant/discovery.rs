// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint registration, matching and discovery message handling.
//!
//! Pair decisions are taken under the discovery lock; everything that can
//! reach user code (listeners, callbacks, data delivery) is collected in an
//! [`Effects`] batch and applied once the lock is released.

use std::sync::Arc;
use std::time::Instant;

use super::inner::ParticipantInner;
use crate::core::discovery::{
    evaluate, AnnounceOutcome, DiscoveryMessage, DiscoveryState, EndpointAnnouncement,
    MatchOutcome, PairChange, PairState, ParticipantAnnouncement, Side, TopicAnnouncement,
};
use crate::core::domain::{Envelope, Message};
use crate::core::guid::{GuidPrefix, GUID};
use crate::dds::builtin::{
    ParticipantBuiltinTopicData, PublicationBuiltinTopicData, SubscriptionBuiltinTopicData,
    TopicBuiltinTopicData,
};
use crate::dds::reader::ReaderEndpoint;
use crate::dds::topic::{TopicEntry, TopicInner};
use crate::dds::writer::WriterInner;

/// Change to publish into a built-in reader; `None` disposes the instance.
enum BuiltinUpdate {
    Participant([u8; 16], Option<ParticipantBuiltinTopicData>),
    Publication([u8; 16], Option<PublicationBuiltinTopicData>),
    Subscription([u8; 16], Option<SubscriptionBuiltinTopicData>),
    Topic([u8; 16], Option<TopicBuiltinTopicData>),
}

/// Work deferred until the discovery lock is released.
#[derive(Default)]
pub(super) struct Effects {
    envelopes: Vec<Envelope>,
    readers: Vec<Arc<dyn ReaderEndpoint>>,
    writers: Vec<Arc<WriterInner>>,
    builtin: Vec<(GUID, BuiltinUpdate)>,
    inconsistent: Vec<Arc<TopicInner>>,
    lost: Vec<GuidPrefix>,
    revived: Vec<GuidPrefix>,
}

impl ParticipantInner {
    pub(super) fn apply(&self, fx: Effects) {
        self.domain.send_all(fx.envelopes);

        if !fx.lost.is_empty() || !fx.revived.is_empty() {
            let readers = self.readers.read().clone();
            for reader in &readers {
                for prefix in &fx.lost {
                    reader.on_participant_lost(prefix);
                }
                for prefix in &fx.revived {
                    reader.on_participant_revived(prefix);
                }
                reader.flush();
            }
        }
        for reader in &fx.readers {
            reader.flush();
        }
        for writer in &fx.writers {
            writer.flush();
        }

        let builtin = &self.builtin;
        for (source, update) in fx.builtin {
            match update {
                BuiltinUpdate::Participant(key, data) => {
                    builtin.participants.store_local(key, data, source)
                }
                BuiltinUpdate::Publication(key, data) => {
                    builtin.publications.store_local(key, data, source)
                }
                BuiltinUpdate::Subscription(key, data) => {
                    builtin.subscriptions.store_local(key, data, source)
                }
                BuiltinUpdate::Topic(key, data) => builtin.topics.store_local(key, data, source),
            }
        }

        for topic in fx.inconsistent {
            topic.on_inconsistent();
        }
    }

    fn route(&self, guid: &GUID) -> Option<Arc<dyn ReaderEndpoint>> {
        self.routes.read().get(guid).cloned()
    }

    fn local_writer(&self, guid: &GUID) -> Option<Arc<WriterInner>> {
        self.writers.read().get(guid).cloned()
    }

    /// Enabled and not silenced.
    pub(super) fn announcing(&self) -> bool {
        self.is_enabled() && self.announcements_enabled()
    }

    fn is_local(&self, guid: &GUID) -> bool {
        guid.prefix == self.prefix
    }

    fn skip_remote(&self, disc: &DiscoveryState, guid: &GUID) -> bool {
        !self.is_local(guid) && disc.is_ignored(&guid.prefix)
    }

    // ------------------------------------------------------------------
    // Pair evaluation
    // ------------------------------------------------------------------

    /// Evaluate a pair from the side of a local writer.
    fn writer_side(
        disc: &mut DiscoveryState,
        writer: &Arc<WriterInner>,
        writer_ann: &EndpointAnnouncement,
        reader_ann: &EndpointAnnouncement,
        fx: &mut Effects,
    ) {
        let outcome = evaluate(writer_ann, reader_ann);
        match disc.apply(Side::Writer, writer_ann.guid, reader_ann.guid, &outcome) {
            PairChange::Matched => fx.envelopes.extend(writer.on_reader_matched(reader_ann)),
            PairChange::Unmatched => writer.on_reader_unmatched(reader_ann.guid),
            PairChange::Incompatible { was_matched } => {
                if was_matched {
                    writer.on_reader_unmatched(reader_ann.guid);
                }
                if let MatchOutcome::Incompatible(policies) = &outcome {
                    writer.on_offered_incompatible(policies);
                }
            }
            PairChange::None => return,
        }
        fx.writers.push(Arc::clone(writer));
    }

    /// Evaluate a pair from the side of a local reader component.
    fn reader_side(
        disc: &mut DiscoveryState,
        reader: &Arc<dyn ReaderEndpoint>,
        reader_ann: &EndpointAnnouncement,
        writer_ann: &EndpointAnnouncement,
        fx: &mut Effects,
    ) {
        let local = reader_ann.guid;
        let outcome = evaluate(writer_ann, reader_ann);
        match disc.apply(Side::Reader, local, writer_ann.guid, &outcome) {
            PairChange::Matched => reader.on_writer_matched(local, writer_ann),
            PairChange::Unmatched => reader.on_writer_unmatched(local, writer_ann.guid),
            PairChange::Incompatible { was_matched } => {
                if was_matched {
                    reader.on_writer_unmatched(local, writer_ann.guid);
                }
                if let MatchOutcome::Incompatible(policies) = &outcome {
                    reader.on_requested_incompatible(policies);
                }
            }
            PairChange::None => {
                if disc.pair_state(Side::Reader, local, writer_ann.guid) == Some(PairState::Matched) {
                    reader.on_writer_updated(writer_ann);
                }
            }
        }
        fx.readers.push(Arc::clone(reader));
    }

    /// Match a local publication against every known subscription.
    fn match_publication(
        &self,
        disc: &mut DiscoveryState,
        writer: &Arc<WriterInner>,
        ann: &EndpointAnnouncement,
        fx: &mut Effects,
    ) {
        let subscriptions: Vec<EndpointAnnouncement> = disc.subscriptions.values().cloned().collect();
        for reader_ann in &subscriptions {
            if self.skip_remote(disc, &reader_ann.guid) {
                continue;
            }
            Self::writer_side(disc, writer, ann, reader_ann, fx);
            if self.is_local(&reader_ann.guid) {
                if let Some(reader) = self.route(&reader_ann.guid) {
                    Self::reader_side(disc, &reader, reader_ann, ann, fx);
                }
            }
        }
    }

    /// Match a local subscription against every known publication.
    fn match_subscription(
        &self,
        disc: &mut DiscoveryState,
        reader: &Arc<dyn ReaderEndpoint>,
        ann: &EndpointAnnouncement,
        fx: &mut Effects,
    ) {
        let publications: Vec<EndpointAnnouncement> = disc.publications.values().cloned().collect();
        for writer_ann in &publications {
            if self.skip_remote(disc, &writer_ann.guid) {
                continue;
            }
            Self::reader_side(disc, reader, ann, writer_ann, fx);
            if self.is_local(&writer_ann.guid) {
                if let Some(writer) = self.local_writer(&writer_ann.guid) {
                    Self::writer_side(disc, &writer, writer_ann, ann, fx);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Local endpoints
    // ------------------------------------------------------------------

    pub(crate) fn register_writer(&self, writer: Arc<WriterInner>) {
        self.writers.write().insert(writer.guid(), Arc::clone(&writer));
        self.reevaluate_writer(&writer);
    }

    /// Announce (again) a local writer and re-match it.
    pub(crate) fn reevaluate_writer(&self, writer: &Arc<WriterInner>) {
        if !writer.is_enabled() {
            return;
        }
        let ann = writer.announcement();
        let mut fx = Effects::default();
        {
            let mut disc = self.discovery.lock();
            disc.publications.insert(ann.guid, ann.clone());
            self.match_publication(&mut disc, writer, &ann, &mut fx);
            if self.announcing() {
                self.broadcast(DiscoveryMessage::Publication(ann));
            }
        }
        self.apply(fx);
    }

    /// Withdraw a writer. Local readers are unmatched when the removal comes
    /// back through the inbox, after the writer's last samples.
    pub(crate) fn unregister_writer(&self, writer: &Arc<WriterInner>) {
        let guid = writer.guid();
        if self.writers.write().remove(&guid).is_none() {
            return;
        }
        {
            let mut disc = self.discovery.lock();
            for (side, local, remote) in disc.matched_pairs_of(&guid) {
                if side == Side::Writer && local == guid {
                    disc.forget(side, local, remote);
                }
            }
            disc.publications.remove(&guid);
            let msg = Message::Discovery(DiscoveryMessage::PublicationRemoved(guid));
            if self.announcing() {
                self.domain.send(Envelope::broadcast(self.prefix, msg));
            } else {
                self.domain.send(Envelope::to(self.prefix, self.prefix, msg));
            }
        }
        log::debug!("[discovery] publication {} withdrawn", guid);
    }

    pub(crate) fn register_reader(&self, reader: Arc<dyn ReaderEndpoint>) {
        {
            let mut readers = self.readers.write();
            if !readers.iter().any(|r| r.guid() == reader.guid()) {
                readers.push(Arc::clone(&reader));
            }
        }
        self.reevaluate_reader(&reader);
    }

    /// Announce (again) every component of a local reader and re-match it.
    pub(crate) fn reevaluate_reader(&self, reader: &Arc<dyn ReaderEndpoint>) {
        if !reader.is_enabled() {
            return;
        }
        let announcements = reader.announcements();
        {
            let mut routes = self.routes.write();
            for ann in &announcements {
                routes.insert(ann.guid, Arc::clone(reader));
            }
        }
        let mut fx = Effects::default();
        {
            let mut disc = self.discovery.lock();
            for ann in announcements {
                disc.subscriptions.insert(ann.guid, ann.clone());
                self.match_subscription(&mut disc, reader, &ann, &mut fx);
                if self.announcing() {
                    self.broadcast(DiscoveryMessage::Subscription(ann));
                }
            }
        }
        fx.readers.push(Arc::clone(reader));
        self.apply(fx);
    }

    pub(crate) fn unregister_reader(&self, reader: &Arc<dyn ReaderEndpoint>) {
        let guid = reader.guid();
        self.readers.write().retain(|r| r.guid() != guid);
        let announcements = reader.announcements();
        let mut fx = Effects::default();
        {
            let mut disc = self.discovery.lock();
            for ann in &announcements {
                for (side, local, remote) in disc.matched_pairs_of(&ann.guid) {
                    if side != Side::Writer || remote != ann.guid {
                        continue;
                    }
                    if let Some(writer) = self.local_writer(&local) {
                        writer.on_reader_unmatched(remote);
                        fx.writers.push(writer);
                    }
                }
                disc.forget_endpoint(&ann.guid);
                disc.subscriptions.remove(&ann.guid);
                self.routes.write().remove(&ann.guid);
                if self.announcing() {
                    self.broadcast(DiscoveryMessage::SubscriptionRemoved(ann.guid));
                }
            }
        }
        self.apply(fx);
        if !announcements.is_empty() {
            log::debug!("[discovery] subscription {} withdrawn", guid);
        }
    }

    /// Record (or refresh) a local topic and announce it.
    pub(crate) fn announce_topic(&self, topic: &Arc<TopicInner>) {
        let ann = topic.announcement();
        let mut fx = Effects::default();
        {
            let mut disc = self.discovery.lock();
            let fresh = disc.topics.insert(ann.guid, ann.clone()).is_none();
            if fresh {
                let clash = disc.topics.values().any(|other| {
                    !self.is_local(&other.guid)
                        && other.name == ann.name
                        && other.type_name != ann.type_name
                });
                if clash {
                    fx.inconsistent.push(Arc::clone(topic));
                }
            }
            if self.announcing() {
                self.broadcast(DiscoveryMessage::Topic(ann));
            }
        }
        self.apply(fx);
    }

    pub(crate) fn withdraw_topic(&self, guid: GUID) {
        let mut disc = self.discovery.lock();
        if disc.topics.remove(&guid).is_some() && self.announcing() {
            self.broadcast(DiscoveryMessage::TopicRemoved(guid));
        }
    }

    /// Every announcement this participant makes, in discovery order.
    fn own_announcements(&self, disc: &DiscoveryState) -> Vec<DiscoveryMessage> {
        let mut out = vec![DiscoveryMessage::Participant(self.announcement())];
        out.extend(
            disc.topics
                .values()
                .filter(|t| self.is_local(&t.guid))
                .cloned()
                .map(DiscoveryMessage::Topic),
        );
        out.extend(
            disc.publications
                .values()
                .filter(|p| self.is_local(&p.guid))
                .cloned()
                .map(DiscoveryMessage::Publication),
        );
        out.extend(
            disc.subscriptions
                .values()
                .filter(|s| self.is_local(&s.guid))
                .cloned()
                .map(DiscoveryMessage::Subscription),
        );
        out
    }

    /// Broadcast the participant and all its endpoints and topics.
    pub(crate) fn announce_all(&self) {
        let disc = self.discovery.lock();
        for msg in self.own_announcements(&disc) {
            self.broadcast(msg);
        }
    }

    pub(crate) fn publication_data(&self, guid: &GUID) -> Option<PublicationBuiltinTopicData> {
        self.discovery
            .lock()
            .publications
            .get(guid)
            .map(PublicationBuiltinTopicData::from_announcement)
    }

    pub(crate) fn subscription_data(&self, guid: &GUID) -> Option<SubscriptionBuiltinTopicData> {
        self.discovery
            .lock()
            .subscriptions
            .get(guid)
            .map(SubscriptionBuiltinTopicData::from_announcement)
    }

    /// Assert liveliness of every writer but `except` (writes of
    /// ManualByParticipant writers assert their siblings).
    pub(crate) fn assert_liveliness_except(&self, except: GUID) {
        let writers: Vec<Arc<WriterInner>> = self.writers.read().values().cloned().collect();
        for writer in writers.iter().filter(|w| w.guid() != except) {
            writer.assert_from_participant();
        }
    }

    // ------------------------------------------------------------------
    // Incoming discovery traffic
    // ------------------------------------------------------------------

    pub(super) fn on_discovery(&self, src: GuidPrefix, msg: DiscoveryMessage) {
        log::trace!("[discovery] {} <- {:02x?}: {}", self.guid, &src[..4], msg.label());
        let mut fx = Effects::default();
        {
            let mut disc = self.discovery.lock();
            if src != self.prefix && disc.is_ignored(&src) {
                return;
            }
            match msg {
                DiscoveryMessage::Participant(ann) => self.on_participant(&mut disc, ann, &mut fx),
                DiscoveryMessage::SyncComplete => {
                    if src != self.prefix && disc.participants.mark_alive(&src) {
                        log::debug!("[discovery] participant {:02x?} alive", &src[..4]);
                    }
                }
                DiscoveryMessage::ParticipantGone(prefix) => {
                    self.on_participant_gone(&mut disc, prefix, &mut fx)
                }
                DiscoveryMessage::Publication(ann) => {
                    if !self.is_local(&ann.guid) {
                        self.on_remote_publication(&mut disc, ann, &mut fx);
                    }
                }
                DiscoveryMessage::Subscription(ann) => {
                    if !self.is_local(&ann.guid) {
                        self.on_remote_subscription(&mut disc, ann, &mut fx);
                    }
                }
                DiscoveryMessage::PublicationRemoved(guid) => {
                    self.on_publication_removed(&mut disc, guid, &mut fx)
                }
                DiscoveryMessage::SubscriptionRemoved(guid) => {
                    self.on_subscription_removed(&mut disc, guid, &mut fx)
                }
                DiscoveryMessage::Topic(ann) => {
                    if !self.is_local(&ann.guid) {
                        self.on_remote_topic(&mut disc, ann, &mut fx);
                    }
                }
                DiscoveryMessage::TopicRemoved(guid) => {
                    if !self.is_local(&guid) && disc.topics.remove(&guid).is_some() {
                        fx.builtin.push((
                            GUID::participant(guid.prefix),
                            BuiltinUpdate::Topic(guid.to_handle().0, None),
                        ));
                    }
                }
            }
        }
        self.apply(fx);
    }

    fn on_participant(&self, disc: &mut DiscoveryState, ann: ParticipantAnnouncement, fx: &mut Effects) {
        let prefix = ann.guid_prefix;
        if prefix == self.prefix || ann.domain_id != self.domain.id() {
            return;
        }
        let data = ParticipantBuiltinTopicData::from_announcement(&ann);
        let outcome = disc.participants.on_announcement(ann, Instant::now());
        match outcome {
            AnnounceOutcome::Refreshed => return,
            AnnounceOutcome::New => {
                log::info!("[discovery] {} discovered participant {:02x?}", self.guid, &prefix[..4]);
            }
            AnnounceOutcome::Revived => {
                log::info!("[discovery] {} participant {:02x?} is back", self.guid, &prefix[..4]);
                fx.revived.push(prefix);
            }
        }
        fx.builtin.push((
            GUID::participant(prefix),
            BuiltinUpdate::Participant(data.key.0, Some(data)),
        ));
        if self.announcing() {
            for msg in self.own_announcements(disc) {
                fx.envelopes
                    .push(Envelope::to(self.prefix, prefix, Message::Discovery(msg)));
            }
            fx.envelopes.push(Envelope::to(
                self.prefix,
                prefix,
                Message::Discovery(DiscoveryMessage::SyncComplete),
            ));
        }
    }

    fn on_participant_gone(&self, disc: &mut DiscoveryState, prefix: GuidPrefix, fx: &mut Effects) {
        if prefix == self.prefix {
            return;
        }
        for (side, local, remote) in disc.matched_pairs_with_participant(&prefix) {
            match side {
                Side::Writer => {
                    if let Some(writer) = self.local_writer(&local) {
                        writer.on_reader_unmatched(remote);
                        fx.writers.push(writer);
                    }
                }
                Side::Reader => {
                    if let Some(reader) = self.route(&local) {
                        reader.on_writer_unmatched(local, remote);
                        fx.readers.push(reader);
                    }
                }
            }
        }
        let source = GUID::participant(prefix);
        for guid in disc.publications.keys().filter(|g| g.prefix == prefix) {
            fx.builtin
                .push((source, BuiltinUpdate::Publication(guid.to_handle().0, None)));
        }
        for guid in disc.subscriptions.keys().filter(|g| g.prefix == prefix) {
            fx.builtin
                .push((source, BuiltinUpdate::Subscription(guid.to_handle().0, None)));
        }
        for guid in disc.topics.keys().filter(|g| g.prefix == prefix) {
            fx.builtin
                .push((source, BuiltinUpdate::Topic(guid.to_handle().0, None)));
        }
        if disc.participants.remove(&prefix).is_some() {
            fx.builtin
                .push((source, BuiltinUpdate::Participant(source.to_handle().0, None)));
        }
        disc.purge_participant(&prefix);
        log::info!("[discovery] {} participant {:02x?} removed", self.guid, &prefix[..4]);
    }

    fn on_remote_publication(&self, disc: &mut DiscoveryState, ann: EndpointAnnouncement, fx: &mut Effects) {
        disc.publications.insert(ann.guid, ann.clone());
        let subscriptions: Vec<EndpointAnnouncement> = disc
            .subscriptions
            .values()
            .filter(|s| self.is_local(&s.guid))
            .cloned()
            .collect();
        for reader_ann in &subscriptions {
            if let Some(reader) = self.route(&reader_ann.guid) {
                Self::reader_side(disc, &reader, reader_ann, &ann, fx);
            }
        }
        fx.builtin.push((
            GUID::participant(ann.guid.prefix),
            BuiltinUpdate::Publication(
                ann.guid.to_handle().0,
                Some(PublicationBuiltinTopicData::from_announcement(&ann)),
            ),
        ));
    }

    fn on_remote_subscription(&self, disc: &mut DiscoveryState, ann: EndpointAnnouncement, fx: &mut Effects) {
        disc.subscriptions.insert(ann.guid, ann.clone());
        let publications: Vec<EndpointAnnouncement> = disc
            .publications
            .values()
            .filter(|p| self.is_local(&p.guid))
            .cloned()
            .collect();
        for writer_ann in &publications {
            if let Some(writer) = self.local_writer(&writer_ann.guid) {
                Self::writer_side(disc, &writer, writer_ann, &ann, fx);
            }
        }
        fx.builtin.push((
            GUID::participant(ann.guid.prefix),
            BuiltinUpdate::Subscription(
                ann.guid.to_handle().0,
                Some(SubscriptionBuiltinTopicData::from_announcement(&ann)),
            ),
        ));
    }

    fn on_publication_removed(&self, disc: &mut DiscoveryState, guid: GUID, fx: &mut Effects) {
        for (side, local, remote) in disc.matched_pairs_of(&guid) {
            if side != Side::Reader || remote != guid {
                continue;
            }
            if let Some(reader) = self.route(&local) {
                reader.on_writer_unmatched(local, remote);
                fx.readers.push(reader);
            }
        }
        disc.forget_endpoint(&guid);
        if !self.is_local(&guid) && disc.publications.remove(&guid).is_some() {
            fx.builtin.push((
                GUID::participant(guid.prefix),
                BuiltinUpdate::Publication(guid.to_handle().0, None),
            ));
        }
    }

    fn on_subscription_removed(&self, disc: &mut DiscoveryState, guid: GUID, fx: &mut Effects) {
        if self.is_local(&guid) {
            return;
        }
        for (side, local, remote) in disc.matched_pairs_of(&guid) {
            if side != Side::Writer || remote != guid {
                continue;
            }
            if let Some(writer) = self.local_writer(&local) {
                writer.on_reader_unmatched(remote);
                fx.writers.push(writer);
            }
        }
        disc.forget_endpoint(&guid);
        if disc.subscriptions.remove(&guid).is_some() {
            fx.builtin.push((
                GUID::participant(guid.prefix),
                BuiltinUpdate::Subscription(guid.to_handle().0, None),
            ));
        }
    }

    fn on_remote_topic(&self, disc: &mut DiscoveryState, ann: TopicAnnouncement, fx: &mut Effects) {
        let fresh = disc.topics.insert(ann.guid, ann.clone()).is_none();
        if fresh {
            if let Some(TopicEntry::Topic(local)) = self.topics.lock().get(&ann.name) {
                if local.type_name != ann.type_name {
                    fx.inconsistent.push(Arc::clone(local));
                }
            }
        }
        fx.builtin.push((
            GUID::participant(ann.guid.prefix),
            BuiltinUpdate::Topic(
                ann.guid.to_handle().0,
                Some(TopicBuiltinTopicData::from_announcement(&ann)),
            ),
        ));
    }

    // ------------------------------------------------------------------
    // Leases
    // ------------------------------------------------------------------

    /// Expire silent participants and refresh our own announcement.
    pub(super) fn check_leases(&self, now: Instant) {
        let mut fx = Effects::default();
        {
            let mut disc = self.discovery.lock();
            for prefix in disc.participants.expire(now) {
                log::info!(
                    "[discovery] {} participant {:02x?} lost (lease expired)",
                    self.guid,
                    &prefix[..4]
                );
                let source = GUID::participant(prefix);
                fx.builtin
                    .push((source, BuiltinUpdate::Participant(source.to_handle().0, None)));
                fx.lost.push(prefix);
            }
        }
        self.apply(fx);

        if !self.announcing() {
            return;
        }
        let due = {
            let mut last = self.last_announce.lock();
            if now.saturating_duration_since(*last) >= self.timing.announcement_period {
                *last = now;
                true
            } else {
                false
            }
        };
        if due {
            self.broadcast(DiscoveryMessage::Participant(self.announcement()));
        }
    }

    /// Stop matching with a remote participant and drop what we know of it.
    pub(crate) fn ignore(&self, prefix: GuidPrefix) {
        let mut fx = Effects::default();
        {
            let mut disc = self.discovery.lock();
            disc.ignore(prefix);
            self.on_participant_gone(&mut disc, prefix, &mut fx);
        }
        self.apply(fx);
        log::info!("[discovery] {} ignoring participant {:02x?}", self.guid, &prefix[..4]);
    }
}
