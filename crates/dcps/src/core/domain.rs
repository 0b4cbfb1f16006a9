// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process domain bus.
//!
//! Participants of the same domain exchange submessages through unbounded
//! crossbeam channels, one inbox per participant. Every send goes through
//! [`Domain::send`], including messages a participant addresses to itself, so
//! delivery order between two participants is FIFO.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use crossbeam::channel::Sender;
use dashmap::DashMap;

use crate::core::discovery::messages::DiscoveryMessage;
use crate::core::guid::GuidPrefix;
use crate::dds::InstanceHandle;
use crate::reliability::{AckNackMsg, DataMsg, GapMsg, HeartbeatMsg, LivelinessMsg};

/// Category of a submessage travelling on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmessageKind {
    Discovery,
    Data,
    Heartbeat,
    AckNack,
    Gap,
    Liveliness,
}

/// What a drop filter sees of a submessage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submessage {
    pub kind: SubmessageKind,
    /// Sequence number for DATA, and the last sequence for HEARTBEAT.
    pub sequence: Option<u64>,
    pub writer: Option<InstanceHandle>,
    pub reader: Option<InstanceHandle>,
    /// Set on DATA sent in answer to an ACKNACK.
    pub retransmit: bool,
}

/// Test hook: returns `true` for submessages the bus must drop.
pub type DropFilter = Arc<dyn Fn(&Submessage) -> bool + Send + Sync>;

pub(crate) struct DropRule {
    filter: DropFilter,
}

/// Drop filter shared between a factory and all its domains.
pub(crate) type SharedDropRule = Arc<ArcSwapOption<DropRule>>;

pub(crate) fn set_drop_rule(shared: &SharedDropRule, filter: Option<DropFilter>) {
    shared.store(filter.map(|filter| Arc::new(DropRule { filter })));
}

#[derive(Debug, Clone)]
pub(crate) enum Message {
    Discovery(DiscoveryMessage),
    Data(DataMsg),
    Heartbeat(HeartbeatMsg),
    AckNack(AckNackMsg),
    Gap(GapMsg),
    Liveliness(LivelinessMsg),
}

impl Message {
    pub(crate) fn summary(&self) -> Submessage {
        let mut summary = Submessage {
            kind: SubmessageKind::Discovery,
            sequence: None,
            writer: None,
            reader: None,
            retransmit: false,
        };
        match self {
            Message::Discovery(_) => {}
            Message::Data(data) => {
                summary.kind = SubmessageKind::Data;
                summary.sequence = Some(data.seq);
                summary.writer = Some(data.writer.to_handle());
                summary.reader = Some(data.reader.to_handle());
                summary.retransmit = data.retransmit;
            }
            Message::Heartbeat(hb) => {
                summary.kind = SubmessageKind::Heartbeat;
                summary.sequence = Some(hb.last_seq);
                summary.writer = Some(hb.writer.to_handle());
                summary.reader = Some(hb.reader.to_handle());
            }
            Message::AckNack(ack) => {
                summary.kind = SubmessageKind::AckNack;
                summary.writer = Some(ack.writer.to_handle());
                summary.reader = Some(ack.reader.to_handle());
            }
            Message::Gap(gap) => {
                summary.kind = SubmessageKind::Gap;
                summary.sequence = gap.sequences.first().copied();
                summary.writer = Some(gap.writer.to_handle());
                summary.reader = Some(gap.reader.to_handle());
            }
            Message::Liveliness(msg) => {
                summary.kind = SubmessageKind::Liveliness;
                summary.writer = Some(msg.writer.to_handle());
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Destination {
    Broadcast,
    Participant(GuidPrefix),
}

#[derive(Debug, Clone)]
pub(crate) struct Envelope {
    pub src: GuidPrefix,
    pub dst: Destination,
    pub msg: Message,
}

impl Envelope {
    pub(crate) fn to(src: GuidPrefix, dst: GuidPrefix, msg: Message) -> Self {
        Self {
            src,
            dst: Destination::Participant(dst),
            msg,
        }
    }

    pub(crate) fn broadcast(src: GuidPrefix, msg: Message) -> Self {
        Self {
            src,
            dst: Destination::Broadcast,
            msg,
        }
    }
}

/// One domain: the set of participant inboxes sharing a domain id.
pub(crate) struct Domain {
    id: u32,
    members: DashMap<GuidPrefix, Sender<Envelope>>,
    drop_rule: SharedDropRule,
}

impl Domain {
    pub(crate) fn new(id: u32, drop_rule: SharedDropRule) -> Self {
        Self {
            id,
            members: DashMap::new(),
            drop_rule,
        }
    }

    pub(crate) fn id(&self) -> u32 {
        self.id
    }

    pub(crate) fn join(&self, prefix: GuidPrefix, inbox: Sender<Envelope>) {
        self.members.insert(prefix, inbox);
        log::debug!(
            "[domain] {} member joined ({} total)",
            self.id,
            self.members.len()
        );
    }

    pub(crate) fn leave(&self, prefix: &GuidPrefix) {
        self.members.remove(prefix);
    }

    fn dropped(&self, msg: &Message) -> bool {
        let guard = self.drop_rule.load();
        match guard.as_ref() {
            Some(rule) => {
                let summary = msg.summary();
                let drop = (rule.filter)(&summary);
                if drop {
                    log::trace!("[domain] {} dropped {:?}", self.id, summary);
                }
                drop
            }
            None => false,
        }
    }

    /// Deliver an envelope. Unknown destinations are silently ignored.
    pub(crate) fn send(&self, envelope: Envelope) {
        if self.dropped(&envelope.msg) {
            return;
        }
        match envelope.dst {
            Destination::Participant(prefix) => {
                let sender = self.members.get(&prefix).map(|s| s.value().clone());
                if let Some(sender) = sender {
                    // A closed inbox means the participant is shutting down.
                    let _ = sender.send(envelope);
                }
            }
            Destination::Broadcast => {
                let senders: Vec<Sender<Envelope>> =
                    self.members.iter().map(|s| s.value().clone()).collect();
                for sender in senders {
                    let _ = sender.send(envelope.clone());
                }
            }
        }
    }

    pub(crate) fn send_all(&self, envelopes: Vec<Envelope>) {
        for envelope in envelopes {
            self.send(envelope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::guid::{generate_prefix, GUID};
    use crate::reliability::LivelinessMsg;
    use crossbeam::channel::unbounded;

    fn liveliness(prefix: GuidPrefix) -> Message {
        Message::Liveliness(LivelinessMsg {
            writer: GUID::participant(prefix),
        })
    }

    #[test]
    fn test_broadcast_reaches_every_member() {
        let domain = Domain::new(0, Arc::new(ArcSwapOption::empty()));
        let (a_tx, a_rx) = unbounded();
        let (b_tx, b_rx) = unbounded();
        let a = generate_prefix(0);
        let b = generate_prefix(0);
        domain.join(a, a_tx);
        domain.join(b, b_tx);

        domain.send(Envelope::broadcast(a, liveliness(a)));
        assert!(a_rx.try_recv().is_ok());
        assert!(b_rx.try_recv().is_ok());

        domain.send(Envelope::to(a, b, liveliness(a)));
        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_ok());

        domain.leave(&b);
        domain.send(Envelope::broadcast(a, liveliness(a)));
        assert!(a_rx.try_recv().is_ok());
        assert!(b_rx.try_recv().is_err());
    }

    #[test]
    fn test_drop_filter() {
        let rule: SharedDropRule = Arc::new(ArcSwapOption::empty());
        let domain = Domain::new(1, Arc::clone(&rule));
        let (tx, rx) = unbounded();
        let me = generate_prefix(1);
        domain.join(me, tx);

        set_drop_rule(
            &rule,
            Some(Arc::new(|sub: &Submessage| sub.kind == SubmessageKind::Liveliness)),
        );
        domain.send(Envelope::broadcast(me, liveliness(me)));
        assert!(rx.try_recv().is_err());

        set_drop_rule(&rule, None);
        domain.send(Envelope::broadcast(me, liveliness(me)));
        assert!(rx.try_recv().is_ok());
    }
}
