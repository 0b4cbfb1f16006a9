// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery: participant lease tracking, endpoint database and matching.
//!
//! Each participant keeps one [`DiscoveryState`] fed by the announcements it
//! receives on the domain bus (its own included). Matching decisions are
//! deduplicated per `(local, remote)` pair and per side, so the same pair can
//! be evaluated from both the reader and the writer announcement without
//! double-counting matches or incompatibilities.

pub mod matcher;
pub mod messages;
pub mod participant_db;

pub use matcher::{evaluate, incompatible_policies, MatchOutcome};
pub use messages::{
    DiscoveryMessage, EndpointAnnouncement, ParticipantAnnouncement, TopicAnnouncement,
};
pub use participant_db::{AnnounceOutcome, ParticipantDb, ParticipantState, RemoteParticipant};

use std::collections::{HashMap, HashSet};

use crate::core::guid::{GuidPrefix, GUID};

/// Which local endpoint a pair decision belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Decision recorded for a local reader.
    Reader,
    /// Decision recorded for a local writer.
    Writer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    Matched,
    Incompatible,
}

/// Transition of a pair after re-evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairChange {
    None,
    Matched,
    Unmatched,
    /// Newly incompatible; `was_matched` when an existing match is torn down.
    Incompatible { was_matched: bool },
}

#[derive(Debug, Default)]
pub struct DiscoveryState {
    pub participants: ParticipantDb,
    pub publications: HashMap<GUID, EndpointAnnouncement>,
    pub subscriptions: HashMap<GUID, EndpointAnnouncement>,
    pub topics: HashMap<GUID, TopicAnnouncement>,
    pairs: HashMap<(Side, GUID, GUID), PairState>,
    ignored: HashSet<GuidPrefix>,
}

impl DiscoveryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore(&mut self, prefix: GuidPrefix) {
        self.ignored.insert(prefix);
    }

    pub fn is_ignored(&self, prefix: &GuidPrefix) -> bool {
        self.ignored.contains(prefix)
    }

    pub fn pair_state(&self, side: Side, local: GUID, remote: GUID) -> Option<PairState> {
        self.pairs.get(&(side, local, remote)).copied()
    }

    /// Apply a fresh evaluation outcome to the pair and report the change.
    pub fn apply(&mut self, side: Side, local: GUID, remote: GUID, outcome: &MatchOutcome) -> PairChange {
        let key = (side, local, remote);
        let previous = self.pairs.get(&key).copied();
        match (outcome, previous) {
            (MatchOutcome::Compatible, Some(PairState::Matched)) => PairChange::None,
            (MatchOutcome::Compatible, _) => {
                self.pairs.insert(key, PairState::Matched);
                PairChange::Matched
            }
            (MatchOutcome::Incompatible(_), Some(PairState::Incompatible)) => PairChange::None,
            (MatchOutcome::Incompatible(_), previous) => {
                self.pairs.insert(key, PairState::Incompatible);
                PairChange::Incompatible {
                    was_matched: previous == Some(PairState::Matched),
                }
            }
            (MatchOutcome::NoMatch, Some(PairState::Matched)) => {
                self.pairs.remove(&key);
                PairChange::Unmatched
            }
            (MatchOutcome::NoMatch, _) => {
                self.pairs.remove(&key);
                PairChange::None
            }
        }
    }

    /// Forget the pair; returns `true` when it was matched.
    pub fn forget(&mut self, side: Side, local: GUID, remote: GUID) -> bool {
        self.pairs.remove(&(side, local, remote)) == Some(PairState::Matched)
    }

    /// Matched pairs involving `guid` on either end.
    pub fn matched_pairs_of(&self, guid: &GUID) -> Vec<(Side, GUID, GUID)> {
        self.pairs
            .iter()
            .filter(|((_, local, remote), state)| {
                **state == PairState::Matched && (local == guid || remote == guid)
            })
            .map(|(key, _)| *key)
            .collect()
    }

    /// Matched pairs whose remote end belongs to `prefix`.
    pub fn matched_pairs_with_participant(&self, prefix: &GuidPrefix) -> Vec<(Side, GUID, GUID)> {
        self.pairs
            .iter()
            .filter(|((_, _, remote), state)| **state == PairState::Matched && remote.prefix == *prefix)
            .map(|(key, _)| *key)
            .collect()
    }

    /// Drop every pair decision involving `guid`.
    pub fn forget_endpoint(&mut self, guid: &GUID) {
        self.pairs
            .retain(|(_, local, remote), _| local != guid && remote != guid);
    }

    /// Remove every endpoint and topic of a participant from the database.
    pub fn purge_participant(&mut self, prefix: &GuidPrefix) {
        self.publications.retain(|guid, _| guid.prefix != *prefix);
        self.subscriptions.retain(|guid, _| guid.prefix != *prefix);
        self.topics.retain(|guid, _| guid.prefix != *prefix);
        self.pairs
            .retain(|(_, local, remote), _| local.prefix != *prefix && remote.prefix != *prefix);
    }
}
