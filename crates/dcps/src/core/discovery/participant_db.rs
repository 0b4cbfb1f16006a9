// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Remote participant database with lease tracking.
//!
//! ```text
//! Unknown --announce--> Discovered --sync--> Alive
//!                           ^                  |
//!                           +--announce-- Lost <+ lease expired
//! Discovered/Alive/Lost --gone--> (removed)
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::messages::ParticipantAnnouncement;
use crate::core::guid::GuidPrefix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantState {
    /// Announcement received, endpoint sync still pending.
    Discovered,
    /// Endpoint sync processed.
    Alive,
    /// Lease expired; matches are kept in the not-alive state.
    Lost,
}

#[derive(Debug, Clone)]
pub struct RemoteParticipant {
    pub announcement: ParticipantAnnouncement,
    pub state: ParticipantState,
    pub last_seen: Instant,
}

impl RemoteParticipant {
    fn lease(&self) -> Duration {
        self.announcement.lease_duration
    }
}

/// What an announcement changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceOutcome {
    /// First announcement from this participant.
    New,
    /// Announcement from a participant that had been lost.
    Revived,
    /// Lease refresh from a known participant.
    Refreshed,
}

#[derive(Debug, Default)]
pub struct ParticipantDb {
    remotes: HashMap<GuidPrefix, RemoteParticipant>,
}

impl ParticipantDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_announcement(&mut self, announcement: ParticipantAnnouncement, now: Instant) -> AnnounceOutcome {
        match self.remotes.get_mut(&announcement.guid_prefix) {
            Some(remote) => {
                let outcome = if remote.state == ParticipantState::Lost {
                    remote.state = ParticipantState::Discovered;
                    AnnounceOutcome::Revived
                } else {
                    AnnounceOutcome::Refreshed
                };
                remote.announcement = announcement;
                remote.last_seen = now;
                outcome
            }
            None => {
                self.remotes.insert(
                    announcement.guid_prefix,
                    RemoteParticipant {
                        announcement,
                        state: ParticipantState::Discovered,
                        last_seen: now,
                    },
                );
                AnnounceOutcome::New
            }
        }
    }

    /// Endpoint sync from `prefix` completed.
    pub fn mark_alive(&mut self, prefix: &GuidPrefix) -> bool {
        match self.remotes.get_mut(prefix) {
            Some(remote) if remote.state == ParticipantState::Discovered => {
                remote.state = ParticipantState::Alive;
                true
            }
            _ => false,
        }
    }

    /// Move every participant whose lease ran out to `Lost`; returns them.
    pub fn expire(&mut self, now: Instant) -> Vec<GuidPrefix> {
        let mut lost = Vec::new();
        for (prefix, remote) in &mut self.remotes {
            if remote.state == ParticipantState::Lost {
                continue;
            }
            if now.saturating_duration_since(remote.last_seen) > remote.lease() {
                remote.state = ParticipantState::Lost;
                lost.push(*prefix);
            }
        }
        lost
    }

    pub fn remove(&mut self, prefix: &GuidPrefix) -> Option<RemoteParticipant> {
        self.remotes.remove(prefix)
    }

    pub fn get(&self, prefix: &GuidPrefix) -> Option<&RemoteParticipant> {
        self.remotes.get(prefix)
    }

    pub fn state(&self, prefix: &GuidPrefix) -> Option<ParticipantState> {
        self.remotes.get(prefix).map(|r| r.state)
    }

    pub fn is_lost(&self, prefix: &GuidPrefix) -> bool {
        self.state(prefix) == Some(ParticipantState::Lost)
    }

    /// Participants currently discovered or alive.
    pub fn active(&self) -> impl Iterator<Item = &RemoteParticipant> {
        self.remotes
            .values()
            .filter(|r| r.state != ParticipantState::Lost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::guid::generate_prefix;

    fn announcement(prefix: GuidPrefix, lease_ms: u64) -> ParticipantAnnouncement {
        ParticipantAnnouncement {
            guid_prefix: prefix,
            domain_id: 0,
            lease_duration: Duration::from_millis(lease_ms),
            user_data: Vec::new(),
        }
    }

    #[test]
    fn test_lifecycle() {
        let mut db = ParticipantDb::new();
        let prefix = generate_prefix(0);
        let t0 = Instant::now();

        assert_eq!(db.on_announcement(announcement(prefix, 100), t0), AnnounceOutcome::New);
        assert_eq!(db.state(&prefix), Some(ParticipantState::Discovered));
        assert!(db.mark_alive(&prefix));
        assert!(!db.mark_alive(&prefix));

        assert!(db.expire(t0 + Duration::from_millis(50)).is_empty());
        assert_eq!(db.expire(t0 + Duration::from_millis(150)), vec![prefix]);
        assert!(db.is_lost(&prefix));
        assert_eq!(db.active().count(), 0);
        assert!(db.expire(t0 + Duration::from_millis(300)).is_empty());

        let later = t0 + Duration::from_millis(400);
        assert_eq!(db.on_announcement(announcement(prefix, 100), later), AnnounceOutcome::Revived);
        assert_eq!(db.state(&prefix), Some(ParticipantState::Discovered));
        assert_eq!(db.on_announcement(announcement(prefix, 100), later), AnnounceOutcome::Refreshed);

        assert!(db.remove(&prefix).is_some());
        assert!(db.get(&prefix).is_none());
    }
}
