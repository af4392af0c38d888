use serenity::model::id::UserId;
use std::collections::HashSet;

use super::error::{PlaybackError, PlaybackResult};

/// Result of casting a skip vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteResolution {
    /// Vote recorded, quorum not reached yet.
    Queued { votes: usize, required: usize },
    /// Quorum reached (or the voter is privileged). The caller advances.
    Resolved,
}

/// Skip votes for the track that is currently playing.
///
/// Pure bookkeeping: it never touches session state. The session clears it
/// whenever the current track changes.
#[derive(Debug, Default)]
pub struct SkipVoteTracker {
    votes: HashSet<UserId>,
}

impl SkipVoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Votes needed to skip with `listeners` non-bot users in the channel.
    pub fn required_votes(listeners: usize) -> usize {
        if listeners <= 2 {
            listeners
        } else {
            listeners - 1
        }
    }

    pub fn vote(
        &mut self,
        voter: UserId,
        listeners: usize,
        privileged: bool,
    ) -> PlaybackResult<VoteResolution> {
        if privileged {
            return Ok(VoteResolution::Resolved);
        }

        if !self.votes.insert(voter) {
            return Err(PlaybackError::AlreadyVoted);
        }

        let required = Self::required_votes(listeners);
        if self.votes.len() >= required {
            Ok(VoteResolution::Resolved)
        } else {
            Ok(VoteResolution::Queued {
                votes: self.votes.len(),
                required,
            })
        }
    }

    #[cfg(test)]
    pub fn count(&self) -> usize {
        self.votes.len()
    }

    #[cfg(test)]
    pub fn has_voted(&self, voter: UserId) -> bool {
        self.votes.contains(&voter)
    }

    pub fn clear(&mut self) {
        self.votes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn user(id: u64) -> UserId {
        UserId::new(id)
    }

    /// Casts votes from distinct users until the tracker resolves.
    fn votes_until_resolved(listeners: usize) -> usize {
        let mut tracker = SkipVoteTracker::new();
        for id in 1..=listeners.max(1) as u64 {
            if tracker.vote(user(id), listeners, false).unwrap() == VoteResolution::Resolved {
                return id as usize;
            }
        }
        panic!("quorum never reached for {listeners} listeners");
    }

    #[test]
    fn quorum_table() {
        assert_eq!(votes_until_resolved(1), 1);
        assert_eq!(votes_until_resolved(2), 2);
        assert_eq!(votes_until_resolved(3), 2);
        assert_eq!(votes_until_resolved(5), 4);
    }

    #[test]
    fn required_votes_formula() {
        assert_eq!(SkipVoteTracker::required_votes(0), 0);
        assert_eq!(SkipVoteTracker::required_votes(1), 1);
        assert_eq!(SkipVoteTracker::required_votes(2), 2);
        assert_eq!(SkipVoteTracker::required_votes(3), 2);
        assert_eq!(SkipVoteTracker::required_votes(10), 9);
    }

    #[test]
    fn duplicate_vote_is_reported_and_not_counted() {
        let mut tracker = SkipVoteTracker::new();
        assert_eq!(
            tracker.vote(user(1), 5, false).unwrap(),
            VoteResolution::Queued {
                votes: 1,
                required: 4
            }
        );
        assert!(matches!(
            tracker.vote(user(1), 5, false),
            Err(PlaybackError::AlreadyVoted)
        ));
        assert_eq!(tracker.count(), 1);
    }

    #[test]
    fn privileged_voter_resolves_immediately() {
        let mut tracker = SkipVoteTracker::new();
        tracker.vote(user(1), 6, false).unwrap();
        assert_eq!(
            tracker.vote(user(2), 6, true).unwrap(),
            VoteResolution::Resolved
        );
        // a privileged skip works even after voting normally
        assert_eq!(
            tracker.vote(user(1), 6, true).unwrap(),
            VoteResolution::Resolved
        );
    }

    #[test]
    fn zero_listeners_resolves_on_first_vote() {
        let mut tracker = SkipVoteTracker::new();
        assert_eq!(
            tracker.vote(user(1), 0, false).unwrap(),
            VoteResolution::Resolved
        );
    }

    #[test]
    fn clear_forgets_voters() {
        let mut tracker = SkipVoteTracker::new();
        tracker.vote(user(1), 4, false).unwrap();
        assert!(tracker.has_voted(user(1)));

        tracker.clear();
        assert_eq!(tracker.count(), 0);
        assert!(!tracker.has_voted(user(1)));
        assert!(tracker.vote(user(1), 4, false).is_ok());
    }
}
