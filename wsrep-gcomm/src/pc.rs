// On top of EVS views, decides which view is primary: a view is
// primary iff it holds a majority of the previous primary's members,
// or it's the bootstrap view. Ties — an even split with no majority
// either side — are broken by a single-round quorum vote among an
// optional arbitrator, via `VoteTracker`; this is explicitly not a
// general consensus log (out of scope: LAN-only, non-BFT), just
// enough bookkeeping for the one decision PC needs.

use std::collections::HashSet;

use wsrep_base::MemberId;

use crate::view::View;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Primacy {
    Primary,
    NonPrimary,
}

/// Applies the majority-of-previous-primary rule. `previous` is `None`
/// only for the very first view a node ever sees (the bootstrap case).
pub fn decide(candidate: &View, previous: Option<&View>) -> Primacy {
    let Some(previous) = previous else {
        return Primacy::Primary;
    };
    // `previous` is always the last known *primary* view, not merely
    // the prior view, so a non-primary component re-derives primacy
    // the moment enough of its original members rejoin.
    let overlap = candidate.overlap_with(previous);
    if overlap * 2 > previous.members.len() {
        Primacy::Primary
    } else {
        Primacy::NonPrimary
    }
}

/// A bounded single-round quorum counter: every current view member
/// (and, if present, the arbitrator) casts one `in_favor` vote on a
/// single proposition tied to one `view_id`; once a strict majority of
/// the expected voters has voted, the outcome is final and further
/// votes are ignored. No log, no retries, no multi-round negotiation.
pub struct VoteTracker {
    expected: HashSet<MemberId>,
    in_favor: HashSet<MemberId>,
    against: HashSet<MemberId>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VoteOutcome {
    Pending,
    Carried,
    Rejected,
}

impl VoteTracker {
    pub fn new(expected: impl IntoIterator<Item = MemberId>) -> Self {
        VoteTracker {
            expected: expected.into_iter().collect(),
            in_favor: HashSet::new(),
            against: HashSet::new(),
        }
    }

    pub fn cast(&mut self, voter: MemberId, in_favor: bool) {
        if !self.expected.contains(&voter) {
            return;
        }
        if in_favor {
            self.against.remove(&voter);
            self.in_favor.insert(voter);
        } else {
            self.in_favor.remove(&voter);
            self.against.insert(voter);
        }
    }

    pub fn outcome(&self) -> VoteOutcome {
        let quorum = self.expected.len() / 2 + 1;
        if self.in_favor.len() >= quorum {
            VoteOutcome::Carried
        } else if self.against.len() >= quorum {
            VoteOutcome::Rejected
        } else {
            VoteOutcome::Pending
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::view::{ViewId, ViewType};
    use uuid::Uuid;

    fn view(members: Vec<MemberId>, view_type: ViewType) -> View {
        View {
            view_id: ViewId::bootstrap(Uuid::new_v4()),
            view_type,
            members,
            my_index: 0,
            state_id: Uuid::nil(),
        }
    }

    #[test]
    fn bootstrap_view_is_always_primary() {
        let v = view(vec![MemberId::new()], ViewType::Primary);
        assert_eq!(decide(&v, None), Primacy::Primary);
    }

    #[test]
    fn majority_of_previous_is_primary() {
        let a = MemberId::new();
        let b = MemberId::new();
        let c = MemberId::new();
        let previous = view(vec![a, b, c], ViewType::Primary);
        let candidate = view(vec![a, b], ViewType::Primary);
        assert_eq!(decide(&candidate, Some(&previous)), Primacy::Primary);
    }

    #[test]
    fn minority_of_previous_is_non_primary() {
        let a = MemberId::new();
        let b = MemberId::new();
        let c = MemberId::new();
        let previous = view(vec![a, b, c], ViewType::Primary);
        let candidate = view(vec![a], ViewType::Primary);
        assert_eq!(decide(&candidate, Some(&previous)), Primacy::NonPrimary);
    }

    #[test]
    fn vote_tracker_requires_strict_majority() {
        let a = MemberId::new();
        let b = MemberId::new();
        let c = MemberId::new();
        let mut votes = VoteTracker::new(vec![a, b, c]);
        assert_eq!(votes.outcome(), VoteOutcome::Pending);
        votes.cast(a, true);
        assert_eq!(votes.outcome(), VoteOutcome::Pending);
        votes.cast(b, true);
        assert_eq!(votes.outcome(), VoteOutcome::Carried);
    }

    #[test]
    fn ignores_votes_from_unexpected_members() {
        let a = MemberId::new();
        let stranger = MemberId::new();
        let mut votes = VoteTracker::new(vec![a]);
        votes.cast(stranger, true);
        assert_eq!(votes.outcome(), VoteOutcome::Pending);
    }
}
