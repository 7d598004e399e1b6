// The node-local lifecycle GCS drives: `Closed -> Open -> Connected ->
// Joiner -> Donor|Joined -> Synced -> Donor|Synced`. This is the
// shape `wsrep-repl`'s replicator state machine sits on top of; GCS
// only needs to know enough to route STATE_REQ/SYNC actions and to
// refuse CommitCut/Writeset application outside the states where
// that's legal.

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum NodeState {
    Closed,
    Open,
    Connected,
    Joiner,
    Donor,
    Joined,
    Synced,
}

#[derive(Debug, Eq, PartialEq)]
pub struct IllegalTransition {
    pub from: NodeState,
    pub to: NodeState,
}

impl NodeState {
    /// Every edge the lifecycle actually allows. `Donor`
    /// and `Synced` both loop back to themselves and to each other
    /// (a synced node can be asked to donate and a donor returns to
    /// synced once the snapshot ships), matching the `Donor|Synced`
    /// notation.
    fn allowed(self, to: NodeState) -> bool {
        use NodeState::*;
        matches!(
            (self, to),
            (Closed, Open)
                | (Open, Connected)
                | (Connected, Joiner)
                | (Connected, Joined)
                | (Joiner, Joined)
                | (Joined, Synced)
                | (Synced, Donor)
                | (Donor, Synced)
                | (_, Closed)
        )
    }

    pub fn transition(self, to: NodeState) -> Result<NodeState, IllegalTransition> {
        if self.allowed(to) {
            Ok(to)
        } else {
            Err(IllegalTransition { from: self, to })
        }
    }

    /// Write-sets and commit cuts may only be applied once a node has
    /// caught up; `Donor` keeps applying while it ships a snapshot.
    pub fn may_apply(self) -> bool {
        matches!(self, NodeState::Synced | NodeState::Donor)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use NodeState::*;

    #[test]
    fn walks_the_full_happy_path() {
        let mut s = Closed;
        for next in [Open, Connected, Joiner, Joined, Synced, Donor, Synced] {
            s = s.transition(next).unwrap();
        }
        assert_eq!(s, Synced);
    }

    #[test]
    fn rejects_skipping_joiner_states() {
        assert!(Open.transition(Synced).is_err());
    }

    #[test]
    fn any_state_can_close() {
        assert_eq!(Synced.transition(Closed), Ok(Closed));
    }

    #[test]
    fn only_synced_or_donor_may_apply() {
        assert!(Synced.may_apply());
        assert!(Donor.may_apply());
        assert!(!Joiner.may_apply());
    }
}
