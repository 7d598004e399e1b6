// GCS turns group-comm deliveries into a monotonic stream of actions.
// Which member received the payload first is irrelevant: delivery is
// already totally ordered, so every member's `Sequencer` stamps the
// same next global seqno onto the same payload without coordination.

use serde::{Deserialize, Serialize};
use wsrep_base::{LocalSeqno, MemberId, Seqno};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Writeset,
    CommitCut,
    ConfChange,
    StateReq,
    Sync,
    Join,
    Leave,
    Vote,
    Causal,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub seqno: Seqno,
    pub local_seqno: LocalSeqno,
    pub source: MemberId,
    pub payload: Vec<u8>,
}

/// Configuration-change actions (view changes, joins, leaves) also flow
/// through the action stream but carry no global seqno of their own
/// until GCS assigns one, same as a write-set.
impl Action {
    pub fn is_replicated(&self) -> bool {
        matches!(self.kind, ActionKind::Writeset)
    }
}

/// Per-member sequencer: every locally-delivered action (replicated or
/// control) gets a `LocalSeqno`; only the kinds that participate in
/// cluster-wide total order also get the next `Seqno`.
pub struct Sequencer {
    next_seqno: Seqno,
    next_local: LocalSeqno,
}

impl Sequencer {
    pub fn new() -> Self {
        Sequencer {
            next_seqno: Seqno(0),
            next_local: LocalSeqno(0),
        }
    }

    pub fn stamp(&mut self, kind: ActionKind, source: MemberId, payload: Vec<u8>) -> Action {
        let seqno = self.next_seqno;
        self.next_seqno = self.next_seqno.next();
        let local_seqno = self.next_local;
        self.next_local = self.next_local.next();
        Action {
            kind,
            seqno,
            local_seqno,
            source,
            payload,
        }
    }

    pub fn peek_next_seqno(&self) -> Seqno {
        self.next_seqno
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stamps_are_monotonic() {
        let mut seq = Sequencer::new();
        let source = MemberId::new();
        let a = seq.stamp(ActionKind::Writeset, source, vec![1]);
        let b = seq.stamp(ActionKind::CommitCut, source, vec![2]);
        assert_eq!(a.seqno, Seqno(0));
        assert_eq!(b.seqno, Seqno(1));
        assert_eq!(b.local_seqno, LocalSeqno(1));
    }
}
