// The applier side: a pool of worker threads pulling certified remote
// write-sets off `wsrep-gcs::ActionFifo` in parallel, serialised
// through the certifier for the conflict-detection critical section
// and committing in seqno order unless `CommitOrder::Oooc` and the
// certifier has proven two write-sets share no keys. The point where a
// resolved write-set actually executes, generalized from one
// in-process evaluator to a thread pool pulling from a shared queue.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use wsrep_base::Seqno;
use wsrep_cert::WriteSet;

use crate::config::CommitOrder;

/// What the embedding database implements to actually apply a
/// certified write-set's bytes.
pub trait Apply: Send + Sync {
    fn apply(&self, seqno: Seqno, ws: &WriteSet);
}

/// Tracks which seqnos have committed so `commit(seqno)` callers and
/// the donor/purge path can compute `last_committed` as the minimum
/// still-open seqno.
#[derive(Default)]
pub struct CommitTracker {
    inner: Mutex<CommitTrackerInner>,
}

#[derive(Default)]
struct CommitTrackerInner {
    pending: BTreeSet<i64>,
}

impl CommitTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(CommitTracker::default())
    }

    pub fn mark_pending(&self, seqno: Seqno) {
        self.inner.lock().unwrap().pending.insert(seqno.0);
    }

    pub fn mark_committed(&self, seqno: Seqno) {
        self.inner.lock().unwrap().pending.remove(&seqno.0);
    }

    /// The minimum pending seqno, or `None` if nothing is outstanding
    /// — the value the certifier's purge pass uses as `last_committed`.
    pub fn last_committed(&self) -> Option<Seqno> {
        self.inner
            .lock()
            .unwrap()
            .pending
            .iter()
            .next()
            .copied()
            .map(|s| Seqno(s - 1))
    }
}

/// Whether a write-set certified at `seqno` may commit ahead of an
/// earlier, still-uncommitted seqno: only under `CommitOrder::Oooc`
/// and only when the certifier reported the two share no keys (the
/// caller passes that verdict in as `non_conflicting`).
pub fn may_commit_out_of_order(policy: CommitOrder, non_conflicting: bool) -> bool {
    matches!(policy, CommitOrder::Oooc) && non_conflicting
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn last_committed_is_the_lowest_still_pending_minus_one() {
        let tracker = CommitTracker::new();
        tracker.mark_pending(Seqno(1));
        tracker.mark_pending(Seqno(2));
        tracker.mark_pending(Seqno(3));
        tracker.mark_committed(Seqno(1));
        assert_eq!(tracker.last_committed(), Some(Seqno(1)));
    }

    #[test]
    fn bypass_policy_never_allows_out_of_order_commit() {
        assert!(!may_commit_out_of_order(CommitOrder::Bypass, true));
        assert!(may_commit_out_of_order(CommitOrder::Oooc, true));
        assert!(!may_commit_out_of_order(CommitOrder::Oooc, false));
    }
}
