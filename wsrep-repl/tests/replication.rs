// End-to-end exercise of a single replicator's local path: connect,
// replicate a non-conflicting pair, reject a conflicting one, commit,
// and purge. Mirrors spec scenario S1 (three-node primary, local
// replicate succeeds) narrowed to what a single node's API surface can
// exercise without a real network.

use std::sync::Mutex;

use wsrep_base::{MemberId, Seqno};
use wsrep_cert::WriteSet;
use wsrep_gcs::NodeState;
use wsrep_repl::{Apply, Config, Replicator, Role};

struct RecordingApplier {
    applied: Mutex<Vec<Seqno>>,
}

impl RecordingApplier {
    fn new() -> Self {
        RecordingApplier {
            applied: Mutex::new(Vec::new()),
        }
    }
}

impl Apply for RecordingApplier {
    fn apply(&self, seqno: Seqno, _ws: &WriteSet) {
        self.applied.lock().unwrap().push(seqno);
    }
}

fn writeset(source: MemberId, last_seen: i64, key: &[u8]) -> WriteSet {
    WriteSet::new(source, 0, Seqno(last_seen), vec![key.to_vec()], b"payload".to_vec())
}

#[test]
fn local_replicate_certifies_and_applies() {
    let mut repl = Replicator::new(Config::default(), Role::Member, RecordingApplier::new()).unwrap();
    repl.connect("cluster://test", "node-a").unwrap();

    let me = repl.my_id();
    // seqno 0 was already consumed by the bootstrap view's ConfChange
    // action delivered inside connect().
    let seqno = repl.replicate(writeset(me, -1, b"k1")).unwrap();
    assert_eq!(seqno, Seqno(1));
}

#[test]
fn conflicting_local_writeset_is_rejected_as_cert_failure() {
    let mut repl = Replicator::new(Config::default(), Role::Member, RecordingApplier::new()).unwrap();
    repl.connect("cluster://test", "node-a").unwrap();
    let me = repl.my_id();

    repl.replicate(writeset(me, -1, b"k1")).unwrap();
    let err = repl.replicate(writeset(me, -1, b"k1")).unwrap_err();
    assert_eq!(err.kind(), wsrep_base::ErrorKind::CertificationFailed);
}

#[test]
fn commit_releases_the_gcache_entry() {
    let mut repl = Replicator::new(Config::default(), Role::Member, RecordingApplier::new()).unwrap();
    repl.connect("cluster://test", "node-a").unwrap();
    let me = repl.my_id();

    let seqno = repl.replicate(writeset(me, -1, b"k1")).unwrap();
    repl.commit(seqno).unwrap();
}

#[test]
fn bootstrapping_a_lone_node_reaches_synced_so_it_may_originate() {
    let mut repl = Replicator::new(Config::default(), Role::Member, RecordingApplier::new()).unwrap();
    repl.connect("cluster://test", "node-a").unwrap();
    assert_eq!(repl.state(), NodeState::Synced);

    let me = repl.my_id();
    // Only a Synced node may originate a write-set; a lone bootstrap
    // node must reach it without any donor or IST.
    repl.replicate(writeset(me, -1, b"k1")).unwrap();
}

#[test]
fn to_execute_start_rejects_reentrant_calls() {
    let mut repl = Replicator::new(Config::default(), Role::Member, RecordingApplier::new()).unwrap();
    repl.connect("cluster://test", "node-a").unwrap();
    let me = repl.my_id();

    repl.to_execute_start(writeset(me, -1, b"ddl-key")).unwrap();
    let err = repl.to_execute_start(writeset(me, -1, b"other-key")).unwrap_err();
    assert_eq!(err.kind(), wsrep_base::ErrorKind::Conflict);
    repl.to_execute_end().unwrap();
}
