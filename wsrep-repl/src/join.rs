// State-transfer choreography, both sides. A joiner requests a
// snapshot out-of-band from a chosen donor, then drains whatever was
// cached in L3 for the range the snapshot didn't cover ("IST"); a
// donor pauses its own flow control while the snapshot ships but keeps
// replicating. A single explicit donor rather than a quorum vote.

use wsrep_base::{MemberId, Seqno};
use wsrep_gcache::Gcache;

#[derive(Clone, Debug)]
pub struct JoinRequest {
    pub joiner: MemberId,
    pub donor: MemberId,
    /// Highest seqno the joiner already has a consistent snapshot for;
    /// `NONE` if it has nothing and needs a full state transfer.
    pub snapshot_seqno: Seqno,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JoinProgress {
    AwaitingDonorAck,
    /// Streaming cached write-sets in `[next, upto]` from L3.
    StreamingIst { next: Seqno, upto: Seqno },
    CaughtUp,
}

pub struct Joiner {
    request: JoinRequest,
    progress: JoinProgress,
}

impl Joiner {
    pub fn new(request: JoinRequest) -> Self {
        Joiner {
            request,
            progress: JoinProgress::AwaitingDonorAck,
        }
    }

    pub fn progress(&self) -> JoinProgress {
        self.progress
    }

    /// Called once the donor has acknowledged the STATE_REQ and the
    /// out-of-band snapshot has landed at `current_seqno`: begins IST
    /// for whatever the snapshot didn't already cover.
    pub fn on_donor_ack(&mut self, current_seqno: Seqno) {
        let next = if self.request.snapshot_seqno.is_none() {
            Seqno(0)
        } else {
            self.request.snapshot_seqno.next()
        };
        self.progress = if next > current_seqno {
            JoinProgress::CaughtUp
        } else {
            JoinProgress::StreamingIst {
                next,
                upto: current_seqno,
            }
        };
    }

    /// Pulls the next cached write-set from L3 during IST. Returns
    /// `None` once every seqno in the requested range has been
    /// drained, at which point the caller should multicast SYNC and
    /// move to `Synced`.
    pub fn pull_next(&mut self, gcache: &mut Gcache) -> wsrep_base::Result<Option<(Seqno, Vec<u8>)>> {
        let JoinProgress::StreamingIst { next, upto } = self.progress else {
            return Ok(None);
        };
        if next > upto {
            self.progress = JoinProgress::CaughtUp;
            return Ok(None);
        }
        let bytes = gcache.bytes(next)?;
        self.progress = JoinProgress::StreamingIst {
            next: next.next(),
            upto,
        };
        Ok(Some((next, bytes)))
    }

    pub fn is_caught_up(&self) -> bool {
        matches!(self.progress, JoinProgress::CaughtUp)
    }
}

/// Tracks a donor's obligation while a snapshot is in flight: flow
/// control on its own applier stays paused (it keeps replicating, but
/// may fall behind) until the snapshot has shipped and any requested
/// IST range has been streamed.
pub struct Donor {
    joiner: MemberId,
    desynced: bool,
}

impl Donor {
    pub fn new(joiner: MemberId) -> Self {
        Donor {
            joiner,
            desynced: true,
        }
    }

    pub fn joiner(&self) -> MemberId {
        self.joiner
    }

    pub fn is_desynced(&self) -> bool {
        self.desynced
    }

    pub fn finish(&mut self) {
        self.desynced = false;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use wsrep_gcache::{Gcache, GcacheConfig};

    fn gcache(tag: &str) -> Gcache {
        Gcache::open(GcacheConfig {
            mem_max: 4096,
            page_size: 4096,
            page_dir: std::env::temp_dir().join(format!("wsrep-repl-join-test-{tag}-{}", std::process::id())),
        })
        .unwrap()
    }

    #[test]
    fn ist_drains_exactly_the_uncovered_range() {
        let mut cache = gcache("drain");
        for s in 0..5i64 {
            cache.append(Seqno(s), format!("ws{s}").as_bytes()).unwrap();
        }
        let req = JoinRequest {
            joiner: MemberId::new(),
            donor: MemberId::new(),
            snapshot_seqno: Seqno(1),
        };
        let mut joiner = Joiner::new(req);
        joiner.on_donor_ack(Seqno(4));
        let mut seen = Vec::new();
        while let Some((seqno, _)) = joiner.pull_next(&mut cache).unwrap() {
            seen.push(seqno);
        }
        assert_eq!(seen, vec![Seqno(2), Seqno(3), Seqno(4)]);
        assert!(joiner.is_caught_up());
    }

    #[test]
    fn snapshot_already_current_needs_no_ist() {
        let req = JoinRequest {
            joiner: MemberId::new(),
            donor: MemberId::new(),
            snapshot_seqno: Seqno(10),
        };
        let mut joiner = Joiner::new(req);
        joiner.on_donor_ack(Seqno(10));
        assert!(joiner.is_caught_up());
    }
}
