// The public surface the embedding database talks to: the thing that
// takes a prepared unit of work and drives it through
// replicate -> certify -> apply/commit, plus the
// connect/commit/to_execute_start/to_execute_end/desync/resync table
// an embedder needs around that.
//
// Network delivery itself (`wsrep-gcomm` frames arriving over
// `wsrep-reactor` sockets) is driven by the top-level crate's event
// loop, which calls `on_delivery` here for every `Up` it decodes; this
// type owns the certification/cache/state bookkeeping that happens in
// response, not the socket plumbing.

use std::sync::Arc;

use wsrep_base::{bad_request, err, ErrorKind, MemberId, Result, Seqno};
use wsrep_cert::{CertDisposition, CertEngine, CertOutcome, WriteSet};
use wsrep_gcache::{Gcache, GcacheConfig};
use wsrep_gcomm::{GmCast, GroupComm, Up};
use wsrep_gcs::{Gcs, NodeState};

use crate::apply::{Apply, CommitTracker};
use crate::config::{Config, DEFAULT_TRAILING_WINDOW};
use crate::join::{Donor, JoinProgress, JoinRequest, Joiner};
use crate::state::{ReplicatorState, Role};

pub struct Replicator<A: Apply> {
    role: Role,
    config: Config,
    group: GroupComm,
    gcs: Gcs,
    gcache: Gcache,
    cert: CertEngine,
    commit_tracker: Arc<CommitTracker>,
    joiner: Option<Joiner>,
    donor: Option<Donor>,
    executing_ddl: bool,
    desynced: bool,
    applier: A,
}

impl<A: Apply> Replicator<A> {
    pub fn new(config: Config, role: Role, applier: A) -> Result<Self> {
        let my_id = MemberId::new();
        let gcache = Gcache::open(GcacheConfig {
            mem_max: config.gcache.size,
            page_size: config.gcache.page_size,
            page_dir: config.gcache.dir.join(format!("{}-{my_id}", config.gcache.name)),
        })?;
        let cert = CertEngine::new(my_id, DEFAULT_TRAILING_WINDOW);
        let gmcast = GmCast::new(
            Vec::new(),
            std::time::Duration::from_millis(200),
            std::time::Duration::from_secs(2),
            std::time::Duration::from_secs(5),
        );
        let group = GroupComm::bootstrap(my_id, uuid::Uuid::new_v4(), gmcast);
        Ok(Replicator {
            role,
            config,
            group,
            gcs: Gcs::new(),
            gcache,
            cert,
            commit_tracker: CommitTracker::new(),
            joiner: None,
            donor: None,
            executing_ddl: false,
            desynced: false,
            applier,
        })
    }

    pub fn my_id(&self) -> MemberId {
        self.group.my_id()
    }

    pub fn state(&self) -> ReplicatorState {
        self.gcs.state()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Escape hatch for the wiring layer: it owns the reactor and the
    /// peer sockets, so it needs direct access to feed inbound frames
    /// through `GroupComm::handle_up` and to encode outbound ones
    /// through `GroupComm::pass_down` — this type only drives what
    /// happens once a delivery has already been produced.
    pub fn group_mut(&mut self) -> &mut GroupComm {
        &mut self.group
    }

    /// Opens the local state machine and records cluster identity.
    /// Blocking until the first PRIMARY view actually arrives is the
    /// wiring layer's job (it owns the reactor loop); this call
    /// prepares the replicator to accept that view's delivery.
    pub fn connect(&mut self, cluster_addr: &str, name: &str) -> Result<()> {
        self.config.cluster_name = cluster_addr.to_string();
        self.config.node_name = name.to_string();
        self.gcs
            .open()
            .map_err(|e| bad_request(format!("cannot connect from state {:?}", e.from)))?;
        // A freshly bootstrapped group-comm stack is already its own
        // singleton PRIMARY view; deliver it immediately rather than
        // waiting for a frame that will never arrive on a one-node
        // cluster. On a real multi-node join this first delivery comes
        // from the reactor loop instead.
        self.on_delivery(Up::ViewChange(self.group.current_view().clone()));
        // A lone bootstrapping node has no donor and nothing to stream:
        // it drives itself straight to Synced instead of waiting in
        // Connected for a join that will never happen, so only SYNCED
        // nodes ever originate write-sets.
        if self.group.current_view().is_primary() && self.group.current_view().members.len() == 1 {
            self.gcs
                .finish_joining()
                .map_err(|e| bad_request(format!("cannot finish joining from state {:?}", e.from)))?;
            self.gcs
                .mark_synced()
                .map_err(|e| bad_request(format!("cannot mark synced from state {:?}", e.from)))?;
        }
        Ok(())
    }

    /// Feeds one totally-ordered delivery from group-comm: a remote
    /// peer's frame decoded by `GroupComm::handle_up`, or the bootstrap
    /// view `connect()` delivers to itself. A locally-originated
    /// write-set never comes through here — `replicate()` certifies and
    /// applies it inline instead, so every `Writeset` action this
    /// method sees is, by construction, somebody else's. Returns the
    /// assigned seqno for a certified write-set, or `None` for a view
    /// change or a rejected/dropped remote write-set.
    pub fn on_delivery(&mut self, up: Up) -> Option<Seqno> {
        match &up {
            Up::ViewChange(view) => {
                if view.is_primary() && !view.contains(&self.my_id()) {
                    return None;
                }
            }
            Up::Payload { .. } => {}
        }
        let action = self.gcs.on_delivery(up)?;
        if action.kind != wsrep_gcs::ActionKind::Writeset {
            return None;
        }
        let seqno = action.seqno;
        let ws = WriteSet::decode(&action.payload).ok()?;
        let (outcome, _disposition) = self.cert.certify(seqno, &ws);
        if outcome != CertOutcome::Certified {
            return None;
        }
        let _ = self.gcache.append(seqno, &action.payload);
        self.commit_tracker.mark_pending(seqno);
        if self.role.applies_writesets() {
            self.applier.apply(seqno, &ws);
        }
        Some(seqno)
    }

    /// Submits a locally-originated write-set for replication. Only
    /// valid in a primary view; returns the assigned global seqno once
    /// certified, or a recoverable error otherwise.
    ///
    /// On a real multi-node cluster the wiring layer multicasts the
    /// encoded payload via `GroupComm::pass_down` and this call
    /// completes only once the totally-ordered echo of it comes back
    /// through `on_delivery`; here the stamping step is inlined so a
    /// single node can certify and apply its own write-sets without a
    /// network round trip.
    pub fn replicate(&mut self, ws: WriteSet) -> Result<Seqno> {
        if !self.group.current_view().is_primary() {
            return Err(err(ErrorKind::NotPrimary, "not connected to a primary view"));
        }
        if self.state() != NodeState::Synced {
            return Err(err(ErrorKind::NotConnected, "replicator has not finished joining"));
        }
        let source = self.my_id();
        let payload = ws.encode();
        let action = self
            .gcs
            .on_delivery(Up::Payload { source, payload })
            .expect("a payload delivery always yields an action");
        let seqno = action.seqno;
        let (outcome, disposition) = self.cert.certify(seqno, &ws);
        match (outcome, disposition) {
            (CertOutcome::Certified, _) => {
                self.gcache.append(seqno, &action.payload)?;
                self.commit_tracker.mark_pending(seqno);
                self.applier.apply(seqno, &ws);
                Ok(seqno)
            }
            (CertOutcome::Rejected, CertDisposition::RejectLocal) => Err(err(
                ErrorKind::CertificationFailed,
                "write-set conflicts with a more recently certified write-set",
            )),
            (CertOutcome::Rejected, _) => {
                unreachable!("a locally originated write-set is never silently dropped")
            }
        }
    }

    /// Records that the application has committed `seqno`, releasing
    /// its L3 buffer and advancing the certifier's trailing window.
    pub fn commit(&mut self, seqno: Seqno) -> Result<()> {
        self.commit_tracker.mark_committed(seqno);
        self.gcache.discard(seqno)?;
        if let Some(last_committed) = self.commit_tracker.last_committed() {
            self.cert.purge(last_committed);
            self.gcache.set_seqno_locked(last_committed);
            self.gcache.repossess();
        }
        Ok(())
    }

    /// Serialises total-order execution of a DDL-like write-set:
    /// replicates it like any other write-set but records that no
    /// other `to_execute_start` may begin until `to_execute_end`.
    pub fn to_execute_start(&mut self, ws: WriteSet) -> Result<Seqno> {
        if self.executing_ddl {
            return Err(err(ErrorKind::Conflict, "a to-execute write-set is already in progress"));
        }
        let seqno = self.replicate(ws)?;
        self.executing_ddl = true;
        Ok(seqno)
    }

    pub fn to_execute_end(&mut self) -> Result<()> {
        if !self.executing_ddl {
            return Err(bad_request("to_execute_end called without a matching to_execute_start"));
        }
        self.executing_ddl = false;
        Ok(())
    }

    /// Opts this member out of flow control: it keeps replicating but
    /// is allowed to lag, for the duration of a state transfer it's
    /// donating.
    pub fn desync(&mut self) -> Result<()> {
        self.gcs
            .become_donor()
            .map_err(|e| bad_request(format!("cannot desync from state {:?}", e.from)))?;
        self.desynced = true;
        self.donor = Some(Donor::new(self.my_id()));
        Ok(())
    }

    pub fn resync(&mut self) -> Result<()> {
        if let Some(donor) = &mut self.donor {
            donor.finish();
        }
        self.donor = None;
        self.desynced = false;
        self.gcs
            .finish_donating()
            .map_err(|e| bad_request(format!("cannot resync from state {:?}", e.from)))
    }

    pub fn is_desynced(&self) -> bool {
        self.desynced
    }

    /// Begins joining the cluster: requests state
    /// transfer from `donor`. Actual snapshot transport is out of band
    /// (the wiring layer's job); this just tracks IST bookkeeping once
    /// the donor acknowledges via [`Replicator::on_donor_ack`].
    pub fn begin_join(&mut self, donor: MemberId, snapshot_seqno: Seqno) -> Result<()> {
        self.gcs
            .begin_joining()
            .map_err(|e| bad_request(format!("cannot join from state {:?}", e.from)))?;
        self.joiner = Some(Joiner::new(JoinRequest {
            joiner: self.my_id(),
            donor,
            snapshot_seqno,
        }));
        Ok(())
    }

    pub fn on_donor_ack(&mut self, current_seqno: Seqno) {
        if let Some(joiner) = &mut self.joiner {
            joiner.on_donor_ack(current_seqno);
        }
    }

    /// Drains the next cached write-set during IST, applying it
    /// locally. Returns `Ok(true)` once caught up, at which point the
    /// node has already advanced to `Synced` and the caller should
    /// multicast SYNC. IST replay skips certification: every write-set
    /// it streams was already certified by whichever member first
    /// delivered it, so this only ever applies in the seqno order the
    /// donor streamed it in.
    pub fn pump_ist(&mut self) -> Result<bool> {
        let Some(joiner) = &mut self.joiner else {
            return Ok(true);
        };
        let drained = joiner.pull_next(&mut self.gcache)?;
        let caught_up = match &drained {
            Some((seqno, bytes)) => {
                if self.role.applies_writesets() {
                    if let Ok(ws) = WriteSet::decode(bytes) {
                        self.applier.apply(*seqno, &ws);
                    }
                }
                false
            }
            None => joiner.is_caught_up(),
        };
        if caught_up {
            self.joiner = None;
            self.gcs
                .finish_joining()
                .map_err(|e| bad_request(format!("cannot finish joining from state {:?}", e.from)))?;
            self.gcs
                .mark_synced()
                .map_err(|e| bad_request(format!("cannot mark synced from state {:?}", e.from)))?;
        }
        Ok(caught_up)
    }

    pub fn join_progress(&self) -> Option<JoinProgress> {
        self.joiner.as_ref().map(|j| j.progress())
    }

    pub fn close(&mut self) {
        self.gcs.close();
    }
}
