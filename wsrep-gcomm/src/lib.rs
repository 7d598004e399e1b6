//! Group-communication stack: GMCast peer discovery and liveness, EVS
//! reliable causal delivery and the view-install protocol, PC primacy
//! decision on top of EVS views. Hands total-ordered application
//! payloads and view-change notifications up to `wsrep-gcs` via
//! `handle_up`; `pass_down` is how the layer above submits a payload
//! for multicast.

pub mod evs;
pub mod gmcast;
pub mod pc;
pub mod transport;
pub mod view;
pub mod wire;

use wsrep_base::MemberId;

pub use evs::{Delivery, Evs};
pub use gmcast::{GmCast, PeerState};
pub use pc::{decide as pc_decide, Primacy, VoteOutcome, VoteTracker};
pub use transport::{async_read_one_frame, PeerLinks, SharedPeerLinks};
pub use view::{View, ViewId, ViewType};
pub use wire::{decode_frame, encode_frame, Msg, MsgHeader, HEADER_LEN, WIRE_VERSION};

/// What this layer delivers upward to GCS: a totally ordered,
/// safely-delivered application payload, or a membership change.
#[derive(Debug)]
pub enum Up {
    Payload { source: MemberId, payload: Vec<u8> },
    ViewChange(View),
}

/// A single member's group-comm stack: owns EVS and PC state, delegates
/// peer liveness to GMCast. `wsrep-repl`'s wiring layer drives this from
/// the reactor thread and forwards `Up` events into `wsrep-gcs`.
pub struct GroupComm {
    my_id: MemberId,
    evs: Evs,
    last_primary_view: Option<View>,
    gmcast: GmCast,
}

impl GroupComm {
    pub fn bootstrap(my_id: MemberId, view_uuid: uuid::Uuid, gmcast: GmCast) -> Self {
        let evs = Evs::bootstrap(my_id, view_uuid);
        let last_primary_view = Some(evs.view().clone());
        GroupComm {
            my_id,
            evs,
            last_primary_view,
            gmcast,
        }
    }

    pub fn my_id(&self) -> MemberId {
        self.my_id
    }

    pub fn current_view(&self) -> &View {
        self.evs.view()
    }

    pub fn gmcast_mut(&mut self) -> &mut GmCast {
        &mut self.gmcast
    }

    /// Submits a payload (an encoded GCS action) for total-order
    /// multicast; returns the frame to hand to every connected peer's
    /// socket. Only valid while this node is in a primary view.
    pub fn pass_down(&mut self, payload: Vec<u8>) -> wsrep_base::Result<Vec<u8>> {
        if !self.evs.view().is_primary() {
            return Err(wsrep_base::err(
                wsrep_base::ErrorKind::NotPrimary,
                "cannot multicast outside a primary view",
            ));
        }
        let seq = self.evs.next_send_seq();
        let msg = Msg::EvsUser {
            source: self.my_id.0,
            source_seq: seq,
            safe: false,
            payload,
        };
        let header = MsgHeader {
            version: WIRE_VERSION,
            msg_type: 0,
            flags: 0,
            source_uuid: self.my_id.0,
            seq,
            payload_len: 0,
        };
        encode_frame(&header, &msg)
    }

    /// Feeds one inbound frame from any peer and returns everything
    /// that became deliverable as a result — zero or more safely
    /// delivered payloads, in FIFO order, possibly followed by a view
    /// change if this frame completed the install-exchange phase.
    pub fn handle_up(&mut self, header: MsgHeader, msg: Msg) -> Vec<Up> {
        let mut out = Vec::new();
        match msg {
            Msg::EvsUser {
                source,
                source_seq,
                payload,
                ..
            } => {
                let source_id = MemberId(source);
                self.evs.on_user_msg(source_id, source_seq, payload);
                self.evs.on_ack(self.my_id, source_id, source_seq);
                for d in self.evs.deliverable() {
                    out.push(Up::Payload {
                        source: d.source,
                        payload: d.payload,
                    });
                }
            }
            Msg::EvsJoin { member } => {
                self.gmcast.note_discovered(MemberId(member));
                self.evs.begin_view_change();
            }
            Msg::EvsInstall {
                view_uuid: _,
                view_seq,
                members,
            } => {
                let acker = MemberId(header.source_uuid);
                self.evs
                    .on_state_exchange(acker, view_seq, members.into_iter().map(MemberId).collect());
            }
            Msg::PcState { member, .. } => {
                if let Some(view) = self.evs.on_install_exchange(MemberId(member)) {
                    let primacy = pc_decide(&view, self.last_primary_view.as_ref());
                    let mut view = view;
                    if primacy == Primacy::Primary {
                        view.view_type = ViewType::Primary;
                        self.last_primary_view = Some(view.clone());
                    } else {
                        view.view_type = ViewType::NonPrimary;
                    }
                    out.push(Up::ViewChange(view));
                }
            }
            Msg::Heartbeat => {
                self.gmcast.on_heartbeat(MemberId(header.source_uuid));
            }
            _ => {}
        }
        out
    }
}
