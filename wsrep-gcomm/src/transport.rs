// Binds group-comm to the reactor: one TCP (or TLS) socket per peer,
// framed with the fixed wire header. GMCast decides who to dial and
// when to evict; this module is purely the send/receive plumbing.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use wsrep_base::{MemberId, Result};
use wsrep_reactor::{read_exactly, Reactor, SocketHandle, TcpSocket};

use crate::wire::{decode_frame, MsgHeader, HEADER_LEN};
use crate::Msg;

/// Per-peer outbound connection, keyed by member id so `pass_down`'s
/// multicast can fan a single encoded frame out to every live peer.
pub struct PeerLinks {
    links: HashMap<MemberId, SocketHandle>,
}

impl PeerLinks {
    pub fn new() -> Self {
        PeerLinks {
            links: HashMap::new(),
        }
    }

    pub fn insert(&mut self, member: MemberId, socket: SocketHandle) {
        self.links.insert(member, socket);
    }

    pub fn remove(&mut self, member: &MemberId) {
        self.links.remove(member);
    }

    pub fn get(&self, member: &MemberId) -> Option<&SocketHandle> {
        self.links.get(member)
    }

    /// Best-effort fan-out: a peer whose write is already busy or whose
    /// link has dropped is skipped rather than failing the whole
    /// multicast — group-comm's own retransmission (driven by EVS gap
    /// detection) is what recovers a peer that missed a frame.
    pub fn broadcast(
        &self,
        reactor: &mut Reactor,
        frame: Vec<u8>,
        mut on_failure: impl FnMut(&mut Reactor, MemberId),
    ) {
        for (member, handle) in self.links.iter() {
            let member = *member;
            let frame = frame.clone();
            if TcpSocket::async_write(handle, reactor, frame, move |_reactor, _result| {}).is_err() {
                on_failure(reactor, member);
            }
        }
    }
}

impl Default for PeerLinks {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads one fixed-size header, then the declared payload, and decodes
/// the frame — the receive half of the per-peer socket. Chains a
/// second `async_read` for the payload once the header declares its
/// length, since the header alone doesn't carry enough bytes to decode
/// a `Msg`.
pub fn async_read_one_frame(
    handle: &SocketHandle,
    reactor: &mut Reactor,
    on_frame: impl FnMut(&mut Reactor, Result<(MsgHeader, Msg)>) + 'static,
) -> Result<()> {
    let on_frame = Rc::new(RefCell::new(on_frame));
    let handle = handle.clone();
    TcpSocket::async_read(
        &handle,
        reactor,
        vec![0u8; HEADER_LEN],
        read_exactly(HEADER_LEN),
        move |reactor, result| {
            let header_buf = match result {
                Ok((buf, _n)) => buf,
                Err(e) => {
                    (on_frame.borrow_mut())(reactor, Err(e));
                    return;
                }
            };
            let header = match MsgHeader::decode(&header_buf) {
                Ok(h) => h,
                Err(e) => {
                    (on_frame.borrow_mut())(reactor, Err(e));
                    return;
                }
            };
            let payload_len = header.payload_len as usize;
            let on_frame = on_frame.clone();
            let read_result = TcpSocket::async_read(
                &handle,
                reactor,
                vec![0u8; payload_len],
                read_exactly(payload_len),
                move |reactor, result| match result {
                    Ok((payload, _n)) => {
                        let mut full = header_buf.clone();
                        full.extend_from_slice(&payload);
                        (on_frame.borrow_mut())(reactor, decode_frame(&full));
                    }
                    Err(e) => (on_frame.borrow_mut())(reactor, Err(e)),
                },
            );
            if let Err(e) = read_result {
                (on_frame.borrow_mut())(reactor, Err(e));
            }
        },
    )
}

/// Decodes a complete in-memory frame (header + payload already
/// concatenated) in one step, used by the in-process simulated
/// transport the test suite drives instead of real sockets.
pub fn decode_one(buf: &[u8]) -> Result<(MsgHeader, Msg)> {
    decode_frame(buf)
}

pub type SharedPeerLinks = Rc<RefCell<PeerLinks>>;
