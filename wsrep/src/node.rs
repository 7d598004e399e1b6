// Binds a `Replicator` to real sockets: one listening `TcpAcceptor` for
// inbound peers, one dialed `TcpSocket` per configured seed, a
// `TimerQueue` entry driving GMCast's heartbeat, and per-peer read
// loops that decode frames and feed them into `GroupComm::handle_up`
// and then `Replicator::on_delivery`. This is the thing that collects
// every resource a replica needs to function, generalized from stub
// traits to the real reactor/gcomm/gcs/gcache/cert/repl stack. The
// reactor itself is single-threaded and not `Send` (per its own doc
// comment), so the replicator it drives is shared with the read-loop
// closures via `Rc<RefCell<_>>` rather than handed to a worker thread.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use wsrep_base::{bad_request, MemberId, Result, Seqno};
use wsrep_cert::WriteSet;
use wsrep_gcomm::transport::{async_read_one_frame, PeerLinks};
use wsrep_reactor::{IdentityEngine, Reactor, TcpAcceptor, TcpSocket, TimerId, TimerQueue};
use wsrep_repl::{Apply, Config, Replicator, Role};

/// Resources a member needs beyond what `wsrep_repl::Config` already
/// covers: where to listen, and who to dial at startup. GMCast's own
/// `heartbeat_period` lives on the `GmCast` instance `Replicator::new`
/// builds; the liveness sweep timer below just has to poll it on some
/// cadence shorter than that period.
pub struct NodeConfig {
    pub repl: Config,
    pub bind_addr: std::net::SocketAddr,
    pub seeds: Vec<String>,
}

type SharedReplicator<A> = Rc<RefCell<Replicator<A>>>;

pub struct Node<A: Apply> {
    reactor: Reactor,
    timers: TimerQueue,
    heartbeat: TimerId,
    peers: Rc<RefCell<PeerLinks>>,
    acceptor: TcpAcceptor,
    replicator: SharedReplicator<A>,
}

impl<A: Apply + 'static> Node<A> {
    pub fn bootstrap(config: NodeConfig, role: Role, applier: A) -> Result<Self> {
        let replicator: SharedReplicator<A> = Rc::new(RefCell::new(Replicator::new(config.repl, role, applier)?));
        let mut reactor = Reactor::new()?;
        let mut timers = TimerQueue::new();
        let heartbeat = timers.every(Duration::from_millis(500));

        let peers: Rc<RefCell<PeerLinks>> = Rc::new(RefCell::new(PeerLinks::new()));
        let peers_for_accept = peers.clone();
        let replicator_for_accept = replicator.clone();
        let acceptor = TcpAcceptor::bind(
            &mut reactor,
            config.bind_addr,
            || Box::new(IdentityEngine::new()),
            move |reactor, accepted| {
                if let Ok(handle) = accepted {
                    let _ = start_peer_read_loop(reactor, handle, peers_for_accept.clone(), replicator_for_accept.clone());
                }
            },
        )?;

        for seed in &config.seeds {
            dial_seed(&mut reactor, seed, peers.clone(), replicator.clone())?;
        }

        Ok(Node {
            reactor,
            timers,
            heartbeat,
            peers,
            acceptor,
            replicator,
        })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        self.acceptor.local_addr()
    }

    pub fn connect(&mut self, cluster_addr: &str, name: &str) -> Result<()> {
        self.replicator.borrow_mut().connect(cluster_addr, name)
    }

    /// Submits a locally-originated write-set: certifies and applies it
    /// inline (see `Replicator::replicate`), then multicasts the
    /// resulting frame to every connected peer.
    pub fn submit(&mut self, ws: WriteSet) -> Result<Seqno> {
        let payload = ws.encode();
        let mut repl = self.replicator.borrow_mut();
        let seqno = repl.replicate(ws)?;
        let frame = repl.group_mut().pass_down(payload)?;
        drop(repl);
        self.peers.borrow().broadcast(&mut self.reactor, frame, |_reactor, member| {
            tracing::warn!(?member, "dropped multicast to unreachable peer");
        });
        Ok(seqno)
    }

    /// One iteration of the event loop: blocks for at most the next
    /// timer deadline (inbound frames are decoded and handed to the
    /// replicator from inside the read-loop closures registered at
    /// bootstrap), then fires expired timers — currently just the
    /// GMCast liveness sweep.
    pub fn run_one(&mut self) -> Result<()> {
        self.reactor.run_one(self.timers.next_timeout())?;
        for id in self.timers.expired() {
            if id == self.heartbeat {
                let evicted = self.replicator.borrow_mut().group_mut().gmcast_mut().evict_stale();
                for member in evicted {
                    self.peers.borrow_mut().remove(&member);
                }
            }
        }
        Ok(())
    }

    pub fn replicator(&self) -> std::cell::Ref<'_, Replicator<A>> {
        self.replicator.borrow()
    }

    pub fn close(&mut self) {
        self.replicator.borrow_mut().close();
        let _ = self.reactor.shutdown();
    }
}

fn dial_seed(
    reactor: &mut Reactor,
    seed: &str,
    peers: Rc<RefCell<PeerLinks>>,
    replicator: SharedReplicator<impl Apply + 'static>,
) -> Result<()> {
    let uri = wsrep_reactor::TransportUri::parse(seed)?;
    let addr = uri.socket_addr()?;
    TcpSocket::async_connect(addr, reactor, Box::new(IdentityEngine::new()), move |reactor, connected| {
        if let Ok(handle) = connected {
            let _ = start_peer_read_loop(reactor, handle, peers.clone(), replicator.clone());
        }
    })
}

/// Keeps decoding frames off one peer socket for as long as it stays
/// open: each decoded frame goes through `GroupComm::handle_up`, and
/// every `Up` event that produces gets fed straight into
/// `Replicator::on_delivery`. The member id a frame's header carries is
/// how `peers` learns who's on the other end of a freshly accepted
/// socket — nothing at the transport layer names it before that.
fn start_peer_read_loop<A: Apply + 'static>(
    reactor: &mut Reactor,
    handle: wsrep_reactor::SocketHandle,
    peers: Rc<RefCell<PeerLinks>>,
    replicator: SharedReplicator<A>,
) -> Result<()> {
    async_read_one_frame(&handle, reactor, move |reactor, frame| {
        if let Ok((header, msg)) = frame {
            let member = MemberId(header.source_uuid);
            peers.borrow_mut().insert(member, handle.clone());
            let ups = replicator.borrow_mut().group_mut().handle_up(header, msg);
            for up in ups {
                replicator.borrow_mut().on_delivery(up);
            }
        }
        let _ = start_peer_read_loop(reactor, handle.clone(), peers.clone(), replicator.clone());
    })
    .map_err(|e| bad_request(format!("read loop failed to (re)register: {e}")))
}
