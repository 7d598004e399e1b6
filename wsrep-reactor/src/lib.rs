//! Single-threaded cooperative I/O reactor: the substrate GMCast's
//! gossip/heartbeat loop and EVS's message pump run on top of. Owns no
//! protocol state of its own — just readiness-driven callbacks, steady
//! timers, transport URIs, and a pluggable plaintext/TLS stream engine.

mod error;
mod reactor;
mod socket;
mod stream_engine;
mod timer;
mod uri;

pub use error::SocketError;
pub use reactor::{busy, Handler, Readiness, Reactor, Token};
pub use socket::{read_exactly, ReadCompletionCondition, SocketHandle, TcpAcceptor, TcpSocket, UdpSocket};
pub use stream_engine::{EngineStatus, IdentityEngine, RawIo, StreamEngine, TlsEngine};
pub use timer::{TimerId, TimerQueue};
pub use uri::{Scheme, TransportUri};
