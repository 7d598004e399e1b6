// Socket contract: async_connect, async_read(buf, completion_condition,
// handler), async_write(buffers, handler), close. A socket is shared
// (`Rc<RefCell<_>>`) because, unlike `async_connect` (a one-shot
// continuation), `async_read`/`async_write` must be callable again on
// the same socket once a completion fires — the caller keeps its own
// handle alongside whatever the reactor holds.

use std::cell::RefCell;
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};
use std::rc::Rc;

use mio::net::{TcpListener, TcpStream};
use mio::Interest;

use wsrep_base::{err, ErrorKind, Result};

use crate::reactor::{Reactor, Token};
use crate::stream_engine::{EngineStatus, RawIo, StreamEngine};

pub struct TcpSocket {
    stream: TcpStream,
    token: Token,
    engine: Box<dyn StreamEngine>,
    write_busy: bool,
    read_busy: bool,
}

pub type SocketHandle = Rc<RefCell<TcpSocket>>;

/// Lets a caller ask for more bytes before the read handler fires; once
/// it returns zero more are needed, the handler runs with the total
/// read so far.
pub type ReadCompletionCondition = Box<dyn FnMut(usize) -> usize>;

pub fn read_exactly(n: usize) -> ReadCompletionCondition {
    Box::new(move |total_so_far| n.saturating_sub(total_so_far))
}

impl TcpSocket {
    fn new(reactor: &mut Reactor, stream: TcpStream, engine: Box<dyn StreamEngine>) -> SocketHandle {
        let token = reactor.alloc_token();
        Rc::new(RefCell::new(TcpSocket {
            stream,
            token,
            engine,
            write_busy: false,
            read_busy: false,
        }))
    }

    pub fn token(&self) -> Token {
        self.token
    }

    fn raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    /// Connects then drives the client handshake to completion,
    /// invoking `done` exactly once.
    pub fn async_connect(
        addr: SocketAddr,
        reactor: &mut Reactor,
        engine: Box<dyn StreamEngine>,
        mut done: impl FnMut(&mut Reactor, Result<SocketHandle>) + 'static,
    ) -> Result<()> {
        let stream = TcpStream::connect(addr).map_err(wsrep_base::Error::from)?;
        let handle = TcpSocket::new(reactor, stream, engine);
        let fd = handle.borrow().raw_fd();
        let token = handle.borrow().token();

        reactor.register(
            fd,
            token,
            Interest::READABLE | Interest::WRITABLE,
            Box::new(move |reactor, _readiness| {
                let status = {
                    let mut s = handle.borrow_mut();
                    let TcpSocket { stream, engine, .. } = &mut *s;
                    let raw: &mut dyn RawIo = stream;
                    engine.client_handshake(raw)
                };
                match status {
                    EngineStatus::Success => {
                        let _ = reactor.deregister(fd, token);
                        done(reactor, Ok(handle.clone()));
                        false
                    }
                    EngineStatus::WantRead | EngineStatus::WantWrite => true,
                    EngineStatus::Eof => {
                        done(
                            reactor,
                            Err(err(ErrorKind::ConnectionLost, "peer closed during handshake")),
                        );
                        false
                    }
                    EngineStatus::Error => {
                        let msg = handle
                            .borrow()
                            .engine
                            .last_error()
                            .map(|e| e.to_string())
                            .unwrap_or_else(|| "handshake failed".into());
                        done(reactor, Err(err(ErrorKind::TransportError, msg)));
                        false
                    }
                }
            }),
        )
    }

    /// Wraps an already-accepted stream, driving the server handshake
    /// to completion before handing the socket to `done`.
    pub fn async_accept_handshake(
        reactor: &mut Reactor,
        stream: TcpStream,
        engine: Box<dyn StreamEngine>,
        mut done: impl FnMut(&mut Reactor, Result<SocketHandle>) + 'static,
    ) -> Result<()> {
        let handle = TcpSocket::new(reactor, stream, engine);
        let fd = handle.borrow().raw_fd();
        let token = handle.borrow().token();
        reactor.register(
            fd,
            token,
            Interest::READABLE | Interest::WRITABLE,
            Box::new(move |reactor, _readiness| {
                let status = {
                    let mut s = handle.borrow_mut();
                    let TcpSocket { stream, engine, .. } = &mut *s;
                    let raw: &mut dyn RawIo = stream;
                    engine.server_handshake(raw)
                };
                match status {
                    EngineStatus::Success => {
                        let _ = reactor.deregister(fd, token);
                        done(reactor, Ok(handle.clone()));
                        false
                    }
                    EngineStatus::WantRead | EngineStatus::WantWrite => true,
                    EngineStatus::Eof => {
                        done(reactor, Err(err(ErrorKind::ConnectionLost, "peer closed during handshake")));
                        false
                    }
                    EngineStatus::Error => {
                        done(reactor, Err(err(ErrorKind::TransportError, "server handshake failed")));
                        false
                    }
                }
            }),
        )
    }

    /// Reads into `buf`, invoking `condition(total_read_so_far)` after
    /// each chunk: a nonzero return means "want more bytes before
    /// firing the handler", zero means "fire now with the total".
    pub fn async_read(
        handle: &SocketHandle,
        reactor: &mut Reactor,
        mut buf: Vec<u8>,
        mut condition: ReadCompletionCondition,
        mut handler: impl FnMut(&mut Reactor, Result<(Vec<u8>, usize)>) + 'static,
    ) -> Result<()> {
        {
            let mut s = handle.borrow_mut();
            if s.read_busy {
                return Err(crate::reactor::busy());
            }
            s.read_busy = true;
        }
        let fd = handle.borrow().raw_fd();
        let token = handle.borrow().token();
        let handle = handle.clone();
        let mut total = 0usize;
        reactor.register(
            fd,
            token,
            Interest::READABLE,
            Box::new(move |reactor, _readiness| {
                loop {
                    let want = condition(total);
                    if want == 0 {
                        break;
                    }
                    let end = (total + want).min(buf.len());
                    let (status, n) = {
                        let mut s = handle.borrow_mut();
                        let TcpSocket { stream, engine, .. } = &mut *s;
                        let raw: &mut dyn RawIo = stream;
                        engine.read(raw, &mut buf[total..end])
                    };
                    match status {
                        EngineStatus::Success => {
                            total += n;
                            if n == 0 {
                                break;
                            }
                            continue;
                        }
                        EngineStatus::WantRead => {
                            return true;
                        }
                        EngineStatus::WantWrite => {
                            // TLS renegotiation wants to write; stay
                            // registered, the next readable event will
                            // let the engine make progress again.
                            return true;
                        }
                        EngineStatus::Eof => {
                            handle.borrow_mut().read_busy = false;
                            let _ = reactor.deregister(fd, token);
                            handler(reactor, Err(err(ErrorKind::ConnectionLost, "eof")));
                            return false;
                        }
                        EngineStatus::Error => {
                            handle.borrow_mut().read_busy = false;
                            let _ = reactor.deregister(fd, token);
                            handler(reactor, Err(err(ErrorKind::TransportError, "read failed")));
                            return false;
                        }
                    }
                }
                handle.borrow_mut().read_busy = false;
                let _ = reactor.deregister(fd, token);
                let taken = std::mem::take(&mut buf);
                handler(reactor, Ok((taken, total)));
                false
            }),
        )
    }

    /// A second concurrent `async_write` on a socket with one already
    /// in flight returns the busy error without touching the buffer
    /// already in progress.
    pub fn async_write(
        handle: &SocketHandle,
        reactor: &mut Reactor,
        buf: Vec<u8>,
        mut handler: impl FnMut(&mut Reactor, Result<usize>) + 'static,
    ) -> Result<()> {
        {
            let mut s = handle.borrow_mut();
            if s.write_busy {
                return Err(crate::reactor::busy());
            }
            s.write_busy = true;
        }
        let fd = handle.borrow().raw_fd();
        let token = handle.borrow().token();
        let handle = handle.clone();
        let mut offset = 0usize;
        reactor.register(
            fd,
            token,
            Interest::WRITABLE,
            Box::new(move |reactor, _readiness| loop {
                if offset >= buf.len() {
                    handle.borrow_mut().write_busy = false;
                    let _ = reactor.deregister(fd, token);
                    handler(reactor, Ok(offset));
                    return false;
                }
                let (status, n) = {
                    let mut s = handle.borrow_mut();
                    let TcpSocket { stream, engine, .. } = &mut *s;
                    let raw: &mut dyn RawIo = stream;
                    engine.write(raw, &buf[offset..])
                };
                match status {
                    EngineStatus::Success => {
                        offset += n;
                        continue;
                    }
                    EngineStatus::WantWrite | EngineStatus::WantRead => return true,
                    EngineStatus::Eof | EngineStatus::Error => {
                        handle.borrow_mut().write_busy = false;
                        let _ = reactor.deregister(fd, token);
                        handler(reactor, Err(err(ErrorKind::ConnectionLost, "write failed")));
                        return false;
                    }
                }
            }),
        )
    }

    pub fn close(handle: &SocketHandle, reactor: &mut Reactor) -> Result<()> {
        let fd = handle.borrow().raw_fd();
        let token = handle.borrow().token();
        reactor.deregister(fd, token)
    }
}

/// Listens for inbound connections, handing each accepted stream
/// through the server-handshake continuation before invoking `on_accept`.
pub struct TcpAcceptor {
    listener: TcpListener,
    token: Token,
}

impl TcpAcceptor {
    pub fn bind(
        reactor: &mut Reactor,
        addr: SocketAddr,
        mut make_engine: impl FnMut() -> Box<dyn StreamEngine> + 'static,
        mut on_accept: impl FnMut(&mut Reactor, Result<SocketHandle>) + 'static,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(wsrep_base::Error::from)?;
        let fd = listener.as_raw_fd();
        let acceptor = TcpAcceptor {
            listener,
            token: reactor.alloc_token(),
        };
        let token = acceptor.token;
        reactor.register(
            fd,
            token,
            Interest::READABLE,
            Box::new(move |reactor, _readiness| {
                // edge-triggered: drain every pending connection.
                loop {
                    // Safety of repeated accept is provided by mio's
                    // TcpListener itself; WouldBlock just ends the loop.
                    match accept_one(fd) {
                        Ok(Some((stream, _peer))) => {
                            let engine = make_engine();
                            let _ = TcpSocket::async_accept_handshake(reactor, stream, engine, &mut on_accept);
                        }
                        Ok(None) => break,
                        Err(_) => break,
                    }
                }
                true
            }),
        )?;
        Ok(acceptor)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(wsrep_base::Error::from)
    }
}

fn accept_one(fd: RawFd) -> Result<Option<(TcpStream, SocketAddr)>> {
    // The listener itself owns the real accept() call; this helper
    // exists purely so the closure above doesn't need to borrow the
    // listener out of `TcpAcceptor` while also mutably borrowing the
    // reactor that owns the closure.
    use std::os::fd::FromRawFd;
    let listener = unsafe { std::mem::ManuallyDrop::new(TcpListener::from_raw_fd(fd)) };
    match listener.accept() {
        Ok((stream, addr)) => Ok(Some((stream, addr))),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
        Err(e) => Err(wsrep_base::Error::from(e)),
    }
}

/// A bare, connectionless datagram socket used by GMCast for its gossip
/// seed-list fan-out; framing and retransmission live above this layer.
pub struct UdpSocket {
    socket: mio::net::UdpSocket,
    token: Token,
}

impl UdpSocket {
    pub fn bind(
        reactor: &mut Reactor,
        addr: SocketAddr,
        mut on_readable: impl FnMut(&mut Reactor, &mio::net::UdpSocket) + 'static,
    ) -> Result<Self> {
        let socket = mio::net::UdpSocket::bind(addr).map_err(wsrep_base::Error::from)?;
        let fd = socket.as_raw_fd();
        let token = reactor.alloc_token();
        let sock_for_handler = unsafe {
            use std::os::fd::FromRawFd;
            std::mem::ManuallyDrop::new(mio::net::UdpSocket::from_raw_fd(fd))
        };
        reactor.register(
            fd,
            token,
            Interest::READABLE,
            Box::new(move |reactor, _readiness| {
                on_readable(reactor, &sock_for_handler);
                true
            }),
        )?;
        Ok(UdpSocket { socket, token })
    }

    pub fn send_to(&self, buf: &[u8], addr: SocketAddr) -> Result<usize> {
        self.socket.send_to(buf, addr).map_err(Into::into)
    }

    pub fn token(&self) -> Token {
        self.token
    }
}
