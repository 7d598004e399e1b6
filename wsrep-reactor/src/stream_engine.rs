// Lets TLS multiplex its own handshake/record protocol on top of the
// same edge-triggered reactor without the reactor or the socket caring
// which scheme is in use. The identity engine is the default; TLS is
// opted into per-socket via `socket.ssl`.

use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::error::SocketError;

pub trait RawIo: Read + Write {}
impl<T: Read + Write> RawIo for T {}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EngineStatus {
    Success,
    WantRead,
    WantWrite,
    Eof,
    Error,
}

pub trait StreamEngine: Send {
    fn client_handshake(&mut self, raw: &mut dyn RawIo) -> EngineStatus;
    fn server_handshake(&mut self, raw: &mut dyn RawIo) -> EngineStatus;
    fn read(&mut self, raw: &mut dyn RawIo, buf: &mut [u8]) -> (EngineStatus, usize);
    fn write(&mut self, raw: &mut dyn RawIo, buf: &[u8]) -> (EngineStatus, usize);
    fn last_error(&self) -> Option<&SocketError>;
}

/// Passthrough engine: no handshake, reads and writes go straight to
/// the raw file descriptor. This is what a socket gets unless
/// `socket.ssl` selects the TLS engine.
#[derive(Default)]
pub struct IdentityEngine {
    last_error: Option<SocketError>,
}

impl IdentityEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamEngine for IdentityEngine {
    fn client_handshake(&mut self, _raw: &mut dyn RawIo) -> EngineStatus {
        EngineStatus::Success
    }

    fn server_handshake(&mut self, _raw: &mut dyn RawIo) -> EngineStatus {
        EngineStatus::Success
    }

    fn read(&mut self, raw: &mut dyn RawIo, buf: &mut [u8]) -> (EngineStatus, usize) {
        match raw.read(buf) {
            Ok(0) => (EngineStatus::Eof, 0),
            Ok(n) => (EngineStatus::Success, n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => (EngineStatus::WantRead, 0),
            Err(e) => {
                self.last_error = Some(SocketError::Io(e));
                (EngineStatus::Error, 0)
            }
        }
    }

    fn write(&mut self, raw: &mut dyn RawIo, buf: &[u8]) -> (EngineStatus, usize) {
        match raw.write(buf) {
            Ok(n) => (EngineStatus::Success, n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => (EngineStatus::WantWrite, 0),
            Err(e) => {
                self.last_error = Some(SocketError::Io(e));
                (EngineStatus::Error, 0)
            }
        }
    }

    fn last_error(&self) -> Option<&SocketError> {
        self.last_error.as_ref()
    }
}

enum TlsSide {
    Client(rustls::ClientConnection),
    Server(rustls::ServerConnection),
}

impl TlsSide {
    fn wants_read(&self) -> bool {
        match self {
            TlsSide::Client(c) => c.wants_read(),
            TlsSide::Server(c) => c.wants_read(),
        }
    }

    fn wants_write(&self) -> bool {
        match self {
            TlsSide::Client(c) => c.wants_write(),
            TlsSide::Server(c) => c.wants_write(),
        }
    }

    fn is_handshaking(&self) -> bool {
        match self {
            TlsSide::Client(c) => c.is_handshaking(),
            TlsSide::Server(c) => c.is_handshaking(),
        }
    }

    fn read_tls(&mut self, rd: &mut dyn Read) -> io::Result<usize> {
        match self {
            TlsSide::Client(c) => c.read_tls(rd),
            TlsSide::Server(c) => c.read_tls(rd),
        }
    }

    fn write_tls(&mut self, wr: &mut dyn Write) -> io::Result<usize> {
        match self {
            TlsSide::Client(c) => c.write_tls(wr),
            TlsSide::Server(c) => c.write_tls(wr),
        }
    }

    fn process_new_packets(&mut self) -> Result<(), rustls::Error> {
        match self {
            TlsSide::Client(c) => c.process_new_packets().map(|_| ()),
            TlsSide::Server(c) => c.process_new_packets().map(|_| ()),
        }
    }

    fn read_plaintext(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            TlsSide::Client(c) => c.reader().read(buf),
            TlsSide::Server(c) => c.reader().read(buf),
        }
    }

    fn write_plaintext(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TlsSide::Client(c) => c.writer().write(buf),
            TlsSide::Server(c) => c.writer().write(buf),
        }
    }
}

/// The non-default stream engine: layers a rustls handshake/record
/// state machine over the same raw file descriptor the identity engine
/// reads and writes directly.
pub struct TlsEngine {
    conn: TlsSide,
    last_error: Option<SocketError>,
}

impl TlsEngine {
    pub fn client(
        config: Arc<rustls::ClientConfig>,
        name: rustls::pki_types::ServerName<'static>,
    ) -> Result<Self, SocketError> {
        let conn = rustls::ClientConnection::new(config, name)?;
        Ok(TlsEngine {
            conn: TlsSide::Client(conn),
            last_error: None,
        })
    }

    pub fn server(config: Arc<rustls::ServerConfig>) -> Result<Self, SocketError> {
        let conn = rustls::ServerConnection::new(config)?;
        Ok(TlsEngine {
            conn: TlsSide::Server(conn),
            last_error: None,
        })
    }

    /// Drains whatever TLS record traffic is currently pending in
    /// either direction. Returns `WantRead`/`WantWrite` when the
    /// underlying socket isn't ready yet, `Success` once the connection
    /// has nothing left to do right now.
    fn pump(&mut self, raw: &mut dyn RawIo) -> EngineStatus {
        loop {
            if self.conn.wants_write() {
                match self.conn.write_tls(raw) {
                    Ok(0) => return EngineStatus::Success,
                    Ok(_) => continue,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                        return EngineStatus::WantWrite
                    }
                    Err(e) => {
                        self.last_error = Some(SocketError::Io(e));
                        return EngineStatus::Error;
                    }
                }
            } else if self.conn.wants_read() {
                match self.conn.read_tls(raw) {
                    Ok(0) => return EngineStatus::Eof,
                    Ok(_) => {
                        if let Err(e) = self.conn.process_new_packets() {
                            self.last_error = Some(SocketError::Tls(e));
                            return EngineStatus::Error;
                        }
                        continue;
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                        return EngineStatus::WantRead
                    }
                    Err(e) => {
                        self.last_error = Some(SocketError::Io(e));
                        return EngineStatus::Error;
                    }
                }
            } else {
                return EngineStatus::Success;
            }
        }
    }
}

impl StreamEngine for TlsEngine {
    fn client_handshake(&mut self, raw: &mut dyn RawIo) -> EngineStatus {
        if !self.conn.is_handshaking() {
            return EngineStatus::Success;
        }
        self.pump(raw)
    }

    fn server_handshake(&mut self, raw: &mut dyn RawIo) -> EngineStatus {
        if !self.conn.is_handshaking() {
            return EngineStatus::Success;
        }
        self.pump(raw)
    }

    fn read(&mut self, raw: &mut dyn RawIo, buf: &mut [u8]) -> (EngineStatus, usize) {
        match self.pump(raw) {
            EngineStatus::Error => return (EngineStatus::Error, 0),
            EngineStatus::Eof => return (EngineStatus::Eof, 0),
            _ => {}
        }
        match self.conn.read_plaintext(buf) {
            Ok(0) => (EngineStatus::WantRead, 0),
            Ok(n) => (EngineStatus::Success, n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => (EngineStatus::WantRead, 0),
            Err(e) => {
                self.last_error = Some(SocketError::Io(e));
                (EngineStatus::Eof, 0)
            }
        }
    }

    fn write(&mut self, raw: &mut dyn RawIo, buf: &[u8]) -> (EngineStatus, usize) {
        let n = match self.conn.write_plaintext(buf) {
            Ok(n) => n,
            Err(e) => {
                self.last_error = Some(SocketError::Io(e));
                return (EngineStatus::Error, 0);
            }
        };
        match self.pump(raw) {
            EngineStatus::Error => (EngineStatus::Error, 0),
            EngineStatus::WantWrite => (EngineStatus::WantWrite, n),
            _ => (EngineStatus::Success, n),
        }
    }

    fn last_error(&self) -> Option<&SocketError> {
        self.last_error.as_ref()
    }
}
