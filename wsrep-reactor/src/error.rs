use std::fmt;
use std::io;

/// A single error-code type carrying either a POSIX errno (via
/// `io::Error`) or a TLS handshake/record error. `is_eof()` is exposed
/// because callers up the stack (EVS, GMCast) treat peer-closed
/// differently from every other transport fault.
#[derive(Debug)]
pub enum SocketError {
    Io(io::Error),
    Tls(rustls::Error),
    Busy,
}

impl SocketError {
    pub fn is_eof(&self) -> bool {
        matches!(self, SocketError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketError::Io(e) => write!(f, "io error: {e}"),
            SocketError::Tls(e) => write!(f, "tls error: {e}"),
            SocketError::Busy => write!(f, "operation already in flight"),
        }
    }
}

impl std::error::Error for SocketError {}

impl From<io::Error> for SocketError {
    fn from(e: io::Error) -> Self {
        SocketError::Io(e)
    }
}

impl From<rustls::Error> for SocketError {
    fn from(e: rustls::Error) -> Self {
        SocketError::Tls(e)
    }
}
