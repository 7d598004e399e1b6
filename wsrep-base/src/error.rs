// We want a few things here:
// 1. A way to create a new error with a backtrace
// 2. A way to centralize setting a breakpoint to trap any error in the system fairly soon
//    after it's created (or at least when it's propagated from a library we use back to us)
// 3. Same but for logging / emitting error messages into the tracing/logging system
// 4. A stable kind so callers can branch on recoverable-vs-fatal without downcasting.

use std::borrow::Cow;
use backtrace_error::DynBacktraceError;
use tracing::error;

#[cfg(test)]
use test_log::test;

/// Taken straight from the replication API's error surface: everything
/// but `InternalFatal` is recoverable by the caller (retry, reconnect,
/// requeue); `InternalFatal` means the node can no longer vouch for its
/// own state and must leave the cluster.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    ConnectionLost,
    NotConnected,
    NotPrimary,
    CertificationFailed,
    SizeExceeded,
    BadRequest,
    TransportError,
    Conflict,
    InternalFatal,
}

impl ErrorKind {
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::InternalFatal)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::ConnectionLost => "connection_lost",
            ErrorKind::NotConnected => "not_connected",
            ErrorKind::NotPrimary => "not_primary",
            ErrorKind::CertificationFailed => "certification_failed",
            ErrorKind::SizeExceeded => "size_exceeded",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::TransportError => "transport_error",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InternalFatal => "internal_fatal",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug)]
#[allow(dead_code)]
pub struct Error {
    kind: ErrorKind,
    inner: DynBacktraceError,
}
pub type Result<T> = std::result::Result<T, Error>;

struct SimpleErr(Cow<'static, str>);
impl std::fmt::Debug for SimpleErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::fmt::Display for SimpleErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for SimpleErr {
    fn description(&self) -> &str {
        &self.0
    }
}

impl Error {
    pub fn new<E: std::error::Error + Send + Sync + 'static>(kind: ErrorKind, err: E) -> Error {
        error!(target: "wsrep", kind = %kind, "{:?}", err);
        let inner = DynBacktraceError::from(err);
        Error { kind, inner }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:?}", self.kind, self.inner)
    }
}

/// Anything propagated from a third-party dependency (io::Error,
/// rmp_serde::decode::Error, etc.) that doesn't carry a kind of its own
/// is classed as a transport error; call sites that know better should
/// construct an [`Error`] with [`Error::new`] directly instead.
impl<E: std::error::Error + Send + Sync + 'static> From<E> for Error {
    fn from(err: E) -> Error {
        Error::new(ErrorKind::TransportError, err)
    }
}

pub fn err(kind: ErrorKind, msg: impl Into<Cow<'static, str>>) -> Error {
    let e = SimpleErr(msg.into());
    Error::new(kind, e)
}

pub fn bad_request(msg: impl Into<Cow<'static, str>>) -> Error {
    err(ErrorKind::BadRequest, msg)
}

pub fn internal_fatal(msg: impl Into<Cow<'static, str>>) -> Error {
    err(ErrorKind::InternalFatal, msg)
}

#[test]
fn test_error() {
    let e = err(ErrorKind::BadRequest, "test error");
    assert_eq!(e.kind(), ErrorKind::BadRequest);
    assert!(!e.kind().is_fatal());
    assert!(err(ErrorKind::InternalFatal, "fatal").kind().is_fatal());
}
