// A single-threaded cooperative reactor: one `mio::Poll`, one event
// loop, a registry of per-token handlers. Nothing here spawns a thread
// or an executor; the caller (group-comm's dedicated I/O thread, per
// the concurrency model) drives `run`/`run_one` itself.

use std::collections::HashMap;
use std::os::fd::RawFd;
use std::time::Duration as StdDuration;

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use wsrep_base::{err, ErrorKind, Result};

#[derive(Clone, Copy, Debug, Default)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
    pub error: bool,
}

/// Returns `true` to stay registered for further events, `false` to be
/// dropped (the caller is expected to have deregistered the source
/// itself before returning `false`). Not `Send`: the reactor is owned
/// and driven by a single dedicated thread (per the concurrency model),
/// so handlers are free to close over `Rc<RefCell<_>>` socket handles.
pub type Handler = Box<dyn FnMut(&mut Reactor, Readiness) -> bool>;

pub struct Reactor {
    poll: Poll,
    events: Events,
    next_token: usize,
    handlers: HashMap<Token, Handler>,
}

impl Reactor {
    pub fn new() -> Result<Self> {
        Ok(Reactor {
            poll: Poll::new().map_err(wsrep_base::Error::from)?,
            events: Events::with_capacity(1024),
            next_token: 0,
            handlers: HashMap::new(),
        })
    }

    pub fn alloc_token(&mut self) -> Token {
        let t = Token(self.next_token);
        self.next_token += 1;
        t
    }

    /// Registers interest in a raw file descriptor rather than
    /// borrowing the owning socket struct: the handler closure usually
    /// needs to take ownership of that same socket (to drive its
    /// handshake/read/write across repeated invocations), and a
    /// `RawFd` is `Copy`, so there's no borrow conflict between
    /// "register this fd" and "move this socket into the handler".
    pub fn register(
        &mut self,
        fd: RawFd,
        token: Token,
        interest: Interest,
        handler: Handler,
    ) -> Result<()> {
        self.poll
            .registry()
            .register(&mut SourceFd(&fd), token, interest)
            .map_err(wsrep_base::Error::from)?;
        self.handlers.insert(token, handler);
        Ok(())
    }

    pub fn reregister(&mut self, fd: RawFd, token: Token, interest: Interest) -> Result<()> {
        self.poll
            .registry()
            .reregister(&mut SourceFd(&fd), token, interest)
            .map_err(wsrep_base::Error::from)?;
        Ok(())
    }

    pub fn deregister(&mut self, fd: RawFd, token: Token) -> Result<()> {
        self.poll
            .registry()
            .deregister(&mut SourceFd(&fd))
            .map_err(wsrep_base::Error::from)?;
        self.handlers.remove(&token);
        Ok(())
    }

    pub fn has_handler(&self, token: Token) -> bool {
        self.handlers.contains_key(&token)
    }

    /// Process one round of ready I/O, blocking up to `timeout` if
    /// nothing is ready yet. Returns the number of tokens that fired.
    /// Reactor-liveness: any interest registered
    /// before this call that becomes ready is guaranteed to fire within
    /// it, since `mio::Poll::poll` itself blocks until at least one
    /// readiness event or the timeout.
    pub fn run_one(&mut self, timeout: Option<StdDuration>) -> Result<usize> {
        self.poll
            .poll(&mut self.events, timeout)
            .map_err(wsrep_base::Error::from)?;
        let fired: Vec<(Token, Readiness)> = self
            .events
            .iter()
            .map(|ev| {
                (
                    ev.token(),
                    Readiness {
                        readable: ev.is_readable(),
                        writable: ev.is_writable(),
                        error: ev.is_error(),
                    },
                )
            })
            .collect();
        let n = fired.len();
        for (token, readiness) in fired {
            if let Some(mut handler) = self.handlers.remove(&token) {
                if handler(self, readiness) {
                    self.handlers.insert(token, handler);
                }
            }
        }
        Ok(n)
    }

    /// Runs the reactor until it has no registered handlers left (e.g.
    /// after `close()` deregisters the last socket).
    pub fn run(&mut self) -> Result<()> {
        while !self.handlers.is_empty() {
            self.run_one(None)?;
        }
        Ok(())
    }

    /// Interrupts a blocked `run`/`run_one` and drops every handler,
    /// used by the GCS FIFO's closed-state shutdown protocol.
    pub fn shutdown(&mut self) -> Result<()> {
        self.handlers.clear();
        Ok(())
    }
}

pub fn busy() -> wsrep_base::Error {
    err(ErrorKind::Conflict, "async operation already in flight on this socket")
}

pub use mio::Token;
