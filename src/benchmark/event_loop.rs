//! Readiness multiplexer
//!
//! A thin wrapper over `mio::Poll` for a single-threaded pool of
//! non-blocking sockets. Registration is keyed by a slot token owned by
//! the engine; interest is re-armed explicitly per direction as a
//! client moves through its state machine. Callers treat readiness as
//! level-triggered by retrying work until `WouldBlock`.

use std::io;
use std::time::Duration;

use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token};

/// One readiness notification, decoupled from mio's event lifetime so
/// the engine can mutate clients while walking the batch.
#[derive(Debug, Clone, Copy)]
pub struct Ready {
    pub token: Token,
    pub readable: bool,
    pub writable: bool,
    /// Peer closed its end (or the socket errored); the next I/O call
    /// surfaces the exact condition.
    pub closed: bool,
}

pub struct Poller {
    poll: Poll,
    events: Events,
}

impl Poller {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(1024),
        })
    }

    pub fn register(
        &self,
        stream: &mut TcpStream,
        token: Token,
        interest: Interest,
    ) -> io::Result<()> {
        self.poll.registry().register(stream, token, interest)
    }

    /// Re-arm an already-registered socket with a new interest set.
    pub fn rearm(
        &self,
        stream: &mut TcpStream,
        token: Token,
        interest: Interest,
    ) -> io::Result<()> {
        self.poll.registry().reregister(stream, token, interest)
    }

    pub fn deregister(&self, stream: &mut TcpStream) -> io::Result<()> {
        self.poll.registry().deregister(stream)
    }

    /// Wait for readiness and drain the batch into `out`.
    ///
    /// A short timeout keeps the caller responsive to signal flags even
    /// when no socket is ready.
    pub fn poll_into(&mut self, out: &mut Vec<Ready>, timeout: Option<Duration>) -> io::Result<()> {
        out.clear();
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e),
        }
        for event in self.events.iter() {
            out.push(Ready {
                token: event.token(),
                readable: event.is_readable(),
                writable: event.is_writable(),
                closed: event.is_read_closed() || event.is_write_closed() || event.is_error(),
            });
        }
        Ok(())
    }
}
