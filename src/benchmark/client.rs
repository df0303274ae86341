//! Per-connection request/reply state machine
//!
//! Each client owns one non-blocking socket and carries at most one
//! request at a time: Connecting until the handshake finishes, Sending
//! while outbound bytes remain, Reading until the reply parser
//! completes. Idle is the parked state of idle-mode connections, which
//! never send anything.

use std::io::{self, ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::time::Instant;

use mio::net::TcpStream;

use crate::utils::error::Result;
use crate::utils::{Reply, ReplyParser};
use crate::workload::OpKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Sending,
    Reading,
    Idle,
}

/// Outcome of a write attempt.
pub enum WriteStep {
    /// Outbound buffer fully handed to the kernel.
    Drained,
    WouldBlock,
    /// Server closed the connection (EPIPE/reset); close silently.
    PeerClosed,
}

/// Outcome of a read attempt.
pub enum ReadStep {
    Complete(Reply),
    NeedMore,
    Eof,
}

pub struct LoadClient {
    stream: TcpStream,
    pub state: ConnState,
    pub op: OpKind,
    pub keyid: u64,
    start: Instant,
    out: Vec<u8>,
    out_pos: usize,
    parser: ReplyParser,
}

impl LoadClient {
    /// Start a non-blocking connect; the socket becomes writable once
    /// the handshake completes (or fails).
    pub fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            state: ConnState::Connecting,
            op: OpKind::Idle,
            keyid: 0,
            start: Instant::now(),
            out: Vec::with_capacity(256),
            out_pos: 0,
            parser: ReplyParser::new(),
        })
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Load the next request. The connection may still be mid-handshake;
    /// the outbound bytes go out once it turns writable.
    pub fn set_request(&mut self, op: OpKind, keyid: u64, command: &[u8]) {
        self.op = op;
        self.keyid = keyid;
        self.out.clear();
        self.out.extend_from_slice(command);
        self.out_pos = 0;
        self.parser.reset();
        self.start = Instant::now();
        if self.state != ConnState::Connecting {
            self.state = ConnState::Sending;
        }
    }

    /// Probe a Connecting socket after a writable event. `Ok(true)`
    /// means the handshake finished and the latency clock restarts so
    /// connect time is not billed to the first request.
    pub fn check_connected(&mut self) -> io::Result<bool> {
        if let Some(err) = self.stream.take_error()? {
            return Err(err);
        }
        match self.stream.peer_addr() {
            Ok(_) => {
                self.start = Instant::now();
                self.state = if self.op == OpKind::Idle {
                    ConnState::Idle
                } else {
                    ConnState::Sending
                };
                Ok(true)
            }
            Err(ref e) if e.kind() == ErrorKind::NotConnected => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Push outbound bytes until the kernel stops accepting them.
    pub fn try_write(&mut self) -> io::Result<WriteStep> {
        while self.out_pos < self.out.len() {
            match self.stream.write(&self.out[self.out_pos..]) {
                Ok(0) => return Ok(WriteStep::PeerClosed),
                Ok(n) => self.out_pos += n,
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    return Ok(WriteStep::WouldBlock)
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(ref e)
                    if e.kind() == ErrorKind::BrokenPipe
                        || e.kind() == ErrorKind::ConnectionReset =>
                {
                    return Ok(WriteStep::PeerClosed)
                }
                Err(e) => return Err(e),
            }
        }
        self.state = ConnState::Reading;
        Ok(WriteStep::Drained)
    }

    /// Drain readable bytes into the parser. Completes at most one
    /// reply; there is never more than one in flight.
    pub fn try_read(&mut self) -> Result<ReadStep> {
        let mut chunk = [0u8; 16 * 1024];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Ok(ReadStep::Eof),
                Ok(n) => {
                    if let Some(reply) = self.parser.feed(&chunk[..n])? {
                        return Ok(ReadStep::Complete(reply));
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return Ok(ReadStep::NeedMore),
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Milliseconds since this request was issued (or since the
    /// handshake finished, for a request issued mid-connect).
    pub fn latency_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
