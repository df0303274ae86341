//! Client pool, scheduler and pass driver
//!
//! The engine owns everything a benchmark pass touches: configuration,
//! the uniform RNG, the payload keystream, the op table, the histogram
//! and the client arena. It is single-threaded; the only state shared
//! with the outside is the SIGINT latch.
//!
//! Clients live in a slot arena whose indices double as mio tokens.
//! A client torn down mid-tick leaves its slot empty, so a stale event
//! later in the same batch finds nothing and no-ops; replacements are
//! only spawned after the batch is drained.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mio::{Interest, Token};
use tracing::{debug, warn};

use super::client::{ConnState, LoadClient, ReadStep, WriteStep};
use super::event_loop::{Poller, Ready};
use crate::config::LoadConfig;
use crate::metrics::{LatencyHistogram, PassReport};
use crate::utils::{CommandEncoder, LoadError, Reply, Result};
use crate::workload::{Keystream, OpKind, OpTable, PayloadGen};

/// Poll timeout; bounds how long a latched Ctrl-C can go unnoticed.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

pub struct Engine {
    cfg: LoadConfig,
    addr: SocketAddr,
    rng: fastrand::Rng,
    keystream: Keystream,
    optab: OpTable,
    payload: PayloadGen,
    encoder: CommandEncoder,
    histogram: LatencyHistogram,
    poller: Poller,
    slots: Vec<Option<LoadClient>>,
    free: Vec<usize>,
    live: usize,
    issued: u64,
    done: bool,
    stop: Arc<AtomicBool>,
    stop_seen: bool,
}

impl Engine {
    pub fn new(cfg: LoadConfig, stop: Arc<AtomicBool>) -> Result<Self> {
        let addr = cfg.resolve_addr()?;
        let rng = fastrand::Rng::with_seed(cfg.prng_seed as u64);
        let optab = OpTable::from_config(&cfg);
        let payload = PayloadGen::new(&cfg);

        Ok(Self {
            cfg,
            addr,
            rng,
            keystream: Keystream::new(0),
            optab,
            payload,
            encoder: CommandEncoder::with_capacity(4096),
            histogram: LatencyHistogram::new(),
            poller: Poller::new()?,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            issued: 0,
            done: false,
            stop,
            stop_seen: false,
        })
    }

    pub fn config(&self) -> &LoadConfig {
        &self.cfg
    }

    pub fn histogram(&self) -> &LatencyHistogram {
        &self.histogram
    }

    /// Whether the SIGINT latch fired during the last pass.
    pub fn interrupted(&self) -> bool {
        self.stop_seen
    }

    /// Run one benchmark pass to completion (or to a latched Ctrl-C).
    pub fn run_pass(&mut self) -> Result<PassReport> {
        self.histogram.reset();
        self.issued = 0;
        self.done = false;
        self.stop_seen = false;
        let pass_start = Instant::now();

        // Startup connect failures are fatal; later ones only cost the
        // affected client.
        self.create_missing(true)?;

        let mut ready: Vec<Ready> = Vec::with_capacity(1024);
        // Keep running while budget remains even if every client died:
        // replenishment retries until the server comes back or Ctrl-C.
        while self.live > 0 || !self.done {
            self.poller.poll_into(&mut ready, Some(POLL_TIMEOUT))?;
            let stopped = self.observe_stop();
            if stopped && self.cfg.idle {
                break;
            }
            for ev in &ready {
                self.dispatch(*ev)?;
            }
            if !self.done {
                self.create_missing(false)?;
            }
        }

        Ok(PassReport {
            issued: self.issued,
            elapsed_ms: pass_start.elapsed().as_millis() as u64,
        })
    }

    /// Check the SIGINT latch; on first observation switch to draining.
    fn observe_stop(&mut self) -> bool {
        if !self.stop.load(Ordering::Relaxed) {
            return false;
        }
        if !self.stop_seen {
            self.stop_seen = true;
            if !self.cfg.idle {
                println!("\nWaiting for pending requests to complete...");
                self.done = true;
            }
        }
        true
    }

    /// Top the pool up to the configured client count.
    fn create_missing(&mut self, startup: bool) -> Result<()> {
        while self.live < self.cfg.clients as usize && !self.done {
            match self.spawn_client() {
                Ok(()) => {}
                Err(e) if startup => return Err(e),
                Err(e) => {
                    // Retried on the next tick.
                    warn!("connect failed, will retry: {}", e);
                    break;
                }
            }
        }
        Ok(())
    }

    fn spawn_client(&mut self) -> Result<()> {
        let mut client = LoadClient::connect(self.addr).map_err(|e| LoadError::Connect {
            host: self.cfg.host.clone(),
            port: self.cfg.port,
            source: e,
        })?;

        // The first request is prepared before the handshake finishes;
        // the bytes go out once the socket turns writable.
        self.prepare_request(&mut client);

        let slot = self.free.pop().unwrap_or_else(|| {
            self.slots.push(None);
            self.slots.len() - 1
        });
        self.poller
            .register(client.stream_mut(), Token(slot), Interest::WRITABLE)?;
        self.slots[slot] = Some(client);
        self.live += 1;
        Ok(())
    }

    /// Pick the next operation and load it into the client.
    fn prepare_request(&mut self, client: &mut LoadClient) {
        let op = self.optab.pick(&mut self.rng);
        let pattern = self.cfg.key_pattern();
        let key = pattern.next_key(&mut self.rng, self.cfg.keyspace);
        let hashkey = pattern.next_key(&mut self.rng, self.cfg.hashkeyspace);

        self.issued += 1;
        if self.issued == self.cfg.requests {
            self.done = true;
        }

        if op == OpKind::Idle {
            client.op = OpKind::Idle;
            client.keyid = key;
            return;
        }

        self.encoder.clear();
        match op {
            OpKind::Set => {
                let skey = key_arg(b"string:", key);
                let payload = self.payload.generate(key, &mut self.keystream, &mut self.rng);
                self.encoder
                    .encode_command(&[b"SET".as_slice(), &skey, payload]);
            }
            OpKind::Get => {
                self.encoder
                    .encode_command(&[b"GET".as_slice(), &key_arg(b"string:", key)]);
            }
            OpKind::Del => {
                self.encoder.encode_command(&[
                    b"DEL".as_slice(),
                    &key_arg(b"string:", key),
                    &key_arg(b"list:", key),
                    &key_arg(b"hash:", key),
                ]);
            }
            OpKind::LPush => {
                let lkey = key_arg(b"list:", key);
                let payload = self.payload.generate(key, &mut self.keystream, &mut self.rng);
                self.encoder
                    .encode_command(&[b"LPUSH".as_slice(), &lkey, payload]);
            }
            OpKind::LPop => {
                self.encoder
                    .encode_command(&[b"LPOP".as_slice(), &key_arg(b"list:", key)]);
            }
            OpKind::HSet => {
                let hkey = key_arg(b"hash:", key);
                let field = key_arg(b"key:", hashkey);
                let payload = self.payload.generate(key, &mut self.keystream, &mut self.rng);
                self.encoder
                    .encode_command(&[b"HSET".as_slice(), &hkey, &field, payload]);
            }
            OpKind::HGet => {
                self.encoder.encode_command(&[
                    b"HGET".as_slice(),
                    &key_arg(b"hash:", key),
                    &key_arg(b"key:", hashkey),
                ]);
            }
            OpKind::HGetAll => {
                self.encoder
                    .encode_command(&[b"HGETALL".as_slice(), &key_arg(b"hash:", key)]);
            }
            OpKind::SwapIn => {
                self.encoder.encode_command(&[
                    b"DEBUG".as_slice(),
                    b"SWAPIN",
                    &key_arg(b"string:", key),
                ]);
            }
            OpKind::Idle => unreachable!(),
        }

        client.set_request(op, key, self.encoder.as_bytes());
    }

    fn dispatch(&mut self, ev: Ready) -> Result<()> {
        let slot = ev.token.0;
        // A client torn down earlier in this batch leaves a stale event.
        let state = match self.slots.get(slot).and_then(|s| s.as_ref()) {
            Some(client) => client.state,
            None => return Ok(()),
        };

        match state {
            ConnState::Connecting | ConnState::Sending if ev.writable || ev.closed => {
                self.drive_write(slot)
            }
            ConnState::Reading if ev.readable || ev.closed => self.drive_read(slot),
            _ => Ok(()),
        }
    }

    fn drive_write(&mut self, slot: usize) -> Result<()> {
        let mut client = match self.slots[slot].take() {
            Some(c) => c,
            None => return Ok(()),
        };

        if client.state == ConnState::Connecting {
            match client.check_connected() {
                Ok(true) => {}
                Ok(false) => {
                    self.slots[slot] = Some(client);
                    return Ok(());
                }
                Err(e) => {
                    warn!("connect failed: {}", e);
                    self.teardown(slot, client);
                    return Ok(());
                }
            }
            if client.state == ConnState::Idle {
                // Idle-mode connection: parked for good, no interest.
                let _ = self.poller.deregister(client.stream_mut());
                self.slots[slot] = Some(client);
                return Ok(());
            }
        }

        self.continue_write(slot, client);
        Ok(())
    }

    /// Push outbound bytes and re-arm interest for the outcome.
    fn continue_write(&mut self, slot: usize, mut client: LoadClient) {
        match client.try_write() {
            Ok(WriteStep::Drained) => {
                if let Err(e) =
                    self.poller
                        .rearm(client.stream_mut(), Token(slot), Interest::READABLE)
                {
                    warn!("rearm failed: {}", e);
                    self.teardown(slot, client);
                    return;
                }
                self.slots[slot] = Some(client);
            }
            Ok(WriteStep::WouldBlock) => {
                self.slots[slot] = Some(client);
            }
            Ok(WriteStep::PeerClosed) => {
                // Server went away between requests; the replacement
                // reconnects without noise.
                debug!("peer closed during write");
                self.teardown(slot, client);
            }
            Err(e) => {
                warn!("write error: {}", e);
                self.teardown(slot, client);
            }
        }
    }

    fn drive_read(&mut self, slot: usize) -> Result<()> {
        let mut client = match self.slots[slot].take() {
            Some(c) => c,
            None => return Ok(()),
        };

        match client.try_read() {
            Ok(ReadStep::Complete(reply)) => self.complete(slot, client, reply),
            Ok(ReadStep::NeedMore) => {
                self.slots[slot] = Some(client);
                Ok(())
            }
            Ok(ReadStep::Eof) => {
                warn!("server closed connection mid-reply");
                self.teardown(slot, client);
                Ok(())
            }
            Err(e @ LoadError::Protocol(_)) => {
                // Protocol violations mean version mismatch or buffer
                // corruption; nothing sensible can continue.
                self.teardown(slot, client);
                Err(e)
            }
            Err(LoadError::Io(e)) => {
                warn!("read error: {}", e);
                self.teardown(slot, client);
                Ok(())
            }
            Err(e) => {
                self.teardown(slot, client);
                Err(e)
            }
        }
    }

    /// Account a finished request and either reissue or close.
    fn complete(&mut self, slot: usize, mut client: LoadClient, reply: Reply) -> Result<()> {
        if let Reply::Error(msg) = &reply {
            self.teardown(slot, client);
            return Err(LoadError::Server(msg.clone()));
        }

        self.histogram.record(client.latency_ms());

        if self.cfg.check {
            if let Err(e) = self.verify(&client, &reply) {
                self.teardown(slot, client);
                return Err(e);
            }
        }

        if self.done || self.stop.load(Ordering::Relaxed) {
            self.teardown(slot, client);
            return Ok(());
        }

        if self.cfg.keepalive {
            self.prepare_request(&mut client);
            // The socket was just readable; optimistically write now
            // and fall back to a writable wakeup if the kernel pushes
            // back.
            match client.try_write() {
                Ok(WriteStep::Drained) => {
                    if let Err(e) =
                        self.poller
                            .rearm(client.stream_mut(), Token(slot), Interest::READABLE)
                    {
                        warn!("rearm failed: {}", e);
                        self.teardown(slot, client);
                        return Ok(());
                    }
                    self.slots[slot] = Some(client);
                }
                Ok(WriteStep::WouldBlock) => {
                    if let Err(e) =
                        self.poller
                            .rearm(client.stream_mut(), Token(slot), Interest::WRITABLE)
                    {
                        warn!("rearm failed: {}", e);
                        self.teardown(slot, client);
                        return Ok(());
                    }
                    self.slots[slot] = Some(client);
                }
                Ok(WriteStep::PeerClosed) => {
                    debug!("peer closed between requests");
                    self.teardown(slot, client);
                }
                Err(e) => {
                    warn!("write error: {}", e);
                    self.teardown(slot, client);
                }
            }
        } else {
            // Reconnect mode: the replacement is spawned once the event
            // batch is drained.
            self.teardown(slot, client);
        }
        Ok(())
    }

    /// Compare a GET reply against the keystream-regenerated payload.
    fn verify(&mut self, client: &LoadClient, reply: &Reply) -> Result<()> {
        if client.op != OpKind::Get {
            return Ok(());
        }
        let bulk = match reply.as_bulk() {
            Some(b) => b,
            // Nil (key never written) and non-bulk kinds carry nothing
            // to verify.
            None => return Ok(()),
        };

        let expected = self.payload.expected(client.keyid, &mut self.keystream);
        if bulk.len() != expected.len() {
            return Err(LoadError::Integrity {
                keyid: client.keyid,
                detail: format!("length {} instead of {}", bulk.len(), expected.len()),
            });
        }
        if bulk != expected {
            return Err(LoadError::Integrity {
                keyid: client.keyid,
                detail: "payload bytes differ".to_string(),
            });
        }
        Ok(())
    }

    fn teardown(&mut self, slot: usize, mut client: LoadClient) {
        let _ = self.poller.deregister(client.stream_mut());
        self.free.push(slot);
        self.live -= 1;
    }
}

/// Namespaced key argument, e.g. `string:1234`.
fn key_arg(prefix: &[u8], id: u64) -> Vec<u8> {
    let mut digits = itoa::Buffer::new();
    let digits = digits.format(id).as_bytes();
    let mut arg = Vec::with_capacity(prefix.len() + digits.len());
    arg.extend_from_slice(prefix);
    arg.extend_from_slice(digits);
    arg
}
