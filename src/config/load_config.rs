//! Resolved benchmark configuration
//!
//! `LoadConfig` is the immutable form the engine runs against: CLI
//! arguments with sanitization applied and the PRNG seed pinned down.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{SystemTime, UNIX_EPOCH};

use super::cli::CliArgs;
use crate::utils::{LoadError, Result};
use crate::workload::KeyPattern;

const DEFAULT_KEYSPACE: u64 = 100_000;
const DEFAULT_HASHKEYSPACE: u64 = 1_000;
const MAX_DATASIZE: u64 = 1 << 20;

/// Immutable configuration for one run.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub host: String,
    pub port: u16,
    pub clients: u32,
    pub requests: u64,
    pub datasize_min: u64,
    pub datasize_max: u64,
    pub keyspace: u64,
    pub hashkeyspace: u64,
    pub set_perc: u32,
    pub del_perc: u32,
    pub lpush_perc: u32,
    pub lpop_perc: u32,
    pub hset_perc: u32,
    pub hget_perc: u32,
    pub hgetall_perc: u32,
    pub swapin_perc: u32,
    pub keepalive: bool,
    pub rand: bool,
    pub check: bool,
    pub longtail: bool,
    pub longtail_order: u32,
    pub quiet: bool,
    pub loop_forever: bool,
    pub idle: bool,
    pub debug: bool,
    pub prng_seed: u32,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self::from_cli(CliArgs::default())
    }
}

impl LoadConfig {
    /// Apply sanitization and seed derivation to parsed arguments.
    pub fn from_cli(args: CliArgs) -> Self {
        let prng_seed = args.seed.unwrap_or_else(derive_seed);

        Self {
            host: args.host,
            port: args.port,
            clients: args.clients,
            requests: args.requests,
            datasize_min: args.datasize_min.clamp(1, MAX_DATASIZE),
            datasize_max: args.datasize_max.clamp(1, MAX_DATASIZE),
            keyspace: if args.keyspace < 1 {
                DEFAULT_KEYSPACE
            } else {
                args.keyspace
            },
            hashkeyspace: if args.hashkeyspace < 1 {
                DEFAULT_HASHKEYSPACE
            } else {
                args.hashkeyspace
            },
            set_perc: args.set_perc,
            del_perc: args.del_perc,
            lpush_perc: args.lpush_perc,
            lpop_perc: args.lpop_perc,
            hset_perc: args.hset_perc,
            hget_perc: args.hget_perc,
            hgetall_perc: args.hgetall_perc,
            swapin_perc: args.swapin_perc,
            keepalive: args.keepalive,
            rand: args.rand,
            check: args.check,
            longtail: args.longtail,
            longtail_order: args.longtail_order,
            quiet: args.quiet,
            loop_forever: args.loop_forever,
            idle: args.idle,
            debug: args.debug,
            prng_seed,
        }
    }

    /// Key access pattern for this run.
    pub fn key_pattern(&self) -> KeyPattern {
        if self.longtail {
            KeyPattern::LongTail {
                order: self.longtail_order,
            }
        } else {
            KeyPattern::Uniform
        }
    }

    /// Resolve the target endpoint. Failure here is fatal at startup.
    pub fn resolve_addr(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| LoadError::Connect {
                host: self.host.clone(),
                port: self.port,
                source: e,
            })?
            .next()
            .ok_or_else(|| LoadError::Connect {
                host: self.host.clone(),
                port: self.port,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"),
            })
    }
}

/// Default seed: wall clock microseconds XOR pid, truncated to 32 bits.
/// Zero is possible and harmless; the seed actually used is echoed.
fn derive_seed() -> u32 {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);
    (micros ^ std::process::id() as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datasize_clamps() {
        let mut args = CliArgs::default();
        args.datasize_min = 0;
        args.datasize_max = 1 << 30;
        let cfg = LoadConfig::from_cli(args);
        assert_eq!(cfg.datasize_min, 1);
        assert_eq!(cfg.datasize_max, MAX_DATASIZE);
    }

    #[test]
    fn test_zero_keyspace_resets_to_default() {
        let mut args = CliArgs::default();
        args.keyspace = 0;
        args.hashkeyspace = 0;
        let cfg = LoadConfig::from_cli(args);
        assert_eq!(cfg.keyspace, DEFAULT_KEYSPACE);
        assert_eq!(cfg.hashkeyspace, DEFAULT_HASHKEYSPACE);
    }

    #[test]
    fn test_explicit_seed_is_kept() {
        let mut args = CliArgs::default();
        args.seed = Some(42);
        let cfg = LoadConfig::from_cli(args);
        assert_eq!(cfg.prng_seed, 42);
    }

    #[test]
    fn test_key_pattern_follows_longtail_flag() {
        let mut args = CliArgs::default();
        args.longtail = true;
        args.longtail_order = 8;
        let cfg = LoadConfig::from_cli(args);
        assert_eq!(cfg.key_pattern(), KeyPattern::LongTail { order: 8 });

        let cfg = LoadConfig::default();
        assert_eq!(cfg.key_pattern(), KeyPattern::Uniform);
    }

    #[test]
    fn test_resolve_loopback() {
        let mut args = CliArgs::default();
        args.host = "127.0.0.1".to_string();
        args.port = 6379;
        let cfg = LoadConfig::from_cli(args);
        let addr = cfg.resolve_addr().unwrap();
        assert_eq!(addr.port(), 6379);
    }
}
