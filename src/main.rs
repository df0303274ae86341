//! kv-load - load generator and benchmark driver for RESP key-value servers
//!
//! Maintains a fixed pool of concurrent connections on a single-threaded
//! event loop, issues a randomly-mixed operation stream against a
//! deterministic keyspace, and reports throughput with a cumulative
//! latency distribution. With `check`, payloads are a pure function of
//! the key identity and reads are verified bit-for-bit.

// The binary shares its module tree with the library target; items the
// binary itself never touches are still part of the library surface.
#![allow(dead_code)]

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

mod benchmark;
mod config;
mod metrics;
mod utils;
mod workload;

use benchmark::Engine;
use config::{usage, CliArgs, CliError, LoadConfig};

fn setup_logging(debug: bool, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Install the signal shim: SIGHUP ignored, first SIGINT latches the
/// graceful-stop flag the engine polls, second SIGINT exits hard.
/// (SIGPIPE is already ignored by the Rust runtime.)
fn install_signals() -> Result<Arc<AtomicBool>> {
    use signal_hook::consts::{SIGHUP, SIGINT};
    use signal_hook::flag;

    flag::register(SIGHUP, Arc::new(AtomicBool::new(false)))?;

    let stop = Arc::new(AtomicBool::new(false));
    // Registration order matters: the conditional shutdown fires only
    // when the flag is already set, i.e. on the second delivery.
    flag::register_conditional_shutdown(SIGINT, 1, Arc::clone(&stop))?;
    flag::register(SIGINT, Arc::clone(&stop))?;
    Ok(stop)
}

fn run() -> Result<i32> {
    let args = match CliArgs::parse_tokens(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(CliError::Help) => {
            print!("{}", usage());
            return Ok(0);
        }
        Err(CliError::Invalid(msg)) => {
            println!("{}\n", msg);
            print!("{}", usage());
            return Ok(1);
        }
    };

    let cfg = LoadConfig::from_cli(args);
    setup_logging(cfg.debug, cfg.quiet);

    if !cfg.keepalive {
        println!(
            "WARNING: keepalive disabled, you probably need 'echo 1 > \
             /proc/sys/net/ipv4/tcp_tw_reuse' for Linux and 'sudo sysctl -w \
             net.inet.tcp.msl=1000' for Mac OS X in order to use a lot of \
             clients/requests"
        );
    }
    if cfg.idle {
        println!(
            "Creating {} idle connections and waiting forever (Ctrl+C when done)",
            cfg.clients
        );
    }

    let stop = install_signals()?;
    println!(
        "PRNG seed is: {} - use the 'seed' option to reproduce the same sequence",
        cfg.prng_seed
    );

    let mut engine = Engine::new(cfg.clone(), stop)?;
    loop {
        let report = engine.run_pass()?;
        if cfg.idle && engine.interrupted() {
            return Ok(1);
        }
        report.print(engine.config(), engine.histogram());
        if !cfg.loop_forever || engine.interrupted() {
            break;
        }
    }
    Ok(0)
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
