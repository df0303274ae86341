//! Error types for kv-load

use std::io;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        source: io::Error,
    },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Data mismatch for KEY string:{keyid}: {detail}")]
    Integrity { keyid: u64, detail: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// RESP wire protocol errors. These indicate a version mismatch or
/// buffer corruption and are fatal for the run.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid RESP type byte: 0x{0:02x}")]
    InvalidType(u8),

    #[error("Invalid {0} header")]
    InvalidHeader(&'static str),
}

pub type Result<T> = std::result::Result<T, LoadError>;
