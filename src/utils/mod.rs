//! Utility modules

pub mod error;
pub mod resp;

pub use error::{LoadError, ProtocolError, Result};
pub use resp::{CommandEncoder, Reply, ReplyParser};
