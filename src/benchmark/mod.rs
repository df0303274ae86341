//! The asynchronous client engine

pub mod client;
pub mod engine;
pub mod event_loop;

pub use client::{ConnState, LoadClient};
pub use engine::Engine;
pub use event_loop::{Poller, Ready};
