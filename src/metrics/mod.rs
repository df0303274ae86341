//! Latency accounting and report output

pub mod histogram;
pub mod report;

pub use histogram::{LatencyHistogram, MAX_LATENCY_MS};
pub use report::PassReport;
