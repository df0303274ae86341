//! Workload generation: keystream, key distributions, op mix, payloads

pub mod distribution;
pub mod keystream;
pub mod optab;
pub mod payload;

pub use distribution::{longtail, KeyPattern};
pub use keystream::Keystream;
pub use optab::{OpKind, OpTable};
pub use payload::PayloadGen;
