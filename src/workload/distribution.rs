//! Key-id access distributions
//!
//! Two patterns: uniform over the keyspace, and a power-law ("long
//! tail") distribution that concentrates accesses on the low key ids.
//! Both draw from the engine's seeded uniform RNG, which is distinct
//! from the payload keystream so that payload bytes stay reproducible
//! even when the access pattern changes.

/// How key ids are drawn from `[0, keyspace)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPattern {
    Uniform,
    /// Power-law with integer shaping order in `[2, 100]`. Order 6
    /// gives roughly 20% of keys 79% of the accesses.
    LongTail { order: u32 },
}

impl KeyPattern {
    /// Draw the next key id in `[0, keyspace)`.
    pub fn next_key(&self, rng: &mut fastrand::Rng, keyspace: u64) -> u64 {
        match *self {
            KeyPattern::Uniform => rng.u64(..) % keyspace,
            KeyPattern::LongTail { order } => longtail(rng, 0, keyspace - 1, order),
        }
    }
}

/// Power-law biased draw in `[min, max]`, hottest at `min`.
///
/// Inverse-transform sampling of p(x) ~ x^n over the range, mirrored so
/// the mass lands on the low end. The math is floating point; results
/// may differ by one unit across platforms.
pub fn longtail(rng: &mut fastrand::Rng, min: u64, max: u64, order: u32) -> u64 {
    let r = rng.f64();
    let max = max + 1;
    let n = order as i32 + 1;
    let lo = (min as f64).powi(n);
    let hi = (max as f64).powi(n);
    // r < 1 keeps pl below max mathematically; the min() guards the
    // rounding edge where powf lands exactly on max.
    let pl = (((hi - lo) * r + lo).powf(1.0 / n as f64) as u64).min(max - 1);
    (max - 1 - pl) + min
}
