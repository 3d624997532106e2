//! Human-timing simulation: bounded-normal delay sampling.

use std::time::Duration;

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::models::settings::TimingTriple;

/// Sample a value from `Normal(mean, std_dev)` clamped to `min` (and to
/// zero — durations are never negative).
///
/// A zero or non-finite standard deviation collapses to the mean.
pub fn sample_seconds<R: Rng + ?Sized>(triple: TimingTriple, rng: &mut R) -> f64 {
    let raw = match Normal::new(triple.mean, triple.std_dev) {
        Ok(normal) => normal.sample(rng),
        Err(_) => triple.mean,
    };
    raw.max(triple.min).max(0.0)
}

/// Sample a delay duration from a timing triple.
#[must_use]
pub fn sample_delay(triple: TimingTriple) -> Duration {
    Duration::from_secs_f64(sample_seconds(triple, &mut rand::thread_rng()))
}

/// Uniform wait before the next unsolicited conversation attempt.
#[must_use]
pub fn conversation_wait(min_secs: u64, max_secs: u64) -> Duration {
    if max_secs <= min_secs {
        return Duration::from_secs(min_secs);
    }
    Duration::from_secs(rand::thread_rng().gen_range(min_secs..=max_secs))
}

/// How long typing `chars` characters takes at a sampled typing speed
/// (characters per second).
#[must_use]
pub fn typing_duration(chars: usize, speed: TimingTriple) -> Duration {
    // Guard the divisor; a degenerate speed triple must not stall the
    // session forever.
    let cps = sample_seconds(speed, &mut rand::thread_rng()).max(0.1);
    #[allow(clippy::cast_precision_loss)]
    let chars = chars as f64;
    Duration::from_secs_f64(chars / cps)
}
