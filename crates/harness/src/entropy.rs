//! Uniform draws from a fallible randomness source

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::RngCore;

/// Randomness source the scheduler draws from.
///
/// Failures are surfaced rather than retried; the scheduler treats them as
/// fatal.
pub trait Entropy: Send {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), rand::Error>;

    /// Uniform integer in `[0, bound)`. A zero bound yields zero.
    fn below(&mut self, bound: u64) -> Result<u64, rand::Error> {
        if bound <= 1 {
            return Ok(0);
        }
        // Largest multiple of `bound` representable; draws above it are rejected.
        let zone = u64::MAX - (u64::MAX % bound);
        loop {
            let mut buf = [0u8; 8];
            self.fill(&mut buf)?;
            let value = u64::from_le_bytes(buf);
            if value < zone {
                return Ok(value % bound);
            }
        }
    }

    /// Uniform duration in `[0, max)`, at nanosecond resolution.
    fn pause(&mut self, max: Duration) -> Result<Duration, rand::Error> {
        let bound = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
        Ok(Duration::from_nanos(self.below(bound)?))
    }
}

impl<R: RngCore + Send> Entropy for R {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.try_fill_bytes(dest)
    }
}

/// Builds the randomness source of each actor, keyed by actor id.
pub type EntropySource = Arc<dyn Fn(usize) -> Box<dyn Entropy> + Send + Sync>;

/// Operating system randomness for every actor.
pub fn os_entropy() -> EntropySource {
    Arc::new(|_: usize| -> Box<dyn Entropy> { Box::new(OsRng) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Exhausted;

    impl Entropy for Exhausted {
        fn fill(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new("entropy exhausted"))
        }
    }

    #[test]
    fn test_below_stays_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..1_000 {
            assert!(rng.below(5).unwrap() < 5);
        }
    }

    #[test]
    fn test_below_covers_every_value() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut seen = [false; 5];
        for _ in 0..500 {
            seen[rng.below(5).unwrap() as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_trivial_bounds() {
        let mut source = Exhausted;
        assert_eq!(source.below(0).unwrap(), 0);
        assert_eq!(source.below(1).unwrap(), 0);
        assert_eq!(source.pause(Duration::ZERO).unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_pause_under_max() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let max = Duration::from_secs(1);
        for _ in 0..100 {
            assert!(rng.pause(max).unwrap() < max);
        }
    }

    #[test]
    fn test_failure_propagates() {
        let mut source = Exhausted;
        assert!(source.below(5).is_err());
        assert!(source.pause(Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_os_entropy() {
        let source = os_entropy();
        let mut entropy = source(0);
        assert!(entropy.below(5).unwrap() < 5);
    }
}
