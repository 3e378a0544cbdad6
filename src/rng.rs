//! Thread-local fast random number generation.
//!
//! Every piece of simulation randomness flows through a per-thread Jenkins
//! small-fast generator. The scheduler seeds the orchestrating thread and
//! each rayon worker at startup: in deterministic mode every thread gets a
//! reproducible stream derived from `seed + thread number`, otherwise the
//! state words come from the high-resolution clock mixed per thread.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cell::RefCell;
use std::time::{SystemTime, UNIX_EPOCH};

/// Jenkins small-fast PRNG. Not cryptographic; picked for speed inside the
/// per-agent tick, which draws from it in deeply nested loops.
#[derive(Clone, Debug)]
pub struct RandomGenerator {
    a: u32,
    b: u32,
    c: u32,
    d: u32,
}

impl RandomGenerator {
    /// Reproducible per-thread stream. The state words must not all be zero,
    /// so a zero-derived seed is remapped to a fixed nonzero constant.
    pub fn deterministic(seed: u32, thread_num: u32) -> RandomGenerator {
        let mut b = seed.wrapping_add(thread_num);
        if b == 0 {
            b = 123456789;
        }
        RandomGenerator {
            a: 0xf1ea5eed,
            b,
            c: b,
            d: b,
        }
    }

    /// Clock-derived stream, unique per thread. The raw clock entropy is
    /// expanded through ChaCha so near-simultaneous thread startups still get
    /// unrelated state words; zero words are rejected.
    pub fn from_entropy(thread_num: u32) -> RandomGenerator {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x5eed_0bad);
        let mut seeder = ChaCha8Rng::seed_from_u64(nanos ^ thread_num as u64);
        let mut b = seeder.gen::<u32>();
        while b == 0 {
            b = seeder.gen::<u32>();
        }
        RandomGenerator {
            a: 0xf1ea5eed,
            b,
            c: b,
            d: b,
        }
    }

    /// Next uniform 32-bit value.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let e = self.a.wrapping_sub(self.b.rotate_left(27));
        self.a = self.b ^ self.c.rotate_left(17);
        self.b = self.c.wrapping_add(self.d);
        self.c = self.d.wrapping_add(e);
        self.d = e.wrapping_add(self.a);
        self.d
    }

    /// Uniform integer in the inclusive interval `[min, max]`. Uses a plain
    /// modulus; the bias is negligible for simulation purposes and the speed
    /// matters in the tick hot path.
    #[inline]
    pub fn range(&mut self, min: u32, max: u32) -> u32 {
        debug_assert!(max >= min);
        self.next_u32() % (max - min + 1) + min
    }

    /// Uniform float in `[0.0, 1.0]`.
    #[inline]
    pub fn unit(&mut self) -> f32 {
        self.next_u32() as f32 / u32::MAX as f32
    }
}

thread_local! {
    static THREAD_RNG: RefCell<RandomGenerator> =
        RefCell::new(RandomGenerator::from_entropy(0));
}

/// (Re)seed the calling thread's generator. Called once on the orchestrating
/// thread and once per rayon worker at pool construction.
pub fn seed_thread(deterministic: bool, seed: u32, thread_num: u32) {
    let generator = if deterministic {
        RandomGenerator::deterministic(seed, thread_num)
    } else {
        RandomGenerator::from_entropy(thread_num)
    };
    THREAD_RNG.with(|cell| *cell.borrow_mut() = generator);
}

/// Uniform 32-bit value from the calling thread's generator.
#[inline]
pub fn random_u32() -> u32 {
    THREAD_RNG.with(|cell| cell.borrow_mut().next_u32())
}

/// Uniform integer in `[min, max]` from the calling thread's generator.
#[inline]
pub fn random_range(min: u32, max: u32) -> u32 {
    THREAD_RNG.with(|cell| cell.borrow_mut().range(min, max))
}

/// Uniform float in `[0.0, 1.0]` from the calling thread's generator.
#[inline]
pub fn random_unit() -> f32 {
    THREAD_RNG.with(|cell| cell.borrow_mut().unit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_streams_match() {
        let mut a = RandomGenerator::deterministic(42, 0);
        let mut b = RandomGenerator::deterministic(42, 0);
        for _ in 0..1000 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_thread_streams_are_independent() {
        let mut a = RandomGenerator::deterministic(42, 0);
        let mut b = RandomGenerator::deterministic(42, 1);
        let matches = (0..100).filter(|_| a.next_u32() == b.next_u32()).count();
        assert!(matches < 5, "streams overlap too much: {matches}");
    }

    #[test]
    fn test_zero_seed_remapped() {
        // seed + thread == 0 must not zero the state words
        let mut rng = RandomGenerator::deterministic(0, 0);
        let first = rng.next_u32();
        let second = rng.next_u32();
        assert!(first != 0 || second != 0);
    }

    #[test]
    fn test_range_is_inclusive() {
        let mut rng = RandomGenerator::deterministic(7, 0);
        let mut seen_min = false;
        let mut seen_max = false;
        for _ in 0..10_000 {
            let v = rng.range(3, 10);
            assert!((3..=10).contains(&v));
            seen_min |= v == 3;
            seen_max |= v == 10;
        }
        assert!(seen_min && seen_max);
    }

    #[test]
    fn test_unit_bounds() {
        let mut rng = RandomGenerator::deterministic(99, 0);
        for _ in 0..10_000 {
            let v = rng.unit();
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_seed_thread_reseeds() {
        seed_thread(true, 1234, 0);
        let first = random_u32();
        seed_thread(true, 1234, 0);
        assert_eq!(first, random_u32());
    }
}
