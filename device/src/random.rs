//! Seeded pseudo-random generators, one per device.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::distributions::{Distribution, Standard};
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};

/// Seed every generator starts from until it is reseeded.
pub const DEFAULT_SEED: u64 = 67280421310721;

#[derive(Debug)]
struct State {
    seed: u64,
    rng: SmallRng,
}

#[derive(Debug)]
pub struct Generator {
    state: Mutex<State>,
}

impl Default for Generator {
    fn default() -> Self {
        Generator::new(DEFAULT_SEED)
    }
}

impl Generator {
    pub fn new(seed: u64) -> Generator {
        Generator { state: Mutex::new(State { seed, rng: SmallRng::seed_from_u64(seed) }) }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Restart the generator from `seed`.
    pub fn manual_seed(&self, seed: u64) {
        let mut state = self.lock();
        state.seed = seed;
        state.rng = SmallRng::seed_from_u64(seed);
    }

    /// Seed of the current sequence.
    pub fn initial_seed(&self) -> u64 {
        self.lock().seed
    }

    pub fn next_u64(&self) -> u64 {
        self.lock().rng.next_u64()
    }

    pub fn sample<T>(&self) -> T
    where
        Standard: Distribution<T>,
    {
        self.lock().rng.sample(Standard)
    }

    /// Fill `xs` with values uniformly drawn from `[0, 1)`.
    pub fn fill_uniform(&self, xs: &mut [f32]) {
        let mut state = self.lock();
        xs.iter_mut().for_each(|x| *x = state.rng.sample(Standard));
    }
}
