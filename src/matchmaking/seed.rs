//! Per-room random seeds
//!
//! Both clients of a room derive their session randomness from the room
//! seed. One shared generator behind a mutex draws the seeds and remembers
//! every seed handed out, redrawing on a collision, so no two rooms in the
//! same process share a seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Largest seed value, matching the non-negative 32-bit signed range clients expect
pub const MAX_SEED: u32 = i32::MAX as u32;

struct SeedState {
    rng: StdRng,
    issued: HashSet<u32>,
}

/// Source of unique room seeds
pub struct SeedSource {
    state: Mutex<SeedState>,
}

impl SeedSource {
    /// Create a seed source backed by OS entropy
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create a reproducible seed source, for tests and benchmarks
    pub fn from_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            state: Mutex::new(SeedState {
                rng,
                issued: HashSet::new(),
            }),
        }
    }

    /// Draw a seed that has not been issued before
    pub fn next_seed(&self) -> u32 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let seed = state.rng.gen_range(0..=MAX_SEED);
            if state.issued.insert(seed) {
                return seed;
            }
        }
    }

    /// Number of seeds issued so far
    pub fn issued_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .issued
            .len()
    }
}

impl Default for SeedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedSource")
            .field("issued", &self.issued_count())
            .finish()
    }
}
