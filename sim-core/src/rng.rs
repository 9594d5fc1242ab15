//! The single random source. Every module that needs randomness draws from
//! this one instance; nothing else is permitted to construct its own `Rng`
//! (spec §5, "No module reads from the RNG except through this single
//! source").

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug)]
pub struct SimRng(StdRng);

impl SimRng {
    pub fn from_seed(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    pub fn inner_mut(&mut self) -> &mut StdRng {
        &mut self.0
    }
}
