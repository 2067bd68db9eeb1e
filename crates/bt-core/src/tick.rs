use serde::{Deserialize, Serialize};

use crate::{rng, NodeGuid, SplitMix64};

/// Per-step input handed to the scheduler by the embedding driver.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TickContext {
    pub tick: u64,
    pub dt_seconds: f32,
    pub seed: u64,
}

impl TickContext {
    pub fn new(tick: u64, dt_seconds: f32) -> Self {
        Self {
            tick,
            dt_seconds,
            seed: 0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// The context for the following step, keeping `dt_seconds` and `seed`.
    pub fn advance(self) -> Self {
        Self {
            tick: self.tick.wrapping_add(1),
            ..self
        }
    }

    /// Deterministic RNG stream for one node on this tick.
    pub fn rng_for_node(&self, node: NodeGuid, stream: u64) -> SplitMix64 {
        let seed = rng::derive_seed(self.seed ^ rng::mix64(self.tick), node.stable_key(), stream);
        SplitMix64::new(seed)
    }
}
