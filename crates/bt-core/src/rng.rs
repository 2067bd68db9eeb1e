//! Deterministic RNG helpers.
//!
//! Not cryptographic. Composites that pick children at random draw from a stream derived from the
//! tick seed and the node guid, so replays with the same seed make the same choices.

pub trait DeterministicRng {
    fn next_u64(&mut self) -> u64;

    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform index in `0..len`. Returns 0 for an empty range.
    fn next_below(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        // Lemire's multiply-shift; bias is negligible for child counts.
        (((self.next_u32() as u64) * (len as u64)) >> 32) as usize
    }

    /// Fisher-Yates shuffle.
    fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_below(i + 1);
            items.swap(i, j);
        }
    }
}

/// SplitMix64: good seeding RNG and small deterministic generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }
}

impl DeterministicRng for SplitMix64 {
    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E3779B97F4A7C15);
        mix64(self.state)
    }
}

pub fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58476D1CE4E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D049BB133111EB);
    x ^ (x >> 31)
}

pub fn derive_seed(global_seed: u64, key: u64, stream: u64) -> u64 {
    mix64(global_seed ^ mix64(key.wrapping_add(0x9E3779B97F4A7C15)) ^ mix64(stream))
}
