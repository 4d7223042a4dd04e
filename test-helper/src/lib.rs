// Copyright (c) 2018-2021 The MobileCoin Foundation

//! Seeded randomness for the unit tests of the workspace.

pub use rand_core::{CryptoRng, RngCore, SeedableRng};
use rand_hc::Hc128Rng;
type Seed = <RngType as SeedableRng>::Seed;

const NUM_TRIALS: usize = 3;

// Sometimes you need to have the type in scope to call trait functions
pub type RngType = Hc128Rng;

// Helper for running a unit test that requires randomness, but doing it
// seeded and deterministically
pub fn run_with_several_seeds<F: FnMut(RngType)>(mut f: F) {
    for seed in &get_seeds() {
        f(RngType::from_seed(*seed));
    }
}

pub fn run_with_one_seed<F: FnOnce(RngType)>(f: F) {
    f(get_seeded_rng());
}

fn get_seeds() -> [Seed; NUM_TRIALS] {
    let mut rng = get_seeded_rng();

    let mut result = [[0u8; 32]; NUM_TRIALS];
    for bytes in &mut result[..] {
        rng.fill_bytes(bytes)
    }
    result
}

pub fn get_seeded_rng() -> RngType {
    RngType::from_seed([7u8; 32])
}

/// A uniformly random integer below `2^bits`, for `bits` up to 64
pub fn random_bits<R: RngCore>(rng: &mut R, bits: u32) -> u64 {
    match bits {
        0 => 0,
        64..=u32::MAX => rng.next_u64(),
        _ => rng.next_u64() & ((1u64 << bits) - 1),
    }
}

/// `count` random chunks, each below `2^chunk_bits`
pub fn random_chunks<R: RngCore>(rng: &mut R, chunk_bits: u32, count: usize) -> Vec<u64> {
    (0..count).map(|_| random_bits(rng, chunk_bits)).collect()
}
