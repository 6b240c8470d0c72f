//! Deterministic seeding helpers.
//!
//! Seeds are derived from the world seed and a stable hash of an entity id, so
//! generation for one civilization never depends on join order.

use rand::rngs::StdRng;
use rand::SeedableRng;

pub fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58476D1CE4E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D049BB133111EB);
    x ^ (x >> 31)
}

/// FNV-1a over the bytes of `s`. Stable across runs and platforms.
pub fn stable_hash(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in s.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

pub fn derive_seed(world_seed: u64, entity: u64, stream: u64) -> u64 {
    let x = world_seed ^ mix64(entity.wrapping_add(0x9E3779B97F4A7C15)) ^ mix64(stream);
    mix64(x)
}

/// A seeded generator for one entity and purpose.
pub fn seeded(world_seed: u64, entity: &str, stream: u64) -> StdRng {
    StdRng::seed_from_u64(derive_seed(world_seed, stable_hash(entity), stream))
}
