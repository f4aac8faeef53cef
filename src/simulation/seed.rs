//! Per-task random streams.
//!
//! No generator is ever shared between tasks. Each path or tree gets its
//! own `ChaCha8Rng` derived from the run seed and the task index, so a
//! parallel run draws exactly the same numbers as a sequential one.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Salt separating risk-engine streams from anomaly-engine streams.
pub const RISK_DOMAIN: u64 = 0x7269_736b_5f76_6172;
/// Salt for isolation-tree subsampling and splits.
pub const ANOMALY_DOMAIN: u64 = 0x6973_6f5f_666f_7273;

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Child seed for task `index`: the parent seed xor a mixed index.
pub fn derive_seed(seed: u64, index: u64) -> u64 {
    seed ^ splitmix64(index)
}

/// Independent generator for task `index` under `seed`.
///
/// Streams of the same key never overlap, so tasks under one parent seed
/// stay independent.
pub fn task_rng(seed: u64, index: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(index);
    rng
}
