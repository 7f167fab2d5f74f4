#![allow(dead_code)]

use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A scratch directory kept alive for the duration of the test.
pub struct Scratch {
    _dir: tempfile::TempDir,
    pub path: PathBuf,
}

pub fn scratch_dir() -> Scratch {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().to_path_buf();
    Scratch { _dir: dir, path }
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Generate a structured description corpus: constant run name, numeric
/// id with zero padding, a stepping coordinate, and a short random tag.
pub fn description_corpus(count: usize, seed: u64) -> Vec<String> {
    let mut rng = seeded_rng(seed);
    let tags = ["alpha", "beta", "gamma", "delta"];
    (0..count)
        .map(|i| {
            let tag = tags[rng.gen_range(0..tags.len())];
            format!(
                "SRR00{:04} pos={} tag:{tag}",
                i + 1,
                1_000 + 7 * i as u64,
            )
        })
        .collect()
}

/// Generate `count` reads of length `read_len` over ACGTN with a burst of
/// plausible quality characters.
pub fn read_corpus(count: usize, read_len: usize, seed: u64) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut rng = seeded_rng(seed);
    let bases = b"ACGTN";
    (0..count)
        .map(|_| {
            let seq: Vec<u8> = (0..read_len)
                .map(|_| {
                    // wildcards are rare, as in real data
                    if rng.gen_range(0..50) == 0 {
                        b'N'
                    }
                    else {
                        bases[rng.gen_range(0..4)]
                    }
                })
                .collect();
            let qual: Vec<u8> = (0..read_len).map(|_| rng.gen_range(b'!'..=b'J')).collect();
            (seq, qual)
        })
        .collect()
}
