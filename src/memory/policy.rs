//! Victim selection shared by the cache and the pager

use std::fmt;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Replacement policy used both for cache blocks within a set
/// and for physical pages when the free pool is exhausted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReplacementPolicy {
    #[default]
    RoundRobin,
    Random,
}

impl FromStr for ReplacementPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RR" => Ok(ReplacementPolicy::RoundRobin),
            "RND" => Ok(ReplacementPolicy::Random),
            _ => Err(format!(
                "Invalid replacement policy: '{}'. Expected 'RR' or 'RND'.",
                s
            )),
        }
    }
}

impl fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReplacementPolicy::RoundRobin => "Round Robin",
            ReplacementPolicy::Random => "Random",
        })
    }
}

/// Picks a victim slot out of `len` candidates.
///
/// Round-Robin keeps one cursor for the whole run, advanced on every
/// selection and taken modulo the current candidate count.
/// Random draws uniformly from a seeded ChaCha stream so runs replay exactly.
#[derive(Clone, Debug)]
pub enum VictimSelector {
    RoundRobin { cursor: u64 },
    Random { rng: ChaCha8Rng },
}

impl VictimSelector {
    pub fn make(policy: ReplacementPolicy, seed: u64) -> Self {
        match policy {
            ReplacementPolicy::RoundRobin => {
                VictimSelector::RoundRobin { cursor: 0 }
            }
            ReplacementPolicy::Random => VictimSelector::Random {
                rng: ChaCha8Rng::seed_from_u64(seed),
            },
        }
    }

    /// Select a slot in `0..len`
    pub fn select(&mut self, len: usize) -> usize {
        assert!(len > 0, "no candidates to select a victim from");
        match self {
            VictimSelector::RoundRobin { cursor } => {
                let victim = (*cursor % len as u64) as usize;
                *cursor += 1;
                victim
            }
            VictimSelector::Random { rng } => rng.gen_range(0..len),
        }
    }
}
