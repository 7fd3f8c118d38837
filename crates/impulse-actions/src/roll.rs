//! Injectable probability source for action resolution.
//!
//! The resolver never touches a global RNG. It draws from a [`RollSource`],
//! which production code backs with a seeded [`StdRng`] and tests back with
//! fixed or scripted values.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Upper bound (exclusive) of every roll.
pub const ROLL_MAX: f64 = 100.0;

/// A source of uniform rolls in `[0, 100)`.
pub trait RollSource: Send {
    /// Draw the next roll.
    fn roll(&mut self) -> f64;
}

/// Uniform rolls from a seedable PRNG.
#[derive(Debug, Clone)]
pub struct SeededRoll {
    rng: StdRng,
}

impl SeededRoll {
    /// Reproducible sequence for a given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Sequence seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl RollSource for SeededRoll {
    fn roll(&mut self) -> f64 {
        self.rng.random_range(0.0..ROLL_MAX)
    }
}

/// Always returns the same roll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedRoll(pub f64);

impl RollSource for FixedRoll {
    fn roll(&mut self) -> f64 {
        self.0
    }
}

/// Replays a scripted list of rolls, then repeats the last one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptedRoll {
    queue: VecDeque<f64>,
    last: f64,
}

impl ScriptedRoll {
    /// Rolls returned in order.
    pub fn new(rolls: impl IntoIterator<Item = f64>) -> Self {
        Self {
            queue: rolls.into_iter().collect(),
            last: 0.0,
        }
    }
}

impl RollSource for ScriptedRoll {
    fn roll(&mut self) -> f64 {
        if let Some(next) = self.queue.pop_front() {
            self.last = next;
        }
        self.last
    }
}
