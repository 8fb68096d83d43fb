use super::types::{Round, MAX_NUMBER, MIN_NUMBER};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

/// Source of the winning number
pub trait DrawSource: Send + Sync {
    /// Draw a number in `MIN_NUMBER..=MAX_NUMBER` for `round`
    fn draw(&self, round: &Round) -> u8;
}

/// Uniform draw over 1..=9
#[derive(Debug, Default)]
pub struct RandomDraw {
    seeded: Option<Mutex<StdRng>>,
}

impl RandomDraw {
    /// Thread-local RNG, reseeded from the OS
    pub fn new() -> Self {
        Self { seeded: None }
    }

    /// Reproducible sequence of draws
    pub fn seeded(seed: u64) -> Self {
        Self {
            seeded: Some(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }
}

impl DrawSource for RandomDraw {
    fn draw(&self, _round: &Round) -> u8 {
        match &self.seeded {
            Some(rng) => rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .gen_range(MIN_NUMBER..=MAX_NUMBER),
            None => rand::thread_rng().gen_range(MIN_NUMBER..=MAX_NUMBER),
        }
    }
}

/// Always draws the same number
#[derive(Debug, Clone, Copy)]
pub struct FixedDraw(pub u8);

impl DrawSource for FixedDraw {
    fn draw(&self, _round: &Round) -> u8 {
        self.0
    }
}
