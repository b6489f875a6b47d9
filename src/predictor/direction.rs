//! A synthetic-noise direction predictor.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::branch::Outcome;

/// Largest multiple of 100 representable in a u32. Raw draws at or above
/// this would skew `draw % 100` toward the low residues.
const DRAW_LIMIT: u32 = u32::MAX - (u32::MAX % 100);

/// Predicts branch direction by perturbing the actual outcome with a
/// configured misprediction rate.
///
/// This is not a real predictor: instead of consulting history it flips
/// the known outcome with probability `rate / 100`, which makes the
/// direction accuracy of the rest of the machinery a controlled input.
pub struct DirectionPredictor {
    rate: u8,
    rng: StdRng,
}
impl DirectionPredictor {
    pub fn new(rate: u8) -> Self {
        Self {
            rate,
            rng: StdRng::from_entropy(),
        }
    }

    /// Build a predictor with a deterministic noise sequence.
    pub fn with_seed(rate: u8, seed: u64) -> Self {
        Self {
            rate,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn rate(&self) -> u8 {
        self.rate
    }

    /// Predict the direction of the instruction whose actual outcome is
    /// `taken`.
    ///
    /// Non-control-flow instructions are never mispredicted. This cannot
    /// be done in real hardware, but mispredicting them here would turn
    /// ordinary instructions into phantom branches: predicted taken, with
    /// a target conjured out of the BTB.
    pub fn predict(&mut self, is_control_flow: bool, taken: Outcome) -> Outcome {
        if !is_control_flow {
            return taken;
        }
        if self.draw() < u32::from(self.rate) {
            !taken
        } else {
            taken
        }
    }

    /// Uniform draw in `[0, 100)`, rejection-sampling away modulo bias.
    fn draw(&mut self) -> u32 {
        loop {
            let r = self.rng.next_u32();
            if r < DRAW_LIMIT {
                return r % 100;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn non_control_flow_is_never_mispredicted() {
        let mut p = DirectionPredictor::with_seed(100, 0);
        for _ in 0..1000 {
            assert_eq!(p.predict(false, Outcome::T), Outcome::T);
            assert_eq!(p.predict(false, Outcome::N), Outcome::N);
        }
    }

    #[test]
    fn rate_zero_is_exact() {
        let mut p = DirectionPredictor::with_seed(0, 1);
        for _ in 0..1000 {
            assert_eq!(p.predict(true, Outcome::T), Outcome::T);
            assert_eq!(p.predict(true, Outcome::N), Outcome::N);
        }
    }

    #[test]
    fn rate_hundred_always_flips() {
        let mut p = DirectionPredictor::with_seed(100, 2);
        for _ in 0..1000 {
            assert_eq!(p.predict(true, Outcome::T), Outcome::N);
            assert_eq!(p.predict(true, Outcome::N), Outcome::T);
        }
    }

    #[test]
    fn empirical_rate_tracks_configured_rate() {
        let mut p = DirectionPredictor::with_seed(25, 3);
        let n = 100_000;
        let flips = (0..n)
            .filter(|_| p.predict(true, Outcome::T) == Outcome::N)
            .count();
        let observed = flips as f64 / n as f64;
        assert!(
            (observed - 0.25).abs() < 0.01,
            "observed flip rate {observed}"
        );
    }
}
