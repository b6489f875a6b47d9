//! A trace-driven branch-prediction simulator.
//!
//! The [`Bpu`] couples a set-associative branch target buffer, a bounded
//! circular return-address stack, and a direction predictor with
//! configurable synthetic noise. It consumes one [`InstRecord`] per
//! executed instruction, predicts direction and target before the
//! outcome is consulted, scores the prediction, and trains itself with
//! commit-time information only.

pub mod branch;
pub mod config;
pub mod predictor;
pub mod sim;
pub mod stats;
pub mod trace;

pub use branch::*;
pub use config::*;
pub use predictor::*;
pub use sim::*;
pub use trace::*;
