//! The structures making up the branch prediction unit.

pub mod btb;
pub mod direction;
pub mod ras;

pub use btb::*;
pub use direction::*;
pub use ras::*;
