//! Core primitives.
//!
//! Seeded randomness and wall-clock sampling shared by the game engine.

pub mod clock;
pub mod rng;

pub use clock::{now_millis, Millis};
pub use rng::DeterministicRng;
