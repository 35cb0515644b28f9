//! Match and session layer.
//!
//! Owned by the loop coordinator; nothing here is shared across threads.

pub mod ai;
pub mod matches;
pub mod players;

pub use ai::AiManager;
pub use matches::{MatchManager, MatchOutcome, Reward};
pub use players::{Pairing, PlayersManager};
