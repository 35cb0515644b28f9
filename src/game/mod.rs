//! Game Logic Module
//!
//! Field/combo engine and effect pipeline. No I/O; time comes in as an
//! argument and randomness from the match RNG.
//!
//! ## Module Structure
//!
//! - `block`: Block types, lifecycle and per-block effects
//! - `field`: Grid, swaps, destruction, refill, tap locks
//! - `combo`: Run detection with wildcard rules
//! - `effects`: Field-scoped global effects
//! - `events`: Effect event records
//! - `player`: Player entities and persistent stats
//! - `upgrades`: Per-match upgrade counters
//! - `unique`: Unique reward blocks and their hooks
//! - `skills`: Energy skills
//! - `registry`: Effect context and combo behaviour table
//! - `state`: Match state
//! - `turn`: Turn pipeline

pub mod block;
pub mod field;
pub mod combo;
pub mod effects;
pub mod events;
pub mod player;
pub mod upgrades;
pub mod unique;
pub mod skills;
pub mod registry;
pub mod state;
pub mod turn;

// Re-export key types
pub use block::{Block, BlockType, Cell};
pub use combo::Combo;
pub use events::EffectEvent;
pub use field::{Direction, Field};
pub use player::{Player, PlayerId, PlayerStats};
pub use registry::{EffectContext, EffectRegistry};
pub use state::{GameMatch, MatchId, MatchMode, Side};
pub use turn::TurnAction;
