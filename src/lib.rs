//! # Block Duel Server
//!
//! Authoritative server for a two-player match-3 duel.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    BLOCK DUEL SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │  └── clock.rs    - Wall-clock milliseconds                   │
//! │                                                              │
//! │  game/           - Field/combo engine and effect pipeline    │
//! │  ├── field.rs    - Grid, swap, destroy, refill, sampling     │
//! │  ├── combo.rs    - Run detection with wildcard rules         │
//! │  ├── registry.rs - Type-keyed combo behaviours               │
//! │  ├── unique.rs   - Reward blocks and their hooks             │
//! │  └── turn.rs     - Per-request turn pipeline                 │
//! │                                                              │
//! │  network/        - Transport (async, never touches state)    │
//! │  ├── packet.rs   - Length-prefixed frame reassembly          │
//! │  ├── protocol.rs - Message tags and bodies                   │
//! │  └── server.rs   - Slot pool and connection tasks            │
//! │                                                              │
//! │  session/        - Players, matchmaking, matches, bots       │
//! │  store.rs        - Player persistence                        │
//! │  coordinator.rs  - Fixed-tick authoritative loop             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Threading
//!
//! Socket tasks decode frames and push [`network::Action`]s onto a queue.
//! One loop thread drains that queue every tick and is the only code that
//! mutates players, matches or fields, so game state needs no locks.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod coordinator;
pub mod core;
pub mod error;
pub mod game;
pub mod network;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use config::{GameRules, ServerConfig};
pub use coordinator::GameLoop;
pub use core::rng::DeterministicRng;
pub use error::{ErrorCode, GameError};
pub use game::{Field, GameMatch, Player, PlayerId};
pub use network::GameServer;
pub use store::{InMemoryStore, JsonFileStore, PlayerStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Authoritative loop tick rate (Hz)
pub const TICK_RATE: u32 = 30;

/// Field width and height
pub const FIELD_SIZE: usize = 6;
