//! Match State
//!
//! A match pairs two players, their fields and their upgrade counters.
//! Players themselves live in the session layer and are referenced by id.

use serde::{Serialize, Deserialize};

use crate::core::clock::Millis;
use crate::core::rng::DeterministicRng;
use crate::game::field::Field;
use crate::game::player::PlayerId;
use crate::game::upgrades::UpgradesInfo;

/// Unique match identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchId(pub [u8; 16]);

impl MatchId {
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// First four bytes as hex, for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

/// Match slot. Slot numbers on the wire are 1 and 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    First,
    Second,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::First, Side::Second];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Side::First => 0,
            Side::Second => 1,
        }
    }

    /// Wire slot number.
    #[inline]
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    #[inline]
    pub fn other(self) -> Side {
        match self {
            Side::First => Side::Second,
            Side::Second => Side::First,
        }
    }
}

/// How the match was queued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMode {
    /// Two human players.
    Versus,
    /// A human against a server-spawned bot. Nothing is sent to the bot side.
    Practice,
}

/// One side of a match.
#[derive(Clone, Debug)]
pub struct MatchSide {
    pub player_id: PlayerId,
    pub field: Field,
    pub upgrades: UpgradesInfo,
}

/// Active match.
#[derive(Clone, Debug)]
pub struct GameMatch {
    pub id: MatchId,
    pub mode: MatchMode,
    pub sides: [MatchSide; 2],
    /// Seeded from the match id and participants.
    pub rng: DeterministicRng,
    pub started_at: Millis,
}

impl GameMatch {
    /// Create a match and generate both fields.
    pub fn new(
        id: MatchId,
        mode: MatchMode,
        players: [PlayerId; 2],
        field_size: usize,
        mut rng: DeterministicRng,
        now: Millis,
    ) -> Self {
        let mut make_side = |side: Side| MatchSide {
            player_id: players[side.index()],
            field: Field::generate(side.number(), field_size, field_size, &mut rng),
            upgrades: UpgradesInfo::default(),
        };
        let sides = [make_side(Side::First), make_side(Side::Second)];

        Self {
            id,
            mode,
            sides,
            rng,
            started_at: now,
        }
    }

    #[inline]
    pub fn side(&self, side: Side) -> &MatchSide {
        &self.sides[side.index()]
    }

    #[inline]
    pub fn side_mut(&mut self, side: Side) -> &mut MatchSide {
        &mut self.sides[side.index()]
    }

    pub fn field(&self, side: Side) -> &Field {
        &self.side(side).field
    }

    pub fn field_mut(&mut self, side: Side) -> &mut Field {
        &mut self.side_mut(side).field
    }

    /// Field and match RNG borrowed together.
    pub fn field_and_rng(&mut self, side: Side) -> (&mut Field, &mut DeterministicRng) {
        let GameMatch { sides, rng, .. } = self;
        (&mut sides[side.index()].field, rng)
    }

    pub fn player_id(&self, side: Side) -> PlayerId {
        self.side(side).player_id
    }

    /// Which side a player occupies.
    pub fn side_of(&self, player: PlayerId) -> Option<Side> {
        Side::BOTH.into_iter().find(|s| self.player_id(*s) == player)
    }

    /// Both players by slot order.
    pub fn player_ids(&self) -> [PlayerId; 2] {
        [self.player_id(Side::First), self.player_id(Side::Second)]
    }
}
