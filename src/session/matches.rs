//! Match Manager
//!
//! Creates and destroys [`GameMatch`] records and computes end-of-match
//! rewards.

use std::collections::BTreeMap;

use tracing::info;

use crate::config::GameRules;
use crate::core::clock::Millis;
use crate::core::rng::DeterministicRng;
use crate::game::player::{Player, PlayerId};
use crate::game::state::{GameMatch, MatchId, MatchMode, Side};

/// Currency and rating change for one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reward {
    pub currency: u64,
    pub rating_delta: i32,
}

/// How a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    pub match_id: MatchId,
    pub winner: PlayerId,
    pub loser: PlayerId,
    pub forfeit: bool,
    pub winner_reward: Reward,
    pub loser_reward: Reward,
}

impl MatchOutcome {
    /// Reward of `player`, if they took part.
    pub fn reward_for(&self, player: PlayerId) -> Option<Reward> {
        if player == self.winner {
            Some(self.winner_reward)
        } else if player == self.loser {
            Some(self.loser_reward)
        } else {
            None
        }
    }
}

/// Active matches.
#[derive(Debug)]
pub struct MatchManager {
    matches: BTreeMap<MatchId, GameMatch>,
    server_seed: u64,
}

impl MatchManager {
    pub fn new(server_seed: u64) -> Self {
        Self {
            matches: BTreeMap::new(),
            server_seed,
        }
    }

    /// Start a match. `players` are assigned slots 1 and 2 in order, reset
    /// to full resources and bound to the new match.
    pub fn create(&mut self, mode: MatchMode, players: [&mut Player; 2], rules: &GameRules, now: Millis) -> MatchId {
        let id = MatchId::random();
        let ids = [players[0].id, players[1].id];
        let rng = DeterministicRng::for_match(self.server_seed, &id.0, &[ids[0].0, ids[1].0]);
        let game = GameMatch::new(id, mode, ids, rules.field_size, rng, now);

        for player in players {
            player.reset_for_match(rules, now);
            player.current_match = Some(id);
        }

        info!(
            match_id = %id.short(),
            ?mode,
            first = %ids[0].short(),
            second = %ids[1].short(),
            "Match started"
        );
        self.matches.insert(id, game);
        id
    }

    /// Remove a match. Players must be released by the caller.
    pub fn destroy(&mut self, id: &MatchId) -> Option<GameMatch> {
        let game = self.matches.remove(id)?;
        info!(match_id = %id.short(), "Match destroyed");
        Some(game)
    }

    pub fn get(&self, id: &MatchId) -> Option<&GameMatch> {
        self.matches.get(id)
    }

    pub fn get_mut(&mut self, id: &MatchId) -> Option<&mut GameMatch> {
        self.matches.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Side whose player is out of health. Checks slot 1 first.
pub fn defeated_side(players: [&Player; 2]) -> Option<Side> {
    Side::BOTH.into_iter().find(|side| players[side.index()].is_dead())
}

/// Expected Elo score of `rating` against `opponent`.
pub fn expected_score(rating: i32, opponent: i32) -> f32 {
    1.0 / (1.0 + 10f32.powf((opponent - rating) as f32 / 400.0))
}

/// Elo rating change for a result `score` (1 win, 0 loss).
pub fn rating_delta(rating: i32, opponent: i32, score: f32, k: f32) -> i32 {
    (k * (score - expected_score(rating, opponent))).round() as i32
}

/// Apply rewards and release both players from the match.
pub fn conclude(
    match_id: MatchId,
    winner: &mut Player,
    loser: &mut Player,
    rules: &GameRules,
    forfeit: bool,
) -> MatchOutcome {
    let winner_reward = Reward {
        currency: rules.win_currency,
        rating_delta: rating_delta(winner.stats.rating, loser.stats.rating, 1.0, rules.rating_k),
    };
    let loser_reward = Reward {
        currency: rules.loss_currency,
        rating_delta: rating_delta(loser.stats.rating, winner.stats.rating, 0.0, rules.rating_k),
    };

    winner.stats.currency += winner_reward.currency;
    winner.stats.rating += winner_reward.rating_delta;
    winner.stats.wins += 1;
    loser.stats.currency += loser_reward.currency;
    loser.stats.rating += loser_reward.rating_delta;
    loser.stats.losses += 1;

    winner.current_match = None;
    loser.current_match = None;

    info!(
        match_id = %match_id.short(),
        winner = %winner.id.short(),
        loser = %loser.id.short(),
        forfeit,
        "Match ended"
    );

    MatchOutcome {
        match_id,
        winner: winner.id,
        loser: loser.id,
        forfeit,
        winner_reward,
        loser_reward,
    }
}
