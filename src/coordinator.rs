//! Loop Coordinator
//!
//! The single authoritative thread. It owns every player, match and field;
//! socket tasks only reach it through the [`Action`] queue.
//!
//! Each tick:
//!
//! 1. drain the action queue (connects, requests, disconnects)
//! 2. run one matchmaking pass
//! 3. run one bot pass
//!
//! A turn request is validated and executed through [`turn::execute`], then
//! a snapshot plus the turn's events goes to the actor and to the opponent
//! (roles swapped). Bots never receive anything.

use std::collections::BTreeMap;
use std::thread;
use std::time::Instant;

use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::core::clock::{now_millis, Millis};
use crate::error::GameError;
use crate::game::block::Cell;
use crate::game::events::EffectEvent;
use crate::game::field::Direction;
use crate::game::player::{Player, PlayerId, PlayerRecord, PlayerStats};
use crate::game::registry::{EffectContext, EffectRegistry};
use crate::game::state::{MatchId, MatchMode, Side};
use crate::game::turn::{self, TurnAction};
use crate::game::unique::UniqueKind;
use crate::network::protocol::{
    ClientRequest, ConnectResponse, GameEndResponse, GameStateResponse, GameStateSnapshot, LogInRequest,
    LogInResponse, PlayerStatsResponse, ServerResponse, StartGameResponse,
};
use crate::network::server::{Action, Outbound, SlotId};
use crate::session::matches::{conclude, defeated_side};
use crate::session::{AiManager, MatchManager, Pairing, PlayersManager};
use crate::store::{PlayerStore, StoreError};

/// Seconds between two status lines.
const STATUS_INTERVAL_SECS: u64 = 60;

/// Authoritative game loop.
pub struct GameLoop {
    config: ServerConfig,
    actions: mpsc::UnboundedReceiver<Action>,
    connections: BTreeMap<SlotId, Outbound>,
    players: PlayersManager,
    matches: MatchManager,
    ai: AiManager,
    registry: EffectRegistry,
    store: Box<dyn PlayerStore>,
    tick: u64,
}

impl GameLoop {
    pub fn new(config: ServerConfig, store: Box<dyn PlayerStore>, actions: mpsc::UnboundedReceiver<Action>) -> Self {
        let server_seed = uuid::Uuid::new_v4().as_u128() as u64;
        let ai = AiManager::new(config.bot_cooldown);
        Self {
            config,
            actions,
            connections: BTreeMap::new(),
            players: PlayersManager::new(),
            matches: MatchManager::new(server_seed),
            ai,
            registry: EffectRegistry::with_defaults(),
            store,
            tick: 0,
        }
    }

    /// Run at the configured tick rate until the action queue closes.
    ///
    /// Ahead of schedule the thread sleeps out the tick. When a tick
    /// overruns by more than a whole budget, the missed ticks are dropped.
    pub fn run(mut self) {
        let budget = self.config.tick_duration();
        info!(tick_rate = self.config.tick_rate, "Game loop started");

        let mut next_tick = Instant::now() + budget;
        while self.run_tick(now_millis()) {
            let now = Instant::now();
            if now < next_tick {
                thread::sleep(next_tick - now);
                next_tick += budget;
                continue;
            }

            let behind = now - next_tick;
            if behind > budget {
                let missed = (behind.as_micros() / budget.as_micros().max(1)) as u64;
                warn!(tick = self.tick, missed, "Tick overrun, dropping missed ticks");
                next_tick = now + budget;
            } else {
                next_tick += budget;
            }
        }

        info!(ticks = self.tick, "Game loop stopped");
    }

    /// One tick. Returns `false` once every action sender is gone.
    pub fn run_tick(&mut self, now: Millis) -> bool {
        let open = self.drain_actions(now);
        self.matchmaking(now);
        self.drive_bots(now);

        self.tick += 1;
        if self.tick % (u64::from(self.config.tick_rate.max(1)) * STATUS_INTERVAL_SECS) == 0 {
            info!(
                tick = self.tick,
                connections = self.connections.len(),
                sessions = self.players.session_count(),
                matches = self.matches.len(),
                bots = self.ai.bot_count(),
                "Loop status"
            );
        }
        open
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    fn drain_actions(&mut self, now: Millis) -> bool {
        loop {
            match self.actions.try_recv() {
                Ok(action) => self.handle_action(action, now),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn handle_action(&mut self, action: Action, now: Millis) {
        match action {
            Action::Connected { slot, outbound } => {
                self.connections.insert(slot, outbound);
                let response = ServerResponse::Connect(ConnectResponse {
                    slot,
                    server_version: self.config.version.clone(),
                });
                self.send(slot, &response);
            }
            Action::Request { slot, request } => self.handle_request(slot, request, now),
            Action::Disconnected { slot } => self.disconnect(slot),
        }
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Queue a response on a connection. Failures are logged, never retried.
    fn send(&self, slot: SlotId, response: &ServerResponse) {
        let Some(outbound) = self.connections.get(&slot) else {
            return;
        };
        match response.encode() {
            Ok(bytes) => {
                if outbound.send(bytes).is_err() {
                    warn!(slot, kind = ?response.message_type(), "Write dropped, connection closed");
                }
            }
            Err(err) => warn!(slot, error = %err, "Failed to encode response"),
        }
    }

    /// Players without a session (bots, leavers) are skipped.
    fn send_to_player(&self, player: &PlayerId, response: &ServerResponse) {
        if let Some(slot) = self.players.slot_of(player) {
            self.send(slot, response);
        }
    }

    /// Snapshot plus events to every human participant, actor first.
    fn broadcast_state(&self, match_id: &MatchId, actor: Side, events: &[EffectEvent], now: Millis) {
        let Some(game) = self.matches.get(match_id) else {
            return;
        };
        let ids = game.player_ids();
        let (Some(first), Some(second)) = (self.players.get(&ids[0]), self.players.get(&ids[1])) else {
            return;
        };

        for side in [actor, actor.other()] {
            let response = ServerResponse::GameState(Box::new(GameStateResponse {
                state: GameStateSnapshot::build(game, [first, second], side, now),
                events: events.to_vec(),
            }));
            self.send_to_player(&ids[side.index()], &response);
        }
    }

    // =========================================================================
    // REQUESTS
    // =========================================================================

    fn handle_request(&mut self, slot: SlotId, request: ClientRequest, now: Millis) {
        let kind = request.message_type();
        let result = match request {
            ClientRequest::LogIn(req) => self.log_in(slot, req).map(Some),
            ClientRequest::Queue(req) => self.queue(slot, req.mode).map(|_| None),
            ClientRequest::Swap(req) => {
                let action = TurnAction::Swap {
                    cell: Cell::new(req.x as usize, req.y as usize),
                    dir: req.direction,
                };
                self.turn_request(slot, action, now).map(|_| None)
            }
            ClientRequest::Tap(req) => {
                let action = TurnAction::Tap {
                    cell: Cell::new(req.x as usize, req.y as usize),
                };
                self.turn_request(slot, action, now).map(|_| None)
            }
            ClientRequest::Upgrade(req) => self.turn_request(slot, TurnAction::Upgrade(req.block_type), now).map(|_| None),
            ClientRequest::UseSkill(req) => self.turn_request(slot, TurnAction::Skill(req.skill), now).map(|_| None),
            ClientRequest::GetStats(_) => self.stats(slot).map(Some),
            ClientRequest::SetStats(req) => self.set_stats(slot, req.stats).map(Some),
        };

        match result {
            Ok(Some(response)) => self.send(slot, &response),
            Ok(None) => {}
            Err(err) => {
                debug!(slot, ?kind, error = %err, "Request rejected");
                self.send(slot, &ServerResponse::error(&err));
            }
        }
    }

    fn session(&self, slot: SlotId) -> Result<PlayerId, GameError> {
        self.players.player_of(slot).ok_or(GameError::NotLoggedIn)
    }

    fn log_in(&mut self, slot: SlotId, request: LogInRequest) -> Result<ServerResponse, GameError> {
        if self.players.player_of(slot).is_some() {
            return Err(GameError::AlreadyLoggedIn);
        }

        let requested = request.player_id.as_deref().and_then(PlayerId::from_uuid_str);
        let record = match requested.and_then(|id| self.store.get_player(&id)) {
            Some(record) => record,
            None => self.register(requested.unwrap_or_else(PlayerId::random), request.name)?,
        };
        if self.players.is_online(&record.id) {
            return Err(GameError::AlreadyLoggedIn);
        }

        let uniques = self.store.get_collection(&record.id);
        let player = Player::from_record(&record, uniques, &self.config.rules);
        self.players.log_in(slot, player)?;

        Ok(ServerResponse::LogIn(LogInResponse {
            player_id: record.id.to_uuid_string(),
            name: record.name,
            stats: record.stats,
        }))
    }

    /// Add a new player with the starter collection.
    fn register(&mut self, id: PlayerId, name: String) -> Result<PlayerRecord, GameError> {
        let name = if name.trim().is_empty() {
            format!("player-{}", id.short())
        } else {
            name
        };
        let record = PlayerRecord::new(id, name, self.config.rules.start_rating);
        self.store.add_player(record.clone())?;
        for kind in UniqueKind::starter_collection() {
            self.store.add_to_collection(&id, kind)?;
        }
        info!(player = %id.short(), name = %record.name, "Registered new player");
        Ok(record)
    }

    fn queue(&mut self, slot: SlotId, mode: MatchMode) -> Result<(), GameError> {
        let player = self.session(slot)?;
        self.players.enqueue(player, mode)
    }

    fn stats(&self, slot: SlotId) -> Result<ServerResponse, GameError> {
        let id = self.session(slot)?;
        let player = self.players.get(&id).ok_or(GameError::UnknownPlayer)?;
        Ok(ServerResponse::Stats(PlayerStatsResponse {
            player_id: id.to_uuid_string(),
            name: player.name.clone(),
            stats: player.stats,
        }))
    }

    fn set_stats(&mut self, slot: SlotId, stats: PlayerStats) -> Result<ServerResponse, GameError> {
        let id = self.session(slot)?;
        let player = self.players.get_mut(&id).ok_or(GameError::UnknownPlayer)?;
        player.stats = stats;
        self.persist(&id)?;
        self.stats(slot)
    }

    fn turn_request(&mut self, slot: SlotId, action: TurnAction, now: Millis) -> Result<(), GameError> {
        let player = self.session(slot)?;
        self.play_turn(player, action, now)
    }

    /// Shared by human requests and bots.
    fn play_turn(&mut self, player: PlayerId, action: TurnAction, now: Millis) -> Result<(), GameError> {
        let match_id = self
            .players
            .get(&player)
            .and_then(|p| p.current_match)
            .ok_or(GameError::NotInMatch)?;
        let game = self.matches.get_mut(&match_id).ok_or(GameError::NotInMatch)?;
        let actor = game.side_of(player).ok_or(GameError::NotInMatch)?;
        let participants = self.players.pair_mut(game.player_ids()).ok_or(GameError::UnknownPlayer)?;

        let mut ctx = EffectContext::new(game, participants, &self.config.rules, actor, now);
        let result = turn::execute(&mut ctx, &self.registry, action);
        let events = ctx.into_events();
        if let Err(err) = result {
            // A rejected turn leaves only the refresh phase behind
            if !events.is_empty() {
                self.broadcast_state(&match_id, actor, &events, now);
            }
            return Err(err);
        }
        debug!(
            match_id = %match_id.short(),
            player = %player.short(),
            ?action,
            events = events.len(),
            "Turn executed"
        );

        self.broadcast_state(&match_id, actor, &events, now);
        if let Some(game) = self.matches.get_mut(&match_id) {
            turn::normalize(game, now);
        }

        self.check_match_end(&match_id);
        Ok(())
    }

    // =========================================================================
    // MATCH LIFECYCLE
    // =========================================================================

    fn matchmaking(&mut self, now: Millis) {
        for pairing in self.players.take_pairings() {
            match pairing {
                Pairing::Versus(ids) => {
                    self.start_match(MatchMode::Versus, ids, now);
                }
                Pairing::Practice(human) => {
                    let bot = self.players.insert_bot(Player::bot(&self.config.rules));
                    if self.start_match(MatchMode::Practice, [human, bot], now) {
                        self.ai.register(bot, now);
                    } else {
                        self.players.remove(&bot);
                    }
                }
            }
        }
    }

    fn start_match(&mut self, mode: MatchMode, ids: [PlayerId; 2], now: Millis) -> bool {
        let Some(participants) = self.players.pair_mut(ids) else {
            warn!(?mode, "Paired player vanished before match start");
            return false;
        };
        let match_id = self.matches.create(mode, participants, &self.config.rules, now);

        let Some(game) = self.matches.get(&match_id) else {
            return false;
        };
        let (Some(first), Some(second)) = (self.players.get(&ids[0]), self.players.get(&ids[1])) else {
            return false;
        };
        for side in Side::BOTH {
            let response = ServerResponse::StartGame(Box::new(StartGameResponse {
                match_id: match_id.to_uuid_string(),
                mode,
                state: GameStateSnapshot::build(game, [first, second], side, now),
            }));
            self.send_to_player(&ids[side.index()], &response);
        }
        true
    }

    fn check_match_end(&mut self, match_id: &MatchId) {
        let Some(game) = self.matches.get(match_id) else {
            return;
        };
        let ids = game.player_ids();
        let (Some(first), Some(second)) = (self.players.get(&ids[0]), self.players.get(&ids[1])) else {
            return;
        };
        let loser = defeated_side([first, second]);

        if let Some(loser) = loser {
            self.end_match(match_id, loser, false);
        }
    }

    /// Tear a match down, pay rewards, persist humans and notify them.
    fn end_match(&mut self, match_id: &MatchId, loser: Side, forfeit: bool) {
        let Some(game) = self.matches.destroy(match_id) else {
            return;
        };
        let winner_id = game.player_id(loser.other());
        let loser_id = game.player_id(loser);

        let Some([winner, defeated]) = self.players.pair_mut([winner_id, loser_id]) else {
            warn!(match_id = %match_id.short(), "Match ended with a missing participant");
            return;
        };
        let outcome = conclude(*match_id, winner, defeated, &self.config.rules, forfeit);
        let winner_name = winner.name.clone();

        for id in [winner_id, loser_id] {
            if let Err(err) = self.persist(&id) {
                warn!(player = %id.short(), error = %err, "Failed to persist match result");
            }

            let (Some(player), Some(reward)) = (self.players.get(&id), outcome.reward_for(id)) else {
                continue;
            };
            let response = ServerResponse::GameEnd(GameEndResponse {
                match_id: match_id.to_uuid_string(),
                winner_id: winner_id.to_uuid_string(),
                winner_name: winner_name.clone(),
                you_won: id == winner_id,
                forfeit,
                currency_gained: reward.currency,
                rating_delta: reward.rating_delta,
                stats: player.stats,
            });
            self.send_to_player(&id, &response);
        }

        for id in [winner_id, loser_id] {
            if self.ai.unregister(&id) {
                self.players.remove(&id);
            }
        }
    }

    /// Write a human's record back to the store. Bots are skipped.
    fn persist(&mut self, id: &PlayerId) -> Result<(), StoreError> {
        let Some(player) = self.players.get(id) else {
            return Ok(());
        };
        if player.is_bot {
            return Ok(());
        }
        match self.store.get_player(id) {
            Some(mut record) => {
                record.name = player.name.clone();
                record.stats = player.stats;
                record.last_seen = chrono::Utc::now();
                self.store.update_player(record)
            }
            None => self.store.add_player(player.record(chrono::Utc::now())),
        }
    }

    /// Release a slot. A player still in a match forfeits it.
    fn disconnect(&mut self, slot: SlotId) {
        self.connections.remove(&slot);
        let Some(id) = self.players.log_out(slot) else {
            debug!(slot, "Anonymous connection closed");
            return;
        };

        let running = self
            .players
            .get(&id)
            .and_then(|p| p.current_match)
            .and_then(|match_id| Some((match_id, self.matches.get(&match_id)?.side_of(id)?)));
        match running {
            Some((match_id, side)) => self.end_match(&match_id, side, true),
            None => {
                if let Err(err) = self.persist(&id) {
                    warn!(player = %id.short(), error = %err, "Failed to persist player on logout");
                }
            }
        }
        self.players.remove(&id);
    }

    // =========================================================================
    // BOTS
    // =========================================================================

    fn drive_bots(&mut self, now: Millis) {
        for bot in self.ai.due(now) {
            let Some((cell, dir)) = self.bot_move(&bot, now) else {
                continue;
            };
            if let Err(err) = self.play_turn(bot, TurnAction::Swap { cell, dir }, now) {
                debug!(bot = %bot.short(), error = %err, "Bot move rejected");
            }
        }
    }

    fn bot_move(&self, bot: &PlayerId, now: Millis) -> Option<(Cell, Direction)> {
        let match_id = self.players.get(bot)?.current_match?;
        let game = self.matches.get(&match_id)?;
        let side = game.side_of(*bot)?;
        AiManager::find_swap(game.field(side), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use bytes::Bytes;

    use crate::error::ErrorCode;
    use crate::game::block::BlockState;
    use crate::game::block::BlockType::*;
    use crate::game::field::tests::calm_rows;
    use crate::game::field::Field;
    use crate::network::packet::FrameDecoder;
    use crate::network::protocol::{BlockSwapRequest, GetPlayerStatsRequest, PutPlayerIntoQueueRequest, SetPlayerStatsRequest};
    use crate::store::InMemoryStore;

    struct Harness {
        game_loop: GameLoop,
        actions: mpsc::UnboundedSender<Action>,
    }

    impl Harness {
        fn new() -> Self {
            let config = ServerConfig {
                bot_cooldown: Duration::from_millis(500),
                ..ServerConfig::default()
            };
            let (actions, rx) = mpsc::unbounded_channel();
            Self {
                game_loop: GameLoop::new(config, Box::new(InMemoryStore::new()), rx),
                actions,
            }
        }

        fn connect(&self, slot: SlotId) -> mpsc::UnboundedReceiver<Bytes> {
            let (outbound, rx) = mpsc::unbounded_channel();
            self.actions.send(Action::Connected { slot, outbound }).unwrap();
            rx
        }

        fn request(&self, slot: SlotId, request: ClientRequest) {
            self.actions.send(Action::Request { slot, request }).unwrap();
        }

        fn log_in(&self, slot: SlotId, name: &str) {
            self.request(
                slot,
                ClientRequest::LogIn(LogInRequest {
                    player_id: None,
                    name: name.to_string(),
                }),
            );
        }

        fn queue(&self, slot: SlotId, mode: MatchMode) {
            self.request(slot, ClientRequest::Queue(PutPlayerIntoQueueRequest { mode }));
        }

        fn player(&self, slot: SlotId) -> PlayerId {
            self.game_loop.players.player_of(slot).unwrap()
        }

        /// Two logged-in humans in a versus match; slot 0 is side one.
        fn versus(&mut self) -> (mpsc::UnboundedReceiver<Bytes>, mpsc::UnboundedReceiver<Bytes>) {
            let rx0 = self.connect(0);
            let rx1 = self.connect(1);
            self.log_in(0, "ada");
            self.log_in(1, "bob");
            self.queue(0, MatchMode::Versus);
            self.queue(1, MatchMode::Versus);
            self.game_loop.run_tick(1_000);
            (rx0, rx1)
        }
    }

    fn responses(rx: &mut mpsc::UnboundedReceiver<Bytes>) -> Vec<ServerResponse> {
        let mut decoder = FrameDecoder::default();
        while let Ok(bytes) = rx.try_recv() {
            decoder.extend(&bytes);
        }
        let (frames, error) = decoder.drain_frames();
        assert!(error.is_none());
        frames
            .iter()
            .map(|frame| ServerResponse::decode(frame).unwrap().unwrap())
            .collect()
    }

    fn game_end(responses: &[ServerResponse]) -> Option<&GameEndResponse> {
        responses.iter().find_map(|r| match r {
            ServerResponse::GameEnd(end) => Some(end),
            _ => None,
        })
    }

    fn error_code(responses: &[ServerResponse]) -> Option<ErrorCode> {
        responses.iter().find_map(|r| match r {
            ServerResponse::Error(err) => Some(err.code),
            _ => None,
        })
    }

    #[test]
    fn test_connect_and_log_in() {
        let mut h = Harness::new();
        let mut rx = h.connect(4);
        h.log_in(4, "ada");
        assert!(h.game_loop.run_tick(0));

        let out = responses(&mut rx);
        assert!(matches!(&out[0], ServerResponse::Connect(c) if c.slot == 4));
        let ServerResponse::LogIn(login) = &out[1] else {
            panic!("expected login response, got {:?}", out[1]);
        };
        assert_eq!(login.name, "ada");

        let id = PlayerId::from_uuid_str(&login.player_id).unwrap();
        assert_eq!(h.player(4), id);
        assert_eq!(h.game_loop.store.get_collection(&id), UniqueKind::starter_collection());
    }

    #[test]
    fn test_returning_player_keeps_stats() {
        let mut h = Harness::new();
        let mut rx = h.connect(0);
        h.log_in(0, "ada");
        h.request(0, ClientRequest::SetStats(SetPlayerStatsRequest { stats: PlayerStats { currency: 7, rating: 1100, wins: 2, losses: 1 } }));
        h.game_loop.run_tick(0);
        let id = h.player(0);
        h.actions.send(Action::Disconnected { slot: 0 }).unwrap();
        h.game_loop.run_tick(10);
        responses(&mut rx);

        let mut rx = h.connect(2);
        h.request(
            2,
            ClientRequest::LogIn(LogInRequest {
                player_id: Some(id.to_uuid_string()),
                name: String::new(),
            }),
        );
        h.request(2, ClientRequest::GetStats(GetPlayerStatsRequest));
        h.game_loop.run_tick(20);

        let out = responses(&mut rx);
        let stats = out.iter().find_map(|r| match r {
            ServerResponse::Stats(s) => Some(s.stats),
            _ => None,
        });
        assert_eq!(stats.map(|s| s.currency), Some(7));
        assert_eq!(h.player(2), id);
    }

    #[test]
    fn test_requests_need_a_session() {
        let mut h = Harness::new();
        let mut rx = h.connect(0);
        h.request(0, ClientRequest::Swap(BlockSwapRequest { x: 0, y: 0, direction: Direction::Right }));
        h.queue(0, MatchMode::Versus);
        h.game_loop.run_tick(0);

        let out = responses(&mut rx);
        let codes: Vec<ErrorCode> = out
            .iter()
            .filter_map(|r| match r {
                ServerResponse::Error(err) => Some(err.code),
                _ => None,
            })
            .collect();
        assert_eq!(codes, vec![ErrorCode::NotLoggedIn, ErrorCode::NotLoggedIn]);
    }

    #[test]
    fn test_versus_match_starts_for_both() {
        let mut h = Harness::new();
        let (mut rx0, mut rx1) = h.versus();

        for (rx, slot) in [(&mut rx0, 1u8), (&mut rx1, 2u8)] {
            let out = responses(rx);
            let start = out.iter().find_map(|r| match r {
                ServerResponse::StartGame(start) => Some(start),
                _ => None,
            });
            let start = start.expect("start game sent");
            assert_eq!(start.mode, MatchMode::Versus);
            assert_eq!(start.state.your_slot, slot);
            assert_eq!(start.state.you.health, h.game_loop.config.rules.max_health);
        }
        assert_eq!(h.game_loop.matches.len(), 1);
    }

    #[test]
    fn test_invalid_swap_only_answers_the_actor() {
        let mut h = Harness::new();
        let (mut rx0, mut rx1) = h.versus();
        responses(&mut rx0);
        responses(&mut rx1);

        h.request(0, ClientRequest::Swap(BlockSwapRequest { x: 5, y: 0, direction: Direction::Right }));
        h.game_loop.run_tick(1_000);

        assert_eq!(error_code(&responses(&mut rx0)), Some(ErrorCode::InvalidSwap));
        assert!(responses(&mut rx1).is_empty());
        let p1 = h.player(0);
        assert_eq!(h.game_loop.players.get(&p1).unwrap().mana, h.game_loop.config.rules.max_mana);
    }

    #[test]
    fn test_rejected_turn_still_reports_regen() {
        let mut h = Harness::new();
        let (mut rx0, mut rx1) = h.versus();
        responses(&mut rx0);
        responses(&mut rx1);

        let p1 = h.player(0);
        h.game_loop.players.get_mut(&p1).unwrap().mana = 50.0;

        // Two seconds after the match started, then an out-of-bounds swap
        h.request(0, ClientRequest::Swap(BlockSwapRequest { x: 5, y: 0, direction: Direction::Right }));
        h.game_loop.run_tick(3_000);

        let out0 = responses(&mut rx0);
        let out1 = responses(&mut rx1);
        assert_eq!(error_code(&out0), Some(ErrorCode::InvalidSwap));
        assert!(error_code(&out1).is_none());

        let regen = h.game_loop.config.rules.mana_regen_per_sec * 2.0;
        for out in [&out0, &out1] {
            let ServerResponse::GameState(state) = &out[0] else {
                panic!("expected game state, got {:?}", out[0]);
            };
            assert_eq!(
                state.events,
                vec![EffectEvent::ManaChanged { field: 1, delta: regen, value: 50.0 + regen }]
            );
        }
        assert_eq!(h.game_loop.players.get(&p1).unwrap().mana, 50.0 + regen);
    }

    #[test]
    fn test_turn_sends_one_state_and_normalizes() {
        let mut h = Harness::new();
        let (mut rx0, mut rx1) = h.versus();
        responses(&mut rx0);
        responses(&mut rx1);

        let p1 = h.player(0);
        let match_id = h.game_loop.players.get(&p1).unwrap().current_match.unwrap();
        let mut rows = calm_rows();
        rows[2] = vec![Heart, Sword, Sword, Crystal, Sword, Heart];
        let game = h.game_loop.matches.get_mut(&match_id).unwrap();
        game.side_mut(Side::First).field = Field::from_rows(1, &calm_rows());
        game.side_mut(Side::Second).field = Field::from_rows(2, &rows);

        h.request(1, ClientRequest::Swap(BlockSwapRequest { x: 3, y: 2, direction: Direction::Right }));
        h.game_loop.run_tick(1_000);

        for rx in [&mut rx0, &mut rx1] {
            let states = responses(rx)
                .iter()
                .filter(|r| matches!(r, ServerResponse::GameState(_)))
                .count();
            assert_eq!(states, 1);
        }

        let game = h.game_loop.matches.get(&match_id).unwrap();
        for side in Side::BOTH {
            assert!(game.field(side).blocks().all(|b| b.replaces.is_none()));
            assert!(game.field(side).blocks().all(|b| b.state == BlockState::Eligible));
        }
    }

    #[test]
    fn test_scenario_d_health_zero_ends_match() {
        let mut h = Harness::new();
        let (mut rx0, mut rx1) = h.versus();
        responses(&mut rx0);
        responses(&mut rx1);

        let p1 = h.player(0);
        let p2 = h.player(1);
        let match_id = h.game_loop.players.get(&p1).unwrap().current_match.unwrap();

        // Swapping (3,2) right lines up three swords on row 2 of player two's field
        let mut rows = calm_rows();
        rows[2] = vec![Heart, Sword, Sword, Crystal, Sword, Heart];
        let game = h.game_loop.matches.get_mut(&match_id).unwrap();
        game.side_mut(Side::First).field = Field::from_rows(1, &calm_rows());
        game.side_mut(Side::Second).field = Field::from_rows(2, &rows);
        h.game_loop.players.get_mut(&p1).unwrap().health = 5.0;

        h.request(1, ClientRequest::Swap(BlockSwapRequest { x: 3, y: 2, direction: Direction::Right }));
        h.game_loop.run_tick(1_100);

        let out0 = responses(&mut rx0);
        let out1 = responses(&mut rx1);
        assert!(matches!(out0[0], ServerResponse::GameState(_)));
        assert!(matches!(out1[0], ServerResponse::GameState(_)));

        let end0 = game_end(&out0).expect("player one notified");
        let end1 = game_end(&out1).expect("player two notified");
        for end in [end0, end1] {
            assert_eq!(end.winner_id, p2.to_uuid_string());
            assert_eq!(end.winner_name, "bob");
            assert!(!end.forfeit);
        }
        assert!(!end0.you_won);
        assert!(end1.you_won);
        assert_eq!(end1.currency_gained, h.game_loop.config.rules.win_currency);

        assert!(h.game_loop.matches.is_empty());
        assert!(h.game_loop.players.get(&p1).unwrap().current_match.is_none());
        assert_eq!(h.game_loop.store.get_player(&p1).unwrap().stats.losses, 1);
        assert_eq!(h.game_loop.store.get_player(&p2).unwrap().stats.wins, 1);
    }

    #[test]
    fn test_disconnect_forfeits_match() {
        let mut h = Harness::new();
        let (mut rx0, mut rx1) = h.versus();
        responses(&mut rx0);
        responses(&mut rx1);
        let p1 = h.player(0);
        let p2 = h.player(1);

        h.actions.send(Action::Disconnected { slot: 0 }).unwrap();
        h.game_loop.run_tick(1_200);

        let end = game_end(&responses(&mut rx1)).cloned().expect("winner notified");
        assert!(end.forfeit && end.you_won);
        assert_eq!(end.winner_id, p2.to_uuid_string());
        assert!(responses(&mut rx0).is_empty());

        assert!(h.game_loop.players.get(&p1).is_none());
        assert_eq!(h.game_loop.store.get_player(&p1).unwrap().stats.losses, 1);
        assert!(h.game_loop.matches.is_empty());
    }

    #[test]
    fn test_practice_match_drives_bot() {
        let mut h = Harness::new();
        let mut rx = h.connect(0);
        h.log_in(0, "ada");
        h.queue(0, MatchMode::Practice);
        h.game_loop.run_tick(1_000);

        let out = responses(&mut rx);
        assert!(out.iter().any(|r| matches!(r, ServerResponse::StartGame(s) if s.mode == MatchMode::Practice)));
        assert_eq!(h.game_loop.ai.bot_count(), 1);

        // Cooldown not elapsed
        h.game_loop.run_tick(1_200);
        assert!(responses(&mut rx).is_empty());

        h.game_loop.run_tick(1_500);
        let out = responses(&mut rx);
        let ServerResponse::GameState(state) = &out[0] else {
            panic!("expected bot turn broadcast, got {:?}", out[0]);
        };
        assert_eq!(state.state.your_slot, 1);
    }

    #[test]
    fn test_bot_is_dropped_with_its_match() {
        let mut h = Harness::new();
        let _rx = h.connect(0);
        h.log_in(0, "ada");
        h.queue(0, MatchMode::Practice);
        h.game_loop.run_tick(1_000);

        h.actions.send(Action::Disconnected { slot: 0 }).unwrap();
        h.game_loop.run_tick(1_100);

        assert_eq!(h.game_loop.ai.bot_count(), 0);
        assert!(h.game_loop.matches.is_empty());
    }

    #[test]
    fn test_loop_stops_when_queue_closes() {
        let Harness { mut game_loop, actions } = Harness::new();
        assert!(game_loop.run_tick(0));
        drop(actions);
        assert!(!game_loop.run_tick(1));
        assert_eq!(game_loop.tick(), 2);
    }
}
