//! Protocol Messages
//!
//! Typed request and response bodies. Each body is bincode-encoded and
//! framed with its [`MessageType`] tag by [`crate::network::packet`].

use bytes::Bytes;
use serde::{Serialize, Deserialize, de::DeserializeOwned};

use crate::core::clock::Millis;
use crate::error::{ErrorCode, GameError};
use crate::game::block::{BlockState, BlockType, Provenance};
use crate::game::effects::{EffectId, GlobalEffectKind};
use crate::game::events::EffectEvent;
use crate::game::field::{Direction, Field};
use crate::game::player::{Player, PlayerStats};
use crate::game::skills::SkillKind;
use crate::game::state::{GameMatch, MatchMode, Side};
use crate::game::unique::UniqueBlock;
use crate::network::packet::{encode_frame, Frame, ProtocolError};

// =============================================================================
// MESSAGE TYPES
// =============================================================================

/// Wire type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum MessageType {
    ConnectResponse = 1,
    LogInRequest = 2,
    LogInResponse = 3,
    PutPlayerIntoQueueRequest = 10,
    StartGameResponse = 11,
    BlockSwapRequest = 20,
    GameStateResponse = 21,
    GameEndResponse = 22,
    UpgradeRequest = 23,
    BlockTapRequest = 24,
    UseSkillRequest = 25,
    GetPlayerStatsRequest = 30,
    SetPlayerStatsRequest = 31,
    PlayerStatsResponse = 32,
    ErrorResponse = 1000,
}

impl MessageType {
    pub fn from_tag(tag: i32) -> Option<Self> {
        Some(match tag {
            1 => MessageType::ConnectResponse,
            2 => MessageType::LogInRequest,
            3 => MessageType::LogInResponse,
            10 => MessageType::PutPlayerIntoQueueRequest,
            11 => MessageType::StartGameResponse,
            20 => MessageType::BlockSwapRequest,
            21 => MessageType::GameStateResponse,
            22 => MessageType::GameEndResponse,
            23 => MessageType::UpgradeRequest,
            24 => MessageType::BlockTapRequest,
            25 => MessageType::UseSkillRequest,
            30 => MessageType::GetPlayerStatsRequest,
            31 => MessageType::SetPlayerStatsRequest,
            32 => MessageType::PlayerStatsResponse,
            1000 => MessageType::ErrorResponse,
            _ => return None,
        })
    }

    #[inline]
    pub fn tag(self) -> i32 {
        self as i32
    }
}

// =============================================================================
// CLIENT -> SERVER
// =============================================================================

/// Log in. A missing or unknown `player_id` registers a new player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogInRequest {
    /// UUID string of a known player.
    pub player_id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutPlayerIntoQueueRequest {
    pub mode: MatchMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSwapRequest {
    pub x: u32,
    pub y: u32,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTapRequest {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRequest {
    pub block_type: BlockType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseSkillRequest {
    pub skill: SkillKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPlayerStatsRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPlayerStatsRequest {
    pub stats: PlayerStats,
}

/// Decoded client request.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    LogIn(LogInRequest),
    Queue(PutPlayerIntoQueueRequest),
    Swap(BlockSwapRequest),
    Tap(BlockTapRequest),
    Upgrade(UpgradeRequest),
    UseSkill(UseSkillRequest),
    GetStats(GetPlayerStatsRequest),
    SetStats(SetPlayerStatsRequest),
}

/// Result of decoding a frame from a client.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    Request(ClientRequest),
    /// Tag the server does not accept from clients. Logged, connection kept.
    Unhandled(i32),
}

impl ClientRequest {
    pub fn message_type(&self) -> MessageType {
        match self {
            ClientRequest::LogIn(_) => MessageType::LogInRequest,
            ClientRequest::Queue(_) => MessageType::PutPlayerIntoQueueRequest,
            ClientRequest::Swap(_) => MessageType::BlockSwapRequest,
            ClientRequest::Tap(_) => MessageType::BlockTapRequest,
            ClientRequest::Upgrade(_) => MessageType::UpgradeRequest,
            ClientRequest::UseSkill(_) => MessageType::UseSkillRequest,
            ClientRequest::GetStats(_) => MessageType::GetPlayerStatsRequest,
            ClientRequest::SetStats(_) => MessageType::SetPlayerStatsRequest,
        }
    }

    /// Decode a client frame.
    pub fn decode(frame: &Frame) -> Result<DecodeOutcome, ProtocolError> {
        let tag = frame.tag;
        let kind = match MessageType::from_tag(tag) {
            Some(kind) => kind,
            None => return Ok(DecodeOutcome::Unhandled(tag)),
        };
        let request = match kind {
            MessageType::LogInRequest => ClientRequest::LogIn(body(frame)?),
            MessageType::PutPlayerIntoQueueRequest => ClientRequest::Queue(body(frame)?),
            MessageType::BlockSwapRequest => ClientRequest::Swap(body(frame)?),
            MessageType::BlockTapRequest => ClientRequest::Tap(body(frame)?),
            MessageType::UpgradeRequest => ClientRequest::Upgrade(body(frame)?),
            MessageType::UseSkillRequest => ClientRequest::UseSkill(body(frame)?),
            MessageType::GetPlayerStatsRequest => ClientRequest::GetStats(body(frame)?),
            MessageType::SetPlayerStatsRequest => ClientRequest::SetStats(body(frame)?),
            _ => return Ok(DecodeOutcome::Unhandled(tag)),
        };
        Ok(DecodeOutcome::Request(request))
    }

    /// Encode as a full frame (client side and tests).
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let body = match self {
            ClientRequest::LogIn(b) => bincode::serialize(b),
            ClientRequest::Queue(b) => bincode::serialize(b),
            ClientRequest::Swap(b) => bincode::serialize(b),
            ClientRequest::Tap(b) => bincode::serialize(b),
            ClientRequest::Upgrade(b) => bincode::serialize(b),
            ClientRequest::UseSkill(b) => bincode::serialize(b),
            ClientRequest::GetStats(b) => bincode::serialize(b),
            ClientRequest::SetStats(b) => bincode::serialize(b),
        }
        .map_err(ProtocolError::Encode)?;
        Ok(encode_frame(self.message_type().tag(), &body))
    }
}

fn body<T: DeserializeOwned>(frame: &Frame) -> Result<T, ProtocolError> {
    bincode::deserialize(&frame.body).map_err(|source| ProtocolError::Body { tag: frame.tag, source })
}

// =============================================================================
// SERVER -> CLIENT
// =============================================================================

/// First message on every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub slot: u32,
    pub server_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogInResponse {
    pub player_id: String,
    pub name: String,
    pub stats: PlayerStats,
}

/// Match started; carries the initial snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartGameResponse {
    pub match_id: String,
    pub mode: MatchMode,
    pub state: GameStateSnapshot,
}

/// Snapshot after a turn, plus the turn's events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateResponse {
    pub state: GameStateSnapshot,
    pub events: Vec<EffectEvent>,
}

/// Terminal message of a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEndResponse {
    pub match_id: String,
    pub winner_id: String,
    pub winner_name: String,
    pub you_won: bool,
    /// Set when the loser left instead of dying.
    pub forfeit: bool,
    pub currency_gained: u64,
    pub rating_delta: i32,
    /// Stats after the match.
    pub stats: PlayerStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatsResponse {
    pub player_id: String,
    pub name: String,
    pub stats: PlayerStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&GameError> for ErrorResponse {
    fn from(err: &GameError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Outbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerResponse {
    Connect(ConnectResponse),
    LogIn(LogInResponse),
    StartGame(Box<StartGameResponse>),
    GameState(Box<GameStateResponse>),
    GameEnd(GameEndResponse),
    Stats(PlayerStatsResponse),
    Error(ErrorResponse),
}

impl ServerResponse {
    pub fn message_type(&self) -> MessageType {
        match self {
            ServerResponse::Connect(_) => MessageType::ConnectResponse,
            ServerResponse::LogIn(_) => MessageType::LogInResponse,
            ServerResponse::StartGame(_) => MessageType::StartGameResponse,
            ServerResponse::GameState(_) => MessageType::GameStateResponse,
            ServerResponse::GameEnd(_) => MessageType::GameEndResponse,
            ServerResponse::Stats(_) => MessageType::PlayerStatsResponse,
            ServerResponse::Error(_) => MessageType::ErrorResponse,
        }
    }

    /// Serialize, prepend tag, prepend length.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let body = match self {
            ServerResponse::Connect(b) => bincode::serialize(b),
            ServerResponse::LogIn(b) => bincode::serialize(b),
            ServerResponse::StartGame(b) => bincode::serialize(b.as_ref()),
            ServerResponse::GameState(b) => bincode::serialize(b.as_ref()),
            ServerResponse::GameEnd(b) => bincode::serialize(b),
            ServerResponse::Stats(b) => bincode::serialize(b),
            ServerResponse::Error(b) => bincode::serialize(b),
        }
        .map_err(ProtocolError::Encode)?;
        Ok(encode_frame(self.message_type().tag(), &body))
    }

    /// Decode a server frame (client side and tests).
    pub fn decode(frame: &Frame) -> Result<Option<Self>, ProtocolError> {
        let kind = match MessageType::from_tag(frame.tag) {
            Some(kind) => kind,
            None => return Ok(None),
        };
        Ok(Some(match kind {
            MessageType::ConnectResponse => ServerResponse::Connect(body(frame)?),
            MessageType::LogInResponse => ServerResponse::LogIn(body(frame)?),
            MessageType::StartGameResponse => ServerResponse::StartGame(Box::new(body(frame)?)),
            MessageType::GameStateResponse => ServerResponse::GameState(Box::new(body(frame)?)),
            MessageType::GameEndResponse => ServerResponse::GameEnd(body(frame)?),
            MessageType::PlayerStatsResponse => ServerResponse::Stats(body(frame)?),
            MessageType::ErrorResponse => ServerResponse::Error(body(frame)?),
            _ => return Ok(None),
        }))
    }

    pub fn error(err: &GameError) -> Self {
        ServerResponse::Error(err.into())
    }
}

// =============================================================================
// SNAPSHOTS
// =============================================================================

/// Full match state from one participant's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    pub match_id: String,
    /// Recipient's slot number.
    pub your_slot: u8,
    pub you: SideSnapshot,
    pub opponent: SideSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideSnapshot {
    pub slot: u8,
    pub player_id: String,
    pub name: String,
    pub health: f32,
    pub mana: f32,
    pub energy: f32,
    pub upgrades: Vec<(BlockType, u32)>,
    pub effects: Vec<EffectView>,
    pub field: FieldSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectView {
    pub id: EffectId,
    pub kind: GlobalEffectKind,
    pub remaining_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSnapshot {
    pub id: u8,
    pub width: u32,
    pub height: u32,
    /// Row-major.
    pub blocks: Vec<BlockView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockView {
    pub id: u64,
    pub block_type: BlockType,
    pub x: u32,
    pub y: u32,
    pub state: BlockState,
    /// Prior occupant of this slot, for animation.
    pub replaces: Option<Provenance>,
    pub frozen_ms: u64,
    pub unique: Option<UniqueBlock>,
    pub locked: bool,
}

impl FieldSnapshot {
    pub fn of(field: &Field, now: Millis) -> Self {
        Self {
            id: field.id,
            width: field.width() as u32,
            height: field.height() as u32,
            blocks: field
                .blocks()
                .map(|b| BlockView {
                    id: b.id.0,
                    block_type: b.block_type,
                    x: b.cell.x as u32,
                    y: b.cell.y as u32,
                    state: b.state,
                    replaces: b.replaces.clone(),
                    frozen_ms: b.frozen_ms_left(now),
                    unique: b.unique,
                    locked: b.locked,
                })
                .collect(),
        }
    }
}

impl SideSnapshot {
    pub fn of(game: &GameMatch, side: Side, player: &Player, now: Millis) -> Self {
        let match_side = game.side(side);
        Self {
            slot: side.number(),
            player_id: player.id.to_uuid_string(),
            name: player.name.clone(),
            health: player.health,
            mana: player.mana,
            energy: player.energy,
            upgrades: match_side.upgrades.iter().collect(),
            effects: match_side
                .field
                .effects
                .iter()
                .map(|e| EffectView { id: e.id, kind: e.kind, remaining_ms: e.remaining_ms })
                .collect(),
            field: FieldSnapshot::of(&match_side.field, now),
        }
    }
}

impl GameStateSnapshot {
    /// Snapshot for `viewer`; `players` ordered by slot.
    pub fn build(game: &GameMatch, players: [&Player; 2], viewer: Side, now: Millis) -> Self {
        let other = viewer.other();
        Self {
            match_id: game.id.to_uuid_string(),
            your_slot: viewer.number(),
            you: SideSnapshot::of(game, viewer, players[viewer.index()], now),
            opponent: SideSnapshot::of(game, other, players[other.index()], now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameRules;
    use crate::game::block::Cell;
    use crate::game::registry::tests::fixture;
    use crate::network::packet::FrameDecoder;

    fn decode_one(bytes: &[u8]) -> Frame {
        let mut decoder = FrameDecoder::default();
        decoder.extend(bytes);
        decoder.next_frame().unwrap().unwrap()
    }

    #[test]
    fn test_tags_match_wire_values() {
        assert_eq!(MessageType::BlockSwapRequest.tag(), 20);
        assert_eq!(MessageType::ErrorResponse.tag(), 1000);
        assert_eq!(MessageType::from_tag(32), Some(MessageType::PlayerStatsResponse));
        assert_eq!(MessageType::from_tag(99), None);
    }

    #[test]
    fn test_request_roundtrip_preserves_body() {
        let requests = vec![
            ClientRequest::LogIn(LogInRequest { player_id: None, name: "ada".into() }),
            ClientRequest::Queue(PutPlayerIntoQueueRequest { mode: MatchMode::Practice }),
            ClientRequest::Swap(BlockSwapRequest { x: 2, y: 3, direction: Direction::Left }),
            ClientRequest::Tap(BlockTapRequest { x: 0, y: 5 }),
            ClientRequest::Upgrade(UpgradeRequest { block_type: BlockType::Bolt }),
            ClientRequest::UseSkill(UseSkillRequest { skill: SkillKind::Renew }),
            ClientRequest::GetStats(GetPlayerStatsRequest),
            ClientRequest::SetStats(SetPlayerStatsRequest { stats: PlayerStats::new(1200) }),
        ];

        for request in requests {
            let bytes = request.encode().unwrap();
            let frame = decode_one(&bytes);
            assert_eq!(frame.tag, request.message_type().tag());
            assert_eq!(&frame.body[..], &bytes[8..]);
            assert_eq!(ClientRequest::decode(&frame).unwrap(), DecodeOutcome::Request(request));
        }
    }

    #[test]
    fn test_unknown_tag_is_unhandled() {
        let frame = Frame { tag: 77, body: Bytes::new() };
        assert_eq!(ClientRequest::decode(&frame).unwrap(), DecodeOutcome::Unhandled(77));

        // Response tags are not accepted from clients
        let frame = Frame { tag: MessageType::GameStateResponse.tag(), body: Bytes::new() };
        assert_eq!(ClientRequest::decode(&frame).unwrap(), DecodeOutcome::Unhandled(21));
    }

    #[test]
    fn test_malformed_body_is_protocol_error() {
        let frame = Frame {
            tag: MessageType::BlockSwapRequest.tag(),
            body: Bytes::from_static(&[1, 2]),
        };
        assert!(matches!(ClientRequest::decode(&frame), Err(ProtocolError::Body { tag: 20, .. })));
    }

    #[test]
    fn test_error_response_roundtrip() {
        let err = GameError::NotEnoughMana { required: 20.0, available: 15.0 };
        let bytes = ServerResponse::error(&err).encode().unwrap();
        let frame = decode_one(&bytes);
        assert_eq!(frame.tag, 1000);

        match ServerResponse::decode(&frame).unwrap() {
            Some(ServerResponse::Error(e)) => {
                assert_eq!(e.code, ErrorCode::NotEnoughMana);
                assert!(e.message.contains("mana"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_swaps_roles() {
        let rules = GameRules::default();
        let (game, p1, p2) = fixture(&rules);

        let first = GameStateSnapshot::build(&game, [&p1, &p2], Side::First, 0);
        let second = GameStateSnapshot::build(&game, [&p1, &p2], Side::Second, 0);

        assert_eq!(first.your_slot, 1);
        assert_eq!(first.you.player_id, p1.id.to_uuid_string());
        assert_eq!(second.you, first.opponent);
        assert_eq!(second.opponent, first.you);
        assert_eq!(first.you.field.blocks.len(), 36);
        assert_eq!(first.you.upgrades.len(), BlockType::ALL.len());
    }

    #[test]
    fn test_game_state_response_roundtrip() {
        let rules = GameRules::default();
        let (game, p1, p2) = fixture(&rules);
        let response = ServerResponse::GameState(Box::new(GameStateResponse {
            state: GameStateSnapshot::build(&game, [&p1, &p2], Side::First, 0),
            events: vec![EffectEvent::Shot {
                block_type: BlockType::Sword,
                from_field: 1,
                from: Cell::new(1, 1),
                to_field: 2,
                to: Cell::new(4, 4),
            }],
        }));

        let bytes = response.encode().unwrap();
        let decoded = ServerResponse::decode(&decode_one(&bytes)).unwrap();
        assert_eq!(decoded, Some(response));
    }
}
