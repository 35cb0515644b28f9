//! Player entities.
//!
//! Players outlive matches. Resource pools are reset at match start and
//! regenerate lazily from elapsed wall-clock time.

use serde::{Serialize, Deserialize};

use crate::config::GameRules;
use crate::core::clock::{elapsed_secs, Millis};
use crate::game::block::BlockType;
use crate::game::skills::SkillKind;
use crate::game::state::MatchId;
use crate::game::unique::UniqueKind;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (UUID as bytes).
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random id.
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s).ok().map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// First four bytes as hex, for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

// =============================================================================
// STATS
// =============================================================================

/// Persistent player statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub currency: u64,
    pub rating: i32,
    pub wins: u32,
    pub losses: u32,
}

impl PlayerStats {
    pub fn new(start_rating: i32) -> Self {
        Self {
            currency: 0,
            rating: start_rating,
            wins: 0,
            losses: 0,
        }
    }
}

/// Persisted player record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub name: String,
    pub stats: PlayerStats,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_seen: chrono::DateTime<chrono::Utc>,
}

impl PlayerRecord {
    pub fn new(id: PlayerId, name: impl Into<String>, start_rating: i32) -> Self {
        let now = chrono::Utc::now();
        Self {
            id,
            name: name.into(),
            stats: PlayerStats::new(start_rating),
            created_at: now,
            last_seen: now,
        }
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// Live player state owned by the authoritative loop.
#[derive(Clone, Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Server-driven player; never persisted and never sent responses.
    pub is_bot: bool,

    pub health: f32,
    pub mana: f32,
    pub energy: f32,
    /// Last time regeneration was applied.
    pub last_regen: Millis,

    /// At most one match at a time.
    pub current_match: Option<MatchId>,

    /// Unique block collection (one entry per name).
    pub uniques: Vec<UniqueKind>,
    /// Skills the player may cast.
    pub skills: Vec<SkillKind>,

    pub stats: PlayerStats,
}

impl Player {
    /// Create a player from a persisted record and collection.
    pub fn from_record(record: &PlayerRecord, uniques: Vec<UniqueKind>, rules: &GameRules) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            is_bot: false,
            health: rules.max_health,
            mana: rules.max_mana,
            energy: rules.max_energy,
            last_regen: 0,
            current_match: None,
            uniques,
            skills: SkillKind::ALL.to_vec(),
            stats: record.stats,
        }
    }

    /// Create a server-driven opponent.
    pub fn bot(rules: &GameRules) -> Self {
        let id = PlayerId::random();
        Self {
            id,
            name: format!("bot-{}", id.short()),
            is_bot: true,
            health: rules.max_health,
            mana: rules.max_mana,
            energy: rules.max_energy,
            last_regen: 0,
            current_match: None,
            uniques: UniqueKind::starter_collection(),
            skills: SkillKind::ALL.to_vec(),
            stats: PlayerStats::new(rules.start_rating),
        }
    }

    /// Record to persist.
    pub fn record(&self, created_at: chrono::DateTime<chrono::Utc>) -> PlayerRecord {
        PlayerRecord {
            id: self.id,
            name: self.name.clone(),
            stats: self.stats,
            created_at,
            last_seen: chrono::Utc::now(),
        }
    }

    /// Restore full pools for a new match.
    pub fn reset_for_match(&mut self, rules: &GameRules, now: Millis) {
        self.health = rules.max_health;
        self.mana = rules.max_mana;
        self.energy = rules.max_energy;
        self.last_regen = now;
    }

    #[inline]
    pub fn is_in_match(&self) -> bool {
        self.current_match.is_some()
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }

    /// Apply regeneration for the time since the last call.
    ///
    /// Returns the applied `(mana, energy)` deltas. Zero elapsed time yields
    /// zero deltas.
    pub fn regen(&mut self, rules: &GameRules, now: Millis) -> (f32, f32) {
        let secs = elapsed_secs(self.last_regen, now);
        self.last_regen = self.last_regen.max(now);
        if secs <= 0.0 {
            return (0.0, 0.0);
        }
        let mana = self.add_mana(rules.mana_regen_per_sec * secs, rules.max_mana);
        let energy = self.add_energy(rules.energy_regen_per_sec * secs, rules.max_energy);
        (mana, energy)
    }

    /// Add (or subtract) health, clamped to `[0, max]`. Returns the applied delta.
    pub fn add_health(&mut self, delta: f32, max: f32) -> f32 {
        clamp_add(&mut self.health, delta, max)
    }

    pub fn add_mana(&mut self, delta: f32, max: f32) -> f32 {
        clamp_add(&mut self.mana, delta, max)
    }

    pub fn add_energy(&mut self, delta: f32, max: f32) -> f32 {
        clamp_add(&mut self.energy, delta, max)
    }

    /// Collection entry that pays out for combos of `block_type`.
    pub fn unique_for(&self, block_type: BlockType) -> Option<UniqueKind> {
        self.uniques.iter().copied().find(|u| u.block_type() == block_type)
    }

    pub fn has_skill(&self, skill: SkillKind) -> bool {
        self.skills.contains(&skill)
    }
}

fn clamp_add(value: &mut f32, delta: f32, max: f32) -> f32 {
    let before = *value;
    *value = (*value + delta).clamp(0.0, max);
    *value - before
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Player {
        let rules = GameRules::default();
        let record = PlayerRecord::new(PlayerId::random(), "alice", rules.start_rating);
        Player::from_record(&record, UniqueKind::starter_collection(), &rules)
    }

    #[test]
    fn test_player_id_uuid_roundtrip() {
        let id = PlayerId::random();
        let parsed = PlayerId::from_uuid_str(&id.to_uuid_string()).unwrap();
        assert_eq!(id, parsed);
        assert_eq!(id.short().len(), 8);
        assert!(PlayerId::from_uuid_str("not-a-uuid").is_none());
    }

    #[test]
    fn test_resources_clamp() {
        let mut p = player();
        assert_eq!(p.add_health(10.0, 100.0), 0.0);
        assert_eq!(p.add_health(-30.0, 100.0), -30.0);
        assert_eq!(p.add_health(-500.0, 100.0), -70.0);
        assert!(p.is_dead());
    }

    #[test]
    fn test_regen_is_lazy_and_idempotent() {
        let rules = GameRules::default();
        let mut p = player();
        p.reset_for_match(&rules, 1_000);
        p.mana = 10.0;
        p.energy = 0.0;

        let (mana, energy) = p.regen(&rules, 3_000);
        assert!((mana - 4.0).abs() < 1e-4);
        assert!((energy - 2.0).abs() < 1e-4);

        assert_eq!(p.regen(&rules, 3_000), (0.0, 0.0));
        // Clock going backwards never drains pools
        assert_eq!(p.regen(&rules, 2_000), (0.0, 0.0));
    }

    #[test]
    fn test_unique_for_type() {
        let p = player();
        assert_eq!(p.unique_for(BlockType::Sword), Some(UniqueKind::Blade));
        assert_eq!(p.unique_for(BlockType::Chameleon), None);
    }

    #[test]
    fn test_bot_is_flagged() {
        let bot = Player::bot(&GameRules::default());
        assert!(bot.is_bot);
        assert!(bot.name.starts_with("bot-"));
    }
}
