//! Server and gameplay configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Number of connection slots. Fixed for the process lifetime.
    pub pool_size: usize,
    /// Tick rate of the authoritative loop (Hz).
    pub tick_rate: u32,
    /// Minimum delay between two moves of the same bot.
    pub bot_cooldown: Duration,
    /// JSON file backing the player store. In-memory when `None`.
    pub store_path: Option<PathBuf>,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Gameplay tuning.
    pub rules: GameRules,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7777)),
            pool_size: 64,
            tick_rate: crate::TICK_RATE,
            bot_cooldown: Duration::from_millis(1500),
            store_path: None,
            log_level: "info".to_string(),
            rules: GameRules::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Duration of one tick.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate.max(1) as u64)
    }
}

/// Gameplay constants shared by the engine and the coordinator.
#[derive(Debug, Clone)]
pub struct GameRules {
    /// Field width and height.
    pub field_size: usize,

    /// Resource pool maxima.
    pub max_health: f32,
    pub max_mana: f32,
    pub max_energy: f32,
    /// Regeneration per second, applied lazily on refresh.
    pub mana_regen_per_sec: f32,
    pub energy_regen_per_sec: f32,

    /// Mana spent per player-initiated swap.
    pub swap_mana_cost: f32,
    /// Upgrade cost is `upgrade_base_cost * (level + 1)` mana.
    pub upgrade_base_cost: f32,
    pub max_upgrade_level: u32,
    /// Magnitude bonus per purchased upgrade level (0.1 = +10%).
    pub upgrade_step: f32,

    /// Blocks needed to form a run.
    pub min_combo_len: usize,
    /// Magnitude bonus per block beyond the minimum.
    pub extra_block_bonus: f32,
    /// Locked blocks needed for a tap combo.
    pub tap_combo_size: usize,

    // Base combo magnitudes
    pub sword_damage: f32,
    pub heart_heal: f32,
    pub crystal_mana: f32,
    pub bolt_energy: f32,
    pub chameleon_bonus: f32,

    /// Heal-over-time created by Spring blocks and the Renew skill.
    pub heal_over_time_per_sec: f32,
    pub heal_over_time_ms: u64,
    /// Freeze duration per unique level.
    pub freeze_ms_per_level: u64,

    // Skills
    pub fireball_cost: f32,
    pub fireball_damage: f32,
    pub frost_cost: f32,
    pub frost_ms: u64,
    pub transmute_cost: f32,
    pub renew_cost: f32,

    // Match rewards
    pub win_currency: u64,
    pub loss_currency: u64,
    pub rating_k: f32,
    pub start_rating: i32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            field_size: crate::FIELD_SIZE,
            max_health: 100.0,
            max_mana: 100.0,
            max_energy: 100.0,
            mana_regen_per_sec: 2.0,
            energy_regen_per_sec: 1.0,
            swap_mana_cost: 20.0,
            upgrade_base_cost: 30.0,
            max_upgrade_level: 5,
            upgrade_step: 0.1,
            min_combo_len: 3,
            extra_block_bonus: 0.5,
            tap_combo_size: 3,
            sword_damage: 10.0,
            heart_heal: 8.0,
            crystal_mana: 12.0,
            bolt_energy: 12.0,
            chameleon_bonus: 5.0,
            heal_over_time_per_sec: 2.0,
            heal_over_time_ms: 5_000,
            freeze_ms_per_level: 2_000,
            fireball_cost: 30.0,
            fireball_damage: 15.0,
            frost_cost: 40.0,
            frost_ms: 4_000,
            transmute_cost: 25.0,
            renew_cost: 35.0,
            win_currency: 100,
            loss_currency: 25,
            rating_k: 32.0,
            start_rating: 1000,
        }
    }
}
