//! Shinobi Stealth - grid-based ninja infiltration game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (map generation, AI, detection, abilities)
//! - `session`: Campaign flow across stages (start, select, next, restart)
//! - `persistence`: Stage progress in a key-value store (LocalStorage on web)
//! - `platform`: Browser bindings for the host page
//! - `tuning`: Data-driven game balance

pub mod persistence;
pub mod platform;
pub mod session;
pub mod sim;
pub mod tuning;

pub use persistence::{KeyValueStore, MemoryStore, Progress, StageStats};
pub use session::{NextStage, Session, SessionError};
pub use tuning::{Platform, Tuning, TuningError, VisionModel};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation rate
    pub const SIM_HZ: u32 = 60;
    /// Fixed simulation timestep in seconds
    pub const SIM_DT: f32 = 1.0 / SIM_HZ as f32;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Longest host frame we will try to catch up on (seconds)
    pub const MAX_FRAME_TIME: f32 = 0.1;

    /// Grid dimensions (600x480 canvas at 30px tiles)
    pub const GRID_WIDTH: i32 = 20;
    pub const GRID_HEIGHT: i32 = 16;
    /// Accepted grid sizes (stage layouts need at least 8 tiles per side)
    pub const MIN_GRID_SIZE: i32 = 8;
    pub const MAX_GRID_SIZE: i32 = 64;

    /// Stage range
    pub const FIRST_STAGE: u8 = 1;
    pub const MAX_STAGE: u8 = 5;

    /// Player spawn tile
    pub const PLAYER_START: (i32, i32) = (1, 1);

    /// Stealth meter bounds and rates
    pub const STEALTH_MAX: f32 = 100.0;
    /// Stealth lost per upright step
    pub const STEALTH_MOVE_DRAIN: f32 = 1.0;
    /// Stealth gained per crouched step
    pub const STEALTH_CROUCH_GAIN: f32 = 0.5;
    /// Stealth regained per second while standing still
    pub const STEALTH_IDLE_REGEN_PER_SEC: f32 = 12.0;
    /// Stealth lost when an enemy spots the player
    pub const STEALTH_DETECTION_PENALTY: f32 = 30.0;

    /// Enemy senses
    pub const BASE_VISION_RANGE: i32 = 3;
    pub const HEARING_RANGE: i32 = 2;
    /// Enemy move interval window (ms)
    pub const ENEMY_MOVE_INTERVAL_MIN_MS: u32 = 1500;
    pub const ENEMY_MOVE_INTERVAL_SPREAD_MS: u32 = 1000;
    /// Minimum Chebyshev distance between an enemy spawn and the player start
    pub const ENEMY_SPAWN_CLEARANCE: i32 = 4;

    /// Detection timings (ms)
    pub const HEARD_ALERT_MS: u32 = 3000;
    pub const CHASE_ALERT_MS: u32 = 8000;
    pub const GAME_OVER_DELAY_MS: u32 = 1500;

    /// Ability timings (ms)
    pub const ABILITY_COOLDOWN_MS: u32 = 10_000;
    pub const SMOKE_DURATION_MS: u32 = 3000;
    pub const DECOY_DURATION_MS: u32 = 5000;
    pub const INVISIBILITY_DURATION_MS: u32 = 3000;
    /// Smoke cloud radius in tiles
    pub const SMOKE_RADIUS: f32 = 3.0;
    /// Decoy offset from the player on each axis
    pub const DECOY_OFFSET: i32 = 2;

    /// Presentation cue lifetimes (ms)
    pub const ALARM_CUE_MS: u32 = 3000;
    pub const SUSPICION_CUE_MS: u32 = 2000;

    /// Rejection-sampling budget before falling back to a deterministic search
    pub const PLACEMENT_ATTEMPTS: u32 = 64;
}

/// Format milliseconds as `mm:ss`
pub fn format_clock(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1000;
    format!("{:02}:{:02}", minutes, seconds)
}
