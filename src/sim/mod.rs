//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No storage or platform dependencies

pub mod abilities;
pub mod ai;
pub mod clock;
pub mod detection;
pub mod grid;
pub mod mapgen;
pub mod state;
pub mod tick;

pub use clock::{Countdown, SimClock};
pub use grid::{Direction, Grid, Pos, TileKind};
pub use state::{
    AbilityKind, AiKind, AlertLevel, EffectKind, Enemy, EnemyState, GameEvent, GamePhase,
    GameState, MissionStatus, MissionSummary, MovementMode, Outcome, Player, Rank, Snapshot,
    Treasure,
};
pub use tick::{Command, FrameDriver, TickInput, apply_command, tick, toggle_pause};
