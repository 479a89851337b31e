//! Game state and core simulation types
//!
//! Everything one stage attempt needs lives in `GameState`; the update
//! functions in the sibling modules take it by `&mut` and nothing else.

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::clock::{Countdown, SimClock, ms_to_ticks};
use super::grid::{Direction, Grid, Pos, TileKind, pos};
use super::mapgen;
use crate::consts::*;
use crate::tuning::Tuning;

/// Current phase of a stage attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Stage loaded, waiting for the mission to begin
    Start,
    /// Active gameplay (possibly caught and counting down to game over)
    Playing,
    /// Game is paused; the clock is frozen
    Paused,
    /// All treasures collected and exit reached
    StageCleared,
    /// Player was caught
    GameOver,
}

impl GamePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, GamePhase::StageCleared | GamePhase::GameOver)
    }
}

/// Player posture as seen by enemies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementMode {
    Normal,
    Crouching,
    Hidden,
}

/// Enemy awareness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnemyState {
    Normal,
    /// Heard something (or spotted a decoy); reverts when the alert timer runs out
    Alert,
    /// Spotted the player
    Chasing,
}

/// Enemy movement policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiKind {
    Patrol,
    Guard,
    Random,
}

impl AiKind {
    /// Default cycle used when spawning a roster
    pub const CYCLE: [AiKind; 3] = [AiKind::Patrol, AiKind::Guard, AiKind::Random];
}

/// Consumable player abilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityKind {
    Smoke,
    Decoy,
    Invisibility,
}

impl AbilityKind {
    pub const ALL: [AbilityKind; 3] = [
        AbilityKind::Smoke,
        AbilityKind::Decoy,
        AbilityKind::Invisibility,
    ];

    /// Effect lifetime once used
    pub fn duration_ms(self) -> u32 {
        match self {
            AbilityKind::Smoke => SMOKE_DURATION_MS,
            AbilityKind::Decoy => DECOY_DURATION_MS,
            AbilityKind::Invisibility => INVISIBILITY_DURATION_MS,
        }
    }

    /// Charges granted at the start of a stage
    pub fn starting_charges(self, stage: u8) -> u8 {
        match self {
            AbilityKind::Smoke | AbilityKind::Decoy => 1,
            AbilityKind::Invisibility => u8::from(stage >= 5),
        }
    }
}

/// Charge count and cooldown for one ability
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ability {
    pub charges: u8,
    pub cooldown: Countdown,
}

/// The player's three ability slots
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Abilities {
    pub smoke: Ability,
    pub decoy: Ability,
    pub invisibility: Ability,
}

impl Abilities {
    /// Loadout for a stage
    pub fn for_stage(stage: u8) -> Self {
        let slot = |kind: AbilityKind| Ability {
            charges: kind.starting_charges(stage),
            cooldown: Countdown::default(),
        };
        Self {
            smoke: slot(AbilityKind::Smoke),
            decoy: slot(AbilityKind::Decoy),
            invisibility: slot(AbilityKind::Invisibility),
        }
    }

    pub fn get(&self, kind: AbilityKind) -> &Ability {
        match kind {
            AbilityKind::Smoke => &self.smoke,
            AbilityKind::Decoy => &self.decoy,
            AbilityKind::Invisibility => &self.invisibility,
        }
    }

    pub fn get_mut(&mut self, kind: AbilityKind) -> &mut Ability {
        match kind {
            AbilityKind::Smoke => &mut self.smoke,
            AbilityKind::Decoy => &mut self.decoy,
            AbilityKind::Invisibility => &mut self.invisibility,
        }
    }
}

/// The player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub pos: Pos,
    pub crouching: bool,
    pub hidden: bool,
    /// 0-100 concealment meter
    pub stealth_level: f32,
    /// Times spotted during this attempt (never decreases)
    pub detection_count: u32,
    /// Detection tolerance; carried for save compatibility, the first detection always fails the stage
    pub max_detections: u32,
    pub abilities: Abilities,
    /// Tick of the last successful step
    pub last_move_tick: u64,
    /// Stepped at least once during the current tick
    pub moved_this_tick: bool,
}

impl Player {
    pub fn new(stage: u8) -> Self {
        Self {
            pos: pos(PLAYER_START.0, PLAYER_START.1),
            crouching: false,
            hidden: false,
            stealth_level: STEALTH_MAX,
            detection_count: 0,
            max_detections: 1,
            abilities: Abilities::for_stage(stage),
            last_move_tick: 0,
            moved_this_tick: false,
        }
    }

    /// Hidden takes precedence over crouching
    pub fn mode(&self) -> MovementMode {
        if self.hidden {
            MovementMode::Hidden
        } else if self.crouching {
            MovementMode::Crouching
        } else {
            MovementMode::Normal
        }
    }
}

/// Cyclic list of waypoints for a patrolling enemy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatrolRoute {
    pub waypoints: Vec<Pos>,
    pub index: usize,
}

impl PatrolRoute {
    pub fn new(waypoints: Vec<Pos>) -> Self {
        Self { waypoints, index: 0 }
    }

    pub fn current(&self) -> Option<Pos> {
        self.waypoints.get(self.index).copied()
    }

    pub fn advance(&mut self) {
        if !self.waypoints.is_empty() {
            self.index = (self.index + 1) % self.waypoints.len();
        }
    }

    pub fn retreat(&mut self) {
        let len = self.waypoints.len();
        if len > 0 {
            self.index = (self.index + len - 1) % len;
        }
    }
}

/// A guard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enemy {
    pub id: u32,
    pub pos: Pos,
    pub facing: Direction,
    pub state: EnemyState,
    pub ai: AiKind,
    /// Vision cone length in tiles
    pub vision_range: i32,
    /// Hearing radius in tiles (Manhattan)
    pub hearing_range: i32,
    pub move_interval_ticks: u64,
    pub last_move_tick: u64,
    /// Time until `Alert`/`Chasing` decays back to `Normal`
    pub alert: Countdown,
    pub patrol: PatrolRoute,
}

/// A collectible
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Treasure {
    pub id: u32,
    pub pos: Pos,
    pub collected: bool,
}

/// Timed effect kinds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EffectKind {
    /// Smoke cloud blocking sight within `radius` tiles
    Smoke { radius: f32 },
    /// Stationary decoy that attracts enemy attention
    Decoy,
    /// Player cannot be seen
    Invisibility,
    /// "!" cue over an enemy that spotted the player
    Alarm { enemy_id: u32 },
    /// "?" cue over an enemy that heard the player
    Suspicion { enemy_id: u32 },
}

/// A timed effect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Effect {
    pub id: u32,
    pub kind: EffectKind,
    pub pos: Option<Pos>,
    pub timer: Countdown,
}

impl Effect {
    pub fn is_active(&self, now: u64) -> bool {
        self.timer.is_running(now)
    }
}

/// Immutable stage definition for one attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub number: u8,
    pub name: String,
    pub grid: Grid,
    pub exit: Pos,
    pub treasure_target: usize,
    pub enemy_count: usize,
}

impl Stage {
    /// Terrain for presentation, with the exit overlaid
    pub fn tile_view(&self, p: Pos) -> TileKind {
        if p == self.exit {
            TileKind::Exit
        } else {
            self.grid.get(p)
        }
    }
}

/// How many enemies are suspicious right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertLevel {
    Normal,
    Alert,
    High,
}

impl AlertLevel {
    pub fn from_suspicious_count(count: usize) -> Self {
        match count {
            0 => AlertLevel::Normal,
            1..=2 => AlertLevel::Alert,
            _ => AlertLevel::High,
        }
    }
}

/// One-line mission status for the HUD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissionStatus {
    Infiltrating,
    Alerted,
    HighAlert,
    ReadyToEscape,
}

/// Letter grade from detections alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    S,
    A,
    B,
    C,
}

impl Rank {
    pub fn from_detections(detections: u32) -> Self {
        match detections {
            0 => Rank::S,
            1 => Rank::A,
            2 => Rank::B,
            _ => Rank::C,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::S => "S",
            Rank::A => "A",
            Rank::B => "B",
            Rank::C => "C",
        }
    }
}

/// How an attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Cleared,
    Caught,
}

/// End-of-attempt report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionSummary {
    pub stage: u8,
    pub outcome: Outcome,
    /// Active play time (pauses excluded)
    pub elapsed_ms: u64,
    pub detections: u32,
    pub rank: Rank,
    pub treasures_collected: usize,
    pub total_treasures: usize,
}

/// Game over scheduled after the player was spotted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingGameOver {
    pub fires_at: u64,
    /// Attempt token; a mismatch means the attempt was reset and this entry is stale
    pub attempt: u32,
}

/// Events for the presentation layer, drained each frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    StageStarted { stage: u8 },
    PlayerDetected { enemy_id: u32, enemy_pos: Pos, player_pos: Pos },
    NoiseHeard { enemy_id: u32 },
    DecoySpotted { enemy_id: u32 },
    TreasureCollected { treasure_id: u32, remaining: usize },
    AbilityUsed { kind: AbilityKind },
    Paused,
    Resumed,
    StageCleared,
    GameOver,
}

/// Complete state of one stage attempt (deterministic, serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    /// Seed the attempt was generated from
    pub seed: u64,
    /// Attempt token, bumped on every reset
    pub attempt: u32,
    pub rng: Pcg32,
    pub tuning: Tuning,
    pub stage: Stage,
    pub phase: GamePhase,
    pub clock: SimClock,
    pub player: Player,
    /// Sorted by id
    pub enemies: Vec<Enemy>,
    pub treasures: Vec<Treasure>,
    pub treasures_collected: usize,
    pub effects: Vec<Effect>,
    pub alert_level: AlertLevel,
    pub pending_game_over: Option<PendingGameOver>,
    pub summary: Option<MissionSummary>,
    #[serde(skip)]
    pub events: Vec<GameEvent>,
    next_id: u32,
}

impl GameState {
    /// Load a stage (clamped to 1..=5) in the `Start` phase
    pub fn new(stage: u8, seed: u64, tuning: Tuning) -> Self {
        let stage_number = stage.clamp(FIRST_STAGE, MAX_STAGE);
        let tuning = tuning.clamped();
        let mut rng = Pcg32::seed_from_u64(seed);
        let stage = mapgen::generate_stage(
            stage_number,
            tuning.grid_width,
            tuning.grid_height,
            &mut rng,
        );

        let mut state = Self {
            seed,
            attempt: 0,
            rng,
            tuning,
            stage,
            phase: GamePhase::Start,
            clock: SimClock::default(),
            player: Player::new(stage_number),
            enemies: Vec::new(),
            treasures: Vec::new(),
            treasures_collected: 0,
            effects: Vec::new(),
            alert_level: AlertLevel::Normal,
            pending_game_over: None,
            summary: None,
            events: Vec::new(),
            next_id: 1,
        };
        state.populate();
        state
    }

    /// Spawn treasures and enemies for the loaded stage
    fn populate(&mut self) {
        let start = self.player.pos;
        let treasure_spots = mapgen::place_treasures(
            &self.stage,
            start,
            self.stage.treasure_target,
            &mut self.rng,
        );
        self.treasures = treasure_spots
            .into_iter()
            .map(|p| Treasure {
                id: self.next_entity_id(),
                pos: p,
                collected: false,
            })
            .collect();

        let treasure_positions: Vec<Pos> = self.treasures.iter().map(|t| t.pos).collect();
        let specs = mapgen::place_enemies(
            &self.stage,
            start,
            &treasure_positions,
            &self.tuning,
            &mut self.rng,
        );
        self.enemies = specs
            .into_iter()
            .map(|spec| Enemy {
                id: self.next_entity_id(),
                pos: spec.pos,
                facing: spec.facing,
                state: EnemyState::Normal,
                ai: spec.ai,
                vision_range: spec.vision_range,
                hearing_range: spec.hearing_range,
                move_interval_ticks: ms_to_ticks(spec.move_interval_ms),
                last_move_tick: 0,
                alert: Countdown::default(),
                patrol: PatrolRoute::new(spec.patrol_path),
            })
            .collect();

        log::info!(
            "Stage {} ({}) loaded: {} treasures, {} enemies, exit at ({}, {})",
            self.stage.number,
            self.stage.name,
            self.treasures.len(),
            self.enemies.len(),
            self.stage.exit.x,
            self.stage.exit.y
        );
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Begin the mission (`Start -> Playing`)
    pub fn start(&mut self) {
        if self.phase == GamePhase::Start {
            self.phase = GamePhase::Playing;
            self.events.push(GameEvent::StageStarted {
                stage: self.stage.number,
            });
        }
    }

    /// Reset to a fresh attempt of the same stage with a new seed.
    ///
    /// The attempt token is bumped first so any game over scheduled by the
    /// previous attempt can never fire.
    pub fn reset(&mut self, seed: u64) {
        let attempt = self.attempt.wrapping_add(1);
        let tuning = self.tuning.clone();
        *self = Self::new(self.stage.number, seed, tuning);
        self.attempt = attempt;
    }

    /// Whether a detection has already sealed this attempt
    pub fn is_caught(&self) -> bool {
        self.pending_game_over.is_some()
    }

    /// Total treasures for the stage
    pub fn total_treasures(&self) -> usize {
        self.treasures.len()
    }

    pub fn all_treasures_collected(&self) -> bool {
        self.treasures_collected == self.total_treasures()
    }

    pub fn enemy_at(&self, p: Pos) -> Option<&Enemy> {
        self.enemies.iter().find(|e| e.pos == p)
    }

    /// Any active effect of the given kind
    pub fn has_active(&self, pred: impl Fn(&EffectKind) -> bool) -> bool {
        let now = self.clock.now();
        self.effects
            .iter()
            .any(|e| e.is_active(now) && pred(&e.kind))
    }

    pub fn invisibility_active(&self) -> bool {
        self.has_active(|k| matches!(k, EffectKind::Invisibility))
    }

    /// Spawn a timed effect
    pub fn add_effect(&mut self, kind: EffectKind, pos: Option<Pos>, duration_ms: u32) {
        let id = self.next_entity_id();
        let mut timer = Countdown::default();
        timer.start(self.clock.now(), ms_to_ticks(duration_ms));
        self.effects.push(Effect {
            id,
            kind,
            pos,
            timer,
        });
    }

    /// HUD status line
    pub fn mission_status(&self) -> MissionStatus {
        if self.all_treasures_collected() {
            MissionStatus::ReadyToEscape
        } else {
            match self.alert_level {
                AlertLevel::High => MissionStatus::HighAlert,
                AlertLevel::Alert => MissionStatus::Alerted,
                AlertLevel::Normal => MissionStatus::Infiltrating,
            }
        }
    }

    /// Current rank from detections
    pub fn rank(&self) -> Rank {
        Rank::from_detections(self.player.detection_count)
    }

    /// Build the end-of-attempt report
    pub fn make_summary(&self, outcome: Outcome) -> MissionSummary {
        MissionSummary {
            stage: self.stage.number,
            outcome,
            elapsed_ms: self.clock.elapsed_ms(),
            detections: self.player.detection_count,
            rank: self.rank(),
            treasures_collected: self.treasures_collected,
            total_treasures: self.total_treasures(),
        }
    }

    /// Take pending events
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Read-only view for the presentation layer
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            phase: self.phase,
            stage: self.stage.number,
            stage_name: &self.stage.name,
            grid: &self.stage.grid,
            exit: self.stage.exit,
            player: &self.player,
            mode: self.player.mode(),
            enemies: &self.enemies,
            treasures: &self.treasures,
            effects: &self.effects,
            treasures_collected: self.treasures_collected,
            total_treasures: self.total_treasures(),
            alert_level: self.alert_level,
            mission_status: self.mission_status(),
            elapsed_ms: self.clock.elapsed_ms(),
            caught: self.is_caught(),
            summary: self.summary.as_ref(),
        }
    }
}

/// Borrowed, serializable view of a `GameState`
#[derive(Debug, Serialize)]
pub struct Snapshot<'a> {
    pub phase: GamePhase,
    pub stage: u8,
    pub stage_name: &'a str,
    pub grid: &'a Grid,
    pub exit: Pos,
    pub player: &'a Player,
    pub mode: MovementMode,
    pub enemies: &'a [Enemy],
    pub treasures: &'a [Treasure],
    pub effects: &'a [Effect],
    pub treasures_collected: usize,
    pub total_treasures: usize,
    pub alert_level: AlertLevel,
    pub mission_status: MissionStatus,
    pub elapsed_ms: u64,
    pub caught: bool,
    pub summary: Option<&'a MissionSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_mapping() {
        assert_eq!(Rank::from_detections(0), Rank::S);
        assert_eq!(Rank::from_detections(1), Rank::A);
        assert_eq!(Rank::from_detections(2), Rank::B);
        assert_eq!(Rank::from_detections(3), Rank::C);
        assert_eq!(Rank::from_detections(42), Rank::C);
    }

    #[test]
    fn test_alert_level_buckets() {
        assert_eq!(AlertLevel::from_suspicious_count(0), AlertLevel::Normal);
        assert_eq!(AlertLevel::from_suspicious_count(1), AlertLevel::Alert);
        assert_eq!(AlertLevel::from_suspicious_count(2), AlertLevel::Alert);
        assert_eq!(AlertLevel::from_suspicious_count(3), AlertLevel::High);
    }

    #[test]
    fn test_new_state_matches_stage_table() {
        for stage in FIRST_STAGE..=MAX_STAGE {
            let state = GameState::new(stage, 7, Tuning::default());
            assert_eq!(state.phase, GamePhase::Start);
            assert_eq!(state.player.pos, pos(1, 1));
            assert_eq!(state.total_treasures(), state.stage.treasure_target);
            assert_eq!(state.enemies.len(), state.stage.enemy_count);
            let invis = state.player.abilities.invisibility.charges;
            assert_eq!(invis, u8::from(stage == 5));
        }
    }

    #[test]
    fn test_player_mode_precedence() {
        let mut player = Player::new(1);
        assert_eq!(player.mode(), MovementMode::Normal);
        player.crouching = true;
        assert_eq!(player.mode(), MovementMode::Crouching);
        player.hidden = true;
        assert_eq!(player.mode(), MovementMode::Hidden);
    }

    #[test]
    fn test_patrol_route_wraps_both_ways() {
        let mut route = PatrolRoute::new(vec![pos(1, 1), pos(3, 1), pos(3, 3)]);
        route.retreat();
        assert_eq!(route.current(), Some(pos(3, 3)));
        route.advance();
        assert_eq!(route.current(), Some(pos(1, 1)));

        let mut empty = PatrolRoute::default();
        empty.advance();
        empty.retreat();
        assert_eq!(empty.current(), None);
    }

    #[test]
    fn test_reset_bumps_attempt_and_clears_pending() {
        let mut state = GameState::new(1, 3, Tuning::default());
        state.pending_game_over = Some(PendingGameOver {
            fires_at: 10,
            attempt: state.attempt,
        });
        state.reset(4);
        assert_eq!(state.attempt, 1);
        assert!(state.pending_game_over.is_none());
        assert_eq!(state.phase, GamePhase::Start);
    }

    #[test]
    fn test_wild_tuning_is_clamped_not_fatal() {
        let tuning = Tuning {
            late_stage_random_bias: 1.5,
            guard_turn_chance: -3.0,
            grid_width: i32::MAX,
            grid_height: i32::MAX,
            ..Tuning::default()
        };
        let state = GameState::new(4, 1, tuning);
        assert_eq!(state.tuning.late_stage_random_bias, 1.0);
        assert_eq!(state.tuning.guard_turn_chance, 0.0);
        assert_eq!(state.stage.grid.width(), MAX_GRID_SIZE);
        // Every enemy on stage 4 is re-rolled to random movement
        assert!(state.enemies.iter().all(|e| e.ai == AiKind::Random));
    }

    #[test]
    fn test_snapshot_serializes() {
        let state = GameState::new(2, 11, Tuning::default());
        let json = serde_json::to_string(&state.snapshot()).unwrap();
        assert!(json.contains("\"phase\":\"Start\""));
        assert!(json.contains("\"stage\":2"));
    }
}
