//! Fixed timestep simulation tick
//!
//! Core game loop that advances one stage attempt deterministically.

use super::abilities::{update_effects, use_ability};
use super::ai::update_enemies;
use super::detection::update_detection;
use super::grid::Direction;
use super::state::{AbilityKind, GameEvent, GamePhase, GameState, Outcome};
use crate::consts::*;

/// A discrete player action, applied between ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Move(Direction),
    ToggleCrouch,
    /// Hold-to-crouch key pressed or released
    SetCrouch(bool),
    /// Hide behind adjacent cover (or stop hiding)
    ToggleHide,
    /// Clear crouch and hide
    StandUp,
    UseAbility(AbilityKind),
    TogglePause,
}

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    pub commands: Vec<Command>,
}

impl TickInput {
    pub fn with(command: Command) -> Self {
        Self {
            commands: vec![command],
        }
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn wants_pause(&self) -> bool {
        self.commands.contains(&Command::TogglePause)
    }
}

/// Flip between `Playing` and `Paused`. Returns false in any other phase.
pub fn toggle_pause(state: &mut GameState) -> bool {
    match state.phase {
        GamePhase::Playing => {
            state.phase = GamePhase::Paused;
            state.events.push(GameEvent::Paused);
            log::info!("Paused at tick {}", state.clock.now());
            true
        }
        GamePhase::Paused => {
            state.phase = GamePhase::Playing;
            state.events.push(GameEvent::Resumed);
            log::info!("Resumed at tick {}", state.clock.now());
            true
        }
        _ => false,
    }
}

/// Advance the game state by one fixed timestep
pub fn tick(state: &mut GameState, input: &TickInput) {
    // A pause takes effect immediately; a resume runs this tick
    if input.wants_pause() && toggle_pause(state) && state.phase == GamePhase::Paused {
        return;
    }

    // Nothing moves (not even the clock) outside active play
    if state.phase != GamePhase::Playing {
        return;
    }

    state.clock.advance();
    let now = state.clock.now();

    // Scheduled game over
    if let Some(pending) = state.pending_game_over {
        if pending.attempt != state.attempt {
            log::debug!("Discarding stale game over from attempt {}", pending.attempt);
            state.pending_game_over = None;
        } else if now >= pending.fires_at {
            finish(state, Outcome::Caught);
            return;
        }
    }

    state.player.moved_this_tick = false;
    if !state.is_caught() {
        for &command in &input.commands {
            apply_command(state, command);
        }
    }

    update_player(state);
    update_enemies(state);
    update_effects(state);
    collect_treasures(state);

    if !state.is_caught()
        && state.all_treasures_collected()
        && state.player.pos == state.stage.exit
    {
        finish(state, Outcome::Cleared);
        return;
    }

    update_detection(state);
}

/// Apply one player command (ignored outside active, uncaught play)
pub fn apply_command(state: &mut GameState, command: Command) {
    if state.phase != GamePhase::Playing || state.is_caught() {
        return;
    }
    let invisible = state.invisibility_active();
    let player = &mut state.player;
    match command {
        Command::Move(dir) => {
            let target = player.pos + dir.delta();
            // Enemies block the player unless invisibility lets them slip past
            let blocked = !state.stage.grid.is_floor(target)
                || (!invisible && state.enemies.iter().any(|e| e.pos == target));
            if !blocked {
                player.pos = target;
                player.moved_this_tick = true;
                player.last_move_tick = state.clock.now();
                // Moving breaks hiding
                player.hidden = false;
            }
        }
        Command::ToggleCrouch => player.crouching = !player.crouching,
        Command::SetCrouch(held) => player.crouching = held,
        Command::ToggleHide => {
            if state.stage.grid.has_adjacent_cover(player.pos) {
                player.hidden = !player.hidden;
            }
        }
        Command::StandUp => {
            player.crouching = false;
            player.hidden = false;
        }
        Command::UseAbility(kind) => {
            use_ability(state, kind);
        }
        Command::TogglePause => {}
    }
}

/// Stealth meter: drains on upright steps, recovers on crouched steps and while still
fn update_player(state: &mut GameState) {
    let player = &mut state.player;
    let delta = if player.moved_this_tick {
        if player.crouching {
            STEALTH_CROUCH_GAIN
        } else {
            -STEALTH_MOVE_DRAIN
        }
    } else {
        STEALTH_IDLE_REGEN_PER_SEC * SIM_DT
    };
    player.stealth_level = (player.stealth_level + delta).clamp(0.0, STEALTH_MAX);
}

fn collect_treasures(state: &mut GameState) {
    let player_pos = state.player.pos;
    let mut picked = Vec::new();
    for treasure in &mut state.treasures {
        if !treasure.collected && treasure.pos == player_pos {
            treasure.collected = true;
            picked.push(treasure.id);
        }
    }
    for id in picked {
        state.treasures_collected += 1;
        let remaining = state.total_treasures() - state.treasures_collected;
        log::info!("Treasure {} collected, {} remaining", id, remaining);
        state.events.push(GameEvent::TreasureCollected {
            treasure_id: id,
            remaining,
        });
    }
}

/// Enter a terminal phase and publish the summary
fn finish(state: &mut GameState, outcome: Outcome) {
    state.phase = match outcome {
        Outcome::Cleared => GamePhase::StageCleared,
        Outcome::Caught => GamePhase::GameOver,
    };
    state.pending_game_over = None;
    let summary = state.make_summary(outcome);
    log::info!(
        "Stage {} {:?}: rank {}, {} detections, {}",
        summary.stage,
        outcome,
        summary.rank.as_str(),
        summary.detections,
        crate::format_clock(summary.elapsed_ms)
    );
    state.summary = Some(summary);
    state.events.push(match outcome {
        Outcome::Cleared => GameEvent::StageCleared,
        Outcome::Caught => GameEvent::GameOver,
    });
}

/// Turns variable host frame times into fixed simulation steps
#[derive(Debug, Clone, Default)]
pub struct FrameDriver {
    accumulator: f32,
}

impl FrameDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run as many fixed ticks as `frame_dt` seconds allow. The input is
    /// consumed by the first tick; if no tick is due it waits for the next frame.
    pub fn advance(&mut self, state: &mut GameState, frame_dt: f32, input: &mut TickInput) -> u32 {
        self.accumulator += frame_dt.clamp(0.0, MAX_FRAME_TIME);

        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            tick(state, input);
            input.clear();
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        substeps
    }

    /// Drop any partial step (after a reset)
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::clock::{Countdown, ms_to_ticks};
    use crate::sim::grid::{Pos, pos};
    use crate::sim::state::{
        AiKind, EffectKind, Enemy, EnemyState, PatrolRoute, PendingGameOver, Rank,
    };
    use crate::tuning::Tuning;
    use proptest::prelude::*;

    fn guard_at(p: Pos) -> Enemy {
        Enemy {
            id: 500,
            pos: p,
            facing: Direction::West,
            state: EnemyState::Normal,
            ai: AiKind::Guard,
            vision_range: 3,
            hearing_range: 2,
            move_interval_ticks: 90,
            last_move_tick: 0,
            alert: Countdown::default(),
            patrol: PatrolRoute::default(),
        }
    }

    fn stage_one(seed: u64) -> GameState {
        let mut state = GameState::new(1, seed, Tuning::default());
        state.start();
        state
    }

    fn step(state: &mut GameState, command: Command) {
        tick(state, &TickInput::with(command));
    }

    fn idle(state: &mut GameState, ticks: u64) {
        for _ in 0..ticks {
            tick(state, &TickInput::default());
        }
    }

    #[test]
    fn test_start_phase_is_inert() {
        let mut state = GameState::new(1, 1, Tuning::default());
        idle(&mut state, 10);
        assert_eq!(state.clock.now(), 0);
        assert_eq!(state.phase, GamePhase::Start);
        state.start();
        idle(&mut state, 10);
        assert_eq!(state.clock.now(), 10);
    }

    #[test]
    fn test_walking_into_sight_ends_the_attempt() {
        let mut state = stage_one(8);
        state.enemies = vec![guard_at(pos(7, 1))];

        // (1,1) is 6 tiles away: safe
        idle(&mut state, 1);
        assert_eq!(state.player.detection_count, 0);

        // (2,1) is exactly 5 tiles away
        step(&mut state, Command::Move(Direction::East));
        assert_eq!(state.player.pos, pos(2, 1));
        assert_eq!(state.player.detection_count, 1);
        assert_eq!(state.enemies[0].state, EnemyState::Chasing);
        assert_eq!(state.phase, GamePhase::Playing);
        assert!(state.is_caught());

        // Input is ignored while caught
        step(&mut state, Command::Move(Direction::West));
        assert_eq!(state.player.pos, pos(2, 1));

        idle(&mut state, ms_to_ticks(GAME_OVER_DELAY_MS) - 2);
        assert_eq!(state.phase, GamePhase::Playing);
        idle(&mut state, 1);
        assert_eq!(state.phase, GamePhase::GameOver);
        assert_eq!(state.player.detection_count, 1);

        let summary = state.summary.clone().unwrap();
        assert_eq!(summary.rank, Rank::A);
        assert_eq!(summary.outcome, Outcome::Caught);
        assert!(state.drain_events().contains(&GameEvent::GameOver));
    }

    #[test]
    fn test_clear_requires_treasures_and_exit_together() {
        let mut state = stage_one(3);
        state.enemies.clear();
        state.treasures[0].pos = pos(2, 1);

        // Exit without the treasure does nothing
        state.player.pos = pos(17, 14);
        step(&mut state, Command::Move(Direction::East));
        assert_eq!(state.player.pos, state.stage.exit);
        assert_eq!(state.phase, GamePhase::Playing);

        // Grab the treasure
        state.player.pos = pos(1, 1);
        step(&mut state, Command::Move(Direction::East));
        assert_eq!(state.treasures_collected, 1);
        assert!(state.treasures[0].collected);
        assert_eq!(state.phase, GamePhase::Playing);

        // Now the exit clears the stage
        state.player.pos = pos(17, 14);
        step(&mut state, Command::Move(Direction::East));
        assert_eq!(state.phase, GamePhase::StageCleared);
        let summary = state.summary.clone().unwrap();
        assert_eq!(summary.rank, Rank::S);
        assert_eq!(summary.treasures_collected, 1);
    }

    #[test]
    fn test_pause_freezes_every_timer() {
        let mut state = stage_one(12);
        state.enemies = vec![guard_at(pos(7, 1))];
        step(&mut state, Command::Move(Direction::East));
        assert!(state.is_caught());
        let started = state.clock.now();
        state.player.abilities.decoy.cooldown.start(started, 600);

        let now = state.clock.now();
        let pending = state.pending_game_over;
        let cooldown = state.player.abilities.decoy.cooldown.remaining(now);
        let alert = state.enemies[0].alert;
        let last_move = state.enemies[0].last_move_tick;

        step(&mut state, Command::TogglePause);
        assert_eq!(state.phase, GamePhase::Paused);
        idle(&mut state, 10_000);

        assert_eq!(state.clock.now(), now);
        assert_eq!(state.pending_game_over, pending);
        assert_eq!(state.player.abilities.decoy.cooldown.remaining(state.clock.now()), cooldown);
        assert_eq!(state.enemies[0].alert, alert);
        assert_eq!(state.enemies[0].last_move_tick, last_move);
        assert_eq!(state.phase, GamePhase::Paused);

        // Resume and the countdown picks up where it left off
        step(&mut state, Command::TogglePause);
        assert_eq!(state.phase, GamePhase::Playing);
        assert_eq!(state.clock.now(), now + 1);
    }

    #[test]
    fn test_reset_cancels_pending_game_over() {
        let mut state = stage_one(8);
        state.enemies = vec![guard_at(pos(7, 1))];
        step(&mut state, Command::Move(Direction::East));
        assert!(state.is_caught());

        state.reset(9);
        state.enemies.clear();
        state.start();
        idle(&mut state, 1000);
        assert_eq!(state.phase, GamePhase::Playing);
        assert_eq!(state.player.detection_count, 0);
    }

    #[test]
    fn test_stale_pending_game_over_never_fires() {
        let mut state = stage_one(8);
        state.enemies.clear();
        state.pending_game_over = Some(PendingGameOver {
            fires_at: 1,
            attempt: state.attempt + 1,
        });
        idle(&mut state, 5);
        assert_eq!(state.phase, GamePhase::Playing);
        assert!(state.pending_game_over.is_none());
    }

    #[test]
    fn test_moves_into_walls_are_rejected() {
        let mut state = stage_one(2);
        state.enemies.clear();
        step(&mut state, Command::Move(Direction::North));
        assert_eq!(state.player.pos, pos(1, 1));
        step(&mut state, Command::Move(Direction::West));
        assert_eq!(state.player.pos, pos(1, 1));
        assert!(!state.player.moved_this_tick);
    }

    #[test]
    fn test_invisible_player_slips_past_enemies() {
        let mut state = stage_one(4);
        let mut blocker = guard_at(pos(2, 1));
        blocker.move_interval_ticks = 100_000;
        state.enemies = vec![blocker];
        state.add_effect(EffectKind::Invisibility, None, INVISIBILITY_DURATION_MS);

        step(&mut state, Command::Move(Direction::East));
        assert_eq!(state.player.pos, pos(2, 1));
        assert_eq!(state.player.detection_count, 0);

        step(&mut state, Command::Move(Direction::East));
        assert_eq!(state.player.pos, pos(3, 1));
        assert_eq!(state.player.detection_count, 0);
    }

    #[test]
    fn test_visible_player_is_blocked_by_enemies() {
        let mut state = stage_one(4);
        state.player.hidden = true;
        state.enemies = vec![guard_at(pos(1, 2))];
        step(&mut state, Command::Move(Direction::South));
        assert_eq!(state.player.pos, pos(1, 1));
    }

    #[test]
    fn test_hide_needs_cover_and_moving_breaks_it() {
        let mut state = stage_one(2);
        state.enemies.clear();
        // (1,1) touches the outer wall
        step(&mut state, Command::ToggleHide);
        assert!(state.player.hidden);
        step(&mut state, Command::Move(Direction::South));
        assert!(!state.player.hidden);

        // Open floor: no cover
        state.player.pos = pos(4, 4);
        step(&mut state, Command::ToggleHide);
        assert!(!state.player.hidden);
    }

    #[test]
    fn test_stealth_meter_rates() {
        let mut state = stage_one(2);
        state.enemies.clear();
        step(&mut state, Command::Move(Direction::South));
        assert!((state.player.stealth_level - 99.0).abs() < 1e-4);

        step(&mut state, Command::ToggleCrouch);
        step(&mut state, Command::Move(Direction::South));
        assert!(state.player.stealth_level > 99.0);

        state.player.stealth_level = 50.0;
        idle(&mut state, u64::from(SIM_HZ));
        assert!((state.player.stealth_level - 62.0).abs() < 1e-2);
    }

    #[test]
    fn test_frame_driver_substeps() {
        let mut state = stage_one(2);
        state.enemies.clear();
        let mut driver = FrameDriver::new();
        let mut input = TickInput::with(Command::Move(Direction::East));

        // Half a tick: nothing runs, input is kept
        assert_eq!(driver.advance(&mut state, SIM_DT * 0.5, &mut input), 0);
        assert!(!input.is_empty());

        assert_eq!(driver.advance(&mut state, SIM_DT * 0.6, &mut input), 1);
        assert!(input.is_empty());
        assert_eq!(state.player.pos, pos(2, 1));

        // Huge frames are clamped
        let steps = driver.advance(&mut state, 5.0, &mut input);
        assert!(steps <= MAX_SUBSTEPS);
    }

    fn command() -> impl Strategy<Value = Command> {
        prop_oneof![
            6 => (0usize..4).prop_map(|i| Command::Move(Direction::from_index(i))),
            1 => Just(Command::ToggleCrouch),
            1 => Just(Command::ToggleHide),
            1 => Just(Command::StandUp),
            1 => (0usize..3).prop_map(|i| Command::UseAbility(AbilityKind::ALL[i])),
            1 => Just(Command::TogglePause),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Nobody ever stands on a non-floor tile, detections never go down,
        /// and a clear always means every treasure plus the exit.
        #[test]
        fn prop_simulation_invariants(
            stage in 1u8..=5,
            seed in any::<u64>(),
            commands in prop::collection::vec(command(), 0..300),
        ) {
            let mut state = GameState::new(stage, seed, Tuning::default());
            state.start();
            let mut detections = 0;
            for command in commands {
                tick(&mut state, &TickInput::with(command));
                idle(&mut state, 3);

                prop_assert!(state.stage.grid.is_floor(state.player.pos));
                for (i, enemy) in state.enemies.iter().enumerate() {
                    prop_assert!(state.stage.grid.is_floor(enemy.pos));
                    prop_assert!(state.enemies[..i].iter().all(|other| other.pos != enemy.pos));
                }
                prop_assert!(state.player.detection_count >= detections);
                prop_assert!(state.player.detection_count <= 1);
                detections = state.player.detection_count;
                if state.phase == GamePhase::StageCleared {
                    prop_assert!(state.all_treasures_collected());
                    prop_assert_eq!(state.player.pos, state.stage.exit);
                }
                if state.phase.is_terminal() {
                    break;
                }
            }
        }

        /// While paused, no timer-driven field changes.
        #[test]
        fn prop_pause_is_a_full_freeze(
            seed in any::<u64>(),
            warmup in 0u64..200,
            paused_for in 1u64..2000,
        ) {
            let mut state = GameState::new(5, seed, Tuning::default());
            state.start();
            step(&mut state, Command::UseAbility(AbilityKind::Smoke));
            idle(&mut state, warmup);
            if state.phase != GamePhase::Playing {
                return Ok(());
            }
            step(&mut state, Command::TogglePause);
            let before = serde_json::to_string(&state).unwrap();
            idle(&mut state, paused_for);
            let after = serde_json::to_string(&state).unwrap();
            prop_assert_eq!(before, after);
        }
    }
}
