//! Campaign session
//!
//! Owns the active stage attempt, the frame driver and the persisted
//! progress, and moves the player between stages.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use thiserror::Error;

use crate::consts::{FIRST_STAGE, MAX_STAGE};
use crate::persistence::{KeyValueStore, Progress};
use crate::sim::{FrameDriver, GameEvent, GamePhase, GameState, TickInput, toggle_pause};
use crate::tuning::Tuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("stage {0} is locked")]
    StageLocked(u8),
    #[error("stage {0} does not exist")]
    InvalidStage(u8),
    #[error("no stage is loaded")]
    NoActiveStage,
}

/// Result of asking for the next stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStage {
    Started(u8),
    CampaignComplete,
}

pub struct Session<S: KeyValueStore> {
    store: S,
    progress: Progress,
    tuning: Tuning,
    /// Derives a fresh seed for every attempt
    seeds: Pcg32,
    game: Option<GameState>,
    driver: FrameDriver,
    /// Phase seen at the end of the previous frame (for save-on-clear)
    last_phase: GamePhase,
}

impl<S: KeyValueStore> Session<S> {
    pub fn new(store: S, tuning: Tuning, seed: u64) -> Self {
        let progress = Progress::load(&store);
        Self {
            store,
            progress,
            tuning,
            seeds: Pcg32::seed_from_u64(seed),
            game: None,
            driver: FrameDriver::new(),
            last_phase: GamePhase::Start,
        }
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn game(&self) -> Option<&GameState> {
        self.game.as_ref()
    }

    /// Number of the loaded stage
    pub fn current_stage(&self) -> Option<u8> {
        self.game.as_ref().map(|g| g.stage.number)
    }

    /// Take the events produced since the last call
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.game
            .as_mut()
            .map(GameState::drain_events)
            .unwrap_or_default()
    }

    /// Begin the campaign from the first stage
    pub fn start_mission(&mut self) {
        self.load_stage(FIRST_STAGE);
    }

    /// Jump to any unlocked stage
    pub fn select_stage(&mut self, stage: u8) -> Result<(), SessionError> {
        if !(FIRST_STAGE..=MAX_STAGE).contains(&stage) {
            return Err(SessionError::InvalidStage(stage));
        }
        if !self.progress.is_unlocked(stage) {
            return Err(SessionError::StageLocked(stage));
        }
        self.load_stage(stage);
        Ok(())
    }

    /// Fresh attempt at the current stage; cancels any pending game over
    pub fn restart_stage(&mut self) -> Result<(), SessionError> {
        let seed = self.seeds.random::<u64>();
        let game = self.game.as_mut().ok_or(SessionError::NoActiveStage)?;
        game.reset(seed);
        game.start();
        log::info!("Restarting stage {} (attempt {})", game.stage.number, game.attempt);
        self.driver.reset();
        self.last_phase = game.phase;
        Ok(())
    }

    /// Advance to the stage after the current one
    pub fn next_stage(&mut self) -> Result<NextStage, SessionError> {
        let current = self.current_stage().ok_or(SessionError::NoActiveStage)?;
        if current >= MAX_STAGE {
            log::info!("Campaign complete");
            return Ok(NextStage::CampaignComplete);
        }
        let next = current + 1;
        self.select_stage(next)?;
        Ok(NextStage::Started(next))
    }

    pub fn toggle_pause(&mut self) -> Result<bool, SessionError> {
        let game = self.game.as_mut().ok_or(SessionError::NoActiveStage)?;
        let toggled = toggle_pause(game);
        self.last_phase = game.phase;
        Ok(toggled)
    }

    /// Feed one host frame. Returns the number of fixed ticks that ran.
    pub fn advance(&mut self, frame_secs: f32, input: &mut TickInput) -> Result<u32, SessionError> {
        let game = self.game.as_mut().ok_or(SessionError::NoActiveStage)?;
        let substeps = self.driver.advance(game, frame_secs, input);

        // Record the clear once, on the frame the stage ends
        let phase = game.phase;
        if phase != self.last_phase && phase == GamePhase::StageCleared {
            if let Some(summary) = game.summary.clone() {
                self.progress.record_clear(&summary);
                if let Err(e) = self.progress.save(&mut self.store) {
                    log::warn!("Could not save progress: {}", e);
                }
            }
        }
        self.last_phase = phase;
        Ok(substeps)
    }

    fn load_stage(&mut self, stage: u8) {
        let seed = self.seeds.random::<u64>();
        let mut game = GameState::new(stage, seed, self.tuning.clone());
        game.start();
        log::info!("Starting stage {} with seed {}", stage, seed);
        self.last_phase = game.phase;
        self.game = Some(game);
        self.driver.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::persistence::{MemoryStore, PROGRESS_KEY};
    use crate::sim::grid::pos;
    use crate::sim::{Command, Direction, Rank, TileKind};

    fn session() -> Session<MemoryStore> {
        Session::new(MemoryStore::new(), Tuning::default(), 77)
    }

    /// Put the player one step west of a collected-everything exit
    fn stage_ready_to_clear(session: &mut Session<MemoryStore>) {
        let game = session.game.as_mut().unwrap();
        game.enemies.clear();
        for treasure in &mut game.treasures {
            treasure.collected = true;
        }
        game.treasures_collected = game.treasures.len();
        let exit = game.stage.exit;
        game.player.pos = exit - pos(1, 0);
        game.stage.grid.set(game.player.pos, TileKind::Floor);
    }

    fn step_east(session: &mut Session<MemoryStore>) {
        let mut input = TickInput::with(Command::Move(Direction::East));
        session.advance(SIM_DT * 1.01, &mut input).unwrap();
    }

    #[test]
    fn test_no_stage_before_start() {
        let mut s = session();
        let mut input = TickInput::default();
        assert_eq!(s.advance(0.1, &mut input), Err(SessionError::NoActiveStage));
        assert_eq!(s.restart_stage(), Err(SessionError::NoActiveStage));
        assert_eq!(s.next_stage(), Err(SessionError::NoActiveStage));
        assert!(s.drain_events().is_empty());
    }

    #[test]
    fn test_start_mission_loads_stage_one() {
        let mut s = session();
        s.start_mission();
        assert_eq!(s.current_stage(), Some(1));
        assert_eq!(s.game().unwrap().phase, GamePhase::Playing);
        assert_eq!(s.drain_events(), vec![GameEvent::StageStarted { stage: 1 }]);
    }

    #[test]
    fn test_select_stage_checks_lock_and_range() {
        let mut s = session();
        assert_eq!(s.select_stage(0), Err(SessionError::InvalidStage(0)));
        assert_eq!(s.select_stage(6), Err(SessionError::InvalidStage(6)));
        assert_eq!(s.select_stage(2), Err(SessionError::StageLocked(2)));
        assert_eq!(s.select_stage(1), Ok(()));
    }

    #[test]
    fn test_clear_unlocks_and_persists_once() {
        let mut s = session();
        s.start_mission();
        stage_ready_to_clear(&mut s);
        step_east(&mut s);

        let game = s.game().unwrap();
        assert_eq!(game.phase, GamePhase::StageCleared);
        assert_eq!(s.progress().max_unlocked_stage, 2);
        let stats = s.progress().stats(1).unwrap();
        assert_eq!(stats.best_rank, Rank::S);

        // Stored JSON matches in-memory progress
        let stored = s.store().get(PROGRESS_KEY).unwrap().unwrap();
        let reloaded: Progress = serde_json::from_str(&stored).unwrap();
        assert_eq!(&reloaded, s.progress());

        // Further frames do not record again
        let saved_time = stats.best_time;
        s.advance(1.0, &mut TickInput::default()).unwrap();
        assert_eq!(s.progress().stats(1).unwrap().best_time, saved_time);

        assert_eq!(s.next_stage(), Ok(NextStage::Started(2)));
        assert_eq!(s.current_stage(), Some(2));
    }

    #[test]
    fn test_next_stage_requires_unlock() {
        let mut s = session();
        s.start_mission();
        assert_eq!(s.next_stage(), Err(SessionError::StageLocked(2)));
    }

    #[test]
    fn test_final_stage_completes_campaign() {
        let mut store = MemoryStore::new();
        store
            .set(PROGRESS_KEY, r#"{"maxUnlockedStage":5,"stageStats":{}}"#)
            .unwrap();
        let mut s = Session::new(store, Tuning::default(), 5);
        s.select_stage(5).unwrap();
        stage_ready_to_clear(&mut s);
        step_east(&mut s);
        assert_eq!(s.game().unwrap().phase, GamePhase::StageCleared);
        assert_eq!(s.progress().max_unlocked_stage, 5);
        assert_eq!(s.next_stage(), Ok(NextStage::CampaignComplete));
    }

    #[test]
    fn test_restart_cancels_pending_game_over() {
        let mut s = session();
        s.start_mission();
        {
            let game = s.game.as_mut().unwrap();
            let fires_at = game.clock.now() + 5;
            game.pending_game_over = Some(crate::sim::state::PendingGameOver {
                fires_at,
                attempt: game.attempt,
            });
        }
        s.restart_stage().unwrap();
        s.game.as_mut().unwrap().enemies.clear();

        for _ in 0..20 {
            s.advance(0.1, &mut TickInput::default()).unwrap();
        }
        let game = s.game().unwrap();
        assert_eq!(game.phase, GamePhase::Playing);
        assert_eq!(game.attempt, 1);
    }

    #[test]
    fn test_toggle_pause() {
        let mut s = session();
        assert_eq!(s.toggle_pause(), Err(SessionError::NoActiveStage));
        s.start_mission();
        s.game.as_mut().unwrap().enemies.clear();
        assert_eq!(s.toggle_pause(), Ok(true));
        s.advance(0.1, &mut TickInput::default()).unwrap();
        assert_eq!(s.game().unwrap().clock.now(), 0);
        assert_eq!(s.toggle_pause(), Ok(true));
        s.advance(0.1, &mut TickInput::default()).unwrap();
        assert!(s.game().unwrap().clock.now() > 0);
    }
}
