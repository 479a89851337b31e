//! Shinobi Stealth entry point
//!
//! The browser build is driven by the host page through `platform::web`.
//! Natively this runs a headless campaign with a simple path-following bot,
//! which is handy for watching the simulation in the logs.

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::collections::VecDeque;

    use shinobi_stealth::consts::MAX_STAGE;
    use shinobi_stealth::sim::{Command, Direction, GamePhase, GameState, Pos, TickInput};
    use shinobi_stealth::{MemoryStore, NextStage, Session, Tuning};

    /// Seconds per bot decision
    const BOT_FRAME: f32 = 0.25;
    /// Give up on an attempt after this much play time
    const ATTEMPT_LIMIT_MS: u64 = 180_000;
    const ATTEMPTS_PER_STAGE: u32 = 3;

    /// First step of a shortest floor path from `from` to `to`, avoiding enemies
    fn first_step(game: &GameState, from: Pos, to: Pos) -> Option<Direction> {
        let grid = &game.stage.grid;
        let width = grid.width();
        let index = |p: Pos| (p.y * width + p.x) as usize;
        let mut came_from: Vec<Option<Direction>> = vec![None; (width * grid.height()) as usize];
        let mut queue = VecDeque::from([from]);
        let mut seen = vec![false; came_from.len()];
        seen[index(from)] = true;

        while let Some(p) = queue.pop_front() {
            if p == to {
                return came_from[index(p)];
            }
            for dir in Direction::ALL {
                let next = p + dir.delta();
                if !grid.is_floor(next) || seen[index(next)] || game.enemy_at(next).is_some() {
                    continue;
                }
                seen[index(next)] = true;
                came_from[index(next)] = came_from[index(p)].or(Some(dir));
                queue.push_back(next);
            }
        }
        None
    }

    /// Nearest uncollected treasure, or the exit once the bag is full
    fn objective(game: &GameState) -> Pos {
        let player = game.player.pos;
        game.treasures
            .iter()
            .filter(|t| !t.collected)
            .min_by_key(|t| (t.pos - player).abs().element_sum())
            .map(|t| t.pos)
            .unwrap_or(game.stage.exit)
    }

    /// Play one attempt to its end. Returns the final phase.
    fn play_attempt(session: &mut Session<MemoryStore>) -> GamePhase {
        let mut input = TickInput::with(Command::SetCrouch(true));
        loop {
            let Some(game) = session.game() else {
                return GamePhase::Start;
            };
            if game.phase.is_terminal() || game.clock.elapsed_ms() > ATTEMPT_LIMIT_MS {
                return game.phase;
            }
            if let Some(dir) = first_step(game, game.player.pos, objective(game)) {
                input.push(Command::Move(dir));
            }
            if let Err(e) = session.advance(BOT_FRAME, &mut input) {
                log::error!("{}", e);
                return GamePhase::Start;
            }
            input.clear();
            for event in session.drain_events() {
                log::debug!("{:?}", event);
            }
        }
    }

    pub fn run(seed: u64) {
        let mut session = Session::new(MemoryStore::new(), Tuning::default(), seed);
        session.start_mission();

        loop {
            let mut cleared = false;
            for _ in 0..ATTEMPTS_PER_STAGE {
                let phase = play_attempt(&mut session);
                if let Some(summary) = session.game().and_then(|g| g.summary.as_ref()) {
                    println!(
                        "Stage {}: {:?} in {} (rank {}, {}/{} treasures)",
                        summary.stage,
                        summary.outcome,
                        shinobi_stealth::format_clock(summary.elapsed_ms),
                        summary.rank.as_str(),
                        summary.treasures_collected,
                        summary.total_treasures
                    );
                }
                if phase == GamePhase::StageCleared {
                    cleared = true;
                    break;
                }
                if session.restart_stage().is_err() {
                    return;
                }
            }

            if !cleared {
                println!("Bot gave up on stage {:?}", session.current_stage());
                break;
            }
            match session.next_stage() {
                Ok(NextStage::Started(_)) => {}
                Ok(NextStage::CampaignComplete) => {
                    println!("Campaign complete");
                    break;
                }
                Err(e) => {
                    log::error!("{}", e);
                    break;
                }
            }
        }

        let progress = session.progress();
        println!(
            "Unlocked up to stage {} of {}",
            progress.max_unlocked_stage, MAX_STAGE
        );
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Shinobi Stealth (native) starting...");

    let seed = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0x5EED);
    headless::run(seed);
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is platform::web::start, this is just to satisfy the compiler
}
