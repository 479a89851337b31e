//! Stage generation: terrain, treasure spots and enemy roster
//!
//! Random placements use a bounded number of draws and then fall back to the
//! free tile nearest the last draw, so dense stages can never hang.

use std::ops::Range;

use rand::Rng;

use super::grid::{Direction, Grid, Pos, TileKind, chebyshev, manhattan, pos};
use super::state::{AiKind, Stage};
use crate::consts::*;
use crate::tuning::Tuning;

/// Fixed per-stage parameters
#[derive(Debug, Clone, Copy)]
pub struct StageSpec {
    pub name: &'static str,
    pub enemies: usize,
    pub treasures: usize,
    pub exit: (i32, i32),
}

/// Stage table, indexed by stage number - 1
pub const STAGES: [StageSpec; 5] = [
    StageSpec {
        name: "Training Hall",
        enemies: 1,
        treasures: 1,
        exit: (18, 14),
    },
    StageSpec {
        name: "Garden Infiltration",
        enemies: 2,
        treasures: 2,
        exit: (8, 14),
    },
    StageSpec {
        name: "Warehouse Treasure",
        enemies: 3,
        treasures: 3,
        exit: (18, 8),
    },
    StageSpec {
        name: "Inner Chambers",
        enemies: 3,
        treasures: 4,
        exit: (2, 14),
    },
    StageSpec {
        name: "Castle Keep",
        enemies: 5,
        treasures: 5,
        exit: (12, 2),
    },
];

/// Look up a stage (clamped to the valid range)
pub fn stage_spec(stage: u8) -> &'static StageSpec {
    let index = stage.clamp(FIRST_STAGE, MAX_STAGE) - FIRST_STAGE;
    &STAGES[index as usize]
}

/// Build the terrain for a stage.
///
/// The player start (1,1) and the exit are always floor, and every random
/// obstacle keeps the exit reachable from the start.
pub fn generate_stage<R: Rng>(stage: u8, width: i32, height: i32, rng: &mut R) -> Stage {
    let spec = stage_spec(stage);
    let width = width.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE);
    let height = height.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE);
    let start = pos(PLAYER_START.0, PLAYER_START.1);
    let exit = pos(spec.exit.0, spec.exit.1).clamp(pos(1, 1), pos(width - 2, height - 2));

    let mut grid = Grid::walled(width, height);
    match stage.clamp(FIRST_STAGE, MAX_STAGE) {
        1 => {
            for (x, y) in [(8, 5), (12, 7), (15, 3)] {
                grid.set(pos(x, y), TileKind::Box);
            }
        }
        2 => {
            scatter_obstacles(&mut grid, 8, start, exit, rng, |_| TileKind::Bush);
        }
        3 => {
            scatter_obstacles(&mut grid, 15, start, exit, rng, |_| TileKind::Box);
        }
        4 => {
            for y in 5..10 {
                grid.set(pos(8, y), TileKind::Wall);
                grid.set(pos(12, y), TileKind::Wall);
            }
            for x in 5..15 {
                grid.set(pos(x, 8), TileKind::Wall);
            }
            for (x, y) in [(8, 7), (10, 8), (12, 7)] {
                grid.set(pos(x, y), TileKind::Floor);
            }
            for (x, y) in [(5, 3), (6, 12), (15, 6), (3, 11)] {
                grid.set(pos(x, y), TileKind::Box);
            }
        }
        _ => {
            for y in 3..13 {
                grid.set(pos(6, y), TileKind::Wall);
                grid.set(pos(14, y), TileKind::Wall);
            }
            for x in 3..17 {
                grid.set(pos(x, 6), TileKind::Wall);
                grid.set(pos(x, 10), TileKind::Wall);
            }
            for (x, y) in [(6, 5), (6, 8), (9, 6), (11, 10), (14, 5), (14, 11)] {
                grid.set(pos(x, y), TileKind::Floor);
            }
            scatter_obstacles(&mut grid, 10, start, exit, rng, |rng| {
                if rng.random_bool(0.5) {
                    TileKind::Box
                } else {
                    TileKind::Pillar
                }
            });
        }
    }

    grid.set(start, TileKind::Floor);
    grid.set(exit, TileKind::Floor);

    Stage {
        number: stage.clamp(FIRST_STAGE, MAX_STAGE),
        name: spec.name.to_string(),
        grid,
        exit,
        treasure_target: spec.treasures,
        enemy_count: spec.enemies,
    }
}

/// Interior sampling window used for obstacles and treasures
fn obstacle_window(grid: &Grid) -> (Range<i32>, Range<i32>) {
    (2..grid.width() - 2, 2..grid.height() - 2)
}

/// Place `count` obstacles on floor tiles, never on start/exit and never cutting the exit off
fn scatter_obstacles<R: Rng>(
    grid: &mut Grid,
    count: usize,
    start: Pos,
    exit: Pos,
    rng: &mut R,
    mut kind: impl FnMut(&mut R) -> TileKind,
) {
    let (xs, ys) = obstacle_window(grid);
    for _ in 0..count {
        let tile = kind(rng);
        let spot = sample_tile(rng, xs.clone(), ys.clone(), |p| {
            if p == start || p == exit || !grid.is_floor(p) {
                return false;
            }
            let mut trial = grid.clone();
            trial.set(p, tile);
            trial.is_connected(start, exit)
        });
        match spot {
            Some(p) => grid.set(p, tile),
            None => log::debug!("No room left for {:?}, skipping", tile),
        }
    }
}

/// Draw random tiles until `accept` passes; after the budget, take the
/// accepted tile nearest to the last draw (row-major tiebreak).
pub fn sample_tile<R: Rng>(
    rng: &mut R,
    xs: Range<i32>,
    ys: Range<i32>,
    accept: impl Fn(Pos) -> bool,
) -> Option<Pos> {
    if xs.is_empty() || ys.is_empty() {
        return None;
    }

    let mut last = pos(xs.start, ys.start);
    for _ in 0..PLACEMENT_ATTEMPTS {
        let p = pos(rng.random_range(xs.clone()), rng.random_range(ys.clone()));
        if accept(p) {
            return Some(p);
        }
        last = p;
    }

    log::debug!(
        "Placement budget exhausted near ({}, {}), scanning for nearest free tile",
        last.x,
        last.y
    );
    ys.flat_map(|y| xs.clone().map(move |x| pos(x, y)))
        .filter(|&p| accept(p))
        .min_by_key(|&p| (manhattan(p, last), p.y, p.x))
}

/// Pick treasure spots: reachable floor, not start, not exit, all distinct
pub fn place_treasures<R: Rng>(stage: &Stage, start: Pos, count: usize, rng: &mut R) -> Vec<Pos> {
    let grid = &stage.grid;
    let reachable = grid.reachable_from(start);
    let (xs, ys) = obstacle_window(grid);
    let mut spots: Vec<Pos> = Vec::with_capacity(count);

    for _ in 0..count {
        let spot = sample_tile(rng, xs.clone(), ys.clone(), |p| {
            grid.is_floor(p)
                && grid.mask_contains(&reachable, p)
                && p != start
                && p != stage.exit
                && !spots.contains(&p)
        });
        match spot {
            Some(p) => spots.push(p),
            None => log::warn!("Stage {}: no free tile for treasure", stage.number),
        }
    }
    spots
}

/// Everything needed to spawn one enemy
#[derive(Debug, Clone)]
pub struct EnemySpec {
    pub pos: Pos,
    pub facing: Direction,
    pub ai: AiKind,
    pub vision_range: i32,
    pub hearing_range: i32,
    pub move_interval_ms: u32,
    pub patrol_path: Vec<Pos>,
}

/// Roll the enemy roster for a stage
pub fn place_enemies<R: Rng>(
    stage: &Stage,
    start: Pos,
    treasures: &[Pos],
    tuning: &Tuning,
    rng: &mut R,
) -> Vec<EnemySpec> {
    let grid = &stage.grid;
    let xs = 3..grid.width() - 3;
    let ys = 3..grid.height() - 3;
    let mut roster: Vec<EnemySpec> = Vec::with_capacity(stage.enemy_count);

    for i in 0..stage.enemy_count {
        let spot = sample_tile(rng, xs.clone(), ys.clone(), |p| {
            grid.is_floor(p)
                && p != stage.exit
                && chebyshev(p, start) >= ENEMY_SPAWN_CLEARANCE
                && !treasures.iter().any(|&t| chebyshev(t, p) <= 1)
                && !roster.iter().any(|e| e.pos == p)
        });
        let Some(spawn) = spot else {
            log::warn!("Stage {}: no free tile for enemy {}", stage.number, i + 1);
            continue;
        };

        let mut ai = AiKind::CYCLE[i % AiKind::CYCLE.len()];
        if stage.number >= 4 && rng.random_bool(tuning.late_stage_random_bias) {
            ai = AiKind::Random;
        }

        let facing = Direction::from_index(rng.random_range(0..4));
        let move_interval_ms = ENEMY_MOVE_INTERVAL_MIN_MS
            + rng.random_range(0..ENEMY_MOVE_INTERVAL_SPREAD_MS)
            + tuning.platform.move_interval_bonus_ms();
        let patrol_path = if ai == AiKind::Patrol {
            generate_patrol_path(grid, spawn, rng)
        } else {
            Vec::new()
        };

        log::debug!(
            "Enemy {} at ({}, {}): {:?}, facing {:?}, every {}ms",
            i + 1,
            spawn.x,
            spawn.y,
            ai,
            facing,
            move_interval_ms
        );

        roster.push(EnemySpec {
            pos: spawn,
            facing,
            ai,
            vision_range: tuning.vision_range(stage.number),
            hearing_range: HEARING_RANGE,
            move_interval_ms,
            patrol_path,
        });
    }
    roster
}

/// Short random walk of two-tile hops landing on floor, starting at `start`
pub fn generate_patrol_path<R: Rng>(grid: &Grid, start: Pos, rng: &mut R) -> Vec<Pos> {
    let length = rng.random_range(3..=5);
    let mut path = vec![start];
    let mut current = start;

    for _ in 1..length {
        let options: Vec<Pos> = Direction::ALL
            .iter()
            .map(|d| current + d.delta() * 2)
            .filter(|&p| grid.is_floor(p))
            .collect();
        if options.is_empty() {
            continue;
        }
        current = options[rng.random_range(0..options.len())];
        path.push(current);
    }
    path
}
