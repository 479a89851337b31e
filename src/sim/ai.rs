//! Enemy movement policies
//!
//! Each enemy carries its own move timer; an enemy acts only on ticks where
//! its interval has elapsed, independent of the global tick rate.

use rand::Rng;

use super::grid::{Direction, Pos};
use super::state::{AiKind, EnemyState, GameState};

/// Advance every enemy whose move timer is due, then decay alert timers
pub fn update_enemies(state: &mut GameState) {
    let now = state.clock.now();

    for i in 0..state.enemies.len() {
        let due = {
            let enemy = &state.enemies[i];
            now.saturating_sub(enemy.last_move_tick) >= enemy.move_interval_ticks
        };
        if due {
            step_enemy(state, i);
            state.enemies[i].last_move_tick = now;
        }

        let enemy = &mut state.enemies[i];
        if enemy.state != EnemyState::Normal && enemy.alert.has_expired(now) {
            log::debug!("Enemy {} calmed down", enemy.id);
            enemy.state = EnemyState::Normal;
            enemy.alert.cancel();
        }
    }
}

/// Can enemy `index` step onto `target`
fn is_open_for(state: &GameState, index: usize, target: Pos) -> bool {
    state.stage.grid.is_floor(target)
        && target != state.player.pos
        && !state
            .enemies
            .iter()
            .enumerate()
            .any(|(j, other)| j != index && other.pos == target)
}

/// Run one movement decision for enemy `index`
fn step_enemy(state: &mut GameState, index: usize) {
    let ai = state.enemies[index].ai;
    match ai {
        AiKind::Patrol => step_patrol(state, index),
        AiKind::Guard => {
            if state.rng.random_bool(state.tuning.guard_turn_chance) {
                let enemy = &mut state.enemies[index];
                enemy.facing = enemy.facing.clockwise();
            }
        }
        AiKind::Random => {
            let dir = Direction::from_index(state.rng.random_range(0..4));
            let target = state.enemies[index].pos + dir.delta();
            let open = is_open_for(state, index, target);
            let enemy = &mut state.enemies[index];
            enemy.facing = dir;
            if open {
                enemy.pos = target;
            }
        }
    }
}

/// Walk toward the current waypoint; back off along the route when blocked
fn step_patrol(state: &mut GameState, index: usize) {
    let enemy = &mut state.enemies[index];
    if enemy.patrol.current() == Some(enemy.pos) {
        enemy.patrol.advance();
    }
    let Some(waypoint) = enemy.patrol.current() else {
        return;
    };

    let delta = waypoint - enemy.pos;
    let step = if delta.x != 0 {
        Pos::new(delta.x.signum(), 0)
    } else {
        Pos::new(0, delta.y.signum())
    };
    if step == Pos::ZERO {
        return;
    }

    let target = enemy.pos + step;
    let open = is_open_for(state, index, target);
    let enemy = &mut state.enemies[index];
    if let Some(dir) = Direction::from_step(step) {
        enemy.facing = dir;
    }
    if open {
        enemy.pos = target;
    } else {
        enemy.patrol.retreat();
    }
}
