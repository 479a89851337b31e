//! Enemy senses and the detection state machine
//!
//! Per enemy: `Normal -> Alert` on hearing (timed), `Normal|Alert -> Chasing`
//! on sight. The first sighting seals the attempt: the player's detection
//! count goes up once and a game over is scheduled against the sim clock.

use super::clock::ms_to_ticks;
use super::grid::{Direction, Grid, Pos, euclidean, manhattan};
use super::state::{
    AlertLevel, Effect, EffectKind, Enemy, EnemyState, GameEvent, GameState, PendingGameOver,
};
use crate::consts::*;
use crate::tuning::VisionModel;

/// Geometric vision test, ignoring stealth modifiers
pub fn in_sight(model: VisionModel, grid: &Grid, enemy: &Enemy, target: Pos) -> bool {
    let distance = euclidean(enemy.pos, target);
    match model {
        VisionModel::Radius { radius } => distance <= radius,
        VisionModel::Cone { half_angle_deg } => {
            if target == enemy.pos {
                return true;
            }
            if distance > enemy.vision_range as f32 {
                return false;
            }
            let facing = enemy.facing.delta().as_vec2();
            let to_target = (target - enemy.pos).as_vec2().normalize_or_zero();
            let min_cos = half_angle_deg.to_radians().cos();
            facing.dot(to_target) >= min_cos - 1e-5 && grid.line_of_sight(enemy.pos, target)
        }
    }
}

/// Smoke clouds currently on the map (centre, radius)
fn active_smoke(state: &GameState) -> Vec<(Pos, f32)> {
    let now = state.clock.now();
    state
        .effects
        .iter()
        .filter(|e| e.is_active(now))
        .filter_map(|e: &Effect| match (e.kind, e.pos) {
            (EffectKind::Smoke { radius }, Some(p)) => Some((p, radius)),
            _ => None,
        })
        .collect()
}

/// Decoys currently on the map
fn active_decoys(state: &GameState) -> Vec<Pos> {
    let now = state.clock.now();
    state
        .effects
        .iter()
        .filter(|e| e.is_active(now) && e.kind == EffectKind::Decoy)
        .filter_map(|e| e.pos)
        .collect()
}

fn in_smoke(smoke: &[(Pos, f32)], p: Pos) -> bool {
    smoke.iter().any(|&(c, r)| euclidean(c, p) <= r)
}

/// Can enemy `index` see the player right now (all modifiers applied)
pub fn sees_player(state: &GameState, index: usize) -> bool {
    let enemy = &state.enemies[index];
    let player = &state.player;
    if player.hidden || state.invisibility_active() {
        return false;
    }
    if state.tuning.smoke_blocks_vision {
        let smoke = active_smoke(state);
        if in_smoke(&smoke, enemy.pos) || in_smoke(&smoke, player.pos) {
            return false;
        }
    }
    in_sight(state.tuning.vision, &state.stage.grid, enemy, player.pos)
}

/// A decoy enemy `index` is looking at, if any
fn spotted_decoy(state: &GameState, index: usize, smoke: &[(Pos, f32)]) -> Option<Pos> {
    if !state.tuning.decoy_draws_vision {
        return None;
    }
    let enemy = &state.enemies[index];
    if state.tuning.smoke_blocks_vision && in_smoke(smoke, enemy.pos) {
        return None;
    }
    active_decoys(state)
        .into_iter()
        .filter(|&d| !(state.tuning.smoke_blocks_vision && in_smoke(smoke, d)))
        .find(|&d| in_sight(state.tuning.vision, &state.stage.grid, enemy, d))
}

/// Can enemy `index` hear the player this tick
pub fn hears_player(state: &GameState, index: usize) -> bool {
    let enemy = &state.enemies[index];
    let player = &state.player;
    player.moved_this_tick
        && !player.crouching
        && manhattan(enemy.pos, player.pos) <= enemy.hearing_range
}

/// Evaluate every enemy's senses and apply state transitions
pub fn update_detection(state: &mut GameState) {
    let now = state.clock.now();
    let smoke = if state.tuning.smoke_blocks_vision {
        active_smoke(state)
    } else {
        Vec::new()
    };
    let mut spotter: Option<usize> = None;

    for i in 0..state.enemies.len() {
        if !state.is_caught() && spotter.is_none() && state.enemies[i].state != EnemyState::Chasing
        {
            if let Some(decoy) = spotted_decoy(state, i, &smoke) {
                distract(state, i, decoy);
            } else if sees_player(state, i) {
                spotter = Some(i);
            }
        }

        if state.enemies[i].state == EnemyState::Normal && !state.is_caught() && hears_player(state, i)
        {
            let enemy = &mut state.enemies[i];
            enemy.state = EnemyState::Alert;
            enemy.alert.start(now, ms_to_ticks(HEARD_ALERT_MS));
            let (id, at) = (enemy.id, enemy.pos);
            log::debug!("Enemy {} heard footsteps", id);
            state.events.push(GameEvent::NoiseHeard { enemy_id: id });
            state.add_effect(EffectKind::Suspicion { enemy_id: id }, Some(at), SUSPICION_CUE_MS);
        }
    }

    if let Some(i) = spotter {
        register_detection(state, i);
    }

    update_alert_level(state);
}

/// Enemy `index` locks onto a decoy instead of the player
fn distract(state: &mut GameState, index: usize, decoy: Pos) {
    let now = state.clock.now();
    let enemy = &mut state.enemies[index];
    if let Some(dir) = Direction::toward(decoy - enemy.pos) {
        enemy.facing = dir;
    }
    if enemy.state == EnemyState::Normal {
        enemy.state = EnemyState::Alert;
        enemy.alert.start(now, ms_to_ticks(HEARD_ALERT_MS));
        let id = enemy.id;
        log::debug!("Enemy {} is watching a decoy", id);
        state.events.push(GameEvent::DecoySpotted { enemy_id: id });
    }
}

/// First sighting of the attempt: enemy chases, player is marked, game over is scheduled
fn register_detection(state: &mut GameState, index: usize) {
    let now = state.clock.now();
    let player_pos = state.player.pos;

    let enemy = &mut state.enemies[index];
    enemy.state = EnemyState::Chasing;
    enemy.alert.start(now, ms_to_ticks(CHASE_ALERT_MS));
    if let Some(dir) = Direction::toward(player_pos - enemy.pos) {
        enemy.facing = dir;
    }
    let (enemy_id, enemy_pos) = (enemy.id, enemy.pos);

    let player = &mut state.player;
    player.detection_count += 1;
    player.stealth_level = (player.stealth_level - STEALTH_DETECTION_PENALTY).max(0.0);

    state.pending_game_over = Some(PendingGameOver {
        fires_at: now + ms_to_ticks(GAME_OVER_DELAY_MS),
        attempt: state.attempt,
    });
    state.events.push(GameEvent::PlayerDetected {
        enemy_id,
        enemy_pos,
        player_pos,
    });
    state.add_effect(
        EffectKind::Alarm { enemy_id },
        Some(enemy_pos),
        ALARM_CUE_MS,
    );

    log::info!(
        "Player detected by enemy {} at ({}, {}) from ({}, {})",
        enemy_id,
        player_pos.x,
        player_pos.y,
        enemy_pos.x,
        enemy_pos.y
    );
}

/// Recompute the observational alert aggregate
pub fn update_alert_level(state: &mut GameState) {
    let suspicious = state
        .enemies
        .iter()
        .filter(|e| matches!(e.state, EnemyState::Alert | EnemyState::Chasing))
        .count();
    state.alert_level = AlertLevel::from_suspicious_count(suspicious);
}
