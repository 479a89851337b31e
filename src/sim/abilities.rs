//! Player abilities and timed effects

use rand::Rng;

use super::clock::ms_to_ticks;
use super::grid::{Pos, pos};
use super::state::{AbilityKind, EffectKind, GameEvent, GameState};
use crate::consts::*;

/// Try to use an ability. Returns false (and changes nothing) when it has no
/// charges left or is cooling down.
pub fn use_ability(state: &mut GameState, kind: AbilityKind) -> bool {
    let now = state.clock.now();
    let ability = state.player.abilities.get_mut(kind);
    if ability.charges == 0 || ability.cooldown.is_running(now) {
        return false;
    }
    ability.charges -= 1;
    ability.cooldown.start(now, ms_to_ticks(ABILITY_COOLDOWN_MS));

    let player_pos = state.player.pos;
    match kind {
        AbilityKind::Smoke => {
            state.add_effect(
                EffectKind::Smoke {
                    radius: SMOKE_RADIUS,
                },
                Some(player_pos),
                kind.duration_ms(),
            );
        }
        AbilityKind::Decoy => {
            let spot = decoy_spot(state, player_pos);
            state.add_effect(EffectKind::Decoy, Some(spot), kind.duration_ms());
        }
        AbilityKind::Invisibility => {
            state.add_effect(EffectKind::Invisibility, None, kind.duration_ms());
            state.player.stealth_level = STEALTH_MAX;
        }
    }

    log::info!("Used {:?} ({} left)", kind, state.player.abilities.get(kind).charges);
    state.events.push(GameEvent::AbilityUsed { kind });
    true
}

/// Diagonal tile two steps away, preferring a random corner; falls back to the player tile
fn decoy_spot(state: &mut GameState, player_pos: Pos) -> Pos {
    let sx = if state.rng.random_bool(0.5) { -1 } else { 1 };
    let sy = if state.rng.random_bool(0.5) { -1 } else { 1 };
    let candidates = [(sx, sy), (-sx, sy), (sx, -sy), (-sx, -sy)];
    candidates
        .iter()
        .map(|&(dx, dy)| player_pos + pos(dx, dy) * DECOY_OFFSET)
        .find(|&p| state.stage.grid.is_floor(p))
        .unwrap_or(player_pos)
}

/// Drop expired effects
pub fn update_effects(state: &mut GameState) {
    let now = state.clock.now();
    state.effects.retain(|e| e.is_active(now));
}
