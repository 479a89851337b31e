//! Keyboard bindings
//!
//! Browser `KeyboardEvent.code` strings mapped to simulation commands.

use crate::sim::{AbilityKind, Command, Direction};

/// What a key press or release means to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Command(Command),
    /// Begin the mission from the start screen
    Start,
    /// Restart the current stage
    Restart,
}

/// Map a key press
pub fn key_down(code: &str) -> Option<KeyAction> {
    let command = match code {
        "KeyW" | "ArrowUp" => Command::Move(Direction::North),
        "KeyS" | "ArrowDown" => Command::Move(Direction::South),
        "KeyA" | "ArrowLeft" => Command::Move(Direction::West),
        "KeyD" | "ArrowRight" => Command::Move(Direction::East),
        "ShiftLeft" | "ShiftRight" => Command::SetCrouch(true),
        "KeyC" => Command::ToggleCrouch,
        "Space" => Command::ToggleHide,
        "KeyX" => Command::StandUp,
        "Digit1" => Command::UseAbility(AbilityKind::Smoke),
        "Digit2" => Command::UseAbility(AbilityKind::Decoy),
        "Digit3" => Command::UseAbility(AbilityKind::Invisibility),
        "KeyP" | "Escape" => Command::TogglePause,
        "Enter" => return Some(KeyAction::Start),
        "KeyR" => return Some(KeyAction::Restart),
        _ => return None,
    };
    Some(KeyAction::Command(command))
}

/// Map a key release (only hold-to-crouch cares)
pub fn key_up(code: &str) -> Option<KeyAction> {
    match code {
        "ShiftLeft" | "ShiftRight" => Some(KeyAction::Command(Command::SetCrouch(false))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_keys() {
        assert_eq!(
            key_down("ArrowUp"),
            Some(KeyAction::Command(Command::Move(Direction::North)))
        );
        assert_eq!(key_down("KeyA"), key_down("ArrowLeft"));
        assert_eq!(key_down("KeyQ"), None);
    }

    #[test]
    fn test_shift_is_hold_to_crouch() {
        assert_eq!(
            key_down("ShiftLeft"),
            Some(KeyAction::Command(Command::SetCrouch(true)))
        );
        assert_eq!(
            key_up("ShiftRight"),
            Some(KeyAction::Command(Command::SetCrouch(false)))
        );
        assert_eq!(key_up("KeyW"), None);
    }

    #[test]
    fn test_ability_digits() {
        assert_eq!(
            key_down("Digit3"),
            Some(KeyAction::Command(Command::UseAbility(AbilityKind::Invisibility)))
        );
    }
}
