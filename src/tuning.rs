//! Game balance and difficulty tuning
//!
//! Loaded once per session; every stage attempt reads from the same `Tuning`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;

/// Host platform class (touch devices get an easier game)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Platform {
    #[default]
    Desktop,
    Mobile,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Desktop => "Desktop",
            Platform::Mobile => "Mobile",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "desktop" | "pc" => Some(Platform::Desktop),
            "mobile" | "touch" => Some(Platform::Mobile),
            _ => None,
        }
    }

    /// Enemy vision range after the platform modifier
    pub fn vision_range(&self, base: i32) -> i32 {
        match self {
            Platform::Desktop => base,
            Platform::Mobile => (base - 1).max(2),
        }
    }

    /// Extra milliseconds between enemy moves
    pub fn move_interval_bonus_ms(&self) -> u32 {
        match self {
            Platform::Desktop => 0,
            Platform::Mobile => 200,
        }
    }
}

/// How enemies decide whether they can see the player
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VisionModel {
    /// Omnidirectional sensing within a fixed Euclidean radius
    Radius { radius: f32 },
    /// Directional cone of `vision_range` tiles, gated by line of sight
    Cone { half_angle_deg: f32 },
}

impl Default for VisionModel {
    fn default() -> Self {
        VisionModel::Radius { radius: 5.0 }
    }
}

impl VisionModel {
    pub fn cone() -> Self {
        VisionModel::Cone {
            half_angle_deg: 60.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum TuningError {
    #[error("invalid tuning JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field} must be within 0..=1, got {value}")]
    Probability { field: &'static str, value: f64 },
    #[error("grid must be between {min} and {max} tiles per side, got {width}x{height}")]
    GridSize {
        width: i32,
        height: i32,
        min: i32,
        max: i32,
    },
}

/// Tunable balance parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Platform difficulty modifier
    pub platform: Platform,
    /// Vision predicate
    pub vision: VisionModel,
    /// Enemies standing in (or looking into) smoke cannot see the player
    pub smoke_blocks_vision: bool,
    /// Enemies that can see a decoy chase it instead of the player
    pub decoy_draws_vision: bool,
    /// Grid size
    pub grid_width: i32,
    pub grid_height: i32,
    /// Probability that a stage 4+ enemy is re-rolled to random movement
    pub late_stage_random_bias: f64,
    /// Probability that a guard turns when its move timer fires
    pub guard_turn_chance: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            platform: Platform::Desktop,
            vision: VisionModel::default(),
            smoke_blocks_vision: true,
            decoy_draws_vision: true,
            grid_width: GRID_WIDTH,
            grid_height: GRID_HEIGHT,
            late_stage_random_bias: 0.3,
            guard_turn_chance: 0.3,
        }
    }
}

impl Tuning {
    /// Create tuning for a platform (applies platform defaults)
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform,
            ..Self::default()
        }
    }

    /// Tuning that reproduces the shipped game: radius vision, no smoke/decoy gating
    pub fn classic() -> Self {
        Self {
            smoke_blocks_vision: false,
            decoy_draws_vision: false,
            ..Self::default()
        }
    }

    /// Parse tuning from JSON; missing fields take defaults, out-of-range values are rejected
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn validate(&self) -> Result<(), TuningError> {
        for (field, value) in [
            ("late_stage_random_bias", self.late_stage_random_bias),
            ("guard_turn_chance", self.guard_turn_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TuningError::Probability { field, value });
            }
        }
        let sizes = MIN_GRID_SIZE..=MAX_GRID_SIZE;
        if !sizes.contains(&self.grid_width) || !sizes.contains(&self.grid_height) {
            return Err(TuningError::GridSize {
                width: self.grid_width,
                height: self.grid_height,
                min: MIN_GRID_SIZE,
                max: MAX_GRID_SIZE,
            });
        }
        Ok(())
    }

    /// Copy with every value forced into its valid range (NaN probabilities become 0)
    pub fn clamped(&self) -> Self {
        let probability = |p: f64| if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
        Self {
            late_stage_random_bias: probability(self.late_stage_random_bias),
            guard_turn_chance: probability(self.guard_turn_chance),
            grid_width: self.grid_width.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE),
            grid_height: self.grid_height.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE),
            ..self.clone()
        }
    }

    /// Enemy vision range for a stage
    pub fn vision_range(&self, stage: u8) -> i32 {
        let base = BASE_VISION_RANGE + if stage > 3 { 1 } else { 0 };
        self.platform.vision_range(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_range_by_stage_and_platform() {
        let desktop = Tuning::default();
        assert_eq!(desktop.vision_range(1), 3);
        assert_eq!(desktop.vision_range(4), 4);

        let mobile = Tuning::for_platform(Platform::Mobile);
        assert_eq!(mobile.vision_range(1), 2);
        assert_eq!(mobile.vision_range(5), 3);
        assert_eq!(Platform::Mobile.vision_range(2), 2);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let tuning = Tuning::from_json(r#"{"platform":"Mobile"}"#).unwrap();
        assert_eq!(tuning.platform, Platform::Mobile);
        assert_eq!(tuning.grid_width, GRID_WIDTH);
        assert!(tuning.smoke_blocks_vision);

        let tuning = Tuning::from_json(r#"{"vision":{"Cone":{"half_angle_deg":45.0}}}"#).unwrap();
        assert_eq!(tuning.vision, VisionModel::Cone { half_angle_deg: 45.0 });
    }

    #[test]
    fn test_out_of_range_json_is_rejected() {
        let err = Tuning::from_json(r#"{"late_stage_random_bias":1.5}"#).unwrap_err();
        assert!(matches!(
            err,
            TuningError::Probability { field: "late_stage_random_bias", .. }
        ));
        let err = Tuning::from_json(r#"{"guard_turn_chance":-0.1}"#).unwrap_err();
        assert!(matches!(err, TuningError::Probability { field: "guard_turn_chance", .. }));
        let err = Tuning::from_json(r#"{"grid_width":100000,"grid_height":100000}"#).unwrap_err();
        assert!(matches!(err, TuningError::GridSize { .. }));
        assert!(matches!(
            Tuning::from_json("{oops").unwrap_err(),
            TuningError::Parse(_)
        ));
        assert!(Tuning::from_json(r#"{"guard_turn_chance":1.0}"#).is_ok());
    }

    #[test]
    fn test_clamped_forces_valid_ranges() {
        let wild = Tuning {
            late_stage_random_bias: 1.5,
            guard_turn_chance: f64::NAN,
            grid_width: 100_000,
            grid_height: 2,
            ..Tuning::default()
        };
        let tame = wild.clamped();
        assert_eq!(tame.late_stage_random_bias, 1.0);
        assert_eq!(tame.guard_turn_chance, 0.0);
        assert_eq!(tame.grid_width, MAX_GRID_SIZE);
        assert_eq!(tame.grid_height, MIN_GRID_SIZE);
        assert!(tame.validate().is_ok());
    }

    #[test]
    fn test_platform_from_str() {
        assert_eq!(Platform::from_str("MOBILE"), Some(Platform::Mobile));
        assert_eq!(Platform::from_str("pc"), Some(Platform::Desktop));
        assert_eq!(Platform::from_str("console"), None);
    }
}
