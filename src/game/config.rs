//! Session configuration: difficulty presets, game modes and field geometry.
//!
//! [`FieldConfig`] is fixed for the lifetime of a session. Any subset of it can
//! be overridden from a JSON file; missing keys fall back to the defaults.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use super::{
    error::ConfigError,
    hex::{BUBBLE_RADIUS, row_height},
};

/// Difficulty presets, selected before a session starts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
    Expert,
}

/// The knobs a difficulty turns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyPreset {
    /// Number of bubble colors in play (3..=6).
    pub palette_size: usize,
    /// Rows filled when the field is created.
    pub initial_rows: i32,
    /// Missed shots before the field advances.
    pub shots_per_advance: u32,
    /// Seconds before the field advances regardless of shots.
    pub seconds_per_advance: Option<f32>,
}

impl Difficulty {
    pub const fn preset(self) -> DifficultyPreset {
        match self {
            Difficulty::Easy => DifficultyPreset {
                palette_size: 3,
                initial_rows: 5,
                shots_per_advance: 10,
                seconds_per_advance: Some(40.0),
            },
            Difficulty::Normal => DifficultyPreset {
                palette_size: 4,
                initial_rows: 6,
                shots_per_advance: 8,
                seconds_per_advance: Some(30.0),
            },
            Difficulty::Hard => DifficultyPreset {
                palette_size: 5,
                initial_rows: 7,
                shots_per_advance: 6,
                seconds_per_advance: Some(20.0),
            },
            Difficulty::Expert => DifficultyPreset {
                palette_size: 6,
                initial_rows: 8,
                shots_per_advance: 5,
                seconds_per_advance: Some(15.0),
            },
        }
    }
}

/// How the field is pushed toward the danger line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressionKind {
    /// Whole-row steps on trigger.
    #[default]
    DiscreteShift,
    /// Smooth scroll fed from a pre-generated reserve of rows.
    BufferedScroll,
}

/// Rule sets layered over the field engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    Classic,
    /// No win condition, the field scrolls forever.
    Endless,
    /// Clear the field before the clock runs out.
    TimeAttack,
    /// Clear the field with a fixed number of shots.
    ShotLimited,
}

impl GameMode {
    /// Whether clearing the visible field wins the game.
    pub const fn win_enabled(self) -> bool {
        !matches!(self, GameMode::Endless)
    }

    /// The progression strategy a mode uses unless the config says otherwise.
    pub const fn default_progression(self) -> ProgressionKind {
        match self {
            GameMode::Endless => ProgressionKind::BufferedScroll,
            _ => ProgressionKind::DiscreteShift,
        }
    }
}

/// Full configuration for one session.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub mode: GameMode,
    pub difficulty: Difficulty,
    /// Overrides the mode's default progression strategy.
    pub progression: Option<ProgressionKind>,
    /// Fixed seed for reproducible sessions.
    pub seed: Option<u64>,

    // Geometry
    pub columns: i32,
    pub bubble_radius: f32,
    /// Height of the visible field; bubbles falling past it are discarded.
    pub field_height: f32,
    /// Distance from the bottom of the field to the shooter's center.
    pub shooter_margin: f32,
    /// Distance from the shooter up to the danger line.
    pub danger_line_offset: f32,

    // Projectile
    /// Pixels travelled per tick.
    pub shot_speed: f32,
    /// Fraction of horizontal speed kept after a wall bounce.
    pub wall_restitution: f32,
    /// Ticks between two shots.
    pub reload_ticks: u32,

    // Timing
    pub tick_rate: f64,
    /// Ticks a popped bubble stays visible while fading.
    pub pop_fade_ticks: u32,
    /// Downward acceleration for dropped bubbles, pixels per tick squared.
    pub fall_gravity: f32,

    // Scoring
    pub points_per_bubble: u32,
    pub avalanche_multiplier: u32,

    // Progression
    /// Continuous scroll speed in pixels per second (buffered scroll only).
    pub scroll_speed: f32,
    /// Rows held pre-generated for the buffered scroll.
    pub reserve_rows: usize,
    /// Rows materialized above the visible area (buffered scroll only).
    pub lookahead_rows: i32,
    /// Chance per cell to copy a neighbor's color when generating rows.
    pub cluster_bias: f64,

    // Budgets
    pub time_budget_secs: f32,
    pub shot_budget: u32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            mode: GameMode::Classic,
            difficulty: Difficulty::Normal,
            progression: None,
            seed: None,
            columns: 8,
            bubble_radius: BUBBLE_RADIUS,
            field_height: 640.0,
            shooter_margin: 40.0,
            danger_line_offset: 80.0,
            shot_speed: 12.0,
            wall_restitution: 0.9,
            reload_ticks: 12,
            tick_rate: 60.0,
            pop_fade_ticks: 12,
            fall_gravity: 0.5,
            points_per_bubble: 10,
            avalanche_multiplier: 2,
            scroll_speed: 4.0,
            reserve_rows: 32,
            lookahead_rows: 2,
            cluster_bias: 0.3,
            time_budget_secs: 120.0,
            shot_budget: 40,
        }
    }
}

impl FieldConfig {
    pub fn preset(&self) -> DifficultyPreset {
        self.difficulty.preset()
    }

    pub fn progression_kind(&self) -> ProgressionKind {
        self.progression
            .unwrap_or_else(|| self.mode.default_progression())
    }

    pub fn field_width(&self) -> f32 {
        self.columns as f32 * 2.0 * self.bubble_radius + self.bubble_radius
    }

    pub fn row_height(&self) -> f32 {
        row_height(self.bubble_radius)
    }

    pub fn shooter_position(&self) -> Vec2 {
        Vec2::new(
            self.field_width() / 2.0,
            self.field_height - self.shooter_margin,
        )
    }

    pub fn danger_line_y(&self) -> f32 {
        self.shooter_position().y - self.danger_line_offset
    }

    pub fn tick_seconds(&self) -> f32 {
        (1.0 / self.tick_rate) as f32
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.columns < 3 {
            return Err(ConfigError::OutOfRange {
                field: "columns",
                value: self.columns as f64,
                expected: ">= 3",
            });
        }
        if self.bubble_radius <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "bubble_radius",
                value: self.bubble_radius as f64,
                expected: "> 0",
            });
        }
        if self.shot_speed <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "shot_speed",
                value: self.shot_speed as f64,
                expected: "> 0",
            });
        }
        if self.tick_rate <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "tick_rate",
                value: self.tick_rate,
                expected: "> 0",
            });
        }
        if !(0.0..=0.5).contains(&self.cluster_bias) {
            return Err(ConfigError::OutOfRange {
                field: "cluster_bias",
                value: self.cluster_bias,
                expected: "0.0..=0.5",
            });
        }
        if self.danger_line_y() <= self.bubble_radius * 2.0 {
            return Err(ConfigError::OutOfRange {
                field: "danger_line_offset",
                value: self.danger_line_offset as f64,
                expected: "a danger line below the first row",
            });
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }
}
