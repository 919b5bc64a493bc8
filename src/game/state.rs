//! Game state management - score, win/lose conditions.
//!
//! Win: clear every visible bubble (modes may disable this).
//! Lose: a bubble crosses the danger line, or a mode budget runs out.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    config::{FieldConfig, GameMode},
    grid::FieldStore,
    highscore::ScoreRecord,
};

pub(super) fn plugin(app: &mut App) {
    app.register_type::<GameScore>();
    app.add_message::<GameEnded>();
}

/// Why a game was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LossReason {
    DangerLine,
    OutOfTime,
    OutOfShots,
}

/// Session lifecycle. `Won` and `Lost` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameStatus {
    /// Waiting for the player to start; input is ignored.
    #[default]
    Ready,
    Playing,
    Won,
    Lost(LossReason),
}

impl GameStatus {
    pub fn is_over(self) -> bool {
        matches!(self, GameStatus::Won | GameStatus::Lost(_))
    }
}

/// Message sent once when a game reaches a terminal state.
#[derive(Message, Debug, Clone, PartialEq)]
pub struct GameEnded {
    pub status: GameStatus,
    pub record: ScoreRecord,
}

/// Running score and counters for one session.
#[derive(Debug, Default, Clone, PartialEq, Reflect)]
pub struct GameScore {
    pub score: u32,
    pub bubbles_popped: u32,
    pub bubbles_dropped: u32,
    pub clusters_popped: u32,
    pub shots_fired: u32,
    pub misses: u32,
}

impl GameScore {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Score a popped cluster. Returns the points awarded.
    pub fn record_pop(&mut self, count: usize, points_per_bubble: u32) -> u32 {
        let points = (count as u32).saturating_mul(points_per_bubble);
        self.score = self.score.saturating_add(points);
        self.bubbles_popped += count as u32;
        self.clusters_popped += 1;
        info!("Cluster popped: {} bubbles, +{} points (total: {})", count, points, self.score);
        points
    }

    /// Score an avalanche of dropped bubbles. Returns the points awarded.
    pub fn record_drop(&mut self, count: usize, points_per_bubble: u32, multiplier: u32) -> u32 {
        let points = (count as u32)
            .saturating_mul(points_per_bubble)
            .saturating_mul(multiplier);
        self.score = self.score.saturating_add(points);
        self.bubbles_dropped += count as u32;
        info!(
            "Floating bubbles removed: {}, +{} bonus points (total: {})",
            count, points, self.score
        );
        points
    }
}

/// Termination rules derived from the config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameRules {
    pub win_enabled: bool,
    pub danger_line_y: f32,
    pub time_budget: Option<f32>,
    pub shot_budget: Option<u32>,
}

impl GameRules {
    pub fn from_config(config: &FieldConfig) -> Self {
        Self {
            win_enabled: config.mode.win_enabled(),
            danger_line_y: config.danger_line_y(),
            time_budget: (config.mode == GameMode::TimeAttack).then_some(config.time_budget_secs),
            shot_budget: (config.mode == GameMode::ShotLimited).then_some(config.shot_budget),
        }
    }
}

/// What the state machine needs to know about the session besides the field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionClock {
    pub elapsed: f32,
    pub shots_fired: u32,
    pub shot_in_flight: bool,
}

/// Tracks the session status and evaluates termination every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct GameStateMachine {
    status: GameStatus,
    rules: GameRules,
}

impl GameStateMachine {
    pub fn new(rules: GameRules) -> Self {
        Self {
            status: GameStatus::Ready,
            rules,
        }
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn rules(&self) -> GameRules {
        self.rules
    }

    pub fn is_playing(&self) -> bool {
        self.status == GameStatus::Playing
    }

    /// Leave `Ready`. Returns false if the game already started.
    pub fn start(&mut self) -> bool {
        if self.status != GameStatus::Ready {
            return false;
        }
        self.status = GameStatus::Playing;
        info!("Game started");
        true
    }

    /// Check termination. Returns the new status on a transition.
    pub fn evaluate(&mut self, store: &FieldStore, clock: SessionClock) -> Option<GameStatus> {
        if !self.is_playing() {
            return None;
        }

        let next = if store
            .lowest_edge()
            .is_some_and(|edge| edge > self.rules.danger_line_y)
        {
            GameStatus::Lost(LossReason::DangerLine)
        } else if self.rules.win_enabled && store.visible_count() == 0 {
            GameStatus::Won
        } else if self
            .rules
            .time_budget
            .is_some_and(|budget| clock.elapsed >= budget)
        {
            GameStatus::Lost(LossReason::OutOfTime)
        } else if self
            .rules
            .shot_budget
            .is_some_and(|budget| clock.shots_fired >= budget && !clock.shot_in_flight)
        {
            GameStatus::Lost(LossReason::OutOfShots)
        } else {
            return None;
        };

        self.status = next;
        info!("Game over: {:?}", next);
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{
        bubble::BubbleColor,
        grid::FieldBounds,
        hex::{BUBBLE_RADIUS, CellCoord},
    };

    fn rules() -> GameRules {
        GameRules {
            win_enabled: true,
            danger_line_y: 520.0,
            time_budget: None,
            shot_budget: None,
        }
    }

    fn store() -> FieldStore {
        let mut store = FieldStore::new(FieldBounds {
            columns: 8,
            radius: BUBBLE_RADIUS,
            height: 640.0,
        });
        store.insert(CellCoord::new(0, 0), BubbleColor::Red);
        store
    }

    fn playing(rules: GameRules) -> GameStateMachine {
        let mut machine = GameStateMachine::new(rules);
        assert!(machine.start());
        machine
    }

    #[test]
    fn test_ready_until_started() {
        let mut machine = GameStateMachine::new(rules());
        let empty = FieldStore::new(store().bounds());
        assert_eq!(machine.evaluate(&empty, SessionClock::default()), None);
        assert_eq!(machine.status(), GameStatus::Ready);
        assert!(machine.start());
        assert!(!machine.start());
    }

    #[test]
    fn test_keeps_playing_with_safe_field() {
        let mut machine = playing(rules());
        assert_eq!(machine.evaluate(&store(), SessionClock::default()), None);
        assert!(machine.is_playing());
    }

    #[test]
    fn test_crossing_danger_line_loses_immediately() {
        let mut field = store();
        // Row 14: bottom edge at 20 + 14 * 34.64 + 20 > 520.
        field.insert(CellCoord::new(14, 0), BubbleColor::Blue);
        let mut machine = playing(rules());
        assert_eq!(
            machine.evaluate(&field, SessionClock::default()),
            Some(GameStatus::Lost(LossReason::DangerLine))
        );
        assert!(machine.status().is_over());
        // Terminal: no further transitions.
        assert_eq!(machine.evaluate(&field, SessionClock::default()), None);
    }

    #[test]
    fn test_row_just_above_danger_line_is_safe() {
        let mut field = store();
        // Row 13: bottom edge at about 490.3.
        field.insert(CellCoord::new(13, 0), BubbleColor::Blue);
        let mut machine = playing(rules());
        assert_eq!(machine.evaluate(&field, SessionClock::default()), None);
    }

    #[test]
    fn test_scroll_pushes_field_over_the_line() {
        let mut field = store();
        field.insert(CellCoord::new(13, 0), BubbleColor::Blue);
        field.add_scroll(BUBBLE_RADIUS * 2.0);
        let mut machine = playing(rules());
        assert_eq!(
            machine.evaluate(&field, SessionClock::default()),
            Some(GameStatus::Lost(LossReason::DangerLine))
        );
    }

    #[test]
    fn test_clearing_field_wins() {
        let empty = FieldStore::new(store().bounds());
        let mut machine = playing(rules());
        assert_eq!(
            machine.evaluate(&empty, SessionClock::default()),
            Some(GameStatus::Won)
        );
    }

    #[test]
    fn test_win_can_be_disabled() {
        let empty = FieldStore::new(store().bounds());
        let mut machine = playing(GameRules {
            win_enabled: false,
            ..rules()
        });
        assert_eq!(machine.evaluate(&empty, SessionClock::default()), None);
    }

    #[test]
    fn test_budgets() {
        let mut machine = playing(GameRules {
            time_budget: Some(60.0),
            ..rules()
        });
        let clock = SessionClock {
            elapsed: 60.0,
            ..Default::default()
        };
        assert_eq!(
            machine.evaluate(&store(), clock),
            Some(GameStatus::Lost(LossReason::OutOfTime))
        );

        let mut machine = playing(GameRules {
            shot_budget: Some(5),
            ..rules()
        });
        let mut clock = SessionClock {
            shots_fired: 5,
            shot_in_flight: true,
            ..Default::default()
        };
        assert_eq!(machine.evaluate(&store(), clock), None);
        clock.shot_in_flight = false;
        assert_eq!(
            machine.evaluate(&store(), clock),
            Some(GameStatus::Lost(LossReason::OutOfShots))
        );
    }

    #[test]
    fn test_score_counts() {
        let mut score = GameScore::default();
        assert_eq!(score.record_pop(4, 10), 40);
        assert_eq!(score.record_drop(5, 10, 2), 100);
        assert_eq!(score.score, 140);
        assert_eq!(score.clusters_popped, 1);
        assert_eq!(score.bubbles_dropped, 5);
        score.reset();
        assert_eq!(score, GameScore::default());
    }

    #[test]
    fn test_huge_point_values_saturate() {
        let mut score = GameScore::default();
        assert_eq!(score.record_drop(5, u32::MAX / 2, 3), u32::MAX);
        assert_eq!(score.record_pop(3, 10), 30);
        assert_eq!(score.score, u32::MAX);
    }
}
