//! Hexagonal bubble-field engine for a bubble shooter.
//!
//! The engine itself is plain Rust ([`game::session::BubbleField`]); the
//! [`BubbleFieldPlugin`] runs it inside a Bevy app on a fixed tick and talks to
//! the rest of the app through messages.

pub mod game;

pub use game::{
    BubbleFieldPlugin,
    bubble::BubbleColor,
    config::{Difficulty, FieldConfig, GameMode, ProgressionKind},
    hex::CellCoord,
    session::{BubbleField, FieldSystems, RestartGame, StartGame, TickInput, TickReport},
    shooter::{AimAt, FireShot},
    state::{GameEnded, GameStatus, LossReason},
};
