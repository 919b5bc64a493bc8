//! The bubble-field engine.
//!
//! This module contains all the gameplay logic including:
//! - Hexagonal grid geometry (odd-row offset coordinates)
//! - The field store and bubble colors
//! - Shooter and projectile physics
//! - Snapping, cluster popping and floating-bubble removal
//! - Field progression (row shift or buffered scroll)
//! - Game state, scoring and high scores

pub mod bubble;
pub mod cluster;
pub mod config;
pub mod error;
pub mod grid;
pub mod hex;
pub mod highscore;
pub mod progression;
pub mod projectile;
pub mod session;
pub mod shooter;
pub mod snap;
pub mod state;

use bevy::prelude::*;

use self::{config::FieldConfig, session::BubbleField};

/// Runs one [`BubbleField`] on `FixedUpdate` at the configured tick rate.
#[derive(Debug, Clone, Default)]
pub struct BubbleFieldPlugin {
    config: FieldConfig,
}

impl BubbleFieldPlugin {
    pub fn new(config: FieldConfig) -> Self {
        Self { config }
    }
}

impl Plugin for BubbleFieldPlugin {
    fn build(&self, app: &mut App) {
        let config = match self.config.validate() {
            Ok(()) => self.config.clone(),
            Err(e) => {
                warn!("Invalid field config ({}), using defaults", e);
                FieldConfig::default()
            }
        };

        app.insert_resource(Time::<Fixed>::from_hz(config.tick_rate));
        app.insert_resource(BubbleField::new(config.clone()));
        app.insert_resource(config);

        app.add_plugins((
            hex::plugin,
            bubble::plugin,
            shooter::plugin,
            cluster::plugin,
            progression::plugin,
            state::plugin,
            highscore::plugin,
            session::plugin,
        ));
    }
}
