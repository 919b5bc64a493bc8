//! The shooter/launcher at the bottom of the field.
//!
//! The player aims with a pointer and fires bubbles upward.
//! The shooter always has a "loaded" bubble ready to fire and
//! a "next" bubble preview.

use bevy::prelude::*;
use rand::Rng;

use super::bubble::BubbleColor;

pub(super) fn plugin(app: &mut App) {
    app.register_type::<ShooterState>();
    app.add_message::<AimAt>();
    app.add_message::<FireShot>();
}

/// Maximum angle from vertical (in radians) - prevents shooting too horizontally.
pub const MAX_AIM_ANGLE: f32 = 1.3; // About 75 degrees

/// Point the shooter at a field position (screen space, y down).
#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub struct AimAt(pub Vec2);

/// Fire the loaded bubble along the current aim.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FireShot;

/// The current state of the shooter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, Default)]
pub enum ShooterState {
    /// Ready to fire
    #[default]
    Ready,
    /// Waiting for projectile to land before reloading
    Reloading,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shooter {
    origin: Vec2,
    /// Unit direction; straight up is `-Y`.
    aim: Vec2,
    state: ShooterState,
    cooldown: u32,
    reload_ticks: u32,
    loaded: BubbleColor,
    next: BubbleColor,
}

impl Shooter {
    pub fn new(origin: Vec2, reload_ticks: u32, loaded: BubbleColor, next: BubbleColor) -> Self {
        info!("Shooter ready with {:?} loaded, {:?} next", loaded, next);
        Self {
            origin,
            aim: Vec2::NEG_Y,
            state: ShooterState::Ready,
            cooldown: 0,
            reload_ticks,
            loaded,
            next,
        }
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn aim(&self) -> Vec2 {
        self.aim
    }

    /// Signed angle from vertical, positive to the right.
    pub fn angle(&self) -> f32 {
        self.aim.x.atan2(-self.aim.y)
    }

    pub fn state(&self) -> ShooterState {
        self.state
    }

    pub fn loaded(&self) -> BubbleColor {
        self.loaded
    }

    pub fn next(&self) -> BubbleColor {
        self.next
    }

    /// Aim at a pointer position.
    ///
    /// Pointers at or below the shooter, or outside `0..=field_width`, are
    /// ignored and false is returned.
    pub fn aim_at(&mut self, target: Vec2, field_width: f32) -> bool {
        if target.y >= self.origin.y || !(0.0..=field_width).contains(&target.x) {
            return false;
        }

        let direction = target - self.origin;
        let angle = direction
            .x
            .atan2(-direction.y)
            .clamp(-MAX_AIM_ANGLE, MAX_AIM_ANGLE);
        self.aim = Vec2::new(angle.sin(), -angle.cos());
        true
    }

    pub fn can_fire(&self) -> bool {
        self.state == ShooterState::Ready && self.cooldown == 0
    }

    /// Take the loaded color for a shot, if the shooter is ready.
    pub fn fire(&mut self) -> Option<BubbleColor> {
        if !self.can_fire() {
            return None;
        }
        self.state = ShooterState::Reloading;
        Some(self.loaded)
    }

    /// The last shot resolved: move the preview up and roll a new one.
    ///
    /// New colors lean toward `present` so the player is not handed colors
    /// that no longer exist on the field.
    pub fn reload(&mut self, rng: &mut impl Rng, present: &[BubbleColor], palette_size: usize) {
        if self.state != ShooterState::Reloading {
            return;
        }
        self.loaded = self.next;
        self.next = BubbleColor::random_weighted(rng, present, palette_size);
        self.state = ShooterState::Ready;
        self.cooldown = self.reload_ticks;
        debug!("Reloaded with {:?}, next is {:?}", self.loaded, self.next);
    }

    /// Count down the reload cooldown.
    pub fn tick(&mut self) {
        self.cooldown = self.cooldown.saturating_sub(1);
    }
}
