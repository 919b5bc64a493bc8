//! Projectile - the bubble being shot.
//!
//! The projectile travels in a straight line, bouncing off the side walls,
//! until it touches a bubble on the field or the top boundary. Each step is
//! swept against every occupied cell near the travelled segment, so a fast
//! shot cannot skip over a bubble between two ticks.

use bevy::prelude::*;

use super::{
    bubble::{Bubble, BubbleColor},
    grid::FieldStore,
    hex::CellCoord,
};

/// What happened to the projectile during one step.
#[derive(Debug, Clone, PartialEq)]
pub enum FlightOutcome {
    /// Nothing in flight.
    Idle,
    InFlight,
    /// The projectile touched something and must be snapped to the field.
    Contact {
        color: BubbleColor,
        /// Screen-space center of the projectile at first contact.
        point: Vec2,
        /// The occupant that was hit, or `None` for the top boundary.
        hit: Option<CellCoord>,
    },
    /// The projectile left through the bottom of the field. Counts as a miss.
    Exited { color: BubbleColor },
}

/// Owns the single bubble in flight.
#[derive(Debug, Clone, Default)]
pub struct ProjectileSimulator {
    projectile: Option<Bubble>,
    wall_restitution: f32,
}

impl ProjectileSimulator {
    pub fn new(wall_restitution: f32) -> Self {
        Self {
            projectile: None,
            wall_restitution,
        }
    }

    pub fn in_flight(&self) -> Option<&Bubble> {
        self.projectile.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.projectile.is_none()
    }

    /// Launch a bubble. Fails if one is already in flight.
    pub fn launch(&mut self, origin: Vec2, direction: Vec2, speed: f32, color: BubbleColor) -> bool {
        if self.projectile.is_some() {
            return false;
        }
        let velocity = direction.normalize_or(Vec2::NEG_Y) * speed;
        self.projectile = Some(Bubble::flying(color, origin, velocity));
        debug!("Launched {:?} bubble at {:?} with velocity {:?}", color, origin, velocity);
        true
    }

    pub fn clear(&mut self) {
        self.projectile = None;
    }

    /// Advance the projectile by one tick.
    pub fn step(&mut self, store: &FieldStore) -> FlightOutcome {
        let Some(bubble) = self.projectile.as_mut() else {
            return FlightOutcome::Idle;
        };

        let bounds = store.bounds();
        let radius = bounds.radius;
        let width = bounds.width();

        let start = bubble.position;
        let mut end = start + bubble.velocity;

        // Side walls bounce, losing some horizontal speed.
        if end.x - radius < 0.0 {
            end.x = radius;
            bubble.velocity.x = bubble.velocity.x.abs() * self.wall_restitution;
        }
        if end.x + radius > width {
            end.x = width - radius;
            bubble.velocity.x = -bubble.velocity.x.abs() * self.wall_restitution;
        }

        let segment = end - start;
        let mut first: Option<(f32, Option<CellCoord>)> = None;

        if end.y - radius <= 0.0 {
            let t = if segment.y < 0.0 {
                ((radius - start.y) / segment.y).clamp(0.0, 1.0)
            } else {
                0.0
            };
            first = Some((t, None));
        }

        let contact_distance = 2.0 * radius;
        for cell in candidate_cells(store, start, end) {
            let center = store.cell_center(cell);
            let Some(t) = sweep_circle(start, segment, center, contact_distance) else {
                continue;
            };
            if first.is_none_or(|(best, _)| t < best) {
                first = Some((t, Some(cell)));
            }
        }

        if let Some((t, hit)) = first {
            let point = start + segment * t;
            let color = bubble.color;
            self.projectile = None;
            return FlightOutcome::Contact { color, point, hit };
        }

        bubble.position = end;

        if end.y - radius > bounds.height {
            let color = bubble.color;
            warn!("Projectile left the bottom of the field, discarding");
            self.projectile = None;
            return FlightOutcome::Exited { color };
        }

        FlightOutcome::InFlight
    }
}

/// Occupied cells close enough to the segment `start..end` to be touched.
///
/// The window is the cell estimate of the segment's bounding box grown by one
/// contact distance, so it widens with the projectile's speed.
fn candidate_cells(store: &FieldStore, start: Vec2, end: Vec2) -> Vec<CellCoord> {
    let reach = Vec2::splat(2.0 * store.bounds().radius);
    let lo = store.cell_at(start.min(end) - reach);
    let hi = store.cell_at(start.max(end) + reach);

    let mut cells = Vec::new();
    for row in (lo.row - 1)..=(hi.row + 1) {
        for col in (lo.col - 1)..=(hi.col + 1) {
            let cell = CellCoord::new(row, col);
            if store.is_occupied(cell) {
                cells.push(cell);
            }
        }
    }
    cells
}

/// Earliest fraction `t` in `0..=1` at which a point moving along `segment`
/// from `start` comes within `distance` of `center`.
fn sweep_circle(start: Vec2, segment: Vec2, center: Vec2, distance: f32) -> Option<f32> {
    let offset = start - center;
    let c = offset.length_squared() - distance * distance;
    if c <= 0.0 {
        return Some(0.0);
    }

    let a = segment.length_squared();
    if a <= f32::EPSILON {
        return None;
    }
    let b = 2.0 * segment.dot(offset);
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    let t = (-b - discriminant.sqrt()) / (2.0 * a);
    (0.0..=1.0).contains(&t).then_some(t)
}
