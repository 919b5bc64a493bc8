//! Hexagonal cell addressing using offset coordinates (odd-r).
//!
//! Based on Red Blob Games' guide:
//! https://www.redblobgames.com/grids/hexagons/
//!
//! Bubbles are circles packed in "brick" rows: odd rows are shifted right by
//! one bubble radius. Field space is y-down, with x = 0 at the left wall and
//! y = 0 at the top boundary. Rows are absolute and may be negative once rows
//! have been injected above the starting field.

use bevy::prelude::*;

pub(super) fn plugin(app: &mut App) {
    app.register_type::<CellCoord>();
}

/// Square root of 3, used frequently in hex math.
pub const SQRT_3: f32 = 1.732_050_8;

/// Default bubble radius in pixels.
pub const BUBBLE_RADIUS: f32 = 20.0;

/// Vertical distance between two row centers for touching bubbles of `radius`.
#[inline]
pub fn row_height(radius: f32) -> f32 {
    radius * SQRT_3
}

/// Offset cell coordinate (odd-r system).
///
/// - `row` increases downward
/// - `col` increases to the right
/// - odd rows are shifted right by half a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Reflect)]
pub struct CellCoord {
    pub row: i32,
    pub col: i32,
}

impl CellCoord {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Whether this cell's row is shifted right by half a column.
    #[inline]
    pub const fn is_shifted(&self) -> bool {
        self.row.rem_euclid(2) == 1
    }

    /// All 6 neighboring cells.
    ///
    /// Diagonal offsets depend on row parity.
    pub fn neighbors(&self) -> [CellCoord; 6] {
        let (r, c) = (self.row, self.col);
        if self.is_shifted() {
            [
                CellCoord::new(r, c + 1),     // East
                CellCoord::new(r - 1, c + 1), // Northeast
                CellCoord::new(r - 1, c),     // Northwest
                CellCoord::new(r, c - 1),     // West
                CellCoord::new(r + 1, c),     // Southwest
                CellCoord::new(r + 1, c + 1), // Southeast
            ]
        } else {
            [
                CellCoord::new(r, c + 1),     // East
                CellCoord::new(r - 1, c),     // Northeast
                CellCoord::new(r - 1, c - 1), // Northwest
                CellCoord::new(r, c - 1),     // West
                CellCoord::new(r + 1, c - 1), // Southwest
                CellCoord::new(r + 1, c),     // Southeast
            ]
        }
    }

    /// Whether `other` is one of the six neighbors of this cell.
    pub fn is_adjacent(&self, other: CellCoord) -> bool {
        self.neighbors().contains(&other)
    }

    /// Logical center of this cell, before any scroll offset is applied.
    ///
    /// - x = radius + 2 * radius * col (+ radius on odd rows)
    /// - y = radius + row_height * row
    pub fn to_pixel(&self, radius: f32) -> Vec2 {
        let shift = if self.is_shifted() { radius } else { 0.0 };
        let x = radius + 2.0 * radius * self.col as f32 + shift;
        let y = radius + row_height(radius) * self.row as f32;
        Vec2::new(x, y)
    }

    /// The cell whose center is roughly nearest to a logical position.
    ///
    /// Only an estimate for narrowing searches: rows are found first, then
    /// the column is rounded with the row's shift taken out. Callers that need
    /// ground truth measure distances against actual occupants.
    pub fn from_pixel(pos: Vec2, radius: f32) -> Self {
        let row = ((pos.y - radius) / row_height(radius)).round() as i32;
        let shift = if row.rem_euclid(2) == 1 { radius } else { 0.0 };
        let col = ((pos.x - radius - shift) / (2.0 * radius)).round() as i32;
        Self { row, col }
    }
}

impl std::fmt::Display for CellCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}
