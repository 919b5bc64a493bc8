//! Bubble entities and colors.
//!
//! Anchored bubbles live in the field store keyed by cell. Flying, popping and
//! falling bubbles are transient and only carry a position.

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::hex::CellCoord;

pub(super) fn plugin(app: &mut App) {
    app.register_type::<BubbleColor>();
}

/// The different bubble colors. Difficulty picks how many are in play.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Reflect, Serialize, Deserialize,
)]
pub enum BubbleColor {
    #[default]
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Orange,
}

impl BubbleColor {
    /// All colors, in palette order.
    pub const ALL: [BubbleColor; 6] = [
        BubbleColor::Red,
        BubbleColor::Blue,
        BubbleColor::Green,
        BubbleColor::Yellow,
        BubbleColor::Purple,
        BubbleColor::Orange,
    ];

    /// The first `size` colors of the palette (clamped to 1..=6).
    pub fn palette(size: usize) -> &'static [BubbleColor] {
        &Self::ALL[..size.clamp(1, Self::ALL.len())]
    }

    /// A uniformly random color from the first `palette_size` colors.
    pub fn random(rng: &mut impl Rng, palette_size: usize) -> Self {
        let palette = Self::palette(palette_size);
        palette[rng.random_range(0..palette.len())]
    }

    /// A random color weighted toward colors that still exist on the field.
    ///
    /// 70% of the time one of `present` is picked.
    pub fn random_weighted(
        rng: &mut impl Rng,
        present: &[BubbleColor],
        palette_size: usize,
    ) -> Self {
        if present.is_empty() {
            return Self::random(rng, palette_size);
        }

        if rng.random_bool(0.7) {
            present[rng.random_range(0..present.len())]
        } else {
            Self::random(rng, palette_size)
        }
    }
}

/// Lifecycle of a bubble entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BubbleState {
    Flying,
    Anchored,
    Popping,
    Falling,
    Removed,
}

/// A bubble, wherever it currently is.
#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    pub color: BubbleColor,
    /// Logical center of the cell while anchored (scroll not applied),
    /// screen-space center otherwise.
    pub position: Vec2,
    /// Cell the bubble occupies, `None` while flying or falling.
    pub cell: Option<CellCoord>,
    pub state: BubbleState,
    /// Per-tick velocity for falling bubbles.
    pub velocity: Vec2,
    /// Remaining fade ticks for popping bubbles.
    pub fade_ticks: u32,
}

impl Bubble {
    pub fn anchored(color: BubbleColor, cell: CellCoord, position: Vec2) -> Self {
        Self {
            color,
            position,
            cell: Some(cell),
            state: BubbleState::Anchored,
            velocity: Vec2::ZERO,
            fade_ticks: 0,
        }
    }

    pub fn flying(color: BubbleColor, position: Vec2, velocity: Vec2) -> Self {
        Self {
            color,
            position,
            cell: None,
            state: BubbleState::Flying,
            velocity,
            fade_ticks: 0,
        }
    }

    /// Start the pop fade. The bubble keeps its last cell for renderers.
    pub fn into_popping(mut self, fade_ticks: u32) -> Self {
        self.state = BubbleState::Popping;
        self.fade_ticks = fade_ticks;
        self
    }

    /// Detach the bubble and let gravity take it.
    pub fn into_falling(mut self) -> Self {
        self.state = BubbleState::Falling;
        self.cell = None;
        self.velocity = Vec2::ZERO;
        self
    }
}

/// Generate colors for one full row of `columns` cells at `row`.
///
/// Colors cluster with cells that are already placed: each cell may copy its
/// left neighbor (with probability `bias`), or one of its neighbors in other
/// rows found through `placed` (with probability `bias`), otherwise it rolls a
/// fresh palette color.
pub fn generate_row(
    rng: &mut impl Rng,
    row: i32,
    columns: i32,
    palette_size: usize,
    bias: f64,
    placed: impl Fn(CellCoord) -> Option<BubbleColor>,
) -> Vec<BubbleColor> {
    let mut colors: Vec<BubbleColor> = Vec::with_capacity(columns.max(0) as usize);

    for col in 0..columns {
        let cell = CellCoord::new(row, col);
        let roll: f64 = rng.random();

        let left = colors.last().copied();
        let vertical: Vec<BubbleColor> = cell
            .neighbors()
            .into_iter()
            .filter(|n| n.row != row)
            .filter_map(&placed)
            .collect();

        let color = match left {
            Some(left) if roll < bias => left,
            _ if roll < bias * 2.0 && !vertical.is_empty() => {
                vertical[rng.random_range(0..vertical.len())]
            }
            _ => BubbleColor::random(rng, palette_size),
        };
        colors.push(color);
    }

    colors
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::HashMap;

    #[test]
    fn test_palette_is_clamped() {
        assert_eq!(BubbleColor::palette(0).len(), 1);
        assert_eq!(BubbleColor::palette(4).len(), 4);
        assert_eq!(BubbleColor::palette(12).len(), 6);
    }

    #[test]
    fn test_random_stays_in_palette() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let color = BubbleColor::random(&mut rng, 3);
            assert!(BubbleColor::palette(3).contains(&color));
        }
    }

    #[test]
    fn test_weighted_prefers_present_colors() {
        let mut rng = StdRng::seed_from_u64(11);
        let present = [BubbleColor::Purple];
        let hits = (0..1000)
            .filter(|_| BubbleColor::random_weighted(&mut rng, &present, 6) == BubbleColor::Purple)
            .count();
        // 70% forced plus a 1-in-6 share of the rest.
        assert!(hits > 650, "only {hits} purple picks");
    }

    #[test]
    fn test_generated_row_fills_every_column() {
        let mut rng = StdRng::seed_from_u64(3);
        let row = generate_row(&mut rng, 0, 8, 4, 0.3, |_| None);
        assert_eq!(row.len(), 8);
        assert!(row.iter().all(|c| BubbleColor::palette(4).contains(c)));
    }

    #[test]
    fn test_generation_clusters_with_placed_neighbors() {
        // At bias 0.5 every cell copies its left neighbor or a cell below.
        let below: HashMap<CellCoord, BubbleColor> = (0..8)
            .map(|col| (CellCoord::new(1, col), BubbleColor::Green))
            .collect();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let row = generate_row(&mut rng, 0, 8, 6, 0.5, |c| below.get(&c).copied());
            assert!(row.iter().all(|&c| c == BubbleColor::Green), "{row:?}");
        }
    }

    #[test]
    fn test_lifecycle_transitions() {
        let cell = CellCoord::new(2, 3);
        let bubble = Bubble::anchored(BubbleColor::Blue, cell, Vec2::new(1.0, 2.0));
        let popping = bubble.clone().into_popping(10);
        assert_eq!(popping.state, BubbleState::Popping);
        assert_eq!(popping.cell, Some(cell));
        let falling = bubble.into_falling();
        assert_eq!(falling.state, BubbleState::Falling);
        assert_eq!(falling.cell, None);
    }
}
