//! The occupancy map that holds every bubble on the field.
//!
//! Uses a HashMap for sparse storage - only occupied cells are stored.
//! Rows are absolute: injecting a row above the field decrements `top_row`
//! instead of renumbering every cell, and the on-screen descent is carried by
//! a single scroll offset.

use bevy::prelude::*;
use std::collections::HashMap;

use super::{
    bubble::{Bubble, BubbleColor, BubbleState},
    cluster::find_anchored,
    error::InvariantViolation,
    hex::{CellCoord, row_height},
};

/// Minimum center distance between anchored bubbles, as a fraction of 2R.
pub const MIN_SEPARATION: f32 = 0.98;

/// The shape of the playable field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldBounds {
    /// Cells per row, for both row parities.
    pub columns: i32,
    pub radius: f32,
    /// Visible height; the bottom edge where falling bubbles leave the field.
    pub height: f32,
}

impl FieldBounds {
    pub fn width(&self) -> f32 {
        self.columns as f32 * 2.0 * self.radius + self.radius
    }

    pub fn contains_col(&self, col: i32) -> bool {
        (0..self.columns).contains(&col)
    }

    pub fn row_height(&self) -> f32 {
        row_height(self.radius)
    }
}

/// Owns every bubble entity on the field except the one in flight.
#[derive(Debug, Clone)]
pub struct FieldStore {
    bubbles: HashMap<CellCoord, Bubble>,
    popping: Vec<Bubble>,
    falling: Vec<Bubble>,
    bounds: FieldBounds,
    /// The anchor row: bubbles here always count as connected.
    top_row: i32,
    /// Added to every anchored bubble's logical y to get its screen y.
    scroll_offset: f32,
}

impl FieldStore {
    pub fn new(bounds: FieldBounds) -> Self {
        Self {
            bubbles: HashMap::new(),
            popping: Vec::new(),
            falling: Vec::new(),
            bounds,
            top_row: 0,
            scroll_offset: 0.0,
        }
    }

    pub fn bounds(&self) -> FieldBounds {
        self.bounds
    }

    pub fn top_row(&self) -> i32 {
        self.top_row
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    /// Push the whole field down the screen by `dy` pixels.
    pub fn add_scroll(&mut self, dy: f32) {
        self.scroll_offset += dy;
    }

    /// Whether a cell lies inside the field (any depth below the anchor row).
    pub fn contains(&self, cell: CellCoord) -> bool {
        self.bounds.contains_col(cell.col) && cell.row >= self.top_row
    }

    /// Screen-space center of a cell.
    pub fn cell_center(&self, cell: CellCoord) -> Vec2 {
        cell.to_pixel(self.bounds.radius) + Vec2::new(0.0, self.scroll_offset)
    }

    /// Estimate the cell under a screen-space point.
    pub fn cell_at(&self, screen: Vec2) -> CellCoord {
        CellCoord::from_pixel(
            screen - Vec2::new(0.0, self.scroll_offset),
            self.bounds.radius,
        )
    }

    /// Row index counted from the anchor row.
    pub fn relative_row(&self, cell: CellCoord) -> i32 {
        cell.row - self.top_row
    }

    pub fn is_occupied(&self, cell: CellCoord) -> bool {
        self.bubbles.contains_key(&cell)
    }

    pub fn get(&self, cell: CellCoord) -> Option<&Bubble> {
        self.bubbles.get(&cell)
    }

    pub fn color_at(&self, cell: CellCoord) -> Option<BubbleColor> {
        self.bubbles.get(&cell).map(|b| b.color)
    }

    /// Anchor a bubble of `color` at `cell`.
    ///
    /// Returns the previous bubble if the cell was occupied.
    pub fn insert(&mut self, cell: CellCoord, color: BubbleColor) -> Option<Bubble> {
        let position = cell.to_pixel(self.bounds.radius);
        self.bubbles
            .insert(cell, Bubble::anchored(color, cell, position))
    }

    /// Remove an anchored bubble outright, without any animation.
    pub fn remove(&mut self, cell: CellCoord) -> Option<Bubble> {
        self.bubbles.remove(&cell)
    }

    /// Remove everything, transient entities included.
    pub fn clear(&mut self) {
        self.bubbles.clear();
        self.popping.clear();
        self.falling.clear();
        self.top_row = 0;
        self.scroll_offset = 0.0;
    }

    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellCoord, &Bubble)> {
        self.bubbles.iter()
    }

    pub fn cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        self.bubbles.keys().copied()
    }

    /// Materialize a full row above the current anchor row.
    ///
    /// Returns the index of the new anchor row.
    pub fn push_top_row(&mut self, colors: &[BubbleColor]) -> i32 {
        self.top_row -= 1;
        let row = self.top_row;
        for (col, &color) in colors.iter().enumerate().take(self.bounds.columns as usize) {
            self.insert(CellCoord::new(row, col as i32), color);
        }
        row
    }

    /// Occupied cells in the anchor row.
    pub fn anchor_row_cells(&self) -> Vec<CellCoord> {
        self.bubbles
            .keys()
            .filter(|c| c.row == self.top_row)
            .copied()
            .collect()
    }

    /// Whether a bubble placed at `cell` would hang from the field.
    pub fn is_attachable(&self, cell: CellCoord) -> bool {
        cell.row == self.top_row || cell.neighbors().iter().any(|n| self.is_occupied(*n))
    }

    /// Whether any part of the cell shows below the top boundary.
    pub fn is_visible(&self, cell: CellCoord) -> bool {
        self.cell_center(cell).y + self.bounds.radius > 0.0
    }

    pub fn visible_count(&self) -> usize {
        self.bubbles.keys().filter(|c| self.is_visible(**c)).count()
    }

    /// Distinct colors among visible anchored bubbles, in palette order.
    pub fn colors_present(&self) -> Vec<BubbleColor> {
        let mut colors: Vec<BubbleColor> = self
            .bubbles
            .iter()
            .filter(|(c, _)| self.is_visible(**c))
            .map(|(_, b)| b.color)
            .collect();
        colors.sort();
        colors.dedup();
        colors
    }

    /// Screen y of the lowest anchored bubble's bottom edge.
    pub fn lowest_edge(&self) -> Option<f32> {
        self.bubbles
            .keys()
            .map(|c| self.cell_center(*c).y + self.bounds.radius)
            .reduce(f32::max)
    }

    /// Move anchored bubbles into the popping list.
    pub fn pop(&mut self, cells: &[CellCoord], fade_ticks: u32) -> usize {
        let mut count = 0;
        for cell in cells {
            if let Some(mut bubble) = self.bubbles.remove(cell) {
                bubble.position += Vec2::new(0.0, self.scroll_offset);
                self.popping.push(bubble.into_popping(fade_ticks));
                count += 1;
            }
        }
        count
    }

    /// Detach anchored bubbles and start them falling.
    pub fn drop_cells(&mut self, cells: &[CellCoord]) -> usize {
        let mut count = 0;
        for cell in cells {
            if let Some(mut bubble) = self.bubbles.remove(cell) {
                bubble.position += Vec2::new(0.0, self.scroll_offset);
                self.falling.push(bubble.into_falling());
                count += 1;
            }
        }
        count
    }

    pub fn popping(&self) -> &[Bubble] {
        &self.popping
    }

    pub fn falling(&self) -> &[Bubble] {
        &self.falling
    }

    /// Advance pop fades and falling bubbles by one tick.
    ///
    /// Finished entities are discarded.
    pub fn animate(&mut self, gravity: f32) {
        for bubble in &mut self.popping {
            bubble.fade_ticks = bubble.fade_ticks.saturating_sub(1);
            if bubble.fade_ticks == 0 {
                bubble.state = BubbleState::Removed;
            }
        }
        self.popping.retain(|b| b.state != BubbleState::Removed);

        let floor = self.bounds.height + self.bounds.radius;
        for bubble in &mut self.falling {
            bubble.velocity.y += gravity;
            bubble.position += bubble.velocity;
            if bubble.position.y > floor {
                bubble.state = BubbleState::Removed;
            }
        }
        self.falling.retain(|b| b.state != BubbleState::Removed);
    }

    /// Check connectivity, separation and stored positions.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        let radius = self.bounds.radius;

        let anchored = find_anchored(self);
        let mut cells: Vec<CellCoord> = self.cells().collect();
        cells.sort();

        for &cell in &cells {
            if !anchored.contains(&cell) {
                violations.push(InvariantViolation::Disconnected { cell });
            }

            let Some(bubble) = self.bubbles.get(&cell) else {
                continue;
            };
            let drift = bubble.position.distance(cell.to_pixel(radius));
            if drift > 1e-3 {
                violations.push(InvariantViolation::Misplaced { cell, drift });
            }

            // Only hex neighbors can come close, and each pair is checked once.
            for n in cell.neighbors() {
                if n <= cell {
                    continue;
                }
                if let Some(other) = self.bubbles.get(&n) {
                    let distance = bubble.position.distance(other.position);
                    if distance < MIN_SEPARATION * 2.0 * radius {
                        violations.push(InvariantViolation::Overlap {
                            a: cell,
                            b: n,
                            distance,
                        });
                    }
                }
            }
        }

        violations
    }

    /// Snap every anchored bubble back to its cell's derived position.
    ///
    /// Returns how many bubbles had drifted.
    pub fn resync_positions(&mut self) -> usize {
        let radius = self.bounds.radius;
        let mut fixed = 0;
        for (cell, bubble) in &mut self.bubbles {
            let expected = cell.to_pixel(radius);
            if bubble.position.distance(expected) > 1e-3 {
                bubble.position = expected;
                fixed += 1;
            }
        }
        fixed
    }
}

/// A bubble as renderers see it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BubbleSnapshot {
    /// Screen-space center.
    pub position: Vec2,
    pub color: BubbleColor,
    pub state: BubbleState,
    pub cell: Option<CellCoord>,
}

impl BubbleSnapshot {
    fn of(bubble: &Bubble, scroll: f32) -> Self {
        let position = match bubble.state {
            BubbleState::Anchored => bubble.position + Vec2::new(0.0, scroll),
            _ => bubble.position,
        };
        Self {
            position,
            color: bubble.color,
            state: bubble.state,
            cell: bubble.cell,
        }
    }
}

/// Read-only view over every entity on the field, for rendering.
#[derive(Debug, Clone, Copy)]
pub struct FieldView<'a> {
    store: &'a FieldStore,
    flying: Option<&'a Bubble>,
}

impl<'a> FieldView<'a> {
    pub fn new(store: &'a FieldStore, flying: Option<&'a Bubble>) -> Self {
        Self { store, flying }
    }

    pub fn bounds(&self) -> FieldBounds {
        self.store.bounds
    }

    pub fn scroll_offset(&self) -> f32 {
        self.store.scroll_offset
    }

    pub fn anchored(self) -> impl Iterator<Item = BubbleSnapshot> + 'a {
        let scroll = self.store.scroll_offset;
        self.store
            .bubbles
            .values()
            .map(move |b| BubbleSnapshot::of(b, scroll))
    }

    pub fn flying(self) -> Option<BubbleSnapshot> {
        self.flying.map(|b| BubbleSnapshot::of(b, 0.0))
    }

    pub fn popping(self) -> impl Iterator<Item = BubbleSnapshot> + 'a {
        self.store.popping.iter().map(|b| BubbleSnapshot::of(b, 0.0))
    }

    pub fn falling(self) -> impl Iterator<Item = BubbleSnapshot> + 'a {
        self.store.falling.iter().map(|b| BubbleSnapshot::of(b, 0.0))
    }

    /// Every entity, anchored first.
    pub fn all(self) -> impl Iterator<Item = BubbleSnapshot> + 'a {
        self.anchored()
            .chain(self.flying())
            .chain(self.popping())
            .chain(self.falling())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::hex::BUBBLE_RADIUS;

    fn bounds() -> FieldBounds {
        FieldBounds {
            columns: 8,
            radius: BUBBLE_RADIUS,
            height: 640.0,
        }
    }

    #[test]
    fn test_insert_and_remove() {
        let mut store = FieldStore::new(bounds());
        let cell = CellCoord::new(0, 2);
        assert!(store.insert(cell, BubbleColor::Red).is_none());
        assert!(store.is_occupied(cell));
        assert_eq!(store.color_at(cell), Some(BubbleColor::Red));
        assert_eq!(store.len(), 1);
        assert!(store.remove(cell).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_push_top_row_moves_anchor() {
        let mut store = FieldStore::new(bounds());
        store.insert(CellCoord::new(0, 0), BubbleColor::Red);
        let row = store.push_top_row(&[BubbleColor::Blue; 8]);
        assert_eq!(row, -1);
        assert_eq!(store.top_row(), -1);
        assert_eq!(store.anchor_row_cells().len(), 8);
        assert_eq!(store.relative_row(CellCoord::new(0, 0)), 1);
    }

    #[test]
    fn test_scroll_moves_screen_positions_only() {
        let mut store = FieldStore::new(bounds());
        let cell = CellCoord::new(1, 1);
        store.insert(cell, BubbleColor::Green);
        let before = store.cell_center(cell);
        store.add_scroll(10.0);
        assert_eq!(store.cell_center(cell).y, before.y + 10.0);
        assert_eq!(store.get(cell).unwrap().position, cell.to_pixel(BUBBLE_RADIUS));
        assert_eq!(store.cell_at(store.cell_center(cell)), cell);
    }

    #[test]
    fn test_hidden_rows_are_not_visible() {
        let mut store = FieldStore::new(bounds());
        store.insert(CellCoord::new(0, 0), BubbleColor::Red);
        store.push_top_row(&[BubbleColor::Blue; 8]);
        store.push_top_row(&[BubbleColor::Blue; 8]);
        assert_eq!(store.len(), 17);
        // Row -1 pokes into view, row -2 is fully above the top boundary.
        assert_eq!(store.visible_count(), 9);
        assert_eq!(store.colors_present(), vec![BubbleColor::Red, BubbleColor::Blue]);
    }

    #[test]
    fn test_popping_fades_out() {
        let mut store = FieldStore::new(bounds());
        let cell = CellCoord::new(0, 0);
        store.insert(cell, BubbleColor::Red);
        assert_eq!(store.pop(&[cell], 2), 1);
        assert!(store.is_empty());
        store.animate(0.5);
        assert_eq!(store.popping().len(), 1);
        store.animate(0.5);
        assert!(store.popping().is_empty());
    }

    #[test]
    fn test_falling_leaves_the_field() {
        let mut store = FieldStore::new(bounds());
        let cell = CellCoord::new(0, 0);
        store.insert(cell, BubbleColor::Red);
        store.drop_cells(&[cell]);
        assert_eq!(store.falling().len(), 1);
        for _ in 0..200 {
            store.animate(0.5);
        }
        assert!(store.falling().is_empty());
    }

    #[test]
    fn test_invariants_detect_disconnection() {
        let mut store = FieldStore::new(bounds());
        store.insert(CellCoord::new(0, 0), BubbleColor::Red);
        store.insert(CellCoord::new(1, 0), BubbleColor::Red);
        assert!(store.check_invariants().is_empty());

        store.insert(CellCoord::new(5, 5), BubbleColor::Blue);
        assert_eq!(
            store.check_invariants(),
            vec![InvariantViolation::Disconnected {
                cell: CellCoord::new(5, 5)
            }]
        );
    }

    #[test]
    fn test_resync_fixes_drift() {
        let mut store = FieldStore::new(bounds());
        let cell = CellCoord::new(0, 3);
        store.insert(cell, BubbleColor::Red);
        store.bubbles.get_mut(&cell).unwrap().position.x += 5.0;
        assert!(matches!(
            store.check_invariants()[0],
            InvariantViolation::Misplaced { .. }
        ));
        assert_eq!(store.resync_positions(), 1);
        assert!(store.check_invariants().is_empty());
    }

    #[test]
    fn test_view_applies_scroll_to_anchored() {
        let mut store = FieldStore::new(bounds());
        let cell = CellCoord::new(0, 0);
        store.insert(cell, BubbleColor::Red);
        store.add_scroll(7.0);
        let view = FieldView::new(&store, None);
        let snap = view.anchored().next().unwrap();
        assert_eq!(snap.position, store.cell_center(cell));
        assert_eq!(view.all().count(), 1);
    }
}
