//! Cluster detection - finding and popping matching bubbles, then dropping
//! whatever no longer hangs from the anchor row.
//!
//! Both passes are breadth-first searches over hex adjacency with an explicit
//! queue and visited set, so region size is bounded only by memory.

use bevy::prelude::*;
use std::collections::{HashSet, VecDeque};

use super::{bubble::BubbleColor, grid::FieldStore, hex::CellCoord};

pub(super) fn plugin(app: &mut App) {
    app.add_message::<ClusterPopped>();
    app.add_message::<FloatingBubblesRemoved>();
}

/// Minimum cluster size to pop (match-3).
pub const POP_THRESHOLD: usize = 3;

/// Message sent when a cluster is popped.
#[derive(Message, Debug, Clone, PartialEq)]
pub struct ClusterPopped {
    pub cells: Vec<CellCoord>,
    pub color: BubbleColor,
    pub count: usize,
}

/// Message sent when bubbles cut off from the anchor row start falling.
#[derive(Message, Debug, Clone, PartialEq)]
pub struct FloatingBubblesRemoved {
    pub cells: Vec<CellCoord>,
    pub count: usize,
}

/// Find all connected bubbles sharing the color of the bubble at `start`.
///
/// Returns an empty list if `start` is not occupied.
pub fn find_cluster(store: &FieldStore, start: CellCoord) -> Vec<CellCoord> {
    let Some(target_color) = store.color_at(start) else {
        return Vec::new();
    };

    let mut cluster = Vec::new();
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();

    visited.insert(start);
    queue.push_back(start);

    while let Some(cell) = queue.pop_front() {
        if store.color_at(cell) != Some(target_color) {
            continue;
        }
        cluster.push(cell);

        for neighbor in cell.neighbors() {
            if visited.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }

    cluster
}

/// Pop the cluster around a freshly placed bubble if it reaches the threshold.
///
/// A smaller region is left untouched and `None` is returned: the shot missed.
pub fn pop_cluster(
    store: &mut FieldStore,
    placed: CellCoord,
    fade_ticks: u32,
) -> Option<ClusterPopped> {
    let color = store.color_at(placed)?;
    let mut cells = find_cluster(store, placed);

    if cells.len() < POP_THRESHOLD {
        debug!("{} {:?} bubble(s) at {}, no match", cells.len(), color, placed);
        return None;
    }

    cells.sort();
    let count = store.pop(&cells, fade_ticks);
    info!("Found cluster of {} {:?} bubbles at {}", count, color, placed);

    Some(ClusterPopped {
        cells,
        color,
        count,
    })
}

/// Find all bubbles connected to the anchor row using BFS.
pub fn find_anchored(store: &FieldStore) -> HashSet<CellCoord> {
    let mut anchored = HashSet::new();
    let mut queue = VecDeque::new();

    for cell in store.anchor_row_cells() {
        anchored.insert(cell);
        queue.push_back(cell);
    }

    while let Some(cell) = queue.pop_front() {
        for neighbor in cell.neighbors() {
            if store.is_occupied(neighbor) && anchored.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }

    anchored
}

/// Occupied cells with no path to the anchor row, sorted.
pub fn find_floating(store: &FieldStore) -> Vec<CellCoord> {
    let anchored = find_anchored(store);
    let mut floating: Vec<CellCoord> = store.cells().filter(|c| !anchored.contains(c)).collect();
    floating.sort();
    floating
}

/// Detach every floating bubble so it falls. Runs right after a pop.
pub fn drop_floating(store: &mut FieldStore) -> Option<FloatingBubblesRemoved> {
    let cells = find_floating(store);
    if cells.is_empty() {
        return None;
    }

    let count = store.drop_cells(&cells);
    info!("Found {} floating bubbles to remove", count);

    Some(FloatingBubblesRemoved { cells, count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{bubble::BubbleColor::*, grid::FieldBounds, hex::BUBBLE_RADIUS};

    fn store(columns: i32) -> FieldStore {
        FieldStore::new(FieldBounds {
            columns,
            radius: BUBBLE_RADIUS,
            height: 640.0,
        })
    }

    fn place(store: &mut FieldStore, cells: &[(i32, i32)], color: BubbleColor) {
        for &(row, col) in cells {
            store.insert(CellCoord::new(row, col), color);
        }
    }

    #[test]
    fn test_cluster_follows_color_only() {
        let mut field = store(8);
        place(&mut field, &[(0, 0), (0, 1), (0, 2)], Red);
        place(&mut field, &[(0, 3)], Blue);
        place(&mut field, &[(0, 4)], Red);

        let mut cluster = find_cluster(&field, CellCoord::new(0, 1));
        cluster.sort();
        assert_eq!(
            cluster,
            vec![CellCoord::new(0, 0), CellCoord::new(0, 1), CellCoord::new(0, 2)]
        );
    }

    #[test]
    fn test_pop_removes_exactly_the_component() {
        let mut field = store(8);
        place(&mut field, &[(0, 0), (0, 1), (0, 2), (0, 3)], Green);
        // Same color, but not connected to the landed bubble.
        place(&mut field, &[(0, 6), (0, 7)], Red);
        place(&mut field, &[(0, 5)], Blue);
        place(&mut field, &[(1, 0)], Red);
        place(&mut field, &[(0, 4)], Red);
        place(&mut field, &[(1, 3)], Red);

        // The red component around (1, 3) is {(1, 3), (0, 4)}: too small.
        assert!(pop_cluster(&mut field, CellCoord::new(1, 3), 10).is_none());
        assert_eq!(field.len(), 10);

        place(&mut field, &[(1, 4)], Red);
        let popped = pop_cluster(&mut field, CellCoord::new(1, 4), 10).unwrap();
        assert_eq!(popped.count, 3);
        assert_eq!(popped.color, Red);
        assert!(!field.is_occupied(CellCoord::new(0, 4)));
        assert!(field.is_occupied(CellCoord::new(0, 6)));
        assert!(field.is_occupied(CellCoord::new(1, 0)));
        assert_eq!(field.popping().len(), 3);
    }

    #[test]
    fn test_small_region_is_untouched() {
        let mut field = store(8);
        place(&mut field, &[(0, 0), (0, 1)], Yellow);
        assert!(pop_cluster(&mut field, CellCoord::new(0, 1), 10).is_none());
        assert_eq!(field.len(), 2);
        assert!(field.popping().is_empty());
    }

    #[test]
    fn test_huge_cluster_does_not_recurse() {
        let mut field = store(100);
        for row in 0..100 {
            for col in 0..100 {
                field.insert(CellCoord::new(row, col), Purple);
            }
        }
        assert_eq!(find_cluster(&field, CellCoord::new(50, 50)).len(), 10_000);
    }

    #[test]
    fn test_bridge_drop() {
        // (0, 2) is a red bridge holding a blue cluster of 5. Yellows keep
        // the anchor row alive elsewhere.
        let mut field = store(8);
        place(&mut field, &[(0, 1), (0, 2)], Red);
        place(&mut field, &[(0, 6), (0, 7)], Yellow);
        let blues = [(1, 2), (2, 2), (2, 3), (3, 2), (4, 2)];
        place(&mut field, &blues, Blue);
        assert!(find_floating(&field).is_empty());

        // A red landing at (1, 1) touches both reds.
        place(&mut field, &[(1, 1)], Red);
        let popped = pop_cluster(&mut field, CellCoord::new(1, 1), 10).unwrap();
        assert_eq!(popped.count, 3);

        let dropped = drop_floating(&mut field).unwrap();
        assert_eq!(dropped.count, 5);
        let mut expected: Vec<CellCoord> =
            blues.iter().map(|&(r, c)| CellCoord::new(r, c)).collect();
        expected.sort();
        assert_eq!(dropped.cells, expected);
        assert_eq!(field.len(), 2);
        assert_eq!(field.falling().len(), 5);
        assert!(field.check_invariants().is_empty());
    }

    #[test]
    fn test_empty_anchor_row_drops_everything() {
        let mut field = store(8);
        place(&mut field, &[(1, 0), (2, 0)], Green);
        let dropped = drop_floating(&mut field).unwrap();
        assert_eq!(dropped.count, 2);
        assert!(field.is_empty());
    }

    #[test]
    fn test_anchor_follows_injected_rows() {
        let mut field = store(8);
        place(&mut field, &[(0, 0)], Green);
        field.push_top_row(&[Blue; 8]);
        // (0, 0) now hangs from row -1; an isolated bubble further down does not.
        place(&mut field, &[(4, 4)], Red);
        assert_eq!(find_floating(&field), vec![CellCoord::new(4, 4)]);
    }
}
