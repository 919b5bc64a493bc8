//! Snapping a landed projectile into the field.
//!
//! The contact point only gives an estimate of the target cell. Empty cells in
//! a small window around it are scored by real distance, and cells that hang
//! from the field win over closer cells that would float.

use bevy::prelude::*;

use super::{
    bubble::BubbleColor,
    error::PlacementError,
    grid::{FieldStore, MIN_SEPARATION},
    hex::CellCoord,
};

/// How many rows and columns around the estimate are searched.
const SEARCH_RADIUS: i32 = 2;

/// Rows below the anchor row searched by the disconnected fallback.
const FALLBACK_ROWS: i32 = 2;

/// Where a landed bubble ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub cell: CellCoord,
    /// False only for the fallback path: the bubble may float until the next
    /// connectivity pass.
    pub connected: bool,
}

/// Pick the cell for a projectile that touched the field at `contact`.
///
/// `hit` is the occupant that stopped it, if any.
pub fn resolve(
    store: &FieldStore,
    contact: Vec2,
    hit: Option<CellCoord>,
) -> Result<Placement, PlacementError> {
    let estimate = store.cell_at(contact);

    let attachable: Vec<CellCoord> = ((estimate.row - SEARCH_RADIUS)
        ..=(estimate.row + SEARCH_RADIUS))
        .flat_map(|row| {
            ((estimate.col - SEARCH_RADIUS)..=(estimate.col + SEARCH_RADIUS))
                .map(move |col| CellCoord::new(row, col))
        })
        .filter(|&c| store.is_attachable(c))
        .collect();

    // Hidden anchor rows above the top boundary only take the bubble when
    // nothing on screen can.
    let connected = nearest(
        store,
        contact,
        attachable.iter().copied().filter(|&c| store.is_visible(c)),
    )
    .or_else(|| nearest(store, contact, attachable.iter().copied()))
    .or_else(|| {
        // The estimate can be off for glancing hits; the occupant's own empty
        // neighbors are always attachable.
        hit.and_then(|h| nearest(store, contact, h.neighbors().into_iter()))
    });

    if let Some(cell) = connected {
        return Ok(Placement {
            cell,
            connected: true,
        });
    }

    let top = store.top_row();
    let columns = store.bounds().columns;
    let fallback = (top..top + FALLBACK_ROWS)
        .flat_map(|row| (0..columns).map(move |col| CellCoord::new(row, col)));

    match nearest(store, contact, fallback) {
        Some(cell) => {
            warn!(
                "No connected cell near {}, placing at {} without connection",
                estimate, cell
            );
            Ok(Placement {
                connected: store.is_attachable(cell),
                cell,
            })
        }
        None => Err(PlacementError::NoFreeCell { near: estimate }),
    }
}

/// Resolve a placement and anchor the bubble there.
pub fn place(
    store: &mut FieldStore,
    color: BubbleColor,
    contact: Vec2,
    hit: Option<CellCoord>,
) -> Result<Placement, PlacementError> {
    let placement = resolve(store, contact, hit)?;
    store.insert(placement.cell, color);
    debug!("Bubble landed at {} with color {:?}", placement.cell, color);
    Ok(placement)
}

/// The legal candidate closest to `contact`. Ties keep the first candidate.
fn nearest(
    store: &FieldStore,
    contact: Vec2,
    candidates: impl Iterator<Item = CellCoord>,
) -> Option<CellCoord> {
    candidates
        .filter(|&c| is_legal(store, c))
        .map(|c| (c, store.cell_center(c).distance_squared(contact)))
        .fold(None, |best: Option<(CellCoord, f32)>, (c, d)| match best {
            Some((_, best_d)) if best_d <= d => best,
            _ => Some((c, d)),
        })
        .map(|(c, _)| c)
}

/// Empty, inside the field, and not overlapping any neighbor.
fn is_legal(store: &FieldStore, cell: CellCoord) -> bool {
    if !store.contains(cell) || store.is_occupied(cell) {
        return false;
    }

    let center = store.cell_center(cell);
    let min_distance = MIN_SEPARATION * 2.0 * store.bounds().radius;
    cell.neighbors()
        .iter()
        .filter(|n| store.is_occupied(**n))
        .all(|n| store.cell_center(*n).distance(center) >= min_distance)
}
