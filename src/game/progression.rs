//! Field progression - pushing the field toward the danger line.
//!
//! Two strategies share one trigger: the field advances after enough missed
//! shots or enough elapsed time.
//! - [`DiscreteShift`] injects a whole row on each trigger.
//! - [`BufferedScroll`] scrolls every tick and materializes rows from a
//!   pre-generated reserve as they come into view.

use bevy::prelude::*;
use rand::rngs::StdRng;
use std::collections::VecDeque;

use super::{
    bubble::{BubbleColor, generate_row},
    config::{FieldConfig, ProgressionKind},
    grid::FieldStore,
    hex::CellCoord,
};

pub(super) fn plugin(app: &mut App) {
    app.add_message::<FieldAdvanced>();
}

/// Message sent when the field has been pushed down.
#[derive(Message, Debug, Clone, PartialEq)]
pub struct FieldAdvanced {
    pub kind: ProgressionKind,
    /// Rows materialized at the top during this advance.
    pub rows_added: u32,
    pub scroll_offset: f32,
    pub top_row: i32,
}

/// Where the advance trigger stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerPhase {
    #[default]
    Idle,
    /// A threshold was reached; the field advances this tick.
    Armed,
    /// The field advanced and the counters were reset.
    Applied,
}

/// Counts missed shots and elapsed time until the field should advance.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceTrigger {
    shots_per_advance: u32,
    seconds_per_advance: Option<f32>,
    misses: u32,
    elapsed: f32,
    phase: TriggerPhase,
}

impl AdvanceTrigger {
    pub fn new(shots_per_advance: u32, seconds_per_advance: Option<f32>) -> Self {
        Self {
            shots_per_advance,
            seconds_per_advance,
            misses: 0,
            elapsed: 0.0,
            phase: TriggerPhase::Idle,
        }
    }

    pub fn phase(&self) -> TriggerPhase {
        self.phase
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    /// A shot resolved. Only misses count toward the shot threshold.
    pub fn record_shot(&mut self, matched: bool) {
        if !matched {
            self.misses += 1;
        }
    }

    /// Let `dt` seconds pass and report whether the trigger is armed.
    pub fn tick(&mut self, dt: f32) -> bool {
        if self.phase == TriggerPhase::Applied {
            self.phase = TriggerPhase::Idle;
        }
        self.elapsed += dt;

        let shots_reached = self.shots_per_advance > 0 && self.misses >= self.shots_per_advance;
        let time_reached = self
            .seconds_per_advance
            .is_some_and(|limit| self.elapsed >= limit);
        if shots_reached || time_reached {
            self.phase = TriggerPhase::Armed;
        }

        self.phase == TriggerPhase::Armed
    }

    /// The field advanced; start counting again.
    pub fn applied(&mut self) {
        self.misses = 0;
        self.elapsed = 0.0;
        self.phase = TriggerPhase::Applied;
    }
}

/// A strategy for pushing the field down.
pub trait FieldProgressor: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> ProgressionKind;

    fn trigger(&self) -> &AdvanceTrigger;

    /// Set up anything the strategy needs before the first tick.
    fn prepare(&mut self, store: &mut FieldStore, rng: &mut StdRng);

    /// A shot resolved, matching or not.
    fn record_shot(&mut self, matched: bool);

    /// Run once per tick, after shots and pops have been resolved.
    fn advance(
        &mut self,
        store: &mut FieldStore,
        rng: &mut StdRng,
        dt: f32,
    ) -> Option<FieldAdvanced>;
}

/// Build the strategy a config asks for.
pub fn for_config(config: &FieldConfig) -> Box<dyn FieldProgressor> {
    let preset = config.preset();
    let trigger = AdvanceTrigger::new(preset.shots_per_advance, preset.seconds_per_advance);
    let rows = RowPalette {
        palette_size: preset.palette_size,
        bias: config.cluster_bias,
    };

    match config.progression_kind() {
        ProgressionKind::DiscreteShift => Box::new(DiscreteShift::new(trigger, rows)),
        ProgressionKind::BufferedScroll => Box::new(BufferedScroll::new(
            trigger,
            rows,
            config.scroll_speed,
            config.reserve_rows,
            config.lookahead_rows,
        )),
    }
}

/// How new rows are colored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowPalette {
    pub palette_size: usize,
    pub bias: f64,
}

/// Inject a new row at the top and shift the field down one row height.
#[derive(Debug, Clone)]
pub struct DiscreteShift {
    trigger: AdvanceTrigger,
    rows: RowPalette,
}

impl DiscreteShift {
    pub fn new(trigger: AdvanceTrigger, rows: RowPalette) -> Self {
        Self { trigger, rows }
    }
}

impl FieldProgressor for DiscreteShift {
    fn kind(&self) -> ProgressionKind {
        ProgressionKind::DiscreteShift
    }

    fn trigger(&self) -> &AdvanceTrigger {
        &self.trigger
    }

    fn prepare(&mut self, _store: &mut FieldStore, _rng: &mut StdRng) {}

    fn record_shot(&mut self, matched: bool) {
        self.trigger.record_shot(matched);
    }

    fn advance(
        &mut self,
        store: &mut FieldStore,
        rng: &mut StdRng,
        dt: f32,
    ) -> Option<FieldAdvanced> {
        if !self.trigger.tick(dt) {
            return None;
        }

        let bounds = store.bounds();
        let row = store.top_row() - 1;
        let colors = generate_row(
            rng,
            row,
            bounds.columns,
            self.rows.palette_size,
            self.rows.bias,
            |c| store.color_at(c),
        );
        store.push_top_row(&colors);
        store.add_scroll(bounds.row_height());
        self.trigger.applied();

        info!("Field shifted down, new top row {}", store.top_row());
        Some(FieldAdvanced {
            kind: ProgressionKind::DiscreteShift,
            rows_added: 1,
            scroll_offset: store.scroll_offset(),
            top_row: store.top_row(),
        })
    }
}

/// Scroll continuously, materializing reserve rows above the visible area.
#[derive(Debug, Clone)]
pub struct BufferedScroll {
    trigger: AdvanceTrigger,
    rows: RowPalette,
    /// Pixels per second.
    speed: f32,
    /// Pre-generated rows; the front is the next one to materialize.
    reserve: VecDeque<Vec<BubbleColor>>,
    reserve_target: usize,
    lookahead_rows: i32,
    /// Scroll accumulated since the last row was materialized.
    pending: f32,
}

impl BufferedScroll {
    pub fn new(
        trigger: AdvanceTrigger,
        rows: RowPalette,
        speed: f32,
        reserve_target: usize,
        lookahead_rows: i32,
    ) -> Self {
        Self {
            trigger,
            rows,
            speed,
            reserve: VecDeque::new(),
            reserve_target: reserve_target.max(1),
            lookahead_rows,
            pending: 0.0,
        }
    }

    pub fn reserve_len(&self) -> usize {
        self.reserve.len()
    }

    /// Generate rows until the reserve is full again.
    ///
    /// Reserve rows materialize in order directly above the anchor row, so
    /// each one is colored against the row it will sit on.
    fn refill(&mut self, store: &FieldStore, rng: &mut StdRng) {
        let columns = store.bounds().columns;
        while self.reserve.len() < self.reserve_target {
            let row = store.top_row() - 1 - self.reserve.len() as i32;
            let below = self.reserve.back();
            let colors = generate_row(
                rng,
                row,
                columns,
                self.rows.palette_size,
                self.rows.bias,
                |c: CellCoord| match below {
                    Some(below) if c.row == row + 1 => usize::try_from(c.col)
                        .ok()
                        .and_then(|i| below.get(i))
                        .copied(),
                    _ => store.color_at(c),
                },
            );
            self.reserve.push_back(colors);
        }
    }

    fn materialize(&mut self, store: &mut FieldStore, rng: &mut StdRng) {
        if self.reserve.is_empty() {
            debug!("Row reserve exhausted, regenerating {} rows", self.reserve_target);
            self.refill(store, rng);
        }
        if let Some(colors) = self.reserve.pop_front() {
            store.push_top_row(&colors);
        }
    }
}

impl FieldProgressor for BufferedScroll {
    fn kind(&self) -> ProgressionKind {
        ProgressionKind::BufferedScroll
    }

    fn trigger(&self) -> &AdvanceTrigger {
        &self.trigger
    }

    fn prepare(&mut self, store: &mut FieldStore, rng: &mut StdRng) {
        self.refill(store, rng);
        for _ in 0..self.lookahead_rows {
            self.materialize(store, rng);
        }
    }

    fn record_shot(&mut self, matched: bool) {
        self.trigger.record_shot(matched);
    }

    fn advance(
        &mut self,
        store: &mut FieldStore,
        rng: &mut StdRng,
        dt: f32,
    ) -> Option<FieldAdvanced> {
        let row_height = store.bounds().row_height();

        let mut push = self.speed * dt;
        let triggered = self.trigger.tick(dt);
        if triggered {
            push += row_height;
            self.trigger.applied();
        }

        store.add_scroll(push);
        self.pending += push;

        let mut rows_added = 0;
        while self.pending >= row_height {
            self.pending -= row_height;
            self.materialize(store, rng);
            rows_added += 1;
        }

        if !triggered && rows_added == 0 {
            return None;
        }

        debug!(
            "Field scrolled to {:.1}, {} row(s) materialized",
            store.scroll_offset(),
            rows_added
        );
        Some(FieldAdvanced {
            kind: ProgressionKind::BufferedScroll,
            rows_added,
            scroll_offset: store.scroll_offset(),
            top_row: store.top_row(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{grid::FieldBounds, hex::BUBBLE_RADIUS};
    use rand::SeedableRng;

    const DT: f32 = 1.0 / 60.0;

    fn filled_store(rows: i32) -> FieldStore {
        let mut store = FieldStore::new(FieldBounds {
            columns: 8,
            radius: BUBBLE_RADIUS,
            height: 640.0,
        });
        for row in 0..rows {
            for col in 0..8 {
                store.insert(CellCoord::new(row, col), BubbleColor::ALL[(row + col) as usize % 4]);
            }
        }
        store
    }

    fn rows() -> RowPalette {
        RowPalette {
            palette_size: 4,
            bias: 0.3,
        }
    }

    #[test]
    fn test_trigger_phases() {
        let mut trigger = AdvanceTrigger::new(2, None);
        assert!(!trigger.tick(DT));
        assert_eq!(trigger.phase(), TriggerPhase::Idle);

        trigger.record_shot(true);
        trigger.record_shot(false);
        assert!(!trigger.tick(DT));
        trigger.record_shot(false);
        assert!(trigger.tick(DT));
        assert_eq!(trigger.phase(), TriggerPhase::Armed);

        trigger.applied();
        assert_eq!(trigger.phase(), TriggerPhase::Applied);
        assert_eq!(trigger.misses(), 0);
        assert!(!trigger.tick(DT));
        assert_eq!(trigger.phase(), TriggerPhase::Idle);
    }

    #[test]
    fn test_time_trigger() {
        let mut trigger = AdvanceTrigger::new(10, Some(1.0));
        for _ in 0..59 {
            assert!(!trigger.tick(DT));
        }
        assert!(trigger.tick(DT * 1.5));
    }

    #[test]
    fn test_discrete_shift_after_ten_misses() {
        let mut store = filled_store(4);
        let mut rng = StdRng::seed_from_u64(1);
        let mut progressor = DiscreteShift::new(AdvanceTrigger::new(10, None), rows());
        progressor.prepare(&mut store, &mut rng);

        let before: Vec<(CellCoord, f32, i32)> = store
            .cells()
            .map(|c| (c, store.cell_center(c).y, store.relative_row(c)))
            .collect();
        let count = store.len();

        for _ in 0..9 {
            progressor.record_shot(false);
        }
        assert!(progressor.advance(&mut store, &mut rng, DT).is_none());

        progressor.record_shot(false);
        let advanced = progressor.advance(&mut store, &mut rng, DT).unwrap();
        assert_eq!(advanced.rows_added, 1);
        assert_eq!(store.len(), count + 8);
        assert_eq!(store.top_row(), -1);

        let row_height = store.bounds().row_height();
        for (cell, y, relative) in before {
            assert!((store.cell_center(cell).y - y - row_height).abs() < 1e-3);
            assert_eq!(store.relative_row(cell), relative + 1);
        }
        assert!(store.check_invariants().is_empty());

        // Counters were reset.
        assert!(progressor.advance(&mut store, &mut rng, DT).is_none());
        assert_eq!(store.top_row(), -1);
    }

    #[test]
    fn test_buffered_scroll_after_ten_misses() {
        let mut store = filled_store(4);
        let mut rng = StdRng::seed_from_u64(2);
        let mut progressor =
            BufferedScroll::new(AdvanceTrigger::new(10, None), rows(), 0.0, 8, 2);
        progressor.prepare(&mut store, &mut rng);

        // Two hidden-ish rows above the field, nothing scrolled yet.
        assert_eq!(store.top_row(), -2);
        assert_eq!(store.scroll_offset(), 0.0);
        assert_eq!(progressor.reserve_len(), 6);

        let before: Vec<(CellCoord, f32)> =
            store.cells().map(|c| (c, store.cell_center(c).y)).collect();
        let count = store.len();

        for _ in 0..10 {
            progressor.record_shot(false);
        }
        let advanced = progressor.advance(&mut store, &mut rng, DT).unwrap();
        assert_eq!(advanced.rows_added, 1);
        assert_eq!(store.len(), count + 8);
        assert_eq!(store.top_row(), -3);

        let row_height = store.bounds().row_height();
        for (cell, y) in before {
            assert!((store.cell_center(cell).y - y - row_height).abs() < 1e-3);
        }
        assert!(store.check_invariants().is_empty());
    }

    #[test]
    fn test_continuous_scroll_materializes_rows() {
        let mut store = filled_store(2);
        let mut rng = StdRng::seed_from_u64(3);
        // One row height per second.
        let speed = BUBBLE_RADIUS * crate::game::hex::SQRT_3;
        let mut progressor = BufferedScroll::new(AdvanceTrigger::new(0, None), rows(), speed, 4, 1);
        progressor.prepare(&mut store, &mut rng);
        assert_eq!(store.top_row(), -1);

        let mut added = 0;
        for _ in 0..(60 * 10 + 5) {
            if let Some(advance) = progressor.advance(&mut store, &mut rng, DT) {
                added += advance.rows_added;
            }
        }
        // The reserve of 4 ran out twice and was regenerated on demand.
        assert_eq!(added, 10);
        assert_eq!(store.top_row(), -11);
        assert!(store.check_invariants().is_empty());
    }

    #[test]
    fn test_reserve_rows_stay_in_palette() {
        let mut store = filled_store(1);
        let mut rng = StdRng::seed_from_u64(4);
        let mut progressor = BufferedScroll::new(AdvanceTrigger::new(1, None), rows(), 0.0, 16, 0);
        progressor.prepare(&mut store, &mut rng);
        for _ in 0..16 {
            progressor.record_shot(false);
            progressor.advance(&mut store, &mut rng, DT);
        }
        let palette = BubbleColor::palette(4);
        assert!(store.iter().all(|(_, b)| palette.contains(&b.color)));
        assert_eq!(store.len(), 8 * 17);
    }

    #[test]
    fn test_for_config_picks_strategy() {
        let config = FieldConfig {
            mode: crate::game::config::GameMode::Endless,
            ..Default::default()
        };
        assert_eq!(for_config(&config).kind(), ProgressionKind::BufferedScroll);
        assert_eq!(
            for_config(&FieldConfig::default()).kind(),
            ProgressionKind::DiscreteShift
        );
    }
}
