//! One game session on the bubble field.
//!
//! [`BubbleField`] owns every part of the engine and advances them together,
//! one fixed tick at a time:
//! input, flight, snap, match, reap, animation, progression, then win/lose.
//! The Bevy systems below only feed it input and publish what happened.

use bevy::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{
    bubble::{BubbleColor, generate_row},
    cluster::{self, ClusterPopped, FloatingBubblesRemoved},
    config::FieldConfig,
    error::InvariantViolation,
    grid::{FieldBounds, FieldStore, FieldView},
    hex::CellCoord,
    highscore::{ScoreRecord, persist_high_scores},
    progression::{self, FieldAdvanced, FieldProgressor},
    projectile::{FlightOutcome, ProjectileSimulator},
    shooter::{AimAt, FireShot, Shooter},
    snap,
    state::{GameEnded, GameRules, GameScore, GameStateMachine, GameStatus, SessionClock},
};

pub(super) fn plugin(app: &mut App) {
    app.add_message::<StartGame>();
    app.add_message::<RestartGame>();
    app.add_message::<BubbleLanded>();

    app.init_resource::<TickInput>();
    app.init_resource::<TickReport>();

    app.add_systems(
        FixedUpdate,
        (collect_input, run_tick, publish_report, persist_high_scores)
            .chain()
            .in_set(FieldSystems),
    );
}

/// The fixed-tick systems that drive the field.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldSystems;

/// Leave the ready state and start playing.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartGame;

/// Throw the current session away and build a fresh one.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestartGame;

/// Message sent when a shot has been snapped into the field.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BubbleLanded {
    pub cell: CellCoord,
    pub color: BubbleColor,
    /// False when no connected cell was free and the bubble was parked.
    pub connected: bool,
}

/// Input gathered for the next tick.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq)]
pub struct TickInput {
    pub aim: Option<Vec2>,
    pub fire: bool,
    pub start: bool,
    pub restart: bool,
}

/// Everything that happened during one tick.
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub landed: Option<BubbleLanded>,
    pub popped: Option<ClusterPopped>,
    pub dropped: Option<FloatingBubblesRemoved>,
    pub advanced: Option<FieldAdvanced>,
    pub ended: Option<GameEnded>,
    /// Invariant violations found (and corrected) at the end of the tick.
    pub repaired: usize,
}

/// The whole engine for one session.
#[derive(Resource, Debug)]
pub struct BubbleField {
    config: FieldConfig,
    seed: u64,
    store: FieldStore,
    projectile: ProjectileSimulator,
    progressor: Box<dyn FieldProgressor>,
    rng: StdRng,
    shooter: Shooter,
    score: GameScore,
    state: GameStateMachine,
    ticks: u64,
    elapsed: f32,
}

impl BubbleField {
    /// Build a ready session: initial rows filled, shooter loaded.
    pub fn new(config: FieldConfig) -> Self {
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = StdRng::seed_from_u64(seed);
        let preset = config.preset();

        let mut store = FieldStore::new(FieldBounds {
            columns: config.columns,
            radius: config.bubble_radius,
            height: config.field_height,
        });
        for row in 0..preset.initial_rows {
            let colors = generate_row(
                &mut rng,
                row,
                config.columns,
                preset.palette_size,
                config.cluster_bias,
                |c| store.color_at(c),
            );
            for (col, color) in colors.into_iter().enumerate() {
                store.insert(CellCoord::new(row, col as i32), color);
            }
        }

        let mut progressor = progression::for_config(&config);
        progressor.prepare(&mut store, &mut rng);

        let present = store.colors_present();
        let loaded = BubbleColor::random_weighted(&mut rng, &present, preset.palette_size);
        let next = BubbleColor::random_weighted(&mut rng, &present, preset.palette_size);
        let shooter = Shooter::new(config.shooter_position(), config.reload_ticks, loaded, next);

        info!(
            "Field ready: {:?} {:?}, {} bubbles, {:?} progression, seed {}",
            config.mode,
            config.difficulty,
            store.len(),
            progressor.kind(),
            seed
        );

        Self {
            projectile: ProjectileSimulator::new(config.wall_restitution),
            state: GameStateMachine::new(GameRules::from_config(&config)),
            config,
            seed,
            store,
            progressor,
            rng,
            shooter,
            score: GameScore::default(),
            ticks: 0,
            elapsed: 0.0,
        }
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn store(&self) -> &FieldStore {
        &self.store
    }

    pub fn shooter(&self) -> &Shooter {
        &self.shooter
    }

    pub fn progressor(&self) -> &dyn FieldProgressor {
        self.progressor.as_ref()
    }

    pub fn score(&self) -> &GameScore {
        &self.score
    }

    pub fn status(&self) -> GameStatus {
        self.state.status()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Read-only snapshot of every entity, for rendering.
    pub fn view(&self) -> FieldView<'_> {
        FieldView::new(&self.store, self.projectile.in_flight())
    }

    pub fn start(&mut self) -> bool {
        self.state.start()
    }

    /// Rebuild the session from the same config. A fixed seed replays the
    /// same field.
    pub fn restart(&mut self) {
        info!("Restarting game");
        *self = Self::new(self.config.clone());
    }

    /// The record for the score table.
    pub fn record(&self) -> ScoreRecord {
        ScoreRecord::new(self.score.score, self.config.mode, self.config.difficulty)
    }

    /// Advance the session by one fixed tick.
    pub fn tick(&mut self, input: &TickInput) -> TickReport {
        let mut report = TickReport::default();

        if input.restart {
            self.restart();
        }
        if input.start {
            self.state.start();
        }

        match self.state.status() {
            GameStatus::Ready => return report,
            GameStatus::Won | GameStatus::Lost(_) => {
                // Let pops and falls finish after the game ends.
                self.store.animate(self.config.fall_gravity);
                return report;
            }
            GameStatus::Playing => {}
        }

        let dt = self.config.tick_seconds();
        self.ticks += 1;
        self.elapsed += dt;

        self.shooter.tick();
        if let Some(target) = input.aim {
            self.shooter.aim_at(target, self.config.field_width());
        }
        if input.fire {
            self.fire();
        }

        match self.projectile.step(&self.store) {
            FlightOutcome::Contact { color, point, hit } => {
                self.resolve_contact(color, point, hit, &mut report);
            }
            FlightOutcome::Exited { .. } => self.finish_shot(false),
            FlightOutcome::Idle | FlightOutcome::InFlight => {}
        }

        self.store.animate(self.config.fall_gravity);
        report.advanced = self
            .progressor
            .advance(&mut self.store, &mut self.rng, dt);

        self.repair(&mut report);

        let clock = SessionClock {
            elapsed: self.elapsed,
            shots_fired: self.score.shots_fired,
            shot_in_flight: !self.projectile.is_idle(),
        };
        if let Some(status) = self.state.evaluate(&self.store, clock) {
            info!(
                "GAME OVER! {:?} - Final score: {} ({} bubbles popped, {} dropped)",
                status, self.score.score, self.score.bubbles_popped, self.score.bubbles_dropped
            );
            report.ended = Some(GameEnded {
                status,
                record: self.record(),
            });
        }

        report
    }

    fn fire(&mut self) {
        if !self.projectile.is_idle() {
            return;
        }
        let Some(color) = self.shooter.fire() else {
            return;
        };
        self.projectile.launch(
            self.shooter.origin(),
            self.shooter.aim(),
            self.config.shot_speed,
            color,
        );
        self.score.shots_fired += 1;
        debug!(
            "Fired {:?} bubble (shot {}, angle {:.2})",
            color,
            self.score.shots_fired,
            self.shooter.angle()
        );
    }

    /// Snap, match and reap for a projectile that just touched the field.
    fn resolve_contact(
        &mut self,
        color: BubbleColor,
        point: Vec2,
        hit: Option<CellCoord>,
        report: &mut TickReport,
    ) {
        let placement = match snap::place(&mut self.store, color, point, hit) {
            Ok(placement) => placement,
            Err(e) => {
                warn!("Discarding shot: {}", e);
                self.finish_shot(false);
                return;
            }
        };
        report.landed = Some(BubbleLanded {
            cell: placement.cell,
            color,
            connected: placement.connected,
        });

        let popped = cluster::pop_cluster(&mut self.store, placement.cell, self.config.pop_fade_ticks);
        let matched = popped.is_some();
        if let Some(popped) = &popped {
            self.score
                .record_pop(popped.count, self.config.points_per_bubble);
        }

        // A parked bubble floats until the next connectivity pass, which is now.
        if matched || !placement.connected {
            report.dropped = cluster::drop_floating(&mut self.store);
            if matched && let Some(dropped) = &report.dropped {
                self.score.record_drop(
                    dropped.count,
                    self.config.points_per_bubble,
                    self.config.avalanche_multiplier,
                );
            }
        }

        report.popped = popped;
        self.finish_shot(matched);
    }

    /// The shot in flight is resolved; count it and reload.
    fn finish_shot(&mut self, matched: bool) {
        if !matched {
            self.score.misses += 1;
        }
        self.progressor.record_shot(matched);

        let present = self.store.colors_present();
        self.shooter
            .reload(&mut self.rng, &present, self.config.preset().palette_size);
    }

    /// Check the field and correct what can be corrected.
    fn repair(&mut self, report: &mut TickReport) {
        let violations = self.store.check_invariants();
        if violations.is_empty() {
            return;
        }

        for violation in &violations {
            warn!("Field invariant violated: {}", violation);
        }
        report.repaired = violations.len();

        let resynced = self.store.resync_positions();
        if resynced > 0 {
            warn!("Resynced {} bubble positions", resynced);
        }

        let disconnected = violations
            .iter()
            .any(|v| matches!(v, InvariantViolation::Disconnected { .. }));
        if disconnected && let Some(dropped) = cluster::drop_floating(&mut self.store) {
            if let Some(existing) = report.dropped.as_mut() {
                existing.count += dropped.count;
                existing.cells.extend(dropped.cells);
            } else {
                report.dropped = Some(dropped);
            }
        }
    }
}

/// Gather this tick's input messages.
fn collect_input(
    mut aims: MessageReader<AimAt>,
    mut fires: MessageReader<FireShot>,
    mut starts: MessageReader<StartGame>,
    mut restarts: MessageReader<RestartGame>,
    mut input: ResMut<TickInput>,
) {
    if let Some(AimAt(target)) = aims.read().last() {
        input.aim = Some(*target);
    }
    input.fire |= fires.read().count() > 0;
    input.start |= starts.read().count() > 0;
    input.restart |= restarts.read().count() > 0;
}

fn run_tick(
    mut input: ResMut<TickInput>,
    mut field: ResMut<BubbleField>,
    mut report: ResMut<TickReport>,
) {
    let input = std::mem::take(&mut *input);
    *report = field.tick(&input);
}

/// Turn the tick report into outbound messages.
fn publish_report(
    mut report: ResMut<TickReport>,
    mut landed: MessageWriter<BubbleLanded>,
    mut popped: MessageWriter<ClusterPopped>,
    mut dropped: MessageWriter<FloatingBubblesRemoved>,
    mut advanced: MessageWriter<FieldAdvanced>,
    mut ended: MessageWriter<GameEnded>,
) {
    let report = std::mem::take(&mut *report);
    if let Some(message) = report.landed {
        landed.write(message);
    }
    if let Some(message) = report.popped {
        popped.write(message);
    }
    if let Some(message) = report.dropped {
        dropped.write(message);
    }
    if let Some(message) = report.advanced {
        advanced.write(message);
    }
    if let Some(message) = report.ended {
        ended.write(message);
    }
}
