//! Headless runner: plays one session with a simple autopilot and logs the
//! result.

use std::{path::PathBuf, time::Duration};

use bevy::{app::ScheduleRunnerPlugin, log::LogPlugin, prelude::*};
use bubble_field::{
    AimAt, BubbleField, BubbleFieldPlugin, Difficulty, FieldConfig, FieldSystems, FireShot,
    GameEnded, GameMode, StartGame,
};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run a headless bubble-field session", long_about = None)]
struct Args {
    /// JSON file overriding any part of the field config.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum)]
    difficulty: Option<Difficulty>,
    #[arg(long, value_enum)]
    mode: Option<GameMode>,
    #[arg(long)]
    seed: Option<u64>,
    /// Stop after this many played ticks.
    #[arg(long, default_value_t = 36_000)]
    max_ticks: u64,
    /// Simulation speed relative to real time.
    #[arg(long, default_value_t = 8.0)]
    speed: f32,
}

/// Stop condition for the run.
#[derive(Resource, Debug, Clone, Copy)]
struct MaxTicks(u64);

#[derive(Resource, Debug, Clone, Copy)]
struct SimSpeed(f32);

fn main() -> AppExit {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match FieldConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {e}");
                return AppExit::error();
            }
        },
        None => FieldConfig::default(),
    };
    if let Some(difficulty) = args.difficulty {
        config.difficulty = difficulty;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Err(e) = config.validate() {
        eprintln!("Invalid config: {e}");
        return AppExit::error();
    }

    App::new()
        .add_plugins((
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_millis(1))),
            LogPlugin::default(),
            BubbleFieldPlugin::new(config),
        ))
        .insert_resource(MaxTicks(args.max_ticks))
        .insert_resource(SimSpeed(args.speed))
        .add_systems(Startup, start_session)
        .add_systems(FixedUpdate, autopilot.before(FieldSystems))
        .add_systems(FixedUpdate, stop_when_done.after(FieldSystems))
        .run()
}

fn start_session(
    speed: Res<SimSpeed>,
    mut time: ResMut<Time<Virtual>>,
    mut start: MessageWriter<StartGame>,
) {
    time.set_relative_speed(speed.0.max(0.1));
    start.write(StartGame);
}

/// Aim at the lowest visible bubble matching the loaded color, or straight
/// up when there is none.
fn autopilot(
    field: Res<BubbleField>,
    mut aims: MessageWriter<AimAt>,
    mut fires: MessageWriter<FireShot>,
) {
    if !field.shooter().can_fire() {
        return;
    }

    let loaded = field.shooter().loaded();
    let store = field.store();
    let target = store
        .iter()
        .filter(|(_, bubble)| bubble.color == loaded)
        .map(|(cell, _)| store.cell_center(*cell))
        .filter(|center| center.y > 0.0)
        .max_by(|a, b| a.y.total_cmp(&b.y))
        .unwrap_or_else(|| Vec2::new(field.config().field_width() / 2.0, 0.0));

    aims.write(AimAt(target));
    fires.write(FireShot);
}

fn stop_when_done(
    field: Res<BubbleField>,
    max_ticks: Res<MaxTicks>,
    mut ended: MessageReader<GameEnded>,
    mut exit: MessageWriter<AppExit>,
) {
    if let Some(GameEnded { status, record }) = ended.read().last() {
        info!("Session over: {:?} with {} points", status, record.score);
        exit.write(AppExit::Success);
    } else if field.ticks() >= max_ticks.0 {
        let score = field.score();
        info!(
            "Stopped after {} ticks: {} points, {} shots, {} popped, {} dropped",
            field.ticks(),
            score.score,
            score.shots_fired,
            score.bubbles_popped,
            score.bubbles_dropped
        );
        exit.write(AppExit::Success);
    }
}
