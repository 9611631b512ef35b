//! Slick Racers headless demo
//!
//! Runs a race on the update thread and polls it like a render loop would.
//! Usage: `slick-racers [track.json] [tuning.json]`

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use slick_racers::sim::{Action, InputEvent, Race, RaceEvent, RaceKind, RaceSetup, TrackLayout, VehicleModel};
use slick_racers::{RaceRunner, RunnerConfig, Tuning};

/// Demo track used when no track file is given
const DEMO_TRACK: &str = include_str!("../tracks/oval.json");

/// How long the demo runs
const DEMO_SECONDS: u64 = 20;

fn main() {
    env_logger::init();
    log::info!("Slick Racers (headless) starting...");

    if let Err(err) = run() {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let layout = match args.next() {
        Some(path) => TrackLayout::load(path)?,
        None => TrackLayout::from_json(DEMO_TRACK)?,
    };
    let tuning = match args.next() {
        Some(path) => Tuning::load_or_default(path),
        None => Tuning::default(),
    };

    let setup = RaceSetup {
        kind: RaceKind::NormalRace,
        players: vec![VehicleModel::Car],
        ai: vec![VehicleModel::Car, VehicleModel::Spaceship],
        seed: 0x5eed,
        lap_log: None,
    };
    let race = Race::new(setup, layout, Arc::new(tuning))?;
    let runner = RaceRunner::spawn(race, RunnerConfig::default())?;

    let started = Instant::now();
    let mut throttle_down = false;
    while started.elapsed() < Duration::from_secs(DEMO_SECONDS) {
        for event in runner.drain_events() {
            if let RaceEvent::RaceStarted = event {
                runner.send(InputEvent::press(0, Action::Accelerate))?;
                throttle_down = true;
            }
            log::debug!("{event:?}");
        }
        let snapshot = runner.snapshot();
        if throttle_down && snapshot.vehicle(1).is_some_and(|v| v.speed > 600.0) {
            runner.send(InputEvent::release(0, Action::Accelerate))?;
            throttle_down = false;
        }
        if snapshot.winner.is_some() {
            break;
        }
        // Roughly one frame
        std::thread::sleep(Duration::from_millis(16));
    }

    let race = runner.shutdown()?;
    log::info!("Standings after {:.1} s:", race.race_time());
    for (rank, id) in race.standings().into_iter().enumerate() {
        if let Some(vehicle) = race.vehicle(id) {
            log::info!(
                "  {}. vehicle {} ({}) laps {} hp {}",
                rank + 1,
                id,
                if vehicle.is_ai() { "AI" } else { "player" },
                vehicle.laps(),
                vehicle.hp()
            );
        }
    }
    Ok(())
}
