//! Update thread that owns a race
//!
//! The render side never touches the [`Race`] directly. It queues
//! [`Command`]s, reads the latest [`RaceSnapshot`] and drains events. Each
//! loop iteration on the update thread is one critical section: apply the
//! queued commands, tick with the wall-clock time since the last iteration,
//! publish the snapshot. Sound cues pile up in the published snapshot until
//! the render side reads it, so one-tick sounds survive slower frame rates.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use crossbeam::channel::{self, Receiver, Sender};

use crate::sim::{InputEvent, Race, RaceEvent, RaceSnapshot};

/// Messages from the render side to the update thread
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Input(InputEvent),
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Sleep between iterations
    pub throttle: Duration,
    /// Longest step fed to a single tick (a stalled thread does not teleport cars)
    pub max_step: f64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            throttle: Duration::from_millis(2),
            max_step: 0.05,
        }
    }
}

pub struct RaceRunner {
    commands: Sender<Command>,
    events: Receiver<RaceEvent>,
    snapshot: Arc<Mutex<RaceSnapshot>>,
    handle: Option<JoinHandle<Race>>,
}

impl RaceRunner {
    /// Move `race` onto its own update thread
    pub fn spawn(race: Race, config: RunnerConfig) -> Result<Self> {
        let (command_tx, command_rx) = channel::unbounded();
        let (event_tx, event_rx) = channel::unbounded();
        let snapshot = Arc::new(Mutex::new(race.snapshot()));
        let shared = Arc::clone(&snapshot);

        let handle = std::thread::Builder::new()
            .name("race-update".to_string())
            .spawn(move || update_loop(race, config, command_rx, event_tx, shared))?;
        log::info!("Race update thread started");

        Ok(Self {
            commands: command_tx,
            events: event_rx,
            snapshot,
            handle: Some(handle),
        })
    }

    /// Latest published state, with every sound cue since the previous call
    pub fn snapshot(&self) -> RaceSnapshot {
        let mut shared = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = shared.clone();
        shared.sounds.clear();
        snapshot
    }

    /// Events published since the last call
    pub fn drain_events(&self) -> Vec<RaceEvent> {
        self.events.try_iter().collect()
    }

    pub fn send(&self, input: InputEvent) -> Result<()> {
        self.commands
            .send(Command::Input(input))
            .map_err(|_| anyhow!("race update thread has stopped"))
    }

    /// Stop the update thread and take the race back
    pub fn shutdown(mut self) -> Result<Race> {
        let _ = self.commands.send(Command::Shutdown);
        let handle = self
            .handle
            .take()
            .ok_or_else(|| anyhow!("race runner already shut down"))?;
        let race = handle
            .join()
            .map_err(|_| anyhow!("race update thread panicked"))?;
        log::info!("Race update thread stopped");
        Ok(race)
    }
}

impl Drop for RaceRunner {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.commands.send(Command::Shutdown);
            let _ = handle.join();
        }
    }
}

fn update_loop(
    mut race: Race,
    config: RunnerConfig,
    commands: Receiver<Command>,
    events: Sender<RaceEvent>,
    snapshot: Arc<Mutex<RaceSnapshot>>,
) -> Race {
    let mut last = Instant::now();
    loop {
        for command in commands.try_iter() {
            match command {
                Command::Input(input) => race.handle_input(input),
                Command::Shutdown => return race,
            }
        }

        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f64().min(config.max_step);
        last = now;
        race.tick(dt);

        let mut latest = race.snapshot();
        {
            let mut shared = snapshot.lock().unwrap_or_else(PoisonError::into_inner);
            let mut sounds = std::mem::take(&mut shared.sounds);
            sounds.append(&mut latest.sounds);
            latest.sounds = sounds;
            *shared = latest;
        }
        for event in race.drain_events() {
            // Nobody listening is fine; the snapshot still carries the state
            let _ = events.send(event);
        }

        std::thread::sleep(config.throttle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::track::tests::square_layout;
    use crate::sim::{Action, RacePhase, RaceSetup, SoundCue, VehicleModel, Weapon, WeaponKind};
    use crate::tuning::Tuning;

    fn quick_tuning() -> Arc<Tuning> {
        Arc::new(Tuning {
            countdown: 0.05,
            ..Tuning::default()
        })
    }

    #[test]
    fn test_runner_ticks_and_returns_race() {
        let setup = RaceSetup {
            players: vec![VehicleModel::Car],
            ai: vec![VehicleModel::Car],
            ..RaceSetup::default()
        };
        let race = Race::new(setup, square_layout(), quick_tuning()).unwrap();
        let runner = RaceRunner::spawn(race, RunnerConfig::default()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while runner.snapshot().phase != RacePhase::Running {
            assert!(Instant::now() < deadline, "race never started");
            std::thread::sleep(Duration::from_millis(5));
        }
        runner.send(InputEvent::press(0, Action::Accelerate)).unwrap();
        std::thread::sleep(Duration::from_millis(200));

        let snapshot = runner.snapshot();
        assert!(snapshot.race_time > 0.0);
        assert!(snapshot.vehicle(1).is_some_and(|v| v.speed > 0.0));
        let events = runner.drain_events();
        assert!(events.contains(&RaceEvent::RaceStarted));

        let race = runner.shutdown().unwrap();
        assert!(race.race_time() >= snapshot.race_time);
    }

    #[test]
    fn test_sounds_kept_until_read() {
        let setup = RaceSetup {
            players: vec![VehicleModel::Car, VehicleModel::Car],
            ..RaceSetup::default()
        };
        let mut race = Race::new(setup, square_layout(), quick_tuning()).unwrap();
        let vehicle = race.vehicle_mut(1).unwrap();
        vehicle.add_weapon(Weapon::new(WeaponKind::Gun, &quick_tuning()));
        vehicle.add_bullets(20);
        let runner = RaceRunner::spawn(race, RunnerConfig::default()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !runner.snapshot().phase.is_started() {
            assert!(Instant::now() < deadline, "race never started");
            std::thread::sleep(Duration::from_millis(5));
        }
        runner.send(InputEvent::press(0, Action::Fire)).unwrap();
        // Many ticks pass before the next read
        std::thread::sleep(Duration::from_millis(100));

        let snapshot = runner.snapshot();
        assert_eq!(snapshot.sounds, vec![(1, SoundCue::Gunshot)]);
        assert!(runner.snapshot().sounds.is_empty());
        runner.shutdown().unwrap();
    }

    #[test]
    fn test_drop_stops_thread() {
        let setup = RaceSetup {
            ai: vec![VehicleModel::Car],
            ..RaceSetup::default()
        };
        let race = Race::new(setup, square_layout(), quick_tuning()).unwrap();
        let runner = RaceRunner::spawn(race, RunnerConfig::default()).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        drop(runner);
    }
}
