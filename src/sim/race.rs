//! Race orchestration
//!
//! [`Race::tick`] advances everything in a fixed order:
//! 1. weapon spawner and countdown
//! 2. AI steering (once started)
//! 3. vehicle physics
//! 4. wall and checkpoint collisions
//! 5. bullets, then missiles, then turbos
//! 6. finish line and lap counting (once started)
//! 7. oil slicks and weapon pickups (until the finish)
//!
//! Rule outcomes are queued as [`RaceEvent`]s for the render and audio side.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, ensure};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::input::{Action, InputEvent};
use super::missile::Target;
use super::snapshot::RaceSnapshot;
use super::track::{Track, TrackLayout, TrackSource};
use super::vehicle::{Vehicle, VehicleId, VehicleModel};
use super::weapon::{SoundCue, WeaponKind};
use crate::laptimes::LapLog;
use crate::tuning::Tuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RaceKind {
    Practice,
    #[default]
    NormalRace,
    /// One driver against the clock; laps are timed and logged
    TimeTrial,
    /// Two human drivers sharing a screen
    SplitScreen,
}

impl RaceKind {
    /// Weapons spawn and can be picked up
    pub fn has_weapons(&self) -> bool {
        !matches!(self, RaceKind::TimeTrial)
    }
}

/// Race lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RacePhase {
    Count3,
    Count2,
    Count1,
    /// Start signal; inputs are accepted from here on
    Go,
    Running,
    Finished,
}

impl RacePhase {
    pub fn is_started(&self) -> bool {
        matches!(self, RacePhase::Go | RacePhase::Running)
    }

    /// Countdown phase for the seconds left before the start
    fn from_remaining(remaining: f64) -> Self {
        if remaining > 2.0 {
            RacePhase::Count3
        } else if remaining > 1.0 {
            RacePhase::Count2
        } else if remaining > 0.0 {
            RacePhase::Count1
        } else {
            RacePhase::Go
        }
    }
}

/// Something the render or audio side may want to react to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RaceEvent {
    Countdown(u8),
    RaceStarted,
    WallHit { vehicle: VehicleId },
    Destroyed { vehicle: VehicleId },
    WeaponSpawned(WeaponKind),
    WeaponPicked { vehicle: VehicleId, kind: WeaponKind },
    GunFired { vehicle: VehicleId },
    TurboEngaged { vehicle: VehicleId },
    MissileLaunched { vehicle: VehicleId },
    MissileDetonated { owner: VehicleId, hit: Option<VehicleId> },
    LapCompleted { vehicle: VehicleId, lap: u32, time: Option<f64> },
    RaceFinished { winner: VehicleId },
}

/// Who races, and how
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceSetup {
    pub kind: RaceKind,
    /// Human drivers; the i-th one listens to input slot i
    pub players: Vec<VehicleModel>,
    pub ai: Vec<VehicleModel>,
    pub seed: u64,
    /// Lap log for time trials; `None` keeps lap times in memory
    pub lap_log: Option<PathBuf>,
}

impl RaceSetup {
    /// Reject driver line-ups the race kind does not allow
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.players.is_empty() || !self.ai.is_empty(),
            "a race needs at least one vehicle"
        );
        match self.kind {
            RaceKind::TimeTrial => ensure!(
                self.players.len() == 1 && self.ai.is_empty(),
                "a time trial takes exactly one player and no AI"
            ),
            RaceKind::SplitScreen => ensure!(
                self.players.len() <= 2,
                "split screen supports at most two players, got {}",
                self.players.len()
            ),
            RaceKind::Practice | RaceKind::NormalRace => {}
        }
        Ok(())
    }
}

/// Final order by (laps, checkpoints this lap), best first
///
/// Ties keep their input order.
pub fn standings_order(progress: &[(u32, usize)]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..progress.len()).collect();
    order.sort_by(|&a, &b| progress[b].cmp(&progress[a]));
    order
}

#[derive(Debug)]
pub struct Race {
    kind: RaceKind,
    tuning: Arc<Tuning>,
    track: Track,
    /// Players first, then AI, in id order
    vehicles: Vec<Vehicle>,
    phase: RacePhase,
    /// Seconds since the race was set up (drives the countdown)
    clock: f64,
    race_time: f64,
    lap_time: f64,
    /// Laps completed by the leader, counting the one in progress
    laps_driven: u32,
    total_laps: u32,
    winner: Option<VehicleId>,
    lap_log: LapLog,
    rng: Pcg32,
    events: Vec<RaceEvent>,
    sounds: Vec<(VehicleId, SoundCue)>,
}

impl Race {
    pub fn new(setup: RaceSetup, layout: TrackLayout, tuning: Arc<Tuning>) -> Result<Self> {
        tuning.validate()?;
        setup.validate()?;
        let track = Track::new(layout, tuning.clone(), setup.seed)?;

        let starts = track.start_positions();
        let count = setup.players.len() + setup.ai.len();
        ensure!(
            count <= starts.len(),
            "{count} vehicles but the track has only {} start positions",
            starts.len()
        );

        let mut vehicles = Vec::with_capacity(count);
        let mut starts = starts.iter().copied();
        let mut next_id: VehicleId = 1;
        for (slot, &model) in setup.players.iter().enumerate() {
            if let Some(start) = starts.next() {
                vehicles.push(Vehicle::player(next_id, model, slot, start, tuning.clone()));
                next_id += 1;
            }
        }
        for &model in &setup.ai {
            if let Some(start) = starts.next() {
                vehicles.push(Vehicle::ai(next_id, model, start, tuning.clone()));
                next_id += 1;
            }
        }

        let lap_log = match (&setup.lap_log, setup.kind) {
            (Some(path), RaceKind::TimeTrial) => LapLog::load(path).unwrap_or_else(|err| {
                log::warn!("Lap log unavailable, keeping times in memory: {err:#}");
                LapLog::in_memory()
            }),
            _ => LapLog::in_memory(),
        };

        log::info!(
            "{:?} on '{}': {} players, {} AI, {} laps",
            setup.kind,
            track.name(),
            setup.players.len(),
            setup.ai.len(),
            tuning.total_laps
        );

        let mut race = Self {
            kind: setup.kind,
            total_laps: tuning.total_laps,
            phase: RacePhase::from_remaining(tuning.countdown),
            tuning,
            track,
            vehicles,
            clock: 0.0,
            race_time: 0.0,
            lap_time: 0.0,
            laps_driven: 1,
            winner: None,
            lap_log,
            rng: Pcg32::seed_from_u64(setup.seed.wrapping_add(1)),
            events: Vec::new(),
            sounds: Vec::new(),
        };
        match race.countdown_number() {
            Some(count) => race.events.push(RaceEvent::Countdown(count)),
            None => race.events.push(RaceEvent::RaceStarted),
        }
        race.fix_places();
        Ok(race)
    }

    /// Build a race on geometry from any track provider
    pub fn from_source<S: TrackSource + ?Sized>(
        setup: RaceSetup,
        source: &S,
        tuning: Arc<Tuning>,
    ) -> Result<Self> {
        Self::new(setup, source.layout()?, tuning)
    }

    // === Accessors ===

    pub fn kind(&self) -> RaceKind {
        self.kind
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn is_started(&self) -> bool {
        self.phase.is_started()
    }

    pub fn is_finished(&self) -> bool {
        self.phase == RacePhase::Finished
    }

    pub fn tuning(&self) -> &Arc<Tuning> {
        &self.tuning
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id() == id)
    }

    pub fn vehicle_mut(&mut self, id: VehicleId) -> Option<&mut Vehicle> {
        self.vehicles.iter_mut().find(|v| v.id() == id)
    }

    pub fn race_time(&self) -> f64 {
        self.race_time
    }

    pub fn lap_time(&self) -> f64 {
        self.lap_time
    }

    pub fn laps_driven(&self) -> u32 {
        self.laps_driven
    }

    pub fn total_laps(&self) -> u32 {
        self.total_laps
    }

    pub fn winner(&self) -> Option<VehicleId> {
        self.winner
    }

    pub fn lap_log(&self) -> &LapLog {
        &self.lap_log
    }

    /// Sounds requested during the last tick
    pub fn sounds(&self) -> &[(VehicleId, SoundCue)] {
        &self.sounds
    }

    /// Vehicle ids, leader first
    pub fn standings(&self) -> Vec<VehicleId> {
        let mut ranked: Vec<_> = self
            .vehicles
            .iter()
            .map(|v| (v.place().unwrap_or(usize::MAX), v.id()))
            .collect();
        ranked.sort();
        ranked.into_iter().map(|(_, id)| id).collect()
    }

    pub fn snapshot(&self) -> RaceSnapshot {
        RaceSnapshot::capture(self)
    }

    /// Take the events queued since the last call
    pub fn drain_events(&mut self) -> Vec<RaceEvent> {
        std::mem::take(&mut self.events)
    }

    // === Input ===

    /// Route a driver input to the vehicle bound to its slot
    ///
    /// Ignored before the start signal and after the finish.
    pub fn handle_input(&mut self, input: InputEvent) {
        if !self.phase.is_started() {
            return;
        }
        let now = self.race_time;
        let Some(vehicle) = self
            .vehicles
            .iter_mut()
            .find(|v| v.slot() == Some(input.slot))
        else {
            return;
        };

        if input.action != Action::Fire {
            vehicle.handle_input(input.action, input.pressed);
            return;
        }
        if !input.pressed {
            return;
        }
        let id = vehicle.id();
        let event = match vehicle.use_weapon(now) {
            Some(WeaponKind::Gun) => RaceEvent::GunFired { vehicle: id },
            Some(WeaponKind::Turbo) => RaceEvent::TurboEngaged { vehicle: id },
            Some(WeaponKind::MissileLauncher) => RaceEvent::MissileLaunched { vehicle: id },
            None => return,
        };
        log::debug!("{event:?}");
        self.events.push(event);
    }

    // === Tick ===

    /// Advance the race by `dt` seconds
    pub fn tick(&mut self, dt: f64) {
        self.sounds.clear();

        if self.kind.has_weapons()
            && let Some(kind) = self.track.update(dt)
        {
            self.events.push(RaceEvent::WeaponSpawned(kind));
        }
        self.advance_clock(dt);

        let started = self.phase.is_started();
        if started {
            self.race_time += dt;
            self.lap_time += dt;
            for vehicle in &mut self.vehicles {
                vehicle.drive_ai(self.track.checkpoints());
            }
        }

        for vehicle in &mut self.vehicles {
            vehicle.update(dt);
        }
        self.resolve_collisions();
        self.update_bullets(dt);
        self.update_missiles(dt);
        self.update_turbos();
        if started {
            self.check_finish_line();
        }
        if !self.is_finished() {
            self.check_track_hazards();
        }

        for vehicle in &mut self.vehicles {
            let id = vehicle.id();
            self.sounds
                .extend(vehicle.sound_cues().into_iter().map(|cue| (id, cue)));
        }
    }

    fn countdown_number(&self) -> Option<u8> {
        match self.phase {
            RacePhase::Count3 => Some(3),
            RacePhase::Count2 => Some(2),
            RacePhase::Count1 => Some(1),
            _ => None,
        }
    }

    fn advance_clock(&mut self, dt: f64) {
        match self.phase {
            RacePhase::Count3 | RacePhase::Count2 | RacePhase::Count1 => {
                self.clock += dt;
                let next = RacePhase::from_remaining(self.tuning.countdown - self.clock);
                if next == self.phase {
                    return;
                }
                // A long step may skip whole seconds; announce each of them
                let from = self.countdown_number().unwrap_or(0);
                self.phase = next;
                let to = self.countdown_number().unwrap_or(0);
                for count in (to.max(1)..from).rev() {
                    log::debug!("Countdown {count}");
                    self.events.push(RaceEvent::Countdown(count));
                }
            }
            RacePhase::Go => self.phase = RacePhase::Running,
            RacePhase::Running | RacePhase::Finished => {}
        }
        if self.phase == RacePhase::Go {
            log::info!("Race started");
            self.events.push(RaceEvent::RaceStarted);
        }
    }

    /// Bounce off walls and record checkpoints
    fn resolve_collisions(&mut self) {
        let mut standings_changed = false;
        for vehicle in &mut self.vehicles {
            if !vehicle.is_destroyed() && self.track.is_wall_hit(vehicle.shape()) {
                let edge = self.track.crashed_edge(vehicle.shape());
                let shape = *vehicle.shape();
                vehicle.body_mut().handle_collision(&edge, &self.track, shape);
                vehicle.sync_shape();
                log::debug!("Vehicle {} hit a wall", vehicle.id());
                self.events.push(RaceEvent::WallHit {
                    vehicle: vehicle.id(),
                });
                apply_damage(vehicle, self.tuning.wall_dmg, &mut self.events);
            }

            let next = vehicle.visited();
            if self.track.is_checkpoint_hit(vehicle.shape(), next) {
                vehicle.pass_checkpoint(next);
                standings_changed = true;
            }
        }
        if standings_changed {
            self.fix_places();
        }
    }

    fn targets(&self) -> Vec<Target> {
        self.vehicles.iter().map(Vehicle::as_target).collect()
    }

    fn damage_vehicle(&mut self, id: VehicleId, amount: i32) {
        if let Some(vehicle) = self.vehicles.iter_mut().find(|v| v.id() == id) {
            apply_damage(vehicle, amount, &mut self.events);
        }
    }

    fn update_bullets(&mut self, dt: f64) {
        let targets = self.targets();
        let bound = self.tuning.world_bound;
        let hits: Vec<VehicleId> = self
            .vehicles
            .iter_mut()
            .flat_map(|v| v.advance_bullets(dt, &targets, bound))
            .collect();
        for id in hits {
            self.damage_vehicle(id, self.tuning.bullet_dmg);
        }
    }

    fn update_missiles(&mut self, dt: f64) {
        let targets = self.targets();
        let mut hits = Vec::new();
        for vehicle in &mut self.vehicles {
            let owner = vehicle.id();
            for hit in vehicle.advance_missiles(dt, self.track.checkpoints(), &targets) {
                log::debug!("Missile of vehicle {owner} detonated (hit: {hit:?})");
                self.events.push(RaceEvent::MissileDetonated { owner, hit });
                hits.extend(hit);
            }
            vehicle.remove_spent_launchers();
        }
        for id in hits {
            self.damage_vehicle(id, self.tuning.missile_dmg);
        }
    }

    fn update_turbos(&mut self) {
        let now = self.race_time;
        for vehicle in &mut self.vehicles {
            if vehicle.update_timed_effects(now) {
                log::debug!("Turbo of vehicle {} burned out", vehicle.id());
            }
        }
    }

    /// Count laps for vehicles crossing the line with every checkpoint behind them
    fn check_finish_line(&mut self) {
        let checkpoint_count = self.track.checkpoints().len();
        let crossing: Vec<usize> = self
            .vehicles
            .iter()
            .enumerate()
            .filter(|(_, v)| {
                v.all_checkpoints_passed(checkpoint_count)
                    && self.track.is_on_finish_line(v.shape())
            })
            .map(|(i, _)| i)
            .collect();

        for &index in &crossing {
            let vehicle = &mut self.vehicles[index];
            vehicle.complete_lap();
            let (id, lap, leader) = (vehicle.id(), vehicle.laps(), vehicle.place() == Some(1));

            let time = if self.kind == RaceKind::TimeTrial {
                let time = self.lap_time;
                self.lap_time = 0.0;
                // Persisted on a detached thread
                let _ = self.lap_log.record(time);
                log::info!("Lap {lap} in {time:.2} s");
                Some(time)
            } else {
                log::info!("Vehicle {id} completed lap {lap}");
                None
            };
            self.events.push(RaceEvent::LapCompleted {
                vehicle: id,
                lap,
                time,
            });

            if leader {
                self.laps_driven += 1;
                if self.kind != RaceKind::TimeTrial
                    && self.laps_driven > self.total_laps
                    && !self.is_finished()
                {
                    self.finish();
                }
            }
        }
        if !crossing.is_empty() {
            self.fix_places();
        }
    }

    /// Oil slicks and weapon pickups; only human drivers are affected
    fn check_track_hazards(&mut self) {
        let has_weapons = self.kind.has_weapons();
        for vehicle in &mut self.vehicles {
            if vehicle.is_ai() || vehicle.is_destroyed() {
                continue;
            }
            if self.track.is_oil_hit(vehicle.shape()) {
                let spin = if self.rng.random_range(0..=1) == 0 {
                    self.tuning.oil_spin
                } else {
                    -self.tuning.oil_spin
                };
                vehicle.spin(spin);
            }

            if !has_weapons {
                continue;
            }
            let Some(index) = self.track.weapon_hit(vehicle.shape()) else {
                continue;
            };
            let kind = self.track.pickups()[index].kind();
            // One weapon of each kind at a time
            if vehicle.has_weapon(kind) {
                continue;
            }
            match self.track.pick_weapon(index) {
                Ok(weapon) => {
                    vehicle.add_weapon(weapon);
                    if kind == WeaponKind::Gun {
                        vehicle.add_bullets(self.tuning.gun_ammo);
                    }
                    log::info!("Vehicle {} picked up a {}", vehicle.id(), kind.as_str());
                    self.events.push(RaceEvent::WeaponPicked {
                        vehicle: vehicle.id(),
                        kind,
                    });
                }
                Err(err) => log::error!("Weapon pickup failed: {err:#}"),
            }
        }
    }

    /// Re-rank every vehicle by progress
    pub fn fix_places(&mut self) {
        let progress: Vec<(u32, usize)> = self
            .vehicles
            .iter()
            .map(|v| (v.laps(), v.visited()))
            .collect();
        for (rank, index) in standings_order(&progress).into_iter().enumerate() {
            self.vehicles[index].set_place(rank + 1);
        }
    }

    /// End the race: everyone brakes and the leader wins
    fn finish(&mut self) {
        self.phase = RacePhase::Finished;
        for vehicle in &mut self.vehicles {
            vehicle.body_mut().brake(true);
        }
        let Some(&winner) = self.standings().first() else {
            return;
        };
        self.winner = Some(winner);
        log::info!("Race finished in {:.2} s, winner: vehicle {winner}", self.race_time);
        self.events.push(RaceEvent::RaceFinished { winner });
    }
}

/// Damage a vehicle, reporting its destruction once
fn apply_damage(vehicle: &mut Vehicle, amount: i32, events: &mut Vec<RaceEvent>) {
    if vehicle.is_destroyed() {
        return;
    }
    vehicle.damage(amount);
    if vehicle.is_destroyed() {
        log::info!("Vehicle {} destroyed", vehicle.id());
        events.push(RaceEvent::Destroyed {
            vehicle: vehicle.id(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::track::tests::square_layout;
    use glam::DVec2;
    use proptest::prelude::*;

    fn setup(kind: RaceKind, players: usize, ai: usize) -> RaceSetup {
        RaceSetup {
            kind,
            players: vec![VehicleModel::Car; players],
            ai: vec![VehicleModel::Car; ai],
            seed: 42,
            lap_log: None,
        }
    }

    fn race(kind: RaceKind, players: usize, ai: usize) -> Race {
        Race::new(setup(kind, players, ai), square_layout(), Arc::new(Tuning::default())).unwrap()
    }

    fn run_countdown(race: &mut Race) {
        for _ in 0..400 {
            race.tick(0.01);
            if race.phase() == RacePhase::Running {
                return;
            }
        }
        panic!("race never started");
    }

    /// Teleport vehicle `id` to `position`, at rest
    fn place(race: &mut Race, id: VehicleId, position: DVec2) {
        let vehicle = race.vehicle_mut(id).unwrap();
        vehicle.body_mut().set_position(position);
        vehicle.body_mut().stop();
        vehicle.sync_shape();
    }

    #[test]
    fn test_standings_order() {
        assert_eq!(standings_order(&[(2, 3), (2, 5), (1, 10)]), vec![1, 0, 2]);
        // Ties keep their order
        assert_eq!(standings_order(&[(0, 0), (0, 0), (0, 1)]), vec![2, 0, 1]);
        assert!(standings_order(&[]).is_empty());
    }

    #[test]
    fn test_setup_validation() {
        let tuning = Arc::new(Tuning::default());
        let new = |s| Race::new(s, square_layout(), tuning.clone());
        assert!(new(setup(RaceKind::NormalRace, 0, 0)).is_err());
        assert!(new(setup(RaceKind::TimeTrial, 2, 0)).is_err());
        assert!(new(setup(RaceKind::TimeTrial, 1, 1)).is_err());
        assert!(new(setup(RaceKind::SplitScreen, 3, 0)).is_err());
        // Four default start positions
        assert!(new(setup(RaceKind::NormalRace, 2, 3)).is_err());
        assert!(new(setup(RaceKind::NormalRace, 1, 3)).is_ok());
        assert!(new(setup(RaceKind::SplitScreen, 2, 2)).is_ok());
        let mut layout = square_layout();
        layout.walls.clear();
        assert!(Race::new(setup(RaceKind::NormalRace, 1, 0), layout, tuning.clone()).is_err());
    }

    #[test]
    fn test_vehicle_ids_and_slots() {
        let race = race(RaceKind::SplitScreen, 2, 1);
        let ids: Vec<_> = race.vehicles().iter().map(|v| v.id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(race.vehicles()[1].slot(), Some(1));
        assert!(race.vehicles()[2].is_ai());
        assert_eq!(race.vehicles()[2].body().position(), DVec2::new(100.0, 200.0));
        assert_eq!(race.standings(), vec![1, 2, 3]);
    }

    #[test]
    fn test_countdown() {
        let mut race = race(RaceKind::NormalRace, 1, 0);
        assert_eq!(race.phase(), RacePhase::Count3);
        assert_eq!(race.drain_events(), vec![RaceEvent::Countdown(3)]);

        // Input before the start is ignored
        race.handle_input(InputEvent::press(0, Action::Accelerate));
        race.tick(0.5);
        assert_eq!(race.vehicle(1).unwrap().body().speed(), 0.0);

        race.tick(0.6);
        assert_eq!(race.phase(), RacePhase::Count2);
        race.tick(1.0);
        assert_eq!(race.phase(), RacePhase::Count1);
        race.tick(1.0);
        assert_eq!(race.phase(), RacePhase::Go);
        assert!(race.is_started());
        race.tick(0.01);
        assert_eq!(race.phase(), RacePhase::Running);

        let mut events = race.drain_events();
        events.retain(|e| !matches!(e, RaceEvent::WeaponSpawned(_)));
        assert_eq!(
            events,
            vec![
                RaceEvent::Countdown(2),
                RaceEvent::Countdown(1),
                RaceEvent::RaceStarted,
            ]
        );
        assert!(race.drain_events().is_empty());
    }

    #[test]
    fn test_player_drives_after_start() {
        let mut race = race(RaceKind::NormalRace, 1, 0);
        run_countdown(&mut race);
        race.handle_input(InputEvent::press(0, Action::Accelerate));
        race.tick(0.5);
        assert!(race.vehicle(1).unwrap().body().speed() > 50.0);
        // Unbound slot does nothing
        race.handle_input(InputEvent::press(3, Action::Brake));
        assert!(!race.vehicle(1).unwrap().body().is_braking());
    }

    #[test]
    fn test_wall_hit_damages() {
        let mut race = race(RaceKind::NormalRace, 1, 0);
        run_countdown(&mut race);
        race.drain_events();
        place(&mut race, 1, DVec2::new(150.0, 10.0));
        race.vehicle_mut(1).unwrap().body_mut().set_velocity(DVec2::new(0.0, -100.0));
        race.tick(0.001);
        let vehicle = race.vehicle(1).unwrap();
        assert_eq!(vehicle.hp(), 140);
        assert!(race.drain_events().contains(&RaceEvent::WallHit { vehicle: 1 }));
    }

    #[test]
    fn test_checkpoints_must_be_visited_in_order() {
        let mut race = race(RaceKind::NormalRace, 1, 0);
        run_countdown(&mut race);
        // Second checkpoint first: not counted
        place(&mut race, 1, DVec2::new(410.0, 850.0));
        race.tick(0.001);
        assert_eq!(race.vehicle(1).unwrap().visited(), 0);

        place(&mut race, 1, DVec2::new(850.0, 410.0));
        race.tick(0.001);
        assert_eq!(race.vehicle(1).unwrap().visited(), 1);
        assert_eq!(race.vehicle(1).unwrap().last_checkpoint(), Some(0));
        place(&mut race, 1, DVec2::new(410.0, 850.0));
        race.tick(0.001);
        assert_eq!(race.vehicle(1).unwrap().visited(), 2);
    }

    #[test]
    fn test_lap_requires_all_checkpoints() {
        let mut race = race(RaceKind::NormalRace, 1, 0);
        run_countdown(&mut race);
        place(&mut race, 1, DVec2::new(410.0, 150.0));
        race.tick(0.001);
        assert_eq!(race.vehicle(1).unwrap().laps(), 0);

        for spot in [DVec2::new(850.0, 410.0), DVec2::new(410.0, 850.0), DVec2::new(150.0, 410.0)] {
            place(&mut race, 1, spot);
            race.tick(0.001);
        }
        race.drain_events();
        place(&mut race, 1, DVec2::new(410.0, 150.0));
        race.tick(0.001);
        let vehicle = race.vehicle(1).unwrap();
        assert_eq!(vehicle.laps(), 1);
        assert_eq!(vehicle.visited(), 0);
        assert_eq!(race.laps_driven(), 2);
        assert!(race.drain_events().contains(&RaceEvent::LapCompleted {
            vehicle: 1,
            lap: 1,
            time: None
        }));
    }

    fn drive_lap(race: &mut Race, id: VehicleId) {
        for spot in [
            DVec2::new(850.0, 410.0),
            DVec2::new(410.0, 850.0),
            DVec2::new(150.0, 410.0),
            DVec2::new(410.0, 150.0),
        ] {
            place(race, id, spot);
            race.tick(0.001);
        }
        // Leave the line so the next lap starts clean
        place(race, id, DVec2::new(150.0, 150.0));
        race.tick(0.001);
    }

    #[test]
    fn test_leader_finishes_race() {
        let tuning = Arc::new(Tuning {
            total_laps: 2,
            ..Tuning::default()
        });
        let mut race = Race::new(setup(RaceKind::NormalRace, 2, 0), square_layout(), tuning).unwrap();
        run_countdown(&mut race);
        drive_lap(&mut race, 2);
        assert_eq!(race.standings()[0], 2);
        assert!(!race.is_finished());
        drive_lap(&mut race, 2);
        assert!(race.is_finished());
        assert_eq!(race.winner(), Some(2));
        assert!(race.drain_events().contains(&RaceEvent::RaceFinished { winner: 2 }));

        // Nothing moves on player input any more
        race.handle_input(InputEvent::press(0, Action::Accelerate));
        race.tick(0.5);
        assert_eq!(race.vehicle(1).unwrap().body().speed(), 0.0);
    }

    #[test]
    fn test_time_trial_records_laps() {
        let mut race = race(RaceKind::TimeTrial, 1, 0);
        run_countdown(&mut race);
        race.tick(2.0);
        drive_lap(&mut race, 1);
        let last = race.lap_log().last().unwrap();
        assert!(last > 2.0 && last < 2.1);
        assert_eq!(race.lap_log().best(), Some(last));
        assert!(race.lap_time() < 0.01);
        for _ in 0..10 {
            drive_lap(&mut race, 1);
        }
        // Time trials never end on laps
        assert!(!race.is_finished());
        assert!(race.lap_log().best().unwrap() < last);
    }

    #[test]
    fn test_time_trial_has_no_weapons() {
        let mut race = race(RaceKind::TimeTrial, 1, 0);
        for _ in 0..200 {
            race.tick(0.1);
        }
        assert!(race.track().pickups().is_empty());
    }

    #[test]
    fn test_weapon_pickup_and_duplicate_denied() {
        let mut race = race(RaceKind::NormalRace, 1, 0);
        run_countdown(&mut race);
        // Let the spawner fill the track
        while race.track().pickups().len() < 3 {
            race.tick(0.5);
            place(&mut race, 1, DVec2::new(150.0, 150.0));
        }
        race.drain_events();

        let first = race.track().pickups()[0].clone();
        let center = first.shape.center();
        place(&mut race, 1, center);
        race.tick(0.001);
        let vehicle = race.vehicle(1).unwrap();
        assert!(vehicle.has_weapon(first.kind()));
        assert_eq!(race.track().pickups().len(), 2);
        assert!(race.drain_events().contains(&RaceEvent::WeaponPicked {
            vehicle: 1,
            kind: first.kind()
        }));

        // Any other pickup of the same kind stays on the track
        let same = race
            .track()
            .pickups()
            .iter()
            .position(|p| p.kind() == first.kind());
        if let Some(index) = same {
            let center = race.track().pickups()[index].shape.center();
            place(&mut race, 1, center);
            race.tick(0.001);
            assert_eq!(race.track().pickups().len(), 2);
            let held = race.vehicle(1).unwrap().weapons().len();
            assert_eq!(held, 1);
        }
    }

    fn quiet_spawner() -> Arc<Tuning> {
        Arc::new(Tuning {
            first_spawn_delay: 1e6,
            ..Tuning::default()
        })
    }

    #[test]
    fn test_gun_pickup_loads_bullets() {
        let mut race = Race::new(setup(RaceKind::NormalRace, 1, 0), square_layout(), quiet_spawner()).unwrap();
        run_countdown(&mut race);
        race.track.place_weapon(WeaponKind::Gun, 1).unwrap();
        let center = race.track().pickups()[0].shape.center();
        place(&mut race, 1, center);
        race.drain_events();
        race.tick(0.001);

        let vehicle = race.vehicle(1).unwrap();
        assert!(vehicle.has_weapon(WeaponKind::Gun));
        assert_eq!(vehicle.bullets().len(), 20);
        assert!(race.track().pickups().is_empty());
        assert!(race.drain_events().contains(&RaceEvent::WeaponPicked {
            vehicle: 1,
            kind: WeaponKind::Gun
        }));
    }

    #[test]
    fn test_second_gun_stays_on_track() {
        let mut race = Race::new(setup(RaceKind::NormalRace, 1, 0), square_layout(), quiet_spawner()).unwrap();
        run_countdown(&mut race);
        let vehicle = race.vehicle_mut(1).unwrap();
        vehicle.add_weapon(crate::sim::weapon::Weapon::new(WeaponKind::Gun, &Arc::new(Tuning::default())));
        vehicle.add_bullets(5);
        race.track.place_weapon(WeaponKind::Gun, 1).unwrap();
        let center = race.track().pickups()[0].shape.center();
        place(&mut race, 1, center);
        race.drain_events();
        race.tick(0.001);

        let vehicle = race.vehicle(1).unwrap();
        assert_eq!(vehicle.weapons().len(), 1);
        assert_eq!(vehicle.bullets().len(), 5);
        assert_eq!(race.track().pickups().len(), 1);
        assert!(
            !race
                .drain_events()
                .iter()
                .any(|e| matches!(e, RaceEvent::WeaponPicked { .. }))
        );
    }

    #[test]
    fn test_no_pickups_after_finish() {
        let tuning = Arc::new(Tuning {
            total_laps: 1,
            first_spawn_delay: 1e6,
            ..Tuning::default()
        });
        let mut race = Race::new(setup(RaceKind::NormalRace, 1, 0), square_layout(), tuning).unwrap();
        run_countdown(&mut race);
        drive_lap(&mut race, 1);
        assert!(race.is_finished());

        race.track.place_weapon(WeaponKind::Turbo, 1).unwrap();
        let center = race.track().pickups()[0].shape.center();
        place(&mut race, 1, center);
        race.tick(0.001);
        assert!(race.vehicle(1).unwrap().weapons().is_empty());
        assert_eq!(race.track().pickups().len(), 1);
    }

    #[test]
    fn test_long_step_announces_every_count() {
        let started = |race: &mut Race| {
            let mut events = race.drain_events();
            events.retain(|e| !matches!(e, RaceEvent::WeaponSpawned(_)));
            events
        };
        let expected = vec![
            RaceEvent::Countdown(2),
            RaceEvent::Countdown(1),
            RaceEvent::RaceStarted,
        ];

        let mut stepped = race(RaceKind::NormalRace, 1, 0);
        let mut jumped = race(RaceKind::NormalRace, 1, 0);
        stepped.drain_events();
        jumped.drain_events();

        stepped.tick(2.5);
        assert_eq!(stepped.phase(), RacePhase::Count1);
        stepped.tick(1.0);
        assert_eq!(stepped.phase(), RacePhase::Go);
        assert_eq!(started(&mut stepped), expected);

        jumped.tick(5.0);
        assert_eq!(jumped.phase(), RacePhase::Go);
        assert_eq!(started(&mut jumped), expected);
    }

    #[test]
    fn test_gun_pickup_fires() {
        let mut race = race(RaceKind::NormalRace, 2, 0);
        run_countdown(&mut race);
        let vehicle = race.vehicle_mut(1).unwrap();
        vehicle.add_weapon(crate::sim::weapon::Weapon::new(WeaponKind::Gun, &Arc::new(Tuning::default())));
        vehicle.add_bullets(20);
        place(&mut race, 1, DVec2::new(150.0, 150.0));
        place(&mut race, 2, DVec2::new(200.0, 150.0));
        race.drain_events();

        race.handle_input(InputEvent::press(0, Action::Fire));
        assert_eq!(race.drain_events(), vec![RaceEvent::GunFired { vehicle: 1 }]);
        race.tick(0.01);
        assert_eq!(race.vehicle(2).unwrap().hp(), 110);
        assert_eq!(race.sounds(), &[(1, SoundCue::Gunshot)]);
        race.tick(0.01);
        assert!(race.sounds().is_empty());
    }

    #[test]
    fn test_bullets_destroy_vehicle() {
        let mut race = race(RaceKind::NormalRace, 2, 0);
        run_countdown(&mut race);
        let vehicle = race.vehicle_mut(1).unwrap();
        vehicle.add_weapon(crate::sim::weapon::Weapon::new(WeaponKind::Gun, &Arc::new(Tuning::default())));
        vehicle.add_bullets(20);
        place(&mut race, 1, DVec2::new(150.0, 150.0));
        place(&mut race, 2, DVec2::new(200.0, 150.0));
        race.drain_events();
        for _ in 0..4 {
            race.handle_input(InputEvent::press(0, Action::Fire));
            race.tick(0.01);
        }
        let target = race.vehicle(2).unwrap();
        assert!(target.is_destroyed());
        assert_eq!(target.hp(), 0);
        let destroyed = race
            .drain_events()
            .iter()
            .filter(|e| **e == RaceEvent::Destroyed { vehicle: 2 })
            .count();
        assert_eq!(destroyed, 1);
    }

    #[test]
    fn test_ai_drives_toward_checkpoint() {
        let mut race = race(RaceKind::NormalRace, 0, 1);
        run_countdown(&mut race);
        let start = race.vehicle(1).unwrap().body().position();
        for _ in 0..100 {
            race.tick(0.01);
        }
        let bot = race.vehicle(1).unwrap();
        assert!(bot.body().position().distance(start) > 10.0);
        assert!(matches!(bot.controller(), crate::sim::vehicle::Controller::Ai(_)));
    }

    #[test]
    fn test_same_seed_same_race() {
        let run = || {
            let mut race = race(RaceKind::NormalRace, 1, 2);
            let mut snapshots = Vec::new();
            for step in 0..1500 {
                if step == 350 {
                    race.handle_input(InputEvent::press(0, Action::Accelerate));
                }
                if step == 500 {
                    race.handle_input(InputEvent::press(0, Action::TurnRight));
                }
                race.tick(1.0 / 120.0);
                if step % 100 == 0 {
                    snapshots.push(race.snapshot());
                }
            }
            snapshots
        };
        assert_eq!(run(), run());
    }

    proptest! {
        #[test]
        fn prop_standings_rank_by_progress(progress in prop::collection::vec((0u32..5, 0usize..6), 0..8)) {
            let order = standings_order(&progress);
            prop_assert_eq!(order.len(), progress.len());
            for pair in order.windows(2) {
                let (a, b) = (progress[pair[0]], progress[pair[1]]);
                prop_assert!(a >= b);
                if a == b {
                    prop_assert!(pair[0] < pair[1]);
                }
            }
        }
    }
}
