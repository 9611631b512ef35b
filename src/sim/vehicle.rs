//! Race vehicles: player-driven or AI-driven
//!
//! A vehicle owns its body, its collision shape, the weapons it picked up
//! (used oldest first) and a pool of bullets.

use std::collections::VecDeque;
use std::sync::Arc;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::bullet::Bullet;
use super::geometry::Rect;
use super::input::Action;
use super::missile::Target;
use super::physics::{BodyKind, RigidBody};
use super::steering::Autopilot;
use super::weapon::{EffectTick, SoundCue, Trigger, Weapon, WeaponKind};
use crate::tuning::Tuning;

pub type VehicleId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VehicleModel {
    #[default]
    Car,
    Spaceship,
}

impl VehicleModel {
    /// Collision box (length along the nose, width)
    pub fn size(&self) -> DVec2 {
        match self {
            VehicleModel::Car => DVec2::new(60.0, 30.0),
            VehicleModel::Spaceship => DVec2::new(60.0, 40.0),
        }
    }
}

/// Who is driving
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Controller {
    /// Human player bound to an input slot
    Player { slot: usize, accelerating: bool },
    Ai(Autopilot),
    /// AI that failed; the vehicle just coasts
    Disabled,
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    id: VehicleId,
    model: VehicleModel,
    controller: Controller,
    body: RigidBody,
    shape: Rect,
    hp: i32,
    destroyed: bool,
    weapons: Vec<Weapon>,
    bullets: VecDeque<Bullet>,
    laps: u32,
    /// Checkpoints passed since the last finish line crossing
    visited: usize,
    last_checkpoint: Option<usize>,
    /// 1 = leader
    place: Option<usize>,
    tuning: Arc<Tuning>,
}

impl Vehicle {
    pub fn new(
        id: VehicleId,
        model: VehicleModel,
        controller: Controller,
        start: DVec2,
        tuning: Arc<Tuning>,
    ) -> Self {
        let size = model.size();
        let mut body = RigidBody::new(BodyKind::Vehicle, size.x, size.y, tuning.clone());
        body.set_position(start);
        let mut shape = Rect::centered(size.x, size.y);
        shape.set_pose(start, body.rotation());
        Self {
            id,
            model,
            controller,
            body,
            shape,
            hp: tuning.vehicle_hp,
            destroyed: false,
            weapons: Vec::new(),
            bullets: VecDeque::new(),
            laps: 0,
            visited: 0,
            last_checkpoint: None,
            place: None,
            tuning,
        }
    }

    pub fn player(id: VehicleId, model: VehicleModel, slot: usize, start: DVec2, tuning: Arc<Tuning>) -> Self {
        let controller = Controller::Player {
            slot,
            accelerating: false,
        };
        Self::new(id, model, controller, start, tuning)
    }

    pub fn ai(id: VehicleId, model: VehicleModel, start: DVec2, tuning: Arc<Tuning>) -> Self {
        Self::new(id, model, Controller::Ai(Autopilot::new(0)), start, tuning)
    }

    // === Accessors ===

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn model(&self) -> VehicleModel {
        self.model
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Input slot of a human driver
    pub fn slot(&self) -> Option<usize> {
        match self.controller {
            Controller::Player { slot, .. } => Some(slot),
            _ => None,
        }
    }

    pub fn is_ai(&self) -> bool {
        !matches!(self.controller, Controller::Player { .. })
    }

    pub fn body(&self) -> &RigidBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut RigidBody {
        &mut self.body
    }

    pub fn shape(&self) -> &Rect {
        &self.shape
    }

    pub fn hp(&self) -> i32 {
        self.hp
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn weapons(&self) -> &[Weapon] {
        &self.weapons
    }

    pub fn bullets(&self) -> &VecDeque<Bullet> {
        &self.bullets
    }

    pub fn laps(&self) -> u32 {
        self.laps
    }

    pub fn visited(&self) -> usize {
        self.visited
    }

    pub fn last_checkpoint(&self) -> Option<usize> {
        self.last_checkpoint
    }

    pub fn place(&self) -> Option<usize> {
        self.place
    }

    pub fn set_place(&mut self, place: usize) {
        self.place = Some(place);
    }

    /// What homing missiles and bullets test against
    pub fn as_target(&self) -> Target {
        Target {
            id: self.id,
            center: self.shape.center(),
            bounds: self.shape.bounds(),
            destroyed: self.destroyed,
        }
    }

    // === Simulation ===

    /// Advance physics; wrecks stay where they are
    pub fn update(&mut self, dt: f64) {
        self.body.update(dt);
        if self.destroyed {
            self.body.stop();
        }
        self.sync_shape();
    }

    pub fn sync_shape(&mut self) {
        self.shape.set_pose(self.body.position(), self.body.rotation());
    }

    /// Subtract hit points; returns what is left
    pub fn damage(&mut self, amount: i32) -> i32 {
        self.hp -= amount;
        if self.hp <= 0 {
            self.hp = 0;
            self.destroyed = true;
        }
        self.hp
    }

    /// Record passing checkpoint `index`
    pub fn pass_checkpoint(&mut self, index: usize) {
        self.last_checkpoint = Some(index);
        self.visited += 1;
    }

    pub fn all_checkpoints_passed(&self, count: usize) -> bool {
        self.visited >= count
    }

    pub fn complete_lap(&mut self) {
        self.laps += 1;
        self.visited = 0;
    }

    /// Spin out on an oil slick
    pub fn spin(&mut self, angular_velocity: f64) {
        self.body.set_angular_velocity(angular_velocity);
        self.body.unlock();
    }

    /// Apply a key press or release from the driver
    pub fn handle_input(&mut self, action: Action, pressed: bool) {
        let Controller::Player { accelerating, .. } = &mut self.controller else {
            return;
        };
        if self.destroyed {
            return;
        }
        let turn_rate = self.tuning.ang_vel;
        let body = &mut self.body;
        match (action, pressed) {
            (Action::Accelerate, true) => {
                if !*accelerating {
                    body.accelerate();
                    *accelerating = true;
                }
            }
            (Action::Accelerate, false) => {
                // Rolling friction
                body.brake(false);
                *accelerating = false;
            }
            (Action::Brake, true) => {
                body.brake(true);
                *accelerating = false;
            }
            (Action::Reverse, true) => body.reverse(),
            (Action::Reverse, false) => {
                if body.is_reversing() {
                    body.brake(false);
                }
            }
            (Action::TurnRight, true) => body.set_angular_velocity(turn_rate),
            (Action::TurnLeft, true) => body.set_angular_velocity(-turn_rate),
            (Action::TurnRight, false) => {
                if body.angular_velocity() > 0.0 {
                    body.set_angular_velocity(0.0);
                }
            }
            (Action::TurnLeft, false) => {
                if body.angular_velocity() < 0.0 {
                    body.set_angular_velocity(0.0);
                }
            }
            (Action::Brake, false) | (Action::Fire, _) => {}
        }
    }

    /// One autopilot tick for AI drivers
    ///
    /// An autopilot that cannot find a checkpoint is switched off and the
    /// vehicle coasts from then on.
    pub fn drive_ai(&mut self, checkpoints: &[Rect]) {
        if self.destroyed {
            return;
        }
        let Controller::Ai(pilot) = &mut self.controller else {
            return;
        };
        let result = pilot.drive(
            &mut self.body,
            &self.shape,
            checkpoints,
            None,
            self.tuning.ai_ang_vel,
            self.tuning.heading_tolerance,
        );
        if let Err(err) = result {
            log::error!("Vehicle {} autopilot disabled: {err:#}", self.id);
            self.controller = Controller::Disabled;
        }
    }

    // === Weapons ===

    pub fn has_weapon(&self, kind: WeaponKind) -> bool {
        self.weapons.iter().any(|w| w.kind() == kind)
    }

    pub fn add_weapon(&mut self, weapon: Weapon) {
        self.weapons.push(weapon);
    }

    /// Drop the oldest weapon of `kind`
    pub fn remove_weapon(&mut self, kind: WeaponKind) -> Option<Weapon> {
        let index = self.weapons.iter().position(|w| w.kind() == kind)?;
        Some(self.weapons.remove(index))
    }

    /// Put `count` inert bullets at the front of the pool
    pub fn add_bullets(&mut self, count: usize) {
        for _ in 0..count {
            self.bullets.push_front(Bullet::new(self.id, self.tuning.clone()));
        }
    }

    /// Launch the first inert bullet; returns how many inert ones remain
    pub fn shoot(&mut self) -> usize {
        let Some(bullet) = self.bullets.iter_mut().find(|b| !b.is_flying()) else {
            return 0;
        };
        bullet.launch(&self.body);
        self.bullets.iter().filter(|b| !b.is_flying()).count()
    }

    /// Use the oldest weapon; returns its kind if anything happened
    ///
    /// An empty gun is thrown away after its last shot.
    pub fn use_weapon(&mut self, now: f64) -> Option<WeaponKind> {
        if self.destroyed {
            return None;
        }
        let trigger = Trigger {
            owner: self.id,
            body: &self.body,
            next_checkpoint: self.visited,
            now,
        };
        let weapon = self.weapons.first_mut()?;
        let kind = weapon.kind();
        if !weapon.use_weapon(&trigger) {
            return None;
        }
        if kind == WeaponKind::Gun && self.shoot() == 0 {
            self.remove_weapon(WeaponKind::Gun);
        }
        Some(kind)
    }

    /// Tick turbos; returns true when one burned out this tick
    pub fn update_timed_effects(&mut self, now: f64) -> bool {
        let cap = self.tuning.max_speed * self.tuning.turbo_cap_factor;
        let mut expired = None;
        for (i, weapon) in self.weapons.iter_mut().enumerate() {
            match weapon.update_timed_effect(now) {
                EffectTick::Active => {
                    let speed = self.body.speed();
                    if speed > 1.0 && speed < cap {
                        let boosted = self.body.velocity() * self.tuning.turbo_boost;
                        self.body.set_velocity(boosted);
                    }
                }
                EffectTick::Expired => expired = Some(i),
                EffectTick::Idle => {}
            }
        }
        match expired {
            Some(i) => {
                self.weapons.remove(i);
                true
            }
            None => false,
        }
    }

    /// Advance flying bullets; returns the vehicles hit
    ///
    /// A bullet that hits or leaves the world is taken out of the pool.
    /// Wrecks still stop bullets; only the shooter is passed through.
    pub fn advance_bullets(&mut self, dt: f64, targets: &[Target], bound: f64) -> Vec<VehicleId> {
        let mut hits = Vec::new();
        self.bullets.retain_mut(|bullet| {
            if !bullet.is_flying() {
                return true;
            }
            bullet.update(dt);
            let bounds = bullet.shape().bounds();
            let hit = targets
                .iter()
                .find(|t| t.id != bullet.owner() && t.bounds.intersects(&bounds));
            if let Some(target) = hit {
                hits.push(target.id);
                return false;
            }
            !bullet.is_out_of_bounds(bound)
        });
        hits
    }

    /// Fly launched missiles; one entry per missile that blew up this tick
    pub fn advance_missiles(
        &mut self,
        dt: f64,
        checkpoints: &[Rect],
        targets: &[Target],
    ) -> Vec<Option<VehicleId>> {
        let mut detonations = Vec::new();
        for missile in self.weapons.iter_mut().filter_map(Weapon::missile_mut) {
            if !missile.is_flying() {
                continue;
            }
            match missile.fly(dt, checkpoints, targets) {
                Ok(hit) => {
                    if !missile.is_flying() {
                        detonations.push(hit);
                    }
                }
                Err(err) => {
                    log::error!("Missile of vehicle {} lost guidance: {err:#}", self.id);
                    missile.detonate();
                    detonations.push(None);
                }
            }
        }
        detonations
    }

    /// Throw away launchers whose missile is gone
    pub fn remove_spent_launchers(&mut self) {
        self.weapons.retain(|w| !w.is_spent());
    }

    /// Sounds the weapons want played this tick
    pub fn sound_cues(&mut self) -> Vec<SoundCue> {
        self.weapons.iter_mut().filter_map(Weapon::sound_cue).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::physics::MotionState;

    fn tuning() -> Arc<Tuning> {
        Arc::new(Tuning::default())
    }

    fn player() -> Vehicle {
        Vehicle::player(1, VehicleModel::Car, 0, DVec2::new(100.0, 100.0), tuning())
    }

    #[test]
    fn test_new_vehicle() {
        let car = player();
        assert_eq!(car.hp(), 150);
        assert!(!car.is_ai());
        assert_eq!(car.slot(), Some(0));
        assert_eq!(car.shape().center(), DVec2::new(100.0, 100.0));
        let ship = Vehicle::ai(2, VehicleModel::Spaceship, DVec2::ZERO, tuning());
        assert!(ship.is_ai());
        assert_eq!(ship.shape().size, DVec2::new(60.0, 40.0));
    }

    #[test]
    fn test_damage_clamps_and_destroys() {
        let mut car = player();
        assert_eq!(car.damage(40), 110);
        assert!(!car.is_destroyed());
        assert_eq!(car.damage(500), 0);
        assert!(car.is_destroyed());
    }

    #[test]
    fn test_destroyed_vehicle_stops() {
        let mut car = player();
        car.handle_input(Action::Accelerate, true);
        car.update(0.5);
        assert!(car.body().speed() > 0.0);
        car.damage(1000);
        car.update(0.1);
        assert_eq!(car.body().speed(), 0.0);
        let parked = car.body().position();
        car.update(1.0);
        assert_eq!(car.body().position(), parked);
    }

    #[test]
    fn test_accelerate_press_is_idempotent() {
        let mut car = player();
        car.handle_input(Action::Accelerate, true);
        car.update(1.0);
        // Holding the key (repeat presses) must not restart the kinematics
        car.handle_input(Action::Accelerate, true);
        car.update(0.0);
        assert!((car.body().position().x - 200.0).abs() < 1e-6);
        assert!((car.body().speed() - 200.0).abs() < 1e-6);

        car.handle_input(Action::Accelerate, false);
        assert!(car.body().is_braking());
    }

    #[test]
    fn test_turn_release_only_cancels_matching_direction() {
        let mut car = player();
        car.handle_input(Action::TurnRight, true);
        assert_eq!(car.body().angular_velocity(), 150.0);
        car.handle_input(Action::TurnLeft, false);
        assert_eq!(car.body().angular_velocity(), 150.0);
        car.handle_input(Action::TurnLeft, true);
        assert_eq!(car.body().angular_velocity(), -150.0);
        car.handle_input(Action::TurnLeft, false);
        assert_eq!(car.body().angular_velocity(), 0.0);
    }

    #[test]
    fn test_reverse() {
        let mut car = player();
        car.handle_input(Action::Reverse, true);
        car.update(1.0);
        assert_eq!(car.body().motion_state(), MotionState::Backward);
        car.handle_input(Action::Reverse, false);
        assert!(car.body().is_braking());
    }

    #[test]
    fn test_ai_ignores_player_input() {
        let mut bot = Vehicle::ai(2, VehicleModel::Car, DVec2::ZERO, tuning());
        bot.handle_input(Action::Accelerate, true);
        assert_eq!(bot.body().acceleration(), DVec2::ZERO);
    }

    #[test]
    fn test_ai_without_checkpoints_is_disabled() {
        let mut bot = Vehicle::ai(2, VehicleModel::Car, DVec2::ZERO, tuning());
        bot.drive_ai(&[]);
        assert_eq!(bot.controller(), &Controller::Disabled);
        assert!(bot.is_ai());
    }

    #[test]
    fn test_gun_runs_dry() {
        let mut car = player();
        car.add_weapon(Weapon::new(WeaponKind::Gun, &tuning()));
        car.add_bullets(3);
        assert_eq!(car.use_weapon(0.0), Some(WeaponKind::Gun));
        assert_eq!(car.use_weapon(0.1), Some(WeaponKind::Gun));
        assert!(car.has_weapon(WeaponKind::Gun));
        assert_eq!(car.use_weapon(0.2), Some(WeaponKind::Gun));
        assert!(!car.has_weapon(WeaponKind::Gun));
        assert_eq!(car.bullets().iter().filter(|b| b.is_flying()).count(), 3);
        assert_eq!(car.use_weapon(0.3), None);
    }

    #[test]
    fn test_weapons_used_in_pickup_order() {
        let mut car = player();
        car.add_weapon(Weapon::new(WeaponKind::Turbo, &tuning()));
        car.add_weapon(Weapon::new(WeaponKind::MissileLauncher, &tuning()));
        assert_eq!(car.use_weapon(1.0), Some(WeaponKind::Turbo));
        // The turbo is still burning; firing again does nothing
        assert_eq!(car.use_weapon(1.5), None);
    }

    #[test]
    fn test_turbo_boosts_then_expires() {
        let mut car = player();
        car.add_weapon(Weapon::new(WeaponKind::Turbo, &tuning()));
        car.body_mut().set_velocity(DVec2::new(100.0, 0.0));
        car.use_weapon(10.0);
        assert!(!car.update_timed_effects(11.0));
        assert!((car.body().speed() - 105.0).abs() < 1e-9);
        assert!(car.update_timed_effects(13.0));
        assert!(car.weapons().is_empty());
        assert!((car.body().speed() - 105.0).abs() < 1e-9);
    }

    #[test]
    fn test_turbo_respects_cap() {
        let mut car = player();
        car.add_weapon(Weapon::new(WeaponKind::Turbo, &tuning()));
        car.body_mut().set_velocity(DVec2::new(1600.0, 0.0));
        car.use_weapon(0.0);
        car.update_timed_effects(1.0);
        assert_eq!(car.body().speed(), 1600.0);
    }

    #[test]
    fn test_bullets_hit_rivals_only() {
        let mut car = player();
        car.add_bullets(2);
        car.shoot();
        let rival = Vehicle::player(2, VehicleModel::Car, 1, DVec2::new(140.0, 100.0), tuning());
        let targets = [car.as_target(), rival.as_target()];
        let hits = car.advance_bullets(0.002, &targets, 4000.0);
        assert_eq!(hits, vec![2]);
        assert_eq!(car.bullets().len(), 1);
    }

    #[test]
    fn test_wreck_absorbs_bullets() {
        let mut car = player();
        car.add_bullets(1);
        car.shoot();
        let mut wreck = Vehicle::player(2, VehicleModel::Car, 1, DVec2::new(140.0, 100.0), tuning());
        wreck.damage(1000);
        let targets = [car.as_target(), wreck.as_target()];
        assert!(targets[1].destroyed);
        assert_eq!(car.advance_bullets(0.002, &targets, 4000.0), vec![2]);
        assert!(car.bullets().is_empty());
    }

    #[test]
    fn test_bullets_culled_out_of_bounds() {
        let mut car = player();
        car.add_bullets(1);
        car.shoot();
        assert!(car.advance_bullets(0.5, &[], 4000.0).is_empty());
        assert_eq!(car.bullets().len(), 1);
        assert!(car.advance_bullets(1.0, &[], 4000.0).is_empty());
        assert!(car.bullets().is_empty());
    }

    #[test]
    fn test_missile_launch_and_cleanup() {
        let mut car = player();
        car.add_weapon(Weapon::new(WeaponKind::MissileLauncher, &tuning()));
        assert_eq!(car.use_weapon(0.0), Some(WeaponKind::MissileLauncher));
        assert_eq!(car.sound_cues(), vec![SoundCue::Rocket]);

        let rival = Vehicle::player(2, VehicleModel::Car, 1, DVec2::new(150.0, 100.0), tuning());
        let targets = [car.as_target(), rival.as_target()];
        let checkpoints = [Rect::new(DVec2::new(3000.0, 0.0), DVec2::new(20.0, 400.0), 0.0)];
        let detonations = car.advance_missiles(0.002, &checkpoints, &targets);
        assert_eq!(detonations, vec![Some(2)]);
        assert!(car.has_weapon(WeaponKind::MissileLauncher));
        car.remove_spent_launchers();
        assert!(car.weapons().is_empty());
    }

    #[test]
    fn test_checkpoints_and_laps() {
        let mut car = player();
        car.pass_checkpoint(0);
        car.pass_checkpoint(1);
        assert_eq!(car.last_checkpoint(), Some(1));
        assert!(!car.all_checkpoints_passed(3));
        car.pass_checkpoint(2);
        assert!(car.all_checkpoints_passed(3));
        car.complete_lap();
        assert_eq!(car.laps(), 1);
        assert_eq!(car.visited(), 0);
    }
}
