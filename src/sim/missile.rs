//! Homing missile
//!
//! A missile follows the checkpoints like an AI car until a rival comes
//! within lock-on range, then chases the nearest one. It detonates on
//! contact or when the fuel runs out.

use std::sync::Arc;

use anyhow::Result;
use glam::DVec2;

use super::geometry::{Aabb, Rect};
use super::physics::{BodyKind, RigidBody};
use super::steering::Autopilot;
use super::vehicle::VehicleId;
use crate::heading;
use crate::tuning::Tuning;

pub const MISSILE_WIDTH: f64 = 60.0;
pub const MISSILE_HEIGHT: f64 = 30.0;

/// What a missile can see of a vehicle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub id: VehicleId,
    pub center: DVec2,
    pub bounds: Aabb,
    pub destroyed: bool,
}

#[derive(Debug, Clone)]
pub struct Missile {
    body: RigidBody,
    shape: Rect,
    pilot: Autopilot,
    owner: Option<VehicleId>,
    flying: bool,
    destroyed: bool,
    /// Seconds since launch
    flight_time: f64,
}

impl Missile {
    pub fn new(tuning: Arc<Tuning>) -> Self {
        Self {
            body: RigidBody::new(BodyKind::Missile, MISSILE_WIDTH, MISSILE_HEIGHT, tuning),
            shape: Rect::centered(MISSILE_WIDTH, MISSILE_HEIGHT),
            pilot: Autopilot::default(),
            owner: None,
            flying: false,
            destroyed: false,
            flight_time: 0.0,
        }
    }

    pub fn is_flying(&self) -> bool {
        self.flying
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn owner(&self) -> Option<VehicleId> {
        self.owner
    }

    pub fn shape(&self) -> &Rect {
        &self.shape
    }

    pub fn body(&self) -> &RigidBody {
        &self.body
    }

    pub fn pilot(&self) -> &Autopilot {
        &self.pilot
    }

    /// Fire from the owner's pose, seeking `checkpoint` first
    pub fn launch(&mut self, owner: VehicleId, checkpoint: usize, launcher: &RigidBody) {
        self.owner = Some(owner);
        self.pilot = Autopilot::new(checkpoint);
        self.body.set_position(launcher.position());
        self.body.unlock();
        self.body.set_rotation(launcher.rotation());
        let speed = launcher.speed() + self.body.tuning().missile_speed;
        self.body.set_velocity(heading(launcher.rotation()) * speed);
        self.flying = true;
        self.destroyed = false;
        self.flight_time = 0.0;
        self.sync_shape();
    }

    pub fn detonate(&mut self) {
        self.flying = false;
        self.destroyed = true;
    }

    /// Nearest live rival within lock-on range
    pub fn acquire<'a>(&self, targets: &'a [Target]) -> Option<&'a Target> {
        let range = self.body.tuning().missile_range;
        let center = self.shape.center();
        targets
            .iter()
            .filter(|t| Some(t.id) != self.owner && !t.destroyed)
            .map(|t| (t, t.center.distance(center)))
            .filter(|(_, d)| *d <= range)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(t, _)| t)
    }

    /// Advance one tick; returns the vehicle hit, if any
    pub fn fly(&mut self, dt: f64, checkpoints: &[Rect], targets: &[Target]) -> Result<Option<VehicleId>> {
        if !self.flying {
            return Ok(None);
        }
        self.flight_time += dt;
        if self.flight_time > self.body.tuning().missile_fuel {
            self.detonate();
            return Ok(None);
        }

        let locked = self.acquire(targets).copied();
        if let Some(target) = locked
            && self.shape.bounds().intersects(&target.bounds)
        {
            self.detonate();
            return Ok(Some(target.id));
        }

        let turn_rate = self.body.tuning().missile_ang_vel;
        let tolerance = self.body.tuning().heading_tolerance;
        self.pilot.drive(
            &mut self.body,
            &self.shape,
            checkpoints,
            locked.map(|t| t.center),
            turn_rate,
            tolerance,
        )?;
        self.body.update(dt);
        self.sync_shape();
        Ok(None)
    }

    fn sync_shape(&mut self) {
        self.shape.set_pose(self.body.position(), self.body.rotation());
    }
}
