//! Gun projectiles
//!
//! Each vehicle keeps a pool of bullets. Inert bullets wait in the pool and
//! are launched in order; flying bullets leave the pool when they hit
//! something or cross the world boundary.

use std::sync::Arc;

use super::geometry::Rect;
use super::physics::{BodyKind, RigidBody};
use super::vehicle::VehicleId;
use crate::heading;
use crate::tuning::Tuning;

pub const BULLET_WIDTH: f64 = 30.0;
pub const BULLET_HEIGHT: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct Bullet {
    body: RigidBody,
    shape: Rect,
    owner: VehicleId,
    flying: bool,
}

impl Bullet {
    pub fn new(owner: VehicleId, tuning: Arc<Tuning>) -> Self {
        Self {
            body: RigidBody::new(BodyKind::Projectile, BULLET_WIDTH, BULLET_HEIGHT, tuning),
            shape: Rect::centered(BULLET_WIDTH, BULLET_HEIGHT),
            owner,
            flying: false,
        }
    }

    pub fn owner(&self) -> VehicleId {
        self.owner
    }

    pub fn is_flying(&self) -> bool {
        self.flying
    }

    pub fn shape(&self) -> &Rect {
        &self.shape
    }

    pub fn body(&self) -> &RigidBody {
        &self.body
    }

    /// Fire from the shooter's pose at its speed plus the muzzle velocity
    pub fn launch(&mut self, shooter: &RigidBody) {
        self.body.set_position(shooter.position());
        self.body.unlock();
        self.body.set_rotation(shooter.rotation());
        let speed = shooter.speed() + self.body.tuning().bullet_speed;
        self.body.set_velocity(heading(shooter.rotation()) * speed);
        self.flying = true;
        self.sync_shape();
    }

    pub fn update(&mut self, dt: f64) {
        if !self.flying {
            return;
        }
        self.body.update(dt);
        self.sync_shape();
    }

    /// Whether the bullet has left the playable world
    pub fn is_out_of_bounds(&self, bound: f64) -> bool {
        let p = self.body.position();
        p.x > bound || p.x < -bound || p.y > bound || p.y < -bound
    }

    fn sync_shape(&mut self) {
        self.shape.set_pose(self.body.position(), self.body.rotation());
    }
}
