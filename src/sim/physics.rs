//! Reference-state rigid body kinematics
//!
//! Position, velocity and rotation are never integrated tick by tick. They are
//! closed-form functions of the time elapsed since the last change:
//!
//! ```text
//! pos = pos0 + vel0*t + 0.5*acc*t²
//! vel = vel0 + acc*t
//! rot = rot0 + angVel0*t + 0.5*angAcc*t²
//! ```
//!
//! Every mutation goes through [`RigidBody::commit_with`], which re-captures
//! the reference state and restarts the clock in one step.

use std::sync::Arc;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::geometry::{Rect, Segment};
use super::vector::VectorExt;
use crate::heading;
use crate::tuning::Tuning;

/// What a body is, which selects its thrust and speed cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    /// Capped at `max_speed`
    Vehicle,
    /// Stronger thrust, capped at `missile_speed`
    Missile,
    /// Ballistic; never capped
    Projectile,
}

/// Coarse direction of travel relative to the nose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionState {
    Stop,
    Forward,
    Backward,
}

/// Anything that can tell whether a shape touches a wall
pub trait WallProbe {
    fn is_wall_hit(&self, shape: &Rect) -> bool;
}

impl WallProbe for [Rect] {
    fn is_wall_hit(&self, shape: &Rect) -> bool {
        self.iter().any(|wall| shape.overlaps(wall))
    }
}

/// Settable kinematic quantities
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Motion {
    position: DVec2,
    velocity: DVec2,
    acceleration: DVec2,
    rotation: f64,
    angular_velocity: f64,
    angular_acceleration: f64,
}

/// Snapshot the kinematics are replayed from
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Reference {
    position: DVec2,
    velocity: DVec2,
    rotation: f64,
    angular_velocity: f64,
    /// Seconds since capture
    elapsed: f64,
}

impl Reference {
    fn capture(motion: &Motion) -> Self {
        Self {
            position: motion.position,
            velocity: motion.velocity,
            rotation: motion.rotation,
            angular_velocity: motion.angular_velocity,
            elapsed: 0.0,
        }
    }

    /// Kinematic state reached after `elapsed` under constant accelerations
    fn state_at(&self, acceleration: DVec2, angular_acceleration: f64) -> Motion {
        let t = self.elapsed;
        Motion {
            position: self.position + self.velocity * t + 0.5 * acceleration * t * t,
            velocity: self.velocity + acceleration * t,
            acceleration,
            rotation: self.rotation
                + self.angular_velocity * t
                + 0.5 * angular_acceleration * t * t,
            angular_velocity: self.angular_velocity + angular_acceleration * t,
            angular_acceleration,
        }
    }
}

/// Kinematic body driven by the game rules
#[derive(Debug, Clone)]
pub struct RigidBody {
    kind: BodyKind,
    tuning: Arc<Tuning>,
    width: f64,
    height: f64,
    motion: Motion,
    reference: Reference,
    /// Velocity follows the nose while set
    locked_velocity: bool,
    braking: bool,
    reversing: bool,
    since_collision: f64,
    since_fix: f64,
    since_rotate: f64,
}

impl RigidBody {
    pub fn new(kind: BodyKind, width: f64, height: f64, tuning: Arc<Tuning>) -> Self {
        Self {
            kind,
            tuning,
            width,
            height,
            motion: Motion::default(),
            reference: Reference::default(),
            locked_velocity: true,
            braking: false,
            reversing: false,
            since_collision: f64::INFINITY,
            since_fix: 0.0,
            since_rotate: f64::INFINITY,
        }
    }

    // === Accessors ===

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn position(&self) -> DVec2 {
        self.motion.position
    }

    pub fn velocity(&self) -> DVec2 {
        self.motion.velocity
    }

    pub fn acceleration(&self) -> DVec2 {
        self.motion.acceleration
    }

    pub fn speed(&self) -> f64 {
        self.motion.velocity.length()
    }

    /// Degrees, clockwise on screen
    pub fn rotation(&self) -> f64 {
        self.motion.rotation
    }

    pub fn angular_velocity(&self) -> f64 {
        self.motion.angular_velocity
    }

    pub fn angular_acceleration(&self) -> f64 {
        self.motion.angular_acceleration
    }

    pub fn is_braking(&self) -> bool {
        self.braking
    }

    pub fn is_locked(&self) -> bool {
        self.locked_velocity
    }

    pub fn is_reversing(&self) -> bool {
        self.reversing
    }

    /// Seconds since the last wall collision
    pub fn since_collision(&self) -> f64 {
        self.since_collision
    }

    /// Unit vector along the nose
    pub fn nose(&self) -> DVec2 {
        heading(self.motion.rotation)
    }

    /// Signed angle between the nose and the velocity (drift)
    pub fn sliding_angle(&self) -> f64 {
        if self.speed() < 1.0 {
            return 0.0;
        }
        self.nose().angle_deg_to(self.motion.velocity)
    }

    pub fn motion_state(&self) -> MotionState {
        let v = self.motion.velocity;
        if v.length() < 1.0 {
            MotionState::Stop
        } else if v.dot(self.nose()) >= 0.0 {
            MotionState::Forward
        } else {
            MotionState::Backward
        }
    }

    fn speed_cap(&self) -> Option<f64> {
        match self.kind {
            BodyKind::Vehicle => Some(self.tuning.max_speed),
            BodyKind::Missile => Some(self.tuning.missile_speed),
            BodyKind::Projectile => None,
        }
    }

    fn thrust(&self) -> f64 {
        match self.kind {
            BodyKind::Missile => self.tuning.missile_acc,
            BodyKind::Vehicle | BodyKind::Projectile => self.tuning.acc,
        }
    }

    // === Mutation ===

    /// Apply a change and re-capture the reference state
    fn commit_with(&mut self, change: impl FnOnce(&mut Motion)) {
        change(&mut self.motion);
        self.reference = Reference::capture(&self.motion);
    }

    pub fn set_position(&mut self, position: DVec2) {
        self.commit_with(|m| m.position = position);
    }

    /// Translate by `delta`
    pub fn move_by(&mut self, delta: DVec2) {
        self.commit_with(|m| m.position += delta);
    }

    pub fn set_velocity(&mut self, velocity: DVec2) {
        self.commit_with(|m| m.velocity = velocity);
    }

    pub fn set_acceleration(&mut self, acceleration: DVec2) {
        self.commit_with(|m| m.acceleration = acceleration);
    }

    pub fn set_angular_velocity(&mut self, angular_velocity: f64) {
        self.commit_with(|m| m.angular_velocity = angular_velocity);
    }

    pub fn set_angular_acceleration(&mut self, angular_acceleration: f64) {
        self.commit_with(|m| m.angular_acceleration = angular_acceleration);
    }

    /// Set the rotation; ignored while the velocity is locked to the nose
    pub fn set_rotation(&mut self, degrees: f64) {
        if self.locked_velocity {
            return;
        }
        self.commit_with(|m| m.rotation = degrees);
    }

    /// Release the velocity from the nose (sliding)
    pub fn unlock(&mut self) {
        self.locked_velocity = false;
    }

    pub fn clear_braking(&mut self) {
        self.braking = false;
    }

    /// Zero every rate
    pub fn stop(&mut self) {
        self.reversing = false;
        self.commit_with(|m| {
            m.velocity = DVec2::ZERO;
            m.acceleration = DVec2::ZERO;
            m.angular_velocity = 0.0;
            m.angular_acceleration = 0.0;
        });
    }

    /// Thrust along the nose; regains grip once the grace window has passed
    pub fn accelerate(&mut self) {
        let nose = self.nose();
        let thrust = self.thrust();
        let grip = self.since_collision > self.tuning.collision_grace;
        self.commit_with(|m| {
            m.acceleration = nose * thrust;
            if grip {
                m.velocity = nose * m.velocity.length();
            }
        });
        if grip {
            self.locked_velocity = true;
        }
        self.braking = false;
        self.reversing = false;
    }

    /// Decelerate against the velocity; `full` brakes six times harder
    pub fn brake(&mut self, full: bool) {
        let Ok(direction) = self.motion.velocity.unit() else {
            return;
        };
        let mut magnitude = self.tuning.acc * 0.5;
        if full {
            magnitude *= 6.0;
        }
        self.commit_with(|m| m.acceleration = -direction * magnitude);
        self.braking = true;
        self.reversing = false;
    }

    /// Back up; refused while rolling forward
    pub fn reverse(&mut self) {
        if self.motion_state() == MotionState::Forward {
            return;
        }
        let nose = self.nose();
        let magnitude = self.tuning.reverse_acc;
        self.commit_with(|m| m.acceleration = -nose * magnitude);
        self.braking = false;
        self.reversing = true;
    }

    /// Turn by `degrees`, keeping speed and acceleration magnitudes
    pub fn rotate(&mut self, degrees: f64) {
        if self.since_rotate < self.tuning.rotate_debounce {
            return;
        }
        let braking = self.braking;
        self.commit_with(|m| {
            m.rotation += degrees;
            let nose = heading(m.rotation);
            let acc = m.acceleration.length();
            m.velocity = nose * m.velocity.length();
            m.acceleration = if braking { -nose * acc } else { nose * acc };
        });
        self.since_rotate = 0.0;
    }

    /// Bounce off `edge`
    ///
    /// `shape` is a copy of the body's collision shape used to re-test the
    /// pushed-out position against `walls`. A [`Segment::none`] edge is a no-op.
    pub fn handle_collision<W: WallProbe + ?Sized>(
        &mut self,
        edge: &Segment,
        walls: &W,
        mut shape: Rect,
    ) {
        if edge.is_none() {
            return;
        }

        let nudge = if self.motion.angular_velocity > 0.0 {
            -self.tuning.collision_nudge
        } else {
            self.tuning.collision_nudge
        };

        let old_velocity = self.motion.velocity;
        let old_speed = old_velocity.length();
        if old_speed < 1.0 {
            // Barely moving: turn away a little and carry on
            self.commit_with(|m| {
                m.rotation += nudge;
                m.angular_velocity = 0.0;
            });
            return;
        }

        self.locked_velocity = false;
        let line = edge.vector();
        let velocity = old_velocity.mirrored(line) * self.tuning.elastic_coeff;

        let normal = old_velocity.mirror_normal(line);
        let mut push = normal.unit().unwrap_or(DVec2::ZERO) * self.tuning.push_out;
        if old_speed > self.tuning.fast_impact_speed {
            push *= 2.0;
        }

        let old_position = self.motion.position;
        let mut position = old_position + push;
        shape.set_pose(position, shape.rotation);
        if walls.is_wall_hit(&shape) {
            // Pushed the wrong way; go back past the start instead
            position = old_position - push * 2.0;
        }

        self.commit_with(|m| {
            m.velocity = velocity;
            m.rotation += nudge;
            m.position = position;
        });
        self.since_collision = 0.0;
    }

    // === Integration ===

    /// Advance the clocks by `dt` and recompute the kinematic state
    pub fn update(&mut self, dt: f64) {
        self.reference.elapsed += dt;
        self.since_collision += dt;
        self.since_fix += dt;
        self.since_rotate += dt;

        self.motion = self
            .reference
            .state_at(self.motion.acceleration, self.motion.angular_acceleration);
        self.fix_directions();

        let speed = self.speed();
        if self.braking && speed < self.tuning.brake_stop_speed {
            self.stop();
            self.braking = false;
            return;
        }

        if let Some(cap) = self.speed_cap()
            && speed > cap
        {
            let decay = self.tuning.speed_decay;
            self.commit_with(|m| {
                m.acceleration = DVec2::ZERO;
                m.velocity *= decay;
            });
        }
    }

    /// Re-align velocity and acceleration with the nose
    fn fix_directions(&mut self) {
        if self.since_fix < self.tuning.fix_interval {
            return;
        }
        let nose = self.nose();
        let forward = if self.reversing { -nose } else { nose };
        let locked = self.locked_velocity;
        let braking = self.braking;
        self.commit_with(|m| {
            if locked {
                m.velocity = forward * m.velocity.length();
            }
            let acc = m.acceleration.length();
            m.acceleration = if braking {
                -m.velocity.unit().unwrap_or(DVec2::ZERO) * acc
            } else {
                forward * acc
            };
        });
        self.since_fix = 0.0;
    }
}
