//! Checkpoint-seeking autopilot shared by AI vehicles and homing missiles

use anyhow::{Result, bail};
use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::geometry::Rect;
use super::physics::RigidBody;
use super::vector::VectorExt;

/// Steering decision for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Steer {
    /// Hold this angular velocity (degrees/s)
    Turn(f64),
    /// Bearing is within tolerance; drive straight
    Straight,
}

/// Decide how to turn toward `target`
///
/// The bearing error is the signed angle from the target direction to the
/// nose. Outside `tolerance` degrees the entity turns at `turn_rate` toward
/// the target.
pub fn steer(center: DVec2, nose: DVec2, target: DVec2, turn_rate: f64, tolerance: f64) -> Steer {
    let bearing = (target - center).angle_deg_to(nose);
    if bearing.abs() > tolerance {
        if bearing > 0.0 {
            Steer::Turn(-turn_rate)
        } else {
            Steer::Turn(turn_rate)
        }
    } else {
        Steer::Straight
    }
}

/// Resolve a possibly out-of-range checkpoint index
///
/// Negative indices resolve to the last checkpoint, indices past the end to
/// the first.
pub fn wrap_checkpoint_index(index: isize, count: usize) -> Result<usize> {
    if count == 0 {
        bail!("track has no checkpoints to steer toward");
    }
    if index < 0 {
        Ok(count - 1)
    } else if index as usize >= count {
        Ok(0)
    } else {
        Ok(index as usize)
    }
}

/// Per-entity steering memory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Autopilot {
    target: isize,
    /// Throttle already applied for the current straight
    accelerating: bool,
}

impl Autopilot {
    pub fn new(first_checkpoint: usize) -> Self {
        Self {
            target: first_checkpoint as isize,
            accelerating: false,
        }
    }

    /// Index of the checkpoint being sought (may be out of range until wrapped)
    pub fn target(&self) -> isize {
        self.target
    }

    pub fn is_accelerating(&self) -> bool {
        self.accelerating
    }

    /// Run one tick of steering and throttle
    ///
    /// Touching the sought checkpoint advances to the next one and brakes for
    /// this tick. `chase` replaces the checkpoint midpoint as the aim point.
    pub fn drive(
        &mut self,
        body: &mut RigidBody,
        shape: &Rect,
        checkpoints: &[Rect],
        chase: Option<DVec2>,
        turn_rate: f64,
        tolerance: f64,
    ) -> Result<()> {
        let index = wrap_checkpoint_index(self.target, checkpoints.len())?;
        self.target = index as isize;
        let checkpoint = checkpoints[index];

        let mut throttle = true;
        if shape.polygon().intersects(&checkpoint.polygon()) {
            self.target = wrap_checkpoint_index(self.target + 1, checkpoints.len())? as isize;
            body.brake(true);
            throttle = false;
        }

        let aim = chase.unwrap_or_else(|| checkpoint.center());
        match steer(shape.center(), shape.nose(), aim, turn_rate, tolerance) {
            Steer::Turn(rate) => {
                if body.angular_velocity() != rate {
                    body.set_angular_velocity(rate);
                }
            }
            Steer::Straight => {
                if body.angular_velocity() != 0.0 {
                    body.set_angular_velocity(0.0);
                    self.accelerating = false;
                }
                body.clear_braking();
                throttle = true;
            }
        }

        // Re-accelerating every tick would keep restarting the kinematics clock
        if throttle && !body.is_braking() && !self.accelerating {
            body.accelerate();
            self.accelerating = true;
        }
        Ok(())
    }
}
