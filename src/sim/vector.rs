//! 2D vector helpers on top of `glam::DVec2`
//!
//! Angles are in degrees and positive angles rotate clockwise on screen
//! (y grows downward), which is the plain counter-clockwise rotation matrix
//! in mathematical coordinates.

use anyhow::{Result, bail};
use glam::DVec2;

use crate::{deg_to_rad, rad_to_deg};

/// Lengths below this are treated as zero
pub const LENGTH_EPSILON: f64 = 1e-9;

/// Axis to mirror a vector about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Racing-specific vector operations
pub trait VectorExt: Sized {
    /// Rotate by `degrees`
    fn rotated(self, degrees: f64) -> Self;
    /// Mirror about a coordinate axis
    fn mirrored_axis(self, axis: Axis) -> Self;
    /// Reflect about the direction of `about`
    fn mirrored(self, about: Self) -> Self;
    /// 2D cross product (determinant of the two column vectors)
    fn det(self, other: Self) -> f64;
    /// Unit vector; fails when the length is ~0
    fn unit(self) -> Result<Self>;
    /// Signed angle in degrees from `self` to `other`
    fn angle_deg_to(self, other: Self) -> f64;
    /// Direction of the vector in degrees
    fn direction_degrees(self) -> f64;
    /// Normal of `mirror` facing against `self`
    fn mirror_normal(self, mirror: Self) -> Self;
}

impl VectorExt for DVec2 {
    fn rotated(self, degrees: f64) -> Self {
        let (sin, cos) = deg_to_rad(degrees).sin_cos();
        DVec2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    fn mirrored_axis(self, axis: Axis) -> Self {
        match axis {
            Axis::X => DVec2::new(self.x, -self.y),
            Axis::Y => DVec2::new(-self.x, self.y),
        }
    }

    fn mirrored(self, about: Self) -> Self {
        let angle = about.angle_deg_to(self);
        self.rotated(-2.0 * angle)
    }

    fn det(self, other: Self) -> f64 {
        self.x * other.y - self.y * other.x
    }

    fn unit(self) -> Result<Self> {
        let len = self.length();
        if !len.is_finite() || len < LENGTH_EPSILON {
            bail!("cannot take the unit vector of ({}, {})", self.x, self.y);
        }
        Ok(self / len)
    }

    fn angle_deg_to(self, other: Self) -> f64 {
        rad_to_deg(self.det(other).atan2(self.dot(other)))
    }

    fn direction_degrees(self) -> f64 {
        rad_to_deg(self.y.atan2(self.x))
    }

    fn mirror_normal(self, mirror: Self) -> Self {
        let mut angle = mirror.angle_deg_to(self);
        if angle > 0.0 {
            angle += 180.0;
        }
        self.rotated(90.0 - angle)
    }
}
