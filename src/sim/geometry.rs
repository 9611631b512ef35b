//! Segment and oriented-rectangle geometry
//!
//! Every collidable thing in the game is a rectangle with a position, a
//! rotation and an origin. Collisions are decided by testing the 4 edges of
//! one rectangle against the 4 edges of another.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::vector::VectorExt;

/// Line segment between two points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: DVec2,
    pub end: DVec2,
}

impl Segment {
    pub fn new(start: DVec2, end: DVec2) -> Self {
        Self { start, end }
    }

    /// "No edge found" sentinel; both points are NaN
    pub fn none() -> Self {
        let nan = DVec2::splat(f64::NAN);
        Self { start: nan, end: nan }
    }

    /// True for the sentinel (or any segment with a NaN point)
    pub fn is_none(&self) -> bool {
        self.start.is_nan() || self.end.is_nan()
    }

    /// Direction vector from start to end
    pub fn vector(&self) -> DVec2 {
        self.end - self.start
    }

    pub fn intersects(&self, other: &Segment) -> bool {
        do_intersect(self.start, self.end, other.start, other.end)
    }
}

/// Turning direction of an ordered point triplet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Colinear,
    Clockwise,
    CounterClockwise,
}

/// Orientation of the triplet (p, q, r)
pub fn orientation(p: DVec2, q: DVec2, r: DVec2) -> Orientation {
    let val = (q.y - p.y) * (r.x - q.x) - (q.x - p.x) * (r.y - q.y);
    if val == 0.0 {
        Orientation::Colinear
    } else if val > 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::CounterClockwise
    }
}

/// Whether `q` lies on segment `pr`, given the three points are colinear
pub fn on_segment(p: DVec2, q: DVec2, r: DVec2) -> bool {
    q.x <= p.x.max(r.x) && q.x >= p.x.min(r.x) && q.y <= p.y.max(r.y) && q.y >= p.y.min(r.y)
}

/// Whether segment `p1q1` intersects segment `p2q2`
pub fn do_intersect(p1: DVec2, q1: DVec2, p2: DVec2, q2: DVec2) -> bool {
    let o1 = orientation(p1, q1, p2);
    let o2 = orientation(p1, q1, q2);
    let o3 = orientation(p2, q2, p1);
    let o4 = orientation(p2, q2, q1);

    // General case
    if o1 != o2 && o3 != o4 {
        return true;
    }

    // Colinear special cases
    if o1 == Orientation::Colinear && on_segment(p1, p2, q1) {
        return true;
    }
    if o2 == Orientation::Colinear && on_segment(p1, q2, q1) {
        return true;
    }
    if o3 == Orientation::Colinear && on_segment(p2, p1, q2) {
        return true;
    }
    if o4 == Orientation::Colinear && on_segment(p2, q1, q2) {
        return true;
    }

    false
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec2,
    pub max: DVec2,
}

impl Aabb {
    pub fn from_points(points: &[DVec2]) -> Self {
        let mut min = DVec2::splat(f64::INFINITY);
        let mut max = DVec2::splat(f64::NEG_INFINITY);
        for p in points {
            min = min.min(*p);
            max = max.max(*p);
        }
        Self { min, max }
    }

    /// Overlap test; touching edges do not count
    pub fn intersects(&self, other: &Aabb) -> bool {
        let left = self.min.x.max(other.min.x);
        let right = self.max.x.min(other.max.x);
        let top = self.min.y.max(other.min.y);
        let bottom = self.max.y.min(other.max.y);
        left < right && top < bottom
    }

    pub fn contains(&self, point: DVec2) -> bool {
        point.x >= self.min.x && point.x < self.max.x && point.y >= self.min.y && point.y < self.max.y
    }
}

/// Oriented rectangle
///
/// Local corners run (0,0), (w,0), (w,h), (0,h). A local point `p` lands in
/// the world at `position + rotate(p - origin, rotation)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub position: DVec2,
    pub size: DVec2,
    /// Degrees, clockwise on screen
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub origin: DVec2,
}

impl Rect {
    /// Rectangle anchored at its top-left corner
    pub fn new(position: DVec2, size: DVec2, rotation: f64) -> Self {
        Self {
            position,
            size,
            rotation,
            origin: DVec2::ZERO,
        }
    }

    /// Rectangle anchored at its center, placed at the world origin
    pub fn centered(width: f64, height: f64) -> Self {
        let size = DVec2::new(width, height);
        Self {
            position: DVec2::ZERO,
            size,
            rotation: 0.0,
            origin: size / 2.0,
        }
    }

    pub fn set_pose(&mut self, position: DVec2, rotation: f64) {
        self.position = position;
        self.rotation = rotation;
    }

    /// Map a local point into world space
    pub fn transform_point(&self, local: DVec2) -> DVec2 {
        self.position + (local - self.origin).rotated(self.rotation)
    }

    /// World-space corners in edge order
    pub fn corners(&self) -> [DVec2; 4] {
        let (w, h) = (self.size.x, self.size.y);
        [
            self.transform_point(DVec2::ZERO),
            self.transform_point(DVec2::new(w, 0.0)),
            self.transform_point(DVec2::new(w, h)),
            self.transform_point(DVec2::new(0.0, h)),
        ]
    }

    /// World-space midpoint
    pub fn center(&self) -> DVec2 {
        self.transform_point(self.size / 2.0)
    }

    /// Back-to-front vector along the top edge; the direction the shape faces
    pub fn nose(&self) -> DVec2 {
        let [back, front, ..] = self.corners();
        front - back
    }

    /// World-space bounding box
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&self.corners())
    }

    pub fn polygon(&self) -> Polygon {
        Polygon::from_rect(self)
    }

    /// Edge-level overlap test, culled by bounding boxes first
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.bounds().intersects(&other.bounds()) && self.polygon().intersects(&other.polygon())
    }

    /// Finite placement and a positive size
    pub fn is_valid(&self) -> bool {
        self.position.is_finite()
            && self.origin.is_finite()
            && self.rotation.is_finite()
            && self.size.x > 0.0
            && self.size.y > 0.0
            && self.size.is_finite()
    }
}

/// Closed quad built from a rectangle's world-space corners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Polygon {
    edges: [Segment; 4],
}

impl Polygon {
    pub fn from_rect(rect: &Rect) -> Self {
        let c = rect.corners();
        Self {
            edges: [
                Segment::new(c[0], c[1]),
                Segment::new(c[1], c[2]),
                Segment::new(c[2], c[3]),
                Segment::new(c[3], c[0]),
            ],
        }
    }

    pub fn edges(&self) -> &[Segment; 4] {
        &self.edges
    }

    /// True iff any edge of `self` crosses any edge of `other`
    pub fn intersects(&self, other: &Polygon) -> bool {
        self.edges
            .iter()
            .any(|a| other.edges.iter().any(|b| a.intersects(b)))
    }

    /// First edge of `other` crossed by an edge of `self`, or [`Segment::none`]
    pub fn crashed_edge(&self, other: &Polygon) -> Segment {
        for a in &self.edges {
            for b in &other.edges {
                if a.intersects(b) {
                    return *b;
                }
            }
        }
        Segment::none()
    }
}
